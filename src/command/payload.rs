//! Declarative configuration payloads

use crate::error::InputError;
use serde_json::{Map, Value};

/// Caller-supplied configuration: a JSON object of field name to value.
///
/// Only key presence is checked here; translators decide what each field means.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationPayload {
    fields: Map<String, Value>,
}

impl ConfigurationPayload {
    /// Parse a raw message body. An empty body is an empty payload.
    pub fn parse(raw: &[u8]) -> Result<Self, InputError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let value: Value = serde_json::from_slice(raw)?;
        Self::from_value(value)
    }

    /// Wrap an already-parsed JSON value
    pub fn from_value(value: Value) -> Result<Self, InputError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(InputError::NotAnObject),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Numeric field, `None` when absent
    pub fn number(&self, field: &str) -> Result<Option<f64>, InputError> {
        match self.fields.get(field) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| InputError::InvalidField {
                    field: field.to_string(),
                    reason: format!("expected a number, got {}", value),
                }),
        }
    }

    /// Nested object section (e.g. `calibrate`), `None` when absent
    pub fn section(&self, field: &str) -> Result<Option<ConfigurationPayload>, InputError> {
        match self.fields.get(field) {
            None => Ok(None),
            Some(Value::Object(fields)) => Ok(Some(Self {
                fields: fields.clone(),
            })),
            Some(other) => Err(InputError::InvalidField {
                field: field.to_string(),
                reason: format!("expected an object, got {}", other),
            }),
        }
    }
}

//! Deferred device operations
//!
//! Operations are plain descriptors: building one never touches the network.
//! Translators collect them into an [`OperationList`] which the
//! [`PipelineExecutor`](super::PipelineExecutor) later runs in order.

use super::payload::ConfigurationPayload;
use crate::error::InputError;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use ubisys_shared::codec::{AttributeWrite, ZclPayload, ZclRequest};
use ubisys_shared::{timing, AttributeRegistry, CommandDescriptor, DataType};

/// Converts a configuration value into the value written to the device
pub type Converter<'a> = &'a dyn Fn(&Value) -> Result<Value, String>;

/// The device an operation is addressed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    pub ieee_address: String,
    pub device_type: String,
}

/// How an attribute is named by a translator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeId<'a> {
    Name(&'a str),
    Raw(u16),
}

impl<'a> From<&'a str> for AttributeId<'a> {
    fn from(name: &'a str) -> Self {
        AttributeId::Name(name)
    }
}

impl From<u16> for AttributeId<'static> {
    fn from(id: u16) -> Self {
        AttributeId::Raw(id)
    }
}

/// Attribute identity carried by read and write operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRef {
    pub name: String,
    pub id: u16,
}

/// Addressing shared by all device operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Access {
    pub target: DeviceTarget,
    pub cluster: String,
    pub cluster_id: u16,
    pub manufacturer_code: Option<u16>,
    pub endpoint: Option<u8>,
}

/// A deferred unit of work
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Read {
        access: Access,
        attribute: AttributeRef,
        settle: Duration,
    },
    Write {
        access: Access,
        attribute: AttributeRef,
        data_type: DataType,
        value: Value,
        settle: Duration,
    },
    Command {
        access: Access,
        command: CommandDescriptor,
        params: Value,
        settle: Duration,
    },
    Wait {
        duration: Duration,
        settle: Duration,
    },
}

impl Operation {
    /// Pause applied after the operation completed
    pub fn settle(&self) -> Duration {
        match self {
            Operation::Read { settle, .. }
            | Operation::Write { settle, .. }
            | Operation::Command { settle, .. }
            | Operation::Wait { settle, .. } => *settle,
        }
    }

    /// Whether completing this operation changes device state
    pub fn is_mutation(&self) -> bool {
        matches!(self, Operation::Write { .. } | Operation::Command { .. })
    }

    /// Value carried by a write
    pub fn written_value(&self) -> Option<&Value> {
        match self {
            Operation::Write { value, .. } => Some(value),
            _ => None,
        }
    }

    /// The request frame for this operation; waits have none
    pub fn request(&self) -> Option<ZclRequest> {
        let (access, payload) = match self {
            Operation::Read {
                access, attribute, ..
            } => (
                access,
                ZclPayload::Read {
                    attributes: vec![attribute.id],
                },
            ),
            Operation::Write {
                access,
                attribute,
                data_type,
                value,
                ..
            } => (
                access,
                ZclPayload::Write {
                    attributes: vec![AttributeWrite {
                        id: attribute.id,
                        data_type: *data_type,
                        value: value.clone(),
                    }],
                },
            ),
            Operation::Command {
                access,
                command,
                params,
                ..
            } => (
                access,
                ZclPayload::Command {
                    command_id: command.id,
                    command: command.name.to_string(),
                    params: params.clone(),
                },
            ),
            Operation::Wait { .. } => return None,
        };

        Some(ZclRequest {
            transaction: 0,
            device: access.target.ieee_address.clone(),
            device_type: access.target.device_type.clone(),
            cluster: access.cluster_id,
            cluster_name: access.cluster.clone(),
            frame_type: payload.kind().frame_type(),
            payload,
            manufacturer_code: access.manufacturer_code,
            endpoint: access.endpoint,
        })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read {
                access, attribute, ..
            } => write!(f, "read {}.{}", access.cluster, attribute.name),
            Operation::Write {
                access,
                attribute,
                value,
                ..
            } => write!(f, "write {}.{} = {}", access.cluster, attribute.name, value),
            Operation::Command {
                access, command, ..
            } => write!(f, "command {}.{}", access.cluster, command.name),
            Operation::Wait { duration, .. } => write!(f, "wait {}ms", duration.as_millis()),
        }
    }
}

/// Ordered operations for one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationList {
    operations: Vec<Operation>,
}

impl OperationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.operations.iter()
    }

    pub fn as_slice(&self) -> &[Operation] {
        &self.operations
    }
}

impl Extend<Operation> for OperationList {
    fn extend<I: IntoIterator<Item = Operation>>(&mut self, iter: I) {
        self.operations.extend(iter);
    }
}

impl IntoIterator for OperationList {
    type Item = Operation;
    type IntoIter = std::vec::IntoIter<Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.into_iter()
    }
}

impl<'a> IntoIterator for &'a OperationList {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}

/// Values read by a pipeline: cluster name -> attribute name -> value
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultAccumulator {
    values: BTreeMap<String, BTreeMap<String, Value>>,
}

impl ResultAccumulator {
    pub fn insert(&mut self, cluster: &str, attribute: &str, value: Value) {
        self.values
            .entry(cluster.to_string())
            .or_default()
            .insert(attribute.to_string(), value);
    }

    pub fn get(&self, cluster: &str, attribute: &str) -> Option<&Value> {
        self.values.get(cluster)?.get(attribute)
    }

    /// Total number of attribute values held
    pub fn len(&self) -> usize {
        self.values.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds operations for one device
///
/// Every operation gets the fixed settle delay. Attribute names are resolved
/// against the registry at build time, so a typo in a translator fails before
/// anything is sent.
#[derive(Debug, Clone)]
pub struct OperationBuilder<'a> {
    registry: &'a AttributeRegistry,
    target: DeviceTarget,
    endpoint: Option<u8>,
    settle: Duration,
}

struct ResolvedAttribute {
    attribute: AttributeRef,
    data_type: Option<DataType>,
    manufacturer_code: Option<u16>,
}

impl<'a> OperationBuilder<'a> {
    pub fn new(registry: &'a AttributeRegistry, target: DeviceTarget) -> Self {
        Self {
            registry,
            target,
            endpoint: None,
            settle: Duration::from_millis(timing::SETTLE_DELAY_MS),
        }
    }

    /// Address every operation to a specific endpoint
    pub fn on_endpoint(mut self, endpoint: u8) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Suspend the pipeline for `seconds`
    pub fn wait(&self, seconds: f64) -> Operation {
        Operation::Wait {
            duration: Duration::from_millis((seconds.max(0.0) * 1000.0).round() as u64),
            settle: self.settle,
        }
    }

    pub fn read<'n>(
        &self,
        cluster: &str,
        attribute: impl Into<AttributeId<'n>>,
        vendor: bool,
    ) -> Result<Operation, InputError> {
        let resolved = self.resolve_attribute(cluster, attribute.into())?;

        Ok(Operation::Read {
            access: self.access(cluster, resolved.manufacturer_code, vendor)?,
            attribute: resolved.attribute,
            settle: self.settle,
        })
    }

    /// `data_type` overrides the registry type and is required for unknown raw ids
    pub fn write<'n>(
        &self,
        cluster: &str,
        attribute: impl Into<AttributeId<'n>>,
        value: Value,
        vendor: bool,
        data_type: Option<DataType>,
    ) -> Result<Operation, InputError> {
        let resolved = self.resolve_attribute(cluster, attribute.into())?;
        let data_type = data_type.or(resolved.data_type).ok_or_else(|| {
            InputError::MissingDataType {
                cluster: cluster.to_string(),
                id: resolved.attribute.id,
            }
        })?;

        Ok(Operation::Write {
            access: self.access(cluster, resolved.manufacturer_code, vendor)?,
            attribute: resolved.attribute,
            data_type,
            value,
            settle: self.settle,
        })
    }

    /// Write `field` from the payload if present, converted first when a
    /// converter is given. Absent fields produce no operation.
    #[allow(clippy::too_many_arguments)]
    pub fn write_from_config<'n>(
        &self,
        payload: &ConfigurationPayload,
        field: &str,
        cluster: &str,
        attribute: impl Into<AttributeId<'n>>,
        vendor: bool,
        data_type: Option<DataType>,
        converter: Option<Converter<'_>>,
    ) -> Result<Option<Operation>, InputError> {
        let Some(raw) = payload.get(field) else {
            return Ok(None);
        };

        let value = match converter {
            Some(convert) => convert(raw).map_err(|reason| InputError::InvalidField {
                field: field.to_string(),
                reason,
            })?,
            None => raw.clone(),
        };

        self.write(cluster, attribute, value, vendor, data_type)
            .map(Some)
    }

    pub fn command(
        &self,
        cluster: &str,
        command: &str,
        params: Value,
        vendor: bool,
    ) -> Result<Operation, InputError> {
        let command = self.registry.resolve_command(cluster, command)?;

        Ok(Operation::Command {
            access: self.access(cluster, None, vendor)?,
            command,
            params,
            settle: self.settle,
        })
    }

    fn resolve_attribute(
        &self,
        cluster: &str,
        attribute: AttributeId<'_>,
    ) -> Result<ResolvedAttribute, InputError> {
        let descriptor = match attribute {
            AttributeId::Name(name) => Some(self.registry.resolve(cluster, name)?),
            AttributeId::Raw(id) => {
                self.registry.cluster_id(cluster)?;
                self.registry.resolve_id(cluster, id)
            }
        };

        Ok(match (descriptor, attribute) {
            (Some(descriptor), _) => ResolvedAttribute {
                attribute: AttributeRef {
                    name: descriptor.name.to_string(),
                    id: descriptor.id,
                },
                data_type: Some(descriptor.data_type),
                manufacturer_code: descriptor.manufacturer_code,
            },
            (None, AttributeId::Raw(id)) => ResolvedAttribute {
                attribute: AttributeRef {
                    name: format!("0x{:04x}", id),
                    id,
                },
                data_type: None,
                manufacturer_code: None,
            },
            // Named lookups either resolve or return early above
            (None, AttributeId::Name(name)) => {
                return Err(InputError::Registry(
                    ubisys_shared::RegistryError::UnknownAttribute {
                        cluster: cluster.to_string(),
                        name: name.to_string(),
                    },
                ))
            }
        })
    }

    fn access(
        &self,
        cluster: &str,
        manufacturer_code: Option<u16>,
        vendor: bool,
    ) -> Result<Access, InputError> {
        let manufacturer_code = match (manufacturer_code, vendor) {
            (Some(code), _) => Some(code),
            (None, true) => Some(self.registry.manufacturer_code()),
            (None, false) => None,
        };

        Ok(Access {
            target: self.target.clone(),
            cluster: cluster.to_string(),
            cluster_id: self.registry.cluster_id(cluster)?,
            manufacturer_code,
            endpoint: self.endpoint,
        })
    }
}

/// Converter turning seconds into motor steps
pub fn seconds_to_steps(steps_per_second: f64) -> impl Fn(&Value) -> Result<Value, String> {
    move |value| scale(value, steps_per_second)
}

/// Converter turning milliseconds into motor steps
pub fn millis_to_steps(steps_per_second: f64) -> impl Fn(&Value) -> Result<Value, String> {
    move |value| scale(value, steps_per_second / 1000.0)
}

fn scale(value: &Value, factor: f64) -> Result<Value, String> {
    let number = value
        .as_f64()
        .ok_or_else(|| format!("expected a number, got {}", value))?;
    if !number.is_finite() || number < 0.0 {
        return Err(format!("expected a non-negative duration, got {}", value));
    }

    // Step attributes are uint16
    let steps = (number * factor).round();
    if !steps.is_finite() || steps > f64::from(u16::MAX) {
        return Err(format!(
            "{} converts to {} steps, above the maximum of {}",
            value,
            steps,
            u16::MAX
        ));
    }
    Ok(Value::from(steps as u16))
}

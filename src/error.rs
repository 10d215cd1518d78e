//! Error taxonomy for configuration requests

use crate::command::ResultAccumulator;
use crate::transport::TransportError;
use thiserror::Error;
use ubisys_shared::{RegistryError, Status};

/// Request rejected before any device I/O because of its shape
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Topic {0} is outside the request namespace")]
    InvalidTopic(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Malformed JSON payload: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("Payload must be a JSON object")]
    NotAnObject,

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Attribute 0x{id:04x} in {cluster} needs an explicit data type")]
    MissingDataType { cluster: String, id: u16 },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Target device could not be used for the request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Device '{0}' not found")]
    NotFound(String),

    #[error("Device '{name}' is made by '{actual}', expected '{expected}'")]
    ManufacturerMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Device '{name}' has model '{actual}' but {action} needs a {expected_prefix} device")]
    ModelMismatch {
        name: String,
        action: String,
        expected_prefix: String,
        actual: String,
    },
}

/// A single device operation failed
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("device answered {status}")]
    Status {
        status: Status,
        attribute: Option<u16>,
    },

    #[error("no record for attribute 0x{0:04x} in response")]
    MissingRecord(u16),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A pipeline aborted at its first failing step
#[derive(Error, Debug)]
#[error("step {step}/{total} ({operation}) failed: {source}")]
pub struct PipelineFailure {
    /// 1-based index of the failing operation
    pub step: usize,
    pub total: usize,
    pub operation: String,
    pub source: ProtocolError,
    /// Writes and commands that completed before the failure
    pub applied: usize,
    /// Values read before the failure
    pub partial: ResultAccumulator,
}

impl PipelineFailure {
    /// Whether the device was changed before the pipeline aborted
    pub fn left_partial_state(&self) -> bool {
        self.applied > 0
    }
}

/// Any reason a request did not complete
#[derive(Error, Debug)]
pub enum RequestError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Protocol(#[from] PipelineFailure),
}

impl RequestError {
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::Input(_) => "input",
            RequestError::Resolution(_) => "resolution",
            RequestError::Protocol(_) => "protocol",
        }
    }

    /// Whether the device may have been left partially configured
    pub fn is_partial(&self) -> bool {
        matches!(self, RequestError::Protocol(failure) if failure.left_partial_state())
    }
}

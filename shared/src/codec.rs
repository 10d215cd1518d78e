//! JSON frame codec for the ZCL bridge
//!
//! Device requests travel to the mesh coordinator as one JSON object per
//! message and come back as one JSON object per message:
//! ```text
//! request  -> { "transaction": 7, "device": "0x00124b...", "cluster": 258, "payload": { "kind": "read", ... } }
//! response <- { "transaction": 7, "status": 0, "records": [ { "id": 0, "status": 0, "value": 8 } ] }
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::zcl::{DataType, FrameType, OperationKind, Status};

/// Maximum frame size (256 KB)
pub const MAX_FRAME_SIZE: usize = 256 * 1024;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Frame too large: {0} bytes (max: {MAX_FRAME_SIZE})")]
    FrameTooLarge(usize),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single attribute written by a write request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeWrite {
    pub id: u16,
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub value: Value,
}

/// Body of a device request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZclPayload {
    Read {
        attributes: Vec<u16>,
    },
    Write {
        attributes: Vec<AttributeWrite>,
    },
    Command {
        command_id: u8,
        command: String,
        #[serde(default)]
        params: Value,
    },
}

impl ZclPayload {
    pub fn kind(&self) -> OperationKind {
        match self {
            ZclPayload::Read { .. } => OperationKind::Read,
            ZclPayload::Write { .. } => OperationKind::Write,
            ZclPayload::Command { .. } => OperationKind::Command,
        }
    }
}

/// A request addressed to one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZclRequest {
    /// Correlates the request with its response; assigned by the transport
    #[serde(default)]
    pub transaction: u64,
    /// IEEE address of the target device
    pub device: String,
    /// Logical device type (Router, EndDevice)
    pub device_type: String,
    pub cluster: u16,
    pub cluster_name: String,
    pub frame_type: FrameType,
    pub payload: ZclPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<u8>,
}

/// Per-attribute result inside a foundation response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub id: u16,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// A device response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZclResponse {
    pub transaction: u64,
    pub status: Status,
    #[serde(default)]
    pub records: Vec<AttributeRecord>,
}

impl ZclResponse {
    /// A response with success status and the given records
    pub fn success(transaction: u64, records: Vec<AttributeRecord>) -> Self {
        Self {
            transaction,
            status: Status::SUCCESS,
            records,
        }
    }

    /// First failing status, envelope before records
    pub fn first_failure(&self) -> Option<(Option<u16>, Status)> {
        if !self.status.is_success() {
            return Some((None, self.status));
        }
        self.records
            .iter()
            .find(|record| !record.status.is_success())
            .map(|record| (Some(record.id), record.status))
    }
}

/// Encode a frame into a JSON byte buffer
pub fn encode<T: Serialize>(frame: &T) -> Result<Bytes, CodecError> {
    let buf = serde_json::to_vec(frame)?;

    if buf.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge(buf.len()));
    }

    Ok(Bytes::from(buf))
}

/// Decode a frame from a JSON byte buffer
pub fn decode<T: for<'de> Deserialize<'de>>(buf: &[u8]) -> Result<T, CodecError> {
    if buf.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge(buf.len()));
    }

    Ok(serde_json::from_slice(buf)?)
}

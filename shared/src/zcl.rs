//! ZCL (Zigbee Cluster Library) vocabulary used by the bridge

use serde::{Deserialize, Serialize};
use std::fmt;

/// ZCL attribute data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum DataType {
    NoData = 0x00,
    Data8 = 0x08,
    Data16 = 0x09,
    Boolean = 0x10,
    Bitmap8 = 0x18,
    Bitmap16 = 0x19,
    Uint8 = 0x20,
    Uint16 = 0x21,
    Uint24 = 0x22,
    Uint32 = 0x23,
    Int8 = 0x28,
    Int16 = 0x29,
    Enum8 = 0x30,
    Enum16 = 0x31,
    OctetStr = 0x41,
    CharStr = 0x42,
    Array = 0x48,
}

impl DataType {
    /// Wire identifier of this type
    pub fn id(self) -> u8 {
        self as u8
    }
}

/// ZCL frame types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    /// Profile-wide commands (read/write attributes)
    Foundation,
    /// Cluster-specific commands
    Functional,
}

/// The kind of request sent to a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Read,
    Write,
    Command,
}

impl OperationKind {
    /// Frame type a request of this kind travels in
    pub fn frame_type(self) -> FrameType {
        match self {
            OperationKind::Read | OperationKind::Write => FrameType::Foundation,
            OperationKind::Command => FrameType::Functional,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Read => write!(f, "read"),
            OperationKind::Write => write!(f, "write"),
            OperationKind::Command => write!(f, "command"),
        }
    }
}

/// ZCL status code as carried in responses and attribute records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(pub u8);

impl Status {
    pub const SUCCESS: Status = Status(0x00);
    pub const FAILURE: Status = Status(0x01);
    pub const NOT_AUTHORIZED: Status = Status(0x7E);
    pub const MALFORMED_COMMAND: Status = Status(0x80);
    pub const UNSUP_CLUSTER_COMMAND: Status = Status(0x81);
    pub const INVALID_FIELD: Status = Status(0x85);
    pub const UNSUPPORTED_ATTRIBUTE: Status = Status(0x86);
    pub const INVALID_VALUE: Status = Status(0x87);
    pub const READ_ONLY: Status = Status(0x88);
    pub const INSUFFICIENT_SPACE: Status = Status(0x89);
    pub const INVALID_DATA_TYPE: Status = Status(0x8D);
    pub const HARDWARE_FAILURE: Status = Status(0xC0);
    pub const TIMEOUT: Status = Status(0x94);

    pub fn is_success(self) -> bool {
        self == Status::SUCCESS
    }

    /// Symbolic name of the status, if it is a known code
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Status::SUCCESS => "SUCCESS",
            Status::FAILURE => "FAILURE",
            Status::NOT_AUTHORIZED => "NOT_AUTHORIZED",
            Status::MALFORMED_COMMAND => "MALFORMED_COMMAND",
            Status::UNSUP_CLUSTER_COMMAND => "UNSUP_CLUSTER_COMMAND",
            Status::INVALID_FIELD => "INVALID_FIELD",
            Status::UNSUPPORTED_ATTRIBUTE => "UNSUPPORTED_ATTRIBUTE",
            Status::INVALID_VALUE => "INVALID_VALUE",
            Status::READ_ONLY => "READ_ONLY",
            Status::INSUFFICIENT_SPACE => "INSUFFICIENT_SPACE",
            Status::INVALID_DATA_TYPE => "INVALID_DATA_TYPE",
            Status::HARDWARE_FAILURE => "HARDWARE_FAILURE",
            Status::TIMEOUT => "TIMEOUT",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:02x})", name, self.0),
            None => write!(f, "status 0x{:02x}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(
            Status::UNSUPPORTED_ATTRIBUTE.to_string(),
            "UNSUPPORTED_ATTRIBUTE (0x86)"
        );
        assert_eq!(Status(0x42).to_string(), "status 0x42");
        assert!(Status::SUCCESS.is_success());
        assert!(!Status::FAILURE.is_success());
    }

    #[test]
    fn test_frame_type_for_kind() {
        assert_eq!(OperationKind::Read.frame_type(), FrameType::Foundation);
        assert_eq!(OperationKind::Write.frame_type(), FrameType::Foundation);
        assert_eq!(OperationKind::Command.frame_type(), FrameType::Functional);
    }

    #[test]
    fn test_data_type_wire_names() {
        assert_eq!(serde_json::to_string(&DataType::OctetStr).unwrap(), "\"octetStr\"");
        assert_eq!(serde_json::to_string(&DataType::Uint16).unwrap(), "\"uint16\"");
        assert_eq!(DataType::Enum8.id(), 0x30);
    }
}

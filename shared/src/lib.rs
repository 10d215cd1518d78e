//! Ubisys Shared Protocol Types
//!
//! This crate provides the ZCL vocabulary, the attribute registry and the
//! bridge frame codec shared by the configuration bridge and its tests.

pub mod codec;
pub mod registry;
pub mod state_machine;
pub mod zcl;

use std::time::{SystemTime, UNIX_EPOCH};

pub use registry::{AttributeDescriptor, AttributeRegistry, CommandDescriptor, RegistryError};
pub use zcl::{DataType, FrameType, OperationKind, Status};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Timing parameters for device pipelines
pub mod timing {
    /// Pause after every device operation before the next one is sent.
    /// Mesh end-devices drop commands that arrive back-to-back.
    pub const SETTLE_DELAY_MS: u64 = 500;

    /// Default time to wait for a device response frame
    pub const RESPONSE_TIMEOUT_MS: u64 = 10_000;

    /// Default motor speed used to convert durations into step counts
    pub const DEFAULT_STEPS_PER_SECOND: f64 = 50.0;
}

/// Ubisys vendor constants
pub mod ubisys {
    /// Manufacturer name reported in the basic cluster
    pub const MANUFACTURER_NAME: &str = "ubisys";

    /// Manufacturer code for ubisys-specific attributes
    pub const MANUFACTURER_CODE: u16 = 0x10F2;

    /// Endpoint hosting the device setup cluster
    pub const DEVICE_SETUP_ENDPOINT: u8 = 232;
}

//! Message bus connection
//!
//! This module handles:
//! - The persistent MQTT session with automatic reconnection
//! - Re-subscribing to the bridge topics after every reconnect
//! - Publishing outbound messages on the shared client

mod manager;

pub use manager::{ConnectionEvent, ConnectionManager};

//! Transport trait abstraction for pluggable device and bus backends

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use ubisys_shared::codec::{CodecError, ZclRequest, ZclResponse};

/// Errors raised while talking to a device
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("no response to transaction {transaction} within {timeout_ms}ms")]
    Timeout { transaction: u64, timeout_ms: u64 },

    #[error("transport closed")]
    Closed,

    #[error("publish failed: {0}")]
    Publish(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Sends one request to a device and waits for its response
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Deliver the request and return the device's answer
    async fn publish(&self, request: ZclRequest) -> Result<ZclResponse, TransportError>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}

/// Publishes raw messages on the bus
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()>;
}

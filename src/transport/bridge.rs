//! Device transport over the mesh coordinator's MQTT request channel
//!
//! Requests are published to `<base>/bridge/request/zcl` with a transaction
//! id. The coordinator answers on `<base>/bridge/response/zcl`; answers are
//! routed back to the waiting caller by transaction id.

use super::traits::{DeviceTransport, MessagePublisher, TransportError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};
use ubisys_shared::codec::{self, ZclRequest, ZclResponse};

/// Device transport backed by the bus
pub struct BridgeTransport {
    publisher: Arc<dyn MessagePublisher>,
    request_topic: String,
    timeout: Duration,
    transaction: AtomicU64,
    /// Callers waiting for a response, by transaction id
    pending: Mutex<HashMap<u64, oneshot::Sender<ZclResponse>>>,
}

impl BridgeTransport {
    pub fn new(
        publisher: Arc<dyn MessagePublisher>,
        request_topic: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            publisher,
            request_topic: request_topic.into(),
            timeout,
            transaction: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn next_transaction(&self) -> u64 {
        self.transaction.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Route a raw response message to its waiting caller
    pub async fn handle_response(&self, raw: &[u8]) {
        let response: ZclResponse = match codec::decode(raw) {
            Ok(response) => response,
            Err(e) => {
                warn!("[BRIDGE] Dropping undecodable response: {}", e);
                return;
            }
        };

        let waiter = self.pending.lock().await.remove(&response.transaction);
        match waiter {
            Some(tx) => {
                // The caller may have timed out in the meantime
                let _ = tx.send(response);
            }
            None => {
                debug!(
                    "[BRIDGE] Response for unknown transaction {}",
                    response.transaction
                );
            }
        }
    }

    /// Number of requests still waiting for a response
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[async_trait]
impl DeviceTransport for BridgeTransport {
    async fn publish(&self, mut request: ZclRequest) -> Result<ZclResponse, TransportError> {
        let transaction = self.next_transaction();
        request.transaction = transaction;
        let encoded = codec::encode(&request)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(transaction, tx);

        debug!(
            "[BRIDGE] tx={} {} {} -> {}",
            transaction,
            request.payload.kind(),
            request.cluster_name,
            request.device
        );

        if let Err(e) = self.publisher.publish(&self.request_topic, encoded).await {
            self.pending.lock().await.remove(&transaction);
            return Err(TransportError::Publish(e.to_string()));
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&transaction);
                Err(TransportError::Timeout {
                    transaction,
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }

    fn name(&self) -> &'static str {
        "mqtt-bridge"
    }
}

//! Request outcomes and read-back reports

use crate::command::handlers::Action;
use crate::command::ResultAccumulator;
use crate::error::RequestError;
use crate::topics::TopicLayout;
use crate::transport::MessagePublisher;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use ubisys_shared::codec;

/// Outcome published on the response channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestOutcome {
    pub status: &'static str,
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    /// The device may have been left partially configured
    pub partial: bool,
    pub processing_time_ms: u64,
}

impl RequestOutcome {
    pub fn ok(action: Action, processing_time_ms: u64) -> Self {
        Self {
            status: "ok",
            action: action.suffix(),
            error: None,
            kind: None,
            partial: false,
            processing_time_ms,
        }
    }

    pub fn failed(action: Action, error: &RequestError, processing_time_ms: u64) -> Self {
        Self {
            status: "error",
            action: action.suffix(),
            error: Some(error.to_string()),
            kind: Some(error.kind()),
            partial: error.is_partial(),
            processing_time_ms,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Where request outcomes and read-back results go
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Publish the outcome of a request
    async fn respond(&self, friendly_name: &str, action: Action, outcome: &RequestOutcome)
        -> Result<()>;

    /// Publish values read from a device
    async fn report(&self, friendly_name: &str, results: &ResultAccumulator) -> Result<()>;
}

/// Report sink publishing on the bus
pub struct MqttReporter {
    publisher: Arc<dyn MessagePublisher>,
    topics: TopicLayout,
}

impl MqttReporter {
    pub fn new(publisher: Arc<dyn MessagePublisher>, topics: TopicLayout) -> Self {
        Self { publisher, topics }
    }
}

#[async_trait]
impl ReportSink for MqttReporter {
    async fn respond(
        &self,
        friendly_name: &str,
        action: Action,
        outcome: &RequestOutcome,
    ) -> Result<()> {
        let topic = self.topics.response_topic(friendly_name, action.suffix());
        self.publisher.publish(&topic, codec::encode(outcome)?).await
    }

    async fn report(&self, friendly_name: &str, results: &ResultAccumulator) -> Result<()> {
        let message = json!({
            "type": "ubisys_report",
            "friendly_name": friendly_name,
            "message": results,
        });
        self.publisher
            .publish(&self.topics.log_topic(), codec::encode(&message)?)
            .await
    }
}

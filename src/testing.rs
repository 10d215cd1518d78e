//! Test doubles shared by the unit tests

use crate::command::handlers::Action;
use crate::command::{DeviceTarget, ResultAccumulator};
use crate::device::DeviceInfo;
use crate::report::{ReportSink, RequestOutcome};
use crate::transport::{DeviceTransport, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::time::Instant;
use ubisys_shared::codec::{AttributeRecord, ZclPayload, ZclRequest, ZclResponse};
use ubisys_shared::{timing, Status};

pub fn target() -> DeviceTarget {
    DeviceTarget {
        ieee_address: "0x001fee00000012ab".into(),
        device_type: "Router".into(),
    }
}

pub fn device(friendly_name: &str, manufacturer: &str, model_id: &str) -> DeviceInfo {
    DeviceInfo {
        friendly_name: friendly_name.into(),
        ieee_address: format!(
            "0x001fee0000{:06x}",
            friendly_name.bytes().map(u32::from).sum::<u32>()
        ),
        device_type: "Router".into(),
        manufacturer: Some(manufacturer.into()),
        model_id: Some(model_id.into()),
    }
}

/// Failure injected at a given call
#[derive(Debug, Clone, Copy)]
pub enum Injected {
    /// Envelope status
    Status(Status),
    /// Status on every attribute record
    Record(Status),
    Timeout,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub request: ZclRequest,
    pub at: Instant,
}

/// Device transport that records every request and answers from a table
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    failures: HashMap<usize, Injected>,
    values: HashMap<(String, u16), Value>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `call`-th request (1-based)
    pub fn fail_at(mut self, call: usize, failure: Injected) -> Self {
        self.failures.insert(call, failure);
        self
    }

    /// Value returned when `cluster`/`id` is read; unknown reads answer 0
    pub fn with_value(mut self, cluster: &str, id: u16, value: Value) -> Self {
        self.values.insert((cluster.to_string(), id), value);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<ZclRequest> {
        self.calls().into_iter().map(|call| call.request).collect()
    }
}

#[async_trait]
impl DeviceTransport for RecordingTransport {
    async fn publish(&self, request: ZclRequest) -> Result<ZclResponse, TransportError> {
        let number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                request: request.clone(),
                at: Instant::now(),
            });
            calls.len()
        };

        let ids = match &request.payload {
            ZclPayload::Read { attributes } => attributes.clone(),
            ZclPayload::Write { attributes } => attributes.iter().map(|a| a.id).collect(),
            ZclPayload::Command { .. } => Vec::new(),
        };

        match self.failures.get(&number) {
            Some(Injected::Timeout) => {
                return Err(TransportError::Timeout {
                    transaction: number as u64,
                    timeout_ms: timing::RESPONSE_TIMEOUT_MS,
                })
            }
            Some(Injected::Status(status)) => {
                return Ok(ZclResponse {
                    transaction: number as u64,
                    status: *status,
                    records: Vec::new(),
                })
            }
            Some(Injected::Record(status)) => {
                let records = ids
                    .iter()
                    .map(|id| AttributeRecord {
                        id: *id,
                        status: *status,
                        value: None,
                    })
                    .collect();
                return Ok(ZclResponse::success(number as u64, records));
            }
            None => {}
        }

        let records = match &request.payload {
            ZclPayload::Read { attributes } => attributes
                .iter()
                .map(|id| AttributeRecord {
                    id: *id,
                    status: Status::SUCCESS,
                    value: Some(
                        self.values
                            .get(&(request.cluster_name.clone(), *id))
                            .cloned()
                            .unwrap_or(Value::from(0)),
                    ),
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(ZclResponse::success(number as u64, records))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Report sink keeping everything in memory
#[derive(Default)]
pub struct MemoryReporter {
    pub responses: Mutex<Vec<(String, Action, RequestOutcome)>>,
    pub reports: Mutex<Vec<(String, ResultAccumulator)>>,
}

impl MemoryReporter {
    pub fn responses(&self) -> Vec<(String, Action, RequestOutcome)> {
        self.responses.lock().unwrap().clone()
    }

    pub fn reports(&self) -> Vec<(String, ResultAccumulator)> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportSink for MemoryReporter {
    async fn respond(
        &self,
        friendly_name: &str,
        action: Action,
        outcome: &RequestOutcome,
    ) -> anyhow::Result<()> {
        self.responses
            .lock()
            .unwrap()
            .push((friendly_name.to_string(), action, outcome.clone()));
        Ok(())
    }

    async fn report(&self, friendly_name: &str, results: &ResultAccumulator) -> anyhow::Result<()> {
        self.reports
            .lock()
            .unwrap()
            .push((friendly_name.to_string(), results.clone()));
        Ok(())
    }
}

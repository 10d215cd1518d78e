//! Request dispatcher - turns addressed bus messages into device pipelines

use super::executor::PipelineExecutor;
use super::handlers::{self, Action, HandlerContext};
use super::operation::ResultAccumulator;
use super::payload::ConfigurationPayload;
use crate::device::{DeviceDirectory, DeviceInfo};
use crate::error::{InputError, RequestError, ResolutionError};
use crate::report::{ReportSink, RequestOutcome};
use crate::topics::TopicLayout;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use ubisys_shared::state_machine::{RequestEvent, RequestLifecycle, TransitionResult};
use ubisys_shared::{now_ms, ubisys, AttributeRegistry};

/// Handles one request at a time per device, any number of devices at once
pub struct RequestDispatcher {
    registry: Arc<AttributeRegistry>,
    directory: Arc<DeviceDirectory>,
    executor: PipelineExecutor,
    reporter: Arc<dyn ReportSink>,
    topics: TopicLayout,
    /// One lock per IEEE address
    device_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RequestDispatcher {
    pub fn new(
        registry: Arc<AttributeRegistry>,
        directory: Arc<DeviceDirectory>,
        executor: PipelineExecutor,
        reporter: Arc<dyn ReportSink>,
        topics: TopicLayout,
    ) -> Self {
        Self {
            registry,
            directory,
            executor,
            reporter,
            topics,
            device_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Handle an inbound request message.
    ///
    /// Returns the values read by the request. Every request with a known
    /// action gets an outcome published on its response topic.
    pub async fn handle(&self, topic: &str, raw: &[u8]) -> Result<ResultAccumulator, RequestError> {
        let start_time = now_ms();
        let mut lifecycle = RequestLifecycle::new();

        let (name, action) = match self.parse_topic(topic) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("[REQUEST] Ignoring {}: {}", topic, e);
                return Err(e.into());
            }
        };

        let result = self.process(&mut lifecycle, name, action, raw).await;
        let processing_time = now_ms().saturating_sub(start_time);

        let outcome = match &result {
            Ok(_) => {
                advance(&mut lifecycle, RequestEvent::PipelineSucceeded);
                info!(
                    "[REQUEST] {} {} completed ({}ms)",
                    name, action, processing_time
                );
                RequestOutcome::ok(action, processing_time)
            }
            Err(e) => {
                advance(
                    &mut lifecycle,
                    RequestEvent::Failed {
                        reason: e.to_string(),
                    },
                );
                self.log_failure(name, action, e);
                RequestOutcome::failed(action, e, processing_time)
            }
        };

        if let Err(e) = self.reporter.respond(name, action, &outcome).await {
            warn!("[REQUEST] Failed to publish response for {}: {}", name, e);
        }

        result
    }

    fn parse_topic<'t>(&self, topic: &'t str) -> Result<(&'t str, Action), InputError> {
        let (name, suffix) = self.topics.parse_request(topic)?;
        Ok((name, Action::from_suffix(suffix)?))
    }

    async fn process(
        &self,
        lifecycle: &mut RequestLifecycle,
        name: &str,
        action: Action,
        raw: &[u8],
    ) -> Result<ResultAccumulator, RequestError> {
        let payload = ConfigurationPayload::parse(raw)?;
        advance(lifecycle, RequestEvent::Accepted);

        let device = self.resolve(name, action).await?;
        advance(lifecycle, RequestEvent::DeviceResolved);

        let lock = self.device_lock(&device.ieee_address).await;
        let _guard = lock.lock().await;

        let ctx = HandlerContext {
            registry: &self.registry,
            device: &device,
        };

        let pipeline = handlers::build_pipeline(action, &ctx, &payload)?;
        advance(
            lifecycle,
            RequestEvent::PipelineBuilt {
                operations: pipeline.len(),
            },
        );

        let results = self.executor.run(pipeline).await?;

        let results = match action.read_back() {
            Some(read_back) => {
                debug!("[REQUEST] {} {} configured, reading back", name, action);
                let pipeline = handlers::build_pipeline(read_back, &ctx, &ConfigurationPayload::default())?;
                self.executor.run(pipeline).await?
            }
            None => results,
        };

        if !results.is_empty() {
            if let Err(e) = self.reporter.report(name, &results).await {
                warn!("[REQUEST] Failed to publish report for {}: {}", name, e);
            }
        }

        Ok(results)
    }

    /// Look up the device and check it may receive `action`
    async fn resolve(&self, name: &str, action: Action) -> Result<DeviceInfo, ResolutionError> {
        let device = self
            .directory
            .lookup(name)
            .await
            .ok_or_else(|| ResolutionError::NotFound(name.to_string()))?;

        let manufacturer = device.manufacturer.as_deref().unwrap_or_default();
        if manufacturer != ubisys::MANUFACTURER_NAME {
            return Err(ResolutionError::ManufacturerMismatch {
                name: name.to_string(),
                expected: ubisys::MANUFACTURER_NAME.to_string(),
                actual: manufacturer.to_string(),
            });
        }

        if let Some(prefix) = action.model_prefix() {
            let model = device.model_id.as_deref().unwrap_or_default();
            if !model.starts_with(prefix) {
                return Err(ResolutionError::ModelMismatch {
                    name: name.to_string(),
                    action: action.to_string(),
                    expected_prefix: prefix.to_string(),
                    actual: model.to_string(),
                });
            }
        }

        Ok(device)
    }

    async fn device_lock(&self, ieee_address: &str) -> Arc<Mutex<()>> {
        self.device_locks
            .lock()
            .await
            .entry(ieee_address.to_string())
            .or_default()
            .clone()
    }

    fn log_failure(&self, name: &str, action: Action, e: &RequestError) {
        match e {
            RequestError::Protocol(failure) if failure.left_partial_state() => {
                error!(
                    "[REQUEST] {} {} aborted after {} applied changes, device may be partially configured: {}",
                    name, action, failure.applied, failure
                );
            }
            _ => {
                error!("[REQUEST] {} {} failed ({}): {}", name, action, e.kind(), e);
            }
        }
    }
}

fn advance(lifecycle: &mut RequestLifecycle, event: RequestEvent) {
    match lifecycle.process_event(event) {
        TransitionResult::Success(state) => {
            debug!("[REQUEST] -> {:?}", state);
        }
        TransitionResult::Invalid { from, event } => {
            warn!("[REQUEST] Invalid transition from {:?} on {:?}", from, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{device, Injected, MemoryReporter, RecordingTransport};
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::Instant;
    use tracing_test::traced_test;
    use ubisys_shared::codec::{ZclPayload, ZclRequest};
    use ubisys_shared::Status;

    const J1_TOPIC: &str = "zigbee2mqtt/ubisys/living/blinds/configure_j1";

    struct Fixture {
        dispatcher: RequestDispatcher,
        transport: Arc<RecordingTransport>,
        reporter: Arc<MemoryReporter>,
    }

    fn fixture(transport: RecordingTransport, devices: Vec<DeviceInfo>) -> Fixture {
        let transport = Arc::new(transport);
        let reporter = Arc::new(MemoryReporter::default());
        let dispatcher = RequestDispatcher::new(
            Arc::new(AttributeRegistry::ubisys().unwrap()),
            Arc::new(DeviceDirectory::from_devices(devices)),
            PipelineExecutor::new(transport.clone()),
            reporter.clone(),
            TopicLayout::new("zigbee2mqtt", "ubisys"),
        );
        Fixture {
            dispatcher,
            transport,
            reporter,
        }
    }

    fn default_devices() -> Vec<DeviceInfo> {
        vec![
            device("living/blinds", "ubisys", "J1 (5502)"),
            device("kitchen/blinds", "ubisys", "J1-R (5602)"),
            device("hall", "ubisys", "D1 (5503)"),
            device("bulb", "IKEA of Sweden", "TRADFRI bulb E27"),
        ]
    }

    fn attribute_ids(request: &ZclRequest) -> Vec<u16> {
        match &request.payload {
            ZclPayload::Read { attributes } => attributes.clone(),
            ZclPayload::Write { attributes } => attributes.iter().map(|a| a.id).collect(),
            ZclPayload::Command { .. } => Vec::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_field_configuration_then_read_back() {
        let f = fixture(RecordingTransport::new(), default_devices());

        let results = f
            .dispatcher
            .handle(J1_TOPIC, br#"{"windowCoveringType": 8}"#)
            .await
            .unwrap();

        let requests = f.transport.requests();
        // one write followed by the read-back
        assert_eq!(requests.len(), 1 + 22);
        assert!(matches!(
            &requests[0].payload,
            ZclPayload::Write { attributes } if attributes[0].value == json!(8)
        ));
        assert!(requests[1..]
            .iter()
            .all(|r| matches!(r.payload, ZclPayload::Read { .. })));
        assert_eq!(results.len(), 22);

        let reports = f.reporter.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, "living/blinds");

        let responses = f.reporter.responses();
        assert_eq!(responses[0].1, Action::ConfigureCover);
        assert!(responses[0].2.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_calibration_request() {
        let f = fixture(RecordingTransport::new(), default_devices());
        let start = Instant::now();

        f.dispatcher
            .handle(
                J1_TOPIC,
                br#"{"calibrate": {"delay_first_open": 10, "delay_close_open": 45},
                     "lift_to_tilt_transition_ms": 1600, "steps_per_second": 50}"#,
            )
            .await
            .unwrap();

        let requests = f.transport.requests();
        // 24 operations, 5 of them waits, then the read-back
        assert_eq!(requests.len(), 19 + 22);

        let derived: Vec<_> = requests
            .iter()
            .filter_map(|r| match &r.payload {
                ZclPayload::Write { attributes } if attributes[0].id == 0x1001 || attributes[0].id == 0x1003 => {
                    Some(attributes[0].value.clone())
                }
                _ => None,
            })
            .collect();
        assert_eq!(derived, vec![json!(0xFFFF), json!(0xFFFF), json!(80), json!(80)]);

        // waits of 10 + 2 + 3 * 45 seconds plus a settle after every operation
        let expected = Duration::from_secs(10 + 2 + 3 * 45) + Duration::from_millis(500) * (24 + 22);
        assert_eq!(start.elapsed(), expected);
        assert_eq!(f.reporter.reports().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_configuration_skips_read_back() {
        let f = fixture(
            RecordingTransport::new().fail_at(2, Injected::Status(Status::INVALID_VALUE)),
            default_devices(),
        );

        let err = f
            .dispatcher
            .handle(
                J1_TOPIC,
                br#"{"windowCoveringType": 8, "configStatus": 3, "totalSteps": 100}"#,
            )
            .await
            .unwrap_err();

        assert!(err.is_partial());
        assert_eq!(f.transport.calls().len(), 2);
        assert!(f.reporter.reports().is_empty());

        let responses = f.reporter.responses();
        let outcome = &responses[0].2;
        assert_eq!(outcome.kind, Some("protocol"));
        assert!(outcome.partial);
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_partial_configuration_logged() {
        let f = fixture(
            RecordingTransport::new().fail_at(3, Injected::Timeout),
            default_devices(),
        );

        let _ = f
            .dispatcher
            .handle(
                J1_TOPIC,
                br#"{"windowCoveringType": 8, "configStatus": 3, "totalSteps": 100}"#,
            )
            .await;

        assert!(logs_contain("partially configured"));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_failure_before_any_change_is_not_partial() {
        let f = fixture(
            RecordingTransport::new().fail_at(1, Injected::Status(Status::FAILURE)),
            default_devices(),
        );

        let err = f
            .dispatcher
            .handle(J1_TOPIC, br#"{"windowCoveringType": 8}"#)
            .await
            .unwrap_err();

        assert!(!err.is_partial());
        assert!(!logs_contain("partially configured"));
    }

    #[tokio::test]
    async fn test_unknown_device() {
        let f = fixture(RecordingTransport::new(), default_devices());

        let err = f
            .dispatcher
            .handle("zigbee2mqtt/ubisys/nowhere/configure_j1", br#"{"windowCoveringType": 8}"#)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RequestError::Resolution(ResolutionError::NotFound(ref name)) if name == "nowhere"
        ));
        assert!(f.transport.calls().is_empty());
        assert_eq!(f.reporter.responses()[0].2.kind, Some("resolution"));
    }

    #[tokio::test]
    async fn test_foreign_manufacturer_rejected() {
        let f = fixture(RecordingTransport::new(), default_devices());

        let err = f
            .dispatcher
            .handle("zigbee2mqtt/ubisys/bulb/configure_device_setup", br#"{"input_configurations": [0]}"#)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RequestError::Resolution(ResolutionError::ManufacturerMismatch { .. })
        ));
        assert!(f.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_model_prefix_checked() {
        let f = fixture(RecordingTransport::new(), default_devices());

        let err = f
            .dispatcher
            .handle("zigbee2mqtt/ubisys/hall/get_j1", b"")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RequestError::Resolution(ResolutionError::ModelMismatch { ref expected_prefix, .. }) if expected_prefix == "J1"
        ));
        assert!(f.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_rejected() {
        let f = fixture(RecordingTransport::new(), default_devices());

        let err = f
            .dispatcher
            .handle(J1_TOPIC, br#"{"windowCoveringType": "#)
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::Input(InputError::MalformedJson(_))));
        assert!(f.transport.calls().is_empty());
        assert_eq!(f.reporter.responses()[0].2.kind, Some("input"));
    }

    #[tokio::test]
    async fn test_unknown_action_not_answered() {
        let f = fixture(RecordingTransport::new(), default_devices());

        let err = f
            .dispatcher
            .handle("zigbee2mqtt/ubisys/living/blinds/reboot", b"{}")
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::Input(InputError::UnknownAction(_))));
        assert!(f.reporter.responses().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_back_failure_aborts_remaining_reads() {
        let f = fixture(
            RecordingTransport::new().fail_at(3, Injected::Record(Status::UNSUPPORTED_ATTRIBUTE)),
            default_devices(),
        );

        let err = f
            .dispatcher
            .handle("zigbee2mqtt/ubisys/hall/get_d1", b"")
            .await
            .unwrap_err();

        let RequestError::Protocol(failure) = err else {
            panic!("expected a protocol failure");
        };
        assert_eq!(failure.step, 3);
        assert_eq!(failure.partial.len(), 2);
        assert_eq!(f.transport.calls().len(), 3);
        assert!(f.reporter.reports().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_device_requests_are_serialized() {
        let f = fixture(RecordingTransport::new(), default_devices());

        let (first, second) = tokio::join!(
            f.dispatcher
                .handle(J1_TOPIC, br#"{"windowCoveringType": 8, "configStatus": 3}"#),
            f.dispatcher
                .handle(J1_TOPIC, br#"{"installedOpenLimitLiftCm": 5}"#),
        );
        first.unwrap();
        second.unwrap();

        let requests = f.transport.requests();
        assert_eq!(requests.len(), (2 + 22) + (1 + 22));
        assert_eq!(attribute_ids(&requests[0]), vec![0x0000]);
        assert_eq!(attribute_ids(&requests[1]), vec![0x0007]);
        assert_eq!(attribute_ids(&requests[24]), vec![0x0010]);
        assert!(matches!(requests[24].payload, ZclPayload::Write { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_devices_run_concurrently() {
        let f = fixture(RecordingTransport::new(), default_devices());
        let start = Instant::now();

        let (first, second) = tokio::join!(
            f.dispatcher.handle(J1_TOPIC, br#"{"windowCoveringType": 8}"#),
            f.dispatcher.handle(
                "zigbee2mqtt/ubisys/kitchen/blinds/configure_j1",
                br#"{"windowCoveringType": 0}"#
            ),
        );
        first.unwrap();
        second.unwrap();

        let calls = f.transport.calls();
        assert_eq!(calls[0].at, start);
        assert_eq!(calls[1].at, start);
        assert_ne!(calls[0].request.device, calls[1].request.device);
    }
}

//! Pipeline executor - runs an operation list strictly in order

use super::operation::{Operation, OperationList, ResultAccumulator};
use crate::error::{PipelineFailure, ProtocolError};
use crate::transport::DeviceTransport;
use std::sync::Arc;
use tracing::debug;

/// Runs operation lists against a device transport
///
/// Each operation is issued only after the previous one (including its settle
/// delay) has finished. The first failure aborts the list; nothing after the
/// failing step is sent.
pub struct PipelineExecutor {
    transport: Arc<dyn DeviceTransport>,
}

impl PipelineExecutor {
    pub fn new(transport: Arc<dyn DeviceTransport>) -> Self {
        Self { transport }
    }

    /// Execute every operation and collect the values that were read
    pub async fn run(&self, pipeline: OperationList) -> Result<ResultAccumulator, PipelineFailure> {
        let total = pipeline.len();
        let mut results = ResultAccumulator::default();
        let mut applied = 0;

        debug!(
            "[PIPELINE] Running {} operations via {}",
            total,
            self.transport.name()
        );

        for (index, operation) in pipeline.into_iter().enumerate() {
            let step = index + 1;
            debug!("[PIPELINE] {}/{} {}", step, total, operation);

            if let Err(source) = self.execute(&operation, &mut results).await {
                return Err(PipelineFailure {
                    step,
                    total,
                    operation: operation.to_string(),
                    source,
                    applied,
                    partial: results,
                });
            }

            if operation.is_mutation() {
                applied += 1;
            }

            tokio::time::sleep(operation.settle()).await;
        }

        Ok(results)
    }

    async fn execute(
        &self,
        operation: &Operation,
        results: &mut ResultAccumulator,
    ) -> Result<(), ProtocolError> {
        if let Operation::Wait { duration, .. } = operation {
            tokio::time::sleep(*duration).await;
            return Ok(());
        }

        let Some(request) = operation.request() else {
            return Ok(());
        };

        let response = self.transport.publish(request).await?;

        if let Some((attribute, status)) = response.first_failure() {
            return Err(ProtocolError::Status { status, attribute });
        }

        if let Operation::Read {
            access, attribute, ..
        } = operation
        {
            let record = response
                .records
                .into_iter()
                .find(|record| record.id == attribute.id)
                .ok_or(ProtocolError::MissingRecord(attribute.id))?;

            results.insert(
                &access.cluster,
                &attribute.name,
                record.value.unwrap_or(serde_json::Value::Null),
            );
        }

        Ok(())
    }
}

//! Polling loop that drives a remote job to a terminal state.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::config::{AirbyteConfig, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT};
use crate::errors::{AirbyteError, AirbyteResult};
use crate::resilience::{ExecuteOptions, RequestExecutor};
use crate::types::{LogicalOperation, StatusUpdate, SyncJob, SyncJobRecord};

/// Polling cadence and budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Pause between status fetches.
    pub interval: Duration,
    /// Wall-clock budget for one `wait` call.
    pub timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl PollerConfig {
    /// Creates a poller configuration from client configuration.
    pub fn from_config(config: &AirbyteConfig) -> Self {
        Self {
            interval: config.poll_interval,
            timeout: config.poll_timeout,
        }
    }
}

/// Repeatedly fetches a job's status until it succeeds or fails.
#[derive(Debug, Clone)]
pub struct CompletionPoller {
    executor: Arc<RequestExecutor>,
    config: PollerConfig,
}

impl CompletionPoller {
    /// Creates a poller over a shared executor.
    pub fn new(executor: Arc<RequestExecutor>, config: PollerConfig) -> Self {
        Self { executor, config }
    }

    /// Returns the polling configuration.
    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Polls `status_operation` until `record` reaches a terminal status.
    ///
    /// Status is always fetched uncached. `extract` turns each response into
    /// a [`StatusUpdate`]; [`StatusUpdate::from_response`] fits the Airbyte
    /// job payload.
    ///
    /// # Errors
    ///
    /// Returns [`AirbyteError::PollTimeout`] once the budget is spent. The
    /// record keeps its last non-terminal status, so the caller may call
    /// `wait` again to resume. Executor and extraction errors propagate.
    pub async fn wait<F>(
        &self,
        record: &mut SyncJobRecord,
        status_operation: &LogicalOperation,
        extract: F,
    ) -> AirbyteResult<SyncJob>
    where
        F: Fn(&Value) -> AirbyteResult<StatusUpdate>,
    {
        let started = Instant::now();
        let mut iteration = 0u32;

        while !record.is_finalized() {
            let response = self
                .executor
                .execute(status_operation.clone(), ExecuteOptions::fresh())
                .await?;
            let update = extract(&response)?;
            iteration += 1;

            if record.observe(&update) {
                debug!(
                    operation_id = record.operation_id(),
                    status = %record.status(),
                    records = record.records_processed(),
                    iteration,
                    "Job status changed"
                );
            }
            if record.is_finalized() {
                break;
            }

            let elapsed = started.elapsed();
            if elapsed >= self.config.timeout {
                return Err(AirbyteError::PollTimeout {
                    operation_id: record.operation_id().to_string(),
                    elapsed,
                });
            }

            let pause = self.config.interval.min(self.config.timeout - elapsed);
            debug!(
                operation_id = record.operation_id(),
                iteration,
                pause_ms = pause.as_millis() as u64,
                "Job not finished, polling again"
            );
            tokio::time::sleep(pause).await;
        }

        Ok(record.to_sync_job())
    }
}

//! Bounded-concurrency fan-out over the request executor.

use futures::future::join_all;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::errors::AirbyteResult;
use crate::resilience::{ExecuteOptions, RequestExecutor};
use crate::types::LogicalOperation;

/// Runs many operations through a [`RequestExecutor`] in fixed-size chunks.
///
/// Each chunk runs concurrently and must finish before the next starts.
/// Results come back in input order, one per input, and a failure in one
/// item never cancels its siblings.
#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    executor: Arc<RequestExecutor>,
}

impl BatchOrchestrator {
    /// Creates an orchestrator over a shared executor.
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    /// Executes every operation with the same options.
    pub async fn run(
        &self,
        operations: Vec<LogicalOperation>,
        max_concurrency: usize,
        options: ExecuteOptions,
    ) -> Vec<AirbyteResult<Value>> {
        Self::run_with(operations, max_concurrency, |operation| {
            self.executor.execute(operation, options)
        })
        .await
    }

    /// Applies `f` to every item, at most `max_concurrency` at a time.
    ///
    /// A `max_concurrency` of zero is treated as one.
    pub async fn run_with<I, T, F, Fut>(
        items: I,
        max_concurrency: usize,
        mut f: F,
    ) -> Vec<AirbyteResult<T>>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = AirbyteResult<T>>,
    {
        let chunk_size = max_concurrency.max(1);
        let mut items = items.into_iter();
        let mut results = Vec::new();
        let mut chunk_index = 0usize;

        loop {
            let chunk: Vec<Fut> = items.by_ref().take(chunk_size).map(&mut f).collect();
            if chunk.is_empty() {
                break;
            }

            debug!(chunk = chunk_index, size = chunk.len(), "Dispatching batch chunk");
            results.extend(join_all(chunk).await);
            chunk_index += 1;
        }

        results
    }
}

/// Success/failure counts of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Items processed.
    pub total: usize,
    /// Items that succeeded.
    pub succeeded: usize,
    /// Items that failed.
    pub failed: usize,
}

impl BatchSummary {
    /// Counts the outcomes of a batch.
    pub fn from_results<T>(results: &[AirbyteResult<T>]) -> Self {
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
        }
    }

    /// Returns true if any item failed.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AirbyteConfig;
    use crate::errors::AirbyteError;
    use crate::mocks::{MockResponse, MockTransport};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn orchestrator(transport: &Arc<MockTransport>) -> BatchOrchestrator {
        let config = AirbyteConfig::builder()
            .bearer_token("t")
            .rate_limit_per_second(1000)
            .build()
            .unwrap();
        BatchOrchestrator::new(Arc::new(RequestExecutor::new(transport.clone(), &config)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_preserves_order_with_independent_failures() {
        let transport = Arc::new(MockTransport::new());
        transport
            .set_default("sources/get/a", MockResponse::json(json!("a")))
            .set_default("sources/get/b", MockResponse::error(400, "bad source"))
            .set_default(
                "sources/get/c",
                MockResponse::json(json!("c")).delayed(Duration::from_millis(50)),
            );
        let orchestrator = orchestrator(&transport);

        let operations = ["a", "b", "c"]
            .iter()
            .map(|id| LogicalOperation::get(format!("sources/get/{}", id)))
            .collect();
        let results = orchestrator.run(operations, 3, ExecuteOptions::write()).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), &json!("a"));
        assert!(matches!(results[1], Err(AirbyteError::Api { status: 400, .. })));
        assert_eq!(results[2].as_ref().unwrap(), &json!("c"));

        let summary = BatchSummary::from_results(&results);
        assert_eq!(summary, BatchSummary { total: 3, succeeded: 2, failed: 1 });
        assert!(summary.has_failures());
    }

    #[tokio::test]
    async fn test_run_with_bounds_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = BatchOrchestrator::run_with(0..10u32, 3, |i| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, AirbyteError>(i * 2)
            }
        })
        .await;

        let values: Vec<u32> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, (0..10).map(|i| i * 2).collect::<Vec<_>>());
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_chunk_waits_for_slowest_item() {
        let start = tokio::time::Instant::now();
        let finished_at = BatchOrchestrator::run_with([300u64, 10, 10], 2, |delay| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok::<_, AirbyteError>(start.elapsed())
        })
        .await;

        let third = finished_at[2].as_ref().unwrap();
        assert!(*third >= Duration::from_millis(310));
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_sequential() {
        let results =
            BatchOrchestrator::run_with(vec!["x", "y"], 0, |s| async move { Ok(s.len()) }).await;
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let results: Vec<AirbyteResult<()>> =
            BatchOrchestrator::run_with(Vec::<u8>::new(), 4, |_| async { Ok(()) }).await;
        assert!(results.is_empty());
    }
}

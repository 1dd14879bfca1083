//! Multi-call workflows built on the request executor: batch fan-out and
//! job completion polling.

mod batch;
mod poller;

pub use batch::{BatchOrchestrator, BatchSummary};
pub use poller::{CompletionPoller, PollerConfig};

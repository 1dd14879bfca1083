//! Airbyte API Client Library
//!
//! A resilient Rust client for the Airbyte configuration API. Every call is
//! routed through one shared request pipeline that adds response caching,
//! per-endpoint circuit breaking, rate limiting and bounded retries.
//!
//! # Features
//!
//! - **Resources**: Sources, Destinations, Connections, Workspaces
//! - **Bulk Sync**: Trigger many connection syncs with bounded concurrency
//!   and poll each job to completion
//! - **Resilience**: Retries with exponential backoff, circuit breaker, token
//!   bucket rate limiting, TTL-bounded LRU cache
//! - **Premium Features**: License-token entitlements checked on every call
//! - **Observability**: `tracing` logs and in-process metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use airbyte_client::{AirbyteClient, AirbyteConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AirbyteConfig::builder()
//!         .base_url("http://localhost:8000/api/v1")
//!         .basic_auth("airbyte", "password")
//!         .build()?;
//!     let client = AirbyteClient::new(config)?;
//!
//!     for result in client.bulk_sync(&["conn-1", "conn-2"], Some(2)).await {
//!         match result {
//!             Ok(job) => println!("{}: {}", job.connection_id, job.status),
//!             Err(e) => eprintln!("sync failed: {}", e),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod client;
pub mod config;
pub mod entitlement;
pub mod errors;
pub mod observability;
pub mod orchestration;
pub mod resilience;
pub mod services;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{AirbyteClient, AirbyteClientBuilder};
pub use config::AirbyteConfig;
pub use entitlement::{Entitlement, FeatureGate};
pub use errors::{AirbyteError, AirbyteResult};
pub use resilience::{ExecuteOptions, RequestExecutor};

// Type re-exports
pub use types::jobs::{JobStatus, SyncJob, SyncReport};
pub use types::operation::{LogicalOperation, Method};
pub use types::resources::{
    ConnectionStatus, CreateConnectionRequest, CreateDestinationRequest, CreateSourceRequest,
    UpdateSourceRequest, WorkspaceDetails, WorkspaceExport,
};

/// Mock implementations for testing.
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

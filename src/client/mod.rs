//! Airbyte API client.

use chrono::Utc;
use secrecy::ExposeSecret;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::AirbyteConfig;
use crate::entitlement::{Entitlement, FeatureGate};
use crate::errors::AirbyteResult;
use crate::observability::MetricsCollector;
use crate::orchestration::{BatchOrchestrator, CompletionPoller, PollerConfig};
use crate::resilience::{ExecuteOptions, RequestExecutor};
use crate::services::{
    status_operation, ConnectionsService, DefaultConnectionsService, DefaultDestinationsService,
    DefaultSourcesService, DefaultWorkspacesService,
};
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::types::{JobStatus, LogicalOperation, StatusUpdate, SyncJob, SyncJobRecord};

/// The main Airbyte client.
///
/// All calls share one [`RequestExecutor`], so the cache, circuit breaker
/// and rate limiter apply across services.
#[derive(Debug, Clone)]
pub struct AirbyteClient {
    config: Arc<AirbyteConfig>,
    executor: Arc<RequestExecutor>,
    feature_gate: FeatureGate,
}

impl AirbyteClient {
    /// Creates a client over the reqwest transport.
    pub fn new(config: AirbyteConfig) -> AirbyteResult<Self> {
        Self::builder().config(config).build()
    }

    /// Creates a new client builder.
    pub fn builder() -> AirbyteClientBuilder {
        AirbyteClientBuilder::new()
    }

    /// Creates a client from the environment.
    pub fn from_env() -> AirbyteResult<Self> {
        Self::new(AirbyteConfig::from_env()?)
    }

    /// Creates a client over a custom transport.
    pub fn with_transport(
        config: AirbyteConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> AirbyteResult<Self> {
        Self::builder().config(config).transport(transport).build()
    }

    /// Executes a single operation through the resilience stack.
    pub async fn execute(
        &self,
        operation: LogicalOperation,
        options: ExecuteOptions,
    ) -> AirbyteResult<Value> {
        self.executor.execute(operation, options).await
    }

    /// Executes an operation that requires a premium entitlement.
    ///
    /// The entitlement is checked before anything is sent.
    pub async fn execute_premium(
        &self,
        feature: &str,
        operation: LogicalOperation,
        options: ExecuteOptions,
    ) -> AirbyteResult<Value> {
        self.feature_gate
            .guard(feature, || self.executor.execute(operation, options))
            .await
    }

    /// Returns the sources service.
    pub fn sources(&self) -> DefaultSourcesService {
        DefaultSourcesService::new(self.executor.clone())
    }

    /// Returns the destinations service.
    pub fn destinations(&self) -> DefaultDestinationsService {
        DefaultDestinationsService::new(self.executor.clone())
    }

    /// Returns the connections service.
    pub fn connections(&self) -> DefaultConnectionsService {
        DefaultConnectionsService::new(self.executor.clone())
    }

    /// Returns the workspaces service.
    pub fn workspaces(&self) -> DefaultWorkspacesService {
        DefaultWorkspacesService::new(self.executor.clone())
    }

    /// Returns a batch orchestrator sharing this client's executor.
    pub fn batch(&self) -> BatchOrchestrator {
        BatchOrchestrator::new(self.executor.clone())
    }

    /// Returns a completion poller using the configured cadence.
    pub fn poller(&self) -> CompletionPoller {
        CompletionPoller::new(self.executor.clone(), PollerConfig::from_config(&self.config))
    }

    /// Returns the feature gate.
    pub fn feature_gate(&self) -> &FeatureGate {
        &self.feature_gate
    }

    /// Returns the shared executor.
    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }

    /// Returns the metrics collector.
    pub fn metrics(&self) -> &dyn MetricsCollector {
        self.executor.metrics().as_ref()
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &AirbyteConfig {
        &self.config
    }

    /// Checks that the API answers. Errors are logged, not returned.
    pub async fn health_check(&self) -> bool {
        match self
            .executor
            .execute(LogicalOperation::get("health"), ExecuteOptions::fresh())
            .await
        {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "Health check failed");
                false
            }
        }
    }

    /// Triggers a sync for every connection and waits for each to finish.
    ///
    /// At most `max_concurrent` connections are in flight at once; `None`
    /// uses the configured limit. Results are in input order and one
    /// failure does not affect the others.
    pub async fn bulk_sync<S>(
        &self,
        connection_ids: &[S],
        max_concurrent: Option<usize>,
    ) -> Vec<AirbyteResult<SyncJob>>
    where
        S: AsRef<str>,
    {
        let max_concurrent = max_concurrent.unwrap_or(self.config.max_concurrent);
        info!(
            connections = connection_ids.len(),
            max_concurrent, "Starting bulk sync"
        );

        BatchOrchestrator::run_with(
            connection_ids.iter().map(AsRef::as_ref),
            max_concurrent,
            |connection_id| self.sync_and_monitor(connection_id),
        )
        .await
    }

    /// Triggers one sync and polls the connection until the job finishes.
    pub async fn sync_and_monitor(&self, connection_id: &str) -> AirbyteResult<SyncJob> {
        let started_at = Utc::now();
        let job = self.connections().trigger_sync(connection_id).await?;
        info!(
            connection_id,
            job_id = %job["jobId"],
            "Sync triggered"
        );

        let mut record = SyncJobRecord::with_start_time(connection_id, started_at);
        let result = self
            .poller()
            .wait(
                &mut record,
                &status_operation(connection_id),
                connection_sync_update,
            )
            .await;

        match &result {
            Ok(job) => info!(
                connection_id,
                status = %job.status,
                records = job.records_synced,
                "Sync finished"
            ),
            Err(e) => error!(connection_id, error = %e, "Sync did not complete"),
        }
        result
    }
}

/// Reads sync progress from a `connections/get` response.
///
/// The latest job status wins over the top-level status. A status that is
/// not a job status (e.g. `active`) means the sync is still running.
fn connection_sync_update(response: &Value) -> AirbyteResult<StatusUpdate> {
    let latest = response.get("latestStatus").or_else(|| response.get("latest_status"));

    let status = [latest.and_then(|l| l.get("status")), response.get("status")]
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find_map(|s| s.parse::<JobStatus>().ok())
        .unwrap_or(JobStatus::Running);

    let records_processed = [latest, Some(response)]
        .into_iter()
        .flatten()
        .find_map(|v| {
            v.get("recordsSynced")
                .or_else(|| v.get("records_synced"))
                .and_then(Value::as_u64)
        });

    Ok(StatusUpdate {
        status,
        records_processed,
    })
}

/// Builder for the Airbyte client.
#[derive(Default)]
pub struct AirbyteClientBuilder {
    config: Option<AirbyteConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
    metrics: Option<Arc<dyn MetricsCollector>>,
    entitlement: Option<Entitlement>,
}

impl AirbyteClientBuilder {
    /// Creates a new client builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration. Without one, `build` reads the environment.
    pub fn config(mut self, config: AirbyteConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the metrics collector.
    pub fn metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sets the entitlement directly instead of reading a license token.
    pub fn entitlement(mut self, entitlement: Entitlement) -> Self {
        self.entitlement = Some(entitlement);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or when a configured license token
    /// cannot be verified.
    pub fn build(self) -> AirbyteResult<AirbyteClient> {
        let config = match self.config {
            Some(config) => config,
            None => AirbyteConfig::from_env()?,
        };

        let entitlement = match self.entitlement {
            Some(entitlement) => entitlement,
            None => match config.license() {
                Some((token, secret)) => Entitlement::from_license_token(
                    token.expose_secret(),
                    secret.expose_secret(),
                )?,
                None => Entitlement::community(),
            },
        };

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::from_config(&config)?),
        };

        let mut executor = RequestExecutor::new(transport, &config);
        if let Some(metrics) = self.metrics {
            executor = executor.with_metrics(metrics);
        }

        Ok(AirbyteClient {
            config: Arc::new(config),
            executor: Arc::new(executor),
            feature_gate: FeatureGate::new(entitlement),
        })
    }
}

impl std::fmt::Debug for AirbyteClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirbyteClientBuilder")
            .field("config", &self.config)
            .field("transport", &self.transport.is_some())
            .field("metrics", &self.metrics.is_some())
            .field("entitlement", &self.entitlement)
            .finish()
    }
}

//! Connections service.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{decode, to_params};
use crate::errors::AirbyteResult;
use crate::resilience::{ExecuteOptions, RequestExecutor};
use crate::types::{ConnectionStatus, CreateConnectionRequest, LogicalOperation};

/// Connections service trait.
#[async_trait]
pub trait ConnectionsService: Send + Sync {
    /// Lists the connections of a workspace.
    async fn list(&self, workspace_id: &str) -> AirbyteResult<Value>;

    /// Creates a connection.
    async fn create(&self, request: CreateConnectionRequest) -> AirbyteResult<Value>;

    /// Deletes a connection.
    async fn delete(&self, connection_id: &str) -> AirbyteResult<()>;

    /// Fetches the current status of a connection. Never served from cache.
    async fn status(&self, connection_id: &str) -> AirbyteResult<ConnectionStatus>;

    /// Triggers a manual sync and returns the job payload.
    async fn trigger_sync(&self, connection_id: &str) -> AirbyteResult<Value>;
}

/// Operation that fetches a connection, used for status polling.
pub(crate) fn status_operation(connection_id: &str) -> LogicalOperation {
    LogicalOperation::post("connections/get").param("connectionId", connection_id)
}

/// Default implementation of the connections service.
#[derive(Debug, Clone)]
pub struct DefaultConnectionsService {
    executor: Arc<RequestExecutor>,
}

impl DefaultConnectionsService {
    /// Creates a new connections service.
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ConnectionsService for DefaultConnectionsService {
    async fn list(&self, workspace_id: &str) -> AirbyteResult<Value> {
        let operation =
            LogicalOperation::post("connections/list").param("workspaceId", workspace_id);
        self.executor.execute(operation, ExecuteOptions::read()).await
    }

    async fn create(&self, request: CreateConnectionRequest) -> AirbyteResult<Value> {
        let operation =
            LogicalOperation::post("connections/create").with_params(to_params(&request)?);
        self.executor.execute(operation, ExecuteOptions::write()).await
    }

    async fn delete(&self, connection_id: &str) -> AirbyteResult<()> {
        let operation =
            LogicalOperation::post("connections/delete").param("connectionId", connection_id);
        self.executor.execute(operation, ExecuteOptions::write()).await?;
        Ok(())
    }

    async fn status(&self, connection_id: &str) -> AirbyteResult<ConnectionStatus> {
        let response = self
            .executor
            .execute(status_operation(connection_id), ExecuteOptions::fresh())
            .await?;
        decode(response)
    }

    async fn trigger_sync(&self, connection_id: &str) -> AirbyteResult<Value> {
        let operation =
            LogicalOperation::post("connections/sync").param("connectionId", connection_id);
        self.executor.execute(operation, ExecuteOptions::write()).await
    }
}

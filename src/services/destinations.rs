//! Destinations service.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::to_params;
use crate::errors::AirbyteResult;
use crate::resilience::{ExecuteOptions, RequestExecutor};
use crate::types::{CreateDestinationRequest, LogicalOperation};

/// Destinations service trait.
#[async_trait]
pub trait DestinationsService: Send + Sync {
    /// Lists the destinations of a workspace.
    async fn list(&self, workspace_id: &str, limit: u32) -> AirbyteResult<Value>;

    /// Creates a destination.
    async fn create(&self, request: CreateDestinationRequest) -> AirbyteResult<Value>;
}

/// Default implementation of the destinations service.
#[derive(Debug, Clone)]
pub struct DefaultDestinationsService {
    executor: Arc<RequestExecutor>,
}

impl DefaultDestinationsService {
    /// Creates a new destinations service.
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl DestinationsService for DefaultDestinationsService {
    async fn list(&self, workspace_id: &str, limit: u32) -> AirbyteResult<Value> {
        let operation = LogicalOperation::post("destinations/list")
            .param("workspaceId", workspace_id)
            .param("limit", limit);

        self.executor.execute(operation, ExecuteOptions::read()).await
    }

    async fn create(&self, request: CreateDestinationRequest) -> AirbyteResult<Value> {
        let operation =
            LogicalOperation::post("destinations/create").with_params(to_params(&request)?);
        self.executor.execute(operation, ExecuteOptions::write()).await
    }
}

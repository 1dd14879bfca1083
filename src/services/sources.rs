//! Sources service.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::to_params;
use crate::errors::AirbyteResult;
use crate::resilience::{ExecuteOptions, RequestExecutor};
use crate::types::{CreateSourceRequest, LogicalOperation, UpdateSourceRequest};

/// Sources service trait.
#[async_trait]
pub trait SourcesService: Send + Sync {
    /// Lists the sources of a workspace.
    async fn list(&self, workspace_id: &str, limit: u32, offset: u32) -> AirbyteResult<Value>;

    /// Creates a source. The configuration must carry `api_key` and `start_date`.
    async fn create(&self, request: CreateSourceRequest) -> AirbyteResult<Value>;

    /// Updates a source. The configuration must carry `api_key` and `start_date`.
    async fn update(&self, request: UpdateSourceRequest) -> AirbyteResult<Value>;
}

/// Default implementation of the sources service.
#[derive(Debug, Clone)]
pub struct DefaultSourcesService {
    executor: Arc<RequestExecutor>,
}

impl DefaultSourcesService {
    /// Creates a new sources service.
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl SourcesService for DefaultSourcesService {
    async fn list(&self, workspace_id: &str, limit: u32, offset: u32) -> AirbyteResult<Value> {
        let operation = LogicalOperation::post("sources/list")
            .param("workspaceId", workspace_id)
            .param("includeDeleted", false)
            .param("limit", limit)
            .param("offset", offset);

        self.executor.execute(operation, ExecuteOptions::read()).await
    }

    async fn create(&self, request: CreateSourceRequest) -> AirbyteResult<Value> {
        request.validate()?;
        let operation = LogicalOperation::post("sources/create").with_params(to_params(&request)?);
        self.executor.execute(operation, ExecuteOptions::write()).await
    }

    async fn update(&self, request: UpdateSourceRequest) -> AirbyteResult<Value> {
        request.validate()?;
        let operation = LogicalOperation::post("sources/update").with_params(to_params(&request)?);
        self.executor.execute(operation, ExecuteOptions::write()).await
    }
}

//! Workspaces service.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::connections::{ConnectionsService, DefaultConnectionsService};
use super::decode;
use super::destinations::{DefaultDestinationsService, DestinationsService};
use super::sources::{DefaultSourcesService, SourcesService};
use crate::errors::AirbyteResult;
use crate::resilience::{ExecuteOptions, RequestExecutor};
use crate::types::{LogicalOperation, WorkspaceDetails, WorkspaceExport};

/// Page size used when exporting a workspace.
const EXPORT_PAGE_SIZE: u32 = 100;

/// Workspaces service trait.
#[async_trait]
pub trait WorkspacesService: Send + Sync {
    /// Fetches workspace details.
    async fn get(&self, workspace_id: &str) -> AirbyteResult<WorkspaceDetails>;

    /// Collects the sources, destinations and connections of a workspace.
    async fn export(&self, workspace_id: &str) -> AirbyteResult<WorkspaceExport>;
}

/// Default implementation of the workspaces service.
#[derive(Debug, Clone)]
pub struct DefaultWorkspacesService {
    executor: Arc<RequestExecutor>,
}

impl DefaultWorkspacesService {
    /// Creates a new workspaces service.
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl WorkspacesService for DefaultWorkspacesService {
    async fn get(&self, workspace_id: &str) -> AirbyteResult<WorkspaceDetails> {
        let operation =
            LogicalOperation::post("workspaces/get").param("workspaceId", workspace_id);
        let response = self.executor.execute(operation, ExecuteOptions::read()).await?;
        decode(response)
    }

    async fn export(&self, workspace_id: &str) -> AirbyteResult<WorkspaceExport> {
        let sources = DefaultSourcesService::new(self.executor.clone());
        let destinations = DefaultDestinationsService::new(self.executor.clone());
        let connections = DefaultConnectionsService::new(self.executor.clone());

        let (sources, destinations, connections) = futures::try_join!(
            sources.list(workspace_id, EXPORT_PAGE_SIZE, 0),
            destinations.list(workspace_id, EXPORT_PAGE_SIZE),
            connections.list(workspace_id),
        )?;

        let connections = match connections {
            Value::Object(mut body) => match body.remove("connections") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            Value::Array(items) => items,
            _ => Vec::new(),
        };

        Ok(WorkspaceExport {
            workspace_id: workspace_id.to_string(),
            sources,
            destinations,
            connections,
        })
    }
}

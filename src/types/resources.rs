//! Request and response shapes for sources, destinations, connections and workspaces.
//!
//! Payloads the client does not interpret stay as `serde_json::Value`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{AirbyteError, AirbyteResult};

/// Fields every source connection configuration must carry.
pub const REQUIRED_SOURCE_FIELDS: &[&str] = &["api_key", "start_date"];

/// Request to create a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSourceRequest {
    /// Display name.
    pub name: String,
    /// Workspace the source belongs to.
    pub workspace_id: String,
    /// Connector definition.
    pub source_definition_id: String,
    /// Connector-specific configuration.
    pub connection_configuration: Map<String, Value>,
}

impl CreateSourceRequest {
    /// Creates a new request.
    pub fn new(
        name: impl Into<String>,
        workspace_id: impl Into<String>,
        source_definition_id: impl Into<String>,
        connection_configuration: Map<String, Value>,
    ) -> Self {
        Self {
            name: name.into(),
            workspace_id: workspace_id.into(),
            source_definition_id: source_definition_id.into(),
            connection_configuration,
        }
    }

    /// Checks that the configuration carries the required fields.
    pub fn validate(&self) -> AirbyteResult<()> {
        validate_source_configuration(&self.connection_configuration)
    }
}

/// Request to update an existing source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSourceRequest {
    /// Source being updated.
    pub source_id: String,
    /// Display name.
    pub name: String,
    /// Workspace the source belongs to.
    pub workspace_id: String,
    /// Connector-specific configuration.
    pub connection_configuration: Map<String, Value>,
}

impl UpdateSourceRequest {
    /// Checks that the configuration carries the required fields.
    pub fn validate(&self) -> AirbyteResult<()> {
        validate_source_configuration(&self.connection_configuration)
    }
}

fn validate_source_configuration(config: &Map<String, Value>) -> AirbyteResult<()> {
    let missing: Vec<&str> = REQUIRED_SOURCE_FIELDS
        .iter()
        .copied()
        .filter(|field| !config.contains_key(*field))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AirbyteError::validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}

/// Request to create a destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDestinationRequest {
    /// Display name.
    pub name: String,
    /// Workspace the destination belongs to.
    pub workspace_id: String,
    /// Connector definition.
    pub destination_definition_id: String,
    /// Connector-specific configuration.
    pub connection_configuration: Map<String, Value>,
}

/// Request to create a connection between a source and a destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConnectionRequest {
    /// Workspace the connection belongs to.
    pub workspace_id: String,
    /// Display name.
    pub name: String,
    /// Source side.
    pub source_id: String,
    /// Destination side.
    pub destination_id: String,
    /// Namespace handling, e.g. `source` or `destination`.
    pub namespace_definition: String,
    /// Additional connection settings passed through verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Status of a connection including its latest sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Connection or latest job status.
    pub status: String,
    /// When the last sync ran.
    #[serde(default, alias = "lastSync")]
    pub last_sync: Option<DateTime<Utc>>,
    /// Raw latest-status payload.
    #[serde(default, alias = "latestStatus")]
    pub latest_status: Map<String, Value>,
}

/// Workspace details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceDetails {
    /// Workspace identifier.
    #[serde(alias = "workspaceId")]
    pub workspace_id: String,
    /// Display name.
    pub name: String,
    /// Raw settings.
    #[serde(default)]
    pub settings: Map<String, Value>,
}

/// Snapshot of a workspace's configuration for export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceExport {
    /// Workspace identifier.
    pub workspace_id: String,
    /// Sources as returned by the API.
    pub sources: Value,
    /// Destinations as returned by the API.
    pub destinations: Value,
    /// Connections as returned by the API.
    pub connections: Vec<Value>,
}

impl WorkspaceExport {
    /// Renders the export as YAML.
    pub fn to_yaml(&self) -> AirbyteResult<String> {
        serde_yaml::to_string(self).map_err(|e| AirbyteError::Serialization {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_source_validation_requires_api_key_and_start_date() {
        let ok = CreateSourceRequest::new(
            "stripe",
            "ws-1",
            "def-1",
            config(json!({"api_key": "k", "start_date": "2024-01-01"})),
        );
        assert!(ok.validate().is_ok());

        let missing = CreateSourceRequest::new("stripe", "ws-1", "def-1", config(json!({"api_key": "k"})));
        let err = missing.validate().unwrap_err();
        assert!(matches!(err, AirbyteError::Validation { .. }));
        assert!(err.to_string().contains("start_date"));
    }

    #[test]
    fn test_create_source_serializes_camel_case() {
        let request = CreateSourceRequest::new(
            "stripe",
            "ws-1",
            "def-1",
            config(json!({"api_key": "k", "start_date": "2024-01-01"})),
        );
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["workspaceId"], "ws-1");
        assert_eq!(value["sourceDefinitionId"], "def-1");
        assert_eq!(value["connectionConfiguration"]["api_key"], "k");
    }

    #[test]
    fn test_connection_request_flattens_extra_settings() {
        let request = CreateConnectionRequest {
            workspace_id: "ws-1".to_string(),
            name: "orders".to_string(),
            source_id: "src-1".to_string(),
            destination_id: "dst-1".to_string(),
            namespace_definition: "source".to_string(),
            extra: config(json!({"status": "active"})),
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["namespaceDefinition"], "source");
        assert_eq!(value["status"], "active");
    }

    #[test]
    fn test_connection_status_accepts_camel_case() {
        let status: ConnectionStatus = serde_json::from_value(json!({
            "status": "running",
            "lastSync": "2024-01-01T00:00:00Z",
            "latestStatus": {}
        }))
        .unwrap();

        assert_eq!(status.status, "running");
        assert!(status.last_sync.is_some());
    }

    #[test]
    fn test_workspace_export_yaml() {
        let export = WorkspaceExport {
            workspace_id: "ws-1".to_string(),
            sources: json!([{"name": "stripe"}]),
            destinations: json!([]),
            connections: Vec::new(),
        };
        let yaml = export.to_yaml().unwrap();

        assert!(yaml.contains("workspace_id: ws-1"));
        assert!(yaml.contains("name: stripe"));
    }
}

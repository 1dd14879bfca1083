//! Service implementations for the Airbyte API resources.
//!
//! Every service call is expressed as a [`LogicalOperation`] and goes through
//! the shared [`RequestExecutor`](crate::resilience::RequestExecutor).
//!
//! [`LogicalOperation`]: crate::types::LogicalOperation

mod connections;
mod destinations;
mod sources;
mod workspaces;

pub use connections::{ConnectionsService, DefaultConnectionsService};
pub(crate) use connections::status_operation;
pub use destinations::{DefaultDestinationsService, DestinationsService};
pub use sources::{DefaultSourcesService, SourcesService};
pub use workspaces::{DefaultWorkspacesService, WorkspacesService};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::{AirbyteError, AirbyteResult};

/// Serializes a request struct into operation parameters.
pub(crate) fn to_params<T: Serialize>(request: &T) -> AirbyteResult<Map<String, Value>> {
    match serde_json::to_value(request)? {
        Value::Object(map) => Ok(map),
        other => Err(AirbyteError::Serialization {
            message: format!("Expected a JSON object, got {}", other),
        }),
    }
}

/// Decodes a response body into a typed value.
pub(crate) fn decode<T: DeserializeOwned>(response: Value) -> AirbyteResult<T> {
    Ok(serde_json::from_value(response)?)
}

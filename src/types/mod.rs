//! Type definitions for the Airbyte client.

pub mod jobs;
pub mod operation;
pub mod resources;

pub use jobs::{JobStatus, StatusUpdate, SyncJob, SyncJobRecord, SyncReport, SyncReportRow};
pub use operation::{LogicalOperation, Method, RequestSignature};
pub use resources::{
    ConnectionStatus, CreateConnectionRequest, CreateDestinationRequest, CreateSourceRequest,
    UpdateSourceRequest, WorkspaceDetails, WorkspaceExport,
};

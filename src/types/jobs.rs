//! Sync job records and status tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::errors::{AirbyteError, AirbyteResult};

/// Lifecycle status of a remote sync job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted but not started.
    Pending,
    /// Running.
    Running,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error.
    Failed,
}

impl JobStatus {
    /// Returns true for `Succeeded` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Returns the lowercase status name.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = AirbyteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "running" | "incomplete" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" | "cancelled" => Ok(JobStatus::Failed),
            other => Err(AirbyteError::Serialization {
                message: format!("Unknown job status: {}", other),
            }),
        }
    }
}

/// One observation of a remote job's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Observed status.
    pub status: JobStatus,
    /// Records processed so far, if reported.
    pub records_processed: Option<u64>,
}

impl StatusUpdate {
    /// Creates an update with no record count.
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            records_processed: None,
        }
    }

    /// Extracts an update from a status response body.
    ///
    /// Reads `status` and either `recordsSynced` or `records_synced`.
    pub fn from_response(response: &Value) -> AirbyteResult<Self> {
        let status = response
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| AirbyteError::Serialization {
                message: "Status response has no 'status' field".to_string(),
            })?
            .parse::<JobStatus>()?;

        let records_processed = response
            .get("recordsSynced")
            .or_else(|| response.get("records_synced"))
            .and_then(Value::as_u64);

        Ok(Self {
            status,
            records_processed,
        })
    }
}

/// Mutable tracking record for a long-running remote job.
///
/// Once the status is terminal the record is frozen: further observations
/// are ignored. `finished_at` is set exactly when the status is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJobRecord {
    operation_id: String,
    status: JobStatus,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    records_processed: u64,
}

impl SyncJobRecord {
    /// Creates a pending record started now.
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self::with_start_time(operation_id, Utc::now())
    }

    /// Creates a pending record with an explicit start time.
    pub fn with_start_time(operation_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            operation_id: operation_id.into(),
            status: JobStatus::Pending,
            started_at,
            finished_at: None,
            records_processed: 0,
        }
    }

    /// Applies an observation. Returns true if the record changed.
    pub fn observe(&mut self, update: &StatusUpdate) -> bool {
        if self.is_finalized() {
            return false;
        }

        let mut changed = false;
        if let Some(records) = update.records_processed {
            if records != self.records_processed {
                self.records_processed = records;
                changed = true;
            }
        }
        if update.status != self.status {
            self.status = update.status;
            changed = true;
            if update.status.is_terminal() {
                self.finished_at = Some(Utc::now().max(self.started_at));
            }
        }
        changed
    }

    /// Returns true once a terminal status has been observed.
    pub fn is_finalized(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns the job identifier.
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// Returns the current status.
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Returns when tracking started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns when the job reached a terminal state.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Returns the number of records processed.
    pub fn records_processed(&self) -> u64 {
        self.records_processed
    }

    /// Converts to the exported record shape.
    pub fn to_sync_job(&self) -> SyncJob {
        SyncJob {
            connection_id: self.operation_id.clone(),
            status: self.status,
            start_time: self.started_at,
            end_time: self.finished_at,
            records_synced: self.records_processed,
        }
    }
}

/// Exported sync job shape consumed by reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    /// Connection that was synced.
    pub connection_id: String,
    /// Final or current status.
    pub status: JobStatus,
    /// When the sync was started.
    pub start_time: DateTime<Utc>,
    /// When the sync finished; present iff the status is terminal.
    pub end_time: Option<DateTime<Utc>>,
    /// Records synced.
    pub records_synced: u64,
}

impl SyncJob {
    /// Duration in seconds, if the job has finished.
    pub fn duration_seconds(&self) -> Option<f64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds() as f64 / 1000.0)
    }
}

impl From<&SyncJobRecord> for SyncJob {
    fn from(record: &SyncJobRecord) -> Self {
        record.to_sync_job()
    }
}

/// One row of a sync report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReportRow {
    /// Connection identifier.
    pub connection_id: String,
    /// Outcome label: a job status or `error`.
    pub status: String,
    /// Duration in seconds, when known.
    pub duration_seconds: Option<f64>,
    /// Records synced.
    pub records_synced: u64,
    /// Error message for failed items.
    pub error: Option<String>,
}

/// Tabular summary of a bulk sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    /// Report rows, in input order.
    pub rows: Vec<SyncReportRow>,
}

impl SyncReport {
    /// Builds a report from bulk sync results paired with their connection ids.
    pub fn from_results<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a AirbyteResult<SyncJob>)>,
    {
        let rows = results
            .into_iter()
            .map(|(connection_id, result)| match result {
                Ok(job) => SyncReportRow {
                    connection_id: job.connection_id.clone(),
                    status: job.status.to_string(),
                    duration_seconds: job.duration_seconds(),
                    records_synced: job.records_synced,
                    error: None,
                },
                Err(err) => SyncReportRow {
                    connection_id: connection_id.to_string(),
                    status: "error".to_string(),
                    duration_seconds: None,
                    records_synced: 0,
                    error: Some(err.to_string()),
                },
            })
            .collect();

        Self { rows }
    }

    /// Number of rows that are errors or failed jobs.
    pub fn failure_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| row.error.is_some() || row.status == JobStatus::Failed.as_str())
            .count()
    }
}

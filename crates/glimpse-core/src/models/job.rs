use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

/// Metadata key holding the failure message of a failed job
pub const ERROR_KEY: &str = "error";
/// Metadata key holding a non-fatal callback delivery failure
pub const CALLBACK_ERROR_KEY: &str = "callback_error";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// State of one pipeline execution as seen by the job-status surface.
///
/// The orchestrator is the only writer while the job runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub status: JobStatus,
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Running,
            metadata: Map::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
        self.updated_at = Utc::now();
    }

    /// Merge the entries of a JSON object into the metadata; later keys overwrite earlier ones.
    /// Non-object values are ignored.
    pub fn merge_metadata(&mut self, value: Value) {
        if let Value::Object(entries) = value {
            self.metadata.extend(entries);
            self.updated_at = Utc::now();
        }
    }

    pub fn mark_succeeded(&mut self) {
        self.status = JobStatus::Succeeded;
        self.updated_at = Utc::now();
    }

    /// Move the job to `failed` with a human-readable message
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.metadata
            .insert(ERROR_KEY.to_string(), Value::String(message.clone()));
        self.error = Some(message);
        self.status = JobStatus::Failed;
        self.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_record_is_running() {
        let record = JobRecord::new(Uuid::new_v4());
        assert_eq!(record.status, JobStatus::Running);
        assert!(record.metadata.is_empty());
        assert!(record.error.is_none());
        assert!(!record.is_terminal());
    }

    #[test]
    fn test_mark_failed_records_error_in_both_places() {
        let mut record = JobRecord::new(Uuid::new_v4());
        record.mark_failed("file not found");
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("file not found"));
        assert_eq!(record.metadata[ERROR_KEY], json!("file not found"));
        assert!(record.is_terminal());
    }

    #[test]
    fn test_merge_metadata_overwrites_keys() {
        let mut record = JobRecord::new(Uuid::new_v4());
        record.merge_metadata(json!({"width": 1200, "height": 800}));
        record.merge_metadata(json!({"width": 750}));
        record.merge_metadata(json!("ignored"));
        assert_eq!(record.metadata["width"], json!(750));
        assert_eq!(record.metadata["height"], json!(800));
        assert_eq!(record.metadata.len(), 2);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(JobStatus::Succeeded).unwrap(),
            json!("succeeded")
        );
    }
}

use crate::error::{AppError, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use glimpse_core::{JobRecord, JobStatus};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub id: Uuid,
    pub status: JobStatus,
    pub meta: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<JobRecord> for JobStatusResponse {
    fn from(record: JobRecord) -> Self {
        Self {
            id: record.id,
            status: record.status,
            meta: record.metadata,
            error: record.error,
        }
    }
}

#[tracing::instrument(skip(state), fields(operation = "get_job"))]
pub async fn get_job(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let not_found = || AppError::NotFound(format!("Job not found: {}", id));

    let job_id = Uuid::parse_str(&id).map_err(|_| not_found())?;
    let record = state.queue.status(job_id).await.ok_or_else(not_found)?;

    Ok(Json(JobStatusResponse::from(record)))
}

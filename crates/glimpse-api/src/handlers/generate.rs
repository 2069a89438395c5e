use crate::error::{AppError, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use glimpse_core::{PipelineError, PreviewRequest};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub job_id: Uuid,
}

/// Accept a preview request and start it in the background.
///
/// Only the presence of a URL and the size bounds are checked here; everything
/// else is reported through the job record.
#[tracing::instrument(skip_all, fields(url = %request.url, operation = "generate"))]
pub async fn generate(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<PreviewRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    if request.url.trim().is_empty() {
        return Err(PipelineError::MissingUrl.into());
    }

    let max = state.config.max_preview_dimension();
    for (field, value) in [
        ("width", request.width),
        ("height", request.height),
        ("resize", request.bounding_box),
    ] {
        if let Some(value) = value.filter(|&v| v > max) {
            return Err(AppError::InvalidInput(format!(
                "{} of {} exceeds the maximum preview dimension of {}",
                field, value, max
            ))
            .into());
        }
    }

    let job_id = state.queue.submit(request).await;

    Ok((StatusCode::ACCEPTED, Json(GenerateResponse { job_id })))
}

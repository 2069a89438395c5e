use crate::error::{AppError, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use std::path::Path as FsPath;
use std::sync::Arc;

/// Content type for a served preview, by file extension
fn content_type_for(file_name: &str) -> &'static str {
    let extension = FsPath::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

#[tracing::instrument(skip(state), fields(operation = "get_preview"))]
pub async fn get_preview(
    Path(file_name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let path = state.storage.resolve_preview(&file_name).await?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read preview: {}", e)))?;

    Ok(([(header::CONTENT_TYPE, content_type_for(&file_name))], bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("abc_cover.png"), "image/png");
        assert_eq!(content_type_for("abc_cover.JPG"), "image/jpeg");
        assert_eq!(content_type_for("abc_cover.tif"), "image/tiff");
        assert_eq!(content_type_for("abc_cover"), "application/octet-stream");
    }
}

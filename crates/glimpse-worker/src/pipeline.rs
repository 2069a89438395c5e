//! Pipeline orchestration
//!
//! One [`Pipeline::run`] call is one job execution:
//! validate, retrieve, generate the preview, extract metadata, remove the
//! original, then notify the callback. Fatal errors end the job as `failed`
//! with a single message; a skipped preview, a non-fatal stage error or a
//! failed callback does not.

use glimpse_core::{
    ImageMetadata, JobRecord, JobStatus, LocalAsset, LogLevel, PipelineError, PipelineResult,
    PreviewAsset, PreviewRequest, SizingSpec, SourceReference, CALLBACK_ERROR_KEY,
};
use glimpse_processing::{Generator, PreviewOutcome};
use glimpse_services::{Fetcher, Notifier};
use glimpse_storage::LocalStorage;
use serde_json::{json, Value};
use std::path::{Component, Path};
use std::sync::Arc;
use std::time::Instant;

/// Job metadata key holding the local path of the generated preview
pub const PREVIEW_PATH_KEY: &str = "preview_path";

/// Sequences the pipeline stages for one job at a time
#[derive(Clone)]
pub struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    generator: Arc<dyn Generator>,
    notifier: Arc<dyn Notifier>,
    storage: LocalStorage,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        generator: Arc<dyn Generator>,
        notifier: Arc<dyn Notifier>,
        storage: LocalStorage,
    ) -> Self {
        Self {
            fetcher,
            generator,
            notifier,
            storage,
        }
    }

    /// Execute the pipeline, leaving `record` in a terminal state
    #[tracing::instrument(skip_all, fields(job_id = %record.id, url = %request.url))]
    pub async fn run(&self, record: &mut JobRecord, request: &PreviewRequest) {
        let start = Instant::now();

        match self.execute(record, request).await {
            Ok(()) => record.mark_succeeded(),
            Err(e) if !e.is_fatal() => {
                log_failure(&e);
                record.mark_succeeded();
            }
            Err(e) => {
                log_failure(&e);
                record.mark_failed(e.to_string());
            }
        }

        if let Some(callback_url) = request.callback() {
            if record.status != JobStatus::Failed {
                let payload = callback_payload(record);
                if let Err(e) = self.notifier.notify(callback_url, &payload).await {
                    log_failure(&e);
                    record.set_metadata(CALLBACK_ERROR_KEY, e.to_string());
                }
            }
        }

        tracing::info!(
            status = %record.status,
            duration_ms = start.elapsed().as_millis(),
            "Job finished"
        );
    }

    async fn execute(&self, record: &mut JobRecord, request: &PreviewRequest) -> PipelineResult<()> {
        let source: SourceReference = request.source();

        let validation = self.fetcher.validate(&source.url).await?;
        tracing::debug!(size_bytes = validation.size_bytes, "Source available");

        let asset = match self.fetcher.retrieve(&source, &validation).await {
            Ok(asset) => asset,
            Err(e) => {
                if let Some(partial) = e.partial_path() {
                    self.cleanup(partial).await;
                }
                return Err(e);
            }
        };

        let result = self
            .preview(record, &asset, &source, &request.sizing())
            .await;

        self.cleanup(&asset.path).await;
        result
    }

    async fn preview(
        &self,
        record: &mut JobRecord,
        asset: &LocalAsset,
        source: &SourceReference,
        spec: &SizingSpec,
    ) -> PipelineResult<()> {
        let preview = match self
            .generator
            .generate(asset, &source.declared_name, spec)
            .await
        {
            PreviewOutcome::Generated(preview) => preview,
            PreviewOutcome::Skipped { extension } => {
                tracing::info!(extension = %extension, "Preview skipped for unsupported format");
                return Ok(());
            }
            PreviewOutcome::Failed(e) if !e.is_fatal() => {
                log_failure(&e);
                return Ok(());
            }
            PreviewOutcome::Failed(e) => return Err(e),
        };

        let metadata = match self.fetcher.extract_metadata(asset).await {
            Ok(metadata) => metadata,
            Err(e) => {
                self.cleanup(&preview.path).await;
                return Err(e);
            }
        };

        let reference = self.storage.download_reference(&preview.path);
        record.merge_metadata(result_metadata(&metadata, &preview, reference));
        Ok(())
    }

    /// Remove the preview a finished job left under the preview root
    pub async fn release(&self, record: &JobRecord) {
        let Some(path) = record
            .metadata
            .get(PREVIEW_PATH_KEY)
            .and_then(Value::as_str)
            .map(Path::new)
        else {
            return;
        };

        let contained = path.starts_with(self.storage.preview_root())
            && !path.components().any(|c| matches!(c, Component::ParentDir));
        if contained {
            self.cleanup(path).await;
        } else {
            tracing::warn!(job_id = %record.id, path = %path.display(), "Preview path outside the preview root; not removed");
        }
    }

    /// Best-effort removal; failures are logged and never replace the job outcome
    async fn cleanup(&self, path: &Path) {
        if let Err(e) = self.fetcher.cleanup(path).await {
            log_failure(&e);
        }
    }
}

/// Job metadata for a generated preview
fn result_metadata(
    metadata: &ImageMetadata,
    preview: &PreviewAsset,
    reference: Option<String>,
) -> Value {
    let mut value = json!({
        "width": preview.width,
        "height": preview.height,
        "source_width": metadata.width,
        "source_height": metadata.height,
        "content_hash": metadata.content_hash,
        "exif": metadata.exif,
        "xmp": metadata.xmp,
        PREVIEW_PATH_KEY: preview.path.display().to_string(),
        "preview_format": preview.format,
        "preview_download_reference": reference,
    });

    if let Value::Object(map) = &mut value {
        if let Some(created) = &metadata.created {
            map.insert("created".to_string(), json!(created));
        }
        if let Some(modified) = &metadata.modified {
            map.insert("modified".to_string(), json!(modified));
        }
    }

    value
}

/// Callback body: the job metadata plus its id and status
fn callback_payload(record: &JobRecord) -> Value {
    let mut payload = record.metadata.clone();
    payload.insert("job_id".to_string(), json!(record.id));
    payload.insert("status".to_string(), json!(record.status));
    Value::Object(payload)
}

fn log_failure(e: &PipelineError) {
    match e.log_level() {
        LogLevel::Debug => tracing::debug!(kind = e.kind(), error = %e, "Pipeline stage failed"),
        LogLevel::Warn => tracing::warn!(kind = e.kind(), error = %e, "Pipeline stage failed"),
        LogLevel::Error => tracing::error!(kind = e.kind(), error = %e, "Pipeline stage failed"),
    }
}

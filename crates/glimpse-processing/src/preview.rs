//! Preview generation
//!
//! The generator decodes the original (first frame or flattened composite),
//! resamples it to the resolved geometry and re-encodes it into the preview
//! root. Sources with an extension outside [`SUPPORTED_EXTENSIONS`] are skipped
//! rather than failed.

use crate::metadata::psd;
use crate::resize::{resize_image, resolve_dimensions};
use async_trait::async_trait;
use glimpse_core::{
    LocalAsset, PipelineError, PipelineResult, PreviewAsset, SizingDefaults, SizingSpec,
    MAX_PREVIEW_DIMENSION,
};
use glimpse_storage::LocalStorage;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Source extensions a preview can be generated from (lower case)
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "psd", "psb", "jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff",
];

/// Result of a generation attempt
#[derive(Debug)]
pub enum PreviewOutcome {
    Generated(PreviewAsset),
    /// The source format has no preview support; not an error
    Skipped { extension: String },
    Failed(PipelineError),
}

/// Preview generation capability
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a preview of `asset` named after `output_name`
    async fn generate(
        &self,
        asset: &LocalAsset,
        output_name: &str,
        spec: &SizingSpec,
    ) -> PreviewOutcome;
}

/// Generator backed by the `image` and `psd` codecs
#[derive(Clone, Debug)]
pub struct ImagePreviewGenerator {
    storage: LocalStorage,
    defaults: SizingDefaults,
    max_dimension: u32,
}

impl ImagePreviewGenerator {
    pub fn new(storage: LocalStorage, defaults: SizingDefaults) -> Self {
        Self {
            storage,
            defaults,
            max_dimension: MAX_PREVIEW_DIMENSION,
        }
    }

    /// Cap either side of a rendered preview at `max_dimension` pixels
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    pub fn supports(extension: &str) -> bool {
        SUPPORTED_EXTENSIONS.contains(&extension)
    }

    /// Output format for a request, falling back to the configured default
    fn output_format(&self, spec: &SizingSpec) -> PipelineResult<(String, ImageFormat)> {
        let name = spec
            .format
            .as_deref()
            .unwrap_or(&self.defaults.format)
            .trim()
            .to_lowercase();

        ImageFormat::from_extension(&name)
            .filter(|format| format.writing_enabled())
            .map(|format| (name.clone(), format))
            .ok_or_else(|| PipelineError::Transform(format!("unsupported output format: {}", name)))
    }
}

#[async_trait]
impl Generator for ImagePreviewGenerator {
    #[tracing::instrument(skip_all, fields(source = %asset.path.display(), output_name = %output_name))]
    async fn generate(
        &self,
        asset: &LocalAsset,
        output_name: &str,
        spec: &SizingSpec,
    ) -> PreviewOutcome {
        let extension = asset.extension().unwrap_or_default();
        if !Self::supports(&extension) {
            tracing::debug!(extension = %extension, "No preview support for source format");
            return PreviewOutcome::Skipped { extension };
        }

        let (format_name, format) = match self.output_format(spec) {
            Ok(format) => format,
            Err(e) => return PreviewOutcome::Failed(e),
        };

        let start = Instant::now();
        let output = self.storage.preview_path(output_name, &format_name);
        let job = RenderJob {
            source: asset.path.clone(),
            extension,
            output: output.clone(),
            format,
            spec: spec.clone(),
            defaults: self.defaults.clone(),
            max_dimension: self.max_dimension,
        };

        let rendered = tokio::task::spawn_blocking(move || job.run())
            .await
            .unwrap_or_else(|e| Err(PipelineError::Transform(format!("render task failed: {}", e))));

        match rendered {
            Ok((width, height)) => {
                tracing::info!(
                    path = %output.display(),
                    width = width,
                    height = height,
                    format = %format_name,
                    duration_ms = start.elapsed().as_millis(),
                    "Preview generated"
                );
                PreviewOutcome::Generated(PreviewAsset {
                    path: output,
                    width,
                    height,
                    format: format_name,
                })
            }
            Err(e) => {
                if let Err(cleanup) = self.storage.remove(&output).await {
                    tracing::warn!(error = %cleanup, "Failed to remove partial preview");
                }
                PreviewOutcome::Failed(e)
            }
        }
    }
}

/// Blocking codec work for one preview
struct RenderJob {
    source: PathBuf,
    extension: String,
    output: PathBuf,
    format: ImageFormat,
    spec: SizingSpec,
    defaults: SizingDefaults,
    max_dimension: u32,
}

impl RenderJob {
    fn run(self) -> PipelineResult<(u32, u32)> {
        let img = decode_first_frame(&self.source, &self.extension)?;
        let geometry = resolve_dimensions(img.dimensions(), &self.spec, &self.defaults);
        tracing::debug!(geometry = %geometry, "Resolved preview geometry");

        let (width, height) = geometry.to_pixels(img.width(), img.height());
        if width > self.max_dimension || height > self.max_dimension {
            return Err(PipelineError::Transform(format!(
                "preview of {}x{} exceeds the {} pixel limit",
                width, height, self.max_dimension
            )));
        }

        let resized = resize_image(&img, geometry);
        let encoded = match self.format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
            _ => DynamicImage::ImageRgba8(resized.to_rgba8()),
        };

        encoded
            .save_with_format(&self.output, self.format)
            .map_err(|e| PipelineError::Transform(e.to_string()))?;

        Ok(encoded.dimensions())
    }
}

/// Decode only the first frame (or flattened composite) of a source
fn decode_first_frame(path: &Path, extension: &str) -> PipelineResult<DynamicImage> {
    if psd::is_photoshop_extension(extension) {
        return psd::decode_composite(path).map_err(PipelineError::Transform);
    }

    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| PipelineError::Transform(e.to_string()))?
        .decode()
        .map_err(|e| PipelineError::Transform(e.to_string()))
}

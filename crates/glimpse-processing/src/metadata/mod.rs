//! Metadata extraction for downloaded originals
//!
//! Dimensions come from the image header (or the Photoshop header), embedded
//! tags from EXIF and XMP. Tags are first collected into one flat map keyed
//! `exif:<Tag>` / `xmp:<Name>` and then split per namespace.

pub mod exif;
pub mod psd;
pub mod xmp;

use self::exif::ExifReader;
use ::exif::Tag;
use glimpse_core::{partition_by_prefix, ImageMetadata, PipelineError, PipelineResult};
use image::ImageReader;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

const EXIF_PREFIX: &str = "exif:";
const XMP_PREFIX: &str = "xmp:";

/// Extract dimensions, tags and timestamps of the file at `path`
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub async fn extract_metadata(path: &Path, content_hash: &str) -> PipelineResult<ImageMetadata> {
    let path: PathBuf = path.to_path_buf();
    let content_hash = content_hash.to_string();

    tokio::task::spawn_blocking(move || read_metadata(&path, content_hash))
        .await
        .map_err(|e| PipelineError::UnreadableImage(format!("metadata task failed: {}", e)))?
}

/// Blocking variant of [`extract_metadata`]
pub fn read_metadata(path: &Path, content_hash: String) -> PipelineResult<ImageMetadata> {
    let (width, height) = intrinsic_dimensions(path)?;

    let mut raw: Vec<(String, String)> = Vec::new();
    let mut created = None;
    let mut modified = None;

    match ExifReader::new(path) {
        Ok(reader) => {
            raw.extend(reader.properties());
            created = reader.get_tag(Tag::DateTimeOriginal);
            modified = reader.get_tag(Tag::DateTime);
        }
        Err(e) => tracing::debug!(error = %e, "No EXIF data"),
    }

    match self::xmp::read_properties(path) {
        Ok(properties) => raw.extend(properties),
        Err(e) => tracing::debug!(error = %e, "Unable to scan for XMP packet"),
    }

    let mut namespaces = partition_by_prefix(raw, &[EXIF_PREFIX, XMP_PREFIX]);
    let exif = namespaces.remove(EXIF_PREFIX).unwrap_or_default();
    let xmp = namespaces.remove(XMP_PREFIX).unwrap_or_default();

    let created = created.or_else(|| xmp.get("CreateDate").cloned());
    let modified = modified.or_else(|| xmp.get("ModifyDate").cloned());

    tracing::debug!(
        width = width,
        height = height,
        exif_tags = exif.len(),
        xmp_properties = xmp.len(),
        "Extracted image metadata"
    );

    Ok(ImageMetadata {
        width,
        height,
        content_hash,
        exif,
        xmp,
        created,
        modified,
    })
}

/// Pixel dimensions from the file header, without decoding the image
pub fn intrinsic_dimensions(path: &Path) -> PipelineResult<(u32, u32)> {
    let file = File::open(path).map_err(|e| PipelineError::UnreadableImage(e.to_string()))?;
    if let Some(dimensions) = self::psd::header_dimensions(BufReader::new(file)) {
        return Ok(dimensions);
    }

    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| PipelineError::UnreadableImage(e.to_string()))?
        .into_dimensions()
        .map_err(|e| PipelineError::UnreadableImage(e.to_string()))
}

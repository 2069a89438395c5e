//! Glimpse Core Library
//!
//! This crate provides the configuration, error taxonomy and data model shared by
//! every stage of the preview pipeline (fetch, generate, notify, orchestrate).

pub mod config;
pub mod error;
pub mod metadata;
pub mod models;

// Re-export commonly used types
pub use config::{BaseConfig, Config, GlimpseConfig, MAX_PREVIEW_DIMENSION};
pub use error::{LogLevel, PipelineError, PipelineResult};
pub use metadata::partition_by_prefix;
pub use models::{
    ImageMetadata, JobRecord, JobStatus, LocalAsset, PreviewAsset, PreviewRequest,
    SizingDefaults, SizingSpec, SourceReference, ValidationResult, CALLBACK_ERROR_KEY, ERROR_KEY,
};

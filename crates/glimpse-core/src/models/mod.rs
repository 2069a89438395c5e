//! Pipeline data model
//!
//! Types threaded through a single pipeline execution, from the caller's request
//! to the job record exposed to the status surface.

mod asset;
mod job;
mod request;
mod sizing;

pub use asset::{ImageMetadata, LocalAsset, PreviewAsset};
pub use job::{JobRecord, JobStatus, CALLBACK_ERROR_KEY, ERROR_KEY};
pub use request::{PreviewRequest, SourceReference, ValidationResult};
pub use sizing::{SizingDefaults, SizingSpec};

//! Glimpse Processing Library
//!
//! Image work for the preview pipeline: content hashing, metadata extraction,
//! the sizing policy and preview generation.

pub mod hash;
pub mod metadata;
pub mod preview;
pub mod resize;

pub use hash::content_hash;
pub use metadata::extract_metadata;
pub use preview::{Generator, ImagePreviewGenerator, PreviewOutcome, SUPPORTED_EXTENSIONS};
pub use resize::{resolve_dimensions, Geometry};

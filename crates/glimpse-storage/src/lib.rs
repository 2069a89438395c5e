//! Glimpse Storage Library
//!
//! Local filesystem storage for the files a pipeline run produces: downloaded
//! originals and generated previews. Every file gets a unique, sanitized name so
//! concurrent jobs never collide.

pub mod error;
pub mod local;
pub mod naming;

pub use error::{StorageError, StorageResult};
pub use local::LocalStorage;
pub use naming::{sanitize_filename, unique_file_name};

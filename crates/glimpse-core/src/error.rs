//! Error types module
//!
//! Every stage of the pipeline reports failures through [`PipelineError`]. The
//! orchestrator collapses fatal errors into the single string stored on the job,
//! while `kind()` keeps the originating stage visible in logs.

use std::io;
use std::path::PathBuf;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected outcomes like unsupported formats
    Debug,
    /// Warning level - for caller-side problems and best-effort failures
    Warn,
    /// Error level - for unexpected failures
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("file not found: no url was supplied")]
    MissingUrl,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("file not found: {url} ({reason})")]
    NotFound { url: String, reason: String },

    #[error("file not found after redirect: {url} ({reason})")]
    RedirectFailed { url: String, reason: String },

    #[error("file size {size} bytes is larger than the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("unable to download the inbound file: {message}")]
    Download {
        message: String,
        /// Partially written file left behind by the failed transfer
        partial: Option<PathBuf>,
    },

    #[error("unable to remove {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to read image: {0}")]
    UnreadableImage(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("preview generation failed: {0}")]
    Transform(String),

    #[error("unable to access callback url {url}: {reason}")]
    CallbackUnreachable { url: String, reason: String },
}

/// Result alias used across the pipeline crates
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn download(message: impl Into<String>) -> Self {
        PipelineError::Download {
            message: message.into(),
            partial: None,
        }
    }

    pub fn download_with_partial(message: impl Into<String>, partial: PathBuf) -> Self {
        PipelineError::Download {
            message: message.into(),
            partial: Some(partial),
        }
    }

    /// Machine-readable tag for logs and API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::MissingUrl => "missing_url",
            PipelineError::InvalidUrl(_) => "invalid_url",
            PipelineError::NotFound { .. } => "not_found",
            PipelineError::RedirectFailed { .. } => "redirect_failed",
            PipelineError::TooLarge { .. } => "too_large",
            PipelineError::Download { .. } => "download",
            PipelineError::Cleanup { .. } => "cleanup",
            PipelineError::UnreadableImage(_) => "unreadable_image",
            PipelineError::UnsupportedFormat(_) => "unsupported_format",
            PipelineError::Transform(_) => "transform",
            PipelineError::CallbackUnreachable { .. } => "callback_unreachable",
        }
    }

    /// Whether this error moves a job to `failed`.
    ///
    /// Unsupported formats mean "no preview", callback failures are recorded next to
    /// a successful result, and cleanup failures are only logged.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            PipelineError::UnsupportedFormat(_)
                | PipelineError::CallbackUnreachable { .. }
                | PipelineError::Cleanup { .. }
        )
    }

    /// Path of a partially downloaded file, if the error left one behind
    pub fn partial_path(&self) -> Option<&PathBuf> {
        match self {
            PipelineError::Download { partial, .. } => partial.as_ref(),
            _ => None,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PipelineError::MissingUrl | PipelineError::InvalidUrl(_) => 400,
            PipelineError::NotFound { .. } | PipelineError::RedirectFailed { .. } => 404,
            PipelineError::TooLarge { .. } => 413,
            PipelineError::UnsupportedFormat(_) => 415,
            PipelineError::UnreadableImage(_) => 422,
            PipelineError::Download { .. } | PipelineError::CallbackUnreachable { .. } => 502,
            PipelineError::Cleanup { .. } | PipelineError::Transform(_) => 500,
        }
    }

    pub fn log_level(&self) -> LogLevel {
        match self {
            PipelineError::UnsupportedFormat(_) => LogLevel::Debug,
            PipelineError::MissingUrl
            | PipelineError::InvalidUrl(_)
            | PipelineError::NotFound { .. }
            | PipelineError::RedirectFailed { .. }
            | PipelineError::TooLarge { .. }
            | PipelineError::CallbackUnreachable { .. }
            | PipelineError::Cleanup { .. } => LogLevel::Warn,
            PipelineError::Download { .. }
            | PipelineError::UnreadableImage(_)
            | PipelineError::Transform(_) => LogLevel::Error,
        }
    }
}

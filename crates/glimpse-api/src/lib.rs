//! Glimpse API Library
//!
//! HTTP surface over the preview pipeline: job submission, job status, serving
//! generated previews and a liveness check.

pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::{AppError, ErrorResponse, HttpAppError};
pub use state::AppState;

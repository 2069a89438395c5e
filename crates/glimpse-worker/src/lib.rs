//! Glimpse Worker Library
//!
//! Runs preview jobs: the [`Pipeline`] sequences one execution, the
//! [`JobQueue`] bounds how many run at once and the [`JobStore`] keeps their
//! records for the status surface.

pub mod pipeline;
pub mod queue;
pub mod store;

pub use pipeline::Pipeline;
pub use queue::{JobQueue, JobQueueConfig};
pub use store::{InMemoryJobStore, JobStore};

//! Glimpse Services Library
//!
//! Network-facing pipeline stages: validating and retrieving remote originals,
//! and delivering results to caller callbacks.

pub mod fetcher;
pub mod notifier;
pub mod ssrf;

pub use fetcher::{Fetcher, FetcherConfig, HttpFetcher};
pub use notifier::{HttpNotifier, Notifier, NotifierConfig};
pub use ssrf::{CheckedUrl, UrlGuard};

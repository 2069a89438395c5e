//! Application setup and initialization

pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::{Context, Result};
use glimpse_core::Config;
use glimpse_processing::ImagePreviewGenerator;
use glimpse_services::{FetcherConfig, HttpFetcher, HttpNotifier, NotifierConfig};
use glimpse_storage::LocalStorage;
use glimpse_worker::{InMemoryJobStore, JobQueue, JobQueueConfig, Pipeline};
use std::sync::Arc;

/// Initialize telemetry, then the whole application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    config.validate().context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.log_json())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    build_app(config).await
}

/// Wire storage, pipeline stages, the job queue and the router.
///
/// Must be called from within a Tokio runtime.
pub async fn build_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    let storage = LocalStorage::new(
        config.download_root(),
        config.preview_root(),
        config.public_base_url(),
    )
    .await
    .context("Failed to initialize local storage")?;

    let fetcher = HttpFetcher::new(storage.clone(), FetcherConfig::from(&config))?;
    let generator = ImagePreviewGenerator::new(storage.clone(), config.preview_defaults().clone())
        .with_max_dimension(config.max_preview_dimension());
    let notifier = HttpNotifier::new(NotifierConfig::from(&config))?;

    let pipeline = Pipeline::new(
        Arc::new(fetcher),
        Arc::new(generator),
        Arc::new(notifier),
        storage.clone(),
    );

    let queue = JobQueue::new(
        Arc::new(InMemoryJobStore::new()),
        Arc::new(pipeline),
        JobQueueConfig::from(&config),
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        queue,
        storage,
    });

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}

//! Job queue: bounded worker pool, submission and expired-result reaping.
//!
//! The reaper also removes the preview files of the records it evicts.
//!
//! Shutdown: [`JobQueue::shutdown`] stops the reaper; it does not wait for
//! in-flight jobs.

use glimpse_core::{Config, JobRecord, PreviewRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

use crate::pipeline::Pipeline;
use crate::store::JobStore;

#[derive(Clone, Debug)]
pub struct JobQueueConfig {
    pub max_workers: usize,
    /// Seconds a finished job record is kept. 0 = kept forever.
    pub result_ttl_secs: u64,
    /// Interval in seconds between runs of the expired-result reaper. 0 = disabled.
    pub reap_interval_secs: u64,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            result_ttl_secs: 60 * 60 * 24,
            reap_interval_secs: 60,
        }
    }
}

impl From<&Config> for JobQueueConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_workers: config.max_workers(),
            result_ttl_secs: config.result_ttl_secs(),
            reap_interval_secs: config.reap_interval_secs(),
        }
    }
}

#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    pipeline: Arc<Pipeline>,
    semaphore: Arc<Semaphore>,
    config: JobQueueConfig,
    shutdown_tx: mpsc::Sender<()>,
}

impl JobQueue {
    /// Create the queue and start the reaper (if both TTL and interval are set).
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(store: Arc<dyn JobStore>, pipeline: Arc<Pipeline>, config: JobQueueConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        if config.reap_interval_secs > 0 && config.result_ttl_secs > 0 {
            tokio::spawn(Self::reaper(
                store.clone(),
                pipeline.clone(),
                config.clone(),
                shutdown_rx,
            ));
        }

        tracing::info!(
            max_workers = config.max_workers,
            result_ttl_secs = config.result_ttl_secs,
            reap_interval_secs = config.reap_interval_secs,
            "Job queue started"
        );

        Self {
            store,
            pipeline,
            semaphore: Arc::new(Semaphore::new(config.max_workers.max(1))),
            config,
            shutdown_tx,
        }
    }

    /// Record a `running` job and schedule its execution; returns the job id
    #[tracing::instrument(skip_all, fields(url = %request.url))]
    pub async fn submit(&self, request: PreviewRequest) -> Uuid {
        let record = JobRecord::new(Uuid::new_v4());
        let job_id = record.id;
        self.store.insert(record.clone()).await;

        let store = self.store.clone();
        let pipeline = self.pipeline.clone();
        let semaphore = self.semaphore.clone();

        tokio::spawn(async move {
            let mut record = record;
            match semaphore.acquire_owned().await {
                Ok(_permit) => pipeline.run(&mut record, &request).await,
                Err(e) => {
                    tracing::error!(job_id = %record.id, error = %e, "Worker pool closed");
                    record.mark_failed("worker pool is shutting down");
                }
            }
            store.update(record).await;
        });

        tracing::info!(job_id = %job_id, "Job submitted to queue");
        job_id
    }

    pub async fn status(&self, id: Uuid) -> Option<JobRecord> {
        self.store.get(id).await
    }

    pub fn config(&self) -> &JobQueueConfig {
        &self.config
    }

    async fn reaper(
        store: Arc<dyn JobStore>,
        pipeline: Arc<Pipeline>,
        config: JobQueueConfig,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let ttl = Duration::from_secs(config.result_ttl_secs);
        let mut interval = tokio::time::interval(Duration::from_secs(config.reap_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let removed = store.remove_expired(ttl).await;
                    for record in &removed {
                        pipeline.release(record).await;
                    }
                    if !removed.is_empty() {
                        tracing::debug!(removed = removed.len(), "Reaped expired job records");
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Job reaper stopped");
                    break;
                }
            }
        }
    }

    /// Stop the reaper. Jobs already running continue to completion.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating job queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}

use async_trait::async_trait;
use chrono::Utc;
use glimpse_core::JobRecord;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Storage of job records for the status surface
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, record: JobRecord);

    async fn get(&self, id: Uuid) -> Option<JobRecord>;

    /// Replace the stored record with the same id
    async fn update(&self, record: JobRecord);

    /// Drop terminal records last updated more than `ttl` ago and return them
    async fn remove_expired(&self, ttl: Duration) -> Vec<JobRecord>;
}

/// Process-local job store
#[derive(Clone, Default)]
pub struct InMemoryJobStore {
    jobs: Arc<RwLock<HashMap<Uuid, JobRecord>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, record: JobRecord) {
        self.jobs.write().await.insert(record.id, record);
    }

    async fn get(&self, id: Uuid) -> Option<JobRecord> {
        self.jobs.read().await.get(&id).cloned()
    }

    async fn update(&self, record: JobRecord) {
        self.jobs.write().await.insert(record.id, record);
    }

    async fn remove_expired(&self, ttl: Duration) -> Vec<JobRecord> {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return Vec::new();
        };
        let Some(cutoff) = Utc::now().checked_sub_signed(ttl) else {
            return Vec::new();
        };

        let mut jobs = self.jobs.write().await;
        let expired: Vec<Uuid> = jobs
            .values()
            .filter(|record| record.is_terminal() && record.updated_at <= cutoff)
            .map(|record| record.id)
            .collect();

        expired.iter().filter_map(|id| jobs.remove(id)).collect()
    }
}

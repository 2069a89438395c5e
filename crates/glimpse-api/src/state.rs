use glimpse_core::Config;
use glimpse_storage::LocalStorage;
use glimpse_worker::JobQueue;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub queue: JobQueue,
    /// Serves generated previews back out of the preview root
    pub storage: LocalStorage,
}

use crate::config::Settings;
use crate::registry::ModelRegistry;
use crate::workers::InferencePool;
use std::sync::Arc;

/// Application state shared across all request handlers.
/// Uses Arc for zero-copy sharing; handlers only ever read from it.
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub workers: InferencePool,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Wrap an already-loaded registry. The worker pool is sized from
    /// `settings.workers`, matching the number of sessions per model.
    pub fn new(settings: Arc<Settings>, registry: Arc<ModelRegistry>) -> Self {
        tracing::info!(workers = settings.workers, "Inference worker pool ready");
        Self {
            registry,
            workers: InferencePool::new(settings.workers),
            settings,
        }
    }
}

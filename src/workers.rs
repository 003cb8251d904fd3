use crate::error::ModelError;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Bounded pool for blocking inference work.
///
/// Each job holds one permit for as long as it runs on tokio's blocking
/// threads, so at most `size` inferences execute at once and the async
/// dispatcher never runs model code itself. The permit moves into the job,
/// which keeps the bound intact even if the awaiting request is dropped.
#[derive(Clone)]
pub struct InferencePool {
    permits: Arc<Semaphore>,
}

impl InferencePool {
    pub fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size.max(1))),
        }
    }

    /// Jobs currently allowed to start without waiting.
    #[cfg(test)]
    fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `job` on a blocking thread once a permit is free.
    pub async fn run<T, F>(&self, job: F) -> Result<T, ModelError>
    where
        F: FnOnce() -> Result<T, ModelError> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ModelError::Worker("Inference pool closed".to_string()))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| ModelError::Worker(format!("Task join error: {}", e)))?
    }
}

use crate::error::ModelError;
use crate::inference::tokenize::EncodedBatch;
use crossbeam::queue::ArrayQueue;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use std::cell::UnsafeCell;
use std::path::Path;

/// A pool of ONNX Runtime Sessions for parallel inference.
///
/// # Design Rationale
/// ONNX Session::run requires `&mut self`, but we need concurrent access.
/// Instead of using a Mutex (which serializes all requests), we create N
/// independent Session instances, one per inference worker. Each concurrent
/// request leases an exclusive session from the pool via a lock-free queue.
///
/// # Safety
/// The pool guarantees that each session index is held by at most one thread
/// at a time. The ArrayQueue provides this guarantee through atomic operations.
/// Sessions themselves are not shared - each inference gets exclusive access
/// to its leased session via UnsafeCell, which is safe because the ArrayQueue
/// ensures only one thread holds each index at any time.
pub struct SessionPool {
    sessions: Vec<UnsafeCell<Session>>,
    available: ArrayQueue<usize>,
    /// Whether the graph declares a `token_type_ids` input.
    token_type_ids: bool,
}

/// Output tensor copied out of the session.
#[derive(Debug, Clone)]
pub struct OutputTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// Exclusive use of one pooled session. Returned to the pool on drop.
struct SessionLease<'a> {
    pool: &'a SessionPool,
    index: usize,
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        // Cannot fail: only indices taken from the queue come back.
        let _ = self.pool.available.push(self.index);
    }
}

impl SessionPool {
    /// Load `pool_size` sessions of the same graph with Level3 optimization.
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `pool_size` - Number of sessions to create (one per inference worker)
    /// * `intra_threads` - Threads per session for intra-op parallelism
    /// * `token_type_ids` - Whether to feed segment ids (BERT family graphs)
    pub fn load(
        model_path: &Path,
        pool_size: usize,
        intra_threads: usize,
        token_type_ids: bool,
    ) -> Result<Self, ModelError> {
        let pool_size = pool_size.max(1);

        // Read model file once
        let model_bytes = std::fs::read(model_path).map_err(|e| {
            ModelError::Load(format!(
                "Failed to read model file {}: {}",
                model_path.display(),
                e
            ))
        })?;

        let mut sessions = Vec::with_capacity(pool_size);
        let available = ArrayQueue::new(pool_size);

        for i in 0..pool_size {
            let session = Session::builder()
                .map_err(|e| ModelError::Load(e.to_string()))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| ModelError::Load(e.to_string()))?
                .with_intra_threads(intra_threads)
                .map_err(|e| ModelError::Load(e.to_string()))?
                .commit_from_memory(&model_bytes)
                .map_err(|e: ort::Error| ModelError::Load(e.to_string()))?;

            sessions.push(UnsafeCell::new(session));
            available
                .push(i)
                .map_err(|_| ModelError::Load("Failed to initialize session pool".into()))?;
        }

        tracing::info!(
            path = %model_path.display(),
            pool_size,
            intra_threads,
            token_type_ids,
            "ONNX session pool loaded"
        );

        Ok(Self {
            sessions,
            available,
            token_type_ids,
        })
    }

    fn lease(&self) -> Result<SessionLease<'_>, ModelError> {
        self.available
            .pop()
            .map(|index| SessionLease { pool: self, index })
            .ok_or_else(|| ModelError::Worker("No available sessions in pool".into()))
    }

    /// Run the graph on a padded batch and copy out the requested outputs.
    ///
    /// Each name in `outputs` is tried in order; the result holds one entry
    /// per name, `None` when the graph has no output with that name.
    pub fn run(
        &self,
        batch: &EncodedBatch,
        outputs: &[&str],
    ) -> Result<Vec<Option<OutputTensor>>, ModelError> {
        let shape = [batch.rows(), batch.cols()];
        let input_ids = Tensor::from_array((shape, batch.input_ids.iter().copied().collect::<Vec<i64>>()))?;
        let attention_mask =
            Tensor::from_array((shape, batch.attention_mask.iter().copied().collect::<Vec<i64>>()))?;

        let lease = self.lease()?;
        // SAFETY: the lease holds this index exclusively until it is dropped,
        // which happens after the outputs below have been copied out.
        let session = unsafe { &mut *self.sessions[lease.index].get() };

        let results = if self.token_type_ids {
            let token_type_ids = Tensor::from_array((
                shape,
                batch.token_type_ids.iter().copied().collect::<Vec<i64>>(),
            ))?;
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids,
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
            ])
        }
        .map_err(|e| ModelError::Inference(e.to_string()))?;

        let mut extracted = Vec::with_capacity(outputs.len());
        for name in outputs {
            let tensor = match results.get(*name) {
                Some(value) => {
                    let (shape, data) = value
                        .try_extract_tensor::<f32>()
                        .map_err(|e| ModelError::Output(format!("{}: {}", name, e)))?;
                    Some(OutputTensor {
                        shape: shape.iter().map(|&d| d as usize).collect(),
                        data: data.to_vec(),
                    })
                }
                None => None,
            };
            extracted.push(tensor);
        }

        drop(results);
        drop(lease);
        Ok(extracted)
    }
}

// SAFETY: SessionPool is Send + Sync because:
// - ArrayQueue is lock-free and thread-safe (crossbeam guarantee)
// - ArrayQueue::pop() returns each index to at most one caller at a time
// - SessionLease pushes the index back only once, on drop
// - Between pop and push, only one thread can access each UnsafeCell<Session>
// - Sessions are never accessed without first leasing their index
unsafe impl Send for SessionPool {}
unsafe impl Sync for SessionPool {}

use crate::config::{ReaderSettings, ScoreActivation, Settings};
use crate::error::ModelError;
use crate::inference::{
    CrossEncoderModel, Embedder, EncoderModel, ModelFiles, ModelHub, Reader, ReaderModel,
    Reranker, SessionPool, TokenizerWrapper,
};
use crate::registry::ModelLoader;
use std::sync::Arc;

/// Builds ONNX Runtime models for the registry.
///
/// Each model gets one session per inference worker and is warmed up with a
/// dummy inference before it is handed over, so the first real request does
/// not pay ONNX Runtime's lazy initialization.
pub struct OnnxModelLoader {
    hub: ModelHub,
    pool_size: usize,
    intra_threads: usize,
    max_sequence_length: usize,
    reader: ReaderSettings,
    rerank_activation: ScoreActivation,
}

impl OnnxModelLoader {
    pub fn new(settings: &Settings) -> Self {
        Self {
            hub: ModelHub::new(
                settings.onnx_file.clone(),
                settings.model_cache_dir.clone(),
                settings.hf_token.clone(),
            ),
            pool_size: settings.workers,
            intra_threads: settings.intra_threads,
            max_sequence_length: settings.max_sequence_length,
            reader: settings.reader,
            rerank_activation: settings.rerank_activation,
        }
    }

    fn sessions(&self, files: &ModelFiles) -> Result<SessionPool, ModelError> {
        SessionPool::load(
            &files.onnx,
            self.pool_size,
            self.intra_threads,
            files.uses_token_type_ids(),
        )
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load_embedder(&self, model_id: &str) -> Result<Arc<dyn Embedder>, ModelError> {
        let files = self.hub.resolve(model_id)?;
        let tokenizer = TokenizerWrapper::load(&files.tokenizer, self.max_sequence_length)?;
        let model = EncoderModel::new(self.sessions(&files)?, tokenizer);

        tracing::info!(model = model_id, "Running embedder warmup...");
        let warmup = model.embed(&["warmup document".to_string()])?;
        tracing::info!(
            model = model_id,
            dimensions = warmup.first().map(Vec::len).unwrap_or(0),
            "Embedder warmup completed successfully"
        );
        Ok(Arc::new(model))
    }

    fn load_reranker(&self, model_id: &str) -> Result<Arc<dyn Reranker>, ModelError> {
        let files = self.hub.resolve(model_id)?;
        let tokenizer = TokenizerWrapper::load(&files.tokenizer, self.max_sequence_length)?;
        let model = CrossEncoderModel::new(self.sessions(&files)?, tokenizer, self.rerank_activation);

        tracing::info!(model = model_id, "Running reranker warmup...");
        model.score("warmup query", &["warmup document".to_string()])?;
        tracing::info!(model = model_id, "Reranker warmup completed successfully");
        Ok(Arc::new(model))
    }

    fn load_reader(&self, model_id: &str) -> Result<Arc<dyn Reader>, ModelError> {
        let files = self.hub.resolve(model_id)?;
        let tokenizer = TokenizerWrapper::load_windowed(
            &files.tokenizer,
            self.reader.max_seq_length,
            self.reader.doc_stride,
        )?;
        let model = ReaderModel::new(self.sessions(&files)?, tokenizer, self.reader.max_answer_length);

        tracing::info!(model = model_id, "Running reader warmup...");
        model.answer("What is warmed up?", "The reader is warmed up.")?;
        tracing::info!(model = model_id, "Reader warmup completed successfully");
        Ok(Arc::new(model))
    }
}

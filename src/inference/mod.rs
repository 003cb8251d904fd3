//! Model capabilities and their ONNX Runtime implementations.

pub mod cross_encoder;
pub mod encoder;
pub mod hub;
pub mod loader;
pub mod reader;
pub mod session;
pub mod span;
pub mod tokenize;

pub use cross_encoder::CrossEncoderModel;
pub use encoder::EncoderModel;
pub use hub::{ModelFiles, ModelHub};
pub use loader::OnnxModelLoader;
pub use reader::ReaderModel;
pub use session::SessionPool;
pub use tokenize::TokenizerWrapper;

use crate::error::ModelError;
use serde::Serialize;

/// Sentence-embedding encoder.
pub trait Embedder: Send + Sync {
    /// One vector per input, in input order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError>;
}

/// Pairwise query/candidate relevance scorer.
pub trait Reranker: Send + Sync {
    /// One score per candidate, in candidate order.
    fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>, ModelError>;
}

/// Extractive question answering over a context passage.
pub trait Reader: Send + Sync {
    fn answer(&self, question: &str, context: &str) -> Result<Answer, ModelError>;
}

/// Answer span extracted from a context.
///
/// `start` and `end` are character offsets into the context, half-open.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub confidence: f32,
    pub start: usize,
    pub end: usize,
}

impl Answer {
    /// Slice `[start, end)` characters out of `context`.
    pub fn from_char_span(context: &str, start: usize, end: usize, confidence: f32) -> Self {
        let answer = context.chars().skip(start).take(end.saturating_sub(start)).collect();
        Self {
            answer,
            confidence,
            start,
            end,
        }
    }
}

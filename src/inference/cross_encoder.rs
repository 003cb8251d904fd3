use crate::config::ScoreActivation;
use crate::error::ModelError;
use crate::inference::session::{OutputTensor, SessionPool};
use crate::inference::tokenize::TokenizerWrapper;
use crate::inference::Reranker;

/// Pairwise cross-encoder. Scores every (query, candidate) pair in one
/// batched session run.
pub struct CrossEncoderModel {
    sessions: SessionPool,
    tokenizer: TokenizerWrapper,
    activation: ScoreActivation,
}

impl CrossEncoderModel {
    pub fn new(sessions: SessionPool, tokenizer: TokenizerWrapper, activation: ScoreActivation) -> Self {
        Self {
            sessions,
            tokenizer,
            activation,
        }
    }
}

impl Reranker for CrossEncoderModel {
    fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>, ModelError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let batch = self.tokenizer.encode_pairs(query, candidates)?;
        let logits = self
            .sessions
            .run(&batch, &["logits"])?
            .pop()
            .flatten()
            .ok_or_else(|| ModelError::Output("No 'logits' output found".to_string()))?;

        let scores = first_logit_per_row(&logits, candidates.len())?;
        Ok(scores.into_iter().map(|x| activate(self.activation, x)).collect())
    }
}

/// Relevance logit per pair. Single-label heads give (batch, 1) or (batch).
fn first_logit_per_row(logits: &OutputTensor, batch_size: usize) -> Result<Vec<f32>, ModelError> {
    let width = match logits.shape.as_slice() {
        [rows] if *rows == batch_size => 1,
        [rows, width] if *rows == batch_size && *width >= 1 => *width,
        other => {
            return Err(ModelError::Output(format!(
                "logits have shape {:?} for {} pairs",
                other, batch_size
            )))
        }
    };
    Ok(logits.data.chunks(width).map(|row| row[0]).collect())
}

fn activate(activation: ScoreActivation, x: f32) -> f32 {
    match activation {
        ScoreActivation::Identity => x,
        ScoreActivation::Sigmoid => sigmoid(x),
    }
}

/// Sigmoid activation: 1 / (1 + e^-x)
#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

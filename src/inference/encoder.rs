//! Sentence-embedding encoder.
//!
//! Produces one fixed-size vector per text. Graphs exported with a pooled
//! `sentence_embedding` output are used as-is; otherwise `last_hidden_state`
//! is mean pooled over non-padding tokens. Vectors are L2 normalized.

use crate::error::ModelError;
use crate::inference::session::{OutputTensor, SessionPool};
use crate::inference::tokenize::TokenizerWrapper;
use crate::inference::Embedder;
use ndarray::Array2;

pub struct EncoderModel {
    sessions: SessionPool,
    tokenizer: TokenizerWrapper,
}

impl EncoderModel {
    pub fn new(sessions: SessionPool, tokenizer: TokenizerWrapper) -> Self {
        Self {
            sessions,
            tokenizer,
        }
    }

    /// Encode a batch of texts into embedding vectors.
    ///
    /// # Returns
    /// Array2<f32> of shape (batch_size, embedding_dim)
    pub fn encode_batch(&self, texts: &[String]) -> Result<Array2<f32>, ModelError> {
        if texts.is_empty() {
            return Ok(Array2::zeros((0, 0)));
        }

        let batch = self.tokenizer.encode_texts(texts)?;
        let mut outputs = self
            .sessions
            .run(&batch, &["sentence_embedding", "last_hidden_state"])?;

        let mut embeddings = match (outputs[0].take(), outputs[1].take()) {
            (Some(pooled), _) => pooled_rows(pooled, batch.rows())?,
            (None, Some(hidden)) => mean_pool(hidden, &batch.attention_mask)?,
            (None, None) => {
                return Err(ModelError::Output(
                    "No 'sentence_embedding' or 'last_hidden_state' output found".to_string(),
                ))
            }
        };

        l2_normalize(&mut embeddings);
        Ok(embeddings)
    }
}

impl Embedder for EncoderModel {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let embeddings = self.encode_batch(texts)?;
        Ok(embeddings.outer_iter().map(|row| row.to_vec()).collect())
    }
}

fn pooled_rows(tensor: OutputTensor, batch_size: usize) -> Result<Array2<f32>, ModelError> {
    match tensor.shape.as_slice() {
        [rows, dim] if *rows == batch_size => Array2::from_shape_vec((*rows, *dim), tensor.data)
            .map_err(|e| ModelError::Output(e.to_string())),
        other => Err(ModelError::Output(format!(
            "sentence_embedding has shape {:?}, expected [{}, dim]",
            other, batch_size
        ))),
    }
}

/// Mean pooling with attention mask.
fn mean_pool(hidden: OutputTensor, attention_mask: &Array2<i64>) -> Result<Array2<f32>, ModelError> {
    let (batch_size, seq_len) = attention_mask.dim();
    let hidden_size = match hidden.shape.as_slice() {
        [b, s, h] if *b == batch_size && *s == seq_len => *h,
        other => {
            return Err(ModelError::Output(format!(
                "last_hidden_state has shape {:?}, expected [{}, {}, hidden]",
                other, batch_size, seq_len
            )))
        }
    };
    let data = hidden.data;

    let mut embeddings = Array2::zeros((batch_size, hidden_size));

    for i in 0..batch_size {
        let mut sum = vec![0.0f32; hidden_size];
        let mut count = 0.0f32;

        for j in 0..seq_len {
            if attention_mask[[i, j]] == 1 {
                let base_idx = i * seq_len * hidden_size + j * hidden_size;
                for (k, sum_val) in sum.iter_mut().enumerate() {
                    *sum_val += data[base_idx + k];
                }
                count += 1.0;
            }
        }

        if count > 0.0 {
            for (k, sum_val) in sum.iter().enumerate() {
                embeddings[[i, k]] = sum_val / count;
            }
        }
    }

    Ok(embeddings)
}

fn l2_normalize(embeddings: &mut Array2<f32>) {
    for mut row in embeddings.rows_mut() {
        let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }
}

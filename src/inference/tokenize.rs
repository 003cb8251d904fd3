use crate::error::ModelError;
use ndarray::Array2;
use std::path::Path;
use tokenizers::{Encoding, Tokenizer, TruncationParams, TruncationStrategy};

/// Padded model inputs for one batch, shape (batch, seq_len).
#[derive(Debug, Clone)]
pub struct EncodedBatch {
    pub input_ids: Array2<i64>,
    pub attention_mask: Array2<i64>,
    pub token_type_ids: Array2<i64>,
}

impl EncodedBatch {
    /// Pad encodings to the longest one in the batch.
    pub fn from_encodings(encodings: &[Encoding]) -> Self {
        let batch_size = encodings.len();
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids = Array2::<i64>::zeros((batch_size, max_len));
        let mut attention_mask = Array2::<i64>::zeros((batch_size, max_len));
        let mut token_type_ids = Array2::<i64>::zeros((batch_size, max_len));

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();

            for j in 0..ids.len() {
                input_ids[[i, j]] = ids[j] as i64;
                attention_mask[[i, j]] = mask[j] as i64;
                token_type_ids[[i, j]] = types[j] as i64;
            }
        }

        Self {
            input_ids,
            attention_mask,
            token_type_ids,
        }
    }

    pub fn rows(&self) -> usize {
        self.input_ids.nrows()
    }

    pub fn cols(&self) -> usize {
        self.input_ids.ncols()
    }
}

pub struct TokenizerWrapper {
    tokenizer: Tokenizer,
}

impl TokenizerWrapper {
    /// Load a `tokenizer.json` that truncates to `max_length` tokens.
    ///
    /// Pairs are truncated longest-first, so neither query nor candidate is
    /// dropped entirely.
    pub fn load(tokenizer_path: &Path, max_length: usize) -> Result<Self, ModelError> {
        Self::load_with(
            tokenizer_path,
            TruncationParams {
                max_length,
                strategy: TruncationStrategy::LongestFirst,
                ..Default::default()
            },
        )
    }

    /// Load a tokenizer for question/context windows: only the context is
    /// truncated, and the overflow is returned as windows overlapping by
    /// `stride` tokens.
    pub fn load_windowed(
        tokenizer_path: &Path,
        max_length: usize,
        stride: usize,
    ) -> Result<Self, ModelError> {
        Self::load_with(
            tokenizer_path,
            TruncationParams {
                max_length,
                stride,
                strategy: TruncationStrategy::OnlySecond,
                ..Default::default()
            },
        )
    }

    fn load_with(tokenizer_path: &Path, truncation: TruncationParams) -> Result<Self, ModelError> {
        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| ModelError::Load(format!("Failed to load tokenizer: {}", e)))?;
        let max_length = truncation.max_length;
        tokenizer
            .with_truncation(Some(truncation))
            .map_err(|e| ModelError::Load(format!("Invalid truncation settings: {}", e)))?;

        tracing::info!(
            path = %tokenizer_path.display(),
            max_length,
            "Tokenizer loaded successfully"
        );

        Ok(Self { tokenizer })
    }

    /// Tokenize standalone texts for embedding.
    pub fn encode_texts(&self, texts: &[String]) -> Result<EncodedBatch, ModelError> {
        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let encodings = self
            .tokenizer
            .encode_batch(inputs, true)
            .map_err(|e| ModelError::Tokenization(e.to_string()))?;
        Ok(EncodedBatch::from_encodings(&encodings))
    }

    /// Tokenize query-candidate pairs for reranking, keeping candidate order.
    pub fn encode_pairs(&self, query: &str, candidates: &[String]) -> Result<EncodedBatch, ModelError> {
        let pairs: Vec<(&str, &str)> = candidates.iter().map(|c| (query, c.as_str())).collect();
        let encodings = self
            .tokenizer
            .encode_batch(pairs, true)
            .map_err(|e| ModelError::Tokenization(e.to_string()))?;
        Ok(EncodedBatch::from_encodings(&encodings))
    }

    /// Tokenize a question/context pair with character offsets.
    ///
    /// Returns the first window followed by any overflow windows.
    pub fn encode_windows(&self, question: &str, context: &str) -> Result<Vec<Encoding>, ModelError> {
        let mut encoding = self
            .tokenizer
            .encode_char_offsets((question, context), true)
            .map_err(|e| ModelError::Tokenization(e.to_string()))?;
        let overflowing = encoding.take_overflowing();

        let mut windows = Vec::with_capacity(1 + overflowing.len());
        windows.push(encoding);
        windows.extend(overflowing);
        Ok(windows)
    }
}

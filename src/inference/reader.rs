//! Extractive question answering.
//!
//! The context is split into overlapping token windows, each paired with the
//! question. All windows run as one batch; the best span across windows wins
//! and is mapped back to character offsets in the context.

use crate::error::ModelError;
use crate::inference::session::{OutputTensor, SessionPool};
use crate::inference::span::{best_span, SpanCandidate};
use crate::inference::tokenize::{EncodedBatch, TokenizerWrapper};
use crate::inference::{Answer, Reader};
use tokenizers::Encoding;

/// Sequence id of the context in a (question, context) pair encoding.
const CONTEXT_SEQUENCE: usize = 1;

pub struct ReaderModel {
    sessions: SessionPool,
    tokenizer: TokenizerWrapper,
    max_answer_length: usize,
}

impl ReaderModel {
    pub fn new(sessions: SessionPool, tokenizer: TokenizerWrapper, max_answer_length: usize) -> Self {
        Self {
            sessions,
            tokenizer,
            max_answer_length,
        }
    }
}

impl Reader for ReaderModel {
    fn answer(&self, question: &str, context: &str) -> Result<Answer, ModelError> {
        let windows = self.tokenizer.encode_windows(question, context)?;
        let batch = EncodedBatch::from_encodings(&windows);

        let mut outputs = self.sessions.run(&batch, &["start_logits", "end_logits"])?;
        let (start_logits, end_logits) = match (outputs[0].take(), outputs[1].take()) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(ModelError::Output(
                    "No 'start_logits'/'end_logits' outputs found".to_string(),
                ))
            }
        };
        let Some((start, end, score)) =
            select_answer(&windows, &start_logits, &end_logits, self.max_answer_length)?
        else {
            tracing::debug!(windows = windows.len(), "No context tokens to extract from");
            return Ok(Answer::from_char_span(context, 0, 0, 0.0));
        };

        tracing::debug!(windows = windows.len(), start, end, score, "Answer span selected");
        Ok(Answer::from_char_span(context, start, end, score))
    }
}

/// Best answer across windows as a `[start, end)` character span into the
/// context plus its confidence. `None` when no window has context tokens.
///
/// Logits are laid out row per window, padded to the longest window.
fn select_answer(
    windows: &[Encoding],
    start_logits: &OutputTensor,
    end_logits: &OutputTensor,
    max_answer_length: usize,
) -> Result<Option<(usize, usize, f32)>, ModelError> {
    let cols = windows.iter().map(Encoding::len).max().unwrap_or(0);
    let seq_len = check_logits(start_logits, windows.len(), cols)?;
    check_logits(end_logits, windows.len(), cols)?;

    let mut best: Option<(SpanCandidate, &Encoding)> = None;
    for (i, window) in windows.iter().enumerate() {
        let row = i * seq_len..(i + 1) * seq_len;
        let mask = context_mask(window, seq_len);
        if let Some(span) = best_span(
            &start_logits.data[row.clone()],
            &end_logits.data[row],
            &mask,
            max_answer_length,
        ) {
            if best.map_or(true, |(b, _)| span.score > b.score) {
                best = Some((span, window));
            }
        }
    }

    Ok(best.map(|(span, window)| {
        let offsets = window.get_offsets();
        let (start, end) = (offsets[span.start].0, offsets[span.end].1);
        (start, end.max(start), span.score)
    }))
}

/// Logits must be (windows, seq_len). Returns seq_len.
fn check_logits(logits: &OutputTensor, rows: usize, cols: usize) -> Result<usize, ModelError> {
    match logits.shape.as_slice() {
        [r, c] if *r == rows && *c == cols => Ok(cols),
        other => Err(ModelError::Output(format!(
            "span logits have shape {:?}, expected [{}, {}]",
            other, rows, cols
        ))),
    }
}

/// True for tokens that belong to the context, false for question, special
/// tokens and padding.
fn context_mask(window: &Encoding, seq_len: usize) -> Vec<bool> {
    let mut mask: Vec<bool> = window
        .get_sequence_ids()
        .into_iter()
        .map(|id| id == Some(CONTEXT_SEQUENCE))
        .collect();
    mask.resize(seq_len, false);
    mask
}

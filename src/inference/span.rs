//! Answer span selection from start/end logits.

/// Best answer span within one window, in token indices (inclusive end).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpanCandidate {
    pub start: usize,
    pub end: usize,
    pub score: f32,
}

/// Softmax over the tokens where `mask` is true; masked-out tokens get 0.
pub fn masked_softmax(logits: &[f32], mask: &[bool]) -> Vec<f32> {
    let max = logits
        .iter()
        .zip(mask)
        .filter(|&(_, &keep)| keep)
        .map(|(&x, _)| x)
        .fold(f32::NEG_INFINITY, f32::max);
    if max == f32::NEG_INFINITY {
        return vec![0.0; logits.len()];
    }

    let exps: Vec<f32> = logits
        .iter()
        .zip(mask)
        .map(|(&x, &keep)| if keep { (x - max).exp() } else { 0.0 })
        .collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Highest `p_start * p_end` span with `start <= end < start + max_answer_len`,
/// both ends inside the context mask. `None` when the window has no context
/// tokens.
pub fn best_span(
    start_logits: &[f32],
    end_logits: &[f32],
    context_mask: &[bool],
    max_answer_len: usize,
) -> Option<SpanCandidate> {
    let starts = masked_softmax(start_logits, context_mask);
    let ends = masked_softmax(end_logits, context_mask);
    let len = context_mask.len().min(starts.len()).min(ends.len());
    let max_answer_len = max_answer_len.max(1);

    let mut best: Option<SpanCandidate> = None;
    for start in (0..len).filter(|&i| context_mask[i]) {
        let last = (start + max_answer_len).min(len);
        for end in (start..last).filter(|&j| context_mask[j]) {
            let score = starts[start] * ends[end];
            if best.map_or(true, |b| score > b.score) {
                best = Some(SpanCandidate { start, end, score });
            }
        }
    }
    best
}

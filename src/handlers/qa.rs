use crate::error::{AppError, Result};
use crate::inference::Answer;
use crate::registry::Capability;
use crate::state::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Deserialize)]
pub struct ExtractAnswerRequest {
    pub question: String,
    pub context: String,
}

/// `{answer, confidence, start, end}`; offsets are characters into `context`.
pub type ExtractAnswerResponse = Answer;

/// POST /extract_answer - Extract the answer span for a question from a context.
pub async fn extract_answer_handler(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ExtractAnswerRequest>, JsonRejection>,
) -> Result<Json<ExtractAnswerResponse>> {
    let Json(request) = payload?;
    let reader = state.registry.reader()?;

    if request.context.trim().is_empty() {
        return Err(AppError::validation("context cannot be empty"));
    }

    let question = request.question;
    let context = state
        .settings
        .reader_truncation
        .apply(&request.context)
        .into_owned();
    let context_chars = context.chars().count();
    let start = Instant::now();

    let answer = state
        .workers
        .run(move || reader.answer(&question, &context))
        .await
        .map_err(|e| AppError::inference(Capability::Read, e))?;

    let elapsed = start.elapsed();
    tracing::debug!(
        context_chars,
        start = answer.start,
        end = answer.end,
        confidence = answer.confidence,
        elapsed_ms = elapsed.as_millis() as u64,
        "Answer extracted"
    );

    metrics::counter!("extract_answer_requests_total").increment(1);
    metrics::histogram!("extract_answer_latency_ms").record(elapsed.as_millis() as f64);

    Ok(Json(answer))
}

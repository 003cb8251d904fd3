use crate::error::{AppError, ModelError, Result};
use crate::registry::Capability;
use crate::state::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Deserialize)]
pub struct RerankRequest {
    pub query: String,
    pub texts: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RerankResponse {
    pub scores: Vec<f32>,
}

/// POST /rerank - Score candidate texts against a query.
///
/// # Flow
/// 1. Check the reranker slot is Ready (503 otherwise)
/// 2. Apply the rerank truncation policy (unbounded unless configured)
/// 3. Score all (query, text) pairs in one batch on the inference pool
/// 4. Return scores in candidate order; no sorting happens here
pub async fn rerank_handler(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<RerankRequest>, JsonRejection>,
) -> Result<Json<RerankResponse>> {
    let Json(request) = payload?;
    let reranker = state.registry.reranker()?;

    if request.texts.is_empty() {
        return Ok(Json(RerankResponse { scores: Vec::new() }));
    }

    let batch_size = request.texts.len();
    let policy = state.settings.rerank_truncation;
    let query = policy.apply(&request.query).into_owned();
    let texts = policy.apply_all(&request.texts);
    let start = Instant::now();

    let scores = state
        .workers
        .run(move || reranker.score(&query, &texts))
        .await
        .map_err(|e| AppError::inference(Capability::Rerank, e))?;

    if scores.len() != batch_size {
        return Err(AppError::inference(
            Capability::Rerank,
            ModelError::Output(format!("{} scores for {} texts", scores.len(), batch_size)),
        ));
    }

    let elapsed = start.elapsed();
    tracing::debug!(
        batch_size,
        elapsed_ms = elapsed.as_millis() as u64,
        "Rerank completed"
    );

    metrics::counter!("rerank_requests_total").increment(1);
    metrics::histogram!("rerank_batch_size").record(batch_size as f64);
    metrics::histogram!("rerank_latency_ms").record(elapsed.as_millis() as f64);

    Ok(Json(RerankResponse { scores }))
}

use crate::error::{AppError, ModelError, Result};
use crate::registry::Capability;
use crate::state::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Deserialize)]
pub struct EmbedRequest {
    pub texts: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
}

/// POST /embed - Generate one embedding per input text.
///
/// # Flow
/// 1. Check the embedder slot is Ready (503 otherwise)
/// 2. Truncate each text to the configured character limit
/// 3. Encode on the inference pool
/// 4. Return vectors in input order
pub async fn embed_handler(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<EmbedRequest>, JsonRejection>,
) -> Result<Json<EmbedResponse>> {
    let Json(request) = payload?;
    let embedder = state.registry.embedder()?;

    if request.texts.is_empty() {
        return Ok(Json(EmbedResponse {
            embeddings: Vec::new(),
        }));
    }

    let batch_size = request.texts.len();
    let texts = state.settings.embed_truncation.apply_all(&request.texts);
    let start = Instant::now();

    let embeddings = state
        .workers
        .run(move || embedder.embed(&texts))
        .await
        .map_err(|e| AppError::inference(Capability::Embed, e))?;

    if embeddings.len() != batch_size {
        return Err(AppError::inference(
            Capability::Embed,
            ModelError::Output(format!(
                "{} embeddings for {} texts",
                embeddings.len(),
                batch_size
            )),
        ));
    }

    let elapsed = start.elapsed();
    tracing::debug!(
        batch_size,
        elapsed_ms = elapsed.as_millis() as u64,
        "Embed completed"
    );

    metrics::counter!("embed_requests_total").increment(1);
    metrics::histogram!("embed_batch_size").record(batch_size as f64);
    metrics::histogram!("embed_latency_ms").record(elapsed.as_millis() as f64);

    Ok(Json(EmbedResponse { embeddings }))
}

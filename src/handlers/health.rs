use crate::registry::{Capability, RegistryStatus};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub embed_model: Option<String>,
    pub rerank_model: Option<String>,
    pub reader_model: Option<String>,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub models: RegistryStatus,
    /// Load error per failed slot, keyed like `models`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<&'static str, String>,
}

#[derive(Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub version: &'static str,
}

/// GET /health - Liveness probe with the configured model identifiers
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let model = |capability| state.registry.model_id(capability).map(str::to_string);
    Json(HealthResponse {
        status: "ok",
        embed_model: model(Capability::Embed),
        rerank_model: model(Capability::Rerank),
        reader_model: model(Capability::Read),
    })
}

/// GET /ready - Readiness probe (every configured model loaded and warmed up)
pub async fn ready_handler(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadyResponse>) {
    let models = state.registry.status();
    let errors = Capability::ALL
        .into_iter()
        .filter_map(|c| Some((c.slot_name(), state.registry.failure(c)?)))
        .collect();

    let (code, status) = if models.all_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };
    (
        code,
        Json(ReadyResponse {
            status,
            models,
            errors,
        }),
    )
}

/// GET /
pub async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Embedder inference service",
        version: env!("CARGO_PKG_VERSION"),
    })
}

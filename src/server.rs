use crate::handlers::{
    embed_handler, extract_answer_handler, health_handler, ready_handler, rerank_handler,
    root_handler,
};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::Request,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// API routes with tracing and body limits. The binary adds `/metrics`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.settings.max_body_bytes;

    Router::new()
        // Inference endpoints - batch requests need a larger body limit
        .route("/embed", post(embed_handler))
        .route("/rerank", post(rerank_handler))
        .route("/extract_answer", post(extract_answer_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        // Health endpoints
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        // Middleware
        .layer(ServiceBuilder::new().layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "request",
                    id = %Uuid::new_v4(),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        ))
        // State
        .with_state(state)
}

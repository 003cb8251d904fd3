//! HTTP-level tests for the embed, rerank and extract-answer endpoints.
//!
//! Models are in-process fakes, so these run without any model files.

mod common;

use axum::{body::Body, http::Request, http::StatusCode};
use common::{app, json_request, send, HashEmbedder, DIMENSIONS, SECRET};
use serde_json::{json, Value};

/// JSON carries the shortest f32 representation, so compare as f32.
fn floats(value: &Value) -> Vec<f32> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap() as f32)
        .collect()
}

// ============================================================================
// Health Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_health_reports_configured_models() {
    let app = app(&[("READER_MODEL_NAME", "")]);
    let (status, body) = json_request(app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["embed_model"], "test/embedder");
    assert_eq!(body["rerank_model"], "test/reranker");
    assert!(body["reader_model"].is_null());
}

#[tokio::test]
async fn test_health_stays_ok_when_a_model_failed() {
    let app = app(&[("RERANK_MODEL_NAME", "fail-reranker")]);
    let (status, body) = json_request(app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rerank_model"], "fail-reranker");
}

#[tokio::test]
async fn test_ready_when_all_configured_models_loaded() {
    let app = app(&[("READER_MODEL_NAME", "")]);
    let (status, body) = json_request(app, "GET", "/ready", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["models"]["embedder"], "ready");
    assert_eq!(body["models"]["reader"], "disabled");
    assert!(body.get("errors").is_none());
}

#[tokio::test]
async fn test_not_ready_when_a_model_failed() {
    let app = app(&[("READER_MODEL_NAME", "fail-reader")]);
    let (status, body) = json_request(app, "GET", "/ready", None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["models"]["reader"], "failed");
    assert_eq!(body["models"]["embedder"], "ready");

    let reason = body["errors"]["reader"].as_str().unwrap();
    assert!(reason.contains("fail-reader"));
    assert!(body["errors"].get("embedder").is_none());
}

#[tokio::test]
async fn test_root_describes_service() {
    let (status, body) = json_request(app(&[]), "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["version"].is_string());
}

// ============================================================================
// Embed Tests
// ============================================================================

#[tokio::test]
async fn test_embed_returns_one_vector_per_text_in_order() {
    let texts = ["Hello world", "What is Go?", "Explain concurrency in Go."];
    let (status, body) =
        json_request(app(&[]), "POST", "/embed", Some(json!({ "texts": texts }))).await;

    assert_eq!(status, StatusCode::OK);
    let embeddings = body["embeddings"].as_array().unwrap();
    assert_eq!(embeddings.len(), texts.len());

    for (embedding, text) in embeddings.iter().zip(texts) {
        let got = floats(embedding);
        assert_eq!(got.len(), DIMENSIONS);
        let expected = HashEmbedder::vector(text);
        assert!(
            got.iter().zip(&expected).all(|(a, b)| (a - b).abs() < 1e-6),
            "embedding for {:?} out of order",
            text
        );
    }
}

#[tokio::test]
async fn test_embed_empty_list_returns_empty() {
    let (status, body) =
        json_request(app(&[]), "POST", "/embed", Some(json!({ "texts": [] }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "embeddings": [] }));
}

#[tokio::test]
async fn test_embed_truncates_to_max_text_length() {
    let long = "abcdefghij".repeat(3);
    let cut = long[..10].to_string();

    let app = app(&[("MAX_TEXT_LENGTH", "10")]);
    let (_, long_body) =
        json_request(app.clone(), "POST", "/embed", Some(json!({ "texts": [long] }))).await;
    let (_, cut_body) = json_request(app, "POST", "/embed", Some(json!({ "texts": [cut] }))).await;

    assert_eq!(long_body["embeddings"], cut_body["embeddings"]);
}

#[tokio::test]
async fn test_embed_disabled_returns_503() {
    let app = app(&[("EMBED_MODEL_NAME", "")]);
    let (status, body) =
        json_request(app, "POST", "/embed", Some(json!({ "texts": ["x"] }))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], 503);
}

#[tokio::test]
async fn test_embed_disabled_returns_503_even_for_empty_input() {
    let app = app(&[("EMBED_MODEL_NAME", "")]);
    let (status, _) = json_request(app, "POST", "/embed", Some(json!({ "texts": [] }))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_embed_inference_error_is_opaque_500() {
    let app = app(&[("EMBED_MODEL_NAME", "broken-embedder")]);
    let (status, body) =
        json_request(app, "POST", "/embed", Some(json!({ "texts": ["x"] }))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal error");
    assert!(!body.to_string().contains(SECRET));
}

#[tokio::test]
async fn test_embed_missing_field_is_validation_error() {
    let (status, body) =
        json_request(app(&[]), "POST", "/embed", Some(json!({ "text": "oops" }))).await;

    assert!(status.is_client_error());
    assert!(body["error"].as_str().unwrap().contains("texts"));
}

#[tokio::test]
async fn test_embed_wrong_type_is_validation_error() {
    let (status, body) =
        json_request(app(&[]), "POST", "/embed", Some(json!({ "texts": "not a list" }))).await;

    assert!(status.is_client_error());
    assert_eq!(body["code"], status.as_u16());
}

#[tokio::test]
async fn test_malformed_json_is_validation_error() {
    let req = Request::builder()
        .method("POST")
        .uri("/embed")
        .header("content-type", "application/json")
        .body(Body::from("{\"texts\": ["))
        .unwrap();
    let (status, body) = send(app(&[]), req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

// ============================================================================
// Rerank Tests
// ============================================================================

#[tokio::test]
async fn test_rerank_scores_follow_candidate_order() {
    let body = json!({
        "query": "What is Go?",
        "texts": ["Go is a language.", "Python is popular."]
    });
    let (status, response) = json_request(app(&[]), "POST", "/rerank", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    let scores = floats(&response["scores"]);
    assert_eq!(scores.len(), 2);
    assert!(scores[0] > scores[1], "relevant candidate should score higher");
}

#[tokio::test]
async fn test_rerank_scores_are_raw_not_squashed() {
    let body = json!({ "query": "go", "texts": ["go go", "nothing here at all"] });
    let (_, response) = json_request(app(&[]), "POST", "/rerank", Some(body)).await;

    let scores = floats(&response["scores"]);
    assert!(scores.iter().any(|s| !(0.0..=1.0).contains(s)));
}

#[tokio::test]
async fn test_rerank_is_deterministic() {
    let app = app(&[]);
    let body = json!({
        "query": "concurrency in Go",
        "texts": ["Goroutines give Go concurrency.", "Rust has ownership.", "Go is fast."]
    });

    let (_, first) = json_request(app.clone(), "POST", "/rerank", Some(body.clone())).await;
    let (_, second) = json_request(app, "POST", "/rerank", Some(body)).await;

    assert_eq!(first["scores"], second["scores"]);
}

#[tokio::test]
async fn test_rerank_empty_candidates_returns_empty() {
    let body = json!({ "query": "anything", "texts": [] });
    let (status, response) = json_request(app(&[]), "POST", "/rerank", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response, json!({ "scores": [] }));
}

#[tokio::test]
async fn test_rerank_disabled_returns_503() {
    let app = app(&[("RERANK_MODEL_NAME", "")]);
    let body = json!({ "query": "q", "texts": ["a"] });
    let (status, response) = json_request(app, "POST", "/rerank", Some(body)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(response["error"].as_str().unwrap().contains("reranker"));
}

#[tokio::test]
async fn test_reranker_load_failure_does_not_affect_embedder() {
    let app = app(&[("RERANK_MODEL_NAME", "fail-reranker")]);

    let (rerank_status, _) = json_request(
        app.clone(),
        "POST",
        "/rerank",
        Some(json!({ "query": "q", "texts": ["a"] })),
    )
    .await;
    assert_eq!(rerank_status, StatusCode::SERVICE_UNAVAILABLE);

    let (embed_status, body) =
        json_request(app, "POST", "/embed", Some(json!({ "texts": ["still works"] }))).await;
    assert_eq!(embed_status, StatusCode::OK);
    assert_eq!(body["embeddings"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_rerank_inference_error_is_opaque_500() {
    let app = app(&[("RERANK_MODEL_NAME", "broken-reranker")]);
    let body = json!({ "query": "q", "texts": ["a"] });
    let (status, response) = json_request(app, "POST", "/rerank", Some(body)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response["error"], "Internal error");
}

#[tokio::test]
async fn test_rerank_missing_query_is_validation_error() {
    let (status, _) =
        json_request(app(&[]), "POST", "/rerank", Some(json!({ "texts": ["a"] }))).await;
    assert!(status.is_client_error());
}

// ============================================================================
// Extract Answer Tests
// ============================================================================

#[tokio::test]
async fn test_extract_answer_span_matches_context() {
    let context = "Go (often referred to as Golang) is a statically typed language designed at Google.";
    let body = json!({ "question": "Who designed Golang?", "context": context });
    let (status, response) = json_request(app(&[]), "POST", "/extract_answer", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    let start = response["start"].as_u64().unwrap() as usize;
    let end = response["end"].as_u64().unwrap() as usize;
    let answer = response["answer"].as_str().unwrap();
    let confidence = response["confidence"].as_f64().unwrap();

    assert!(start <= end && end <= context.chars().count());
    let slice: String = context.chars().skip(start).take(end - start).collect();
    assert_eq!(slice, answer);
    assert_eq!(answer, "Golang");
    assert!((0.0..=1.0).contains(&confidence));
}

#[tokio::test]
async fn test_extract_answer_offsets_are_characters() {
    let context = "Café résumé: Rust is memory safe";
    let body = json!({ "question": "Is Rust safe?", "context": context });
    let (_, response) = json_request(app(&[]), "POST", "/extract_answer", Some(body)).await;

    assert_eq!(response["answer"], "Rust");
    assert_eq!(response["start"], 13);
    assert_eq!(response["end"], 17);
}

#[tokio::test]
async fn test_extract_answer_disabled_returns_503() {
    let app = app(&[("READER_MODEL_NAME", "")]);
    let body = json!({ "question": "q", "context": "c" });
    let (status, _) = json_request(app, "POST", "/extract_answer", Some(body)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_extract_answer_empty_context_is_rejected() {
    let body = json!({ "question": "What?", "context": "   " });
    let (status, response) = json_request(app(&[]), "POST", "/extract_answer", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].as_str().unwrap().contains("context"));
}

#[tokio::test]
async fn test_extract_answer_inference_error_is_opaque_500() {
    let app = app(&[("READER_MODEL_NAME", "broken-reader")]);
    let body = json!({ "question": "q", "context": "c" });
    let (status, response) = json_request(app, "POST", "/extract_answer", Some(body)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!response.to_string().contains(SECRET));
}

#[tokio::test]
async fn test_reader_context_truncation() {
    let app = app(&[("READER_MAX_CONTEXT_LENGTH", "12")]);
    let body = json!({ "question": "Where is Rust?", "context": "Nothing here. Rust is later." });
    let (status, response) = json_request(app, "POST", "/extract_answer", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    // "Rust" sits beyond the 12-character cut.
    assert_eq!(response["answer"], "");
}

//! Shared fixtures: fake models, a configurable loader and request helpers.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use embedder::{
    build_router, Answer, AppState, Embedder, ModelError, ModelLoader, ModelRegistry, Reader,
    Reranker, Settings,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tower::ServiceExt;

pub const DIMENSIONS: usize = 384;

/// Deterministic embedding derived from a hash of the text.
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        text.hash(&mut hasher);
        let mut seed = hasher.finish();
        (0..DIMENSIONS)
            .map(|_| {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((seed >> 40) as f32 / (1u64 << 24) as f32) - 0.5
            })
            .collect()
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Scores a candidate by how many query words it contains, minus a length
/// penalty, so the result is an unbounded logit-like number.
pub struct OverlapReranker;

impl Reranker for OverlapReranker {
    fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>, ModelError> {
        let query = words(query);
        Ok(candidates
            .iter()
            .map(|c| {
                let candidate = words(c);
                let hits = query.iter().filter(|w| candidate.contains(w)).count();
                hits as f32 * 4.0 - candidate.len() as f32 * 0.1 - 2.0
            })
            .collect())
    }
}

/// Answers with the first context word that also appears in the question.
pub struct EchoReader;

impl Reader for EchoReader {
    fn answer(&self, question: &str, context: &str) -> Result<Answer, ModelError> {
        let question = words(question);
        let chars: Vec<char> = context.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            if chars[i].is_alphanumeric() {
                let start = i;
                while i < chars.len() && chars[i].is_alphanumeric() {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect::<String>().to_lowercase();
                if question.contains(&word) {
                    return Ok(Answer::from_char_span(context, start, i, 0.75));
                }
            } else {
                i += 1;
            }
        }
        Ok(Answer::from_char_span(context, 0, 0, 0.0))
    }
}

/// Fails every call with a message that must not reach the client.
pub struct BrokenModel;

pub const SECRET: &str = "tensor shape mismatch in /opt/models/secret.onnx";

impl Embedder for BrokenModel {
    fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        Err(ModelError::Inference(SECRET.to_string()))
    }
}

impl Reranker for BrokenModel {
    fn score(&self, _query: &str, _candidates: &[String]) -> Result<Vec<f32>, ModelError> {
        Err(ModelError::Inference(SECRET.to_string()))
    }
}

impl Reader for BrokenModel {
    fn answer(&self, _question: &str, _context: &str) -> Result<Answer, ModelError> {
        Err(ModelError::Inference(SECRET.to_string()))
    }
}

/// Identifiers pick the behaviour: "fail-*" fails to load, "broken-*"
/// loads a model whose inference always errors, anything else works.
pub struct FakeLoader;

fn check_load(model_id: &str) -> Result<(), ModelError> {
    if model_id.starts_with("fail") {
        return Err(ModelError::Load(format!("no such model: {}", model_id)));
    }
    Ok(())
}

impl ModelLoader for FakeLoader {
    fn load_embedder(&self, model_id: &str) -> Result<Arc<dyn Embedder>, ModelError> {
        check_load(model_id)?;
        if model_id.starts_with("broken") {
            return Ok(Arc::new(BrokenModel));
        }
        Ok(Arc::new(HashEmbedder))
    }

    fn load_reranker(&self, model_id: &str) -> Result<Arc<dyn Reranker>, ModelError> {
        check_load(model_id)?;
        if model_id.starts_with("broken") {
            return Ok(Arc::new(BrokenModel));
        }
        Ok(Arc::new(OverlapReranker))
    }

    fn load_reader(&self, model_id: &str) -> Result<Arc<dyn Reader>, ModelError> {
        check_load(model_id)?;
        if model_id.starts_with("broken") {
            return Ok(Arc::new(BrokenModel));
        }
        Ok(Arc::new(EchoReader))
    }
}

pub fn settings(vars: &[(&str, &str)]) -> Settings {
    let mut map: HashMap<String, String> = [
        ("EMBED_MODEL_NAME", "test/embedder"),
        ("RERANK_MODEL_NAME", "test/reranker"),
        ("READER_MODEL_NAME", "test/reader"),
        ("INFERENCE_WORKERS", "2"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in vars {
        map.insert(k.to_string(), v.to_string());
    }
    Settings::from_lookup(|key| map.get(key).cloned()).expect("valid test settings")
}

/// Router over a registry loaded through `FakeLoader`.
pub fn app(vars: &[(&str, &str)]) -> Router {
    let settings = Arc::new(settings(vars));
    let registry = Arc::new(ModelRegistry::new(&settings));
    registry.load(&FakeLoader).expect("first load");
    build_router(Arc::new(AppState::new(settings, registry)))
}

/// Helper to make a JSON request to the router.
pub async fn json_request(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let req = match method {
        "GET" => Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
        "POST" => Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.unwrap_or(json!({})).to_string()))
            .unwrap(),
        _ => panic!("Unsupported method"),
    };
    send(app, req).await
}

/// Send a prepared request and decode the JSON body.
pub async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));

    (status, body)
}

//! Embedder - embedding, reranking and extractive QA inference microservice
//!
//! This library exposes the core components of the service, enabling
//! integration tests to drive the HTTP surface in-process with fake models.

pub mod config;
pub mod error;
pub mod handlers;
pub mod inference;
pub mod registry;
pub mod server;
pub mod state;
pub mod truncate;
pub mod workers;

// Re-export key types for convenience
pub use config::Settings;
pub use error::{AppError, ModelError, Result};
pub use inference::{Answer, Embedder, OnnxModelLoader, Reader, Reranker};
pub use registry::{Capability, ModelLoader, ModelRegistry, SlotStatus};
pub use server::build_router;
pub use state::AppState;

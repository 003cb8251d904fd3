pub mod embed;
pub mod health;
pub mod qa;
pub mod rerank;

pub use embed::embed_handler;
pub use health::{health_handler, ready_handler, root_handler};
pub use qa::extract_answer_handler;
pub use rerank::rerank_handler;

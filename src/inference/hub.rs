//! Model identifier resolution.
//!
//! An identifier naming an existing directory is used in place. Anything else
//! is treated as a Hugging Face repository and fetched into the hub cache.

use crate::error::ModelError;
use hf_hub::api::sync::{Api, ApiBuilder};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const TOKENIZER_FILE: &str = "tokenizer.json";
const CONFIG_FILE: &str = "config.json";
const FALLBACK_ONNX_FILE: &str = "model.onnx";

/// Architectures whose exported graphs take a `token_type_ids` input.
const SEGMENT_ID_ARCHITECTURES: &[&str] = &["bert", "albert", "electra", "mobilebert", "xlnet"];

/// Files needed to build one ONNX model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub model_id: String,
    pub onnx: PathBuf,
    pub tokenizer: PathBuf,
    /// `model_type` from `config.json`, when present.
    pub model_type: Option<String>,
}

impl ModelFiles {
    pub fn uses_token_type_ids(&self) -> bool {
        self.model_type
            .as_deref()
            .map(|t| SEGMENT_ID_ARCHITECTURES.contains(&t))
            .unwrap_or(false)
    }
}

#[derive(Deserialize)]
struct ModelConfig {
    model_type: Option<String>,
}

pub struct ModelHub {
    onnx_file: String,
    cache_dir: Option<PathBuf>,
    token: Option<String>,
}

impl ModelHub {
    pub fn new(onnx_file: impl Into<String>, cache_dir: Option<PathBuf>, token: Option<String>) -> Self {
        Self {
            onnx_file: onnx_file.into(),
            cache_dir,
            token,
        }
    }

    /// Resolve an identifier to local files, downloading when needed.
    pub fn resolve(&self, model_id: &str) -> Result<ModelFiles, ModelError> {
        let local = Path::new(model_id);
        if local.is_dir() {
            return self.from_dir(model_id, local);
        }
        self.fetch(model_id)
    }

    /// Use a directory laid out like a model repository.
    pub fn from_dir(&self, model_id: &str, dir: &Path) -> Result<ModelFiles, ModelError> {
        let resolve_err = |reason: String| ModelError::Resolve {
            model: model_id.to_string(),
            reason,
        };

        let onnx = [dir.join(&self.onnx_file), dir.join(FALLBACK_ONNX_FILE)]
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| {
                resolve_err(format!(
                    "no {} or {} in {}",
                    self.onnx_file,
                    FALLBACK_ONNX_FILE,
                    dir.display()
                ))
            })?;

        let tokenizer = dir.join(TOKENIZER_FILE);
        if !tokenizer.is_file() {
            return Err(resolve_err(format!("no {} in {}", TOKENIZER_FILE, dir.display())));
        }

        let config = dir.join(CONFIG_FILE);
        let model_type = if config.is_file() {
            read_model_type(&config).map_err(resolve_err)?
        } else {
            None
        };

        Ok(ModelFiles {
            model_id: model_id.to_string(),
            onnx,
            tokenizer,
            model_type,
        })
    }

    /// Download (or reuse from cache) the repository files.
    fn fetch(&self, model_id: &str) -> Result<ModelFiles, ModelError> {
        let resolve_err = |reason: String| ModelError::Resolve {
            model: model_id.to_string(),
            reason,
        };

        let api = self.api().map_err(|e| resolve_err(e.to_string()))?;
        let repo = api.model(model_id.to_string());

        let onnx = repo
            .get(&self.onnx_file)
            .or_else(|_| repo.get(FALLBACK_ONNX_FILE))
            .map_err(|e| resolve_err(format!("{}: {}", self.onnx_file, e)))?;
        let tokenizer = repo
            .get(TOKENIZER_FILE)
            .map_err(|e| resolve_err(format!("{}: {}", TOKENIZER_FILE, e)))?;

        // Missing config only means we cannot tell the architecture.
        let model_type = match repo.get(CONFIG_FILE) {
            Ok(path) => read_model_type(&path).map_err(resolve_err)?,
            Err(e) => {
                tracing::warn!(model = model_id, error = %e, "No config.json, assuming no token_type_ids");
                None
            }
        };

        tracing::info!(model = model_id, onnx = %onnx.display(), "Model files ready");

        Ok(ModelFiles {
            model_id: model_id.to_string(),
            onnx,
            tokenizer,
            model_type,
        })
    }

    fn api(&self) -> Result<Api, hf_hub::api::sync::ApiError> {
        let mut builder = ApiBuilder::new()
            .with_progress(false)
            .with_token(self.token.clone());
        if let Some(dir) = &self.cache_dir {
            builder = builder.with_cache_dir(dir.clone());
        }
        builder.build()
    }
}

fn read_model_type(path: &Path) -> Result<Option<String>, String> {
    let raw = fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let config: ModelConfig =
        serde_json::from_str(&raw).map_err(|e| format!("{}: {}", path.display(), e))?;
    Ok(config.model_type.map(|t| t.to_lowercase()))
}

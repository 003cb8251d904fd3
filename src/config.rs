use crate::truncate::TruncationPolicy;
use anyhow::Context;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Operating mode for the inference workers.
/// Controls worker count and intra_threads settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    /// Optimized for single requests with low latency.
    /// workers=1, intra_threads=all cores
    Single,
    /// Optimized for concurrent requests with high throughput.
    /// workers=all cores, intra_threads=1
    Concurrent,
    /// Use individual environment variable settings.
    Custom,
}

impl OperatingMode {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "single" | "low-latency" | "single-request" => Self::Single,
            "concurrent" | "high-throughput" | "multi" => Self::Concurrent,
            _ => Self::Custom,
        }
    }
}

/// How raw cross-encoder logits are turned into response scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreActivation {
    /// Raw logits, unbounded.
    Identity,
    /// Sigmoid activation: 1 / (1 + e^-x)
    Sigmoid,
}

impl FromStr for ScoreActivation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "" | "none" | "identity" | "raw" => Ok(Self::Identity),
            "sigmoid" => Ok(Self::Sigmoid),
            other => anyhow::bail!("unknown rerank activation '{}'", other),
        }
    }
}

/// Log output format for the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Knobs for the extractive QA reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderSettings {
    /// Token length of one question + context window.
    pub max_seq_length: usize,
    /// Overlap in tokens between consecutive context windows.
    pub doc_stride: usize,
    /// Longest answer span, in tokens.
    pub max_answer_length: usize,
}

/// Immutable service settings, resolved once at process start.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Embedder identifier. `None` disables the capability.
    pub embed_model_name: Option<String>,
    /// Reranker identifier. `None` disables the capability.
    pub rerank_model_name: Option<String>,
    /// Reader identifier. `None` disables the capability.
    pub reader_model_name: Option<String>,
    pub embed_truncation: TruncationPolicy,
    pub rerank_truncation: TruncationPolicy,
    pub reader_truncation: TruncationPolicy,
    /// Token cap for encoder and cross-encoder inputs.
    pub max_sequence_length: usize,
    pub reader: ReaderSettings,
    pub rerank_activation: ScoreActivation,
    /// ONNX graph location inside a model repository or directory.
    pub onnx_file: String,
    pub model_cache_dir: Option<PathBuf>,
    pub hf_token: Option<String>,
    /// Number of inference jobs allowed to run at once.
    /// Also the number of ONNX sessions created per model.
    pub workers: usize,
    /// Number of threads per ONNX session for intra-op parallelism.
    pub intra_threads: usize,
    pub max_body_bytes: usize,
    pub shutdown_timeout_secs: u64,
}

impl Settings {
    /// Load settings from environment variables with sensible defaults.
    ///
    /// The `EMBEDDER_MODE` environment variable controls preset configurations:
    /// - `single` / `low-latency`: one worker that uses every core
    /// - `concurrent` / `high-throughput`: one single-threaded worker per core
    /// - Unset or other: uses `INFERENCE_WORKERS` / `INTRA_THREADS` or defaults
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let num_cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        let (workers, intra_threads) = match OperatingMode::parse(&var("EMBEDDER_MODE", "")) {
            OperatingMode::Single => (1, num_cores),
            OperatingMode::Concurrent => (num_cores, 1),
            OperatingMode::Custom => {
                let threads: usize = parse(&lookup, "INTRA_THREADS", "1")?;
                let workers = match lookup("INFERENCE_WORKERS") {
                    Some(v) => v
                        .parse()
                        .with_context(|| format!("invalid INFERENCE_WORKERS '{}'", v))?,
                    None => (num_cores / threads.max(1)).max(1),
                };
                (workers, threads)
            }
        };
        if workers == 0 || intra_threads == 0 {
            anyhow::bail!("INFERENCE_WORKERS and INTRA_THREADS must be at least 1");
        }

        let log_format = match var("LOG_FORMAT", "text").to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let reader = ReaderSettings {
            max_seq_length: parse(&lookup, "READER_MAX_SEQ_LENGTH", "384")?,
            doc_stride: parse(&lookup, "READER_DOC_STRIDE", "128")?,
            max_answer_length: parse(&lookup, "READER_MAX_ANSWER_LENGTH", "15")?,
        };
        if reader.doc_stride >= reader.max_seq_length {
            anyhow::bail!(
                "READER_DOC_STRIDE ({}) must be smaller than READER_MAX_SEQ_LENGTH ({})",
                reader.doc_stride,
                reader.max_seq_length
            );
        }

        Ok(Self {
            host: var("HOST", "0.0.0.0"),
            port: parse(&lookup, "PORT", "5001")?,
            log_level: var("LOG_LEVEL", "info").to_lowercase(),
            log_format,
            embed_model_name: model_name(
                &lookup,
                "EMBED_MODEL_NAME",
                "sentence-transformers/all-MiniLM-L6-v2",
            ),
            rerank_model_name: model_name(
                &lookup,
                "RERANK_MODEL_NAME",
                "cross-encoder/ms-marco-MiniLM-L-6-v2",
            ),
            reader_model_name: model_name(
                &lookup,
                "READER_MODEL_NAME",
                "distilbert/distilbert-base-cased-distilled-squad",
            ),
            embed_truncation: TruncationPolicy::max_chars(parse(
                &lookup,
                "MAX_TEXT_LENGTH",
                "5000",
            )?),
            rerank_truncation: optional_cap(&lookup, "RERANK_MAX_TEXT_LENGTH")?,
            reader_truncation: optional_cap(&lookup, "READER_MAX_CONTEXT_LENGTH")?,
            max_sequence_length: parse(&lookup, "MAX_SEQ_LENGTH", "512")?,
            reader,
            rerank_activation: var("RERANK_ACTIVATION", "none").parse()?,
            onnx_file: var("ONNX_FILE", "onnx/model.onnx"),
            model_cache_dir: non_empty(lookup("MODEL_CACHE_DIR")).map(PathBuf::from),
            hf_token: non_empty(lookup("HF_TOKEN")),
            workers,
            intra_threads,
            max_body_bytes: parse(&lookup, "MAX_BODY_BYTES", "52428800")?,
            shutdown_timeout_secs: parse(&lookup, "SHUTDOWN_TIMEOUT", "5")?,
        })
    }

    /// Default `EnvFilter` directives when `RUST_LOG` is not set.
    pub fn log_directives(&self) -> String {
        format!("embedder={0},tower_http={0}", self.log_level)
    }
}

fn parse<T, F>(lookup: &F, key: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .with_context(|| format!("invalid {} '{}'", key, raw))
}

/// Empty string means "disabled"; an unset variable falls back to the default.
fn model_name<F>(lookup: &F, key: &str, default: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => non_empty(Some(value)),
        None => Some(default.to_string()),
    }
}

fn optional_cap<F>(lookup: &F, key: &str) -> anyhow::Result<TruncationPolicy>
where
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup(key)) {
        Some(v) => Ok(TruncationPolicy::max_chars(
            v.parse()
                .with_context(|| format!("invalid {} '{}'", key, v))?,
        )),
        None => Ok(TruncationPolicy::Unbounded),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

use crate::registry::{Capability, Unavailable};
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failures raised below the handler boundary: model resolution, loading,
/// tokenization and runtime errors. Never shown to callers verbatim.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to resolve model '{model}': {reason}")]
    Resolve { model: String, reason: String },

    #[error("Model load failed: {0}")]
    Load(String),

    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unexpected model output: {0}")]
    Output(String),

    #[error("Inference worker failed: {0}")]
    Worker(String),
}

impl From<ort::Error> for ModelError {
    fn from(err: ort::Error) -> Self {
        ModelError::Inference(err.to_string())
    }
}

/// Request-level error taxonomy surfaced over HTTP.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {message}")]
    ValidationError { status: StatusCode, message: String },

    #[error(transparent)]
    Unavailable(#[from] Unavailable),

    #[error("{capability} inference failed: {source}")]
    InferenceError {
        capability: Capability,
        #[source]
        source: ModelError,
    },
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::ValidationError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn inference(capability: Capability, source: ModelError) -> Self {
        AppError::InferenceError { capability, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError { status, .. } => *status,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InferenceError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::ValidationError { message, .. } => {
                tracing::warn!(error = %message, "Validation error");
                message.clone()
            }
            AppError::Unavailable(unavailable) => {
                tracing::warn!(
                    capability = %unavailable.capability,
                    state = ?unavailable.state,
                    "Capability unavailable"
                );
                unavailable.to_string()
            }
            AppError::InferenceError { capability, source } => {
                tracing::error!(capability = %capability, error = %source, "Model inference error");
                "Internal error".to_string()
            }
        };

        let body = Json(ErrorResponse {
            error: message,
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

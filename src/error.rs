//! Request-path error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type PredictResult<T> = Result<T, PredictError>;

/// Who is responsible for a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The request itself is malformed
    Client,
    /// The pipeline or the model failed on a well-formed request
    Server,
}

/// Errors raised while classifying a batch
#[derive(Debug, Error)]
pub enum PredictError {
    // Client faults
    #[error("request body is not valid JSON: {0}")]
    MalformedBody(String),

    #[error("request body must contain a `data` array of transactions")]
    MissingBatch,

    #[error("`data` must be an array of transactions, got {0}")]
    InvalidBatch(&'static str),

    #[error("record {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("record {index}: missing required field `{field}`")]
    MissingField { index: usize, field: String },

    #[error("record {index}: field `{field}` is invalid: {reason}")]
    InvalidField {
        index: usize,
        field: String,
        reason: String,
    },

    // Server faults
    #[error("feature count mismatch: model expects {expected} features, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PredictError {
    /// Classify the error at the point it was raised
    pub fn fault(&self) -> Fault {
        match self {
            PredictError::MalformedBody(_)
            | PredictError::MissingBatch
            | PredictError::InvalidBatch(_)
            | PredictError::InvalidRecord { .. }
            | PredictError::MissingField { .. }
            | PredictError::InvalidField { .. } => Fault::Client,
            PredictError::FeatureCountMismatch { .. }
            | PredictError::Inference(_)
            | PredictError::Internal(_) => Fault::Server,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.fault() {
            Fault::Client => StatusCode::BAD_REQUEST,
            Fault::Server => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            PredictError::Inference(msg) | PredictError::Internal(msg) => {
                tracing::error!(error = %msg, "Prediction failed");
                "Internal server error".to_string()
            }
            PredictError::FeatureCountMismatch { .. } => {
                tracing::error!(error = %self, "Feature pipeline does not match the model");
                self.to_string()
            }
            _ => {
                tracing::warn!(error = %self, "Rejected malformed request");
                self.to_string()
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

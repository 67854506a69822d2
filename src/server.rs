//! HTTP surface: liveness, health and the predict endpoint

use crate::error::{PredictError, PredictResult};
use crate::models::artifact::ModelArtifact;
use crate::types::prediction::PredictionResponse;
use crate::types::transaction::{json_kind, TransactionRecord};
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Key of the transaction batch in the request body
pub const BATCH_KEY: &str = "data";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub artifact: Arc<ModelArtifact>,
}

impl AppState {
    pub fn new(artifact: ModelArtifact) -> Self {
        Self {
            artifact: Arc::new(artifact),
        }
    }
}

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn root() -> &'static str {
    "Fraud classification service is running"
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model: String,
    features: usize,
    threshold: f64,
    timestamp: i64,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let artifact = &state.artifact;
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model: artifact.engine().model_name().to_string(),
        features: artifact.extractor().feature_count(),
        threshold: artifact.threshold(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> PredictResult<Json<PredictionResponse>> {
    let start_time = Instant::now();
    let Json(body) = payload.map_err(|rejection| PredictError::MalformedBody(rejection.body_text()))?;
    let records = parse_batch(&body)?;
    let batch_size = records.len();

    // Scoring is CPU-bound; keep it off the async workers
    let artifact = state.artifact.clone();
    let response = tokio::task::spawn_blocking(move || artifact.predict(&records))
        .await
        .map_err(|e| PredictError::Internal(format!("prediction task failed: {}", e)))??;

    info!(
        records = batch_size,
        fraud = response.fraud_count(),
        processing_time_us = start_time.elapsed().as_micros() as u64,
        "Batch classified"
    );

    Ok(Json(response))
}

/// Pull the transaction batch out of a request body
pub fn parse_batch(body: &Value) -> PredictResult<Vec<TransactionRecord>> {
    let batch = body.get(BATCH_KEY).ok_or(PredictError::MissingBatch)?;
    let items = batch
        .as_array()
        .ok_or_else(|| PredictError::InvalidBatch(json_kind(batch)))?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| TransactionRecord::from_json(index, item))
        .collect()
}

//! Fraud Classification Service Library
//!
//! Accepts batches of transactions over HTTP, derives balance-error and
//! category features, scores them with a pre-trained classifier and returns
//! `Fraud` / `Genuine` labels.

pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod models;
pub mod server;
pub mod types;

pub use crate::config::AppConfig;
pub use error::{Fault, PredictError, PredictResult};
pub use feature_extractor::FeatureExtractor;
pub use models::{DecisionEngine, ModelArtifact, ProbabilityModel};
pub use server::{create_router, AppState};
pub use types::{Label, PredictionResponse, TransactionRecord, TransactionType};

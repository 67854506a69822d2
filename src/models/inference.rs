//! Decision engine: probability model plus fixed threshold

use crate::error::{PredictError, PredictResult};
use crate::types::prediction::Label;
use std::sync::Arc;
use tracing::debug;

/// A trained classifier that estimates the probability of the Fraud class
pub trait ProbabilityModel: Send + Sync {
    /// Model name for logs and the health endpoint
    fn name(&self) -> &str;

    /// Number of features the model expects per row, when known
    fn input_width(&self) -> Option<usize>;

    /// Positive-class probability for every row of `batch`, in order
    fn predict_proba(&self, batch: &[Vec<f32>]) -> anyhow::Result<Vec<f32>>;
}

/// Scores feature vectors and thresholds them into labels
#[derive(Clone)]
pub struct DecisionEngine {
    model: Arc<dyn ProbabilityModel>,
    threshold: f64,
    /// Threshold at model precision; comparing against the f64 value would
    /// turn an f32 tie such as 0.3 into Fraud
    cutoff: f32,
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("model", &self.model.name())
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl DecisionEngine {
    pub fn new(model: Arc<dyn ProbabilityModel>, threshold: f64) -> Self {
        Self {
            model,
            threshold,
            cutoff: threshold as f32,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn input_width(&self) -> Option<usize> {
        self.model.input_width()
    }

    /// Label every vector of the batch.
    ///
    /// Width mismatches are caught before the model runs so they surface as
    /// a pipeline fault rather than an opaque runtime error.
    pub fn classify(&self, batch: &[Vec<f32>]) -> PredictResult<Vec<Label>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(expected) = self.model.input_width() {
            if let Some(row) = batch.iter().find(|row| row.len() != expected) {
                return Err(PredictError::FeatureCountMismatch {
                    expected,
                    actual: row.len(),
                });
            }
        }

        let probabilities = self
            .model
            .predict_proba(batch)
            .map_err(|e| PredictError::Inference(format!("{}: {:#}", self.model.name(), e)))?;

        if probabilities.len() != batch.len() {
            return Err(PredictError::Inference(format!(
                "{} returned {} probabilities for {} rows",
                self.model.name(),
                probabilities.len(),
                batch.len()
            )));
        }

        let labels: Vec<Label> = probabilities
            .iter()
            .map(|&p| Label::from_probability(p, self.cutoff))
            .collect();

        debug!(
            model = %self.model.name(),
            rows = batch.len(),
            fraud = labels.iter().filter(|l| **l == Label::Fraud).count(),
            "Batch classified"
        );

        Ok(labels)
    }
}

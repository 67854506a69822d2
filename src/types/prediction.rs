//! Prediction output data structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Display label for a classified transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Genuine,
    Fraud,
}

impl Label {
    /// Threshold a positive-class probability.
    ///
    /// Strictly greater than the threshold is Fraud; a tie is Genuine.
    pub fn from_probability(probability: f32, threshold: f32) -> Self {
        Self::from_class(u8::from(probability > threshold))
    }

    /// Map a binary class id (1 = fraud) to its label
    pub fn from_class(class: u8) -> Self {
        if class == 1 {
            Label::Fraud
        } else {
            Label::Genuine
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Genuine => "Genuine",
            Label::Fraud => "Fraud",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response body of the predict endpoint, aligned with the request batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predictions: Vec<Label>,
}

impl PredictionResponse {
    pub fn new(predictions: Vec<Label>) -> Self {
        Self { predictions }
    }

    /// Number of records labelled Fraud
    pub fn fraud_count(&self) -> usize {
        self.predictions.iter().filter(|l| **l == Label::Fraud).count()
    }
}

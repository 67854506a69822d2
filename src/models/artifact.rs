//! Model artifact: column order, classifier and decision threshold.
//!
//! The artifact is described by a JSON manifest:
//!
//! ```json
//! {
//!   "ordered_columns": ["amount", "oldbalanceOrg", "..."],
//!   "rf_model": "rf_model.onnx",
//!   "rf_model_threshold": 0.42,
//!   "n_features_in": 13
//! }
//! ```
//!
//! `rf_model` is resolved relative to the manifest's directory unless it is
//! absolute. `n_features_in` is optional.

use crate::error::PredictResult;
use crate::feature_extractor::FeatureExtractor;
use crate::models::inference::{DecisionEngine, ProbabilityModel};
use crate::models::loader::OnnxClassifier;
use crate::types::prediction::PredictionResponse;
use crate::types::transaction::TransactionRecord;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// On-disk description of a trained model
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactManifest {
    /// Feature names in the order the model was fitted on
    pub ordered_columns: Vec<String>,
    /// Path of the ONNX classifier
    pub rf_model: PathBuf,
    /// Probability above which a transaction is Fraud
    pub rf_model_threshold: f64,
    /// Feature count recorded at training time
    #[serde(default)]
    pub n_features_in: Option<usize>,
}

impl ArtifactManifest {
    /// Read and validate a manifest file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model artifact {}", path.display()))?;
        let manifest: ArtifactManifest = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid model artifact {}", path.display()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        validate_columns(&self.ordered_columns)?;
        validate_threshold(self.rf_model_threshold)?;

        if let Some(n) = self.n_features_in {
            if n != self.ordered_columns.len() {
                bail!(
                    "Model was trained on {} features but ordered_columns lists {}",
                    n,
                    self.ordered_columns.len()
                );
            }
        }
        Ok(())
    }

    /// Classifier path, resolved against the manifest location
    pub fn model_path(&self, manifest_path: &Path) -> PathBuf {
        if self.rf_model.is_absolute() {
            self.rf_model.clone()
        } else {
            manifest_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(&self.rf_model)
        }
    }
}

fn validate_columns(columns: &[String]) -> Result<()> {
    if columns.is_empty() {
        bail!("ordered_columns must not be empty");
    }
    let mut seen = HashSet::new();
    for column in columns {
        if !seen.insert(column.as_str()) {
            bail!("ordered_columns lists `{}` more than once", column);
        }
    }
    Ok(())
}

fn validate_threshold(threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        bail!("rf_model_threshold must be within [0, 1], got {}", threshold);
    }
    Ok(())
}

/// Loaded, immutable model artifact shared by all requests
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    extractor: FeatureExtractor,
    engine: DecisionEngine,
}

impl ModelArtifact {
    /// Load the manifest and its ONNX classifier
    pub fn load<P: AsRef<Path>>(manifest_path: P, onnx_threads: usize) -> Result<Self> {
        let manifest_path = manifest_path.as_ref();
        let manifest = ArtifactManifest::from_path(manifest_path)?;
        let model_path = manifest.model_path(manifest_path);

        // The classifier reports the graph's width, so `from_parts` can
        // catch a model fitted on a different column set
        let classifier = OnnxClassifier::load(&model_path, manifest.n_features_in, onnx_threads)?;

        Self::from_parts(
            manifest.ordered_columns,
            Arc::new(classifier),
            manifest.rf_model_threshold,
        )
        .with_context(|| format!("Invalid model artifact {}", manifest_path.display()))
    }

    /// Assemble an artifact from an already constructed classifier
    pub fn from_parts(
        ordered_columns: Vec<String>,
        model: Arc<dyn ProbabilityModel>,
        threshold: f64,
    ) -> Result<Self> {
        validate_columns(&ordered_columns)?;
        validate_threshold(threshold)?;

        if let Some(width) = model.input_width() {
            if width != ordered_columns.len() {
                bail!(
                    "Model {} expects {} features but ordered_columns lists {}",
                    model.name(),
                    width,
                    ordered_columns.len()
                );
            }
        }

        let extractor = FeatureExtractor::new(&ordered_columns);
        let engine = DecisionEngine::new(model, threshold);

        info!(
            model = %engine.model_name(),
            features = extractor.feature_count(),
            threshold = threshold,
            extra_columns = ?extractor.extra_columns(),
            "Model artifact ready"
        );

        Ok(Self { extractor, engine })
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn threshold(&self) -> f64 {
        self.engine.threshold()
    }

    /// Derive features for the batch and label every record
    pub fn predict(&self, records: &[TransactionRecord]) -> PredictResult<PredictionResponse> {
        let features = self.extractor.extract_batch(records)?;
        let labels = self.engine.classify(&features)?;
        Ok(PredictionResponse::new(labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PredictError;
    use crate::models::inference::tests::FixedModel;
    use crate::types::prediction::Label;
    use std::io::Write;

    fn columns() -> Vec<String> {
        [
            "amount",
            "oldbalanceOrg",
            "newbalanceOrig",
            "oldbalanceDest",
            "newbalanceDest",
            "amountOrig",
            "amountDest",
            "errorBalanceOrig",
            "errorBalanceDest",
            "CASH_IN",
            "CASH_OUT",
            "DEBIT",
            "PAYMENT",
            "TRANSFER",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn write_manifest(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_manifest_parsing() {
        let file = write_manifest(
            r#"{"ordered_columns": ["amount", "TRANSFER"], "rf_model": "rf.onnx", "rf_model_threshold": 0.35}"#,
        );

        let manifest = ArtifactManifest::from_path(file.path()).unwrap();

        assert_eq!(manifest.ordered_columns, vec!["amount", "TRANSFER"]);
        assert_eq!(manifest.rf_model_threshold, 0.35);
        assert_eq!(manifest.n_features_in, None);
        assert_eq!(
            manifest.model_path(file.path()),
            file.path().parent().unwrap().join("rf.onnx")
        );
    }

    #[test]
    fn test_manifest_missing_keys() {
        for contents in [
            r#"{"rf_model": "rf.onnx", "rf_model_threshold": 0.5}"#,
            r#"{"ordered_columns": ["amount"], "rf_model_threshold": 0.5}"#,
            r#"{"ordered_columns": ["amount"], "rf_model": "rf.onnx"}"#,
        ] {
            let file = write_manifest(contents);
            let err = ArtifactManifest::from_path(file.path()).unwrap_err();
            assert!(format!("{err:#}").contains("missing field"), "{err:#}");
        }
    }

    #[test]
    fn test_manifest_validation() {
        let file = write_manifest(
            r#"{"ordered_columns": ["amount"], "rf_model": "rf.onnx", "rf_model_threshold": 1.5}"#,
        );
        assert!(ArtifactManifest::from_path(file.path()).is_err());

        let file = write_manifest(
            r#"{"ordered_columns": [], "rf_model": "rf.onnx", "rf_model_threshold": 0.5}"#,
        );
        assert!(ArtifactManifest::from_path(file.path()).is_err());

        let file = write_manifest(
            r#"{"ordered_columns": ["amount", "amount"], "rf_model": "rf.onnx", "rf_model_threshold": 0.5}"#,
        );
        assert!(ArtifactManifest::from_path(file.path()).is_err());

        let file = write_manifest(
            r#"{"ordered_columns": ["amount"], "rf_model": "rf.onnx", "rf_model_threshold": 0.5, "n_features_in": 4}"#,
        );
        assert!(ArtifactManifest::from_path(file.path()).is_err());

        assert!(ArtifactManifest::from_path("no/such/model.json").is_err());
    }

    #[test]
    fn test_absolute_model_path_is_kept() {
        let manifest = ArtifactManifest {
            ordered_columns: vec!["amount".to_string()],
            rf_model: PathBuf::from("/opt/models/rf.onnx"),
            rf_model_threshold: 0.5,
            n_features_in: None,
        };
        assert_eq!(
            manifest.model_path(Path::new("/etc/fraud/model.json")),
            PathBuf::from("/opt/models/rf.onnx")
        );
    }

    #[test]
    fn test_load_fails_when_classifier_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("model.json");
        std::fs::write(
            &manifest_path,
            r#"{"ordered_columns": ["amount"], "rf_model": "missing.onnx", "rf_model_threshold": 0.5}"#,
        )
        .unwrap();

        assert!(ModelArtifact::load(&manifest_path, 1).is_err());
    }

    #[test]
    fn test_from_parts_checks_model_width() {
        let model = Arc::new(FixedModel {
            probability: 0.9,
            width: Some(3),
        });
        assert!(ModelArtifact::from_parts(columns(), model, 0.5).is_err());
    }

    #[test]
    fn test_transfer_scenario_is_fraud() {
        let model = Arc::new(FixedModel {
            probability: 0.9,
            width: Some(14),
        });
        let artifact = ModelArtifact::from_parts(columns(), model, 0.5).unwrap();
        let record = TransactionRecord::new("TRANSFER", 1000.0, 5000.0, 4000.0, 2000.0, 3000.0);

        let features = artifact.extractor().extract(0, &record).unwrap();
        assert_eq!(
            features,
            vec![
                1000.0, 5000.0, 4000.0, 2000.0, 3000.0, 1000.0, -1000.0, 0.0, 2000.0, 0.0, 0.0,
                0.0, 0.0, 1.0
            ]
        );

        let response = artifact.predict(&[record]).unwrap();
        assert_eq!(response.predictions, vec![Label::Fraud]);
    }

    #[test]
    fn test_predict_propagates_client_faults() {
        let model = Arc::new(FixedModel {
            probability: 0.1,
            width: None,
        });
        let artifact =
            ModelArtifact::from_parts(vec!["step".to_string(), "amount".to_string()], model, 0.5)
                .unwrap();
        let record = TransactionRecord::new("PAYMENT", 10.0, 10.0, 0.0, 0.0, 0.0);

        let err = artifact.predict(&[record]).unwrap_err();
        assert!(matches!(err, PredictError::MissingField { index: 0, .. }));
    }
}

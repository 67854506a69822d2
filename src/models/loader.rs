//! ONNX classifier loading and scoring

use crate::models::inference::ProbabilityModel;
use anyhow::{anyhow, bail, Context, Result};
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{
    DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor, ValueType,
};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Binary classifier exported to ONNX (e.g. a random forest via skl2onnx)
pub struct OnnxClassifier {
    /// Model name, used in logs
    name: String,
    /// ONNX Runtime session; runs need exclusive access
    session: Mutex<Session>,
    /// Input name for the feature matrix
    input_name: String,
    /// Output name for class probabilities
    output_name: String,
    /// Number of features the model was trained on, when known
    input_width: Option<usize>,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("name", &self.name)
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("input_width", &self.input_width)
            .finish()
    }
}

impl OnnxClassifier {
    /// Load a classifier from an ONNX file.
    ///
    /// `declared_width` is the feature count recorded alongside the model; it
    /// must agree with the width the graph declares for its input.
    pub fn load<P: AsRef<Path>>(
        path: P,
        declared_width: Option<usize>,
        onnx_threads: usize,
    ) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "classifier".to_string());

        info!(model = %name, path = %path.display(), threads = onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(onnx_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| anyhow!("Model {} declares no inputs", path.display()))?;
        let input_name = input.name.clone();

        // [batch, features]; the batch axis is dynamic (-1)
        let graph_width = match &input.input_type {
            ValueType::Tensor { shape, .. } => shape.last().copied(),
            _ => None,
        };
        let input_width = reconcile_input_width(graph_width, declared_width)
            .with_context(|| format!("Invalid model {}", path.display()))?;

        // skl2onnx emits `output_label` then `output_probability`
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .ok_or_else(|| anyhow!("Model {} declares no outputs", path.display()))?;

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            input_width = ?input_width,
            "Model loaded successfully"
        );

        Ok(Self {
            name,
            session: Mutex::new(session),
            input_name,
            output_name,
            input_width,
        })
    }

    /// Extract positive-class probabilities for `rows` samples.
    ///
    /// Handles both tensor outputs (`zipmap=False`) and seq(map) outputs.
    fn extract_probabilities(&self, outputs: &SessionOutputs, rows: usize) -> Result<Vec<f32>> {
        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| anyhow!("Model output `{}` missing", self.output_name))?;

        if let Ok(tensor) = output.try_extract_tensor::<f32>() {
            let (shape, data) = tensor;
            let dims: Vec<i64> = shape.iter().copied().collect();
            return fraud_probs_from_tensor(&dims, data, rows);
        }

        let dtype = output.dtype();
        if DynSequenceValueType::can_downcast(&dtype) {
            return self.fraud_probs_from_sequence_map(output, rows);
        }

        bail!(
            "Unsupported output type for `{}`: {:?}",
            self.output_name,
            dtype
        )
    }

    /// Extract probabilities from seq(map(int64, float)) format
    fn fraud_probs_from_sequence_map(&self, output: &DynValue, rows: usize) -> Result<Vec<f32>> {
        let allocator = Allocator::default();

        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| anyhow!("Failed to downcast to sequence: {}", e))?;

        let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
        if maps.len() != rows {
            bail!("Model returned {} probability maps for {} rows", maps.len(), rows);
        }

        maps.iter()
            .map(|map_value| {
                let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;
                kv_pairs
                    .iter()
                    .find(|(class_id, _)| *class_id == 1)
                    .map(|(_, prob)| *prob)
                    .ok_or_else(|| anyhow!("No probability for class 1 in model output"))
            })
            .collect()
    }
}

/// Combine the feature dimension declared by the graph with the one
/// recorded at training time. Non-positive dimensions are symbolic.
fn reconcile_input_width(graph: Option<i64>, declared: Option<usize>) -> Result<Option<usize>> {
    let graph = graph.filter(|d| *d > 0).map(|d| d as usize);
    match (graph, declared) {
        (Some(g), Some(d)) if g != d => bail!(
            "Model input takes {} features but the artifact records n_features_in = {}",
            g,
            d
        ),
        (Some(g), _) => Ok(Some(g)),
        (None, declared) => Ok(declared),
    }
}

/// Read the fraud column out of a probability tensor.
///
/// `[rows, classes]` takes class 1; `[rows, 1]` and `[rows]` are already the
/// positive-class probability.
fn fraud_probs_from_tensor(dims: &[i64], data: &[f32], rows: usize) -> Result<Vec<f32>> {
    let width = match dims {
        [n, classes] if *n as usize == rows && *classes >= 1 => *classes as usize,
        [n] if *n as usize == rows => 1,
        _ => bail!("Unexpected probability shape {:?} for {} rows", dims, rows),
    };
    let column = if width >= 2 { 1 } else { 0 };
    if data.len() < rows * width {
        bail!("Probability tensor holds {} values, expected {}", data.len(), rows * width);
    }

    Ok((0..rows)
        .map(|row| data[row * width + column])
        .collect())
}

impl ProbabilityModel for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_width(&self) -> Option<usize> {
        self.input_width
    }

    fn predict_proba(&self, batch: &[Vec<f32>]) -> Result<Vec<f32>> {
        let rows = batch.len();
        let width = batch.first().map(Vec::len).unwrap_or(0);

        let mut flat = Vec::with_capacity(rows * width);
        for row in batch {
            if row.len() != width {
                bail!("Ragged feature batch: expected {} columns, got {}", width, row.len());
            }
            flat.extend_from_slice(row);
        }

        // Input tensor - shape [rows, width]
        let shape = vec![rows as i64, width as i64];
        let input_tensor =
            Tensor::from_array((shape, flat)).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("Lock error: {}", e))?;

        let outputs = session.run(ort::inputs![self.input_name.as_str() => input_tensor])?;
        let probs = self.extract_probabilities(&outputs, rows)?;

        debug!(model = %self.name, rows = rows, "Batch scored");

        Ok(probs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraud_probs_from_two_class_tensor() {
        let data = [0.9_f32, 0.1, 0.25, 0.75, 0.5, 0.5];

        let probs = fraud_probs_from_tensor(&[3, 2], &data, 3).unwrap();

        assert_eq!(probs, vec![0.1_f32, 0.75, 0.5]);
    }

    #[test]
    fn test_fraud_probs_from_single_column() {
        let data = [0.2_f32, 0.8];

        let probs = fraud_probs_from_tensor(&[2], &data, 2).unwrap();

        assert_eq!(probs, vec![0.2_f32, 0.8]);
    }

    #[test]
    fn test_row_count_mismatch_is_an_error() {
        let data = [0.4_f32, 0.6];

        assert!(fraud_probs_from_tensor(&[1, 2], &data, 2).is_err());
        assert!(fraud_probs_from_tensor(&[2, 2, 1], &data, 2).is_err());
    }

    #[test]
    fn test_input_width_from_graph() {
        assert_eq!(reconcile_input_width(Some(13), None).unwrap(), Some(13));
        assert_eq!(reconcile_input_width(Some(14), Some(14)).unwrap(), Some(14));
    }

    #[test]
    fn test_symbolic_input_width_falls_back_to_declared() {
        assert_eq!(reconcile_input_width(Some(-1), Some(14)).unwrap(), Some(14));
        assert_eq!(reconcile_input_width(Some(0), None).unwrap(), None);
        assert_eq!(reconcile_input_width(None, Some(9)).unwrap(), Some(9));
        assert_eq!(reconcile_input_width(None, None).unwrap(), None);
    }

    #[test]
    fn test_conflicting_input_width_is_an_error() {
        let err = reconcile_input_width(Some(13), Some(14)).unwrap_err();
        assert!(err.to_string().contains("13"), "{err}");
        assert!(err.to_string().contains("14"), "{err}");
    }

    #[test]
    fn test_missing_model_file() {
        let err = OnnxClassifier::load("does/not/exist.onnx", Some(13), 1).unwrap_err();
        assert!(format!("{err:#}").contains("does/not/exist.onnx"));
    }
}

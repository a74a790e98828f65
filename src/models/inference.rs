//! Two-model inference engine for magnitude and aftershock scoring

use crate::config::ModelsConfig;
use crate::error::{ScoringError, SetupError};
use crate::models::aligner::FeatureMatrix;
use crate::models::loader::{ensure_artifact, LoadedModel, ModelArtifact, ModelLoader};
use anyhow::{anyhow, bail, Context, Result};
use ort::memory::Allocator;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Pre-fit model producing a continuous magnitude estimate per row.
pub trait MagnitudeRegressor: Send + Sync {
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>>;
}

/// Pre-fit binary classifier producing the positive-class probability per row.
pub trait AftershockClassifier: Send + Sync {
    fn predict_probability(&self, features: &FeatureMatrix) -> Result<Vec<f64>>;
}

/// Model outputs for one batch, aligned with the matrix rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predictions {
    pub magnitudes: Vec<f64>,
    pub aftershock_probabilities: Vec<f64>,
}

impl Predictions {
    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }
}

/// Inference engine holding both models and their required feature columns.
///
/// Loaded once per process and shared read-only.
pub struct InferenceEngine {
    regressor: Arc<dyn MagnitudeRegressor>,
    classifier: Arc<dyn AftershockClassifier>,
    required_columns: Vec<String>,
}

impl InferenceEngine {
    /// Load both models from the configured artifact, downloading it first
    /// if needed.
    pub async fn from_config(
        config: &ModelsConfig,
        client: &reqwest::Client,
    ) -> Result<Self, SetupError> {
        let path = ensure_artifact(
            client,
            Path::new(&config.artifact_path),
            config.artifact_url.as_deref(),
        )
        .await?;

        let load = |source| SetupError::Load {
            path: path.clone(),
            source,
        };
        let artifact = ModelArtifact::read(&path).map_err(load)?;
        Self::from_artifact(&artifact, config.onnx_threads).map_err(load)
    }

    /// Build ONNX sessions from artifact bytes
    pub fn from_artifact(artifact: &ModelArtifact, onnx_threads: usize) -> Result<Self> {
        let loader = ModelLoader::with_threads(onnx_threads);
        let regressor = loader.load_model(&artifact.regression, "regression", "variable")?;
        let classifier = loader.load_model(&artifact.classification, "classification", "prob")?;

        info!(
            features = artifact.required_columns.len(),
            "Inference engine initialized"
        );

        Ok(Self::from_models(
            Arc::new(OnnxModel::new(regressor)),
            Arc::new(OnnxModel::new(classifier)),
            artifact.required_columns.clone(),
        ))
    }

    /// Create an engine from already constructed models
    pub fn from_models(
        regressor: Arc<dyn MagnitudeRegressor>,
        classifier: Arc<dyn AftershockClassifier>,
        required_columns: Vec<String>,
    ) -> Self {
        Self {
            regressor,
            classifier,
            required_columns,
        }
    }

    /// Feature columns the models expect, in order
    pub fn required_columns(&self) -> &[String] {
        &self.required_columns
    }

    /// Score a whole batch with one call per model.
    ///
    /// Probabilities are clamped to [0, 1]. An empty matrix is scored
    /// without invoking the models.
    pub fn score(&self, features: &FeatureMatrix) -> Result<Predictions, ScoringError> {
        if features.columns() != self.required_columns.as_slice() {
            return Err(ScoringError::ColumnMismatch);
        }
        if features.is_empty() {
            return Ok(Predictions::default());
        }

        let rows = features.rows();
        let magnitudes = self
            .regressor
            .predict(features)
            .map_err(|source| ScoringError::Model {
                model: "regression",
                source,
            })?;
        check_length("regression", rows, magnitudes.len())?;

        let aftershock_probabilities: Vec<f64> = self
            .classifier
            .predict_probability(features)
            .map_err(|source| ScoringError::Model {
                model: "classification",
                source,
            })?
            .into_iter()
            .map(|p| p.clamp(0.0, 1.0))
            .collect();
        check_length("classification", rows, aftershock_probabilities.len())?;

        debug!(rows = rows, "Batch scored");

        Ok(Predictions {
            magnitudes,
            aftershock_probabilities,
        })
    }
}

fn check_length(model: &'static str, expected: usize, found: usize) -> Result<(), ScoringError> {
    if expected == found {
        Ok(())
    } else {
        Err(ScoringError::OutputLength {
            model,
            expected,
            found,
        })
    }
}

/// ONNX Runtime session usable as either model.
///
/// Sessions need exclusive access to run, so each one sits behind a mutex.
pub struct OnnxModel {
    model: Mutex<LoadedModel>,
}

impl OnnxModel {
    pub fn new(model: LoadedModel) -> Self {
        Self {
            model: Mutex::new(model),
        }
    }

    fn run(&self, features: &FeatureMatrix, kind: OutputKind) -> Result<Vec<f64>> {
        let mut model = self
            .model
            .lock()
            .map_err(|e| anyhow!("Lock error: {}", e))?;
        run_model(&mut model, features, kind)
    }
}

impl MagnitudeRegressor for OnnxModel {
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        self.run(features, OutputKind::Value)
    }
}

impl AftershockClassifier for OnnxModel {
    fn predict_probability(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        self.run(features, OutputKind::PositiveClass)
    }
}

#[derive(Debug, Clone, Copy)]
enum OutputKind {
    Value,
    PositiveClass,
}

/// Run a model on the whole batch - input shape [rows, cols]
fn run_model(model: &mut LoadedModel, features: &FeatureMatrix, kind: OutputKind) -> Result<Vec<f64>> {
    let rows = features.rows();
    let shape = vec![rows as i64, features.cols() as i64];
    let input_tensor = Tensor::from_array((shape, features.as_slice().to_vec()))
        .context("Failed to create input tensor")?;

    let outputs = model
        .session
        .run(ort::inputs![&model.input_name => input_tensor])?;

    let output = outputs
        .get(model.output_name.as_str())
        .ok_or_else(|| anyhow!("{} model has no output '{}'", model.name, model.output_name))?;

    match kind {
        OutputKind::Value => {
            let (_, data) = output.try_extract_tensor::<f32>()?;
            column_from_tensor(data, rows, 0)
        }
        OutputKind::PositiveClass => {
            if let Ok((_, data)) = output.try_extract_tensor::<f32>() {
                let width = data.len() / rows.max(1);
                // [rows, 2] probabilities, or [rows] / [rows, 1] of P(class 1)
                return column_from_tensor(data, rows, if width >= 2 { 1 } else { 0 });
            }

            let dtype = output.dtype();
            if DynSequenceValueType::can_downcast(&dtype) {
                return positive_class_from_sequence(output);
            }

            bail!("{} model output '{}' has unsupported type", model.name, model.output_name)
        }
    }
}

/// Take one column out of a row-major [rows, width] tensor
fn column_from_tensor(data: &[f32], rows: usize, column: usize) -> Result<Vec<f64>> {
    if rows == 0 || data.len() % rows != 0 || data.len() < rows {
        bail!("output of {} values does not fit {} rows", data.len(), rows);
    }
    let width = data.len() / rows;
    Ok((0..rows).map(|r| data[r * width + column] as f64).collect())
}

/// Extract class-1 probabilities from seq(map(int64, float)) output
fn positive_class_from_sequence(output: &ort::value::DynValue) -> Result<Vec<f64>> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| anyhow!("Failed to downcast to sequence: {}", e))?;
    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;

    maps.iter()
        .map(|map_value| -> Result<f64> {
            let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;
            if let Some((_, prob)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 1) {
                return Ok(*prob as f64);
            }
            kv_pairs
                .iter()
                .find(|(class_id, _)| *class_id == 0)
                .map(|(_, prob)| 1.0 - *prob as f64)
                .ok_or_else(|| anyhow!("No probability found in map"))
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::feature_engineer::FeatureEngineer;
    use crate::models::aligner::align;
    use crate::types::event::Event;

    /// Predicts the "mag" column as the magnitude
    pub(crate) struct EchoMagnitude;

    impl MagnitudeRegressor for EchoMagnitude {
        fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
            (0..features.rows())
                .map(|r| {
                    features
                        .get(r, "mag")
                        .map(f64::from)
                        .context("mag column missing")
                })
                .collect()
        }
    }

    /// Returns fixed probabilities in row order
    pub(crate) struct FixedProbabilities(pub Vec<f64>);

    impl AftershockClassifier for FixedProbabilities {
        fn predict_probability(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
            Ok(self.0.iter().copied().take(features.rows()).collect())
        }
    }

    struct Failing;

    impl AftershockClassifier for Failing {
        fn predict_probability(&self, _: &FeatureMatrix) -> Result<Vec<f64>> {
            bail!("session crashed")
        }
    }

    fn columns() -> Vec<String> {
        vec!["mag".to_string(), "depth".to_string()]
    }

    fn matrix(mags: &[f64]) -> FeatureMatrix {
        let events: Vec<Event> = mags
            .iter()
            .map(|&m| Event::new(10.0, 20.0, 15.0, m))
            .collect();
        align(&FeatureEngineer::new().enrich(&events), &columns())
    }

    #[test]
    fn test_score_batch() {
        let engine = InferenceEngine::from_models(
            Arc::new(EchoMagnitude),
            Arc::new(FixedProbabilities(vec![0.1, 0.5, 0.9])),
            columns(),
        );

        let predictions = engine.score(&matrix(&[4.0, 6.0, 7.5])).unwrap();
        assert_eq!(predictions.magnitudes, vec![4.0, 6.0, 7.5]);
        assert_eq!(predictions.aftershock_probabilities, vec![0.1, 0.5, 0.9]);
    }

    #[test]
    fn test_probabilities_clamped() {
        let engine = InferenceEngine::from_models(
            Arc::new(EchoMagnitude),
            Arc::new(FixedProbabilities(vec![-0.2, 1.4])),
            columns(),
        );

        let predictions = engine.score(&matrix(&[3.0, 3.5])).unwrap();
        assert_eq!(predictions.aftershock_probabilities, vec![0.0, 1.0]);
    }

    #[test]
    fn test_short_output_rejected() {
        let engine = InferenceEngine::from_models(
            Arc::new(EchoMagnitude),
            Arc::new(FixedProbabilities(vec![0.3])),
            columns(),
        );

        let err = engine.score(&matrix(&[3.0, 3.5])).unwrap_err();
        assert!(matches!(
            err,
            ScoringError::OutputLength {
                model: "classification",
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn test_model_failure_reported() {
        let engine =
            InferenceEngine::from_models(Arc::new(EchoMagnitude), Arc::new(Failing), columns());

        let err = engine.score(&matrix(&[3.0])).unwrap_err();
        assert!(matches!(err, ScoringError::Model { model: "classification", .. }));
    }

    #[test]
    fn test_column_mismatch_rejected() {
        let engine = InferenceEngine::from_models(
            Arc::new(EchoMagnitude),
            Arc::new(FixedProbabilities(vec![0.3])),
            vec!["depth".to_string(), "mag".to_string()],
        );

        assert!(matches!(
            engine.score(&matrix(&[3.0])),
            Err(ScoringError::ColumnMismatch)
        ));
    }

    #[test]
    fn test_empty_batch_skips_models() {
        let engine =
            InferenceEngine::from_models(Arc::new(EchoMagnitude), Arc::new(Failing), columns());

        let predictions = engine.score(&matrix(&[])).unwrap();
        assert!(predictions.is_empty());
    }

    #[test]
    fn test_column_from_tensor() {
        let data = [0.9, 0.1, 0.3, 0.7];
        assert_eq!(column_from_tensor(&data, 2, 1).unwrap(), vec![0.1f32 as f64, 0.7f32 as f64]);
        assert_eq!(column_from_tensor(&data, 4, 0).unwrap().len(), 4);
        assert!(column_from_tensor(&data, 3, 0).is_err());
    }
}

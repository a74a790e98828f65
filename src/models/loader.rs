//! Model artifact and ONNX session loading
//!
//! The artifact is a gzip-compressed tar archive holding the two models and
//! the ordered list of feature columns they were trained on.

use crate::error::SetupError;
use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const REGRESSION_MEMBER: &str = "regression.onnx";
pub const CLASSIFICATION_MEMBER: &str = "classification.onnx";
pub const FEATURES_MEMBER: &str = "features.json";

/// Raw contents of a model artifact
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub regression: Vec<u8>,
    pub classification: Vec<u8>,
    /// Feature columns in the order the models expect them
    pub required_columns: Vec<String>,
}

impl ModelArtifact {
    /// Read an artifact from a tar.gz file
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        Self::from_reader(file)
    }

    /// Read an artifact from any tar.gz stream
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut archive = tar::Archive::new(GzDecoder::new(reader));

        let mut regression = None;
        let mut classification = None;
        let mut features = None;

        for entry in archive.entries().context("Failed to read archive")? {
            let mut entry = entry.context("Corrupt archive entry")?;
            let name = entry
                .path()?
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string);

            let slot = match name.as_deref() {
                Some(REGRESSION_MEMBER) => &mut regression,
                Some(CLASSIFICATION_MEMBER) => &mut classification,
                Some(FEATURES_MEMBER) => &mut features,
                _ => continue,
            };

            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut bytes)?;
            *slot = Some(bytes);
        }

        let (Some(regression), Some(classification), Some(features)) =
            (regression, classification, features)
        else {
            bail!(
                "archive must contain {}, {} and {}",
                REGRESSION_MEMBER,
                CLASSIFICATION_MEMBER,
                FEATURES_MEMBER
            );
        };

        let required_columns: Vec<String> =
            serde_json::from_slice(&features).context("features.json is not a list of column names")?;
        if required_columns.is_empty() {
            bail!("features.json lists no columns");
        }

        Ok(Self {
            regression,
            classification,
            required_columns,
        })
    }
}

/// Make sure the artifact exists locally, downloading it when a URL is
/// configured.
pub async fn ensure_artifact(
    client: &reqwest::Client,
    path: &Path,
    url: Option<&str>,
) -> Result<PathBuf, SetupError> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }

    let Some(url) = url else {
        return Err(SetupError::ArtifactMissing {
            path: path.to_path_buf(),
        });
    };

    warn!(path = %path.display(), url = %url, "Model artifact not found locally, downloading");

    let download = |source| SetupError::Download {
        url: url.to_string(),
        source,
    };
    let bytes = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(download)?
        .bytes()
        .await
        .map_err(download)?;

    let write = |source| SetupError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write)?;
    }
    tokio::fs::write(path, &bytes).await.map_err(write)?;

    info!(path = %path.display(), bytes = bytes.len(), "Model artifact downloaded");
    Ok(path.to_path_buf())
}

/// Loaded ONNX model with metadata
pub struct LoadedModel {
    /// Model name
    pub name: String,
    /// ONNX Runtime session
    pub session: Session,
    /// Input name for the model
    pub input_name: String,
    /// Output holding the prediction
    pub output_name: String,
}

/// Loader for ONNX models
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load a model from serialized ONNX bytes.
    ///
    /// `output_hint` selects the output by substring ("prob" for classifiers);
    /// without a match the first output that is not a label is used.
    pub fn load_model(&self, bytes: &[u8], name: &str, output_hint: &str) -> Result<LoadedModel> {
        info!(model = %name, bytes = bytes.len(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_memory(bytes)
            .context(format!("Failed to load {} model", name))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains(output_hint))
            .or_else(|| session.outputs.iter().find(|o| !o.name.contains("label")))
            .or_else(|| session.outputs.first())
            .map(|o| o.name.clone())
            .context(format!("{} model has no outputs", name))?;

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name: name.to_string(),
            session,
            input_name,
            output_name,
        })
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self { onnx_threads: 1 }
    }
}

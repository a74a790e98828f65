//! Error types for the seismic risk pipeline
//!
//! Setup and fetch failures stop the run. Scoring failures stop the run as
//! well, since there is nothing to classify without predictions. Webhook
//! delivery failures are not errors here; the dispatcher logs and counts them.

use std::path::PathBuf;

/// The model artifact is missing or unusable. Raised before any fetch.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("model artifact not found at {path} and no download URL is configured")]
    ArtifactMissing { path: PathBuf },

    #[error("failed to download model artifact from {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to write model artifact to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load model artifact {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

/// The feed could not be retrieved or parsed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("feed request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("feed {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to read feed file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse feed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A model could not score the batch.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("feature matrix columns do not match the model's required columns")]
    ColumnMismatch,

    #[error("{model} model failed: {source}")]
    Model {
        model: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("{model} model returned {found} values for {expected} rows")]
    OutputLength {
        model: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Configuration could not be loaded or is out of range.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The CSV export could not be written.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("export I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Failures that abort a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

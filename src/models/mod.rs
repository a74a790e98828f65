//! Model alignment, loading and inference

pub mod aligner;
pub mod inference;
pub mod loader;

pub use aligner::{align, FeatureMatrix};
pub use inference::{AftershockClassifier, InferenceEngine, MagnitudeRegressor, Predictions};
pub use loader::{ModelArtifact, ModelLoader};

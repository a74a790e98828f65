//! Seismic Risk Pipeline Library
//!
//! Pulls recent earthquakes from a public GeoJSON feed, derives features,
//! predicts magnitude and aftershock likelihood with pre-trained ONNX
//! models, assigns a risk tier and notifies a webhook about high-risk events.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod export;
pub mod feature_engineer;
pub mod fetcher;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod types;

pub use config::AppConfig;
pub use dispatcher::{AlertDispatcher, DispatchReport};
pub use error::PipelineError;
pub use feature_engineer::FeatureEngineer;
pub use fetcher::FeedFetcher;
pub use models::inference::InferenceEngine;
pub use pipeline::{Pipeline, RunOptions, RunOutcome, RunReport};
pub use types::{
    alert::{reclassify, RiskLevel, RiskThresholds, ScoredRecord},
    event::{Event, TimeWindow},
};

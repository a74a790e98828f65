//! Type definitions for the seismic risk pipeline

pub mod alert;
pub mod event;
pub mod features;

pub use alert::{AlertPayload, RiskLevel, RiskThresholds, ScoredRecord};
pub use event::{Event, TimeWindow};
pub use features::{ContextFeatures, FeatureVector};

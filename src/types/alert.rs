//! Risk classification and alert data structures

use super::features::FeatureVector;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Moderate, RiskLevel::High];

    /// Classify an event from its predicted magnitude and aftershock probability.
    ///
    /// High wins over Moderate: a magnitude at least one unit above the
    /// threshold, or a probability at least 0.2 above its threshold, is High.
    /// Reaching either threshold is Moderate. NaN inputs never reach a tier.
    pub fn classify(
        predicted_magnitude: f64,
        aftershock_probability: f64,
        thresholds: &RiskThresholds,
    ) -> Self {
        let mag_t = thresholds.magnitude_threshold;
        let aft_t = thresholds.aftershock_threshold;

        if predicted_magnitude >= mag_t + 1.0 || aftershock_probability >= aft_t + 0.2 {
            RiskLevel::High
        } else if predicted_magnitude >= mag_t || aftershock_probability >= aft_t {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low Risk",
            RiskLevel::Moderate => "Moderate Risk",
            RiskLevel::High => "High Risk",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Run-scoped alert thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Predicted magnitude threshold, 3.0 - 8.0
    pub magnitude_threshold: f64,
    /// Aftershock probability threshold, 0.0 - 1.0
    pub aftershock_threshold: f64,
}

impl RiskThresholds {
    pub const MAGNITUDE_RANGE: std::ops::RangeInclusive<f64> = 3.0..=8.0;
    pub const AFTERSHOCK_RANGE: std::ops::RangeInclusive<f64> = 0.0..=1.0;

    pub fn new(magnitude_threshold: f64, aftershock_threshold: f64) -> Self {
        Self {
            magnitude_threshold,
            aftershock_threshold,
        }
    }
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            magnitude_threshold: 5.0,
            aftershock_threshold: 0.6,
        }
    }
}

/// A feature vector with model predictions and a risk label
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub features: FeatureVector,
    pub predicted_magnitude: f64,
    /// Probability of an aftershock, 0.0 - 1.0
    pub aftershock_probability: f64,
    pub risk_level: RiskLevel,
}

impl ScoredRecord {
    pub fn new(
        features: FeatureVector,
        predicted_magnitude: f64,
        aftershock_probability: f64,
        thresholds: &RiskThresholds,
    ) -> Self {
        Self {
            risk_level: RiskLevel::classify(predicted_magnitude, aftershock_probability, thresholds),
            features,
            predicted_magnitude,
            aftershock_probability,
        }
    }

    pub fn place(&self) -> &str {
        &self.features.event.place
    }
}

/// Recompute risk labels for an already scored set under new thresholds.
pub fn reclassify(records: &mut [ScoredRecord], thresholds: &RiskThresholds) {
    for record in records.iter_mut() {
        record.risk_level = RiskLevel::classify(
            record.predicted_magnitude,
            record.aftershock_probability,
            thresholds,
        );
    }
}

/// Notification body posted to the webhook sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub content: String,
}

impl AlertPayload {
    pub fn from_record(record: &ScoredRecord) -> Self {
        Self {
            content: format!(
                "Alert! {} | Predicted Mag: {:.2} | Aftershock Prob: {:.2} | {}",
                record.place(),
                record.predicted_magnitude,
                record.aftershock_probability,
                record.risk_level
            ),
        }
    }
}

//! Engineered feature vector for one event

use super::event::Event;

/// Numeric columns a feature vector can supply to the models, by name.
pub const NUMERIC_COLUMNS: &[&str] = &[
    "latitude",
    "longitude",
    "depth",
    "mag",
    "time",
    "updated",
    "nst",
    "gap",
    "dmin",
    "rms",
    "is_weekend",
    "season",
    "time_of_day",
    "depth_category",
    "distance_to_fault_km",
    "monthly_event_count",
    "rolling_mag_mean",
    "rolling_mag_var",
    "history_score",
    "nearest_volcano_dist_km",
    "volcano_nearby",
    "dbscan_cluster",
    "label_aftershock",
];

/// Text columns with no numeric encoding.
pub const TEXT_COLUMNS: &[&str] = &["place", "region", "magType", "net", "type", "status"];

/// Contextual features reserved for richer data sources.
///
/// All of these are fixed at zero for now.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextFeatures {
    pub distance_to_fault_km: f64,
    pub monthly_event_count: u32,
    pub nearest_volcano_dist_km: f64,
    pub volcano_nearby: bool,
    pub dbscan_cluster: i32,
    pub label_aftershock: u8,
}

/// An event extended with derived attributes.
///
/// Season and hour are `None` when the event has no observation time, and
/// `depth_category` is `None` for depths outside every bucket.
#[derive(Debug, Clone)]
pub struct FeatureVector {
    pub event: Event,
    pub is_weekend: bool,
    /// 1-4, `(month % 12) / 3 + 1`
    pub season: Option<u8>,
    pub time_of_day: Option<u8>,
    /// 0-3 over (-1,10], (10,30], (30,70], (70,300]
    pub depth_category: Option<u8>,
    pub rolling_mag_mean: f64,
    /// Sample variance; undefined for a single sample
    pub rolling_mag_var: Option<f64>,
    pub history_score: f64,
    pub context: ContextFeatures,
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn millis(time: Option<chrono::DateTime<chrono::Utc>>) -> f64 {
    time.map(|t| t.timestamp_millis() as f64).unwrap_or(f64::NAN)
}

impl FeatureVector {
    /// The grouping label used for rolling statistics (the raw place text).
    pub fn region(&self) -> &str {
        &self.event.place
    }

    /// Look up a numeric column by name.
    ///
    /// Returns `None` when the vector has no such numeric column, and
    /// `Some(NaN)` when the column exists but is undefined for this event.
    pub fn value(&self, column: &str) -> Option<f64> {
        let e = &self.event;
        let c = &self.context;
        let value = match column {
            "latitude" => e.latitude,
            "longitude" => e.longitude,
            "depth" => e.depth,
            "mag" => e.magnitude,
            "time" => millis(e.time),
            "updated" => millis(e.updated),
            "nst" => e.station_count,
            "gap" => e.gap,
            "dmin" => e.dmin,
            "rms" => e.rms,
            "is_weekend" => flag(self.is_weekend),
            "season" => self.season.map(f64::from).unwrap_or(f64::NAN),
            "time_of_day" => self.time_of_day.map(f64::from).unwrap_or(f64::NAN),
            "depth_category" => self.depth_category.map(f64::from).unwrap_or(f64::NAN),
            "distance_to_fault_km" => c.distance_to_fault_km,
            "monthly_event_count" => f64::from(c.monthly_event_count),
            "rolling_mag_mean" => self.rolling_mag_mean,
            "rolling_mag_var" => self.rolling_mag_var.unwrap_or(f64::NAN),
            "history_score" => self.history_score,
            "nearest_volcano_dist_km" => c.nearest_volcano_dist_km,
            "volcano_nearby" => flag(c.volcano_nearby),
            "dbscan_cluster" => f64::from(c.dbscan_cluster),
            "label_aftershock" => f64::from(c.label_aftershock),
            _ => return None,
        };
        Some(value)
    }
}

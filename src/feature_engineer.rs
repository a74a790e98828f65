//! Feature engineering for seismic events.
//!
//! Derives temporal, depth and rolling magnitude features from the raw feed
//! records. Every derivation is total: events with missing inputs get
//! undefined features rather than being rejected. The weekend flag is
//! false without an observation time.

use crate::types::event::Event;
use crate::types::features::{ContextFeatures, FeatureVector};
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use std::collections::{HashMap, VecDeque};

/// Trailing window length for per-place magnitude statistics
pub const ROLLING_WINDOW: usize = 10;

/// Upper bounds of the depth buckets; the lower bound of the first is -1 (exclusive).
const DEPTH_BOUNDS: [f64; 4] = [10.0, 30.0, 70.0, 300.0];

/// Rolling statistics for one place at one point in the feed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingStats {
    pub mean: f64,
    /// Sample variance (n - 1); `None` with a single sample
    pub variance: Option<f64>,
}

/// Per-label bounded queues of the most recent magnitudes, in arrival order.
#[derive(Debug)]
pub struct RollingWindows {
    window: usize,
    by_label: HashMap<String, VecDeque<f64>>,
}

impl RollingWindows {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            by_label: HashMap::new(),
        }
    }

    /// Add a magnitude under `label` and return the statistics of the
    /// trailing window including it.
    pub fn push(&mut self, label: &str, magnitude: f64) -> RollingStats {
        let queue = self
            .by_label
            .entry(label.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.window));
        if queue.len() == self.window {
            queue.pop_front();
        }
        queue.push_back(magnitude);

        let n = queue.len() as f64;
        let mean = queue.iter().sum::<f64>() / n;
        let variance = (queue.len() > 1)
            .then(|| queue.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / (n - 1.0));

        RollingStats { mean, variance }
    }

    /// Number of distinct labels seen
    pub fn label_count(&self) -> usize {
        self.by_label.len()
    }
}

impl Default for RollingWindows {
    fn default() -> Self {
        Self::new(ROLLING_WINDOW)
    }
}

/// True on Saturday and Sunday (UTC)
pub fn is_weekend(time: &DateTime<Utc>) -> bool {
    matches!(time.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Season bucket 1-4 as `(month % 12) / 3 + 1`.
///
/// December, January and February land in bucket 1.
pub fn season(time: &DateTime<Utc>) -> u8 {
    ((time.month() % 12) / 3 + 1) as u8
}

/// Ordinal depth bucket over (-1,10], (10,30], (30,70], (70,300]
pub fn depth_category(depth: f64) -> Option<u8> {
    if depth.is_nan() || depth <= -1.0 {
        return None;
    }
    DEPTH_BOUNDS
        .iter()
        .position(|&upper| depth <= upper)
        .map(|i| i as u8)
}

/// Feature engineer that extends events into feature vectors.
pub struct FeatureEngineer {
    window: usize,
}

impl FeatureEngineer {
    /// Create a new feature engineer with the default rolling window.
    pub fn new() -> Self {
        Self::with_window(ROLLING_WINDOW)
    }

    pub fn with_window(window: usize) -> Self {
        Self { window }
    }

    /// Enrich a batch of events, one feature vector per event in input order.
    ///
    /// Rolling statistics are grouped by the raw place text and follow feed
    /// order, not event time.
    pub fn enrich(&self, events: &[Event]) -> Vec<FeatureVector> {
        let mut windows = RollingWindows::new(self.window);

        events
            .iter()
            .map(|event| {
                let rolling = windows.push(&event.place, event.magnitude);
                FeatureVector {
                    is_weekend: event.time.as_ref().map_or(false, is_weekend),
                    season: event.time.as_ref().map(season),
                    time_of_day: event.time.as_ref().map(|t| t.hour() as u8),
                    depth_category: depth_category(event.depth),
                    rolling_mag_mean: rolling.mean,
                    rolling_mag_var: rolling.variance,
                    history_score: rolling.mean,
                    context: ContextFeatures::default(),
                    event: event.clone(),
                }
            })
            .collect()
    }
}

impl Default for FeatureEngineer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn event(place: &str, mag: f64) -> Event {
        Event::new(35.0, -118.0, 12.0, mag).with_place(place)
    }

    #[test]
    fn test_one_vector_per_event() {
        let events: Vec<Event> = (0..25)
            .map(|i| event(if i % 3 == 0 { "A" } else { "B" }, 2.5 + i as f64 * 0.1))
            .collect();

        let vectors = FeatureEngineer::new().enrich(&events);
        assert_eq!(vectors.len(), events.len());
        for (v, e) in vectors.iter().zip(&events) {
            assert_eq!(v.event.magnitude, e.magnitude);
            assert_eq!(v.event.place, e.place);
        }
    }

    #[test]
    fn test_first_event_of_place() {
        let vectors = FeatureEngineer::new().enrich(&[event("Offshore Chile", 5.3)]);

        assert_eq!(vectors[0].rolling_mag_mean, 5.3);
        assert_eq!(vectors[0].rolling_mag_var, None);
        assert_eq!(vectors[0].history_score, 5.3);
    }

    #[test]
    fn test_rolling_stats_grouped_by_place_in_feed_order() {
        let events = vec![
            event("A", 2.0),
            event("B", 10.0),
            event("A", 4.0),
            event("A", 6.0),
        ];
        let v = FeatureEngineer::new().enrich(&events);

        assert_eq!(v[1].rolling_mag_mean, 10.0);
        assert_eq!(v[2].rolling_mag_mean, 3.0);
        assert_eq!(v[2].rolling_mag_var, Some(2.0));
        assert_eq!(v[3].rolling_mag_mean, 4.0);
        assert_eq!(v[3].rolling_mag_var, Some(4.0));
    }

    #[test]
    fn test_rolling_window_is_bounded() {
        // 11 events at the same place: the first (100.0) falls out of the window
        let mut events = vec![event("Tonga", 100.0)];
        events.extend((0..10).map(|_| event("Tonga", 3.0)));

        let v = FeatureEngineer::new().enrich(&events);
        let last = v.last().unwrap();
        assert_eq!(last.rolling_mag_mean, 3.0);
        assert_eq!(last.rolling_mag_var, Some(0.0));

        // The tenth still includes it
        assert!(v[9].rolling_mag_mean > 3.0);
    }

    #[test]
    fn test_place_grouping_uses_raw_text() {
        let mut windows = RollingWindows::new(ROLLING_WINDOW);
        windows.push("Southern Alaska", 3.0);
        windows.push("southern alaska", 5.0);
        assert_eq!(windows.label_count(), 2);
    }

    #[test]
    fn test_weekend_flag() {
        // 2024-03-16 is a Saturday
        assert!(is_weekend(&at(2024, 3, 16, 1)));
        assert!(is_weekend(&at(2024, 3, 17, 23)));
        assert!(!is_weekend(&at(2024, 3, 18, 0)));
        assert!(!is_weekend(&at(2024, 3, 22, 12)));
    }

    #[test]
    fn test_season_formula() {
        let expected = [1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4, 1];
        for (month, &bucket) in (1..=12).zip(expected.iter()) {
            assert_eq!(season(&at(2023, month, 1, 0)), bucket, "month {month}");
        }
    }

    #[test]
    fn test_depth_category_boundaries() {
        assert_eq!(depth_category(-1.0), None);
        assert_eq!(depth_category(-0.5), Some(0));
        assert_eq!(depth_category(10.0), Some(0));
        assert_eq!(depth_category(10.01), Some(1));
        assert_eq!(depth_category(30.0), Some(1));
        assert_eq!(depth_category(70.0), Some(2));
        assert_eq!(depth_category(300.0), Some(3));
        assert_eq!(depth_category(300.5), None);
        assert_eq!(depth_category(f64::NAN), None);
    }

    #[test]
    fn test_temporal_features() {
        let events = vec![
            event("A", 3.0).with_time(at(2024, 12, 14, 17)),
            event("B", 3.0),
        ];
        let v = FeatureEngineer::new().enrich(&events);

        assert!(v[0].is_weekend);
        assert_eq!(v[0].season, Some(1));
        assert_eq!(v[0].time_of_day, Some(17));

        assert!(!v[1].is_weekend);
        assert_eq!(v[1].value("is_weekend"), Some(0.0));
        assert_eq!(v[1].season, None);
        assert_eq!(v[1].time_of_day, None);
        assert!(v[1].value("season").unwrap().is_nan());
    }

    #[test]
    fn test_default_rolling_windows_stay_bounded() {
        let mut windows = RollingWindows::default();
        for i in 0..25 {
            windows.push("A", i as f64);
        }
        // Mean of the trailing 10 values 16..=25
        let stats = windows.push("A", 25.0);
        assert_eq!(stats.mean, 20.5);
        assert_eq!(windows.label_count(), 1);
    }

    #[test]
    fn test_placeholder_features_are_zero() {
        let v = FeatureEngineer::new().enrich(&[event("A", 3.0)]);
        assert_eq!(v[0].context, ContextFeatures::default());
        assert_eq!(v[0].value("distance_to_fault_km"), Some(0.0));
        assert_eq!(v[0].value("dbscan_cluster"), Some(0.0));
        assert_eq!(v[0].value("label_aftershock"), Some(0.0));
    }
}

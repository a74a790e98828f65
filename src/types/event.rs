//! Seismic event data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Time window of the upstream feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeWindow {
    #[default]
    #[serde(rename = "last-24h")]
    Last24Hours,
    #[serde(rename = "last-7d")]
    Last7Days,
    #[serde(rename = "last-30d")]
    Last30Days,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 3] = [
        TimeWindow::Last24Hours,
        TimeWindow::Last7Days,
        TimeWindow::Last30Days,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Last24Hours => "last-24h",
            TimeWindow::Last7Days => "last-7d",
            TimeWindow::Last30Days => "last-30d",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|w| w.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown time window '{s}' (expected last-24h, last-7d or last-30d)"))
    }
}

/// One observed seismic occurrence from the feed.
///
/// Numeric properties the feed omits are `NaN`; timestamps that are absent
/// or unparsable are `None`.
#[derive(Debug, Clone)]
pub struct Event {
    /// Feed identifier, when the feed provides one
    pub id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Depth in kilometres
    pub depth: f64,
    pub magnitude: f64,
    pub mag_type: String,
    /// Observation time
    pub time: Option<DateTime<Utc>>,
    /// Last update time
    pub updated: Option<DateTime<Utc>>,
    /// Free-text place description, "Unknown" when absent
    pub place: String,
    /// Network / operator code
    pub network: String,
    /// Number of reporting stations
    pub station_count: f64,
    /// Azimuthal gap in degrees
    pub gap: f64,
    /// Distance to the nearest station in degrees
    pub dmin: f64,
    /// Root-mean-square travel time residual
    pub rms: f64,
    pub event_type: String,
    /// Review status ("automatic", "reviewed", ...)
    pub status: String,
}

impl Event {
    /// Create an event at a position with a magnitude. Other fields take the
    /// same defaults the feed parser applies to missing properties.
    pub fn new(latitude: f64, longitude: f64, depth: f64, magnitude: f64) -> Self {
        Self {
            id: None,
            latitude,
            longitude,
            depth,
            magnitude,
            mag_type: String::new(),
            time: None,
            updated: None,
            place: "Unknown".to_string(),
            network: String::new(),
            station_count: 0.0,
            gap: f64::NAN,
            dmin: f64::NAN,
            rms: f64::NAN,
            event_type: String::new(),
            status: String::new(),
        }
    }

    pub fn with_place(mut self, place: &str) -> Self {
        self.place = place.to_string();
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    /// Latitude, longitude and magnitude are all numeric
    pub fn is_valid(&self) -> bool {
        !(self.latitude.is_nan() || self.longitude.is_nan() || self.magnitude.is_nan())
    }

    /// Case-insensitive substring match against the place description
    pub fn place_matches(&self, filter: &str) -> bool {
        self.place.to_lowercase().contains(&filter.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_window_parsing() {
        assert_eq!("last-7d".parse::<TimeWindow>(), Ok(TimeWindow::Last7Days));
        assert_eq!(" LAST-30D ".parse::<TimeWindow>(), Ok(TimeWindow::Last30Days));
        assert!("last-year".parse::<TimeWindow>().is_err());
    }

    #[test]
    fn test_event_validity() {
        assert!(Event::new(34.0, -118.0, 10.0, 4.2).is_valid());
        assert!(!Event::new(f64::NAN, -118.0, 10.0, 4.2).is_valid());
        assert!(!Event::new(34.0, f64::NAN, 10.0, 4.2).is_valid());
        assert!(!Event::new(34.0, -118.0, 10.0, f64::NAN).is_valid());
        // Depth is not mandatory
        assert!(Event::new(34.0, -118.0, f64::NAN, 4.2).is_valid());
    }

    #[test]
    fn test_place_filter_is_case_insensitive() {
        let event = Event::new(34.0, -118.0, 10.0, 4.2).with_place("Southern California region");
        assert!(event.place_matches("california"));
        assert!(event.place_matches("SOUTHERN"));
        assert!(!event.place_matches("nevada"));
    }
}

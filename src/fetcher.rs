//! Feed fetcher for live seismic events
//!
//! Retrieves a GeoJSON feature collection and flattens each feature into an
//! [`Event`], applying explicit defaults for absent properties.

use crate::config::{FeedConfig, FeedUrls};
use crate::error::FetchError;
use crate::types::event::{Event, TimeWindow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<RawFeature>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    geometry: Option<RawGeometry>,
    #[serde(default)]
    properties: Option<RawProperties>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    #[serde(default)]
    coordinates: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawProperties {
    #[serde(default, deserialize_with = "lenient_f64")]
    mag: Option<f64>,
    #[serde(default)]
    time: Option<Value>,
    #[serde(default)]
    place: Option<String>,
    #[serde(default, rename = "magType")]
    mag_type: Option<String>,
    #[serde(default, deserialize_with = "station_count")]
    nst: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    gap: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    dmin: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    rms: Option<f64>,
    #[serde(default)]
    net: Option<String>,
    #[serde(default)]
    updated: Option<Value>,
    #[serde(default, rename = "type")]
    event_type: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Accept any JSON value; numbers become `Some`, everything else `None`.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_f64))
}

/// Station count of a present `nst` key; null or non-numeric is undefined.
/// A missing key falls back to the field default of 0.
fn station_count<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_f64().unwrap_or(f64::NAN))
}

/// Interpret a millisecond epoch timestamp; anything unparsable is `None`.
fn parse_millis(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let millis = match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    DateTime::from_timestamp_millis(millis)
}

fn coordinate(coords: &[Value], index: usize) -> f64 {
    coords
        .get(index)
        .and_then(Value::as_f64)
        .unwrap_or(f64::NAN)
}

impl RawFeature {
    fn into_event(self) -> Event {
        let coords = self.geometry.map(|g| g.coordinates).unwrap_or_default();
        let props = self.properties.unwrap_or_default();

        Event {
            id: self.id,
            longitude: coordinate(&coords, 0),
            latitude: coordinate(&coords, 1),
            depth: coordinate(&coords, 2),
            magnitude: props.mag.unwrap_or(f64::NAN),
            mag_type: props.mag_type.unwrap_or_default(),
            time: parse_millis(props.time.as_ref()),
            updated: parse_millis(props.updated.as_ref()),
            place: props.place.unwrap_or_else(|| "Unknown".to_string()),
            network: props.net.unwrap_or_default(),
            station_count: props.nst,
            gap: props.gap.unwrap_or(f64::NAN),
            dmin: props.dmin.unwrap_or(f64::NAN),
            rms: props.rms.unwrap_or(f64::NAN),
            event_type: props.event_type.unwrap_or_default(),
            status: props.status.unwrap_or_default(),
        }
    }
}

/// Parse a GeoJSON feed body into events, dropping records without a
/// numeric latitude, longitude and magnitude.
pub fn parse_feed(body: &[u8]) -> Result<Vec<Event>, FetchError> {
    let collection: FeatureCollection = serde_json::from_slice(body)?;
    let total = collection.features.len();

    let events: Vec<Event> = collection
        .features
        .into_iter()
        .map(RawFeature::into_event)
        .filter(Event::is_valid)
        .collect();

    debug!(
        total = total,
        kept = events.len(),
        dropped = total - events.len(),
        "Parsed feed"
    );

    Ok(events)
}

/// Keep only events whose place contains `filter`, ignoring case.
pub fn filter_region(events: Vec<Event>, filter: &str) -> Vec<Event> {
    events
        .into_iter()
        .filter(|e| e.place_matches(filter))
        .collect()
}

/// Fetcher for the remote (or local fixture) event feed
#[derive(Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
    urls: FeedUrls,
    source_path: Option<PathBuf>,
    timeout: Duration,
}

impl FeedFetcher {
    /// Create a new feed fetcher
    pub fn new(client: reqwest::Client, config: &FeedConfig) -> Self {
        Self {
            client,
            urls: config.urls.clone(),
            source_path: config.source_path.as_ref().map(PathBuf::from),
            timeout: config.timeout(),
        }
    }

    /// Fetch and normalize the events of a time window
    pub async fn fetch(&self, window: TimeWindow) -> Result<Vec<Event>, FetchError> {
        let body = match &self.source_path {
            Some(path) => {
                info!(window = %window, path = %path.display(), "Reading feed from file");
                tokio::fs::read(path).await.map_err(|source| FetchError::Io {
                    path: path.clone(),
                    source,
                })?
            }
            None => self.download(window).await?,
        };

        let events = parse_feed(&body)?;
        info!(window = %window, events = events.len(), "Feed fetched");
        Ok(events)
    }

    async fn download(&self, window: TimeWindow) -> Result<Vec<u8>, FetchError> {
        let url = self.urls.for_window(window);
        info!(window = %window, url = %url, "Fetching feed");

        let response = self.client.get(url).timeout(self.timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Get the URL used for a window
    pub fn url(&self, window: TimeWindow) -> &str {
        self.urls.for_window(window)
    }
}

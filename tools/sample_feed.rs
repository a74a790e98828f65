//! Sample Feed Generator
//!
//! Writes a synthetic GeoJSON earthquake feed for running the pipeline
//! offline (point `feed.source_path` at the output file).

use chrono::{Duration, Utc};
use rand::Rng;
use serde_json::{json, Value};
use tracing::info;

/// Regions reused across events so rolling statistics have history
const PLACES: &[(&str, f64, f64)] = &[
    ("Southern California", 34.0, -117.5),
    ("Central Alaska", 63.0, -150.0),
    ("Island of Hawaii, Hawaii", 19.4, -155.3),
    ("Tonga", -20.0, -174.5),
    ("Honshu, Japan", 37.5, 141.0),
    ("Central Chile", -33.0, -71.5),
];

struct FeedGenerator {
    rng: rand::rngs::ThreadRng,
    counter: u64,
}

impl FeedGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            counter: 0,
        }
    }

    /// Generate one GeoJSON feature
    fn generate(&mut self) -> Value {
        self.counter += 1;
        let (region, lat, lon) = PLACES[self.rng.gen_range(0..PLACES.len())];
        let time = Utc::now() - Duration::minutes(self.rng.gen_range(0..24 * 60));
        let distance: u32 = self.rng.gen_range(1..80);
        let place = format!("{} km {} of {}", distance, self.compass(), region);
        let mag_type = if self.rng.gen_bool(0.7) { "ml" } else { "mww" };
        let status = if self.rng.gen_bool(0.5) { "reviewed" } else { "automatic" };

        let mut properties = json!({
            "mag": (self.rng.gen_range(2.5..7.8_f64) * 10.0).round() / 10.0,
            "place": place,
            "time": time.timestamp_millis(),
            "updated": (time + Duration::minutes(self.rng.gen_range(5..120))).timestamp_millis(),
            "magType": mag_type,
            "net": "sim",
            "type": "earthquake",
            "status": status,
            "nst": self.rng.gen_range(5..120),
            "gap": self.rng.gen_range(20.0..250.0_f64),
            "dmin": self.rng.gen_range(0.01..5.0_f64),
            "rms": self.rng.gen_range(0.05..1.5_f64),
        });

        // Leave some optional fields out, as live feeds do
        if self.rng.gen_bool(0.2) {
            if let Some(props) = properties.as_object_mut() {
                props.remove("gap");
                props.remove("dmin");
                props.insert("nst".to_string(), Value::Null);
            }
        }

        json!({
            "type": "Feature",
            "id": format!("sim{:08}", self.counter),
            "properties": properties,
            "geometry": {
                "type": "Point",
                "coordinates": [
                    lon + self.rng.gen_range(-1.5..1.5),
                    lat + self.rng.gen_range(-1.5..1.5),
                    self.rng.gen_range(1.0..320.0_f64),
                ],
            },
        })
    }

    fn compass(&mut self) -> &'static str {
        const DIRECTIONS: &[&str] = &["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
        DIRECTIONS[self.rng.gen_range(0..DIRECTIONS.len())]
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_feed=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let output = args.get(1).map(|s| s.as_str()).unwrap_or("sample_feed.geojson");
    let count: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(50);

    info!(output = %output, count = count, "Generating sample feed");

    let mut generator = FeedGenerator::new();
    let features: Vec<Value> = (0..count).map(|_| generator.generate()).collect();
    let feed = json!({
        "type": "FeatureCollection",
        "metadata": { "generated": Utc::now().timestamp_millis(), "count": count },
        "features": features,
    });

    std::fs::write(output, serde_json::to_vec_pretty(&feed)?)?;
    info!("Wrote {} events to {}", count, output);

    Ok(())
}

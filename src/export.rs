//! CSV export of the scored record table

use crate::error::ExportError;
use crate::types::alert::ScoredRecord;
use chrono::{DateTime, TimeZone, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Column header of the export
pub const HEADER: &[&str] = &[
    "time",
    "updated",
    "place",
    "latitude",
    "longitude",
    "depth",
    "mag",
    "magType",
    "nst",
    "gap",
    "dmin",
    "rms",
    "net",
    "type",
    "status",
    "is_weekend",
    "season",
    "time_of_day",
    "depth_category",
    "distance_to_fault_km",
    "region",
    "monthly_event_count",
    "rolling_mag_mean",
    "rolling_mag_var",
    "history_score",
    "nearest_volcano_dist_km",
    "volcano_nearby",
    "dbscan_cluster",
    "label_aftershock",
    "predicted_magnitude",
    "aftershock_prob",
    "alert_status",
];

/// Undefined values are written as empty cells
fn number(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    optional(value.map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string()))
}

fn row(record: &ScoredRecord) -> Vec<String> {
    let f = &record.features;
    let e = &f.event;
    let c = &f.context;

    vec![
        timestamp(e.time),
        timestamp(e.updated),
        e.place.clone(),
        number(e.latitude),
        number(e.longitude),
        number(e.depth),
        number(e.magnitude),
        e.mag_type.clone(),
        number(e.station_count),
        number(e.gap),
        number(e.dmin),
        number(e.rms),
        e.network.clone(),
        e.event_type.clone(),
        e.status.clone(),
        f.is_weekend.to_string(),
        optional(f.season),
        optional(f.time_of_day),
        optional(f.depth_category),
        number(c.distance_to_fault_km),
        f.region().to_string(),
        c.monthly_event_count.to_string(),
        number(f.rolling_mag_mean),
        optional(f.rolling_mag_var),
        number(f.history_score),
        number(c.nearest_volcano_dist_km),
        u8::from(c.volcano_nearby).to_string(),
        c.dbscan_cluster.to_string(),
        c.label_aftershock.to_string(),
        number(record.predicted_magnitude),
        number(record.aftershock_probability),
        record.risk_level.to_string(),
    ]
}

/// Write all records as CSV
pub fn write_csv<W: Write>(records: &[ScoredRecord], writer: W) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADER)?;
    for record in records {
        csv.write_record(row(record))?;
    }
    csv.flush()?;
    Ok(())
}

/// File name embedding the generation time, e.g. `earthquake_predictions_20240316_0942.csv`
pub fn export_file_name<Tz: TimeZone>(generated_at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "earthquake_predictions_{}.csv",
        generated_at.format("%Y%m%d_%H%M")
    )
}

/// Write the export into `dir`, creating it if needed. Returns the file path.
pub fn export_to_dir<P: AsRef<Path>>(
    records: &[ScoredRecord],
    dir: P,
    generated_at: &DateTime<Utc>,
) -> Result<PathBuf, ExportError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let path = dir.join(export_file_name(generated_at));
    let file = fs::File::create(&path)?;
    write_csv(records, std::io::BufWriter::new(file))?;

    info!(path = %path.display(), records = records.len(), "Predictions exported");
    Ok(path)
}

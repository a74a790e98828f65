//! Seismic Risk Pipeline - Main Entry Point
//!
//! Runs one pass over the configured earthquake feed: scores every event,
//! labels its risk tier, posts high-risk alerts and exports the table.

use anyhow::Result;
use chrono::Utc;
use quake_watch::{
    config::AppConfig, dispatcher::AlertDispatcher, export::export_to_dir,
    fetcher::FeedFetcher, models::inference::InferenceEngine, Pipeline, RunOptions, RunOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/config.toml".to_string());
    let config = AppConfig::load_from_path(&config_path)?;

    init_logging(&config)?;

    info!("Starting Seismic Risk Pipeline");
    info!(path = %config_path, "Configuration loaded successfully");
    info!(
        "Detection thresholds: magnitude={:.1}, aftershock={:.2}",
        config.detection.magnitude_threshold, config.detection.aftershock_threshold
    );

    let client = reqwest::Client::builder()
        .user_agent(concat!("quake-watch/", env!("CARGO_PKG_VERSION")))
        .build()?;

    // Models load before anything is fetched so a bad artifact fails fast
    let engine = Arc::new(InferenceEngine::from_config(&config.models, &client).await?);
    info!(
        "Inference engine initialized ({} feature columns)",
        engine.required_columns().len()
    );

    let fetcher = FeedFetcher::new(client.clone(), &config.feed);
    info!(url = %fetcher.url(config.feed.window), "Feed source");

    let dispatcher = match (config.alerts.enabled, config.alerts.webhook_url.as_deref()) {
        (true, Some(url)) if !url.trim().is_empty() => {
            info!("Publishing alerts to webhook");
            Some(AlertDispatcher::new(
                client.clone(),
                url.trim(),
                Duration::from_secs(config.alerts.timeout_secs),
            ))
        }
        (true, _) => {
            warn!("Alerts enabled without a webhook URL");
            None
        }
        _ => None,
    };

    let pipeline = Pipeline::new(fetcher, engine, dispatcher);
    let options = RunOptions::from(&config);

    let report = match pipeline.run(&options).await? {
        RunOutcome::Empty { window } => {
            info!(
                window = %window,
                "No earthquake data available for the selected filter/time window"
            );
            return Ok(());
        }
        RunOutcome::Completed(report) => report,
    };

    report.metrics.print_summary();

    if config.export.enabled {
        match export_to_dir(&report.records, &config.export.output_dir, &Utc::now()) {
            Ok(path) => info!(run_id = %report.run_id, path = %path.display(), "Export written"),
            Err(e) => error!(run_id = %report.run_id, error = %e, "Export failed"),
        }
    }

    info!("Pipeline finished");
    Ok(())
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("quake_watch={}", config.logging.level).parse()?);

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

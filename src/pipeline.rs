//! End-to-end run: fetch, enrich, align, score, classify, dispatch.

use crate::config::AppConfig;
use crate::dispatcher::AlertDispatcher;
use crate::error::{PipelineError, ScoringError};
use crate::feature_engineer::FeatureEngineer;
use crate::fetcher::{filter_region, FeedFetcher};
use crate::metrics::{RunMetrics, Stage};
use crate::models::aligner::align;
use crate::models::inference::InferenceEngine;
use crate::types::alert::{RiskThresholds, ScoredRecord};
use crate::types::event::{Event, TimeWindow};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Run-scoped settings, passed explicitly into each stage
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub window: TimeWindow,
    pub region_filter: Option<String>,
    pub thresholds: RiskThresholds,
    pub send_alerts: bool,
}

impl From<&AppConfig> for RunOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            window: config.feed.window,
            region_filter: config.region_filter().map(str::to_string),
            thresholds: config.detection,
            send_alerts: config.alerts.enabled,
        }
    }
}

/// Result of a completed run
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub window: TimeWindow,
    pub records: Vec<ScoredRecord>,
    pub metrics: RunMetrics,
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// No usable events after filtering
    Empty { window: TimeWindow },
    Completed(RunReport),
}

/// The seismic risk pipeline
pub struct Pipeline {
    fetcher: FeedFetcher,
    engine: Arc<InferenceEngine>,
    feature_engineer: FeatureEngineer,
    dispatcher: Option<AlertDispatcher>,
}

impl Pipeline {
    pub fn new(
        fetcher: FeedFetcher,
        engine: Arc<InferenceEngine>,
        dispatcher: Option<AlertDispatcher>,
    ) -> Self {
        Self {
            fetcher,
            engine,
            feature_engineer: FeatureEngineer::new(),
            dispatcher,
        }
    }

    /// Run every stage once. Fetch and scoring failures abort the run;
    /// webhook failures do not.
    pub async fn run(&self, options: &RunOptions) -> Result<RunOutcome, PipelineError> {
        let run_id = Uuid::new_v4();
        let mut metrics = RunMetrics::new();
        info!(run_id = %run_id, window = %options.window, "Starting pipeline run");

        let started = Instant::now();
        let mut events = self.fetcher.fetch(options.window).await?;
        metrics.events_fetched = events.len();

        if let Some(filter) = options.region_filter.as_deref() {
            events = filter_region(events, filter);
            info!(filter = %filter, remaining = events.len(), "Region filter applied");
        }
        metrics.record_stage(Stage::Fetch, started.elapsed());

        if events.is_empty() {
            info!(
                run_id = %run_id,
                window = %options.window,
                "No earthquake data available for the selected filter/time window"
            );
            return Ok(RunOutcome::Empty {
                window: options.window,
            });
        }
        metrics.events_scored = events.len();

        let records = self.score_events(&events, &options.thresholds, &mut metrics)?;
        metrics.record_scored(&records);

        if options.send_alerts {
            match &self.dispatcher {
                Some(dispatcher) => {
                    let started = Instant::now();
                    let report = dispatcher.dispatch(&records).await;
                    metrics.record_stage(Stage::Dispatch, started.elapsed());
                    metrics.record_dispatch(report);
                }
                None => warn!("Alerts enabled but no webhook URL configured, skipping dispatch"),
            }
        }

        info!(
            run_id = %run_id,
            records = records.len(),
            elapsed_ms = metrics.elapsed().as_millis() as u64,
            "Pipeline run complete"
        );

        Ok(RunOutcome::Completed(RunReport {
            run_id,
            window: options.window,
            records,
            metrics,
        }))
    }

    /// Enrich, align, score and classify a batch of events.
    pub fn score_events(
        &self,
        events: &[Event],
        thresholds: &RiskThresholds,
        metrics: &mut RunMetrics,
    ) -> Result<Vec<ScoredRecord>, ScoringError> {
        let started = Instant::now();
        let vectors = self.feature_engineer.enrich(events);
        metrics.record_stage(Stage::Enrich, started.elapsed());

        let started = Instant::now();
        let matrix = align(&vectors, self.engine.required_columns());
        let predictions = self.engine.score(&matrix)?;
        metrics.record_stage(Stage::Score, started.elapsed());

        let started = Instant::now();
        let records: Vec<ScoredRecord> = vectors
            .into_iter()
            .zip(predictions.magnitudes)
            .zip(predictions.aftershock_probabilities)
            .map(|((features, magnitude), probability)| {
                ScoredRecord::new(features, magnitude, probability, thresholds)
            })
            .collect();
        metrics.record_stage(Stage::Classify, started.elapsed());

        Ok(records)
    }
}

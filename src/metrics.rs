//! Run metrics and the end-of-run summary.

use crate::dispatcher::DispatchReport;
use crate::types::alert::{RiskLevel, ScoredRecord};
use std::time::{Duration, Instant};
use tracing::info;

/// Number of buckets in the aftershock probability histogram
pub const PROBABILITY_BUCKETS: usize = 20;

/// Pipeline stages with recorded timings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Enrich,
    Score,
    Classify,
    Dispatch,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Enrich => "enrich",
            Stage::Score => "score",
            Stage::Classify => "classify",
            Stage::Dispatch => "dispatch",
        }
    }
}

/// Metrics collected over one pipeline run
#[derive(Debug, Clone)]
pub struct RunMetrics {
    start_time: Instant,
    /// Events returned by the feed after the validity filter
    pub events_fetched: usize,
    /// Events left after the region filter
    pub events_scored: usize,
    alerts_by_level: [usize; 3],
    score_buckets: [usize; PROBABILITY_BUCKETS],
    magnitude_range: Option<(f64, f64)>,
    stage_times: Vec<(Stage, Duration)>,
    dispatch: Option<DispatchReport>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            events_fetched: 0,
            events_scored: 0,
            alerts_by_level: [0; 3],
            score_buckets: [0; PROBABILITY_BUCKETS],
            magnitude_range: None,
            stage_times: Vec::new(),
            dispatch: None,
        }
    }

    /// Record how long a stage took
    pub fn record_stage(&mut self, stage: Stage, elapsed: Duration) {
        self.stage_times.push((stage, elapsed));
    }

    /// Record the labels and predictions of the scored set
    pub fn record_scored(&mut self, records: &[ScoredRecord]) {
        self.alerts_by_level = [0; 3];
        self.score_buckets = [0; PROBABILITY_BUCKETS];
        self.magnitude_range = None;

        for record in records {
            self.alerts_by_level[record.risk_level as usize] += 1;

            let p = record.aftershock_probability;
            if !p.is_nan() {
                let bucket = ((p * PROBABILITY_BUCKETS as f64) as usize).min(PROBABILITY_BUCKETS - 1);
                self.score_buckets[bucket] += 1;
            }

            let m = record.predicted_magnitude;
            if !m.is_nan() {
                self.magnitude_range = Some(match self.magnitude_range {
                    Some((lo, hi)) => (lo.min(m), hi.max(m)),
                    None => (m, m),
                });
            }
        }
    }

    pub fn record_dispatch(&mut self, report: DispatchReport) {
        self.dispatch = Some(report);
    }

    /// Number of records with a given label
    pub fn count(&self, level: RiskLevel) -> usize {
        self.alerts_by_level[level as usize]
    }

    /// Aftershock probability histogram
    pub fn probability_distribution(&self) -> [usize; PROBABILITY_BUCKETS] {
        self.score_buckets
    }

    /// Lowest and highest predicted magnitude
    pub fn magnitude_range(&self) -> Option<(f64, f64)> {
        self.magnitude_range
    }

    pub fn stage_time(&self, stage: Stage) -> Option<Duration> {
        self.stage_times
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, d)| *d)
    }

    pub fn dispatch(&self) -> Option<DispatchReport> {
        self.dispatch
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let total = self.events_scored;
        let pct = |count: usize| {
            if total > 0 {
                (count as f64 / total as f64) * 100.0
            } else {
                0.0
            }
        };

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║             SEISMIC RISK PIPELINE - RUN SUMMARY              ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Events Fetched: {:>8}  │  Events Scored: {:>8}          ║",
            self.events_fetched, self.events_scored
        );
        if let Some((lo, hi)) = self.magnitude_range {
            info!(
                "║ Predicted Magnitude: min={:>5.2} max={:>5.2}                     ║",
                lo, hi
            );
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Alert Summary:                                               ║");
        for level in RiskLevel::ALL.iter().rev() {
            let count = self.count(*level);
            info!(
                "║   {:14}: {:>6} ({:>5.1}%)                              ║",
                level.label(),
                count,
                pct(count)
            );
        }
        if let Some(report) = self.dispatch {
            info!(
                "║ Webhooks: attempted={} delivered={} failed={}",
                report.attempted, report.delivered, report.failed
            );
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Aftershock Probability Distribution:                         ║");
        for (i, &count) in self.score_buckets.iter().enumerate() {
            let share = pct(count);
            let bar: String = "█".repeat(((share / 2.0) as usize).min(20));
            info!(
                "║   {:.2}-{:.2}: {:>6} ({:>5.1}%) {}",
                i as f64 / PROBABILITY_BUCKETS as f64,
                (i + 1) as f64 / PROBABILITY_BUCKETS as f64,
                count,
                share,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");

        if !self.stage_times.is_empty() {
            info!("Stage Times (ms):");
            for (stage, elapsed) in &self.stage_times {
                info!("  {}: {:.2}", stage.as_str(), elapsed.as_secs_f64() * 1000.0);
            }
            info!("  total: {:.2}", self.elapsed().as_secs_f64() * 1000.0);
        }
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_engineer::FeatureEngineer;
    use crate::types::alert::RiskThresholds;
    use crate::types::event::Event;

    fn scored(predictions: &[(f64, f64)]) -> Vec<ScoredRecord> {
        let events: Vec<Event> = predictions
            .iter()
            .map(|(m, _)| Event::new(0.0, 0.0, 5.0, *m))
            .collect();
        FeatureEngineer::new()
            .enrich(&events)
            .into_iter()
            .zip(predictions)
            .map(|(v, (m, p))| ScoredRecord::new(v, *m, *p, &RiskThresholds::default()))
            .collect()
    }

    #[test]
    fn test_counts_by_level() {
        let mut metrics = RunMetrics::new();
        metrics.record_scored(&scored(&[(4.0, 0.1), (6.0, 0.5), (7.5, 0.9), (3.2, 0.05)]));

        assert_eq!(metrics.count(RiskLevel::Low), 2);
        assert_eq!(metrics.count(RiskLevel::Moderate), 1);
        assert_eq!(metrics.count(RiskLevel::High), 1);
        assert_eq!(metrics.magnitude_range(), Some((3.2, 7.5)));
    }

    #[test]
    fn test_probability_histogram() {
        let mut metrics = RunMetrics::new();
        metrics.record_scored(&scored(&[(4.0, 0.0), (4.0, 0.01), (4.0, 0.5), (4.0, 1.0)]));

        let dist = metrics.probability_distribution();
        assert_eq!(dist[0], 2);
        assert_eq!(dist[10], 1);
        // 1.0 lands in the last bucket
        assert_eq!(dist[PROBABILITY_BUCKETS - 1], 1);
        assert_eq!(dist.iter().sum::<usize>(), 4);
    }

    #[test]
    fn test_stage_times_and_dispatch() {
        let mut metrics = RunMetrics::new();
        metrics.record_stage(Stage::Score, Duration::from_millis(12));
        metrics.record_dispatch(DispatchReport {
            attempted: 3,
            delivered: 2,
            failed: 1,
        });

        assert_eq!(metrics.stage_time(Stage::Score), Some(Duration::from_millis(12)));
        assert_eq!(metrics.stage_time(Stage::Fetch), None);
        assert_eq!(metrics.dispatch().map(|r| r.failed), Some(1));
    }
}

//! Webhook dispatcher for high-risk alerts

use crate::types::alert::{AlertPayload, RiskLevel, ScoredRecord};
use anyhow::Result;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of one dispatch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Sender for high-risk alert notifications
#[derive(Clone)]
pub struct AlertDispatcher {
    client: reqwest::Client,
    webhook_url: String,
    timeout: Duration,
}

impl AlertDispatcher {
    /// Create a new alert dispatcher
    pub fn new(client: reqwest::Client, webhook_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            webhook_url: webhook_url.to_string(),
            timeout,
        }
    }

    /// Post one alert payload
    pub async fn send(&self, payload: &AlertPayload) -> Result<()> {
        self.client
            .post(&self.webhook_url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;

        debug!(content = %payload.content, "Webhook alert delivered");
        Ok(())
    }

    /// Notify the webhook about every high-risk record.
    ///
    /// A failed delivery is logged and counted; the remaining records are
    /// still attempted.
    pub async fn dispatch(&self, records: &[ScoredRecord]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for record in records.iter().filter(|r| r.risk_level == RiskLevel::High) {
            report.attempted += 1;
            let payload = AlertPayload::from_record(record);

            if let Err(e) = self.send(&payload).await {
                report.failed += 1;
                warn!(
                    place = %record.place(),
                    error = %e,
                    "Webhook failed"
                );
            } else {
                report.delivered += 1;
            }
        }

        info!(
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "Alert dispatch complete"
        );

        report
    }

    /// Get the webhook URL
    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_engineer::FeatureEngineer;
    use crate::types::alert::RiskThresholds;
    use crate::types::event::Event;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    fn records(scores: &[(&str, f64, f64)]) -> Vec<ScoredRecord> {
        let thresholds = RiskThresholds::default();
        let events: Vec<Event> = scores
            .iter()
            .map(|(place, mag, _)| Event::new(0.0, 0.0, 10.0, *mag).with_place(place))
            .collect();
        FeatureEngineer::new()
            .enrich(&events)
            .into_iter()
            .zip(scores)
            .map(|(v, (_, mag, prob))| ScoredRecord::new(v, *mag, *prob, &thresholds))
            .collect()
    }

    /// Minimal HTTP endpoint answering `status` and forwarding request bodies
    async fn webhook_server(status: u16) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                let body = loop {
                    let n = socket.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        break String::new();
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    let text = String::from_utf8_lossy(&buf).to_string();
                    if let Some(split) = text.find("\r\n\r\n") {
                        let length = text[..split]
                            .lines()
                            .find_map(|l| {
                                let (name, value) = l.split_once(':')?;
                                name.eq_ignore_ascii_case("content-length")
                                    .then(|| value.trim().parse::<usize>().ok())?
                            })
                            .unwrap_or(0);
                        if buf.len() >= split + 4 + length {
                            break text[split + 4..split + 4 + length].to_string();
                        }
                    }
                };
                let _ = tx.send(body);
                let response = format!(
                    "HTTP/1.1 {status} X\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });

        (format!("http://{addr}/hook"), rx)
    }

    #[tokio::test]
    async fn test_only_high_risk_records_dispatched() {
        let (url, mut bodies) = webhook_server(200).await;
        let dispatcher = AlertDispatcher::new(reqwest::Client::new(), &url, Duration::from_secs(5));

        let records = records(&[
            ("Low place", 3.0, 0.1),
            ("Moderate place", 5.5, 0.2),
            ("High place", 7.1, 0.3),
        ]);
        let report = dispatcher.dispatch(&records).await;

        assert_eq!(
            report,
            DispatchReport {
                attempted: 1,
                delivered: 1,
                failed: 0
            }
        );

        let body: AlertPayload = serde_json::from_str(&bodies.recv().await.unwrap()).unwrap();
        assert_eq!(
            body.content,
            "Alert! High place | Predicted Mag: 7.10 | Aftershock Prob: 0.30 | High Risk"
        );
    }

    #[tokio::test]
    async fn test_error_status_counts_as_failure() {
        let (url, _bodies) = webhook_server(500).await;
        let dispatcher = AlertDispatcher::new(reqwest::Client::new(), &url, Duration::from_secs(5));

        let report = dispatcher
            .dispatch(&records(&[("A", 7.0, 0.9), ("B", 6.5, 0.1)]))
            .await;
        assert_eq!(report.attempted, 2);
        assert_eq!(report.failed, 2);
    }

    #[tokio::test]
    async fn test_unreachable_webhook_does_not_stop_dispatch() {
        let dispatcher = AlertDispatcher::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/hook",
            Duration::from_secs(2),
        );

        let report = dispatcher
            .dispatch(&records(&[("A", 7.0, 0.9), ("B", 4.0, 0.1), ("C", 6.1, 0.95)]))
            .await;
        assert_eq!(
            report,
            DispatchReport {
                attempted: 2,
                delivered: 0,
                failed: 2
            }
        );
    }

    #[tokio::test]
    async fn test_no_high_risk_records() {
        let dispatcher = AlertDispatcher::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/hook",
            Duration::from_secs(2),
        );

        let report = dispatcher.dispatch(&records(&[("A", 3.0, 0.1)])).await;
        assert_eq!(report, DispatchReport::default());
    }
}

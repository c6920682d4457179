//! Sequential latency probes.

use super::config::LatencyConfig;
use crate::measurements::{ping_from_trips, probe_loss_pct};
use crate::results::LatencyDetails;
use crate::transport::Transport;
use log::{debug, info, warn};
use tokio::time::{sleep, timeout, Instant};
use url::Url;

/// Outcome of the latency phase before any pass/fail decision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencyReport {
    /// Successful trip times in milliseconds, in probe order
    pub trips_ms: Vec<f64>,
    pub sent: usize,
    pub lost: usize,
    /// Message of the last failed probe
    pub last_error: Option<String>,
}

impl LatencyReport {
    /// Rounded mean of the successful trips.
    ///
    /// `None` when nothing succeeded or the mean rounds to zero or below;
    /// either way the latency phase has failed.
    pub fn ping_ms(&self) -> Option<i32> {
        ping_from_trips(&self.trips_ms).filter(|ping| *ping > 0)
    }

    pub fn loss_pct(&self) -> f64 {
        probe_loss_pct(self.sent, self.lost)
    }

    /// Message attached to a latency failure.
    pub fn failure_detail(&self) -> String {
        match &self.last_error {
            Some(error) if self.trips_ms.is_empty() => {
                format!("all {} probes failed, last error: {}", self.sent, error)
            }
            _ if self.trips_ms.is_empty() => {
                format!("all {} probes failed", self.sent)
            }
            _ => "probe round trips were not positive".to_string(),
        }
    }

    pub fn details(&self) -> LatencyDetails {
        LatencyDetails::new(self.trips_ms.clone(), self.sent, self.lost)
    }
}

/// Run `config.probes` sequential probes against `target`.
///
/// Each probe waits `config.gap` first and is bounded by
/// `config.probe_timeout`. A failed or timed-out probe counts as lost.
/// `on_probe` receives the 1-indexed probe number and its trip time.
pub async fn measure_latency<F>(
    transport: &dyn Transport,
    target: &Url,
    config: &LatencyConfig,
    mut on_probe: F,
) -> LatencyReport
where
    F: FnMut(usize, Option<f64>) + Send,
{
    let total = config.probes;
    let mut report = LatencyReport {
        trips_ms: Vec::with_capacity(total),
        ..LatencyReport::default()
    };

    for i in 0..total {
        sleep(config.gap).await;
        debug!("Latency probe {}/{}", i + 1, total);

        let started = Instant::now();
        report.sent += 1;

        let trip_ms =
            match timeout(config.probe_timeout, transport.probe(target)).await {
                Ok(Ok(())) => {
                    Some(started.elapsed().as_micros() as f64 / 1000.0)
                }
                Ok(Err(error)) => {
                    debug!("Probe {}/{} failed: {}", i + 1, total, error);
                    report.last_error = Some(error.to_string());
                    None
                }
                Err(_) => {
                    debug!(
                        "Probe {}/{} timed out after {:?}",
                        i + 1,
                        total,
                        config.probe_timeout
                    );
                    report.last_error = Some(format!(
                        "timed out after {:?}",
                        config.probe_timeout
                    ));
                    None
                }
            };

        match trip_ms {
            Some(ms) => {
                debug!("Latency: {:.2} ms", ms);
                report.trips_ms.push(ms);
            }
            None => report.lost += 1,
        }

        on_probe(i + 1, trip_ms);
    }

    if report.lost > 0 {
        warn!(
            "{} of {} latency probes lost, continuing with {} successful",
            report.lost,
            total,
            report.trips_ms.len()
        );
    }
    info!(
        "Latency: ping {:?} ms, probe loss {:.1}%",
        report.ping_ms(),
        report.loss_pct()
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{url, ScriptedTransport};
    use std::time::Duration;

    fn ms(millis: u64) -> Option<Duration> {
        Some(Duration::from_millis(millis))
    }

    #[tokio::test(start_paused = true)]
    async fn test_mixed_probes() {
        let transport = ScriptedTransport::new()
            .with_probes(vec![ms(100), None, ms(120), None, ms(110)]);
        let mut seen = Vec::new();

        let report = measure_latency(
            &transport,
            &url("https://probe.test/status/200"),
            &LatencyConfig::default(),
            |current, trip| seen.push((current, trip.is_some())),
        )
        .await;

        assert_eq!(report.trips_ms, vec![100.0, 120.0, 110.0]);
        assert_eq!(report.sent, 5);
        assert_eq!(report.lost, 2);
        assert_eq!(report.ping_ms(), Some(110));
        assert_eq!(report.loss_pct(), 40.0);
        assert_eq!(
            seen,
            vec![(1, true), (2, false), (3, true), (4, false), (5, true)]
        );
        assert_eq!(transport.probe_calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_probes_failing() {
        let transport =
            ScriptedTransport::new().with_probes(vec![None; 5]);

        let report = measure_latency(
            &transport,
            &url("https://probe.test/status/200"),
            &LatencyConfig::default(),
            |_, _| {},
        )
        .await;

        assert_eq!(report.ping_ms(), None);
        assert_eq!(report.loss_pct(), 100.0);
        assert!(report.failure_detail().contains("all 5 probes failed"));
        assert!(report.failure_detail().contains("probe refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_counts_as_lost() {
        let transport = ScriptedTransport::new()
            .with_probes(vec![ms(3000), ms(40), ms(60)]);
        let config = LatencyConfig { probes: 3, ..LatencyConfig::default() };

        let report = measure_latency(
            &transport,
            &url("https://probe.test/status/200"),
            &config,
            |_, _| {},
        )
        .await;

        assert_eq!(report.trips_ms, vec![40.0, 60.0]);
        assert_eq!(report.lost, 1);
        assert_eq!(report.ping_ms(), Some(50));
        assert!(report.last_error.unwrap().contains("timed out"));
    }

    #[test]
    fn test_sub_millisecond_ping_is_a_failure() {
        let report = LatencyReport {
            trips_ms: vec![0.2, 0.3],
            sent: 2,
            lost: 0,
            last_error: None,
        };
        assert_eq!(report.ping_ms(), None);
        assert_eq!(
            report.failure_detail(),
            "probe round trips were not positive"
        );
    }

    #[test]
    fn test_details_carry_probe_jitter() {
        let report = LatencyReport {
            trips_ms: vec![100.0, 120.0, 110.0],
            sent: 5,
            lost: 2,
            last_error: None,
        };
        let details = report.details();
        assert_eq!(details.probe_jitter_ms, Some(15.0));
        assert_eq!(details.sent, 5);
    }
}

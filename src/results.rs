//! Result data structures for measurement output.
//!
//! [`PhaseResult`] holds the headline numbers of one run and is produced
//! once by [`PhaseResultBuilder`] after every phase succeeded.
//! [`MeasurementSummary`] wraps it with the sample history, latency probe
//! details and a completion timestamp. All structures implement Serialize
//! for JSON output.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::measurements::derived_jitter_ms;
use crate::samples::{RingBuffer, SpeedStats};
use crate::stats::mean_abs_diff;
use crate::transport::NetworkType;

/// Headline numbers of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseResult {
    /// Mean successful probe time, rounded
    pub ping_ms: i32,
    /// Derived from the ping, capped at 10 ms
    pub jitter_ms: f64,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    /// Share of latency probes that failed or timed out
    pub packet_loss_pct: f64,
    pub network_type: NetworkType,
}

/// Accumulates per-phase values as the run advances.
///
/// Values are set once per phase and the result only exists after all of
/// them are present, so a failed run never yields a partial result.
#[derive(Debug, Clone)]
pub struct PhaseResultBuilder {
    network_type: NetworkType,
    latency: Option<(i32, f64)>,
    download_mbps: Option<f64>,
    upload_mbps: Option<f64>,
}

impl PhaseResultBuilder {
    pub fn new(network_type: NetworkType) -> Self {
        Self {
            network_type,
            latency: None,
            download_mbps: None,
            upload_mbps: None,
        }
    }

    pub fn latency(mut self, ping_ms: i32, packet_loss_pct: f64) -> Self {
        self.latency = Some((ping_ms, packet_loss_pct));
        self
    }

    pub fn download(mut self, mbps: f64) -> Self {
        self.download_mbps = Some(mbps);
        self
    }

    pub fn upload(mut self, mbps: f64) -> Self {
        self.upload_mbps = Some(mbps);
        self
    }

    /// Derive jitter and produce the result, or `None` if a phase is
    /// missing.
    pub fn build(self) -> Option<PhaseResult> {
        let (ping_ms, packet_loss_pct) = self.latency?;

        Some(PhaseResult {
            ping_ms,
            jitter_ms: derived_jitter_ms(ping_ms),
            download_mbps: self.download_mbps?,
            upload_mbps: self.upload_mbps?,
            packet_loss_pct,
            network_type: self.network_type,
        })
    }
}

/// Individual probe outcomes of the latency phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencyDetails {
    /// Successful trip times in probe order
    pub trips_ms: Vec<f64>,
    pub sent: usize,
    pub lost: usize,
    /// Mean absolute difference of consecutive trips, when at least two
    /// probes succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_jitter_ms: Option<f64>,
}

impl LatencyDetails {
    pub fn new(trips_ms: Vec<f64>, sent: usize, lost: usize) -> Self {
        let probe_jitter_ms = mean_abs_diff(&trips_ms);
        Self { trips_ms, sent, lost, probe_jitter_ms }
    }
}

/// Terminal value of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementSummary {
    /// Timestamp when the run completed
    pub timestamp: DateTime<Utc>,
    pub result: PhaseResult,
    /// Min, mean and max over the instantaneous samples
    pub speed: SpeedStats,
    /// Instantaneous samples in Mbps, oldest first
    pub samples: Vec<f64>,
    pub latency: LatencyDetails,
}

impl MeasurementSummary {
    pub fn new(
        result: PhaseResult,
        samples: &RingBuffer<f64>,
        latency: LatencyDetails,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            result,
            speed: samples.speed_stats(),
            samples: samples.to_vec(),
            latency,
        }
    }
}

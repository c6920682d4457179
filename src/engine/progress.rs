//! Progress event types and callback interface.
//!
//! Defines the events the engine pushes to its observers while a run is
//! in flight and the callback trait for receiving them.

use super::phase::MeasurementPhase;
use crate::results::MeasurementSummary;

/// Outcome channel of a run, as seen by the front end.
#[derive(Debug, Clone)]
pub enum RunStatus {
    /// A run has started; no result yet
    Loading,
    /// All phases succeeded
    Success(MeasurementSummary),
    /// The run halted; carries the user-facing message
    Error(String),
}

/// Events emitted during a run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Overall progress in [0, 1], never decreasing within a run
    Progress(f64),
    /// The orchestrator entered a new phase
    PhaseChange(MeasurementPhase),
    /// Human-readable description of the current step
    PhaseLabel(String),
    /// One instantaneous throughput sample in Mbps
    InstantSpeed(f64),
    /// A latency probe finished
    LatencyProbe {
        /// Trip time in milliseconds, `None` if the probe was lost
        trip_ms: Option<f64>,
        /// Current probe number (1-indexed)
        current: usize,
        /// Total number of probes
        total: usize,
    },
    /// Loading at the start of a run, then exactly one terminal status
    Result(RunStatus),
}

/// Callback interface for progress updates.
///
/// Implementations must be non-blocking: they are invoked from the
/// sampling tasks and would otherwise skew the measured windows.
pub trait ProgressCallback: Send + Sync {
    /// Called when a progress event occurs.
    fn on_progress(&self, event: ProgressEvent);
}

//! Measurement engine.
//!
//! The orchestrator runs the phase sequence and reports progress; the
//! sampler is the timed throughput primitive behind the download and
//! upload phases.

pub mod config;
pub mod latency;
pub mod orchestrator;
pub mod phase;
pub mod progress;
pub mod sampler;

#[cfg(test)]
pub(crate) mod testing;

pub use config::EngineConfig;
pub use orchestrator::MeasurementEngine;
pub use phase::MeasurementPhase;
pub use progress::{ProgressCallback, ProgressEvent, RunStatus};

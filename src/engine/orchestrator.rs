//! Measurement orchestrator.
//!
//! Runs the fixed phase sequence (connectivity gate, latency, download,
//! upload, derived metrics), maps each phase into its slice of the overall
//! progress and decides success or failure per phase.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//!
//! struct Quiet;
//!
//! impl ProgressCallback for Quiet {
//!     fn on_progress(&self, _event: ProgressEvent) {}
//! }
//!
//! let transport = Arc::new(HttpTransport::new(&TransportConfig::default())?);
//! let engine = MeasurementEngine::new(EngineConfig::default(), transport);
//! let summary = engine.run(Arc::new(Quiet)).await?;
//! println!("Download: {:.2} Mbps", summary.result.download_mbps);
//! ```

use super::config::EngineConfig;
use super::latency::measure_latency;
use super::phase::MeasurementPhase;
use super::progress::{ProgressCallback, ProgressEvent, RunStatus};
use super::sampler::{
    Direction, SampleObserver, SampleOutcome, ThroughputSampler,
};
use crate::errors::MeasurementError;
use crate::results::{MeasurementSummary, PhaseResultBuilder};
use crate::samples::RingBuffer;
use crate::transport::Transport;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Marks the engine busy for the lifetime of one run.
struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a AtomicBool) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard { running })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

struct ReporterState {
    phase: MeasurementPhase,
    high_water: f64,
    samples: RingBuffer<f64>,
}

/// Per-run event sink in front of the caller's callback.
///
/// Tracks the current phase, maps phase-local progress into the phase's
/// slice and never lets overall progress go backwards. Instantaneous
/// samples are kept for the summary.
struct RunReporter {
    callback: Arc<dyn ProgressCallback>,
    state: Mutex<ReporterState>,
}

impl RunReporter {
    fn new(
        callback: Arc<dyn ProgressCallback>,
        sample_capacity: usize,
    ) -> Self {
        Self {
            callback,
            state: Mutex::new(ReporterState {
                phase: MeasurementPhase::Idle,
                high_water: 0.0,
                samples: RingBuffer::with_capacity(sample_capacity),
            }),
        }
    }

    fn emit(&self, event: ProgressEvent) {
        self.callback.on_progress(event);
    }

    fn lock(&self) -> MutexGuard<'_, ReporterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn phase(&self) -> MeasurementPhase {
        self.lock().phase
    }

    /// Move to `next`, announcing it and the start of its progress slice.
    fn enter(&self, next: MeasurementPhase) {
        {
            let mut state = self.lock();
            match state.phase.transition(next) {
                Ok(phase) => state.phase = phase,
                Err(error) => {
                    warn!("Ignoring {}", error);
                    return;
                }
            }
        }

        debug!("Entering phase {:?}", next);
        self.emit(ProgressEvent::PhaseChange(next));
        self.emit(ProgressEvent::PhaseLabel(next.label().to_string()));

        match next {
            MeasurementPhase::Complete => self.advance_to(1.0),
            _ => self.advance(0.0),
        }
    }

    /// Report progress within the current phase.
    fn advance(&self, fraction: f64) {
        if let Some(range) = self.phase().progress_range() {
            self.advance_to(range.map(fraction));
        }
    }

    fn advance_to(&self, progress: f64) {
        let progress = progress.clamp(0.0, 1.0);
        {
            let mut state = self.lock();
            if progress < state.high_water {
                return;
            }
            state.high_water = progress;
        }
        self.emit(ProgressEvent::Progress(progress));
    }

    fn probe(&self, current: usize, total: usize, trip_ms: Option<f64>) {
        self.emit(ProgressEvent::LatencyProbe { trip_ms, current, total });
        if total > 0 {
            self.advance(current as f64 / total as f64);
        }
    }

    fn samples(&self) -> RingBuffer<f64> {
        self.lock().samples.clone()
    }
}

impl SampleObserver for RunReporter {
    fn on_instant(&self, mbps: f64) {
        self.lock().samples.push(mbps);
        self.emit(ProgressEvent::InstantSpeed(mbps));
    }

    fn on_progress(&self, fraction: f64) {
        self.advance(fraction);
    }
}

/// Detail attached to a throughput failure.
fn throughput_failure_detail(outcome: &SampleOutcome) -> String {
    match &outcome.last_error {
        Some(error) => error.to_string(),
        None => "no bytes transferred within the time budget".to_string(),
    }
}

/// Measurement engine running one phase sequence at a time.
pub struct MeasurementEngine {
    config: EngineConfig,
    transport: Arc<dyn Transport>,
    sampler: ThroughputSampler,
    running: AtomicBool,
}

impl MeasurementEngine {
    pub fn new(config: EngineConfig, transport: Arc<dyn Transport>) -> Self {
        let sampler = ThroughputSampler::new(
            Arc::clone(&transport),
            config.window,
            config.upload_chunk_bytes,
        );

        Self { config, transport, sampler, running: AtomicBool::new(false) }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether a run is in flight.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run the complete measurement sequence.
    ///
    /// Emits `Result(Loading)` first and exactly one terminal
    /// `Result(Success | Error)` last. Calling this while another run is
    /// active returns [`MeasurementError::AlreadyRunning`] without emitting
    /// anything.
    pub async fn run(
        &self,
        callback: Arc<dyn ProgressCallback>,
    ) -> Result<MeasurementSummary, MeasurementError> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            warn!("Measurement already running, ignoring start request");
            return Err(MeasurementError::AlreadyRunning);
        };

        info!("Starting measurement sequence");

        let reporter =
            Arc::new(RunReporter::new(callback, self.config.sample_capacity));
        reporter.emit(ProgressEvent::Result(RunStatus::Loading));

        match self.run_phases(&reporter).await {
            Ok(summary) => {
                reporter.enter(MeasurementPhase::Complete);
                info!(
                    "Measurement complete: ping={} ms, download={:.2} Mbps, upload={:.2} Mbps",
                    summary.result.ping_ms,
                    summary.result.download_mbps,
                    summary.result.upload_mbps
                );
                reporter.emit(ProgressEvent::Result(RunStatus::Success(
                    summary.clone(),
                )));
                Ok(summary)
            }
            Err(error) => {
                warn!("Measurement failed: {}", error);
                reporter.enter(MeasurementPhase::Failed);
                reporter.emit(ProgressEvent::Result(RunStatus::Error(
                    error.to_string(),
                )));
                Err(error)
            }
        }
    }

    async fn run_phases(
        &self,
        reporter: &Arc<RunReporter>,
    ) -> Result<MeasurementSummary, MeasurementError> {
        let endpoints = &self.config.endpoints;
        let observer: Arc<dyn SampleObserver> = reporter.clone();

        // Connectivity gate
        let network = self
            .transport
            .active_network()
            .ok_or(MeasurementError::NoConnectivity)?;
        info!("Active network: {}", network);

        reporter.enter(MeasurementPhase::Latency);
        let total = self.config.latency.probes;
        let latency = measure_latency(
            self.transport.as_ref(),
            &endpoints.latency_probe,
            &self.config.latency,
            |current, trip_ms| reporter.probe(current, total, trip_ms),
        )
        .await;
        let ping_ms = latency.ping_ms().ok_or_else(|| {
            MeasurementError::LatencyFailed(latency.failure_detail())
        })?;
        let builder =
            PhaseResultBuilder::new(network).latency(ping_ms, latency.loss_pct());

        reporter.enter(MeasurementPhase::Download);
        let download = self
            .sampler
            .sample(
                Direction::Download,
                &self.config.download,
                &endpoints.download_sources,
                Arc::clone(&observer),
            )
            .await;
        if download.rate_mbps <= 0.0 {
            return Err(MeasurementError::DownloadFailed(
                throughput_failure_detail(&download),
            ));
        }
        let builder = builder.download(download.rate_mbps);

        reporter.enter(MeasurementPhase::Upload);
        let targets = [
            endpoints.upload_primary.clone(),
            endpoints.upload_fallback.clone(),
        ];
        let upload = self
            .sampler
            .sample(Direction::Upload, &self.config.upload, &targets, observer)
            .await;
        if upload.rate_mbps <= 0.0 {
            return Err(MeasurementError::UploadFailed(
                throughput_failure_detail(&upload),
            ));
        }
        let builder = builder.upload(upload.rate_mbps);

        reporter.enter(MeasurementPhase::Finalizing);
        let result = builder.build().ok_or_else(|| {
            MeasurementError::UnexpectedTransportError(
                "phase results incomplete".to_string(),
            )
        })?;
        debug!(
            "Derived jitter {:.2} ms, probe loss {:.1}%",
            result.jitter_ms, result.packet_loss_pct
        );
        let summary = MeasurementSummary::new(
            result,
            &reporter.samples(),
            latency.details(),
        );
        reporter.advance(1.0);

        Ok(summary)
    }
}

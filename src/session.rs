//! UI-facing measurement session.
//!
//! Folds engine events into a [`SessionState`] the front end renders from
//! snapshots. Every run gets a generation number; events from a run that
//! was abandoned by [`SpeedTestSession::reset`] carry a stale generation
//! and are dropped.

use crate::engine::{
    MeasurementEngine, MeasurementPhase, ProgressCallback, ProgressEvent,
    RunStatus,
};
use crate::errors::MeasurementError;
use crate::results::MeasurementSummary;
use crate::samples::{RingBuffer, SpeedStats};
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Error information for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    /// Error message
    pub message: String,
    /// Optional suggestion for resolution
    pub suggestion: Option<String>,
}

/// Latency probe progress.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencyState {
    /// Successful trip times in ms
    pub trips_ms: Vec<f64>,
    /// Current probe number
    pub current: usize,
    /// Total number of probes
    pub total: usize,
}

/// Everything the front end needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub phase: MeasurementPhase,
    /// Overall progress in [0, 1]
    pub progress: f64,
    pub phase_label: String,
    /// Instantaneous speeds of the current run, oldest first
    pub samples: RingBuffer<f64>,
    /// Live min/avg/max over `samples`
    pub speed: SpeedStats,
    pub latency: LatencyState,
    /// Set from `Result(Loading)` until the terminal result
    pub is_running: bool,
    pub summary: Option<MeasurementSummary>,
    pub error: Option<ErrorInfo>,
}

impl SessionState {
    pub fn with_capacity(sample_capacity: usize) -> Self {
        Self {
            phase: MeasurementPhase::Idle,
            progress: 0.0,
            phase_label: MeasurementPhase::Idle.label().to_string(),
            samples: RingBuffer::with_capacity(sample_capacity),
            speed: SpeedStats::default(),
            latency: LatencyState::default(),
            is_running: false,
            summary: None,
            error: None,
        }
    }

    /// Update state from a progress event.
    pub fn update_from_event(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Progress(progress) => {
                self.progress = progress.clamp(0.0, 1.0);
            }
            ProgressEvent::PhaseChange(phase) => {
                self.phase = *phase;
            }
            ProgressEvent::PhaseLabel(label) => {
                self.phase_label = label.clone();
            }
            ProgressEvent::InstantSpeed(mbps) => {
                self.samples.push(*mbps);
                self.speed = self.samples.speed_stats();
            }
            ProgressEvent::LatencyProbe { trip_ms, current, total } => {
                if let Some(trip_ms) = trip_ms {
                    self.latency.trips_ms.push(*trip_ms);
                }
                self.latency.current = *current;
                self.latency.total = *total;
            }
            ProgressEvent::Result(RunStatus::Loading) => {
                self.is_running = true;
                self.summary = None;
                self.error = None;
            }
            ProgressEvent::Result(RunStatus::Success(summary)) => {
                self.is_running = false;
                self.summary = Some(summary.clone());
            }
            ProgressEvent::Result(RunStatus::Error(message)) => {
                self.is_running = false;
                self.error =
                    Some(ErrorInfo { message: message.clone(), suggestion: None });
            }
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::with_capacity(crate::samples::SAMPLE_CAPACITY)
    }
}

struct SessionShared {
    state: Mutex<SessionState>,
    generation: AtomicU64,
    sample_capacity: usize,
}

impl SessionShared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn initial_state(&self) -> SessionState {
        SessionState::with_capacity(self.sample_capacity)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }
}

/// Engine callback bound to one run generation.
struct SessionListener {
    shared: Arc<SessionShared>,
    generation: u64,
}

impl ProgressCallback for SessionListener {
    fn on_progress(&self, event: ProgressEvent) {
        let mut state = self.shared.lock();
        // Checked under the state lock so a concurrent reset wins
        if !self.shared.is_current(self.generation) {
            return;
        }
        state.update_from_event(&event);
    }
}

/// Collector between the engine and the front end.
pub struct SpeedTestSession {
    engine: Arc<MeasurementEngine>,
    shared: Arc<SessionShared>,
}

impl SpeedTestSession {
    pub fn new(engine: Arc<MeasurementEngine>) -> Self {
        let sample_capacity = engine.config().sample_capacity;
        let shared = Arc::new(SessionShared {
            state: Mutex::new(SessionState::with_capacity(sample_capacity)),
            generation: AtomicU64::new(0),
            sample_capacity,
        });

        Self { engine, shared }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.shared.lock().clone()
    }

    /// Run one measurement, folding its events into the session state.
    ///
    /// Ignored while a run is active: returns
    /// [`MeasurementError::AlreadyRunning`] and leaves the state untouched.
    pub async fn start_run(
        &self,
    ) -> Result<MeasurementSummary, MeasurementError> {
        let generation = {
            let mut state = self.shared.lock();
            if state.is_running || self.engine.is_running() {
                debug!("Start requested while a run is active, ignoring");
                return Err(MeasurementError::AlreadyRunning);
            }
            *state = self.shared.initial_state();
            state.is_running = true;
            self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1
        };

        let listener = Arc::new(SessionListener {
            shared: Arc::clone(&self.shared),
            generation,
        });
        let outcome = self.engine.run(listener).await;

        if let Err(error) = &outcome {
            let mut state = self.shared.lock();
            if self.shared.is_current(generation) {
                if let Some(info) = state.error.as_mut() {
                    info.suggestion = error.suggestion().map(str::to_string);
                }
            }
        }

        outcome
    }

    /// Discard the summary or error and return to Idle.
    ///
    /// A no-op when the session is already in its initial state. An
    /// in-flight run keeps going; its remaining events are ignored.
    pub fn reset(&self) {
        let mut state = self.shared.lock();
        let initial = self.shared.initial_state();
        if *state == initial {
            return;
        }

        debug!("Resetting session");
        *state = initial;
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
    }
}

use serde::Serialize;
use std::fmt;

/// Stage of a measurement run.
///
/// Only the orchestrator advances the phase, and only along
/// [`MeasurementPhase::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MeasurementPhase {
    Idle,
    Latency,
    Download,
    Upload,
    /// Deriving jitter and packet loss
    Finalizing,
    Complete,
    Failed,
}

/// Slice of the overall progress bar owned by one phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressRange {
    pub start: f64,
    pub end: f64,
}

impl ProgressRange {
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Map a phase-local fraction into the global progress.
    ///
    /// The fraction is clamped to [0, 1] so the result stays in range.
    pub fn map(&self, fraction: f64) -> f64 {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction };
        self.start + (self.end - self.start) * fraction.clamp(0.0, 1.0)
    }
}

/// Error returned for a transition outside the legal sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: MeasurementPhase,
    pub to: MeasurementPhase,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid phase transition {:?} -> {:?}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

impl MeasurementPhase {
    /// Progress slice of the phase; `None` outside the measuring phases.
    pub fn progress_range(self) -> Option<ProgressRange> {
        match self {
            MeasurementPhase::Latency => Some(ProgressRange::new(0.0, 0.10)),
            MeasurementPhase::Download => {
                Some(ProgressRange::new(0.10, 0.70))
            }
            MeasurementPhase::Upload => Some(ProgressRange::new(0.70, 0.95)),
            MeasurementPhase::Finalizing => {
                Some(ProgressRange::new(0.95, 1.0))
            }
            _ => None,
        }
    }

    /// Label shown to the user while the phase runs.
    pub fn label(self) -> &'static str {
        match self {
            MeasurementPhase::Idle => "Ready",
            MeasurementPhase::Latency => "Measuring latency…",
            MeasurementPhase::Download => "Measuring download…",
            MeasurementPhase::Upload => "Measuring upload…",
            MeasurementPhase::Finalizing => "Calculating jitter and loss…",
            MeasurementPhase::Complete => "Measurement complete",
            MeasurementPhase::Failed => "Measurement failed",
        }
    }

    /// Whether a run is in progress.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            MeasurementPhase::Latency
                | MeasurementPhase::Download
                | MeasurementPhase::Upload
                | MeasurementPhase::Finalizing
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MeasurementPhase::Complete | MeasurementPhase::Failed)
    }

    pub fn can_transition_to(self, next: MeasurementPhase) -> bool {
        use MeasurementPhase::*;

        matches!(
            (self, next),
            (Idle, Latency)
                | (Latency, Download)
                | (Download, Upload)
                | (Upload, Finalizing)
                | (Finalizing, Complete)
                // The connectivity gate fails before latency starts
                | (Idle, Failed)
                | (Latency, Failed)
                | (Download, Failed)
                | (Upload, Failed)
                | (Finalizing, Failed)
                | (Complete, Idle)
                | (Failed, Idle)
        )
    }

    /// Move to `next` if the transition is legal.
    pub fn transition(
        self,
        next: MeasurementPhase,
    ) -> Result<MeasurementPhase, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition { from: self, to: next })
        }
    }
}

impl fmt::Display for MeasurementPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL: [MeasurementPhase; 7] = [
        MeasurementPhase::Idle,
        MeasurementPhase::Latency,
        MeasurementPhase::Download,
        MeasurementPhase::Upload,
        MeasurementPhase::Finalizing,
        MeasurementPhase::Complete,
        MeasurementPhase::Failed,
    ];

    #[test]
    fn test_happy_path_is_legal() {
        let mut phase = MeasurementPhase::Idle;
        for next in [
            MeasurementPhase::Latency,
            MeasurementPhase::Download,
            MeasurementPhase::Upload,
            MeasurementPhase::Finalizing,
            MeasurementPhase::Complete,
            MeasurementPhase::Idle,
        ] {
            phase = phase.transition(next).unwrap();
        }
        assert_eq!(phase, MeasurementPhase::Idle);
    }

    #[test]
    fn test_skipping_phases_is_illegal() {
        let error = MeasurementPhase::Idle
            .transition(MeasurementPhase::Upload)
            .unwrap_err();
        assert_eq!(error.from, MeasurementPhase::Idle);
        assert_eq!(error.to, MeasurementPhase::Upload);
        assert!(!MeasurementPhase::Complete
            .can_transition_to(MeasurementPhase::Failed));
    }

    #[test]
    fn test_every_active_phase_can_fail() {
        for phase in ALL.iter().filter(|phase| phase.is_active()) {
            assert!(
                phase.can_transition_to(MeasurementPhase::Failed),
                "{:?} cannot fail",
                phase
            );
        }
    }

    #[test]
    fn test_ranges_are_disjoint_and_ordered() {
        let ranges: Vec<ProgressRange> =
            ALL.iter().filter_map(|phase| phase.progress_range()).collect();
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[0].start, 0.0);
        assert_eq!(ranges[3].end, 1.0);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_map_clamps() {
        let range = MeasurementPhase::Download.progress_range().unwrap();
        assert!((range.map(0.5) - 0.40).abs() < 1e-9);
        assert_eq!(range.map(-1.0), 0.10);
        assert_eq!(range.map(2.0), 0.70);
        assert_eq!(range.map(f64::NAN), 0.10);
    }

    #[test]
    fn test_idle_and_terminal_have_no_range() {
        assert!(MeasurementPhase::Idle.progress_range().is_none());
        assert!(MeasurementPhase::Complete.progress_range().is_none());
        assert!(MeasurementPhase::Failed.progress_range().is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: mapped progress stays within the phase's slice
        #[test]
        fn mapped_progress_stays_in_range(
            index in 0usize..7,
            fraction in -10.0f64..10.0,
        ) {
            if let Some(range) = ALL[index].progress_range() {
                let mapped = range.map(fraction);
                prop_assert!(mapped >= range.start && mapped <= range.end);
                prop_assert!((0.0..=1.0).contains(&mapped));
            }
        }

        /// Property: mapping is monotonic in the fraction
        #[test]
        fn mapping_is_monotonic(
            index in 0usize..7,
            a in 0.0f64..1.0,
            b in 0.0f64..1.0,
        ) {
            if let Some(range) = ALL[index].progress_range() {
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                prop_assert!(range.map(lo) <= range.map(hi));
            }
        }

        /// Property: only active phases can fail, and terminal phases only
        /// lead back to Idle
        #[test]
        fn terminal_phases_only_reset(from in 0usize..7, to in 0usize..7) {
            let (from, to) = (ALL[from], ALL[to]);
            if from.is_terminal() && from.can_transition_to(to) {
                prop_assert_eq!(to, MeasurementPhase::Idle);
            }
            if to == MeasurementPhase::Failed && from.can_transition_to(to) {
                prop_assert!(from.is_active() || from == MeasurementPhase::Idle);
            }
        }
    }
}

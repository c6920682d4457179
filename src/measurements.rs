//! Unit conversions and derived metrics.

use crate::stats::mean_f64;
use std::time::Duration;

/// Upper bound of the derived jitter in milliseconds.
pub const MAX_DERIVED_JITTER_MS: f64 = 10.0;

/// Convert a byte count transferred over `elapsed` to megabits per second.
///
/// Returns 0.0 when `elapsed` is zero.
pub fn megabits_per_second(bytes: u64, elapsed: Duration) -> f64 {
    let seconds = elapsed.as_secs_f64();
    if seconds <= 0.0 {
        return 0.0;
    }

    bytes as f64 * 8.0 / 1_000_000.0 / seconds
}

/// Aggregate rate of a phase: all bytes over the whole time budget.
///
/// Deliberately not the mean of the window samples, so a slow start or a
/// short burst of fast windows does not skew the result.
pub fn aggregate_rate_mbps(total_bytes: u64, budget: Duration) -> f64 {
    megabits_per_second(total_bytes, budget)
}

/// Ping in whole milliseconds from the successful trip times.
///
/// `None` when no trip succeeded.
pub fn ping_from_trips(trips_ms: &[f64]) -> Option<i32> {
    mean_f64(trips_ms).map(|mean| mean.round() as i32)
}

/// Jitter derived from the ping: 10% of it, capped at 10 ms.
///
/// This is a proxy, not inter-packet variance. The measured variance of
/// the probes is reported separately as the probe jitter.
pub fn derived_jitter_ms(ping_ms: i32) -> f64 {
    (ping_ms as f64 * 0.1).min(MAX_DERIVED_JITTER_MS)
}

/// Share of sequenced probes that failed or timed out, in percent.
pub fn probe_loss_pct(sent: usize, lost: usize) -> f64 {
    if sent == 0 {
        return 0.0;
    }

    lost.min(sent) as f64 / sent as f64 * 100.0
}

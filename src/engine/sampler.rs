//! Time-boxed throughput sampling.
//!
//! A sampler run drives one or more byte streams for a fixed wall-clock
//! budget. Transfer tasks only ever add to a shared atomic counter; an
//! independent sampling task turns counter deltas into instantaneous rates
//! every window, and a progress task reports elapsed time. The aggregate
//! rate is computed from the total bytes over the whole budget.

use super::config::ThroughputConfig;
use crate::errors::TransportError;
use crate::measurements::{aggregate_rate_mbps, megabits_per_second};
use crate::transport::{Transport, UploadBody};
use futures::{future, stream, StreamExt};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{interval, interval_at, sleep_until, timeout_at, Instant};
use tokio::time::MissedTickBehavior;
use url::Url;

/// Direction of a throughput phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Download,
    Upload,
}

/// Receives the per-window output of a sampler run.
///
/// Both methods are called from the sampler's own tasks and must not block.
pub trait SampleObserver: Send + Sync {
    /// Rate of the window that just closed, in Mbps.
    fn on_instant(&self, mbps: f64);

    /// Elapsed share of the budget, in [0, 1].
    fn on_progress(&self, fraction: f64);
}

/// Result of one sampler run.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleOutcome {
    /// Bytes moved inside the budget by the window that produced the rate.
    pub total_bytes: u64,
    /// `total_bytes` over the full budget, in Mbps.
    pub rate_mbps: f64,
    /// Most recent transport failure, kept for diagnostics when the rate
    /// comes out as zero.
    pub last_error: Option<TransportError>,
    /// Whether the upload had to move to the fallback endpoint.
    pub used_fallback: bool,
}

/// Byte count at the opening of the current sampling window.
struct SampleWindow {
    bytes_at_start: u64,
    started: Instant,
}

impl SampleWindow {
    fn open(bytes: u64, now: Instant) -> Self {
        Self { bytes_at_start: bytes, started: now }
    }

    /// Close the window at `now`, returning its rate and opening the next.
    fn close(&mut self, bytes: u64, now: Instant) -> f64 {
        let delta = bytes.saturating_sub(self.bytes_at_start);
        let mbps = megabits_per_second(delta, now - self.started);
        *self = SampleWindow::open(bytes, now);
        mbps
    }
}

/// Bytes and failures of one timed window.
struct WindowResult {
    total_bytes: u64,
    last_error: Option<TransportError>,
    /// Set when a transfer failed before the budget ran out and the window
    /// was configured to stop on the first failure.
    aborted_by: Option<TransportError>,
}

pub struct ThroughputSampler {
    transport: Arc<dyn Transport>,
    window: Duration,
    upload_chunk_bytes: usize,
}

impl ThroughputSampler {
    pub fn new(
        transport: Arc<dyn Transport>,
        window: Duration,
        upload_chunk_bytes: usize,
    ) -> Self {
        Self {
            transport,
            window: window.max(Duration::from_millis(1)),
            upload_chunk_bytes: upload_chunk_bytes.max(1),
        }
    }

    /// Run one throughput phase.
    ///
    /// Downloads spread `budget.parallelism` streams over `sources`
    /// round-robin. Uploads use a single stream to `sources[0]` and fall
    /// back once to `sources[1]` if the first target fails before the
    /// budget expires; the fallback gets a fresh budget and counter.
    pub async fn sample(
        &self,
        direction: Direction,
        budget: &ThroughputConfig,
        sources: &[Url],
        observer: Arc<dyn SampleObserver>,
    ) -> SampleOutcome {
        info!(
            "Sampling {:?} for {:?} over {} stream(s)",
            direction, budget.duration, budget.parallelism
        );

        let outcome = match direction {
            Direction::Download => {
                self.sample_download(budget, sources, &observer).await
            }
            Direction::Upload => {
                self.sample_upload(budget, sources, &observer).await
            }
        };

        info!(
            "{:?} finished: {} bytes, {:.2} Mbps",
            direction, outcome.total_bytes, outcome.rate_mbps
        );

        outcome
    }

    async fn sample_download(
        &self,
        budget: &ThroughputConfig,
        sources: &[Url],
        observer: &Arc<dyn SampleObserver>,
    ) -> SampleOutcome {
        if sources.is_empty() {
            return SampleOutcome {
                total_bytes: 0,
                rate_mbps: 0.0,
                last_error: Some(TransportError::connect(
                    "no download sources configured",
                )),
                used_fallback: false,
            };
        }

        let parallelism = budget.parallelism.max(1);
        let result = self
            .timed_window(budget.duration, observer, false, |counter, end_at| {
                let mut transfers = JoinSet::new();
                for index in 0..parallelism {
                    let url = sources[index % sources.len()].clone();
                    transfers.spawn(pull_source(
                        Arc::clone(&self.transport),
                        url,
                        Arc::clone(&counter),
                        end_at,
                    ));
                }
                transfers
            })
            .await;

        SampleOutcome {
            total_bytes: result.total_bytes,
            rate_mbps: aggregate_rate_mbps(result.total_bytes, budget.duration),
            last_error: result.last_error,
            used_fallback: false,
        }
    }

    async fn sample_upload(
        &self,
        budget: &ThroughputConfig,
        sources: &[Url],
        observer: &Arc<dyn SampleObserver>,
    ) -> SampleOutcome {
        let Some(primary) = sources.first() else {
            return SampleOutcome {
                total_bytes: 0,
                rate_mbps: 0.0,
                last_error: Some(TransportError::connect(
                    "no upload target configured",
                )),
                used_fallback: false,
            };
        };

        let mut result = self.upload_window(primary, budget, observer).await;
        let mut used_fallback = false;

        if let Some(error) = result.aborted_by.take() {
            match sources.get(1) {
                Some(fallback) => {
                    warn!(
                        "Upload to {} failed: {}. Retrying once against {}",
                        primary, error, fallback
                    );
                    used_fallback = true;
                    result =
                        self.upload_window(fallback, budget, observer).await;
                }
                None => {
                    warn!("Upload to {} failed: {}", primary, error);
                    result.total_bytes = 0;
                }
            }
        }

        // A window that still failed early is not a measurement
        if result.aborted_by.is_some() {
            result.total_bytes = 0;
        }

        SampleOutcome {
            total_bytes: result.total_bytes,
            rate_mbps: aggregate_rate_mbps(result.total_bytes, budget.duration),
            last_error: result.last_error,
            used_fallback,
        }
    }

    async fn upload_window(
        &self,
        target: &Url,
        budget: &ThroughputConfig,
        observer: &Arc<dyn SampleObserver>,
    ) -> WindowResult {
        let chunk_bytes = self.upload_chunk_bytes;

        self.timed_window(budget.duration, observer, true, |counter, end_at| {
            let mut transfers = JoinSet::new();
            transfers.spawn(push_filler(
                Arc::clone(&self.transport),
                target.clone(),
                counter,
                end_at,
                chunk_bytes,
            ));
            transfers
        })
        .await
    }

    /// Run the transfers built by `launch` until `duration` has elapsed.
    ///
    /// The counter is created before any task starts and only read after
    /// the transfers are launched. All spawned tasks are joined or aborted
    /// before this returns, or when the returned future is dropped.
    async fn timed_window<F>(
        &self,
        duration: Duration,
        observer: &Arc<dyn SampleObserver>,
        stop_on_error: bool,
        launch: F,
    ) -> WindowResult
    where
        F: FnOnce(
            Arc<AtomicU64>,
            Instant,
        ) -> JoinSet<Result<(), TransportError>>,
    {
        let counter = Arc::new(AtomicU64::new(0));
        let start = Instant::now();
        let end_at = start + duration;

        let mut transfers = launch(Arc::clone(&counter), end_at);

        // Dropping the window aborts the reporters along with the transfers
        let mut reporters = JoinSet::new();
        reporters.spawn(sampling_loop(
            Arc::clone(&counter),
            start,
            end_at,
            self.window,
            Arc::clone(observer),
        ));
        reporters.spawn(progress_loop(
            start,
            end_at,
            self.window,
            Arc::clone(observer),
        ));

        let mut last_error = None;
        let mut aborted_by = None;
        let deadline = sleep_until(end_at);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                joined = transfers.join_next(), if !transfers.is_empty() => {
                    match joined {
                        Some(Ok(Ok(()))) => {}
                        Some(Ok(Err(error))) => {
                            warn!("Transfer stream failed: {}", error);
                            if stop_on_error {
                                aborted_by = Some(error.clone());
                                last_error = Some(error);
                                break;
                            }
                            last_error = Some(error);
                        }
                        Some(Err(join_error)) => {
                            warn!("Transfer task ended abnormally: {}", join_error);
                        }
                        None => {}
                    }
                }
            }
        }

        // Cooperative cancellation: in-flight reads are dropped unaccounted
        transfers.abort_all();
        while transfers.join_next().await.is_some() {}

        if aborted_by.is_some() {
            reporters.abort_all();
        }
        while reporters.join_next().await.is_some() {}

        WindowResult {
            total_bytes: counter.load(Ordering::Acquire),
            last_error,
            aborted_by,
        }
    }
}

/// Read one download source into `counter` until it ends or `end_at`.
async fn pull_source(
    transport: Arc<dyn Transport>,
    url: Url,
    counter: Arc<AtomicU64>,
    end_at: Instant,
) -> Result<(), TransportError> {
    let mut chunks = match timeout_at(end_at, transport.download(&url)).await {
        Ok(opened) => opened?,
        Err(_) => {
            debug!("Budget expired while connecting to {}", url);
            return Ok(());
        }
    };

    loop {
        match timeout_at(end_at, chunks.next()).await {
            Ok(Some(Ok(len))) => {
                counter.fetch_add(len as u64, Ordering::AcqRel);
            }
            Ok(Some(Err(error))) => return Err(error),
            Ok(None) => {
                debug!("Source {} exhausted before the budget", url);
                return Ok(());
            }
            Err(_) => return Ok(()),
        }
    }
}

/// Stream synthetic filler to `url` until `end_at`.
async fn push_filler(
    transport: Arc<dyn Transport>,
    url: Url,
    counter: Arc<AtomicU64>,
    end_at: Instant,
    chunk_bytes: usize,
) -> Result<(), TransportError> {
    let body = filler_body(counter, end_at, chunk_bytes);

    match timeout_at(end_at, transport.upload(&url, body)).await {
        Ok(result) => result,
        Err(_) => Ok(()),
    }
}

/// Zero-filled chunks, counted as they are handed to the transport.
fn filler_body(
    counter: Arc<AtomicU64>,
    end_at: Instant,
    chunk_bytes: usize,
) -> UploadBody {
    let chunk = vec![0u8; chunk_bytes];

    stream::repeat_with(move || chunk.clone())
        .take_while(move |_| future::ready(Instant::now() < end_at))
        .inspect(move |chunk| {
            counter.fetch_add(chunk.len() as u64, Ordering::AcqRel);
        })
        .map(Ok::<_, std::io::Error>)
        .boxed()
}

async fn sampling_loop(
    counter: Arc<AtomicU64>,
    start: Instant,
    end_at: Instant,
    window: Duration,
    observer: Arc<dyn SampleObserver>,
) {
    let mut ticker = interval_at(start + window, window);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut current = SampleWindow::open(0, start);

    while timeout_at(end_at, ticker.tick()).await.is_ok() {
        let now = Instant::now();
        let mbps = current.close(counter.load(Ordering::Acquire), now);
        debug!("Window closed at {:?}: {:.2} Mbps", now - start, mbps);
        observer.on_instant(mbps);
    }
}

async fn progress_loop(
    start: Instant,
    end_at: Instant,
    window: Duration,
    observer: Arc<dyn SampleObserver>,
) {
    let total = (end_at - start).as_secs_f64();
    let mut ticker = interval(window);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    if total > 0.0 {
        while timeout_at(end_at, ticker.tick()).await.is_ok() {
            let elapsed = (Instant::now() - start).as_secs_f64();
            observer.on_progress((elapsed / total).clamp(0.0, 1.0));
        }
    }

    observer.on_progress(1.0);
}

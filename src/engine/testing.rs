//! Scripted transport and recording observers for engine tests.

use super::progress::{ProgressCallback, ProgressEvent};
use super::sampler::SampleObserver;
use crate::errors::{TransportError, TransportErrorKind};
use crate::transport::{ChunkStream, NetworkType, Transport, UploadBody};
use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;
use url::Url;

pub fn url(raw: &str) -> Url {
    Url::parse(raw).unwrap()
}

#[derive(Debug, Clone)]
pub enum DownloadScript {
    /// Opening the stream fails with this message.
    Fail(String),
    /// `count` chunks of `size` bytes, one every `interval`.
    Chunks { size: usize, count: usize, interval: Duration },
}

impl DownloadScript {
    pub fn chunks(size: usize, count: usize, interval: Duration) -> Self {
        DownloadScript::Chunks { size, count, interval }
    }
}

#[derive(Debug, Clone)]
pub enum UploadScript {
    FailConnect,
    /// Pull the body, taking `per_chunk` for each chunk.
    Accept { per_chunk: Duration },
    /// Accept `chunks` chunks like `Accept`, then reset the connection.
    FailAfter { chunks: usize, per_chunk: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Probe,
    Download,
    Upload,
}

pub struct ScriptedTransport {
    network: Option<NetworkType>,
    /// Trip time per probe in call order; `None` fails the probe.
    probes: Mutex<VecDeque<Option<Duration>>>,
    downloads: HashMap<String, DownloadScript>,
    uploads: HashMap<String, UploadScript>,
    calls: Mutex<Vec<(CallKind, String)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            network: Some(NetworkType::WiFi),
            probes: Mutex::new(VecDeque::new()),
            downloads: HashMap::new(),
            uploads: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_network(mut self, network: Option<NetworkType>) -> Self {
        self.network = network;
        self
    }

    pub fn with_probes(self, probes: Vec<Option<Duration>>) -> Self {
        *self.probes.lock().unwrap() = probes.into();
        self
    }

    pub fn with_download(mut self, url: &Url, script: DownloadScript) -> Self {
        self.downloads.insert(url.to_string(), script);
        self
    }

    pub fn with_upload(mut self, url: &Url, script: UploadScript) -> Self {
        self.uploads.insert(url.to_string(), script);
        self
    }

    fn record(&self, kind: CallKind, url: &Url) {
        self.calls.lock().unwrap().push((kind, url.to_string()));
    }

    fn count(&self, kind: CallKind) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(recorded, _)| *recorded == kind)
            .count()
    }

    pub fn probe_calls(&self) -> usize {
        self.count(CallKind::Probe)
    }

    pub fn download_calls(&self) -> usize {
        self.count(CallKind::Download)
    }

    pub fn upload_calls(&self) -> usize {
        self.count(CallKind::Upload)
    }

    pub fn calls_to(&self, url: &Url) -> usize {
        let url = url.to_string();
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, recorded)| *recorded == url)
            .count()
    }
}

impl Transport for ScriptedTransport {
    fn active_network(&self) -> Option<NetworkType> {
        self.network
    }

    fn probe<'a>(
        &'a self,
        url: &'a Url,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        self.record(CallKind::Probe, url);
        let next = self.probes.lock().unwrap().pop_front().flatten();

        async move {
            match next {
                Some(trip) => {
                    sleep(trip).await;
                    Ok(())
                }
                None => Err(TransportError::connect("probe refused")),
            }
        }
        .boxed()
    }

    fn download<'a>(
        &'a self,
        url: &'a Url,
    ) -> BoxFuture<'a, Result<ChunkStream, TransportError>> {
        self.record(CallKind::Download, url);
        let script = self.downloads.get(url.as_str()).cloned();

        async move {
            match script {
                Some(DownloadScript::Chunks { size, count, interval }) => {
                    let chunks = stream::unfold(0usize, move |sent| async move {
                        if sent >= count {
                            return None;
                        }
                        sleep(interval).await;
                        Some((Ok(size), sent + 1))
                    });
                    Ok(chunks.boxed())
                }
                Some(DownloadScript::Fail(message)) => {
                    Err(TransportError::connect(message))
                }
                None => Err(TransportError::connect("no route to host")),
            }
        }
        .boxed()
    }

    fn upload<'a>(
        &'a self,
        url: &'a Url,
        mut body: UploadBody,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        self.record(CallKind::Upload, url);
        let script = self.uploads.get(url.as_str()).cloned();

        async move {
            match script {
                Some(UploadScript::Accept { per_chunk }) => {
                    while let Some(chunk) = body.next().await {
                        chunk.map_err(|error| {
                            TransportError::connect(error.to_string())
                        })?;
                        sleep(per_chunk).await;
                    }
                    Ok(())
                }
                Some(UploadScript::FailAfter { chunks, per_chunk }) => {
                    for _ in 0..chunks {
                        if body.next().await.is_none() {
                            return Ok(());
                        }
                        sleep(per_chunk).await;
                    }
                    Err(TransportError::new(
                        TransportErrorKind::Body,
                        "connection reset by peer",
                    ))
                }
                Some(UploadScript::FailConnect) | None => {
                    Err(TransportError::connect("connection refused"))
                }
            }
        }
        .boxed()
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    instants: Mutex<Vec<f64>>,
    progress: Mutex<Vec<f64>>,
}

impl RecordingObserver {
    pub fn instants(&self) -> Vec<f64> {
        self.instants.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<f64> {
        self.progress.lock().unwrap().clone()
    }
}

impl SampleObserver for RecordingObserver {
    fn on_instant(&self, mbps: f64) {
        self.instants.lock().unwrap().push(mbps);
    }

    fn on_progress(&self, fraction: f64) {
        self.progress.lock().unwrap().push(fraction);
    }
}

#[derive(Default)]
pub struct RecordingCallback {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingCallback {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress_values(&self) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::Progress(value) => Some(value),
                _ => None,
            })
            .collect()
    }
}

impl ProgressCallback for RecordingCallback {
    fn on_progress(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

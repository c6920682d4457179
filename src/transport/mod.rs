//! HTTP boundary of the measurement engine.
//!
//! The engine only talks to the network through [`Transport`], so phases
//! can be exercised against scripted transports in tests. [`HttpTransport`]
//! is the production implementation on top of one shared `reqwest` pool.

use crate::errors::TransportError;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use std::time::Duration;
use url::Url;

pub(crate) mod client;
pub mod netinfo;

pub use client::HttpTransport;
pub use netinfo::NetworkType;

/// Sizes of the body chunks of a download, in arrival order.
pub type ChunkStream = BoxStream<'static, Result<usize, TransportError>>;

/// Request body of an upload, pulled by the transport as it sends.
pub type UploadBody = BoxStream<'static, Result<Vec<u8>, std::io::Error>>;

pub trait Transport: Send + Sync {
    /// The active network, or `None` when the device is offline.
    fn active_network(&self) -> Option<NetworkType>;

    /// One low-payload round trip. Resolves once the response is complete.
    fn probe<'a>(
        &'a self,
        url: &'a Url,
    ) -> BoxFuture<'a, Result<(), TransportError>>;

    /// Open a streamed GET and hand back its body as chunk sizes.
    fn download<'a>(
        &'a self,
        url: &'a Url,
    ) -> BoxFuture<'a, Result<ChunkStream, TransportError>>;

    /// POST `body` as a streamed request body.
    fn upload<'a>(
        &'a self,
        url: &'a Url,
        body: UploadBody,
    ) -> BoxFuture<'a, Result<(), TransportError>>;
}

/// Timeouts of the shared HTTP client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Default: 10s
    pub connect_timeout: Duration,
    /// Maximum idle time between two reads.
    /// Default: 30s
    pub read_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
        }
    }
}

use crate::errors::TransportError;
use crate::transport::netinfo::{detect_active_network, NetworkType};
use crate::transport::{
    ChunkStream, Transport, TransportConfig, UploadBody,
};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt, TryStreamExt};
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Body, Client as ReqwestClient};
use url::Url;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// [`Transport`] over a single process-wide `reqwest` connection pool.
///
/// Cloning is cheap and shares the pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let client = ReqwestClient::builder()
            .user_agent(format!("{}/{}", NAME, VERSION))
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()?;

        Ok(HttpTransport { client })
    }
}

fn no_cache_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers
}

impl Transport for HttpTransport {
    fn active_network(&self) -> Option<NetworkType> {
        detect_active_network()
    }

    fn probe<'a>(
        &'a self,
        url: &'a Url,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        async move {
            let response = self
                .client
                .get(url.clone())
                .headers(no_cache_headers())
                .send()
                .await?
                .error_for_status()?;

            // Drain the body so the trip covers the whole response
            let _ = response.bytes().await?;
            Ok(())
        }
        .boxed()
    }

    fn download<'a>(
        &'a self,
        url: &'a Url,
    ) -> BoxFuture<'a, Result<ChunkStream, TransportError>> {
        async move {
            let response = self
                .client
                .get(url.clone())
                .headers(no_cache_headers())
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(TransportError::status(response.status()));
            }

            debug!(
                "Download from {} opened, content length {:?}",
                url,
                response.content_length()
            );

            let chunks = response
                .bytes_stream()
                .map_ok(|chunk| chunk.len())
                .map_err(TransportError::from)
                .boxed();

            Ok(chunks)
        }
        .boxed()
    }

    fn upload<'a>(
        &'a self,
        url: &'a Url,
        body: UploadBody,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        async move {
            let response = self
                .client
                .post(url.clone())
                .header(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/octet-stream"),
                )
                .body(Body::wrap_stream(body))
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(TransportError::status(response.status()));
            }

            let _ = response.bytes().await?;
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transport() {
        let transport = HttpTransport::new(&TransportConfig::default());
        assert!(transport.is_ok());
    }
}

use crate::samples::SAMPLE_CAPACITY;
use crate::transport::TransportConfig;
use std::time::Duration;
use url::Url;

fn endpoint(raw: &str) -> Url {
    Url::parse(raw).expect("built-in endpoint URLs are valid")
}

/// Public endpoints the engine measures against.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Large-file sources, assigned to download streams round-robin.
    /// Several vendors so one unreachable host does not sink the phase.
    pub download_sources: Vec<Url>,
    /// First upload target.
    pub upload_primary: Url,
    /// Upload target tried once if the primary fails.
    pub upload_fallback: Url,
    /// Low-payload endpoint for latency probes.
    pub latency_probe: Url,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            download_sources: vec![
                endpoint("https://speed.cloudflare.com/__down?bytes=10485760"),
                endpoint("https://speed.hetzner.de/10MB.bin"),
                endpoint("https://download.thinkbroadband.com/10MB.zip"),
            ],
            upload_primary: endpoint("https://speed.cloudflare.com/__up"),
            upload_fallback: endpoint("https://httpbin.org/post"),
            latency_probe: endpoint("https://httpbin.org/status/200"),
        }
    }
}

/// Latency phase parameters.
#[derive(Debug, Clone)]
pub struct LatencyConfig {
    /// Number of sequential probes.
    /// Default: 5
    pub probes: usize,
    /// Pause before each probe.
    /// Default: 100ms
    pub gap: Duration,
    /// A probe still pending after this long counts as lost.
    /// Default: 2s
    pub probe_timeout: Duration,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            probes: 5,
            gap: Duration::from_millis(100),
            probe_timeout: Duration::from_secs(2),
        }
    }
}

/// Budget of a throughput phase.
#[derive(Debug, Clone)]
pub struct ThroughputConfig {
    /// Fixed wall-clock budget of the phase.
    pub duration: Duration,
    /// Number of concurrent streams. Uploads always use one.
    pub parallelism: usize,
}

/// Configuration for the measurement engine.
///
/// These are the baseline constants of a run. They are not exposed on the
/// command line; tests shorten them.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub endpoints: Endpoints,

    pub latency: LatencyConfig,

    /// Default: 4500ms over 2 streams
    pub download: ThroughputConfig,

    /// Default: 2500ms over 1 stream
    pub upload: ThroughputConfig,

    /// Length of one instantaneous-rate window.
    /// Default: 200ms
    pub window: Duration,

    /// Size of each synthetic upload chunk in bytes.
    /// Default: 64KiB
    pub upload_chunk_bytes: usize,

    /// Capacity of the instantaneous-sample ring buffer.
    /// Default: 120
    pub sample_capacity: usize,

    pub transport: TransportConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            latency: LatencyConfig::default(),
            download: ThroughputConfig {
                duration: Duration::from_millis(4500),
                parallelism: 2,
            },
            upload: ThroughputConfig {
                duration: Duration::from_millis(2500),
                parallelism: 1,
            },
            window: Duration::from_millis(200),
            upload_chunk_bytes: 64 * 1024,
            sample_capacity: SAMPLE_CAPACITY,
            transport: TransportConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.latency.probes, 5);
        assert_eq!(config.latency.gap, Duration::from_millis(100));
        assert_eq!(config.download.duration, Duration::from_millis(4500));
        assert_eq!(config.download.parallelism, 2);
        assert_eq!(config.upload.duration, Duration::from_millis(2500));
        assert_eq!(config.upload.parallelism, 1);
        assert_eq!(config.window, Duration::from_millis(200));
        assert_eq!(config.sample_capacity, 120);
    }

    #[test]
    fn test_default_endpoints() {
        let endpoints = Endpoints::default();
        assert_eq!(endpoints.download_sources.len(), 3);
        assert!(endpoints
            .download_sources
            .iter()
            .all(|url| url.scheme() == "https"));
        assert_ne!(endpoints.upload_primary, endpoints.upload_fallback);
    }
}

//! HTTP client for listings, metadata and archive transfers.

use bytes::Bytes;
use futures::StreamExt;
use klinevault_types::{KlineVaultError, PARTIAL_SUFFIX, PipelineConfig, with_suffix};
use reqwest::{Client, Proxy, StatusCode};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Configuration for the HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum idle connections kept per host.
    pub concurrency: usize,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for transient failures of a single request.
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds).
    pub max_delay_ms: u64,
    /// User agent string.
    pub user_agent: String,
    /// Optional proxy applied to every request.
    pub proxy: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            concurrency: 20,
            timeout: Duration::from_secs(60),
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            user_agent: format!("klinevault/{}", env!("CARGO_PKG_VERSION")),
            proxy: None,
        }
    }
}

impl From<&PipelineConfig> for ClientConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            concurrency: config.transfer_concurrency,
            timeout: config.request_timeout(),
            proxy: config.proxy.clone(),
            ..Self::default()
        }
    }
}

/// Errors that can occur during HTTP requests.
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error status.
    #[error("Server error: {status} for {url}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// Object does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Writing the response body to disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FetchError> for KlineVaultError {
    fn from(e: FetchError) -> Self {
        Self::RemoteUnavailable(e.to_string())
    }
}

/// HTTP client with connection pooling, proxy support and retry logic.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: ClientConfig,
}

impl HttpClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy URL is invalid or the client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(config.concurrency)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&config.user_agent)
            .gzip(true);
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(Proxy::all(proxy)?);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    /// Creates a client from the pipeline configuration.
    ///
    /// # Errors
    ///
    /// Returns [`KlineVaultError::Config`] for an unusable proxy setting.
    pub fn from_pipeline(config: &PipelineConfig) -> klinevault_types::Result<Self> {
        Self::new(ClientConfig::from(config))
            .map_err(|e| KlineVaultError::Config(format!("cannot build HTTP client: {e}")))
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetches a URL as text. Returns `Ok(None)` on 404.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after all retries.
    pub async fn get_text(&self, url: &str) -> Result<Option<String>, FetchError> {
        match self.send(url).await? {
            Some(response) => Ok(Some(response.text().await?)),
            None => Ok(None),
        }
    }

    /// Fetches a URL as bytes. Returns `Ok(None)` on 404.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after all retries.
    pub async fn get_bytes(&self, url: &str) -> Result<Option<Bytes>, FetchError> {
        match self.send(url).await? {
            Some(response) => Ok(Some(response.bytes().await?)),
            None => Ok(None),
        }
    }

    /// Streams a URL into `destination`.
    ///
    /// The body is written to `<destination>.part` and renamed once complete,
    /// so an existing destination is never truncated by a failed attempt.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::NotFound`] on 404, or the transport / I/O error.
    pub async fn download_to(&self, url: &str, destination: &Path) -> Result<u64, FetchError> {
        let response = self
            .send(url)
            .await?
            .ok_or_else(|| FetchError::NotFound(url.to_string()))?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = with_suffix(destination, PARTIAL_SUFFIX);
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut written = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&partial, destination).await?;
        debug!(
            event_type = "transfer_complete",
            url = url,
            bytes = written,
            "Transfer complete"
        );
        Ok(written)
    }

    /// Sends a GET request, retrying transient failures with backoff.
    async fn send(&self, url: &str) -> Result<Option<reqwest::Response>, FetchError> {
        let mut attempts = 0;

        loop {
            match self.client.get(url).send().await {
                Ok(response) => {
                    if response.status() == StatusCode::NOT_FOUND {
                        return Ok(None);
                    }

                    if response.status().is_server_error()
                        || response.status() == StatusCode::TOO_MANY_REQUESTS
                    {
                        if attempts < self.config.max_retries {
                            attempts += 1;
                            warn!(
                                event_type = "http_retry",
                                url = url,
                                http_status = response.status().as_u16(),
                                attempt = attempts,
                                "Retrying request"
                            );
                            tokio::time::sleep(self.calculate_backoff_delay(attempts)).await;
                            continue;
                        }
                        return Err(FetchError::ServerError {
                            status: response.status().as_u16(),
                            url: url.to_string(),
                        });
                    }

                    if !response.status().is_success() {
                        return Err(FetchError::ServerError {
                            status: response.status().as_u16(),
                            url: url.to_string(),
                        });
                    }
                    return Ok(Some(response));
                }
                Err(e) if Self::is_retryable_error(&e) && attempts < self.config.max_retries => {
                    attempts += 1;
                    warn!(
                        event_type = "http_retry",
                        url = url,
                        error = %e,
                        attempt = attempts,
                        "Retrying request"
                    );
                    tokio::time::sleep(self.calculate_backoff_delay(attempts)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Calculates the backoff delay with exponential backoff and jitter.
    fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        let exp_delay = self
            .config
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(10));
        let capped_delay = exp_delay.min(self.config.max_delay_ms);

        // Deterministic ±25% jitter
        let jitter_range = capped_delay / 4;
        let jitter = if jitter_range > 0 {
            let jitter_offset = (u64::from(attempt) * 17) % (jitter_range * 2);
            jitter_offset as i64 - jitter_range as i64
        } else {
            0
        };

        Duration::from_millis((capped_delay as i64 + jitter).max(100) as u64)
    }

    fn is_retryable_error(error: &reqwest::Error) -> bool {
        if error.is_builder() {
            return false;
        }
        error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_from_pipeline() {
        let pipeline = PipelineConfig {
            transfer_concurrency: 7,
            request_timeout_secs: 15,
            proxy: Some("http://127.0.0.1:7890".to_string()),
            ..PipelineConfig::default()
        };
        let config = ClientConfig::from(&pipeline);
        assert_eq!(config.concurrency, 7);
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.proxy.as_deref(), Some("http://127.0.0.1:7890"));
        assert_eq!(config.max_retries, 3);
    }

    #[tokio::test]
    async fn test_client_creation_with_proxy() {
        let config = ClientConfig {
            proxy: Some("http://127.0.0.1:7890".to_string()),
            ..ClientConfig::default()
        };
        assert!(HttpClient::new(config).is_ok());
    }

    #[test]
    fn test_backoff_delay_calculation() {
        let client = HttpClient::new(ClientConfig::default()).unwrap();

        let delay1 = client.calculate_backoff_delay(1);
        assert!(delay1.as_millis() >= 750 && delay1.as_millis() <= 1250);

        let delay2 = client.calculate_backoff_delay(2);
        assert!(delay2.as_millis() >= 1500 && delay2.as_millis() <= 2500);

        let delay_high = client.calculate_backoff_delay(20);
        assert!(delay_high.as_millis() <= 37_500);
    }

    #[test]
    fn test_fetch_error_maps_to_remote_unavailable() {
        let err: KlineVaultError = FetchError::NotFound("https://x/y".into()).into();
        assert!(matches!(err, KlineVaultError::RemoteUnavailable(_)));
    }
}

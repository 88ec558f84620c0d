use async_trait::async_trait;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::Blob;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("server returned HTTP {0}")]
    Status(u16),
    #[error("reading body failed: {0}")]
    Body(String),
}

/// Buffered GET of a signed URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Blob, FetchError>;
}

/// `reqwest`-backed fetcher. Accepts any content type and bypasses caches.
///
/// No timeout is applied unless one is configured; a stalled server holds
/// the cascade until the connection drops.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Blob, FetchError> {
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, "*/*")
            .header(CACHE_CONTROL, "no-store")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;

        debug!("Fetched {} bytes ({:?})", bytes.len(), content_type);
        Ok(Blob::new(bytes.to_vec(), content_type))
    }
}

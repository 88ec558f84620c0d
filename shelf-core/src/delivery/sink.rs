use async_trait::async_trait;
use thiserror::Error;

use super::Blob;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transfer failed: {0}")]
    Transfer(String),
    #[error("could not open {url}: {reason}")]
    Open { url: String, reason: String },
}

/// Where delivered files land.
///
/// Each method is the native counterpart of one browser mechanism: saving
/// an in-memory blob, following a download link, and navigating the whole
/// window to the URL.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Save buffered bytes under `filename`.
    async fn save_blob(&self, blob: Blob, filename: &str) -> Result<(), SinkError>;

    /// Drop whatever transient resource `save_blob` kept for `filename`.
    /// Called some time after the save, never inline with it.
    async fn release_transient(&self, filename: &str);

    /// Hand `url` to a direct transfer that saves under `filename`.
    async fn navigate_via_anchor(&self, url: &str, filename: &str) -> Result<(), SinkError>;

    /// Last resort: open `url` with no control over the saved name.
    async fn navigate_window(&self, url: &str) -> Result<(), SinkError>;
}

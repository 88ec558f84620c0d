//! Signed-URL issuance.
//!
//! The only storage operation the download path needs: turn a stored object
//! name into a short-lived retrieval link. Backends live in `s3` and in
//! `crate::hosted`.

pub mod s3;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use s3::S3Storage;

/// Bucket holding product files.
pub const PRODUCT_FILES_BUCKET: &str = "product-files";

/// Validity window for signed download links.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

/// Variants carry the backend's own message, shown to users as-is.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A time-limited retrieval link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub url: String,
    pub expires_in: Duration,
}

/// Issues signed retrieval links for stored objects.
#[async_trait]
pub trait SignedUrlIssuer: Send + Sync {
    async fn issue_signed_download_url(
        &self,
        bucket: &str,
        object_name: &str,
        ttl: Duration,
    ) -> Result<SignedUrl, StorageError>;
}

//! Delivery of a product's file to the user.
//!
//! `DeliveryOrchestrator` obtains a fresh signed link, derives the save
//! name, then walks an ordered cascade of `DeliveryStrategy` values until
//! one of them completes. Side effects on the user's machine go through an
//! injected `DeliverySink`.

mod disk;
mod fetch;
mod orchestrator;
mod sink;
mod strategy;

pub use disk::DiskSink;
pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use orchestrator::DeliveryOrchestrator;
pub use sink::{DeliverySink, SinkError};
pub use strategy::{
    default_cascade, AnchorNavigation, BufferedSave, DeliveryStrategy, StrategyError,
    WindowNavigation, TRANSIENT_RELEASE_DELAY,
};

use thiserror::Error;

/// Content type given to buffered downloads before saving.
pub const GENERIC_BINARY: &str = "application/octet-stream";

/// Opaque downloaded bytes with a content type tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    data: Vec<u8>,
    content_type: Option<String>,
}

impl Blob {
    pub fn new(data: Vec<u8>, content_type: Option<String>) -> Self {
        Self { data, content_type }
    }

    /// Replace the content type, keeping the bytes.
    pub fn retag(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Failures that reach the user. Display is the user-facing reason.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("No file available for this product")]
    MissingFile,
    #[error("Storage error: {0}")]
    LinkIssuance(String),
    /// Detail is kept for logs; users get the generic message.
    #[error("Download failed. Please contact support.")]
    Unknown(String),
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Success { filename: String },
    Failure(DeliveryError),
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryOutcome::Success { .. })
    }

    /// User-facing failure reason, if the attempt failed.
    pub fn reason(&self) -> Option<String> {
        match self {
            DeliveryOutcome::Success { .. } => None,
            DeliveryOutcome::Failure(err) => Some(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retag_keeps_bytes() {
        let blob = Blob::new(vec![1, 2, 3], Some("application/zip".into())).retag(GENERIC_BINARY);
        assert_eq!(blob.data(), &[1, 2, 3]);
        assert_eq!(blob.content_type(), Some(GENERIC_BINARY));
    }

    #[test]
    fn failure_reasons_are_user_facing() {
        let storage = DeliveryOutcome::Failure(DeliveryError::LinkIssuance("Object not found".into()));
        assert_eq!(storage.reason().as_deref(), Some("Storage error: Object not found"));

        let unknown = DeliveryOutcome::Failure(DeliveryError::Unknown("boom".into()));
        assert_eq!(
            unknown.reason().as_deref(),
            Some("Download failed. Please contact support.")
        );

        let ok = DeliveryOutcome::Success {
            filename: "a.zip".into(),
        };
        assert!(ok.is_success());
        assert_eq!(ok.reason(), None);
    }
}

//! The delivery cascade.
//!
//! Buffered save, then direct link transfer, then full navigation. A
//! strategy only runs after the previous one has failed.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::{DeliverySink, FetchError, Fetcher, SinkError, GENERIC_BINARY};

/// How long a buffered save keeps its transient resource before release.
pub const TRANSIENT_RELEASE_DELAY: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("fetch: {0}")]
    Fetch(#[from] FetchError),
    #[error("sink: {0}")]
    Sink(#[from] SinkError),
}

#[async_trait]
pub trait DeliveryStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deliver `url` under the suggested `filename`. `Ok` means the
    /// transfer was handed off; nothing confirms the bytes hit disk.
    async fn attempt(&self, url: &str, filename: &str) -> Result<(), StrategyError>;
}

/// Fetch the whole body, retag it as generic binary, save it.
pub struct BufferedSave {
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn DeliverySink>,
    release_delay: Duration,
}

impl BufferedSave {
    pub fn new(fetcher: Arc<dyn Fetcher>, sink: Arc<dyn DeliverySink>) -> Self {
        Self {
            fetcher,
            sink,
            release_delay: TRANSIENT_RELEASE_DELAY,
        }
    }
}

#[async_trait]
impl DeliveryStrategy for BufferedSave {
    fn name(&self) -> &'static str {
        "buffered-save"
    }

    async fn attempt(&self, url: &str, filename: &str) -> Result<(), StrategyError> {
        let blob = self.fetcher.fetch(url).await?.retag(GENERIC_BINARY);
        debug!("Buffered {} bytes for {}", blob.len(), filename);
        self.sink.save_blob(blob, filename).await?;

        // Let the save get going before the transient resource goes away.
        let sink = self.sink.clone();
        let filename = filename.to_string();
        let delay = self.release_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            sink.release_transient(&filename).await;
        });
        Ok(())
    }
}

/// Point a direct transfer at the URL with the suggested name.
pub struct AnchorNavigation {
    sink: Arc<dyn DeliverySink>,
}

impl AnchorNavigation {
    pub fn new(sink: Arc<dyn DeliverySink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl DeliveryStrategy for AnchorNavigation {
    fn name(&self) -> &'static str {
        "anchor-navigation"
    }

    async fn attempt(&self, url: &str, filename: &str) -> Result<(), StrategyError> {
        self.sink.navigate_via_anchor(url, filename).await?;
        Ok(())
    }
}

/// Open the URL itself; the saved name is up to whatever handles it.
pub struct WindowNavigation {
    sink: Arc<dyn DeliverySink>,
}

impl WindowNavigation {
    pub fn new(sink: Arc<dyn DeliverySink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl DeliveryStrategy for WindowNavigation {
    fn name(&self) -> &'static str {
        "window-navigation"
    }

    async fn attempt(&self, url: &str, _filename: &str) -> Result<(), StrategyError> {
        self.sink.navigate_window(url).await?;
        Ok(())
    }
}

/// The standard three-step cascade over one fetcher and sink.
pub fn default_cascade(
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn DeliverySink>,
) -> Vec<Box<dyn DeliveryStrategy>> {
    vec![
        Box::new(BufferedSave::new(fetcher, sink.clone())),
        Box::new(AnchorNavigation::new(sink.clone())),
        Box::new(WindowNavigation::new(sink)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingSink, SinkCall, StaticFetcher};

    #[tokio::test(start_paused = true)]
    async fn buffered_save_retags_and_defers_release() {
        let fetcher = Arc::new(StaticFetcher::ok(b"zipbytes".to_vec(), Some("application/zip")));
        let sink = Arc::new(RecordingSink::new());
        let strategy = BufferedSave::new(fetcher.clone(), sink.clone());

        strategy.attempt("https://signed/1", "Pack.zip").await.unwrap();

        assert_eq!(fetcher.calls(), vec!["https://signed/1".to_string()]);
        assert_eq!(
            sink.calls(),
            vec![SinkCall::SaveBlob {
                filename: "Pack.zip".into(),
                content_type: Some(GENERIC_BINARY.into()),
                len: 8,
            }]
        );

        tokio::time::sleep(TRANSIENT_RELEASE_DELAY * 2).await;
        assert_eq!(
            sink.calls().last(),
            Some(&SinkCall::ReleaseTransient {
                filename: "Pack.zip".into()
            })
        );
    }

    #[tokio::test]
    async fn buffered_save_fails_on_bad_status_without_saving() {
        let fetcher = Arc::new(StaticFetcher::status(403));
        let sink = Arc::new(RecordingSink::new());
        let strategy = BufferedSave::new(fetcher, sink.clone());

        let err = strategy.attempt("https://signed/1", "Pack.zip").await.unwrap_err();
        assert!(matches!(err, StrategyError::Fetch(FetchError::Status(403))));
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn window_navigation_ignores_filename() {
        let sink = Arc::new(RecordingSink::new());
        WindowNavigation::new(sink.clone())
            .attempt("https://signed/1", "Pack.zip")
            .await
            .unwrap();
        assert_eq!(
            sink.calls(),
            vec![SinkCall::Window {
                url: "https://signed/1".into()
            }]
        );
    }

    #[test]
    fn default_cascade_order() {
        let fetcher = Arc::new(StaticFetcher::ok(Vec::new(), None));
        let sink = Arc::new(RecordingSink::new());
        let names: Vec<_> = default_cascade(fetcher, sink)
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(
            names,
            vec!["buffered-save", "anchor-navigation", "window-navigation"]
        );
    }
}

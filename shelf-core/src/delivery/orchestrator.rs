use std::sync::Arc;
use tracing::{error, info, warn};

use super::{
    default_cascade, DeliveryError, DeliveryOutcome, DeliverySink, DeliveryStrategy, Fetcher,
};
use crate::filename::{basename, derive_filename};
use crate::product::Product;
use crate::storage::{SignedUrlIssuer, PRODUCT_FILES_BUCKET, SIGNED_URL_TTL};

/// Turns a product's stored file into a delivered download.
///
/// Every call signs a fresh link; nothing is cached between attempts.
pub struct DeliveryOrchestrator {
    issuer: Arc<dyn SignedUrlIssuer>,
    strategies: Vec<Box<dyn DeliveryStrategy>>,
}

impl DeliveryOrchestrator {
    pub fn new(issuer: Arc<dyn SignedUrlIssuer>, strategies: Vec<Box<dyn DeliveryStrategy>>) -> Self {
        Self { issuer, strategies }
    }

    /// Orchestrator running the standard buffered/anchor/window cascade.
    pub fn with_default_cascade(
        issuer: Arc<dyn SignedUrlIssuer>,
        fetcher: Arc<dyn Fetcher>,
        sink: Arc<dyn DeliverySink>,
    ) -> Self {
        Self::new(issuer, default_cascade(fetcher, sink))
    }

    pub async fn deliver(&self, product: &Product) -> DeliveryOutcome {
        let Some(file_ref) = product.file_ref() else {
            warn!("Product {} has no file to deliver", product.id);
            return DeliveryOutcome::Failure(DeliveryError::MissingFile);
        };
        let object_name = basename(file_ref);
        if object_name.is_empty() {
            warn!("Product {} file reference {:?} names no object", product.id, file_ref);
            return DeliveryOutcome::Failure(DeliveryError::MissingFile);
        }

        let signed = match self
            .issuer
            .issue_signed_download_url(PRODUCT_FILES_BUCKET, object_name, SIGNED_URL_TTL)
            .await
        {
            Ok(signed) => signed,
            Err(e) => {
                error!("Signing {} for product {} failed: {}", object_name, product.id, e);
                return DeliveryOutcome::Failure(DeliveryError::LinkIssuance(e.to_string()));
            }
        };

        let filename = derive_filename(&product.title, file_ref);
        info!("Delivering product {} as {}", product.id, filename);

        for (index, strategy) in self.strategies.iter().enumerate() {
            match strategy.attempt(&signed.url, &filename).await {
                Ok(()) => {
                    info!(
                        "Delivered {} via {} (strategy {})",
                        filename,
                        strategy.name(),
                        index + 1
                    );
                    return DeliveryOutcome::Success { filename };
                }
                Err(e) => {
                    warn!(
                        "Delivery strategy {} ({}) failed for {}: {}",
                        index + 1,
                        strategy.name(),
                        filename,
                        e
                    );
                }
            }
        }

        error!(
            "All {} delivery strategies failed for product {}",
            self.strategies.len(),
            product.id
        );
        DeliveryOutcome::Failure(DeliveryError::Unknown(format!(
            "all {} delivery strategies failed",
            self.strategies.len()
        )))
    }
}

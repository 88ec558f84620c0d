//! Product lookup.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::product::{Product, ProductError};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid catalog: {0}")]
    Parse(String),
    #[error("Invalid product: {0}")]
    Product(#[from] ProductError),
    #[error("Catalog request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Look up a product by id. `Ok(None)` when no such product exists.
    async fn get_product(&self, id: &str) -> Result<Option<Product>, CatalogError>;
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    products: Vec<Product>,
}

/// Catalog backed by a YAML file:
///
/// ```yaml
/// products:
///   - id: p1
///     title: My Cool App
///     price: 0
///     file_ref: uploads/abc123.zip
/// ```
///
/// The file is re-read on every lookup so edits show up without a restart.
pub struct YamlCatalog {
    path: PathBuf,
}

impl YamlCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<Product>, CatalogError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let file: CatalogFile =
            serde_yaml::from_str(&content).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Ok(file.products)
    }
}

#[async_trait]
impl ProductCatalog for YamlCatalog {
    async fn get_product(&self, id: &str) -> Result<Option<Product>, CatalogError> {
        let products = self.load().await?;
        debug!(
            "Loaded {} products from {}",
            products.len(),
            self.path.display()
        );
        match products.into_iter().find(|p| p.id == id) {
            Some(product) => {
                product.validate()?;
                Ok(Some(product))
            }
            None => Ok(None),
        }
    }
}

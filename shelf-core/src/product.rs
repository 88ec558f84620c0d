//! Product metadata as read from the catalog.
//!
//! The core never writes products; it only needs enough of a row to name
//! the download and locate the stored object.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ProductError {
    #[error("Product {id} has an invalid price: {price}")]
    InvalidPrice { id: String, price: f64 },
    #[error("Product id cannot be empty")]
    MissingId,
}

/// A product as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub price: f64,
    /// Storage-relative path or URL of the product's file.
    /// The hosted backend calls this column `file_url`.
    #[serde(default, alias = "file_url")]
    pub file_ref: Option<String>,
}

impl Product {
    pub fn new(id: impl Into<String>, title: impl Into<String>, price: f64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            price,
            file_ref: None,
        }
    }

    pub fn with_file_ref(mut self, file_ref: impl Into<String>) -> Self {
        self.file_ref = Some(file_ref.into());
        self
    }

    /// A product is free exactly when its price is zero.
    pub fn is_free(&self) -> bool {
        self.price == 0.0
    }

    /// File reference, treating a blank string the same as a missing one.
    pub fn file_ref(&self) -> Option<&str> {
        self.file_ref
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
    }

    pub fn validate(&self) -> Result<(), ProductError> {
        if self.id.trim().is_empty() {
            return Err(ProductError::MissingId);
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ProductError::InvalidPrice {
                id: self.id.clone(),
                price: self.price,
            });
        }
        Ok(())
    }
}

//! Client for the hosted backend-as-a-service.
//!
//! Covers the two calls the storefront makes against it: signing a
//! storage object (`/storage/v1/object/sign/...`) and reading a product
//! row (`/rest/v1/products`). Both use the project's anon API key.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::catalog::{CatalogError, ProductCatalog};
use crate::product::Product;
use crate::storage::{SignedUrl, SignedUrlIssuer, StorageError};

#[derive(Serialize)]
struct SignRequest {
    #[serde(rename = "expiresIn")]
    expires_in: u64,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

/// Error body returned by the storage API.
#[derive(Deserialize, Default)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

pub struct HostedBackend {
    base_url: String,
    api_key: String,
    client: Client,
}

impl HostedBackend {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Signed paths come back relative to the storage API root.
    fn resolve_signed_url(&self, signed: &str) -> String {
        if signed.starts_with("http://") || signed.starts_with("https://") {
            signed.to_string()
        } else {
            let path = signed.trim_start_matches('/');
            format!("{}/storage/v1/{}", self.base_url, path)
        }
    }

    /// Map a non-success storage response to a StorageError.
    async fn map_storage_error(resp: reqwest::Response) -> StorageError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let message = parsed
            .message
            .or(parsed.error)
            .unwrap_or_else(|| format!("{status}: {body}"));

        match status {
            StatusCode::NOT_FOUND => StorageError::NotFound(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::Unauthorized(message),
            _ => StorageError::Storage(message),
        }
    }
}

#[async_trait]
impl SignedUrlIssuer for HostedBackend {
    async fn issue_signed_download_url(
        &self,
        bucket: &str,
        object_name: &str,
        ttl: Duration,
    ) -> Result<SignedUrl, StorageError> {
        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.base_url,
            urlencoding::encode(bucket),
            urlencoding::encode(object_name)
        );

        let resp = self
            .authorized(self.client.post(&url))
            .json(&SignRequest {
                expires_in: ttl.as_secs(),
            })
            .send()
            .await
            .map_err(|e| StorageError::Storage(format!("sign {object_name}: {e}")))?;

        if !resp.status().is_success() {
            return Err(Self::map_storage_error(resp).await);
        }

        let body: SignResponse = resp
            .json()
            .await
            .map_err(|e| StorageError::Storage(format!("sign response {object_name}: {e}")))?;

        debug!("Signed {}/{} for {}s", bucket, object_name, ttl.as_secs());
        Ok(SignedUrl {
            url: self.resolve_signed_url(&body.signed_url),
            expires_in: ttl,
        })
    }
}

#[async_trait]
impl ProductCatalog for HostedBackend {
    async fn get_product(&self, id: &str) -> Result<Option<Product>, CatalogError> {
        let url = format!("{}/rest/v1/products", self.base_url);
        let resp = self
            .authorized(self.client.get(&url))
            .query(&[("id", format!("eq.{id}")), ("select", "*".to_string())])
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| CatalogError::Request(format!("get product {id}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CatalogError::Request(format!("{status}: {body}")));
        }

        let rows: Vec<Product> = resp
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        match rows.into_iter().next() {
            Some(product) => {
                product.validate()?;
                Ok(Some(product))
            }
            None => Ok(None),
        }
    }
}

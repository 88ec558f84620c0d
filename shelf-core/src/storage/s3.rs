//! S3-backed signed-URL issuer.
//!
//! Presigns `GetObject` requests against any S3-compatible endpoint.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use std::time::Duration;
use tracing::{debug, info};

use super::{SignedUrl, SignedUrlIssuer, StorageError};

/// S3 connection settings.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub region: String,
    pub endpoint_url: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    pub async fn new(settings: S3Settings) -> Result<Self, StorageError> {
        if settings.region.trim().is_empty() {
            return Err(StorageError::Config("Region cannot be empty".to_string()));
        }
        let credentials = Credentials::new(
            settings.access_key_id,
            settings.secret_access_key,
            None,
            None,
            "shelf-s3-config",
        );

        let mut builder = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region))
            .credentials_provider(credentials);

        if let Some(endpoint) = &settings.endpoint_url {
            let normalized = endpoint.trim_end_matches('/').to_string();
            info!("Using custom S3 endpoint: {}", normalized);
            builder = builder.endpoint_url(normalized);
        } else {
            info!("Using default AWS S3 endpoint");
        }

        let aws_config = builder.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
        })
    }
}

#[async_trait]
impl SignedUrlIssuer for S3Storage {
    async fn issue_signed_download_url(
        &self,
        bucket: &str,
        object_name: &str,
        ttl: Duration,
    ) -> Result<SignedUrl, StorageError> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::Config(format!("presigning config: {e}")))?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(object_name)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Storage(format!("presign {object_name}: {e}")))?;

        debug!("Presigned {}/{} for {:?}", bucket, object_name, ttl);
        Ok(SignedUrl {
            url: request.uri().to_string(),
            expires_in: ttl,
        })
    }
}

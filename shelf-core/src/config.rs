use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::catalog::{ProductCatalog, YamlCatalog};
use crate::hosted::HostedBackend;
use crate::storage::s3::S3Settings;
use crate::storage::{S3Storage, SignedUrlIssuer};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which service signs download links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The hosted backend-as-a-service (REST storage + rows)
    #[default]
    Hosted,
    /// Any S3-compatible object store
    S3,
}

impl std::str::FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hosted" => Ok(Backend::Hosted),
            "s3" => Ok(Backend::S3),
            other => Err(ConfigError::Config(format!("Unknown backend: {other}"))),
        }
    }
}

/// YAML config file structure (`~/.shelf/config.yaml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigYaml {
    #[serde(default)]
    pub backend: Backend,
    pub hosted_url: Option<String>,
    pub hosted_api_key: Option<String>,
    pub s3_region: Option<String>,
    /// Custom endpoint for S3-compatible services (MinIO etc.)
    pub s3_endpoint: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    /// Local product catalog. Without one, products come from the hosted backend.
    pub catalog_path: Option<PathBuf>,
    pub download_dir: Option<PathBuf>,
    /// Timeout for the buffered fetch. Unset = no timeout.
    pub fetch_timeout_secs: Option<u64>,
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub backend: Backend,
    pub hosted_url: Option<String>,
    pub hosted_api_key: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    pub catalog_path: Option<PathBuf>,
    pub download_dir: PathBuf,
    pub fetch_timeout: Option<Duration>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let dev_mode = std::env::var("SHELF_DEV_MODE").is_ok() || dotenvy::dotenv().is_ok();
        if dev_mode {
            info!("Dev mode activated - loading from environment");
            Self::from_env()
        } else {
            info!("Production mode - loading from config.yaml");
            Self::from_config_file()
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from `SHELF_*` variables resolved through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match get("SHELF_BACKEND") {
            Some(b) => b.parse()?,
            None => Backend::default(),
        };
        let fetch_timeout_secs = match get("SHELF_FETCH_TIMEOUT_SECS") {
            Some(v) => Some(v.trim().parse::<u64>().map_err(|e| {
                ConfigError::Config(format!("SHELF_FETCH_TIMEOUT_SECS: {e}"))
            })?),
            None => None,
        };

        Ok(Self::from_yaml(ConfigYaml {
            backend,
            hosted_url: get("SHELF_HOSTED_URL"),
            hosted_api_key: get("SHELF_HOSTED_API_KEY"),
            s3_region: get("SHELF_S3_REGION"),
            s3_endpoint: get("SHELF_S3_ENDPOINT"),
            s3_access_key: get("SHELF_S3_ACCESS_KEY"),
            s3_secret_key: get("SHELF_S3_SECRET_KEY"),
            catalog_path: get("SHELF_CATALOG_PATH").map(PathBuf::from),
            download_dir: get("SHELF_DOWNLOAD_DIR").map(PathBuf::from),
            fetch_timeout_secs,
        }))
    }

    fn from_config_file() -> Result<Self, ConfigError> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| ConfigError::Config("Failed to get home directory".to_string()))?;
        Self::load_from_path(&home_dir.join(".shelf").join("config.yaml"))
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let yaml: ConfigYaml = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Serialization(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_yaml(yaml))
    }

    fn from_yaml(yaml: ConfigYaml) -> Self {
        let download_dir = yaml.download_dir.unwrap_or_else(default_download_dir);
        Self {
            backend: yaml.backend,
            hosted_url: yaml.hosted_url,
            hosted_api_key: yaml.hosted_api_key,
            s3_region: yaml.s3_region,
            s3_endpoint: yaml.s3_endpoint,
            s3_access_key: yaml.s3_access_key,
            s3_secret_key: yaml.s3_secret_key,
            catalog_path: yaml.catalog_path,
            download_dir,
            fetch_timeout: yaml.fetch_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Check that the chosen backend has everything it needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let require = |value: &Option<String>, name: &str| -> Result<(), ConfigError> {
            if value.as_deref().map(str::trim).unwrap_or("").is_empty() {
                return Err(ConfigError::Config(format!("{name} cannot be empty")));
            }
            Ok(())
        };

        match self.backend {
            Backend::Hosted => {
                require(&self.hosted_url, "Hosted URL")?;
                require(&self.hosted_api_key, "Hosted API key")?;
            }
            Backend::S3 => {
                require(&self.s3_region, "S3 region")?;
                require(&self.s3_access_key, "S3 access key")?;
                require(&self.s3_secret_key, "S3 secret key")?;
                if self.catalog_path.is_none() {
                    return Err(ConfigError::Config(
                        "The S3 backend needs a catalog path".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn hosted_backend(&self) -> Result<HostedBackend, ConfigError> {
        match (&self.hosted_url, &self.hosted_api_key) {
            (Some(url), Some(key)) => Ok(HostedBackend::new(url.clone(), key.clone())),
            _ => Err(ConfigError::Config(
                "Hosted URL and API key are required".to_string(),
            )),
        }
    }

    /// Signed-URL issuer for the configured backend.
    pub async fn signed_url_issuer(&self) -> Result<Arc<dyn SignedUrlIssuer>, ConfigError> {
        self.validate()?;
        match self.backend {
            Backend::Hosted => Ok(Arc::new(self.hosted_backend()?)),
            Backend::S3 => {
                let settings = S3Settings {
                    region: self.s3_region.clone().unwrap_or_default(),
                    endpoint_url: self.s3_endpoint.clone(),
                    access_key_id: self.s3_access_key.clone().unwrap_or_default(),
                    secret_access_key: self.s3_secret_key.clone().unwrap_or_default(),
                };
                let storage = S3Storage::new(settings)
                    .await
                    .map_err(|e| ConfigError::Config(e.to_string()))?;
                Ok(Arc::new(storage))
            }
        }
    }

    /// Product catalog: the local file when configured, else the hosted rows.
    pub fn product_catalog(&self) -> Result<Box<dyn ProductCatalog>, ConfigError> {
        if let Some(path) = &self.catalog_path {
            return Ok(Box::new(YamlCatalog::new(path.clone())));
        }
        Ok(Box::new(self.hosted_backend()?))
    }
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
}

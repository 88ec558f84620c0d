//! Download-directory sink.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::{Blob, DeliverySink, SinkError};

/// Give up on finding a free ` (n)` name after this many tries.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Saves deliveries into a local directory.
///
/// Buffered saves are written to a hidden staging file first and renamed
/// into place, so a half-written file never carries the final name.
pub struct DiskSink {
    download_dir: PathBuf,
    client: Client,
    /// Staging files per suggested filename, released after the save.
    staged: Mutex<HashMap<String, PathBuf>>,
}

impl DiskSink {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            client: Client::new(),
            staged: Mutex::new(HashMap::new()),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    fn staging_path(&self) -> PathBuf {
        self.download_dir
            .join(format!(".shelf-{}.part", uuid::Uuid::new_v4()))
    }

    async fn write_staged(&self, staging: &Path, data: &[u8]) -> Result<(), SinkError> {
        let mut file = tokio::fs::File::create(staging).await?;
        file.write_all(data).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Move a staged file to the first free name for `filename`.
    async fn place_staged(&self, staging: &Path, filename: &str) -> Result<PathBuf, SinkError> {
        let dest = unique_destination(&self.download_dir, filename).await?;
        tokio::fs::rename(staging, &dest).await?;
        Ok(dest)
    }

    async fn stream_to(&self, url: &str, dest: &Path) -> Result<u64, SinkError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SinkError::Transfer(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SinkError::Transfer(format!("HTTP {}", status.as_u16())));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = resp.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SinkError::Transfer(e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

/// First free path for `filename` in `dir`: `name.ext`, `name (1).ext`, ...
pub(crate) async fn unique_destination(dir: &Path, filename: &str) -> Result<PathBuf, SinkError> {
    let candidate = dir.join(filename);
    if !tokio::fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(idx) if idx > 0 => (&filename[..idx], &filename[idx..]),
        _ => (filename, ""),
    };

    for n in 1..=MAX_NAME_ATTEMPTS {
        let candidate = dir.join(format!("{stem} ({n}){ext}"));
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
    }

    Err(SinkError::Io(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("no free name for {filename} in {}", dir.display()),
    )))
}

#[async_trait]
impl DeliverySink for DiskSink {
    async fn save_blob(&self, blob: Blob, filename: &str) -> Result<(), SinkError> {
        tokio::fs::create_dir_all(&self.download_dir).await?;

        let staging = self.staging_path();
        if let Err(e) = self.write_staged(&staging, blob.data()).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e);
        }
        self.staged
            .lock()
            .unwrap()
            .insert(filename.to_string(), staging.clone());

        match self.place_staged(&staging, filename).await {
            Ok(dest) => {
                info!("Saved {} bytes to {}", blob.len(), dest.display());
                Ok(())
            }
            Err(e) => {
                self.staged.lock().unwrap().remove(filename);
                let _ = tokio::fs::remove_file(&staging).await;
                Err(e)
            }
        }
    }

    async fn release_transient(&self, filename: &str) {
        let staging = self.staged.lock().unwrap().remove(filename);
        let Some(staging) = staging else {
            return;
        };
        match tokio::fs::remove_file(&staging).await {
            Ok(()) => debug!("Removed leftover staging file {}", staging.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove staging file {}: {}", staging.display(), e),
        }
    }

    async fn navigate_via_anchor(&self, url: &str, filename: &str) -> Result<(), SinkError> {
        tokio::fs::create_dir_all(&self.download_dir).await?;
        let dest = unique_destination(&self.download_dir, filename).await?;

        match self.stream_to(url, &dest).await {
            Ok(written) => {
                info!("Streamed {} bytes to {}", written, dest.display());
                Ok(())
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&dest).await;
                Err(e)
            }
        }
    }

    async fn navigate_window(&self, url: &str) -> Result<(), SinkError> {
        info!("Opening download link in the system browser");
        open::that_detached(url).map_err(|e| SinkError::Open {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn save_blob_writes_under_suggested_name() {
        let dir = TempDir::new().unwrap();
        let sink = DiskSink::new(dir.path());

        sink.save_blob(Blob::new(b"payload".to_vec(), None), "My_Cool_App.zip")
            .await
            .unwrap();

        let saved = tokio::fs::read(dir.path().join("My_Cool_App.zip")).await.unwrap();
        assert_eq!(saved, b"payload");
    }

    #[tokio::test]
    async fn repeated_saves_get_numbered_names() {
        let dir = TempDir::new().unwrap();
        let sink = DiskSink::new(dir.path());

        for body in [b"one".to_vec(), b"two".to_vec(), b"three".to_vec()] {
            sink.save_blob(Blob::new(body, None), "pack.zip").await.unwrap();
        }

        assert_eq!(tokio::fs::read(dir.path().join("pack.zip")).await.unwrap(), b"one");
        assert_eq!(tokio::fs::read(dir.path().join("pack (1).zip")).await.unwrap(), b"two");
        assert_eq!(tokio::fs::read(dir.path().join("pack (2).zip")).await.unwrap(), b"three");
    }

    #[tokio::test]
    async fn release_leaves_no_staging_files_behind() {
        let dir = TempDir::new().unwrap();
        let sink = DiskSink::new(dir.path());

        sink.save_blob(Blob::new(b"x".to_vec(), None), "a.bin").await.unwrap();
        sink.release_transient("a.bin").await;
        // Releasing twice is harmless.
        sink.release_transient("a.bin").await;

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["a.bin".to_string()]);
    }

    #[tokio::test]
    async fn failed_rename_removes_staging_file() {
        let dir = TempDir::new().unwrap();
        let sink = DiskSink::new(dir.path());

        // Parent directory of the destination does not exist.
        let result = sink
            .save_blob(Blob::new(b"x".to_vec(), None), "missing/a.bin")
            .await;
        assert!(matches!(result, Err(SinkError::Io(_))));
        assert!(sink.staged.lock().unwrap().is_empty());

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unique_destination_handles_names_without_extension() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("README"), b"").await.unwrap();
        let dest = unique_destination(dir.path(), "README").await.unwrap();
        assert_eq!(dest, dir.path().join("README (1)"));
    }

    #[tokio::test]
    async fn anchor_transfer_to_unreachable_host_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let sink = DiskSink::new(dir.path());

        let result = sink
            .navigate_via_anchor("http://127.0.0.1:1/nothing", "x.zip")
            .await;
        assert!(matches!(result, Err(SinkError::Transfer(_))));
        assert!(!dir.path().join("x.zip").exists());
    }
}

//! Recording fakes for the storage, fetch, and sink seams.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::delivery::{Blob, DeliverySink, FetchError, Fetcher, SinkError};
use crate::storage::{SignedUrl, SignedUrlIssuer, StorageError};

#[derive(Debug, Clone, PartialEq)]
pub struct IssueCall {
    pub bucket: String,
    pub object_name: String,
    pub ttl: Duration,
}

/// Issues `https://signed.test/<object>?sig=<n>`, `n` counting calls from 1.
pub struct RecordingIssuer {
    failure: Option<String>,
    calls: Mutex<Vec<IssueCall>>,
    object_name: Mutex<Option<String>>,
}

impl Default for RecordingIssuer {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingIssuer {
    pub fn new() -> Self {
        Self {
            failure: None,
            calls: Mutex::new(Vec::new()),
            object_name: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<IssueCall> {
        self.calls.lock().unwrap().clone()
    }

    /// URL handed out by the `n`th call (1-based).
    pub fn url_for(&self, n: usize) -> String {
        let object = self
            .object_name
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_default();
        format!("https://signed.test/{object}?sig={n}")
    }
}

#[async_trait]
impl SignedUrlIssuer for RecordingIssuer {
    async fn issue_signed_download_url(
        &self,
        bucket: &str,
        object_name: &str,
        ttl: Duration,
    ) -> Result<SignedUrl, StorageError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(IssueCall {
                bucket: bucket.to_string(),
                object_name: object_name.to_string(),
                ttl,
            });
            calls.len()
        };
        *self.object_name.lock().unwrap() = Some(object_name.to_string());

        if let Some(message) = &self.failure {
            return Err(StorageError::Storage(message.clone()));
        }
        Ok(SignedUrl {
            url: self.url_for(n),
            expires_in: ttl,
        })
    }
}

enum FetchBehavior {
    Ok {
        data: Vec<u8>,
        content_type: Option<String>,
    },
    Status(u16),
    Fail(String),
}

/// Fetcher with a fixed response.
pub struct StaticFetcher {
    behavior: FetchBehavior,
    calls: Mutex<Vec<String>>,
}

impl StaticFetcher {
    fn with(behavior: FetchBehavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(data: Vec<u8>, content_type: Option<&str>) -> Self {
        Self::with(FetchBehavior::Ok {
            data,
            content_type: content_type.map(str::to_string),
        })
    }

    pub fn status(code: u16) -> Self {
        Self::with(FetchBehavior::Status(code))
    }

    pub fn failing(message: &str) -> Self {
        Self::with(FetchBehavior::Fail(message.to_string()))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Blob, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        match &self.behavior {
            FetchBehavior::Ok { data, content_type } => {
                Ok(Blob::new(data.clone(), content_type.clone()))
            }
            FetchBehavior::Status(code) => Err(FetchError::Status(*code)),
            FetchBehavior::Fail(message) => Err(FetchError::Request(message.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    SaveBlob {
        filename: String,
        content_type: Option<String>,
        len: usize,
    },
    ReleaseTransient {
        filename: String,
    },
    Anchor {
        url: String,
        filename: String,
    },
    Window {
        url: String,
    },
}

/// Sink that records calls; failures recorded too.
#[derive(Default)]
pub struct RecordingSink {
    fail_save: bool,
    fail_anchor: bool,
    fail_window: bool,
    calls: Mutex<Vec<SinkCall>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_save(mut self) -> Self {
        self.fail_save = true;
        self
    }

    pub fn fail_anchor(mut self) -> Self {
        self.fail_anchor = true;
        self
    }

    pub fn fail_window(mut self) -> Self {
        self.fail_window = true;
        self
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: SinkCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn save_blob(&self, blob: Blob, filename: &str) -> Result<(), SinkError> {
        self.record(SinkCall::SaveBlob {
            filename: filename.to_string(),
            content_type: blob.content_type().map(str::to_string),
            len: blob.len(),
        });
        if self.fail_save {
            return Err(SinkError::Transfer("save refused".into()));
        }
        Ok(())
    }

    async fn release_transient(&self, filename: &str) {
        self.record(SinkCall::ReleaseTransient {
            filename: filename.to_string(),
        });
    }

    async fn navigate_via_anchor(&self, url: &str, filename: &str) -> Result<(), SinkError> {
        self.record(SinkCall::Anchor {
            url: url.to_string(),
            filename: filename.to_string(),
        });
        if self.fail_anchor {
            return Err(SinkError::Transfer("anchor refused".into()));
        }
        Ok(())
    }

    async fn navigate_window(&self, url: &str) -> Result<(), SinkError> {
        self.record(SinkCall::Window {
            url: url.to_string(),
        });
        if self.fail_window {
            return Err(SinkError::Open {
                url: url.to_string(),
                reason: "no opener".into(),
            });
        }
        Ok(())
    }
}

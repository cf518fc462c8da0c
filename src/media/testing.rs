//! In-process stand-in for the extractor, used by unit tests.

use super::{
    extractor::Extractor,
    progress::{ProgressSample, ProgressSink, ProgressStatus},
    types::DownloadOptions,
};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Discards every sample.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _sample: &ProgressSample) {}
}

#[derive(Clone)]
pub enum FakeDownload {
    Writes {
        extension: &'static str,
        bytes: Vec<u8>,
        info: Value,
    },
    FailsAfterPartial(String),
}

impl FakeDownload {
    pub fn writes(extension: &'static str, bytes: &[u8], info: Value) -> Self {
        Self::Writes {
            extension,
            bytes: bytes.to_vec(),
            info,
        }
    }

    pub fn fails_after_partial(message: &str) -> Self {
        Self::FailsAfterPartial(message.to_string())
    }
}

pub struct FakeExtractor {
    info: Result<Value, String>,
    download: FakeDownload,
    seen_options: Arc<Mutex<Option<DownloadOptions>>>,
}

impl FakeExtractor {
    pub fn new(info: Result<Value, String>, download: FakeDownload) -> Self {
        Self {
            info,
            download,
            seen_options: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_info(info: Value) -> Self {
        Self::new(
            Ok(info),
            FakeDownload::fails_after_partial("download not configured"),
        )
    }

    pub fn failing_info(message: &str) -> Self {
        Self::new(
            Err(message.to_string()),
            FakeDownload::fails_after_partial("download not configured"),
        )
    }

    pub fn with_download(download: FakeDownload) -> Self {
        Self::new(Ok(serde_json::json!({ "title": "fake" })), download)
    }

    pub fn seen_options(&self) -> Arc<Mutex<Option<DownloadOptions>>> {
        self.seen_options.clone()
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn extract_info(&self, _url: &str) -> Result<Value> {
        self.info.clone().map_err(|e| anyhow::anyhow!(e))
    }

    async fn download(
        &self,
        _url: &str,
        options: &DownloadOptions,
        progress: &dyn ProgressSink,
    ) -> Result<Value> {
        *self.seen_options.lock().unwrap() = Some(options.clone());

        match &self.download {
            FakeDownload::Writes {
                extension,
                bytes,
                info,
            } => {
                let total = bytes.len() as u64;
                for downloaded in [0, total / 2, total] {
                    progress.on_progress(&ProgressSample {
                        status: ProgressStatus::Downloading,
                        downloaded_bytes: downloaded,
                        total_bytes: Some(total),
                    });
                }
                let path = options.output_template.replace("%(ext)s", extension);
                tokio::fs::write(&path, bytes).await?;
                Ok(info.clone())
            }
            FakeDownload::FailsAfterPartial(message) => {
                let path = options.output_template.replace("%(ext)s", "mp4.part");
                tokio::fs::write(&path, b"partial").await?;
                Err(anyhow::anyhow!(message.clone()))
            }
        }
    }

    async fn test_availability(&self) -> bool {
        true
    }
}

use super::{progress::ProgressSink, types::DownloadOptions};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Human-readable name of the extractor
    fn name(&self) -> &'static str;

    /// Fetch the raw info record for a URL without downloading any media
    async fn extract_info(&self, url: &str) -> Result<Value>;

    /// Download the media described by `options`, reporting progress to `progress`.
    /// Returns the info record of the downloaded item.
    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        progress: &dyn ProgressSink,
    ) -> Result<Value>;

    /// Test if this extractor and its post-processing tools are usable
    async fn test_availability(&self) -> bool;
}

mod extractor;
mod format;
mod progress;
mod types;
mod validate;
mod ytdlp;

#[cfg(test)]
pub mod testing;

pub use extractor::Extractor;
pub use progress::{format_size, ProgressReporter, ProgressSink, ProgressView};
pub use types::{Quality, RetrievalMode, RetrievedMedia, VideoMetadata};
pub use validate::validate_youtube_url;

use crate::{config::YtDlpConfig, error::AppError};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use ytdlp::YtDlpExtractor;

const SCRATCH_PREFIX: &str = "tubegrab-";
const SCRATCH_STEM: &str = "media";

/// Drives the extractor: metadata lookups and single-shot retrievals into a scratch dir.
pub struct MediaService {
    extractor: Box<dyn Extractor>,
    scratch_root: PathBuf,
    max_download_bytes: u64,
}

impl MediaService {
    pub fn new(config: &YtDlpConfig) -> Self {
        Self::with_extractor(Box::new(YtDlpExtractor::new(config)), config)
    }

    pub fn with_extractor(extractor: Box<dyn Extractor>, config: &YtDlpConfig) -> Self {
        info!(
            "Media service initialized with {} (scratch root: {})",
            extractor.name(),
            config.scratch_root().display()
        );

        Self {
            extractor,
            scratch_root: config.scratch_root(),
            max_download_bytes: config.max_download_bytes,
        }
    }

    pub async fn fetch_info(&self, url: &str) -> Result<VideoMetadata, AppError> {
        info!("Fetching info for URL: {}", url);

        let raw = self.extractor.extract_info(url).await.map_err(|e| {
            warn!("{} info extraction failed: {:#}", self.extractor.name(), e);
            AppError::fetch(e)
        })?;

        Ok(VideoMetadata::from_info(&raw))
    }

    pub async fn retrieve(
        &self,
        url: &str,
        mode: RetrievalMode,
        progress: &dyn ProgressSink,
    ) -> Result<RetrievedMedia, AppError> {
        info!("Starting retrieval for URL: {} ({:?})", url, mode);

        let media = self
            .retrieve_in_scratch(url, mode, progress)
            .await
            .map_err(|e| {
                warn!("{} retrieval failed: {:#}", self.extractor.name(), e);
                AppError::retrieval(e)
            })?;

        info!(
            "Retrieved {} ({} bytes)",
            media.filename,
            media.bytes.len()
        );
        Ok(media)
    }

    async fn retrieve_in_scratch(
        &self,
        url: &str,
        mode: RetrievalMode,
        progress: &dyn ProgressSink,
    ) -> Result<RetrievedMedia> {
        // Removed on drop, so every early return below cleans up.
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&self.scratch_root)
            .with_context(|| {
                format!(
                    "Failed to create scratch directory in {}",
                    self.scratch_root.display()
                )
            })?;

        let template = scratch
            .path()
            .join(format!("{}.%(ext)s", SCRATCH_STEM))
            .to_string_lossy()
            .into_owned();
        let options = format::download_options(mode, template);

        let info = self.extractor.download(url, &options, progress).await?;

        let path = locate_output(scratch.path(), mode.extension()).await?;
        let size = tokio::fs::metadata(&path)
            .await
            .context("Failed to read downloaded file metadata")?
            .len();
        if size > self.max_download_bytes {
            return Err(anyhow::anyhow!(
                "Downloaded file is {} which exceeds the limit of {}",
                format_size(size),
                format_size(self.max_download_bytes)
            ));
        }

        let bytes = tokio::fs::read(&path)
            .await
            .context("Failed to read downloaded file")?;

        if let Err(e) = scratch.close() {
            warn!("Failed to remove scratch directory: {}", e);
        }

        let title = info["title"].as_str().unwrap_or_default();
        Ok(RetrievedMedia {
            bytes,
            filename: media_filename(title, mode),
            mime_type: mode.mime_type(),
        })
    }

    pub async fn test_setup(&self) -> bool {
        info!("Testing media extractor setup...");
        self.extractor.test_availability().await
    }
}

/// Finds the finished output file. Anything other than the mode's extension is an error,
/// so a stream the extractor could not remux is never served under the wrong type.
async fn locate_output(dir: &Path, extension: &str) -> Result<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .context("Failed to read scratch directory")?;

    let mut candidates = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .context("Failed to read scratch directory entry")?
    {
        let path = entry.path();
        let is_partial = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("part" | "ytdl" | "temp")
        );
        if path.is_file() && !is_partial {
            candidates.push(path);
        }
    }

    if let Some(path) = candidates
        .iter()
        .find(|path| path.extension().and_then(|ext| ext.to_str()) == Some(extension))
    {
        return Ok(path.clone());
    }

    if candidates.is_empty() {
        return Err(anyhow::anyhow!("Extractor produced no output file"));
    }

    let produced: Vec<String> = candidates
        .iter()
        .filter_map(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
        .collect();
    Err(anyhow::anyhow!(
        "Extractor produced {} instead of a .{} file",
        produced.join(", "),
        extension
    ))
}

/// Title made safe for a download filename; falls back to the mode's default.
pub fn sanitize_title(title: &str, fallback: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn media_filename(title: &str, mode: RetrievalMode) -> String {
    format!(
        "{}.{}",
        sanitize_title(title, mode.default_title()),
        mode.extension()
    )
}

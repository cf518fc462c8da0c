use super::{
    extractor::Extractor,
    progress::{ProgressSample, ProgressSink, ProgressStatus},
    types::DownloadOptions,
};
use crate::config::YtDlpConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

const PROGRESS_MARKER: &str = "tubegrab-progress";
const PROGRESS_TEMPLATE: &str = "download:tubegrab-progress %(progress.status)s %(progress.downloaded_bytes)s %(progress.total_bytes)s";

pub struct YtDlpExtractor {
    binary: String,
    ffmpeg: String,
    info_timeout: Duration,
    download_timeout: Option<Duration>,
}

impl YtDlpExtractor {
    pub fn new(config: &YtDlpConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            ffmpeg: config.ffmpeg.clone(),
            info_timeout: config.info_timeout(),
            download_timeout: config.download_timeout(),
        }
    }

    async fn tool_version(program: &str, flag: &str) -> Option<String> {
        match Command::new(program).arg(flag).output().await {
            Ok(output) if output.status.success() => Some(
                String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .unwrap_or("unknown")
                    .trim()
                    .to_string(),
            ),
            Ok(_) => {
                warn!("❌ {} command failed", program);
                None
            }
            Err(e) => {
                warn!("❌ {} not found: {}", program, e);
                None
            }
        }
    }
}

/// Kills a child's whole process group on drop, so ffmpeg helpers spawned by yt-dlp
/// do not outlive a cancelled or timed-out download. `kill_on_drop` only reaches yt-dlp.
struct ProcessGroupGuard {
    pgid: Option<i32>,
}

impl ProcessGroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self {
            pgid: pid.and_then(|pid| i32::try_from(pid).ok()),
        }
    }

    /// Called once the child has exited on its own.
    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.take() {
            // SAFETY: plain syscall on a group we created; ESRCH is harmless.
            unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            }
        }
    }
}

pub fn info_args(url: &str) -> Vec<String> {
    vec![
        "--dump-json".to_string(),
        "--no-download".to_string(),
        "--no-warnings".to_string(),
        "--no-playlist".to_string(),
        url.to_string(),
    ]
}

pub fn download_args(url: &str, options: &DownloadOptions) -> Vec<String> {
    let mut args = vec![
        // -j with --no-simulate prints the info record and still downloads
        "--dump-json".to_string(),
        "--no-simulate".to_string(),
        "--progress".to_string(),
        "--newline".to_string(),
        "--no-playlist".to_string(),
        "--progress-template".to_string(),
        PROGRESS_TEMPLATE.to_string(),
        "--output".to_string(),
        options.output_template.clone(),
        "--format".to_string(),
        options.format.clone(),
    ];

    if options.quiet {
        args.push("--quiet".to_string());
    }
    if options.no_warnings {
        args.push("--no-warnings".to_string());
    }
    if let Some(container) = options.merge_output_format {
        args.push("--merge-output-format".to_string());
        args.push(container.to_string());
    }
    if let Some(container) = options.remux_video {
        args.push("--remux-video".to_string());
        args.push(container.to_string());
    }
    if let Some(audio) = &options.audio {
        args.push("--extract-audio".to_string());
        args.push("--audio-format".to_string());
        args.push(audio.codec.to_string());
        args.push("--audio-quality".to_string());
        args.push(format!("{}K", audio.bitrate_kbps));
    }

    args.push(url.to_string());
    args
}

/// Parses a line printed through `PROGRESS_TEMPLATE`. yt-dlp prints `NA` for unknown fields.
pub fn parse_progress_line(line: &str) -> Option<ProgressSample> {
    let mut fields = line.split_whitespace();
    if fields.next()? != PROGRESS_MARKER {
        return None;
    }

    let status = ProgressStatus::parse(fields.next()?);
    let downloaded_bytes = fields.next().and_then(parse_byte_count).unwrap_or(0);
    let total_bytes = fields.next().and_then(parse_byte_count);

    Some(ProgressSample {
        status,
        downloaded_bytes,
        total_bytes,
    })
}

fn parse_byte_count(field: &str) -> Option<u64> {
    field.parse::<u64>().ok().or_else(|| {
        field
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n as u64)
    })
}

/// Accumulates what a download run prints on stdout and stderr.
#[derive(Debug, Default)]
struct DownloadOutput {
    info: Option<Value>,
    diagnostics: Vec<String>,
}

impl DownloadOutput {
    fn consume(&mut self, line: &str, progress: &dyn ProgressSink) {
        if let Some(sample) = parse_progress_line(line) {
            progress.on_progress(&sample);
            return;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }
        if trimmed.starts_with('{') {
            match serde_json::from_str::<Value>(trimmed) {
                Ok(info) => {
                    self.info = Some(info);
                    return;
                }
                Err(e) => debug!("Ignoring unparseable JSON line from yt-dlp: {}", e),
            }
        }
        self.diagnostics.push(trimmed.to_string());
    }

    fn error_message(&self) -> String {
        if self.diagnostics.is_empty() {
            "yt-dlp exited without an error message".to_string()
        } else {
            self.diagnostics.join("\n")
        }
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn extract_info(&self, url: &str) -> Result<Value> {
        debug!("Extracting metadata with yt-dlp for: {}", url);

        let output = tokio::time::timeout(
            self.info_timeout,
            Command::new(&self.binary)
                .args(info_args(url))
                .kill_on_drop(true)
                .output(),
        )
        .await
        .context("Media metadata extraction timed out")?
        .context("Failed to extract media metadata")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!(
                "Media metadata extraction failed: {}",
                error.trim()
            ));
        }

        let json_str = String::from_utf8_lossy(&output.stdout);
        debug!("yt-dlp JSON output: {} bytes", json_str.len());

        serde_json::from_str(&json_str).context("Failed to parse media metadata")
    }

    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        progress: &dyn ProgressSink,
    ) -> Result<Value> {
        info!("Downloading media with yt-dlp: {} ({})", url, options.format);

        let mut command = Command::new(&self.binary);
        command
            .args(download_args(url, options))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // yt-dlp leads its own group so the guard can take ffmpeg down with it
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().context("Failed to spawn yt-dlp")?;
        let mut group = ProcessGroupGuard::new(child.id());

        let stdout = child.stdout.take().context("Failed to get yt-dlp stdout")?;
        let stderr = child.stderr.take().context("Failed to get yt-dlp stderr")?;

        let run = async {
            let mut stdout_lines = BufReader::new(stdout).lines();
            let mut stderr_lines = BufReader::new(stderr).lines();
            let (mut stdout_done, mut stderr_done) = (false, false);
            let mut output = DownloadOutput::default();

            // Progress goes to stderr when yt-dlp is quiet, the info record to stdout.
            while !(stdout_done && stderr_done) {
                tokio::select! {
                    line = stdout_lines.next_line(), if !stdout_done => {
                        match line.context("Failed to read yt-dlp stdout")? {
                            Some(line) => output.consume(&line, progress),
                            None => stdout_done = true,
                        }
                    }
                    line = stderr_lines.next_line(), if !stderr_done => {
                        match line.context("Failed to read yt-dlp stderr")? {
                            Some(line) => output.consume(&line, progress),
                            None => stderr_done = true,
                        }
                    }
                }
            }

            let status = child.wait().await.context("Failed to wait for yt-dlp")?;
            Ok::<_, anyhow::Error>((status, output))
        };

        let (status, output) = match self.download_timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .context("Media download timed out")??,
            None => run.await?,
        };
        group.disarm();

        if !status.success() {
            return Err(anyhow::anyhow!(
                "Media download failed: {}",
                output.error_message()
            ));
        }

        output
            .info
            .context("yt-dlp finished without reporting media info")
    }

    async fn test_availability(&self) -> bool {
        let yt_dlp_available = match Self::tool_version(&self.binary, "--version").await {
            Some(version) => {
                info!("✅ yt-dlp is available, version: {}", version);
                true
            }
            None => false,
        };

        // ffmpeg is required for merging and mp3 transcoding
        let ffmpeg_available = match Self::tool_version(&self.ffmpeg, "-version").await {
            Some(version_line) => {
                info!("✅ ffmpeg is available: {}", version_line);
                true
            }
            None => false,
        };

        if yt_dlp_available && !ffmpeg_available {
            warn!("⚠️  yt-dlp will work but merging and audio extraction will fail");
        }

        yt_dlp_available && ffmpeg_available
    }
}

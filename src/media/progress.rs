use serde::Serialize;
use std::sync::Mutex;
use tracing::debug;

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Downloading,
    Finished,
    Error,
    Other,
}

impl ProgressStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "downloading" => Self::Downloading,
            "finished" => Self::Finished,
            "error" => Self::Error,
            _ => Self::Other,
        }
    }
}

/// One progress report from the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    pub status: ProgressStatus,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
}

/// Receives progress samples while a retrieval runs.
///
/// Called inline from the extractor's output loop, so implementations must
/// return quickly and must not panic.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, sample: &ProgressSample);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressView {
    pub fraction: f64,
    pub status_line: String,
}

impl ProgressView {
    /// Returns `None` unless the sample is a download with a known total.
    pub fn from_sample(sample: &ProgressSample) -> Option<Self> {
        if sample.status != ProgressStatus::Downloading {
            return None;
        }
        let total = sample.total_bytes.filter(|total| *total > 0)?;
        let fraction = (sample.downloaded_bytes as f64 / total as f64).clamp(0.0, 1.0);

        Some(Self {
            fraction,
            status_line: format!(
                "Downloading: {} ({} / {})",
                format_percent(fraction),
                format_size(sample.downloaded_bytes),
                format_size(total)
            ),
        })
    }
}

/// Keeps the latest progress view for a session; the indicator holds its
/// last value when samples carry no usable total.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    view: Mutex<ProgressView>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ProgressView {
        match self.view.lock() {
            Ok(view) => view.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn reset(&self) {
        self.store(ProgressView::default());
    }

    fn store(&self, next: ProgressView) {
        match self.view.lock() {
            Ok(mut view) => *view = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

impl ProgressSink for ProgressReporter {
    fn on_progress(&self, sample: &ProgressSample) {
        if let Some(view) = ProgressView::from_sample(sample) {
            debug!("{}", view.status_line);
            self.store(view);
        }
    }
}

pub fn format_percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// Human-readable size in binary units with two decimals, e.g. `1.50 KB`.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;

    while size >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{:.2} {}", size, SIZE_UNITS[unit])
}

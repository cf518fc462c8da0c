use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoMetadata {
    pub title: String,
    pub duration_seconds: u64,
    pub channel: String,
    pub view_count: u64,
    pub thumbnail_url: String,
    pub extension: String,
}

impl VideoMetadata {
    /// Maps a raw extractor record, filling in defaults for missing fields.
    pub fn from_info(info: &Value) -> Self {
        Self {
            title: info["title"]
                .as_str()
                .filter(|title| !title.trim().is_empty())
                .unwrap_or(RetrievalMode::VIDEO_DEFAULT_TITLE)
                .to_string(),
            duration_seconds: info["duration"]
                .as_f64()
                .filter(|d| d.is_finite() && *d > 0.0)
                .map(|d| d as u64)
                .unwrap_or(0),
            channel: info["channel"]
                .as_str()
                .or(info["uploader"].as_str())
                .unwrap_or_default()
                .to_string(),
            view_count: info["view_count"].as_u64().unwrap_or(0),
            thumbnail_url: info["thumbnail"].as_str().unwrap_or_default().to_string(),
            extension: info["ext"].as_str().unwrap_or("mp4").to_string(),
        }
    }
}

#[derive(Debug)]
pub struct RetrievedMedia {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    #[default]
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    Video(Quality),
    Audio,
}

impl RetrievalMode {
    pub const VIDEO_DEFAULT_TITLE: &'static str = "video";
    pub const AUDIO_DEFAULT_TITLE: &'static str = "audio";

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Video(_) => "mp4",
            Self::Audio => "mp3",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Video(_) => "video/mp4",
            Self::Audio => "audio/mp3",
        }
    }

    pub fn default_title(&self) -> &'static str {
        match self {
            Self::Video(_) => Self::VIDEO_DEFAULT_TITLE,
            Self::Audio => Self::AUDIO_DEFAULT_TITLE,
        }
    }
}

/// Post-processing step that extracts and transcodes the audio track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPostprocess {
    pub codec: &'static str,
    pub bitrate_kbps: u32,
}

/// Options handed to the extractor in download mode.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub output_template: String,
    pub format: String,
    pub merge_output_format: Option<&'static str>,
    pub remux_video: Option<&'static str>,
    pub audio: Option<AudioPostprocess>,
    pub quiet: bool,
    pub no_warnings: bool,
}

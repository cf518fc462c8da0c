use super::types::{AudioPostprocess, DownloadOptions, Quality, RetrievalMode};

pub const AUDIO_BITRATE_KBPS: u32 = 192;

/// yt-dlp format selector for a retrieval mode. Alternatives are tried left to right.
pub fn format_selector(mode: RetrievalMode) -> &'static str {
    match mode {
        RetrievalMode::Video(Quality::High) => "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
        RetrievalMode::Video(Quality::Medium) => {
            "bestvideo[height<=720][ext=mp4]+bestaudio[ext=m4a]/best[height<=720][ext=mp4]/best[height<=720]/best"
        }
        RetrievalMode::Video(Quality::Low) => "worstvideo[ext=mp4]+worstaudio[ext=m4a]/worst[ext=mp4]/worst",
        RetrievalMode::Audio => "bestaudio/best",
    }
}

pub fn download_options(mode: RetrievalMode, output_template: String) -> DownloadOptions {
    // Merging only applies to split streams; remuxing also covers a single-file fallback.
    let (merge_output_format, remux_video, audio) = match mode {
        RetrievalMode::Video(_) => (Some("mp4"), Some("mp4"), None),
        RetrievalMode::Audio => (
            None,
            None,
            Some(AudioPostprocess {
                codec: "mp3",
                bitrate_kbps: AUDIO_BITRATE_KBPS,
            }),
        ),
    };

    DownloadOptions {
        output_template,
        format: format_selector(mode).to_string(),
        merge_output_format,
        remux_video,
        audio,
        quiet: true,
        no_warnings: true,
    }
}

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Anchored at the start only; trailing query parameters are tolerated.
    static ref YOUTUBE_URL_RE: Regex = Regex::new(
        r"^(https?://)?(www\.)?(youtube|youtu|youtube-nocookie)\.(com|be)/(watch\?v=|embed/|v/|.+\?v=)?([^&=%\?]{11})"
    )
    .unwrap();
}

/// Returns true when `url` looks like a video link the extractor understands.
pub fn validate_youtube_url(url: &str) -> bool {
    YOUTUBE_URL_RE.is_match(url)
}

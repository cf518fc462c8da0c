use super::{
    page,
    session::SessionStore,
};
use crate::{
    error::AppError,
    media::{MediaService, ProgressView, Quality, RetrievalMode, VideoMetadata},
};
use axum::{
    extract::{Path, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub media: Arc<MediaService>,
    pub sessions: Arc<SessionStore>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
    html: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Fetch(_) | AppError::Retrieval(_) => StatusCode::BAD_GATEWAY,
        };
        let body = ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
            html: page::render_error(&self),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct InfoRequest {
    session: Uuid,
    url: String,
}

#[derive(Debug, Serialize)]
struct InfoResponse {
    metadata: VideoMetadata,
    panel: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ModeChoice {
    Video,
    Audio,
}

#[derive(Debug, Deserialize)]
struct DownloadRequest {
    session: Uuid,
    mode: ModeChoice,
    #[serde(default)]
    quality: Option<Quality>,
}

impl DownloadRequest {
    fn retrieval_mode(&self) -> RetrievalMode {
        match self.mode {
            ModeChoice::Video => RetrievalMode::Video(self.quality.unwrap_or_default()),
            ModeChoice::Audio => RetrievalMode::Audio,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/info", post(fetch_info))
        .route("/api/download", post(download))
        .route("/api/progress/{session}", get(progress))
        .route("/api/session/{session}/end", post(end_session))
        .route("/api/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let (id, _) = state.sessions.create();
    Html(page::render_page(&id))
}

async fn fetch_info(
    State(state): State<AppState>,
    Json(request): Json<InfoRequest>,
) -> Result<Json<InfoResponse>, AppError> {
    let handle = state.sessions.get(&request.session)?;
    let mut session = handle.session.lock().await;

    let metadata = session
        .submit_url(&state.media, &request.url)
        .await
        .inspect_err(|e| warn!("Info request failed: {}", e))?
        .clone();

    Ok(Json(InfoResponse {
        panel: page::render_metadata_panel(&metadata),
        metadata,
    }))
}

async fn download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Result<Response, AppError> {
    let handle = state.sessions.get(&request.session)?;
    let session = handle.session.lock().await;

    let media = session
        .download(&state.media, request.retrieval_mode(), &handle.progress)
        .await
        .inspect_err(|e| warn!("Download request failed: {}", e))?;
    drop(session);

    info!("Serving {} ({} bytes)", media.filename, media.bytes.len());

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(media.mime_type));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(media.bytes.len()));
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&content_disposition(&media.filename))
            .map_err(|_| AppError::Retrieval("Could not build download header".to_string()))?,
    );
    headers.insert(
        HeaderName::from_static("x-download-filename"),
        HeaderValue::from_str(&urlencoding::encode(&media.filename))
            .map_err(|_| AppError::Retrieval("Could not build download header".to_string()))?,
    );

    Ok((headers, media.bytes).into_response())
}

async fn progress(
    State(state): State<AppState>,
    Path(session): Path<Uuid>,
) -> Result<Json<ProgressView>, AppError> {
    let handle = state.sessions.get(&session)?;
    Ok(Json(handle.progress.snapshot()))
}

async fn end_session(State(state): State<AppState>, Path(session): Path<Uuid>) -> StatusCode {
    state.sessions.remove(&session);
    StatusCode::NO_CONTENT
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let available = state.media.test_setup().await;
    Json(serde_json::json!({
        "status": if available { "ok" } else { "degraded" },
        "extractor_available": available,
    }))
}

fn content_disposition(filename: &str) -> String {
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii_filename(filename),
        urlencoding::encode(filename)
    )
}

fn ascii_filename(value: &str) -> String {
    let sanitized: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = sanitized.trim();
    if trimmed.is_empty() {
        "download".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::YtDlpConfig;
    use crate::media::testing::{FakeDownload, FakeExtractor};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    struct Harness {
        app: Router,
        sessions: Arc<SessionStore>,
        _scratch: tempfile::TempDir,
    }

    fn harness(extractor: FakeExtractor) -> Harness {
        let scratch = tempfile::tempdir().unwrap();
        let config = YtDlpConfig {
            scratch_dir: Some(scratch.path().to_path_buf()),
            ..YtDlpConfig::default()
        };
        let sessions = Arc::new(SessionStore::new(Duration::from_secs(60)));
        let state = AppState {
            media: Arc::new(MediaService::with_extractor(Box::new(extractor), &config)),
            sessions: sessions.clone(),
        };
        Harness {
            app: router(state),
            sessions,
            _scratch: scratch,
        }
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_index_creates_session() {
        let h = harness(FakeExtractor::with_info(json!({})));
        let response = h
            .app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let page = String::from_utf8_lossy(&bytes);
        let start = page.find("data-session=\"").unwrap() + "data-session=\"".len();
        let id: Uuid = page[start..start + 36].parse().unwrap();
        assert!(h.sessions.get(&id).is_ok());
    }

    #[tokio::test]
    async fn test_info_renders_panel() {
        let h = harness(FakeExtractor::with_info(json!({
            "title": "clip",
            "duration": 75,
            "view_count": 1234,
        })));
        let (id, _) = h.sessions.create();

        let response = h
            .app
            .oneshot(post_json("/api/info", json!({"session": id, "url": URL})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["metadata"]["title"], "clip");
        let panel = body["panel"].as_str().unwrap();
        assert!(panel.contains("1:15"));
        assert!(panel.contains("1,234"));
    }

    #[tokio::test]
    async fn test_info_with_invalid_url() {
        let h = harness(FakeExtractor::with_info(json!({})));
        let (id, _) = h.sessions.create();

        let response = h
            .app
            .oneshot(post_json("/api/info", json!({"session": id, "url": "not a url"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["kind"], "validation");
    }

    #[tokio::test]
    async fn test_failed_fetch_renders_no_panel_and_keeps_no_state() {
        let h = harness(FakeExtractor::failing_info("Video unavailable"));
        let (id, handle) = h.sessions.create();

        let response = h
            .app
            .clone()
            .oneshot(post_json("/api/info", json!({"session": id, "url": URL})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = json_body(response).await;
        assert_eq!(body["kind"], "fetch");
        assert!(body.get("panel").is_none());
        assert!(body["html"]
            .as_str()
            .unwrap()
            .contains("An error occurred"));
        assert!(handle.session.lock().await.metadata().is_none());

        // a download now has nothing to act on
        let response = h
            .app
            .oneshot(post_json(
                "/api/download",
                json!({"session": id, "mode": "audio"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_download_returns_attachment() {
        let h = harness(FakeExtractor::new(
            Ok(json!({"title": "Día/Noche"})),
            FakeDownload::writes("mp4", b"movie", json!({"title": "Día/Noche"})),
        ));
        let (id, handle) = h.sessions.create();

        let response = h
            .app
            .clone()
            .oneshot(post_json("/api/info", json!({"session": id, "url": URL})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = h
            .app
            .clone()
            .oneshot(post_json(
                "/api/download",
                json!({"session": id, "mode": "video", "quality": "medium"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "video/mp4");
        let disposition = response.headers()[CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename=\"D_a_Noche.mp4\""));
        assert!(disposition.contains("filename*=UTF-8''D%C3%ADa_Noche.mp4"));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"movie");

        assert_eq!(handle.progress.snapshot().fraction, 1.0);

        let response = h
            .app
            .oneshot(
                Request::get(format!("/api/progress/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["fraction"], 1.0);
    }

    #[tokio::test]
    async fn test_download_failure_is_retrieval_error() {
        let h = harness(FakeExtractor::new(
            Ok(json!({"title": "clip"})),
            FakeDownload::fails_after_partial("ffprobe and ffmpeg not found"),
        ));
        let (id, _) = h.sessions.create();

        h.app
            .clone()
            .oneshot(post_json("/api/info", json!({"session": id, "url": URL})))
            .await
            .unwrap();
        let response = h
            .app
            .oneshot(post_json(
                "/api/download",
                json!({"session": id, "mode": "audio"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = json_body(response).await;
        assert_eq!(body["kind"], "retrieval");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("ffmpeg not found"));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let h = harness(FakeExtractor::with_info(json!({})));
        let response = h
            .app
            .oneshot(post_json(
                "/api/info",
                json!({"session": Uuid::new_v4(), "url": URL}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_end_session() {
        let h = harness(FakeExtractor::with_info(json!({})));
        let (id, _) = h.sessions.create();

        let response = h
            .app
            .oneshot(
                Request::post(format!("/api/session/{id}/end"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(h.sessions.get(&id).is_err());
    }

    #[test]
    fn test_retrieval_mode_defaults_to_high() {
        let request: DownloadRequest = serde_json::from_value(json!({
            "session": Uuid::new_v4(),
            "mode": "video",
        }))
        .unwrap();
        assert_eq!(request.retrieval_mode(), RetrievalMode::Video(Quality::High));

        let request: DownloadRequest = serde_json::from_value(json!({
            "session": Uuid::new_v4(),
            "mode": "audio",
            "quality": "low",
        }))
        .unwrap();
        assert_eq!(request.retrieval_mode(), RetrievalMode::Audio);
    }

    #[test]
    fn test_ascii_filename() {
        assert_eq!(ascii_filename("clip (1).mp4"), "clip (1).mp4");
        assert_eq!(ascii_filename("\"quoted\".mp3"), "_quoted_.mp3");
        assert_eq!(ascii_filename("   "), "download");
    }
}

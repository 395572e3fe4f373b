//! REST API routes for the media server
//!
//! Provides the upload, listing and playback endpoints, and mounts static
//! files (or the dev proxy) for every other path.

use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, Request, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

use super::proxy::{proxy_to_dev_server, DevProxy};
use super::DEFAULT_READ_TIMEOUT_SECS;
use super::response::{
    json_response, ApiError, MSG_GET_FILE, MSG_PARSE_FORM, MSG_READ_VIDEOS, MSG_SAVE_FILE,
    MSG_VIDEO_NOT_FOUND,
};
use crate::storage::{sanitize_original_name, PendingUpload, Recording, RecordingStore};

/// Multipart field holding the uploaded video
pub const VIDEO_FIELD: &str = "video";

/// Success message for uploads
pub const UPLOAD_SUCCESS_MESSAGE: &str = "Video uploaded successfully";

/// Application state shared across handlers
#[derive(Debug, Clone)]
pub struct AppState {
    /// Recording storage
    pub store: RecordingStore,
    /// Root for static assets in production
    pub static_dir: PathBuf,
    /// Dev server proxy, set only in dev mode
    pub dev_proxy: Option<DevProxy>,
    /// Deadline for receiving a whole upload body
    pub read_timeout: Duration,
}

impl AppState {
    /// State for production mode
    pub fn new(store: RecordingStore, static_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            static_dir: static_dir.into(),
            dev_proxy: None,
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
        }
    }

    /// Limit the time an upload body may take to arrive
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Forward non-API requests to the dev server
    pub fn with_dev_proxy(mut self, proxy: DevProxy) -> Self {
        self.dev_proxy = Some(proxy);
        self
    }
}

/// Build the API router
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(upload_video))
        .route("/videos", get(list_videos))
        .route("/videos/{filename}/stream", get(stream_video))
}

/// Build the full application router.
///
/// `upload_limit` caps the request body read by the multipart parser.
pub fn app_router(state: Arc<AppState>, upload_limit: usize) -> Router {
    let router = Router::new()
        .nest("/api", api_routes())
        .layer(DefaultBodyLimit::max(upload_limit));

    let router = if state.dev_proxy.is_some() {
        router.fallback(proxy_to_dev_server)
    } else {
        router.fallback_service(ServeDir::new(&state.static_dir))
    };

    router.with_state(state)
}

// ============================================================
// Upload
// ============================================================

/// Upload response
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
}

/// Accept a multipart upload with a `video` file part.
///
/// The whole form is read before anything is stored, so a malformed or
/// oversized body never leaves a recording behind. The form must arrive
/// within the read timeout in total, however it is paced.
async fn upload_video(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let multipart = multipart.map_err(|e| {
        warn!(error = %e, "rejected upload body");
        ApiError::BadRequest(MSG_PARSE_FORM)
    })?;

    let read = read_upload_form(&state.store, multipart);
    let staged = tokio::time::timeout(state.read_timeout, read)
        .await
        .map_err(|_| {
            warn!(timeout = ?state.read_timeout, "upload body not received in time");
            ApiError::BadRequest(MSG_PARSE_FORM)
        })??;

    let Some((upload, original_name)) = staged else {
        return Err(ApiError::BadRequest(MSG_GET_FILE));
    };

    let size = upload.bytes_written();
    let timestamp = chrono::Utc::now().timestamp();
    let recording = upload.commit(&original_name, timestamp).await.map_err(|e| {
        warn!(error = %e, "cannot store upload");
        ApiError::Internal(MSG_SAVE_FILE)
    })?;

    info!(filename = %recording.filename, size, "stored recording");

    Ok(json_response(
        StatusCode::OK,
        &UploadResponse {
            message: UPLOAD_SUCCESS_MESSAGE.to_string(),
            filename: recording.filename,
        },
    ))
}

/// Read the whole form, staging the first usable `video` file part.
///
/// Dropping the returned future mid-read discards the staging file.
async fn read_upload_form(
    store: &RecordingStore,
    mut multipart: Multipart,
) -> Result<Option<(PendingUpload, String)>, ApiError> {
    let mut staged: Option<(PendingUpload, String)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "failed to parse upload form");
                return Err(ApiError::BadRequest(MSG_PARSE_FORM));
            }
        };

        if staged.is_some() || field.name() != Some(VIDEO_FIELD) {
            continue;
        }
        let Some(original_name) = field.file_name().and_then(sanitize_original_name) else {
            continue;
        };

        let mut upload = store.begin_upload().map_err(|e| {
            warn!(error = %e, "cannot stage upload");
            ApiError::Internal(MSG_SAVE_FILE)
        })?;

        let mut field = field;
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => upload.write_chunk(&chunk).await.map_err(|e| {
                    warn!(error = %e, "cannot write upload");
                    ApiError::Internal(MSG_SAVE_FILE)
                })?,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "upload body ended early");
                    return Err(ApiError::BadRequest(MSG_PARSE_FORM));
                }
            }
        }

        staged = Some((upload, original_name));
    }

    Ok(staged)
}

// ============================================================
// Listing
// ============================================================

/// One entry of the listing response
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct VideoEntry {
    pub filename: String,
    /// Unix seconds, as a decimal string
    pub timestamp: String,
}

impl From<Recording> for VideoEntry {
    fn from(recording: Recording) -> Self {
        Self {
            filename: recording.filename,
            timestamp: recording.last_modified.to_string(),
        }
    }
}

/// List stored recordings
async fn list_videos(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let recordings = state.store.list().await.map_err(|e| {
        warn!(error = %e, "cannot list recordings");
        ApiError::Internal(MSG_READ_VIDEOS)
    })?;

    let entries: Vec<VideoEntry> = recordings.into_iter().map(VideoEntry::from).collect();
    Ok(json_response(StatusCode::OK, &entries))
}

// ============================================================
// Playback
// ============================================================

/// Serve a stored recording, with range support
async fn stream_video(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    req: Request,
) -> Result<Response, ApiError> {
    let path = state
        .store
        .locate(&filename)
        .await
        .ok_or(ApiError::NotFound(MSG_VIDEO_NOT_FOUND))?;

    match ServeFile::new(path).oneshot(req).await {
        Ok(response) => Ok(response.map(Body::new)),
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::{header, Request as HttpRequest};
    use tempfile::{tempdir, TempDir};

    const BOUNDARY: &str = "kiosk-test-boundary";

    fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: video/webm\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> HttpRequest<Body> {
        HttpRequest::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn test_app(limit: usize) -> (TempDir, Router) {
        let temp = tempdir().unwrap();
        let store = RecordingStore::open(temp.path().join("uploads")).unwrap();
        let state = AppState::new(store, temp.path().join("static"));
        (temp, app_router(Arc::new(state), limit))
    }

    async fn json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn stored_files(temp: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(temp.path().join("uploads"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_upload_success() {
        let (temp, app) = test_app(1024 * 1024);
        let data = vec![7u8; 4096];

        let response = app
            .oneshot(upload_request(multipart_body(&[("video", Some("take.webm"), &data)])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["message"], "Video uploaded successfully");

        let filename = body["filename"].as_str().unwrap().to_string();
        assert!(filename.starts_with("video_"));
        assert!(filename.ends_with("_take.webm"));

        let stored = std::fs::read(temp.path().join("uploads").join(&filename)).unwrap();
        assert_eq!(stored, data);
        assert_eq!(stored_files(&temp), vec![filename]);
    }

    #[tokio::test]
    async fn test_upload_strips_directories_from_filename() {
        let (temp, app) = test_app(1024 * 1024);

        let response = app
            .oneshot(upload_request(multipart_body(&[(
                "video",
                Some("../../escape.mp4"),
                b"data",
            )])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        let filename = body["filename"].as_str().unwrap();
        assert!(filename.ends_with("_escape.mp4"));
        assert!(!filename.contains('/'));
        assert_eq!(stored_files(&temp).len(), 1);
    }

    #[tokio::test]
    async fn test_upload_missing_video_field() {
        let (temp, app) = test_app(1024 * 1024);

        let response = app
            .oneshot(upload_request(multipart_body(&[(
                "clip",
                Some("take.webm"),
                b"data",
            )])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"], "Failed to get file");
        assert!(stored_files(&temp).is_empty());
    }

    #[tokio::test]
    async fn test_upload_video_field_without_filename() {
        let (temp, app) = test_app(1024 * 1024);

        let response = app
            .oneshot(upload_request(multipart_body(&[("video", None, b"data")])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"], "Failed to get file");
        assert!(stored_files(&temp).is_empty());
    }

    #[tokio::test]
    async fn test_upload_over_limit() {
        let (temp, app) = test_app(1024);
        let data = vec![1u8; 8 * 1024];

        let response = app
            .oneshot(upload_request(multipart_body(&[("video", Some("big.webm"), &data)])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"], "Failed to parse form");
        assert!(stored_files(&temp).is_empty());
    }

    #[tokio::test]
    async fn test_upload_not_multipart() {
        let (temp, app) = test_app(1024 * 1024);
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/api/upload")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"], "Failed to parse form");
        assert!(stored_files(&temp).is_empty());
    }

    #[tokio::test]
    async fn test_upload_truncated_body() {
        let (temp, app) = test_app(1024 * 1024);
        let mut body = multipart_body(&[("video", Some("take.webm"), b"some data")]);
        body.truncate(body.len() - 30);

        let response = app.oneshot(upload_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"], "Failed to parse form");
        assert!(stored_files(&temp).is_empty());
    }

    #[tokio::test]
    async fn test_upload_storage_gone() {
        let (temp, app) = test_app(1024 * 1024);
        std::fs::remove_dir(temp.path().join("uploads")).unwrap();

        let response = app
            .oneshot(upload_request(multipart_body(&[("video", Some("take.webm"), b"x")])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(response).await["error"], "Failed to save file");
    }

    #[tokio::test]
    async fn test_list_empty() {
        let (_temp, app) = test_app(1024);

        let response = app.oneshot(get("/api/videos")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_list_sorted_with_string_timestamps() {
        let (temp, app) = test_app(1024);
        let uploads = temp.path().join("uploads");
        std::fs::write(uploads.join("video_20_b.webm"), b"b").unwrap();
        std::fs::write(uploads.join("video_10_a.webm"), b"a").unwrap();
        std::fs::create_dir(uploads.join("subdir")).unwrap();

        let response = app.oneshot(get("/api/videos")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["filename"], "video_10_a.webm");
        assert_eq!(entries[1]["filename"], "video_20_b.webm");
        for entry in entries {
            let timestamp = entry["timestamp"].as_str().unwrap();
            assert!(timestamp.parse::<i64>().is_ok());
        }
    }

    #[tokio::test]
    async fn test_list_directory_deleted() {
        let (temp, app) = test_app(1024);
        std::fs::remove_dir(temp.path().join("uploads")).unwrap();

        let response = app.oneshot(get("/api/videos")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(response).await["error"], "Failed to read videos");
    }

    #[tokio::test]
    async fn test_stream_video() {
        let (temp, app) = test_app(1024);
        std::fs::write(temp.path().join("uploads").join("video_1_a.webm"), b"0123456789").unwrap();

        let response = app
            .clone()
            .oneshot(get("/api/videos/video_1_a.webm/stream"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"0123456789");

        let ranged = HttpRequest::builder()
            .uri("/api/videos/video_1_a.webm/stream")
            .header(header::RANGE, "bytes=2-4")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(ranged).await.unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"234");
    }

    #[tokio::test]
    async fn test_stream_unknown_video() {
        let (_temp, app) = test_app(1024);

        let response = app
            .oneshot(get("/api/videos/video_9_none.webm/stream"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(response).await["error"], "Video not found");
    }

    #[tokio::test]
    async fn test_static_files_and_missing_asset() {
        let (temp, app) = test_app(1024);
        let static_dir = temp.path().join("static");
        std::fs::create_dir_all(&static_dir).unwrap();
        std::fs::write(static_dir.join("index.html"), "<h1>kiosk</h1>").unwrap();

        let response = app.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<h1>kiosk</h1>");

        let response = app.oneshot(get("/missing.js")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_method_on_upload() {
        let (_temp, app) = test_app(1024);
        let response = app.oneshot(get("/api/upload")).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}

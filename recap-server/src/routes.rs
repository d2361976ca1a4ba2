use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        DefaultBodyLimit, FromRef, FromRequest, Multipart, Request, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use recap::{
    Artifact, ArtifactKind, AudioExtractor, Cleanup, CompletionClient, Downloader, Pipeline,
    Source, Transcriber,
};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tower_http::{cors::CorsLayer, services::ServeFile, trace::TraceLayer};
use tracing::info;
use uuid::Uuid;

/// Error body returned for every failed request.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<recap::Error> for ApiError {
    fn from(e: recap::Error) -> Self {
        let status = if e.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        recap::Error::Io(e).into()
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

/// Settings for [`router`] that live outside the pipeline.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub body_limit: usize,
    /// Uploads are streamed here before the pipeline takes them over.
    pub upload_dir: PathBuf,
    pub index_file: PathBuf,
}

pub struct AppState<D, X, T, C> {
    pipeline: Pipeline<D, X, T, C>,
    staging: UploadStaging,
}

#[derive(Debug, Clone)]
pub struct UploadStaging(PathBuf);

impl<D, X, T, C> FromRef<Arc<AppState<D, X, T, C>>> for UploadStaging {
    fn from_ref(state: &Arc<AppState<D, X, T, C>>) -> Self {
        state.staging.clone()
    }
}

#[derive(Debug, Serialize)]
struct SummarizeResponse {
    success: bool,
    transcript: String,
    summary: String,
}

#[derive(Debug, Deserialize)]
struct JsonBody {
    #[serde(default)]
    youtube_url: Option<String>,
    #[serde(default)]
    use_openai: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct UrlencodedBody {
    #[serde(default)]
    youtube_url: Option<String>,
    #[serde(default)]
    use_openai: Option<String>,
}

fn is_true(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// `null`, `false`, zero and empty values are false; strings must read "true".
fn truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;

    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => is_true(s),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Body of `POST /api/summarize`: JSON, a multipart form or a urlencoded form.
///
/// A streamed upload is registered with `staged` so it is removed if the
/// pipeline never adopts it.
#[derive(Debug, Default)]
pub struct SummarizeForm {
    youtube_url: Option<String>,
    video_file: Option<(String, PathBuf)>,
    use_openai: bool,
    staged: Cleanup,
}

impl SummarizeForm {
    /// A non-empty URL wins over an upload; neither is a validation error.
    fn into_request(self) -> recap::Result<(recap::Request, Cleanup)> {
        let SummarizeForm {
            youtube_url,
            video_file,
            use_openai,
            staged,
        } = self;

        let url = youtube_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        let source = match (url, video_file) {
            (Some(url), _) => Source::Url(url),
            (None, Some((file_name, path))) => Source::StagedUpload { file_name, path },
            (None, None) => return Err(recap::Error::MissingSource),
        };

        Ok((recap::Request { source, use_openai }, staged))
    }

    async fn from_multipart(mut multipart: Multipart, staging_dir: &Path) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(mut field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "youtube_url" => form.youtube_url = Some(field.text().await?),
                "use_openai" => form.use_openai = is_true(&field.text().await?),
                "video_file" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    if file_name.is_empty() {
                        continue;
                    }
                    let path = stream_to_disk(&mut field, staging_dir, &mut form.staged).await?;
                    form.video_file = Some((file_name, path));
                }
                _ => {}
            }
        }
        Ok(form)
    }
}

/// Write a file part chunk by chunk into `dir`, never holding it in memory.
async fn stream_to_disk(
    field: &mut Field<'_>,
    dir: &Path,
    staged: &mut Cleanup,
) -> Result<PathBuf, ApiError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!(".incoming-{}", Uuid::new_v4()));
    staged.register(Artifact::new(&path, ArtifactKind::Video));

    let mut file = tokio::fs::File::create(&path).await?;
    let mut written: u64 = 0;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    info!(path = %path.display(), bytes = written, "staged upload");
    Ok(path)
}

impl<S> FromRequest<S> for SummarizeForm
where
    S: Send + Sync,
    UploadStaging: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request(mut req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let UploadStaging(staging_dir) = UploadStaging::from_ref(state);
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| recap::Error::InvalidRequest(e.body_text()))?;
            return Self::from_multipart(multipart, &staging_dir).await;
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            // the form extractor matches the media type case-sensitively
            req.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            );
            let Form(body) = Form::<UrlencodedBody>::from_request(req, state)
                .await
                .map_err(|e| recap::Error::InvalidRequest(e.body_text()))?;
            return Ok(Self {
                youtube_url: body.youtube_url,
                use_openai: body.use_openai.as_deref().is_some_and(is_true),
                ..Self::default()
            });
        }

        let Json(body) = Json::<JsonBody>::from_request(req, state)
            .await
            .map_err(|e| recap::Error::InvalidRequest(e.body_text()))?;
        Ok(Self {
            youtube_url: body.youtube_url,
            use_openai: body.use_openai.as_ref().is_some_and(truthy),
            ..Self::default()
        })
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn summarize<D, X, T, C>(
    State(state): State<Arc<AppState<D, X, T, C>>>,
    form: SummarizeForm,
) -> Result<Json<SummarizeResponse>, ApiError>
where
    D: Downloader + Send + Sync + 'static,
    X: AudioExtractor + Send + Sync + 'static,
    T: Transcriber + Send + Sync + 'static,
    C: CompletionClient + Send + Sync + 'static,
{
    let (request, staged) = form.into_request()?;
    let from_url = matches!(request.source, Source::Url(_));
    info!(from_url, use_openai = request.use_openai, "summarize request");

    let outcome = state.pipeline.run(request).await;
    staged.finish().await;

    let digest = outcome?;
    Ok(Json(SummarizeResponse {
        success: true,
        transcript: digest.transcript,
        summary: digest.summary,
    }))
}

pub fn router<D, X, T, C>(pipeline: Pipeline<D, X, T, C>, options: RouterOptions) -> Router
where
    D: Downloader + Send + Sync + 'static,
    X: AudioExtractor + Send + Sync + 'static,
    T: Transcriber + Send + Sync + 'static,
    C: CompletionClient + Send + Sync + 'static,
{
    let state = Arc::new(AppState {
        pipeline,
        staging: UploadStaging(options.upload_dir),
    });

    Router::new()
        .route_service("/", ServeFile::new(options.index_file))
        .route("/api/health", get(health))
        .route("/api/summarize", post(summarize::<D, X, T, C>))
        .layer(DefaultBodyLimit::max(options.body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use axum::body::Body;
    use recap::audio::audio_path_for;
    use recap::{
        Error, Preset, Result, Segment, SourceResolver, Summarizer, Transcript, DEFAULT_PRESETS,
    };
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;

    const BOUNDARY: &str = "recap-test-boundary";

    struct StubDownloader {
        fail: bool,
    }

    impl Downloader for StubDownloader {
        async fn download(&self, _url: &str, preset: &Preset, output_dir: &Path) -> Result<PathBuf> {
            if self.fail {
                return Err(Error::Download(format!("HTTP Error 403: Forbidden ({})", preset.name)));
            }
            let path = output_dir.join("abc123.mp4");
            std::fs::write(&path, b"video")?;
            Ok(path)
        }
    }

    struct StubExtractor;

    impl AudioExtractor for StubExtractor {
        async fn extract(&self, video_path: &Path) -> Result<PathBuf> {
            let audio = audio_path_for(video_path);
            std::fs::write(&audio, b"RIFF")?;
            Ok(audio)
        }
    }

    struct StubTranscriber(&'static str);

    impl Transcriber for StubTranscriber {
        fn transcribe(&self, _audio_path: &Path) -> Result<Transcript> {
            Ok(Transcript {
                segments: vec![Segment {
                    start: 0.0,
                    end: 2.0,
                    text: self.0.to_string(),
                }],
                language: "en".into(),
                duration: 2.0,
                model: "stub".into(),
            })
        }
    }

    struct StubCompletion;

    impl CompletionClient for StubCompletion {
        async fn complete(&self, _system: &str, _user: &str, _max_tokens: u32) -> Result<String> {
            Ok("External summary.".into())
        }
    }

    fn app(root: &TempDir, fail_downloads: bool) -> Router {
        let pipeline = Pipeline::new(
            SourceResolver::new(
                StubDownloader {
                    fail: fail_downloads,
                },
                DEFAULT_PRESETS,
                root.path().join("temp"),
                root.path().join("uploads"),
            ),
            StubExtractor,
            Arc::new(StubTranscriber("Hello there. General Kenobi.")),
            Summarizer::new(Some(StubCompletion)),
        );
        router(
            pipeline,
            RouterOptions {
                body_limit: 1024 * 1024,
                upload_dir: root.path().join("uploads"),
                index_file: root.path().join("index.html"),
            },
        )
    }

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a [u8]),
    }

    fn multipart(parts: &[Part<'_>]) -> Request {
        multipart_as("multipart/form-data", parts)
    }

    fn multipart_as(media_type: &str, parts: &[Part<'_>]) -> Request {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                            .as_bytes(),
                    );
                }
                Part::File(name, file_name, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                    body.extend_from_slice(b"\r\n");
                }
            }
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        axum::http::Request::builder()
            .method("POST")
            .uri("/api/summarize")
            .header(
                header::CONTENT_TYPE,
                format!("{media_type}; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json(body: serde_json::Value) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri("/api/summarize")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: Router, req: Request) -> (StatusCode, serde_json::Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn assert_dirs_empty(root: &TempDir) {
        for dir in ["temp", "uploads"] {
            if let Ok(entries) = std::fs::read_dir(root.path().join(dir)) {
                assert_eq!(entries.count(), 0, "{dir} not cleaned up");
            }
        }
    }

    #[tokio::test]
    async fn test_health() {
        let root = tempfile::tempdir().unwrap();
        let req = axum::http::Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(app(&root, false), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "status": "healthy" }));
    }

    #[tokio::test]
    async fn test_upload_short_transcript() {
        let root = tempfile::tempdir().unwrap();
        let req = multipart(&[Part::File("video_file", "talk.mp4", b"fake mp4 bytes")]);

        let (status, body) = send(app(&root, false), req).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["success"], true);
        assert_eq!(body["transcript"], "Hello there. General Kenobi.");
        assert_eq!(body["summary"], body["transcript"]);
        assert_dirs_empty(&root);
    }

    #[tokio::test]
    async fn test_upload_use_openai_is_case_insensitive() {
        let root = tempfile::tempdir().unwrap();
        let req = multipart(&[
            Part::File("video_file", "talk.mov", b"fake"),
            Part::Text("use_openai", "TRUE"),
        ]);

        let (status, body) = send(app(&root, false), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], "External summary.");
    }

    #[tokio::test]
    async fn test_upload_bad_extension() {
        let root = tempfile::tempdir().unwrap();
        let req = multipart(&[Part::File("video_file", "notes.txt", b"plain text")]);

        let (status, body) = send(app(&root, false), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error = body["error"].as_str().unwrap();
        assert!(error.starts_with("Invalid file type. Allowed types:"), "{error}");
        assert_dirs_empty(&root);
    }

    #[tokio::test]
    async fn test_empty_fields_mean_missing_source() {
        let root = tempfile::tempdir().unwrap();
        let req = multipart(&[
            Part::Text("youtube_url", "   "),
            Part::File("video_file", "", b""),
        ]);

        let (status, body) = send(app(&root, false), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "Please provide either a YouTube URL or upload a video file"
        );
    }

    #[tokio::test]
    async fn test_url_wins_over_upload() {
        let root = tempfile::tempdir().unwrap();
        let req = multipart(&[
            Part::Text("youtube_url", "https://youtu.be/abc123"),
            Part::File("video_file", "notes.txt", b"ignored"),
        ]);

        let (status, body) = send(app(&root, false), req).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["success"], true);
        assert_dirs_empty(&root);
    }

    #[tokio::test]
    async fn test_json_url_all_presets_fail() {
        let root = tempfile::tempdir().unwrap();
        let req = json(serde_json::json!({ "youtube_url": "https://youtu.be/blocked" }));

        let (status, body) = send(app(&root, true), req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let error = body["error"].as_str().unwrap();
        assert!(error.contains("All strategies failed"), "{error}");
        assert!(error.contains("HTTP Error 403: Forbidden (lowest-quality)"), "{error}");
        assert_dirs_empty(&root);
    }

    #[tokio::test]
    async fn test_json_use_openai() {
        let root = tempfile::tempdir().unwrap();
        let req = json(serde_json::json!({
            "youtube_url": "https://www.youtube.com/watch?v=abc123",
            "use_openai": true,
        }));

        let (status, body) = send(app(&root, false), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transcript"], "Hello there. General Kenobi.");
        assert_eq!(body["summary"], "External summary.");
    }

    #[tokio::test]
    async fn test_json_without_source() {
        let root = tempfile::tempdir().unwrap();
        let (status, _) = send(app(&root, false), json(serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let root = tempfile::tempdir().unwrap();
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/api/summarize")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = send(app(&root, false), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("invalid request"));
    }

    #[tokio::test]
    async fn test_non_http_url_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let req = json(serde_json::json!({ "youtube_url": "file:///etc/passwd" }));

        let (status, _) = send(app(&root, false), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_with_mixed_case_content_type() {
        let root = tempfile::tempdir().unwrap();
        let req = multipart_as(
            "Multipart/Form-Data",
            &[Part::File("video_file", "talk.webm", b"fake webm bytes")],
        );

        let (status, body) = send(app(&root, false), req).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["transcript"], "Hello there. General Kenobi.");
        assert_dirs_empty(&root);
    }

    #[tokio::test]
    async fn test_json_use_openai_null_is_false() {
        let root = tempfile::tempdir().unwrap();
        let req = json(serde_json::json!({
            "youtube_url": "https://youtu.be/abc123",
            "use_openai": null,
        }));

        let (status, body) = send(app(&root, false), req).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["summary"], body["transcript"]);
    }

    #[tokio::test]
    async fn test_json_use_openai_as_string() {
        let root = tempfile::tempdir().unwrap();
        let req = json(serde_json::json!({
            "youtube_url": "https://youtu.be/abc123",
            "use_openai": "True",
        }));
        let (status, body) = send(app(&root, false), req).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["summary"], "External summary.");

        let req = json(serde_json::json!({
            "youtube_url": "https://youtu.be/abc123",
            "use_openai": "false",
        }));
        let (status, body) = send(app(&root, false), req).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["summary"], body["transcript"]);
    }

    #[test]
    fn test_truthy_values() {
        use serde_json::json;

        for value in [json!(true), json!(1), json!("TRUE"), json!([0]), json!({"a": 1})] {
            assert!(truthy(&value), "{value}");
        }
        for value in [json!(null), json!(false), json!(0), json!("yes"), json!(""), json!([])] {
            assert!(!truthy(&value), "{value}");
        }
    }

    #[tokio::test]
    async fn test_urlencoded_form() {
        let root = tempfile::tempdir().unwrap();
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/api/summarize")
            .header(header::CONTENT_TYPE, "Application/X-WWW-Form-Urlencoded")
            .body(Body::from(
                "youtube_url=https%3A%2F%2Fyoutu.be%2Fabc123&use_openai=TRUE",
            ))
            .unwrap();

        let (status, body) = send(app(&root, false), req).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["summary"], "External summary.");
    }

    #[tokio::test]
    async fn test_urlencoded_form_without_source() {
        let root = tempfile::tempdir().unwrap();
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/api/summarize")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("youtube_url=&use_openai=false"))
            .unwrap();

        let (status, body) = send(app(&root, false), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "Please provide either a YouTube URL or upload a video file"
        );
    }

    #[tokio::test]
    async fn test_index_page() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("index.html"), "<h1>recap</h1>").unwrap();
        let req = axum::http::Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap();

        let resp = app(&root, false).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/html"), "{content_type}");
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<h1>recap</h1>");
    }

    #[tokio::test]
    async fn test_index_page_missing() {
        let root = tempfile::tempdir().unwrap();
        let req = axum::http::Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap();

        let resp = app(&root, false).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}

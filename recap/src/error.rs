use std::path::PathBuf;

/// All errors that can occur in recap.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid file type. Allowed types: {}", crate::source::ALLOWED_VIDEO_EXTENSIONS.join(", "))]
    UnsupportedFormat { file_name: String },

    #[error("invalid URL (must start with http:// or https://): {0}")]
    InvalidUrl(String),

    #[error("Please provide either a YouTube URL or upload a video file")]
    MissingSource,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(
        "Error downloading video. All strategies failed. Last error: {last_error}. \
         Please try again or upload the video file directly."
    )]
    SourceUnavailable { last_error: String },

    #[error("download error: {0}")]
    Download(String),

    #[error("yt-dlp not found — install with: pip install yt-dlp")]
    YtDlpNotFound,

    #[error("ffmpeg not found — install with: apt install ffmpeg, or set FFMPEG_PATH")]
    FfmpegNotFound,

    #[error("Error extracting audio: {0}")]
    AudioExtraction(String),

    #[error("audio decoding error: {0}")]
    AudioDecode(String),

    #[error("audio file not found: {path}")]
    AudioNotFound { path: PathBuf },

    #[error("Error transcribing audio: {0}")]
    Transcription(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("model not found: {path}")]
    ModelNotFound { path: PathBuf },

    #[error("model download failed: {0}")]
    ModelDownload(String),

    #[error("unsupported language: \"{0}\"")]
    UnsupportedLanguage(String),

    #[error("whisper error: {0}")]
    Whisper(#[from] whisper_rs::WhisperError),

    #[error("completion API error: {status} - {message}")]
    Completion { status: u16, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error was caused by the caller's input rather than by a
    /// pipeline stage.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedFormat { .. }
                | Error::InvalidUrl(_)
                | Error::MissingSource
                | Error::InvalidRequest(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

//! Video in, transcript and summary out.
//!
//! **recap** runs one request through an ordered pipeline: resolve the source
//! (upload, or URL downloaded via yt-dlp with preset fallback), extract the
//! audio track (ffmpeg), transcribe it (whisper.cpp) and summarize the text
//! (chat-completion API or a local sentence heuristic). Every intermediate
//! file is registered with the request's [`Cleanup`] and removed whether the
//! request succeeds or not.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use recap::{
//!     FfmpegExtractor, OpenAiClient, Pipeline, Request, Source, SourceResolver, Summarizer,
//!     TranscribeOptions, WhisperTranscriber, YtDlp, DEFAULT_PRESETS,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> recap::Result<()> {
//! let options = TranscribeOptions::default();
//! let model = recap::model::ensure_model(&options.model, &options.resolve_cache_dir()).await?;
//! let transcriber = WhisperTranscriber::load(&model, "ffmpeg", options)?;
//!
//! let pipeline = Pipeline::new(
//!     SourceResolver::new(YtDlp::new("yt-dlp"), DEFAULT_PRESETS, "temp", "uploads"),
//!     FfmpegExtractor::new("ffmpeg"),
//!     Arc::new(transcriber),
//!     Summarizer::<OpenAiClient>::new(None),
//! );
//!
//! let digest = pipeline
//!     .run(Request {
//!         source: Source::Url("https://www.youtube.com/watch?v=dQw4w9WgXcQ".into()),
//!         use_openai: false,
//!     })
//!     .await?;
//! println!("{}", digest.summary);
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod cleanup;
pub mod config;
pub mod download;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod source;
pub mod summarize;
pub mod tools;
pub mod transcribe;
pub mod types;

pub use audio::{AudioExtractor, FfmpegExtractor};
pub use cleanup::Cleanup;
pub use config::{Language, Model, TranscribeOptions};
pub use download::{Downloader, Preset, YtDlp, DEFAULT_PRESETS};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, Request, Stage};
pub use source::{Source, SourceResolver};
pub use summarize::{CompletionClient, OpenAiClient, Summarizer};
pub use tools::MediaTools;
pub use transcribe::{Transcriber, WhisperTranscriber};
pub use types::{Artifact, ArtifactKind, Digest, Segment, Transcript};

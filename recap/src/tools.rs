//! Locating the external executables the pipeline shells out to.
//!
//! ffmpeg is needed by both audio extraction and transcription (decoding to
//! 16 kHz PCM), and yt-dlp by URL downloads. Each can be given an explicit
//! path; otherwise it is looked up on `PATH` by name.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tracing::{info, warn};

use crate::error::{Error, Result};

/// Resolved paths of the media executables.
#[derive(Debug, Clone)]
pub struct MediaTools {
    pub ffmpeg: PathBuf,
    /// `None` when yt-dlp is not installed; URL sources are then rejected.
    pub yt_dlp: Option<PathBuf>,
}

impl MediaTools {
    /// Resolve and check both tools. A missing ffmpeg is fatal, a missing
    /// yt-dlp only disables URL sources.
    pub async fn discover(ffmpeg: Option<PathBuf>, yt_dlp: Option<PathBuf>) -> Result<Self> {
        let ffmpeg = ffmpeg.unwrap_or_else(|| PathBuf::from("ffmpeg"));
        if !responds(&ffmpeg, "-version").await {
            return Err(Error::FfmpegNotFound);
        }
        info!(ffmpeg = %ffmpeg.display(), "found ffmpeg");

        let yt_dlp = yt_dlp.unwrap_or_else(|| PathBuf::from("yt-dlp"));
        let yt_dlp = if responds(&yt_dlp, "--version").await {
            info!(yt_dlp = %yt_dlp.display(), "found yt-dlp");
            Some(yt_dlp)
        } else {
            warn!(yt_dlp = %yt_dlp.display(), "yt-dlp not found; URL sources are disabled");
            None
        };

        Ok(Self { ffmpeg, yt_dlp })
    }

    /// The directory holding ffmpeg, handed to yt-dlp so its audio
    /// post-processing runs the same binary.
    pub fn ffmpeg_location(&self) -> Option<&Path> {
        if self.ffmpeg.components().count() > 1 {
            self.ffmpeg.parent()
        } else {
            None
        }
    }
}

/// Run `<tool> <flag>` and report whether it exited successfully.
async fn responds(tool: &Path, flag: &str) -> bool {
    tokio::process::Command::new(tool)
        .arg(flag)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

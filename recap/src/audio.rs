use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::{Error, Result};

/// Target sample rate for whisper.cpp.
pub(crate) const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Maximum audio duration in seconds (8 hours).
/// 8 hours at 16kHz mono f32 is ~1.8 GB of samples.
const MAX_AUDIO_DURATION_SECS: f64 = 8.0 * 3600.0;

/// Pulls the audio track out of a video container.
pub trait AudioExtractor {
    /// Write the audio of `video_path` to a new file and return its path.
    fn extract(&self, video_path: &Path) -> impl Future<Output = Result<PathBuf>> + Send;
}

/// [`AudioExtractor`] that shells out to ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    ffmpeg: PathBuf,
}

impl FfmpegExtractor {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

/// `clip.mp4` becomes `clip_audio.wav` in the same directory.
pub fn audio_path_for(video_path: &Path) -> PathBuf {
    let stem = video_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "media".into());
    video_path.with_file_name(format!("{stem}_audio.wav"))
}

impl AudioExtractor for FfmpegExtractor {
    #[tracing::instrument(skip(self))]
    async fn extract(&self, video_path: &Path) -> Result<PathBuf> {
        if !video_path.exists() {
            return Err(Error::AudioExtraction(format!(
                "video file not found: {}",
                video_path.display()
            )));
        }

        let audio_path = audio_path_for(video_path);
        let output = tokio::process::Command::new(&self.ffmpeg)
            .args(["-nostdin", "-y", "-i"])
            .arg(video_path)
            .args(["-vn", "-acodec", "pcm_s16le", "-ac", "1", "-ar"])
            .arg(WHISPER_SAMPLE_RATE.to_string())
            .arg(&audio_path)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::FfmpegNotFound,
                _ => Error::AudioExtraction(format!("failed to run ffmpeg: {e}")),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = last_line(&stderr).unwrap_or("unknown ffmpeg error");
            return Err(Error::AudioExtraction(format!("ffmpeg failed: {tail}")));
        }

        if !audio_path.exists() {
            return Err(Error::AudioExtraction(format!(
                "no audio stream in {}",
                video_path.display()
            )));
        }

        info!(audio = %audio_path.display(), "audio extracted");
        Ok(audio_path)
    }
}

/// Decode any audio file ffmpeg understands to 16kHz mono f32 samples.
///
/// ffmpeg handles decoding, resampling and channel mixing in one shot; its
/// s16le output is converted to f32 in [-1.0, 1.0].
pub fn decode_pcm(ffmpeg: &Path, path: &Path) -> Result<Vec<f32>> {
    if !path.exists() {
        return Err(Error::AudioNotFound {
            path: path.to_path_buf(),
        });
    }

    let output = Command::new(ffmpeg)
        .args(["-nostdin", "-threads", "0", "-i"])
        .arg(path)
        .args(["-f", "s16le", "-ac", "1", "-acodec", "pcm_s16le", "-ar"])
        .arg(WHISPER_SAMPLE_RATE.to_string())
        .arg("-")
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FfmpegNotFound,
            _ => Error::AudioDecode(format!("failed to run ffmpeg: {e}")),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail = last_line(&stderr).unwrap_or("unknown ffmpeg error");
        return Err(Error::AudioDecode(format!("ffmpeg failed: {tail}")));
    }

    if output.stdout.is_empty() {
        return Err(Error::AudioDecode("ffmpeg produced no samples".into()));
    }

    let samples = pcm_s16le_to_f32(&output.stdout);
    let duration = samples.len() as f64 / WHISPER_SAMPLE_RATE as f64;
    debug!(samples = samples.len(), duration_secs = format!("{duration:.1}"), "decoded audio");

    if duration > MAX_AUDIO_DURATION_SECS {
        return Err(Error::AudioDecode(format!(
            "audio too long ({duration:.0}s) — maximum supported duration is {MAX_AUDIO_DURATION_SECS:.0}s"
        )));
    }

    Ok(samples)
}

fn pcm_s16le_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

/// ffmpeg puts the actual reason on the last stderr line.
fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rfind(|l| !l.is_empty())
}

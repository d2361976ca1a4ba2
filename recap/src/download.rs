use std::ffi::OsString;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Browser identity sent with every download attempt.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const REFERER: &str = "https://www.youtube.com/";

/// Audio post-processing applied by yt-dlp after the download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractAudio {
    pub codec: &'static str,
    pub quality: &'static str,
}

/// One named bundle of yt-dlp parameters, tried as a single fallback attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub name: &'static str,
    pub format: &'static str,
    pub extract_audio: Option<ExtractAudio>,
    /// YouTube player clients to impersonate; empty leaves yt-dlp's default.
    pub player_clients: &'static [&'static str],
}

/// Presets in the order they are attempted. Audio-only first: it is the
/// smallest download and the least likely to be blocked.
pub const DEFAULT_PRESETS: &[Preset] = &[
    Preset {
        name: "audio-only",
        format: "bestaudio/best",
        extract_audio: Some(ExtractAudio {
            codec: "wav",
            quality: "192K",
        }),
        player_clients: &["android"],
    },
    Preset {
        name: "video-720p",
        format: "best[height<=720]/best",
        extract_audio: None,
        player_clients: &["android", "web"],
    },
    Preset {
        name: "video-480p",
        format: "best[height<=480]/best",
        extract_audio: None,
        player_clients: &["ios"],
    },
    Preset {
        name: "lowest-quality",
        format: "worst",
        extract_audio: None,
        player_clients: &[],
    },
];

/// Fetches a URL into a directory using one preset.
pub trait Downloader {
    /// Download `url` into `output_dir` and return the produced file.
    fn download(
        &self,
        url: &str,
        preset: &Preset,
        output_dir: &Path,
    ) -> impl Future<Output = Result<PathBuf>> + Send;
}

/// Try `presets` strictly in order and stop at the first success.
///
/// Every failure is logged and remembered; when all presets fail the last
/// one is reported through [`Error::SourceUnavailable`].
#[tracing::instrument(skip(downloader, presets))]
pub async fn fetch_with_fallback<D: Downloader>(
    downloader: &D,
    url: &str,
    presets: &[Preset],
    output_dir: &Path,
) -> Result<PathBuf> {
    let mut last_error = None;

    for (attempt, preset) in presets.iter().enumerate() {
        info!(attempt = attempt + 1, preset = preset.name, "trying download preset");
        match downloader.download(url, preset, output_dir).await {
            Ok(path) => {
                info!(preset = preset.name, path = %path.display(), "download succeeded");
                return Ok(path);
            }
            Err(e) => {
                warn!(preset = preset.name, error = %e, "download preset failed");
                last_error = Some(e.to_string());
            }
        }
    }

    Err(Error::SourceUnavailable {
        last_error: last_error.unwrap_or_else(|| "no download presets configured".into()),
    })
}

/// Validate that a string looks like a URL.
/// Rejects anything that isn't http:// or https://.
pub(crate) fn validate_url(url: &str) -> Result<()> {
    let trimmed = url.trim();
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        Ok(())
    } else {
        Err(Error::InvalidUrl(trimmed.to_string()))
    }
}

/// [`Downloader`] backed by the yt-dlp executable.
///
/// Arguments go through `.arg()` (no shell), `--no-exec` blocks yt-dlp's own
/// command hooks, and the reported file must sit inside the output directory.
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: PathBuf,
    ffmpeg_location: Option<PathBuf>,
}

impl YtDlp {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            ffmpeg_location: None,
        }
    }

    /// Directory yt-dlp should take ffmpeg from for audio post-processing.
    pub fn with_ffmpeg_location(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ffmpeg_location = Some(dir.into());
        self
    }

    fn args(&self, url: &str, preset: &Preset, output_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "--no-playlist",
            "--no-exec",
            "--quiet",
            "--no-warnings",
            "--user-agent",
            USER_AGENT,
            "--referer",
            REFERER,
            "--format",
            preset.format,
        ]
        .into_iter()
        .map(OsString::from)
        .collect();

        if let Some(extract) = preset.extract_audio {
            args.extend(
                [
                    "--extract-audio",
                    "--audio-format",
                    extract.codec,
                    "--audio-quality",
                    extract.quality,
                ]
                .map(OsString::from),
            );
        }

        if !preset.player_clients.is_empty() {
            args.push("--extractor-args".into());
            args.push(format!("youtube:player_client={}", preset.player_clients.join(",")).into());
        }

        if let Some(dir) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(dir.into());
        }

        args.push("--output".into());
        args.push(output_dir.join("%(id)s.%(ext)s").into());
        args.push("--print".into());
        args.push("after_move:filepath".into());
        args.push(url.into());
        args
    }
}

impl Downloader for YtDlp {
    async fn download(&self, url: &str, preset: &Preset, output_dir: &Path) -> Result<PathBuf> {
        validate_url(url)?;

        let output = tokio::process::Command::new(&self.binary)
            .args(self.args(url.trim(), preset, output_dir))
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::YtDlpNotFound,
                _ => Error::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // Limit error message length to avoid dumping huge stderr
            let stderr: String = stderr.trim().chars().take(1000).collect();
            return Err(Error::Download(format!("yt-dlp failed: {stderr}")));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let printed = stdout.lines().map(str::trim).rfind(|l| !l.is_empty());

        let path = match printed {
            Some(p) => {
                let candidate = PathBuf::from(p);
                validate_path_in_dir(&candidate, output_dir)?;
                candidate
            }
            None => find_downloaded_file(output_dir, preset.extract_audio.map(|e| e.codec))?,
        };

        if !path.exists() {
            return Err(Error::Download(format!(
                "downloaded file not found at {}",
                path.display()
            )));
        }

        debug!(path = %path.display(), preset = preset.name, "yt-dlp produced file");
        Ok(path)
    }
}

/// Resolve `.` and `..` components without touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir => {}
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

/// Reject paths that escape the expected directory.
fn validate_path_in_dir(path: &Path, expected_dir: &Path) -> Result<()> {
    let canonical_dir = expected_dir
        .canonicalize()
        .unwrap_or_else(|_| normalize_path(expected_dir));
    let canonical_path = path.canonicalize().unwrap_or_else(|_| normalize_path(path));

    if canonical_path.starts_with(&canonical_dir) {
        Ok(())
    } else {
        warn!(
            path = %path.display(),
            expected_dir = %expected_dir.display(),
            "downloaded file path outside expected directory"
        );
        Err(Error::Download(
            "downloaded file path is outside the expected output directory".into(),
        ))
    }
}

/// Newest file in `dir`, preferring files with extension `prefer` when given.
fn find_downloaded_file(dir: &Path, prefer: Option<&str>) -> Result<PathBuf> {
    let mut files: Vec<(PathBuf, SystemTime)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_file() {
            files.push((entry.path(), meta.modified().unwrap_or(SystemTime::UNIX_EPOCH)));
        }
    }

    let preferred = prefer.and_then(|ext| {
        newest(files.iter().filter(|(p, _)| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        }))
    });

    preferred
        .or_else(|| newest(files.iter()))
        .ok_or_else(|| Error::Download("no file found after download".into()))
}

fn newest<'a>(candidates: impl Iterator<Item = &'a (PathBuf, SystemTime)>) -> Option<PathBuf> {
    candidates
        .max_by_key(|(_, modified)| *modified)
        .map(|(p, _)| p.clone())
}

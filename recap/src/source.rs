use std::path::{Path, PathBuf};

use tracing::info;
use uuid::Uuid;

use crate::cleanup::Cleanup;
use crate::download::{fetch_with_fallback, validate_url, Downloader, Preset};
use crate::error::{Error, Result};
use crate::types::{Artifact, ArtifactKind};

/// Container formats accepted for uploads.
pub const ALLOWED_VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "flv", "wmv"];

/// Downloads with one of these extensions skip audio extraction.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "m4a", "mp3", "opus", "ogg"];

/// Where the media for one request comes from.
#[derive(Debug, Clone)]
pub enum Source {
    Url(String),
    Upload { file_name: String, bytes: Vec<u8> },
    /// An upload the caller already wrote to `path`. It is moved into the
    /// request's upload directory; on rejection it stays where it was.
    StagedUpload { file_name: String, path: PathBuf },
}

/// A local media file ready for the next stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

/// Turns a [`Source`] into a local file, registering everything it creates.
#[derive(Debug, Clone)]
pub struct SourceResolver<D> {
    downloader: D,
    presets: Vec<Preset>,
    work_dir: PathBuf,
    upload_dir: PathBuf,
}

impl<D: Downloader + Sync> SourceResolver<D> {
    pub fn new(
        downloader: D,
        presets: &[Preset],
        work_dir: impl Into<PathBuf>,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            downloader,
            presets: presets.to_vec(),
            work_dir: work_dir.into(),
            upload_dir: upload_dir.into(),
        }
    }

    pub async fn resolve(
        &self,
        source: Source,
        request_id: Uuid,
        cleanup: &mut Cleanup,
    ) -> Result<ResolvedSource> {
        match source {
            Source::Url(url) => self.download(&url, request_id, cleanup).await,
            Source::Upload { file_name, bytes } => {
                self.store_upload(&file_name, &bytes, request_id, cleanup).await
            }
            Source::StagedUpload { file_name, path } => {
                self.adopt_upload(&file_name, &path, request_id, cleanup).await
            }
        }
    }

    async fn download(
        &self,
        url: &str,
        request_id: Uuid,
        cleanup: &mut Cleanup,
    ) -> Result<ResolvedSource> {
        validate_url(url)?;
        let url = url.trim();

        let scratch = self.work_dir.join(request_id.to_string());
        tokio::fs::create_dir_all(&scratch).await?;
        cleanup.register(Artifact::new(&scratch, ArtifactKind::Directory));

        let path = fetch_with_fallback(&self.downloader, url, &self.presets, &scratch).await?;
        let kind = media_kind(&path);
        cleanup.register(Artifact::new(&path, kind));

        if kind == ArtifactKind::Audio {
            info!(path = %path.display(), "download is already audio");
        }
        Ok(ResolvedSource { path, kind })
    }

    async fn store_upload(
        &self,
        file_name: &str,
        bytes: &[u8],
        request_id: Uuid,
        cleanup: &mut Cleanup,
    ) -> Result<ResolvedSource> {
        let path = self.upload_path(file_name, request_id, cleanup).await?;
        tokio::fs::write(&path, bytes).await?;
        cleanup.register(Artifact::new(&path, ArtifactKind::Video));

        info!(path = %path.display(), bytes = bytes.len(), "stored upload");
        Ok(ResolvedSource {
            path,
            kind: ArtifactKind::Video,
        })
    }

    async fn adopt_upload(
        &self,
        file_name: &str,
        staged: &Path,
        request_id: Uuid,
        cleanup: &mut Cleanup,
    ) -> Result<ResolvedSource> {
        let path = self.upload_path(file_name, request_id, cleanup).await?;
        tokio::fs::rename(staged, &path).await?;
        cleanup.register(Artifact::new(&path, ArtifactKind::Video));

        info!(path = %path.display(), "adopted staged upload");
        Ok(ResolvedSource {
            path,
            kind: ArtifactKind::Video,
        })
    }

    /// Validate the name, then create and register `uploads/<request-id>/`.
    async fn upload_path(
        &self,
        file_name: &str,
        request_id: Uuid,
        cleanup: &mut Cleanup,
    ) -> Result<PathBuf> {
        validate_upload_name(file_name)?;

        let dir = self.upload_dir.join(request_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;
        cleanup.register(Artifact::new(&dir, ArtifactKind::Directory));

        Ok(dir.join(sanitize_file_name(file_name)))
    }
}

fn extension_of(name: &str) -> Option<String> {
    name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Reject uploads whose extension is not a known video container.
pub fn validate_upload_name(file_name: &str) -> Result<()> {
    match extension_of(file_name) {
        Some(ext) if ALLOWED_VIDEO_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(Error::UnsupportedFormat {
            file_name: file_name.to_string(),
        }),
    }
}

/// Audio when the extension says so, video otherwise.
pub fn media_kind(path: &Path) -> ArtifactKind {
    let is_audio = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| AUDIO_EXTENSIONS.iter().any(|a| e.eq_ignore_ascii_case(a)));
    if is_audio {
        ArtifactKind::Audio
    } else {
        ArtifactKind::Video
    }
}

/// Keep only the final path component and replace anything outside
/// `[A-Za-z0-9._-]`; leading dots are dropped.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

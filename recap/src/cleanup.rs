use std::io::ErrorKind;

use tracing::{debug, warn};

use crate::types::{Artifact, ArtifactKind};

/// Per-request list of intermediate files and directories.
///
/// Everything registered is removed once, either by an explicit [`run`]
/// or when the guard is dropped, whichever comes first. Removal happens in
/// reverse registration order so files go before the directory holding them.
///
/// [`run`]: Cleanup::run
#[derive(Debug, Default)]
pub struct Cleanup {
    artifacts: Vec<Artifact>,
}

impl Cleanup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, artifact: Artifact) {
        debug!(path = %artifact.path.display(), kind = ?artifact.kind, "registered artifact");
        self.artifacts.push(artifact);
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Remove every registered artifact. Paths already gone are skipped;
    /// other failures are logged and do not stop the sweep.
    pub fn run(&mut self) {
        while let Some(artifact) = self.artifacts.pop() {
            let result = match artifact.kind {
                ArtifactKind::Directory => std::fs::remove_dir_all(&artifact.path),
                ArtifactKind::Video | ArtifactKind::Audio => std::fs::remove_file(&artifact.path),
            };

            match result {
                Ok(()) => debug!(path = %artifact.path.display(), "removed artifact"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %artifact.path.display(), error = %e, "failed to remove artifact")
                }
            }
        }
    }

    /// [`run`](Cleanup::run) on the blocking pool, for use from async code.
    pub async fn finish(mut self) {
        if self.artifacts.is_empty() {
            return;
        }
        if let Err(e) = tokio::task::spawn_blocking(move || self.run()).await {
            warn!(error = %e, "cleanup task failed");
        }
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        self.run();
    }
}

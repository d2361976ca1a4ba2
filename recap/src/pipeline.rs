use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::audio::AudioExtractor;
use crate::cleanup::Cleanup;
use crate::download::Downloader;
use crate::error::{Error, Result};
use crate::source::{Source, SourceResolver};
use crate::summarize::{CompletionClient, Summarizer};
use crate::transcribe::Transcriber;
use crate::types::{Artifact, ArtifactKind, Digest};

/// Where a request currently is. `ExtractingAudio` is skipped for audio
/// sources; `CleaningUp` runs on every path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolvingSource,
    ExtractingAudio,
    Transcribing,
    Summarizing,
    CleaningUp,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ResolvingSource => "resolving-source",
            Stage::ExtractingAudio => "extracting-audio",
            Stage::Transcribing => "transcribing",
            Stage::Summarizing => "summarizing",
            Stage::CleaningUp => "cleaning-up",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One unit of work for the pipeline.
#[derive(Debug, Clone)]
pub struct Request {
    pub source: Source,
    /// Ask for the external completion API instead of the local summary.
    pub use_openai: bool,
}

/// Source → audio → transcript → summary, with cleanup on every exit.
pub struct Pipeline<D, X, T, C> {
    resolver: SourceResolver<D>,
    extractor: X,
    transcriber: Arc<T>,
    summarizer: Summarizer<C>,
}

impl<D, X, T, C> Pipeline<D, X, T, C>
where
    D: Downloader + Send + Sync + 'static,
    X: AudioExtractor + Send + Sync + 'static,
    T: Transcriber + Send + Sync + 'static,
    C: CompletionClient + Send + Sync + 'static,
{
    pub fn new(
        resolver: SourceResolver<D>,
        extractor: X,
        transcriber: Arc<T>,
        summarizer: Summarizer<C>,
    ) -> Self {
        Self {
            resolver,
            extractor,
            transcriber,
            summarizer,
        }
    }

    /// Run every stage for `request`. Either both transcript and summary come
    /// back, or the first stage error does; intermediate files are removed
    /// in both cases.
    #[tracing::instrument(skip_all, fields(request_id = tracing::field::Empty))]
    pub async fn run(&self, request: Request) -> Result<Digest> {
        let request_id = Uuid::new_v4();
        tracing::Span::current().record("request_id", tracing::field::display(request_id));

        let mut cleanup = Cleanup::new();
        let outcome = self.process(request, request_id, &mut cleanup).await;

        enter(Stage::CleaningUp);
        cleanup.finish().await;

        match &outcome {
            Ok(_) => enter(Stage::Done),
            Err(e) => warn!(stage = %Stage::Failed, error = %e, "request failed"),
        }
        outcome
    }

    async fn process(
        &self,
        request: Request,
        request_id: Uuid,
        cleanup: &mut Cleanup,
    ) -> Result<Digest> {
        enter(Stage::ResolvingSource);
        let resolved = self
            .resolver
            .resolve(request.source, request_id, cleanup)
            .await?;

        let audio_path = match resolved.kind {
            ArtifactKind::Audio => {
                info!(path = %resolved.path.display(), "source is audio, skipping extraction");
                resolved.path
            }
            _ => {
                enter(Stage::ExtractingAudio);
                let audio_path = self.extractor.extract(&resolved.path).await?;
                cleanup.register(Artifact::new(&audio_path, ArtifactKind::Audio));
                audio_path
            }
        };

        enter(Stage::Transcribing);
        let transcript = self.transcribe(audio_path).await?.text();

        enter(Stage::Summarizing);
        let summary = self.summarizer.summarize(&transcript, request.use_openai).await;

        Ok(Digest {
            transcript,
            summary,
        })
    }

    /// Inference is CPU-bound, so it runs on the blocking pool.
    async fn transcribe(&self, audio_path: PathBuf) -> Result<crate::Transcript> {
        let transcriber = Arc::clone(&self.transcriber);
        tokio::task::spawn_blocking(move || transcriber.transcribe(&audio_path))
            .await
            .map_err(|e| Error::Transcription(format!("transcription task failed: {e}")))?
    }
}

fn enter(stage: Stage) {
    info!(%stage, "pipeline stage");
}

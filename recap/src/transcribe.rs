use std::path::{Path, PathBuf};

use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::{decode_pcm, WHISPER_SAMPLE_RATE};
use crate::config::{Language, TranscribeOptions};
use crate::error::{Error, Result};
use crate::types::{Segment, Transcript};

/// Turns an audio file into text.
///
/// Implementations are shared by every in-flight request and must be usable
/// concurrently through `&self`.
pub trait Transcriber {
    fn transcribe(&self, audio_path: &Path) -> Result<Transcript>;
}

/// whisper.cpp model loaded once at startup.
///
/// The context is immutable after loading; each call allocates its own
/// decoding state, so no lock is needed between requests.
pub struct WhisperTranscriber {
    ctx: WhisperContext,
    ffmpeg: PathBuf,
    options: TranscribeOptions,
}

impl WhisperTranscriber {
    pub fn load(model_path: &Path, ffmpeg: impl Into<PathBuf>, options: TranscribeOptions) -> Result<Self> {
        info!(model = %model_path.display(), gpu = options.gpu, "loading whisper model");

        let mut ctx_params = WhisperContextParameters::new();
        ctx_params.use_gpu(options.gpu);

        let ctx = WhisperContext::new_with_params(
            model_path
                .to_str()
                .ok_or_else(|| Error::Model("model path contains invalid UTF-8".into()))?,
            ctx_params,
        )?;

        info!(model = options.model.name(), "whisper model loaded");
        Ok(Self {
            ctx,
            ffmpeg: ffmpeg.into(),
            options,
        })
    }

    fn params(&self) -> FullParams<'_, '_> {
        let mut params = match self.options.beam_size {
            Some(beam_size) => FullParams::new(SamplingStrategy::BeamSearch {
                beam_size: beam_size as i32,
                patience: -1.0,
            }),
            None => FullParams::new(SamplingStrategy::Greedy { best_of: 5 }),
        };

        match &self.options.language {
            Language::Auto => params.set_detect_language(true),
            Language::Code { code, .. } => params.set_language(Some(code)),
        }

        params.set_translate(self.options.translate);
        params.set_temperature(self.options.temperature);
        if let Some(n) = self.options.n_threads {
            params.set_n_threads(n as i32);
        }

        // Disable stderr printing from whisper.cpp
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params
    }

    fn run(&self, audio_path: &Path) -> Result<Transcript> {
        let samples = decode_pcm(&self.ffmpeg, audio_path)?;

        let mut state = self.ctx.create_state()?;
        debug!(samples = samples.len(), "running whisper");
        state.full(self.params(), &samples)?;

        let num_segments = state.full_n_segments();
        let mut segments = Vec::with_capacity(num_segments.max(0) as usize);
        for i in 0..num_segments {
            let segment = state
                .get_segment(i)
                .ok_or_else(|| Error::Transcription(format!("segment {i} not found")))?;
            let text = segment
                .to_str_lossy()
                .map_err(|e| Error::Transcription(format!("segment text error: {e}")))?
                .into_owned();

            segments.push(Segment {
                start: segment.start_timestamp() as f64 / 100.0,
                end: segment.end_timestamp() as f64 / 100.0,
                text,
            });
        }

        let language = whisper_rs::get_lang_str(state.full_lang_id_from_state())
            .unwrap_or("unknown")
            .to_string();

        Ok(Transcript {
            segments,
            language,
            duration: samples.len() as f64 / WHISPER_SAMPLE_RATE as f64,
            model: self.options.model.name().to_string(),
        })
    }
}

impl Transcriber for WhisperTranscriber {
    #[tracing::instrument(skip(self))]
    fn transcribe(&self, audio_path: &Path) -> Result<Transcript> {
        let transcript = self.run(audio_path).map_err(into_transcription_error)?;
        info!(
            segments = transcript.segments.len(),
            duration_secs = format!("{:.1}", transcript.duration),
            language = %transcript.language,
            "transcription complete"
        );
        Ok(transcript)
    }
}

/// Everything that goes wrong while transcribing surfaces as one error kind.
fn into_transcription_error(e: Error) -> Error {
    match e {
        Error::Transcription(_) => e,
        other => Error::Transcription(other.to_string()),
    }
}

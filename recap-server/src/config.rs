use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use recap::{Model, OpenAiClient, TranscribeOptions};

const MIB: usize = 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "recap-server", about = "Summarize videos from a URL or an upload over HTTP")]
pub struct Cli {
    /// Address to listen on.
    #[arg(long, env = "RECAP_ADDR", default_value = "127.0.0.1:5000")]
    pub addr: SocketAddr,

    /// Whisper model name (e.g. "base", "large-v3") or path to a ggml file.
    #[arg(short, long, env = "RECAP_MODEL", default_value = "base")]
    pub model: String,

    /// Model cache directory (default: ~/.cache/recap/models).
    #[arg(long, env = "RECAP_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Language code (e.g. "en", "de") or "auto" for detection.
    #[arg(short, long, env = "RECAP_LANGUAGE", default_value = "auto")]
    pub language: String,

    /// Translate the transcript to English.
    #[arg(long, env = "RECAP_TRANSLATE")]
    pub translate: bool,

    /// Number of threads (default: auto).
    #[arg(long)]
    pub threads: Option<u32>,

    /// Beam search size (default: greedy).
    #[arg(long)]
    pub beam_size: Option<u32>,

    /// Disable GPU acceleration.
    #[arg(long)]
    pub no_gpu: bool,

    /// Scratch directory for URL downloads.
    #[arg(long, env = "RECAP_WORK_DIR", default_value = "temp")]
    pub work_dir: PathBuf,

    /// Directory uploaded files are written to.
    #[arg(long, env = "RECAP_UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    #[arg(long, env = "FFMPEG_PATH")]
    pub ffmpeg: Option<PathBuf>,

    #[arg(long, env = "YT_DLP_PATH")]
    pub yt_dlp: Option<PathBuf>,

    /// Enables external summarization when set.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    #[arg(long, env = "OPENAI_MODEL")]
    pub openai_model: Option<String>,

    /// Page served at `/`.
    #[arg(long, env = "RECAP_INDEX_FILE", default_value = "index.html")]
    pub index_file: PathBuf,

    /// Maximum request body size in MiB.
    #[arg(long, env = "RECAP_UPLOAD_LIMIT_MB", default_value = "512")]
    pub upload_limit_mb: usize,
}

impl Cli {
    pub fn transcribe_options(&self) -> recap::Result<TranscribeOptions> {
        let mut options = TranscribeOptions::new()
            .model(Model::parse(&self.model))
            .language(&self.language)?
            .translate(self.translate)
            .gpu(!self.no_gpu);

        if let Some(n) = self.threads {
            options = options.n_threads(n)?;
        }
        if let Some(size) = self.beam_size {
            options = options.beam_size(size);
        }
        if let Some(ref dir) = self.model_dir {
            options = options.cache_dir(dir.clone());
        }
        Ok(options)
    }

    /// `None` unless a non-empty API key is configured.
    pub fn openai_client(&self) -> Option<OpenAiClient> {
        let key = self.openai_api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())?;

        let mut client = OpenAiClient::new(key);
        if let Some(ref url) = self.openai_base_url {
            client = client.with_base_url(url);
        }
        if let Some(ref model) = self.openai_model {
            client = client.with_model(model);
        }
        Some(client)
    }

    pub fn upload_limit_bytes(&self) -> usize {
        self.upload_limit_mb.saturating_mul(MIB)
    }
}

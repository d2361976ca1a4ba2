use std::fmt;
use std::path::PathBuf;

use crate::error::Error;

/// A validated language for whisper transcription.
///
/// Accepts both short codes ("en", "de") and full names ("english", "german"),
/// checked against whisper.cpp's language table.
#[derive(Debug, Clone, Default)]
pub enum Language {
    /// Auto-detect language from audio.
    #[default]
    Auto,
    /// A validated language code (e.g. "en", "de", "ja").
    Code {
        /// Short code as whisper expects it.
        code: String,
        /// Whisper internal language ID.
        id: i32,
    },
}

impl Language {
    /// Create a language from a code or full name, validating against whisper.cpp.
    pub fn new(lang: &str) -> Result<Self, Error> {
        let lower = lang.to_lowercase();
        if lower == "auto" {
            return Ok(Language::Auto);
        }

        match whisper_rs::get_lang_id(&lower) {
            Some(id) => {
                let code = whisper_rs::get_lang_str(id).unwrap_or(&lower).to_string();
                Ok(Language::Code { code, id })
            }
            None => Err(Error::UnsupportedLanguage(lang.to_string())),
        }
    }

    /// Get the short language code (e.g. "en"), or None for Auto.
    pub fn code(&self) -> Option<&str> {
        match self {
            Language::Auto => None,
            Language::Code { code, .. } => Some(code),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Auto => write!(f, "auto"),
            Language::Code { code, .. } => write!(f, "{code}"),
        }
    }
}

/// Whisper model sizes.
#[derive(Debug, Clone, PartialEq)]
pub enum Model {
    Tiny,
    TinyEn,
    Base,
    BaseEn,
    Small,
    SmallEn,
    Medium,
    MediumEn,
    LargeV3,
    LargeV3Turbo,
    /// User-provided .ggml file path.
    Custom(PathBuf),
}

impl Model {
    /// Model filename as used by HuggingFace / whisper.cpp.
    pub fn filename(&self) -> String {
        match self {
            Model::Custom(path) => path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| "custom-model".into()),
            named => format!("ggml-{}.bin", named.name()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Model::Tiny => "tiny",
            Model::TinyEn => "tiny.en",
            Model::Base => "base",
            Model::BaseEn => "base.en",
            Model::Small => "small",
            Model::SmallEn => "small.en",
            Model::Medium => "medium",
            Model::MediumEn => "medium.en",
            Model::LargeV3 => "large-v3",
            Model::LargeV3Turbo => "large-v3-turbo",
            Model::Custom(_) => "custom",
        }
    }

    /// Parse a model name; anything unknown is treated as a path to a ggml file.
    pub fn parse(s: &str) -> Self {
        match s {
            "tiny" => Model::Tiny,
            "tiny.en" => Model::TinyEn,
            "base" => Model::Base,
            "base.en" => Model::BaseEn,
            "small" => Model::Small,
            "small.en" => Model::SmallEn,
            "medium" => Model::Medium,
            "medium.en" => Model::MediumEn,
            "large-v3" => Model::LargeV3,
            "large-v3-turbo" => Model::LargeV3Turbo,
            other => Model::Custom(PathBuf::from(other)),
        }
    }
}

/// Options applied when loading the whisper model and decoding each request.
#[derive(Debug, Clone)]
pub struct TranscribeOptions {
    pub model: Model,
    pub language: Language,
    pub translate: bool,
    pub n_threads: Option<u32>,
    pub gpu: bool,
    pub temperature: f32,
    pub beam_size: Option<u32>,
    pub cache_dir: Option<PathBuf>,
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self {
            model: Model::Base,
            language: Language::Auto,
            translate: false,
            n_threads: None,
            gpu: true,
            temperature: 0.0,
            beam_size: None,
            cache_dir: None,
        }
    }
}

impl TranscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    /// Set the language. Accepts codes ("en") or full names ("english").
    pub fn language(mut self, lang: &str) -> Result<Self, Error> {
        self.language = Language::new(lang)?;
        Ok(self)
    }

    pub fn translate(mut self, translate: bool) -> Self {
        self.translate = translate;
        self
    }

    pub fn n_threads(mut self, n: u32) -> Result<Self, Error> {
        if n == 0 {
            return Err(Error::Model("thread count must be at least 1".into()));
        }
        self.n_threads = Some(n);
        Ok(self)
    }

    pub fn gpu(mut self, enabled: bool) -> Self {
        self.gpu = enabled;
        self
    }

    pub fn beam_size(mut self, size: u32) -> Self {
        self.beam_size = Some(size);
        self
    }

    pub fn cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = Some(dir);
        self
    }

    /// Resolve the cache directory, defaulting to ~/.cache/recap/models.
    pub fn resolve_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("recap")
                .join("models")
        })
    }
}

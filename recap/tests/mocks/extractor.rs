use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use recap::audio::audio_path_for;
use recap::{AudioExtractor, Error, Result};

#[derive(Clone, Default)]
pub struct MockExtractor {
    pub fail_with: Option<String>,
    pub calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockExtractor {
    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Self::default()
        }
    }
}

impl AudioExtractor for MockExtractor {
    async fn extract(&self, video_path: &Path) -> Result<PathBuf> {
        self.calls.lock().unwrap().push(video_path.to_path_buf());

        let audio_path = audio_path_for(video_path);
        std::fs::write(&audio_path, b"RIFF")?;

        if let Some(ref msg) = self.fail_with {
            return Err(Error::AudioExtraction(msg.clone()));
        }
        Ok(audio_path)
    }
}

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use recap::{Error, Result, Segment, Transcriber, Transcript};

#[derive(Clone)]
pub struct MockTranscriber {
    pub segments: Vec<String>,
    pub fail_with: Option<String>,
    /// Each audio path seen, with whether it existed at call time.
    pub calls: Arc<Mutex<Vec<(PathBuf, bool)>>>,
}

impl MockTranscriber {
    pub fn new(segments: &[&str]) -> Self {
        Self {
            segments: segments.iter().map(|s| s.to_string()).collect(),
            fail_with: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Self::new(&[])
        }
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, audio_path: &Path) -> Result<Transcript> {
        self.calls
            .lock()
            .unwrap()
            .push((audio_path.to_path_buf(), audio_path.exists()));

        if let Some(ref msg) = self.fail_with {
            return Err(Error::Transcription(msg.clone()));
        }

        let segments = self
            .segments
            .iter()
            .enumerate()
            .map(|(i, text)| Segment {
                start: i as f64,
                end: (i + 1) as f64,
                text: text.clone(),
            })
            .collect::<Vec<_>>();

        Ok(Transcript {
            duration: segments.len() as f64,
            segments,
            language: "en".into(),
            model: "mock-whisper".into(),
        })
    }
}

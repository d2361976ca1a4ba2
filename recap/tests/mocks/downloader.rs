use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use recap::{Downloader, Error, Preset, Result};

/// Fails the first `fail_first` presets, then writes `file_name` into the
/// output directory.
#[derive(Clone)]
pub struct MockDownloader {
    pub file_name: String,
    pub fail_first: usize,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockDownloader {
    pub fn new(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            fail_first: 0,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_first(file_name: &str, n: usize) -> Self {
        Self {
            fail_first: n,
            ..Self::new(file_name)
        }
    }

    pub fn failing() -> Self {
        Self::failing_first("never.mp4", usize::MAX)
    }
}

impl Downloader for MockDownloader {
    async fn download(&self, _url: &str, preset: &Preset, output_dir: &Path) -> Result<PathBuf> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(preset.name.to_string());
            calls.len()
        };

        // leave a partial file behind the way a killed download would
        std::fs::write(output_dir.join(format!("{}.part", preset.name)), b"partial")?;

        if attempt <= self.fail_first {
            return Err(Error::Download(format!("HTTP Error 403 on {}", preset.name)));
        }

        let path = output_dir.join(&self.file_name);
        std::fs::write(&path, b"media")?;
        Ok(path)
    }
}

use std::io::Write;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::config::Model;
use crate::error::{Error, Result};

const HUGGINGFACE_BASE: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Anything smaller is an HTML error page, not ggml weights.
const MIN_MODEL_BYTES: u64 = 1_000_000;

/// Make sure the weights for `model` exist on disk and return their path.
///
/// Named models are fetched into `cache_dir` on first use; custom models
/// must already exist.
pub async fn ensure_model(model: &Model, cache_dir: &Path) -> Result<PathBuf> {
    if let Model::Custom(path) = model {
        return if path.exists() {
            Ok(path.clone())
        } else {
            Err(Error::ModelNotFound { path: path.clone() })
        };
    }

    let model_path = cache_dir.join(model.filename());
    if model_path.exists() {
        info!(path = %model_path.display(), "using cached model");
        return Ok(model_path);
    }

    tokio::fs::create_dir_all(cache_dir).await.map_err(|e| {
        Error::Model(format!(
            "failed to create cache dir {}: {e}",
            cache_dir.display()
        ))
    })?;

    let url = format!("{HUGGINGFACE_BASE}/{}", model.filename());
    info!(%url, model = model.name(), "model not cached, downloading");
    fetch_weights(&url, &model_path).await?;

    Ok(model_path)
}

async fn fetch_weights(url: &str, dest: &Path) -> Result<()> {
    let response = reqwest::get(url)
        .await?
        .error_for_status()
        .map_err(|e| Error::ModelDownload(format!("HTTP error: {e}")))?;

    let expected = response.content_length().unwrap_or(0);
    let progress = ProgressBar::new(expected);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{msg} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
    ) {
        progress.set_style(style.progress_chars("#>-"));
    }
    progress.set_message(format!("Fetching {}", dest.display()));

    let part_path = dest.with_extension("bin.part");
    let mut file = std::fs::File::create(&part_path)?;
    let mut body = response.bytes_stream();
    let mut received: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        received += chunk.len() as u64;
        progress.set_position(received);
    }
    file.flush()?;
    drop(file);

    if received < MIN_MODEL_BYTES {
        std::fs::remove_file(&part_path).ok();
        return Err(Error::ModelDownload(format!(
            "received only {received} bytes — likely an error page"
        )));
    }

    if expected > 0 && received != expected {
        warn!(expected, received, "model size differs from Content-Length");
    }

    std::fs::rename(&part_path, dest)?;
    progress.finish_with_message("Model ready");
    info!(path = %dest.display(), size = received, "model saved");
    Ok(())
}

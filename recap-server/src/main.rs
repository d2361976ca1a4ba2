mod config;
mod routes;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use recap::{
    model, FfmpegExtractor, MediaTools, Pipeline, SourceResolver, Summarizer, WhisperTranscriber,
    YtDlp, DEFAULT_PRESETS,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("recap=info,recap_server=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = cli
        .transcribe_options()
        .context("invalid transcription options")?;

    let tools = MediaTools::discover(cli.ffmpeg.clone(), cli.yt_dlp.clone())
        .await
        .context("media tools unavailable")?;

    let model_path = model::ensure_model(&options.model, &options.resolve_cache_dir())
        .await
        .with_context(|| format!("failed to prepare model {}", options.model.name()))?;

    let ffmpeg = tools.ffmpeg.clone();
    let transcriber =
        tokio::task::spawn_blocking(move || WhisperTranscriber::load(&model_path, ffmpeg, options))
            .await
            .context("model loading task failed")?
            .context("failed to load whisper model")?;

    let mut downloader = YtDlp::new(tools.yt_dlp.clone().unwrap_or_else(|| "yt-dlp".into()));
    if let Some(dir) = tools.ffmpeg_location() {
        downloader = downloader.with_ffmpeg_location(dir);
    }

    for dir in [&cli.work_dir, &cli.upload_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let summarizer = Summarizer::new(cli.openai_client());
    info!(
        external_summaries = summarizer.has_external(),
        "summarizer ready"
    );

    let pipeline = Pipeline::new(
        SourceResolver::new(
            downloader,
            DEFAULT_PRESETS,
            cli.work_dir.clone(),
            cli.upload_dir.clone(),
        ),
        FfmpegExtractor::new(&tools.ffmpeg),
        Arc::new(transcriber),
        summarizer,
    );
    let app = routes::router(
        pipeline,
        routes::RouterOptions {
            body_limit: cli.upload_limit_bytes(),
            upload_dir: cli.upload_dir.clone(),
            index_file: cli.index_file.clone(),
        },
    );

    let listener = tokio::net::TcpListener::bind(cli.addr)
        .await
        .with_context(|| format!("failed to bind {}", cli.addr))?;
    info!(addr = %cli.addr, "recap-server listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

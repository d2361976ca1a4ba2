//! Run the full pipeline on a URL or a local video and print the summary.
//!
//! Usage: cargo run --example summarize -- <url-or-video-file>

use std::sync::Arc;

use recap::{
    FfmpegExtractor, OpenAiClient, Pipeline, Request, Source, SourceResolver, Summarizer,
    TranscribeOptions, WhisperTranscriber, YtDlp, DEFAULT_PRESETS,
};

#[tokio::main]
async fn main() -> recap::Result<()> {
    let input = std::env::args()
        .nth(1)
        .expect("usage: summarize <url-or-video-file>");

    let source = if input.starts_with("http://") || input.starts_with("https://") {
        Source::Url(input)
    } else {
        let file_name = std::path::Path::new(&input)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Source::Upload {
            file_name,
            bytes: tokio::fs::read(&input).await?,
        }
    };

    let opts = TranscribeOptions::default();
    let model_path = recap::model::ensure_model(&opts.model, &opts.resolve_cache_dir()).await?;
    let transcriber = WhisperTranscriber::load(&model_path, "ffmpeg", opts)?;

    let scratch = std::env::temp_dir().join("recap-example");
    let external = std::env::var("OPENAI_API_KEY").ok().map(OpenAiClient::new);
    let use_openai = external.is_some();

    let pipeline = Pipeline::new(
        SourceResolver::new(
            YtDlp::new("yt-dlp"),
            DEFAULT_PRESETS,
            scratch.join("temp"),
            scratch.join("uploads"),
        ),
        FfmpegExtractor::new("ffmpeg"),
        Arc::new(transcriber),
        Summarizer::new(external),
    );

    let digest = pipeline.run(Request { source, use_openai }).await?;
    println!("{}\n\n---\n\n{}", digest.summary, digest.transcript);

    Ok(())
}

//! Transcribe a local audio file and print timed segments.
//!
//! Usage: cargo run --example transcribe -- path/to/audio.wav [model]

use recap::{Model, TranscribeOptions, Transcriber, WhisperTranscriber};

#[tokio::main]
async fn main() -> recap::Result<()> {
    let mut args = std::env::args().skip(1);
    let path = args.next().expect("usage: transcribe <audio-file> [model]");
    let model = args.next().map(|m| Model::parse(&m)).unwrap_or(Model::Base);

    let opts = TranscribeOptions::new().model(model);
    let model_path = recap::model::ensure_model(&opts.model, &opts.resolve_cache_dir()).await?;
    let transcriber = WhisperTranscriber::load(&model_path, "ffmpeg", opts)?;

    let transcript = transcriber.transcribe(std::path::Path::new(&path))?;
    for segment in &transcript.segments {
        println!("[{:.1}s - {:.1}s] {}", segment.start, segment.end, segment.text.trim());
    }
    eprintln!("language: {}, duration: {:.1}s", transcript.language, transcript.duration);

    Ok(())
}

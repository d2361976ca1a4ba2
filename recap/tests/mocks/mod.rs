#![allow(dead_code)]

pub mod completion;
pub mod downloader;
pub mod extractor;
pub mod transcriber;

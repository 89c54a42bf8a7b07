use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("failed to open video {path}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("{0}")]
    Unsupported(String),
    #[error("video backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("failed to initialize hand landmarker: {0}")]
    Init(String),
    #[error("timestamps must increase: got {current} ms after {previous} ms")]
    NonMonotonicTimestamp { previous: u64, current: u64 },
    #[error("hand landmark inference failed: {0}")]
    Inference(String),
}

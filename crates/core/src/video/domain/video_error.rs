use std::path::PathBuf;

use thiserror::Error;

/// Failures of frame sources and overlay sinks.
#[derive(Debug, Error)]
pub enum VideoError {
    #[error("failed to open {path}: {message}")]
    Open { path: PathBuf, message: String },
    #[error("no video stream found in {0}")]
    NoVideoStream(PathBuf),
    #[error("frame source is not open")]
    NotOpen,
    #[error("failed to decode frame {index}: {message}")]
    Decode { index: usize, message: String },
    #[error("failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

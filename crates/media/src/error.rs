//! Error types for media access.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from opening or reading media.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Cannot open media: {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("No video stream: {path}")]
    NoVideo { path: PathBuf },

    #[error("Decode produced no image: {path}")]
    DecodeFailed { path: PathBuf },
}

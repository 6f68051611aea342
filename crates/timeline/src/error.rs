//! Error types for composition loading and validation.

use thiserror::Error;

/// Errors from building or loading a composition.
#[derive(Error, Debug)]
pub enum TimelineError {
    #[error("Invalid composition: {reason}")]
    InvalidComposition { reason: String },

    #[error("Item has no usable duration: {name}")]
    MissingDuration { name: String },

    #[error("Unsupported document schema: {schema}")]
    UnsupportedSchema { schema: String },

    #[error("Malformed document: {reason}")]
    MalformedDocument { reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

//! Error types for player construction.

use thiserror::Error;

use rp_media::MediaError;
use rp_timeline::TimelineError;

/// Errors surfaced when creating a [`Player`](crate::Player).
///
/// Errors during frame serving never reach the caller as errors: they are
/// logged by the scheduler and reflected as empty or partial frames.
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Composition error: {0}")]
    Composition(#[from] TimelineError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),
}

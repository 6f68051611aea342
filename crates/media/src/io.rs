//! The I/O system interface the engine opens media through.

use std::path::Path;
use std::sync::Arc;

use crate::error::MediaError;
use crate::options::Options;
use crate::read::VideoRead;

/// Resolves paths to readers. Implementations own format detection and
/// codec selection; the engine only sees the [`VideoRead`] capability set.
pub trait IoSystem: Send + Sync {
    /// Open a reader for `path`, or fail with [`MediaError::OpenFailed`].
    fn read(&self, path: &Path, options: &Options) -> Result<Arc<dyn VideoRead>, MediaError>;
}

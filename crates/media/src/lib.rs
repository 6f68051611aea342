//! `rp-media` — Media access interfaces for the ReelPlay engine.
//!
//! The engine never touches codecs directly; it opens media through an
//! [`IoSystem`] and consumes the [`VideoRead`] capability set:
//!
//! - **Readers**: `VideoRead`, `PendingVideo` (non-blocking one-shot
//!   futures), `VideoFrame`
//! - **Metadata**: `MediaInfo`, `MediaKind`
//! - **Options**: string-keyed open options, forwarded verbatim
//! - **Synthetic I/O**: `MemoryIo` / `MemoryReader` — an in-memory
//!   implementation with a real decode worker thread, used by tests and
//!   demos

pub mod error;
pub mod info;
pub mod io;
pub mod memory;
pub mod options;
pub mod read;

// Re-export primary API
pub use error::MediaError;
pub use info::{MediaInfo, MediaKind};
pub use io::IoSystem;
pub use memory::{MemoryIo, MemoryMedia, MemoryReader};
pub use options::{option_f64, Options, SEQUENCE_DEFAULT_SPEED};
pub use read::{PendingVideo, VideoFrame, VideoPromise, VideoRead};

//! `rp-player` — The frame-serving pipeline of the ReelPlay engine.
//!
//! Given a composition (or a bare media file) the [`Player`] resolves
//! frame requests into composited [`Frame`](rp_common::Frame)s:
//!
//! ```text
//! caller ──> request queue ──> scheduler thread ──> composition walker
//!                                   │                      │
//!                                   │              reader registry
//!                                   │                      │
//!                                   └──── poll <── reader futures
//! ```
//!
//! - Requests are dispatched in submission order with a bounded in-flight
//!   budget (default 16); completion order is not guaranteed.
//! - Reader lifetimes follow the caller's active-range set: a reader
//!   survives while its clip's effective range intersects any range.
//! - Cancellation and teardown resolve every outstanding future; callers
//!   never see a hung frame.

pub mod error;
pub mod future;
pub mod player;

mod registry;
mod scheduler;

// Re-export primary API
pub use error::PlayerError;
pub use future::FrameFuture;
pub use player::{Player, PlayerStats};

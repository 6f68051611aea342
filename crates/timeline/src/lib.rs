//! `rp-timeline` — Composition model and walker for the ReelPlay engine.
//!
//! This crate owns the read-only edit-list composition consumed by the
//! frame scheduler:
//!
//! - **Model**: `Composition`, `Track`, `Item` (clip / gap / transition),
//!   dense `ClipId` addressing
//! - **Document**: edit-list JSON loading (`document::from_json_file`)
//! - **Walker**: `video_layers` resolves visible clips and transition
//!   phases at a presentation time; `media_time` maps track time into a
//!   clip's media clock; `effective_range` drives reader lifetimes

pub mod document;
pub mod error;
pub mod model;
pub mod walker;

// Re-export primary API
pub use error::TimelineError;
pub use model::{
    Clip, ClipId, Composition, Gap, Item, MediaReference, Track, TrackKind, Transition,
};
pub use walker::{effective_range, media_time, video_layers, VideoLayer};

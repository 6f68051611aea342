//! `rp-common` — Shared types for the ReelPlay playback engine.
//!
//! This crate is the foundation the other engine crates depend on:
//!
//! - **Time**: `RationalTime`, `TimeRange`, `TimeTransform` — exact rational
//!   arithmetic for frame-accurate playback
//! - **Images**: `PixelFormat`, `Resolution`, `ImageInfo`, `Image`
//! - **Frames**: `Frame`, `FrameLayer`, `TransitionKind` — the scheduler's
//!   output, consumed by the renderer

pub mod frame;
pub mod image;
pub mod time;

// Re-export commonly used items at crate root
pub use frame::{Frame, FrameLayer, TransitionKind};
pub use image::{Image, ImageInfo, PixelFormat, Resolution, ScanlineOrder};
pub use time::{frames_to_ranges, RationalTime, TimeRange, TimeTransform};

//! Media metadata reported by readers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use rp_common::{ImageInfo, TimeRange};

/// Whether a media source is a numbered image sequence or a container
/// file with embedded streams.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Sequence,
    #[default]
    Container,
}

/// Snapshot of everything a reader knows about its media.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Video stream descriptors, primary stream first. Empty when the
    /// media carries no video.
    pub video: Vec<ImageInfo>,
    /// The time range video frames exist for, in the media's own clock.
    pub video_time_range: TimeRange,
    pub kind: MediaKind,
    /// Free-form metadata (codec names, colorspace hints, ...).
    pub tags: BTreeMap<String, String>,
}

impl MediaInfo {
    pub fn has_video(&self) -> bool {
        !self.video.is_empty()
    }

    /// The media's native video rate.
    pub fn video_rate(&self) -> i64 {
        self.video_time_range.duration.rate
    }
}

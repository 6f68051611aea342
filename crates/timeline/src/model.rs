//! Composition data model: an immutable tree of tracks, clips,
//! transitions, and gaps.
//!
//! The model is deliberately flat: a `Composition` owns a vector of
//! `Track`s, each track owns a vector of `Item`s, and an item is a tagged
//! sum. Clips are addressed by a dense [`ClipId`] assigned in document
//! order, so downstream caches key on a small integer instead of a
//! pointer.
//!
//! Track-time layout: clips and gaps occupy consecutive spans of track
//! time; transitions sit *between* two items, occupy zero track time, and
//! describe how far the dissolve reaches into each neighbor.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use rp_common::{RationalTime, TimeRange, TransitionKind};

use crate::error::TimelineError;

/// Dense index of a clip within a composition, in document order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClipId(pub u32);

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clip#{}", self.0)
    }
}

/// Reference from a clip to its media source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MediaReference {
    /// A single media file. The URL is treated as a local filesystem path.
    External { url: String },
    /// A numbered image sequence described by a filename pattern.
    Sequence {
        /// Directory (or URL base) holding the sequence.
        base: String,
        /// Filename part before the frame number.
        prefix: String,
        /// Filename part after the frame number (usually the extension).
        suffix: String,
        /// Frame number of the first file.
        start_frame: i64,
        /// Zero padding width of the frame number.
        padding: usize,
        /// Native rate of the sequence.
        rate: i64,
    },
}

impl MediaReference {
    /// Resolve the reference to a filesystem path.
    ///
    /// For sequences this renders the pattern at `start_frame`, which is the
    /// path handed to the I/O system to open the whole sequence.
    pub fn path(&self) -> PathBuf {
        match self {
            Self::External { url } => PathBuf::from(url),
            Self::Sequence {
                base,
                prefix,
                suffix,
                start_frame,
                padding,
                ..
            } => {
                let name = format!("{}{:0width$}{}", prefix, start_frame, suffix, width = *padding);
                if base.is_empty() {
                    PathBuf::from(name)
                } else {
                    PathBuf::from(base).join(name)
                }
            }
        }
    }
}

/// A time-trimmed window into a media source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub name: String,
    pub media: MediaReference,
    /// Window into the media, in the media reference's clock.
    pub source_range: TimeRange,
    /// Linear speed scalars, applied clip-level in order.
    pub time_scalars: Vec<f64>,
}

impl Clip {
    pub fn new(name: impl Into<String>, media: MediaReference, source_range: TimeRange) -> Self {
        Self {
            name: name.into(),
            media,
            source_range,
            time_scalars: Vec::new(),
        }
    }
}

/// Empty track time between items.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub duration: RationalTime,
}

/// A blend region between the two neighboring items.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub name: String,
    pub kind: TransitionKind,
    /// How far the region reaches back into the left neighbor.
    pub in_offset: RationalTime,
    /// How far the region reaches forward into the right neighbor.
    pub out_offset: RationalTime,
}

/// One element of a track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Clip(Clip),
    Gap(Gap),
    Transition(Transition),
}

impl Item {
    /// Track time this item occupies. Transitions occupy none.
    pub fn duration(&self) -> Option<RationalTime> {
        match self {
            Self::Clip(clip) => Some(clip.source_range.duration),
            Self::Gap(gap) => Some(gap.duration),
            Self::Transition(_) => None,
        }
    }

    pub fn as_clip(&self) -> Option<&Clip> {
        match self {
            Self::Clip(clip) => Some(clip),
            _ => None,
        }
    }

    pub fn as_transition(&self) -> Option<&Transition> {
        match self {
            Self::Transition(transition) => Some(transition),
            _ => None,
        }
    }
}

/// Track content kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
}

/// An ordered sequence of items sharing one track-time axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub kind: TrackKind,
    items: Vec<Item>,
}

impl Track {
    pub fn new(kind: TrackKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            items: Vec::new(),
        }
    }

    pub fn push(&mut self, item: Item) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// The track-time range the item at `index` occupies.
    ///
    /// Returns `None` for transitions (they occupy no track time) and
    /// out-of-range indices.
    pub fn range_in_track(&self, index: usize) -> Option<TimeRange> {
        let mut cursor: Option<RationalTime> = None;
        for (i, item) in self.items.iter().enumerate() {
            let Some(duration) = item.duration() else {
                if i == index {
                    return None;
                }
                continue;
            };
            let start = cursor.unwrap_or(RationalTime::new(0, duration.rate));
            if i == index {
                return Some(TimeRange::new(start, duration));
            }
            cursor = Some(start + duration);
        }
        None
    }

    /// The elements immediately before and after the item at `index`.
    pub fn neighbors(&self, index: usize) -> (Option<&Item>, Option<&Item>) {
        let prev = index.checked_sub(1).and_then(|i| self.items.get(i));
        let next = self.items.get(index + 1);
        (prev, next)
    }

    /// Total track time occupied by this track's items.
    pub fn duration(&self) -> RationalTime {
        let mut cursor: Option<RationalTime> = None;
        for item in &self.items {
            if let Some(duration) = item.duration() {
                let start = cursor.unwrap_or(RationalTime::new(0, duration.rate));
                cursor = Some(start + duration);
            }
        }
        cursor.unwrap_or(RationalTime::ZERO)
    }
}

/// A parsed edit-list composition: one stack of tracks plus the global
/// start time. Immutable once constructed; only [`Composition::new`] can
/// build one, so the clip index always matches the tracks.
#[derive(Clone, Debug, PartialEq)]
pub struct Composition {
    tracks: Vec<Track>,
    global_start: RationalTime,
    /// `ClipId -> (track, item)` lookup, in document order.
    clip_index: Vec<(u32, u32)>,
}

impl Composition {
    /// Build and validate a composition.
    ///
    /// Every clip must carry a non-negative source range and transition
    /// offsets must be non-negative; otherwise the document cannot be
    /// scheduled and this returns an error.
    pub fn new(tracks: Vec<Track>, global_start: RationalTime) -> Result<Self, TimelineError> {
        let mut clip_index = Vec::new();
        for (ti, track) in tracks.iter().enumerate() {
            for (ii, item) in track.items().iter().enumerate() {
                match item {
                    Item::Clip(clip) => {
                        if clip.source_range.duration.value < 0 {
                            return Err(TimelineError::MissingDuration {
                                name: clip.name.clone(),
                            });
                        }
                        clip_index.push((ti as u32, ii as u32));
                    }
                    Item::Gap(gap) => {
                        if gap.duration.value < 0 {
                            return Err(TimelineError::InvalidComposition {
                                reason: format!("negative gap duration in track {}", track.name),
                            });
                        }
                    }
                    Item::Transition(transition) => {
                        if transition.in_offset.value < 0 || transition.out_offset.value < 0 {
                            return Err(TimelineError::InvalidComposition {
                                reason: format!(
                                    "negative transition offset: {}",
                                    transition.name
                                ),
                            });
                        }
                    }
                }
            }
        }
        Ok(Self {
            tracks,
            global_start,
            clip_index,
        })
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn global_start(&self) -> RationalTime {
        self.global_start
    }

    /// The composition rate (the global start time's rate).
    pub fn rate(&self) -> i64 {
        self.global_start.rate
    }

    /// Total duration: the longest track, at the composition rate.
    pub fn duration(&self) -> RationalTime {
        let mut out = RationalTime::new(0, self.rate());
        for track in &self.tracks {
            let duration = track.duration().rescaled_to(self.rate());
            if duration > out {
                out = duration;
            }
        }
        out
    }

    pub fn clip_count(&self) -> usize {
        self.clip_index.len()
    }

    /// Clip ids in document order.
    pub fn clip_ids(&self) -> impl Iterator<Item = ClipId> {
        (0..self.clip_index.len() as u32).map(ClipId)
    }

    pub fn clip(&self, id: ClipId) -> &Clip {
        let (ti, ii) = self.clip_location(id);
        self.tracks[ti].items()[ii]
            .as_clip()
            .expect("clip index entries always point at clips")
    }

    /// The `(track, item)` position of a clip.
    pub fn clip_location(&self, id: ClipId) -> (usize, usize) {
        let (ti, ii) = self.clip_index[id.0 as usize];
        (ti as usize, ii as usize)
    }

    /// The clip id at a `(track, item)` position, if that item is a clip.
    pub fn clip_id_at(&self, track: usize, item: usize) -> Option<ClipId> {
        let key = (track as u32, item as u32);
        self.clip_index
            .binary_search(&key)
            .ok()
            .map(|i| ClipId(i as u32))
    }
}

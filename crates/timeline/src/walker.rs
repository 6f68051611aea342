//! Composition walker: resolves which clips are visible at a presentation
//! time and how neighboring transitions blend them.
//!
//! The walker is pure — it never touches I/O. For each video track it
//! yields one [`VideoLayer`] per item whose track range contains the
//! time (gaps yield imageless layers), annotated with the neighbor
//! transition, its phase, and the clip on the far side of the blend.
//! [`media_time`] then maps a track time into a clip's media clock,
//! applying the clip's linear speed warps and snapping to the media's
//! frame grid.

use std::mem;

use rp_common::{RationalTime, TimeRange, TimeTransform, TransitionKind};

use crate::model::{ClipId, Composition, Item, TrackKind};

/// One layer the scheduler must assemble for a frame request.
///
/// `clip` is the primary source (`None` for gaps); inside a transition
/// region `clip_b` names the secondary source and `transition_value` the
/// blend phase in `[0, 1]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VideoLayer {
    pub clip: Option<ClipId>,
    pub clip_b: Option<ClipId>,
    pub transition: TransitionKind,
    pub transition_value: f32,
}

fn transition_value(frame: f64, a: f64, b: f64) -> f32 {
    ((frame - a) / (b - a)) as f32
}

/// Enumerate the visible layers at presentation time `time`, in track
/// order (bottom to top).
pub fn video_layers(comp: &Composition, time: RationalTime) -> Vec<VideoLayer> {
    let track_time = time - comp.global_start();
    let rate = track_time.rate;
    let t = track_time.value as f64;

    let mut out = Vec::new();
    for (ti, track) in comp.tracks().iter().enumerate() {
        if track.kind != TrackKind::Video {
            continue;
        }
        for (ii, item) in track.items().iter().enumerate() {
            if matches!(item, Item::Transition(_)) {
                continue;
            }
            let Some(range) = track.range_in_track(ii) else {
                continue;
            };
            if !range.contains(track_time) {
                continue;
            }

            let mut layer = VideoLayer::default();
            if matches!(item, Item::Clip(_)) {
                layer.clip = comp.clip_id_at(ti, ii);
            }

            let (prev, next) = track.neighbors(ii);

            // Reaching into the right neighbor's transition region.
            if let Some(transition) = next.and_then(Item::as_transition) {
                if track_time > range.end_inclusive() - transition.in_offset {
                    let end = range.end_inclusive().value_at(rate);
                    layer.transition = transition.kind;
                    layer.transition_value = transition_value(
                        t,
                        end - transition.in_offset.value_at(rate),
                        end + transition.out_offset.value_at(rate) + 1.0,
                    );
                    layer.clip_b = comp.clip_id_at(ti, ii + 2);
                }
            }

            // Reaching into the left neighbor's transition region. The far
            // clip becomes the primary image and this item the secondary.
            if let Some(transition) = prev.and_then(Item::as_transition) {
                if track_time < range.start + transition.out_offset {
                    mem::swap(&mut layer.clip, &mut layer.clip_b);
                    let start = range.start.value_at(rate);
                    layer.transition = transition.kind;
                    layer.transition_value = transition_value(
                        t,
                        start - transition.in_offset.value_at(rate) - 1.0,
                        start + transition.out_offset.value_at(rate),
                    );
                    layer.clip = ii
                        .checked_sub(2)
                        .and_then(|left| comp.clip_id_at(ti, left));
                }
            }

            out.push(layer);
        }
    }
    out
}

/// Map a track time into a clip's media clock.
///
/// The media start is the clip's trimmed start pulled back by any left
/// transition handle; the clip's linear speed warps are composed
/// left-to-right and applied around that start; the result is rescaled to
/// `media_rate` and floored to the frame grid.
pub fn media_time(
    comp: &Composition,
    id: ClipId,
    track_time: RationalTime,
    media_rate: i64,
) -> RationalTime {
    let (ti, ii) = comp.clip_location(id);
    let track = &comp.tracks()[ti];
    let clip = comp.clip(id);
    let range = track
        .range_in_track(ii)
        .expect("clips always occupy a track range");

    let mut start_media = clip.source_range.start;
    if let (Some(transition), _) = track.neighbors(ii) {
        if let Some(transition) = transition.as_transition() {
            start_media = start_media - transition.in_offset;
        }
    }

    // Track time -> clip-local time.
    let clip_local = clip.source_range.start + (track_time - range.start);

    let mut warp = TimeTransform::IDENTITY;
    for &scalar in &clip.time_scalars {
        warp = TimeTransform::scaling(scalar).applied_to(warp);
    }

    let rate = clip_local.rate;
    let start = start_media.value_at(rate);
    let warped = start + warp.apply_value(clip_local.value as f64 - start, rate);

    RationalTime::from_seconds_floor(warped / rate as f64, media_rate)
}

/// The global time range during which a clip's reader must stay open:
/// its track range extended by neighbor transition handles on both
/// sides, shifted by the composition's global start.
pub fn effective_range(comp: &Composition, id: ClipId) -> TimeRange {
    let (ti, ii) = comp.clip_location(id);
    let track = &comp.tracks()[ti];
    let range = track
        .range_in_track(ii)
        .expect("clips always occupy a track range");

    let mut start = range.start;
    let mut end = range.end_exclusive();
    let (prev, next) = track.neighbors(ii);
    if let Some(transition) = prev.and_then(Item::as_transition) {
        start = start - transition.in_offset;
    }
    if let Some(transition) = next.and_then(Item::as_transition) {
        end = end + transition.out_offset;
    }

    let global = comp.global_start();
    TimeRange::from_start_end_exclusive(global + start, global + end)
}

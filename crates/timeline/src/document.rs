//! Edit-list document loading.
//!
//! Parses the industry-standard edit-list JSON (timeline / stack / track /
//! clip / transition / gap, with `{value, rate}` rational-time fields) into
//! a [`Composition`]. Parsing walks `serde_json::Value` directly so schema
//! version suffixes (`"Clip.2"`) and unknown optional fields are tolerated.
//! Serialization back to the document format is delegated to the authoring
//! tools that own the schema.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::warn;

use rp_common::{RationalTime, TimeRange, TransitionKind};

use crate::error::TimelineError;
use crate::model::{Clip, Composition, Gap, Item, MediaReference, Track, TrackKind};

/// File extensions recognized as edit-list documents.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["otio"];

/// Load a composition from a document file.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Composition, TimelineError> {
    let text = fs::read_to_string(path)?;
    from_json_str(&text)
}

/// Load a composition from document text.
pub fn from_json_str(text: &str) -> Result<Composition, TimelineError> {
    let root: Value = serde_json::from_str(text)?;
    parse_timeline(&root)
}

/// The schema name with its version suffix stripped: `"Clip.2"` -> `"Clip"`.
fn schema_base(value: &Value) -> &str {
    value
        .get("OTIO_SCHEMA")
        .and_then(Value::as_str)
        .map(|s| s.split('.').next().unwrap_or(s))
        .unwrap_or("")
}

fn missing(field: &str, context: &str) -> TimelineError {
    TimelineError::MalformedDocument {
        reason: format!("missing {field} in {context}"),
    }
}

fn parse_time(value: &Value, context: &str) -> Result<RationalTime, TimelineError> {
    let number = value
        .get("value")
        .and_then(Value::as_f64)
        .ok_or_else(|| missing("value", context))?;
    let rate = value
        .get("rate")
        .and_then(Value::as_f64)
        .ok_or_else(|| missing("rate", context))?;
    if rate <= 0.0 {
        return Err(TimelineError::MalformedDocument {
            reason: format!("non-positive rate in {context}"),
        });
    }
    Ok(RationalTime::new(number.round() as i64, rate.round() as i64))
}

fn parse_range(value: &Value, context: &str) -> Result<TimeRange, TimelineError> {
    let start = parse_time(
        value.get("start_time").ok_or_else(|| missing("start_time", context))?,
        context,
    )?;
    let duration = parse_time(
        value.get("duration").ok_or_else(|| missing("duration", context))?,
        context,
    )?;
    Ok(TimeRange::new(start, duration))
}

fn parse_media_reference(value: &Value, clip_name: &str) -> Result<MediaReference, TimelineError> {
    match schema_base(value) {
        "ExternalReference" => {
            let url = value
                .get("target_url")
                .and_then(Value::as_str)
                .ok_or_else(|| missing("target_url", clip_name))?;
            Ok(MediaReference::External { url: url.to_string() })
        }
        "ImageSequenceReference" => Ok(MediaReference::Sequence {
            base: value
                .get("target_url_base")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            prefix: value
                .get("name_prefix")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            suffix: value
                .get("name_suffix")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            start_frame: value
                .get("start_frame")
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
                .round() as i64,
            padding: value
                .get("frame_zero_padding")
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
                .round() as usize,
            rate: value
                .get("rate")
                .and_then(Value::as_f64)
                .unwrap_or(24.0)
                .round() as i64,
        }),
        other => Err(TimelineError::UnsupportedSchema {
            schema: format!("{other} (media reference of {clip_name})"),
        }),
    }
}

fn parse_clip(value: &Value) -> Result<Clip, TimelineError> {
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let media = parse_media_reference(
        value
            .get("media_reference")
            .ok_or_else(|| missing("media_reference", &name))?,
        &name,
    )?;
    let source_range = match value.get("source_range") {
        Some(range) if !range.is_null() => parse_range(range, &name)?,
        _ => return Err(TimelineError::MissingDuration { name }),
    };

    let mut clip = Clip::new(name, media, source_range);
    if let Some(effects) = value.get("effects").and_then(Value::as_array) {
        for effect in effects {
            if schema_base(effect) == "LinearTimeWarp" {
                if let Some(scalar) = effect.get("time_scalar").and_then(Value::as_f64) {
                    clip.time_scalars.push(scalar);
                }
            }
        }
    }
    Ok(clip)
}

fn parse_transition_kind(name: &str) -> TransitionKind {
    match name {
        "SMPTE_Dissolve" => TransitionKind::Dissolve,
        _ => TransitionKind::None,
    }
}

fn parse_item(value: &Value) -> Result<Option<Item>, TimelineError> {
    match schema_base(value) {
        "Clip" => Ok(Some(Item::Clip(parse_clip(value)?))),
        "Gap" => {
            let duration = if let Some(range) = value.get("source_range") {
                parse_range(range, "gap")?.duration
            } else if let Some(duration) = value.get("duration") {
                parse_time(duration, "gap")?
            } else {
                return Err(missing("source_range", "gap"));
            };
            Ok(Some(Item::Gap(Gap { duration })))
        }
        "Transition" => {
            let name = value
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            let kind = parse_transition_kind(
                value
                    .get("transition_type")
                    .and_then(Value::as_str)
                    .unwrap_or(""),
            );
            let in_offset = parse_time(
                value.get("in_offset").ok_or_else(|| missing("in_offset", &name))?,
                &name,
            )?;
            let out_offset = parse_time(
                value
                    .get("out_offset")
                    .ok_or_else(|| missing("out_offset", &name))?,
                &name,
            )?;
            Ok(Some(Item::Transition(crate::model::Transition {
                name,
                kind,
                in_offset,
                out_offset,
            })))
        }
        other => {
            // Unknown items keep their footprint as empty track time when
            // they declare one; otherwise they are dropped.
            if let Some(range) = value.get("source_range") {
                if !range.is_null() {
                    warn!(schema = other, "unknown track item kept as gap");
                    let duration = parse_range(range, other)?.duration;
                    return Ok(Some(Item::Gap(Gap { duration })));
                }
            }
            warn!(schema = other, "unknown track item dropped");
            Ok(None)
        }
    }
}

fn parse_track(value: &Value) -> Result<Track, TimelineError> {
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let kind = match value.get("kind").and_then(Value::as_str) {
        Some("Audio") => TrackKind::Audio,
        Some("Video") | None => TrackKind::Video,
        Some(other) => {
            warn!(kind = other, track = %name, "unknown track kind treated as audio");
            TrackKind::Audio
        }
    };
    let mut track = Track::new(kind, name);
    if let Some(children) = value.get("children").and_then(Value::as_array) {
        for child in children {
            if let Some(item) = parse_item(child)? {
                track.push(item);
            }
        }
    }
    Ok(track)
}

fn parse_timeline(root: &Value) -> Result<Composition, TimelineError> {
    if schema_base(root) != "Timeline" {
        return Err(TimelineError::UnsupportedSchema {
            schema: schema_base(root).to_string(),
        });
    }

    let stack = root
        .get("tracks")
        .ok_or_else(|| missing("tracks", "timeline"))?;
    if schema_base(stack) != "Stack" {
        return Err(TimelineError::UnsupportedSchema {
            schema: schema_base(stack).to_string(),
        });
    }

    let mut tracks = Vec::new();
    if let Some(children) = stack.get("children").and_then(Value::as_array) {
        for child in children {
            match schema_base(child) {
                "Track" => tracks.push(parse_track(child)?),
                other => {
                    warn!(schema = other, "unknown stack child skipped");
                }
            }
        }
    }

    let global_start = match root.get("global_start_time") {
        Some(time) if !time.is_null() => parse_time(time, "global_start_time")?,
        _ => {
            // Default to zero at the rate the content runs at.
            let rate = tracks
                .iter()
                .flat_map(|t| t.items().iter())
                .find_map(|i| i.duration())
                .map(|d| d.rate)
                .unwrap_or(24);
            RationalTime::new(0, rate)
        }
    };

    Composition::new(tracks, global_start)
}

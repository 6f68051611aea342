//! String-keyed options forwarded to the I/O system on every open.

use std::collections::BTreeMap;

/// Reader open options. Keys the engine does not recognize are forwarded
/// verbatim to the I/O system.
pub type Options = BTreeMap<String, String>;

/// Default playback rate for media that has no intrinsic timing (image
/// sequences). The engine sets this to the timeline rate on every open.
pub const SEQUENCE_DEFAULT_SPEED: &str = "SequenceIO/DefaultSpeed";

/// Parse a numeric option, ignoring unparsable values.
pub fn option_f64(options: &Options, key: &str) -> Option<f64> {
    options.get(key).and_then(|v| v.parse().ok())
}

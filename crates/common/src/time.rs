//! Rational time arithmetic for frame-accurate playback.
//!
//! All time values carry an integer numerator and a positive integer rate.
//! Equality is exact on both fields: `1/24` and `2/48` denote the same
//! instant but are *not* equal, which keeps comparisons frame-accurate and
//! makes rate mismatches visible instead of silently reconciled. Ordering
//! compares the underlying rational.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

/// A point in time expressed as `value / rate` seconds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RationalTime {
    /// Integer numerator (frame count at `rate`).
    pub value: i64,
    /// Ticks per second. Always positive.
    pub rate: i64,
}

impl RationalTime {
    pub const ZERO: Self = Self { value: 0, rate: 1 };

    /// Create a new time value.
    ///
    /// # Panics
    ///
    /// Panics if `rate` is not positive.
    pub fn new(value: i64, rate: i64) -> Self {
        assert!(rate > 0, "rate must be > 0");
        Self { value, rate }
    }

    /// One tick at the given rate (`1/rate` seconds).
    pub fn tick(rate: i64) -> Self {
        Self::new(1, rate)
    }

    pub fn is_zero(self) -> bool {
        self.value == 0
    }

    pub fn to_seconds(self) -> f64 {
        self.value as f64 / self.rate as f64
    }

    /// The exact (pre-snap) numerator this time would have at `rate`.
    ///
    /// Used by the time-warp pipeline, which needs fractional intermediate
    /// values before the final grid snap.
    pub fn value_at(self, rate: i64) -> f64 {
        self.value as f64 * rate as f64 / self.rate as f64
    }

    /// Convert to another rate, snapping down to the target grid.
    ///
    /// The multiplication is exact (i128); the result is floored to the
    /// nearest integer numerator at `rate`.
    pub fn rescaled_to(self, rate: i64) -> Self {
        assert!(rate > 0, "rate must be > 0");
        if rate == self.rate {
            return self;
        }
        let value = (self.value as i128 * rate as i128).div_euclid(self.rate as i128);
        Self {
            value: value as i64,
            rate,
        }
    }

    /// Build a time from seconds, flooring to the grid at `rate`.
    pub fn from_seconds_floor(seconds: f64, rate: i64) -> Self {
        assert!(rate > 0, "rate must be > 0");
        Self {
            value: (seconds * rate as f64).floor() as i64,
            rate,
        }
    }
}

impl Default for RationalTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Ord for RationalTime {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.value as i128 * other.rate as i128;
        let rhs = other.value as i128 * self.rate as i128;
        // Rate tie-break keeps the order consistent with exact equality.
        lhs.cmp(&rhs).then(self.rate.cmp(&other.rate))
    }
}

impl PartialOrd for RationalTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add for RationalTime {
    type Output = Self;
    /// The right operand is rescaled to the left operand's rate.
    fn add(self, rhs: Self) -> Self {
        Self {
            value: self.value + rhs.rescaled_to(self.rate).value,
            rate: self.rate,
        }
    }
}

impl Sub for RationalTime {
    type Output = Self;
    /// The right operand is rescaled to the left operand's rate.
    fn sub(self, rhs: Self) -> Self {
        Self {
            value: self.value - rhs.rescaled_to(self.rate).value,
            rate: self.rate,
        }
    }
}

impl fmt::Display for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.value, self.rate)
    }
}

/// A time range with an inclusive start and a duration.
///
/// Intersection and containment use half-open semantics on
/// `[start, start + duration)`; the inclusive end is one tick before the
/// exclusive end.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: RationalTime,
    pub duration: RationalTime,
}

impl TimeRange {
    pub fn new(start: RationalTime, duration: RationalTime) -> Self {
        Self { start, duration }
    }

    /// Range covering `[start, end)`.
    pub fn from_start_end_exclusive(start: RationalTime, end: RationalTime) -> Self {
        Self {
            start,
            duration: end - start,
        }
    }

    /// Range covering `[start, end]` (duration `end - start + 1` ticks).
    pub fn from_start_end_inclusive(start: RationalTime, end: RationalTime) -> Self {
        let span = end - start;
        Self {
            start,
            duration: RationalTime {
                value: span.value + 1,
                rate: span.rate,
            },
        }
    }

    /// Exclusive end: `start + duration`.
    pub fn end_exclusive(self) -> RationalTime {
        self.start + self.duration
    }

    /// Inclusive end: one tick before the exclusive end.
    pub fn end_inclusive(self) -> RationalTime {
        let end = self.end_exclusive();
        RationalTime {
            value: end.value - 1,
            rate: end.rate,
        }
    }

    pub fn contains(self, time: RationalTime) -> bool {
        time >= self.start && time < self.end_exclusive()
    }

    pub fn intersects(self, other: Self) -> bool {
        self.start < other.end_exclusive() && other.start < self.end_exclusive()
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self {
            start: RationalTime::ZERO,
            duration: RationalTime::ZERO,
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} +{}]", self.start, self.duration)
    }
}

/// A linear time transform: `apply(t) = offset + scale * t`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeTransform {
    pub offset: RationalTime,
    pub scale: f64,
}

impl TimeTransform {
    pub const IDENTITY: Self = Self {
        offset: RationalTime::ZERO,
        scale: 1.0,
    };

    pub fn scaling(scale: f64) -> Self {
        Self {
            offset: RationalTime::ZERO,
            scale,
        }
    }

    /// Compose `self · other` (`self` applied after `other`):
    /// `offset = self.offset + self.scale * other.offset`,
    /// `scale = self.scale * other.scale`.
    ///
    /// The combined offset is snapped down to `self.offset`'s grid, the same
    /// rule rescaling uses.
    pub fn applied_to(self, other: Self) -> Self {
        let rate = self.offset.rate;
        let offset =
            self.offset.value as f64 + self.scale * other.offset.value_at(rate);
        Self {
            offset: RationalTime {
                value: offset.floor() as i64,
                rate,
            },
            scale: self.scale * other.scale,
        }
    }

    /// Apply to a fractional numerator at `rate`, returning the fractional
    /// result. Grid snapping is the caller's final step.
    pub fn apply_value(self, value: f64, rate: i64) -> f64 {
        self.offset.value_at(rate) + self.scale * value
    }
}

impl Default for TimeTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Coalesce a list of frame times into inclusive ranges.
///
/// Consecutive frames (spaced one tick apart) merge into a single range;
/// anything further apart starts a new one. Useful for turning a cached
/// frame list into an active-range set.
pub fn frames_to_ranges(mut frames: Vec<RationalTime>) -> Vec<TimeRange> {
    if frames.is_empty() {
        return Vec::new();
    }
    frames.sort();
    let mut out = Vec::new();
    let mut first = frames[0];
    let mut prev = frames[0];
    for &time in &frames[1..] {
        let step = time.rescaled_to(prev.rate).value - prev.value;
        if step > 1 {
            out.push(TimeRange::from_start_end_inclusive(first, prev));
            first = time;
        }
        prev = time;
    }
    out.push(TimeRange::from_start_end_inclusive(first, prev));
    out
}

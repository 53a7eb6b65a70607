//! Per-camera parameter ranges and controller-to-speed mapping.
//!
//! Every camera declares an inclusive `[min, max]` range for each axis it
//! accepts a speed on (pan, tilt, zoom, focus) and for its preset numbers.
//! The codec clamps speeds into these ranges and rejects preset numbers that
//! fall outside them.

use serde::{Deserialize, Serialize};

/// Inclusive range of values a camera accepts for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedRange {
    pub min: u8,
    pub max: u8,
}

impl SpeedRange {
    pub const fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    /// Number of distinct values in the range (`max - min + 1`).
    pub fn span(&self) -> u32 {
        u32::from(self.max).saturating_sub(u32::from(self.min)) + 1
    }

    pub fn contains(&self, value: u32) -> bool {
        value >= u32::from(self.min) && value <= u32::from(self.max)
    }

    /// Clamps `value` into the range.
    pub fn clamp(&self, value: u32) -> u8 {
        value.clamp(u32::from(self.min), u32::from(self.max)) as u8
    }

    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }
}

/// All ranges declared for one camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraLimits {
    pub pan: SpeedRange,
    pub tilt: SpeedRange,
    pub zoom: SpeedRange,
    pub focus: SpeedRange,
    pub preset: SpeedRange,
}

impl Default for CameraLimits {
    /// Typical limits for a VISCA camera.
    fn default() -> Self {
        Self {
            pan: SpeedRange::new(0x01, 0x18),
            tilt: SpeedRange::new(0x01, 0x14),
            zoom: SpeedRange::new(0x00, 0x07),
            focus: SpeedRange::new(0x00, 0x07),
            preset: SpeedRange::new(0x00, 0xFE),
        }
    }
}

/// How a zoom trigger fraction in `[0, 1]` maps onto the zoom speed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedRounding {
    /// `min + trunc(f * (span - 1))`.  Full deflection reaches `max` exactly.
    #[default]
    Truncate,
    /// `min + trunc(f * span + 0.5) - 1`.  Shifts every threshold by half a step.
    RoundHalfUp,
}

/// Direction of a zoom or focus drive derived from a signed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveDirection {
    /// Zoom in (tele) or focus far.
    Positive,
    /// Zoom out (wide) or focus near.
    Negative,
    Stopped,
}

impl DriveDirection {
    pub fn from_value(value: f64) -> Self {
        if value > 0.0 {
            Self::Positive
        } else if value < 0.0 {
            Self::Negative
        } else {
            Self::Stopped
        }
    }
}

/// Maps a signed zoom input onto a direction and a clamped speed.
///
/// The magnitude of `value` is used; values beyond 1.0 clamp to `range.max`.
pub fn zoom_speed(value: f64, range: SpeedRange, rounding: SpeedRounding) -> (DriveDirection, u8) {
    let direction = DriveDirection::from_value(value);
    let fraction = if value.is_finite() { value.abs() } else { 0.0 };
    let span = f64::from(range.span());
    let raw = match rounding {
        SpeedRounding::Truncate => f64::from(range.min) + (fraction * (span - 1.0)).trunc(),
        SpeedRounding::RoundHalfUp => f64::from(range.min) + (fraction * span + 0.5).trunc() - 1.0,
    };
    let speed = raw.clamp(f64::from(range.min), f64::from(range.max)) as u8;
    (direction, speed)
}

/// Maps an analog stick axis in `[-1, 1]` onto a signed pan or tilt speed.
///
/// Zero stays zero (no motion on that axis).  Any non-zero result has a
/// magnitude of at least `range.min`, so small deflections still move the
/// camera at its slowest speed.
pub fn stick_speed(axis: f64, range: SpeedRange) -> i32 {
    if !axis.is_finite() {
        return 0;
    }
    let min = i32::from(range.min);
    let scaled = (f64::from(range.span()) * axis).trunc() as i32;
    if scaled > 0 {
        (scaled + min - 1).max(min)
    } else if scaled < 0 {
        (scaled - (min - 1)).min(-min)
    } else {
        0
    }
}

//! Motion accumulator: converts per-device relative deltas into absolute
//! positions.
//!
//! One parameterized [`advance`] function serves both consumption modes. The
//! batch/export mode uses a profile with no clamping and no Y inversion — a
//! faithful unbounded sum of raw deltas for offline analysis. The live mode
//! inverts Y (raw devices report positive-down, screens render positive-up in
//! the original consumer's convention) and clamps both axes inside a screen
//! border. Keeping one function means the shaping math is tested once and
//! cannot diverge between the two paths.
//!
//! # Acceleration policy
//!
//! The threshold is compared against each *scaled* axis independently: a fast
//! horizontal flick accelerates X without touching Y. Applying the multiplier
//! on combined magnitude instead would change diagonal behavior; the per-axis
//! policy is the one the engine commits to.

use serde::{Deserialize, Serialize};

use crate::domain::registry::{DeviceHandle, TrackedPointer};
use crate::wire::RawEvent;

/// Screen-bound clamping parameters for live mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClampRegion {
    /// Pixels kept free at every screen edge.
    pub border: f64,
    /// Screen width in pixels.
    pub width: f64,
    /// Screen height in pixels.
    pub height: f64,
}

impl ClampRegion {
    fn clamp_x(&self, x: f64) -> f64 {
        x.clamp(self.border, self.width - self.border)
    }

    fn clamp_y(&self, y: f64) -> f64 {
        y.clamp(self.border, self.height - self.border)
    }
}

/// Session-level shaping configuration applied by [`advance`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionProfile {
    /// Default per-device delta multiplier for newly created pointers.
    pub sensitivity: f64,
    /// Scaled-delta magnitude above which acceleration kicks in, per axis.
    pub acceleration_threshold: f64,
    /// Multiplier applied to an axis whose scaled delta exceeds the
    /// threshold. 1.0 disables acceleration.
    pub acceleration_multiplier: f64,
    /// Subtract dy instead of adding it (screen convention).
    pub invert_y: bool,
    /// Clamp positions inside this region; `None` accumulates unbounded.
    pub clamp: Option<ClampRegion>,
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self::batch(1.0)
    }
}

impl MotionProfile {
    /// Profile for batch capture: raw, unclamped, non-inverted accumulation.
    pub fn batch(sensitivity: f64) -> Self {
        Self {
            sensitivity,
            acceleration_threshold: f64::INFINITY,
            acceleration_multiplier: 1.0,
            invert_y: false,
            clamp: None,
        }
    }

    /// Profile for live rendering: Y inverted to screen convention and both
    /// axes clamped to `[border, dimension - border]`.
    pub fn live(sensitivity: f64, clamp: ClampRegion) -> Self {
        Self {
            sensitivity,
            acceleration_threshold: f64::INFINITY,
            acceleration_multiplier: 1.0,
            invert_y: true,
            clamp: Some(clamp),
        }
    }

    /// Enables acceleration shaping on this profile.
    pub fn with_acceleration(mut self, threshold: f64, multiplier: f64) -> Self {
        self.acceleration_threshold = threshold;
        self.acceleration_multiplier = multiplier;
        self
    }
}

/// One derived point of a device's track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    pub device: DeviceHandle,
    pub x: f64,
    pub y: f64,
    /// Milliseconds since the previous sample of the same device; 0 for the
    /// first sample.
    pub elapsed_ms: f64,
}

/// Applies one event to a pointer and returns the resulting sample.
///
/// Steps, in order: scale by the pointer's sensitivity, per-axis
/// acceleration, integrate (with Y inversion when the profile asks for it),
/// clamp when the profile carries a region, derive elapsed time from the
/// pointer's previous timestamp. The pointer is mutated in place, so the
/// update is atomic with respect to that device's state.
pub fn advance(pointer: &mut TrackedPointer, event: &RawEvent, profile: &MotionProfile) -> MotionSample {
    let mut dx = f64::from(event.dx) * pointer.sensitivity;
    let mut dy = f64::from(event.dy) * pointer.sensitivity;

    if dx.abs() > profile.acceleration_threshold {
        dx *= profile.acceleration_multiplier;
    }
    if dy.abs() > profile.acceleration_threshold {
        dy *= profile.acceleration_multiplier;
    }

    let mut x = pointer.x + dx;
    let mut y = if profile.invert_y {
        pointer.y - dy
    } else {
        pointer.y + dy
    };

    if let Some(region) = &profile.clamp {
        x = region.clamp_x(x);
        y = region.clamp_y(y);
    }

    let elapsed_ms = match pointer.last_timestamp_ms {
        Some(previous) => event.timestamp_ms - previous,
        None => 0.0,
    };

    pointer.x = x;
    pointer.y = y;
    pointer.last_timestamp_ms = Some(event.timestamp_ms);

    MotionSample {
        device: pointer.device,
        x,
        y,
        elapsed_ms,
    }
}

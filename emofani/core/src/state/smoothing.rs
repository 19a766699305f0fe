//! Per-channel linear smoothing
//!
//! Each tick a channel moves `clamp(rate * dt, 0, 1)` of the way to its
//! target. Eyes are fastest, expressions in between, and the head lags
//! behind for a natural look.

use super::{CurrentValues, GazePoint, TargetValues};

/// Rate for arousal, pleasure and blush
pub const EXPRESSION_RATE: f32 = 3.0;

/// Rate for eye gaze
pub const EYE_GAZE_RATE: f32 = 6.0;

/// Rate for head gaze
pub const HEAD_GAZE_RATE: f32 = 1.0;

/// Move `current` toward `target` by the fraction `rate * dt`
#[inline]
#[must_use]
pub fn approach(current: f32, target: i32, rate: f32, dt: f32) -> f32 {
    let t = (rate * dt).clamp(0.0, 1.0);
    current + (target as f32 - current) * t
}

fn approach_gaze(current: GazePoint, target: &TargetValues, rate: f32, dt: f32) -> GazePoint {
    GazePoint {
        x: approach(current.x, target.gaze_x, rate, dt),
        y: approach(current.y, target.gaze_y, rate, dt),
        z: approach(current.z, target.gaze_z, rate, dt),
    }
}

/// Advance every channel by `dt` seconds
pub fn advance(current: &mut CurrentValues, target: &TargetValues, dt: f32) {
    current.arousal = approach(current.arousal, target.arousal, EXPRESSION_RATE, dt);
    current.pleasure = approach(current.pleasure, target.pleasure, EXPRESSION_RATE, dt);
    current.blush = approach(current.blush, target.blush, EXPRESSION_RATE, dt);
    current.eyes = approach_gaze(current.eyes, target, EYE_GAZE_RATE, dt);
    current.head = approach_gaze(current.head, target, HEAD_GAZE_RATE, dt);
}

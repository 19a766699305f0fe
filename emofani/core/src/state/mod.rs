//! Face Control State
//!
//! This module contains:
//! - [`ControlState`]: targets, smoothed current values, flags, ordering and
//!   reply destination
//! - [`ExpressionStateMachine`]: the only mutator of that state
//! - [`IdleGenerator`]: random poses while idle
//! - [`FaceReadout`]: what the renderer reads each frame
//!
//! # Design Philosophy
//!
//! Commands set *targets* instantly; *current* values chase them every tick.
//! The renderer only ever sees current values, so abrupt commands still turn
//! into smooth motion. Gaze mirroring and head scaling are applied when the
//! readout is built and never written back into stored state.

pub mod idle;
pub mod machine;
pub mod smoothing;

pub use idle::{IdleGenerator, IdlePose};
pub use machine::ExpressionStateMachine;

use serde::Serialize;

use crate::protocol::StatusTargets;
use crate::transport::Destination;

/// Default gaze depth target, so the face looks forward instead of at the origin
pub const DEFAULT_GAZE_Z: i32 = 250;

/// Behavioural mode derived from the talking/idle flags
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FaceMode {
    /// Targets are randomized autonomously
    Idle,
    /// Externally driven, mouth still
    Active,
    /// Externally driven, mouth moving
    Talking,
}

/// Instantaneous goals set by commands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TargetValues {
    /// Target arousal
    pub arousal: i32,
    /// Target pleasure
    pub pleasure: i32,
    /// Target blush (100 = full)
    pub blush: i32,
    /// Target horizontal gaze
    pub gaze_x: i32,
    /// Target vertical gaze
    pub gaze_y: i32,
    /// Target gaze depth
    pub gaze_z: i32,
}

impl Default for TargetValues {
    fn default() -> Self {
        Self {
            arousal: 0,
            pleasure: 0,
            blush: 0,
            gaze_x: 0,
            gaze_y: 0,
            gaze_z: DEFAULT_GAZE_Z,
        }
    }
}

/// A smoothed gaze position
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct GazePoint {
    /// Horizontal
    pub x: f32,
    /// Vertical
    pub y: f32,
    /// Depth
    pub z: f32,
}

/// Smoothed values converging toward the targets
///
/// Eyes and head track the same gaze target at different speeds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct CurrentValues {
    /// Current arousal
    pub arousal: f32,
    /// Current pleasure
    pub pleasure: f32,
    /// Current blush
    pub blush: f32,
    /// Current eye gaze
    pub eyes: GazePoint,
    /// Current head gaze
    pub head: GazePoint,
}

/// Externally configured gaze presentation
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GazeSettings {
    /// Negate horizontal gaze (for mirrored displays)
    pub mirror_gaze: bool,
    /// Scale of vertical head movement, 0..1
    pub vertical_head_movement: f32,
    /// Scale of horizontal head movement, 0..1
    pub horizontal_head_movement: f32,
}

impl Default for GazeSettings {
    fn default() -> Self {
        Self {
            mirror_gaze: false,
            vertical_head_movement: 0.5,
            horizontal_head_movement: 0.5,
        }
    }
}

/// The face's complete mutable state
///
/// Owned by [`ExpressionStateMachine`]; only the dispatcher's thread of
/// control touches it, so it carries no locks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ControlState {
    /// Smoothed values
    pub current: CurrentValues,
    /// Goals set by commands or the idle generator
    pub target: TargetValues,
    /// Mouth moving
    pub talking: bool,
    /// Autonomous idle mode
    pub idle: bool,
    /// Timestamp of the last accepted command; never decreases
    pub last_accepted_timestamp: i64,
    /// Reply host from the most recent message that carried one
    pub response_host: Option<String>,
    /// Reply port from the most recent message that carried a valid one
    pub response_port: Option<u16>,
    /// Gaze presentation settings
    pub gaze: GazeSettings,
}

impl ControlState {
    /// Fresh state with the given gaze settings
    #[must_use]
    pub fn new(gaze: GazeSettings) -> Self {
        Self {
            gaze,
            ..Self::default()
        }
    }

    /// Current mode derived from the flags
    #[must_use]
    pub fn mode(&self) -> FaceMode {
        if self.idle {
            FaceMode::Idle
        } else if self.talking {
            FaceMode::Talking
        } else {
            FaceMode::Active
        }
    }

    /// Targets and flags as echoed in an OK status
    #[must_use]
    pub fn status_targets(&self) -> StatusTargets {
        StatusTargets {
            arousal: self.target.arousal,
            pleasure: self.target.pleasure,
            blush: self.target.blush,
            gaze_x: self.target.gaze_x,
            gaze_y: self.target.gaze_y,
            gaze_z: self.target.gaze_z,
            talking: self.talking,
            idle: self.idle,
        }
    }

    /// Where replies go, using `fallback` for whatever is still unknown
    #[must_use]
    pub fn response_destination(&self, fallback: &Destination) -> Destination {
        Destination {
            host: self
                .response_host
                .clone()
                .unwrap_or_else(|| fallback.host.clone()),
            port: self.response_port.unwrap_or(fallback.port),
        }
    }

    /// Build the renderer's view of the current values
    #[must_use]
    pub fn readout(&self) -> FaceReadout {
        let x_sign = if self.gaze.mirror_gaze { -1.0 } else { 1.0 };
        let eyes = self.current.eyes;
        let head = self.current.head;

        FaceReadout {
            arousal: self.current.arousal,
            pleasure: self.current.pleasure,
            blush: self.current.blush,
            blush_intensity: self.current.blush / 100.0,
            talking: self.talking,
            idle: self.idle,
            mode: self.mode(),
            eye_gaze: GazePoint {
                x: eyes.x * x_sign,
                y: eyes.y,
                z: eyes.z,
            },
            head_gaze: GazePoint {
                x: head.x * x_sign * self.gaze.horizontal_head_movement,
                y: head.y * self.gaze.vertical_head_movement,
                z: head.z,
            },
        }
    }
}

/// Read-only snapshot for the renderer
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FaceReadout {
    /// Smoothed arousal
    pub arousal: f32,
    /// Smoothed pleasure
    pub pleasure: f32,
    /// Smoothed blush
    pub blush: f32,
    /// Smoothed blush as a 0..1 shader intensity
    pub blush_intensity: f32,
    /// Mouth moving
    pub talking: bool,
    /// Idle mode
    pub idle: bool,
    /// Derived mode
    pub mode: FaceMode,
    /// Eye look-at point, mirrored if configured
    pub eye_gaze: GazePoint,
    /// Head look-at point, mirrored and scaled
    pub head_gaze: GazePoint,
}

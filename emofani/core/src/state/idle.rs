//! Idle pose generator
//!
//! While the face is idle it picks a new moderate pose every few seconds,
//! so it never looks frozen. Ranges are deliberately narrow: no extreme
//! expressions and no far-off gaze targets.

use std::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seconds between pose changes, re-rolled after every change
pub const IDLE_INTERVAL_SECS: RangeInclusive<f32> = 2.0..=6.0;

/// Arousal range for idle poses
pub const IDLE_AROUSAL: RangeInclusive<i32> = -25..=25;

/// Pleasure range for idle poses
pub const IDLE_PLEASURE: RangeInclusive<i32> = -25..=25;

/// Horizontal gaze range for idle poses
pub const IDLE_GAZE_X: RangeInclusive<i32> = -50..=50;

/// Vertical gaze range for idle poses
pub const IDLE_GAZE_Y: RangeInclusive<i32> = -25..=25;

/// Gaze depth range for idle poses
pub const IDLE_GAZE_Z: RangeInclusive<i32> = 200..=350;

/// Targets drawn by the generator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdlePose {
    /// New target arousal
    pub arousal: i32,
    /// New target pleasure
    pub pleasure: i32,
    /// New horizontal gaze
    pub gaze_x: i32,
    /// New vertical gaze
    pub gaze_y: i32,
    /// New gaze depth
    pub gaze_z: i32,
}

/// Timer plus random source for idle poses
#[derive(Debug)]
pub struct IdleGenerator {
    elapsed: f32,
    threshold: f32,
    rng: StdRng,
}

impl Default for IdleGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdleGenerator {
    /// Generator seeded from the OS
    ///
    /// The first threshold is zero, so the first idle tick produces a pose.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic generator for tests and replays
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            elapsed: 0.0,
            threshold: 0.0,
            rng,
        }
    }

    /// Seconds accumulated since the last pose
    #[must_use]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Seconds that must accumulate before the next pose
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Accumulate `dt` and return a new pose when the threshold is passed
    pub fn advance(&mut self, dt: f32) -> Option<IdlePose> {
        self.elapsed += dt;
        if self.elapsed <= self.threshold {
            return None;
        }

        self.elapsed = 0.0;
        self.threshold = self.rng.gen_range(IDLE_INTERVAL_SECS);

        Some(IdlePose {
            arousal: self.rng.gen_range(IDLE_AROUSAL),
            pleasure: self.rng.gen_range(IDLE_PLEASURE),
            gaze_x: self.rng.gen_range(IDLE_GAZE_X),
            gaze_y: self.rng.gen_range(IDLE_GAZE_Y),
            gaze_z: self.rng.gen_range(IDLE_GAZE_Z),
        })
    }
}

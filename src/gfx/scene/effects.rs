//! Timed scene effects.
//!
//! Each effect is a small state machine stamped with a start time and
//! stepped with the current clock reading. None of them own scene nodes;
//! the scene applies their output.

use cgmath::{Quaternion, Vector3, Vector4};

use crate::gfx::transform::quat_from_euler_degrees;

/// Sprite-sheet flash played once after a successful shot.
#[derive(Debug, Clone)]
pub struct MuzzleFlash {
    active: bool,
    start: f32,
    frame: i32,
    pub frame_duration: f32,
    pub total_frames: i32,
}

impl Default for MuzzleFlash {
    fn default() -> Self {
        Self {
            active: false,
            start: 0.0,
            frame: 0,
            frame_duration: 0.08,
            total_frames: 16,
        }
    }
}

impl MuzzleFlash {
    pub fn lifetime(&self) -> f32 {
        self.total_frames as f32 * self.frame_duration
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn frame(&self) -> i32 {
        self.frame
    }

    pub fn trigger(&mut self, now: f32) {
        self.active = true;
        self.start = now;
        self.frame = 0;
    }

    pub fn update(&mut self, now: f32) {
        if !self.active {
            return;
        }
        let elapsed = now - self.start;
        let lifetime = self.lifetime();
        if elapsed >= lifetime {
            self.active = false;
            return;
        }
        self.frame = ((elapsed / lifetime) * self.total_frames as f32) as i32;
    }
}

/// Hinged lid that swings between a closed and an opened rotation.
#[derive(Debug, Clone)]
pub struct ChestLid {
    active: bool,
    is_opened: bool,
    start: f32,
    initial: Quaternion<f32>,
    target: Quaternion<f32>,
    pub duration: f32,
    pub closed: Quaternion<f32>,
    pub opened: Quaternion<f32>,
}

impl Default for ChestLid {
    fn default() -> Self {
        let closed = quat_from_euler_degrees(Vector3::new(0.0, 90.0, 0.0));
        Self {
            active: false,
            is_opened: false,
            start: 0.0,
            initial: closed,
            target: closed,
            duration: 1.0,
            closed,
            opened: quat_from_euler_degrees(Vector3::new(-45.0, 90.0, 0.0)),
        }
    }
}

impl ChestLid {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_opened(&self) -> bool {
        self.is_opened
    }

    pub fn target(&self) -> Quaternion<f32> {
        self.target
    }

    /// Starts swinging from `current` toward the opposite state. Returns
    /// `false` and changes nothing while a swing is still running.
    pub fn trigger(&mut self, now: f32, current: Quaternion<f32>) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        self.start = now;
        self.initial = current;
        self.target = if self.is_opened {
            self.closed
        } else {
            self.opened
        };
        true
    }

    /// Rotation the lid should have at `now`, or `None` when idle.
    pub fn update(&mut self, now: f32) -> Option<Quaternion<f32>> {
        if !self.active {
            return None;
        }
        let elapsed = now - self.start;
        let t = (elapsed / self.duration).clamp(0.0, 1.0);
        let rotation = self.initial.slerp(self.target, t);
        if elapsed >= self.duration {
            self.is_opened = !self.is_opened;
            self.active = false;
        }
        Some(rotation)
    }
}

/// Distance fog parameters uploaded to every lit program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogParams {
    pub color: Vector4<f32>,
    pub max_distance: f32,
    pub min_distance: f32,
}

impl FogParams {
    pub fn day() -> Self {
        Self {
            color: Vector4::new(0.5, 0.5, 0.5, 1.0),
            max_distance: 35.0,
            min_distance: 0.1,
        }
    }

    pub fn night() -> Self {
        Self {
            color: Vector4::new(0.3, 0.3, 0.3, 1.0),
            max_distance: 20.0,
            min_distance: 0.1,
        }
    }
}

/// Alternates day and night with separate durations.
#[derive(Debug, Clone)]
pub struct DayNightCycle {
    is_night: bool,
    start: f32,
    pub day_length: f32,
    pub night_length: f32,
}

impl DayNightCycle {
    pub fn new(now: f32) -> Self {
        Self {
            is_night: false,
            start: now,
            day_length: 16.0,
            night_length: 8.0,
        }
    }

    pub fn is_night(&self) -> bool {
        self.is_night
    }

    /// Flips at most once per call. Returns `true` when it flipped.
    pub fn update(&mut self, now: f32) -> bool {
        let elapsed = now - self.start;
        let length = if self.is_night {
            self.night_length
        } else {
            self.day_length
        };
        if elapsed >= length {
            self.is_night = !self.is_night;
            self.start = now;
            log::debug!("Switched to {}", if self.is_night { "night" } else { "day" });
            return true;
        }
        false
    }

    pub fn fog(&self) -> FogParams {
        if self.is_night {
            FogParams::night()
        } else {
            FogParams::day()
        }
    }
}

//! Simulated user motion
//!
//! Each step an avatar is moved by one [`MotionInput`]. The autopilot turns
//! toward the current waypoint and walks once it faces it; recorded paths are
//! replayed by interpolating between waypoints on the redirection clock.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::geometry::Pose;
use crate::settings::Settings;
use crate::{rotate_vector, sign, signed_angle};

/// The autopilot only walks when facing the waypoint within this angle (deg)
const ROTATIONAL_ERROR_ACCEPTED: f32 = 1.0;
/// No turning this close to the waypoint
const MINIMUM_DISTANCE_FOR_ROTATION: f32 = 0.0001;

/// Motion of one avatar for one step
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum MotionInput {
    /// Built-in walker follows the waypoints
    #[default]
    Autopilot,
    /// Host-driven virtual displacement and turn (deg, clockwise positive)
    Move { translation: Vec2, rotation: f32 },
    /// Host-tracked physical head pose
    Tracked(Pose),
    /// Stand still
    Idle,
}

impl MotionInput {
    pub fn is_autopilot(&self) -> bool {
        matches!(self, MotionInput::Autopilot)
    }
}

/// Waypoints of one avatar and the progress along them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    /// Virtual waypoints, shifted and aligned to the start pose
    pub waypoints: Vec<Vec2>,
    /// Per-waypoint durations of a recorded walk
    pub sampling_intervals: Option<Vec<f32>>,
    pub index: usize,
    /// Replay clock at the start of the current segment
    accumulated_time: f32,
    pub complete: bool,
}

impl Mission {
    pub fn new(waypoints: Vec<Vec2>, sampling_intervals: Option<Vec<f32>>) -> Self {
        Self {
            waypoints,
            sampling_intervals,
            index: 0,
            accumulated_time: 0.0,
            complete: false,
        }
    }

    pub fn is_replay(&self) -> bool {
        self.sampling_intervals.is_some()
    }

    /// Waypoint currently walked toward
    pub fn target(&self) -> Option<Vec2> {
        self.waypoints.get(self.index).copied()
    }

    fn advance(&mut self) {
        if self.index + 1 >= self.waypoints.len() {
            self.complete = true;
        } else {
            self.index += 1;
        }
    }

    /// Interval ending at waypoint `index`; the start point takes none
    fn interval(&self, index: usize) -> f32 {
        match &self.sampling_intervals {
            Some(intervals) if index > 0 => intervals.get(index).copied().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Advance past reached waypoints (or elapsed replay segments)
    pub fn update(&mut self, curr_pos: Vec2, redirection_time: f32, threshold: f32) {
        if self.complete || self.waypoints.is_empty() {
            return;
        }
        if self.is_replay() {
            let mut interval = self.interval(self.index);
            while !self.complete && redirection_time > self.accumulated_time + interval {
                self.accumulated_time += interval;
                self.advance();
                interval = self.interval(self.index);
            }
        } else if self
            .target()
            .is_some_and(|target| (curr_pos - target).length() < threshold)
        {
            self.advance();
        }
    }

    /// Recorded pose at `redirection_time`, `None` before the first segment or after the last
    pub fn replay_pose(&self, redirection_time: f32) -> Option<Pose> {
        if self.complete || self.index == 0 {
            return None;
        }
        let p = self.waypoints[self.index - 1];
        let q = *self.waypoints.get(self.index)?;
        let interval = self.interval(self.index);
        let t = if interval > 0.0 {
            ((redirection_time - self.accumulated_time) / interval).clamp(0.0, 1.0)
        } else {
            1.0
        };
        Some(Pose {
            position: p + (q - p) * t,
            forward: (q - p).normalize_or_zero(),
        })
    }
}

/// Shift recorded waypoints to the start position and optionally align the first leg with the start heading
pub fn real_waypoints(recorded: &[Vec2], initial: Pose, settings: &Settings) -> Vec<Vec2> {
    let start = initial.position;
    let mut waypoints: Vec<Vec2> = recorded.iter().map(|p| *p + start).collect();
    if settings.align_to_initial_forward {
        let first_leg = if settings.first_waypoint_is_start_point {
            waypoints.get(1)
        } else {
            waypoints.first()
        };
        if let Some(first) = first_leg {
            let angle = signed_angle(*first - start, initial.forward);
            for p in &mut waypoints {
                *p = start + rotate_vector(*p - start, angle);
            }
        }
    }
    waypoints
}

/// Turn toward `target`, then walk to it if facing it
pub fn turn_and_walk(head: &mut Pose, target: Vec2, dt: f32, settings: &Settings) {
    let to_target = target - head.position;
    let angle = signed_angle(head.forward, to_target);
    if to_target.length() > MINIMUM_DISTANCE_FOR_ROTATION {
        let turn = sign(angle) * (dt * settings.rotation_speed).min(angle.abs());
        head.forward = rotate_vector(head.forward, turn).normalize_or_zero();
    }

    let to_target = target - head.position;
    if signed_angle(head.forward, to_target).abs() < ROTATIONAL_ERROR_ACCEPTED {
        let distance = (dt * settings.translation_speed).min(to_target.length());
        head.position += head.forward * distance;
    }
}

/// Turn in place by `degrees` (clockwise positive)
pub fn rotate_in_place(head: &mut Pose, degrees: f32) {
    head.forward = rotate_vector(head.forward, degrees).normalize_or_zero();
}

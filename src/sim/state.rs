//! Simulation state types
//!
//! Each avatar carries a virtual head pose and the pose of the physical
//! tracking space inside the virtual world (its "frame"). The physical pose is
//! always derived from the two, so redirection only ever edits the frame.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geometry::{self, Polygon, Pose, rotate_pose_around};
use crate::{rotate_vector, signed_angle};

/// Physical room: boundary polygon plus interior obstacles, all counter-clockwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSpace {
    pub boundary: Polygon,
    #[serde(default)]
    pub obstacles: Vec<Polygon>,
}

impl TrackingSpace {
    pub fn new(boundary: Polygon, obstacles: Vec<Polygon>) -> Self {
        Self { boundary, obstacles }
    }

    /// Axis-aligned `width` x `height` room centred on the origin
    pub fn rectangle(width: f32, height: f32) -> Self {
        let (w, h) = (width / 2.0, height / 2.0);
        Self::new(
            vec![
                Vec2::new(w, h),
                Vec2::new(-w, h),
                Vec2::new(-w, -h),
                Vec2::new(w, -h),
            ],
            Vec::new(),
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if distinct_points(&self.boundary) < 3 {
            return Err(ConfigError::DegeneratePolygon {
                what: "tracking space boundary",
                count: distinct_points(&self.boundary),
            });
        }
        for obstacle in &self.obstacles {
            if distinct_points(obstacle) < 3 {
                return Err(ConfigError::DegeneratePolygon {
                    what: "obstacle",
                    count: distinct_points(obstacle),
                });
            }
        }
        Ok(())
    }

    /// Bounds of the boundary polygon
    pub fn bounding_box(&self) -> (Vec2, Vec2) {
        geometry::bounding_box(&self.boundary).unwrap_or((Vec2::ZERO, Vec2::ZERO))
    }

    /// Distance to the nearest wall or obstacle
    pub fn nearest_distance(&self, point: Vec2) -> f32 {
        geometry::nearest_distance_to_obstacles_and_boundary(point, &self.boundary, &self.obstacles)
    }

    /// Inward buffer of the boundary and outward buffers of the obstacles
    pub fn buffer_zones(&self, width: f32) -> (Polygon, Vec<Polygon>) {
        (
            geometry::buffer_polygon(&self.boundary, width, true),
            self.obstacles
                .iter()
                .map(|obstacle| geometry::buffer_polygon(obstacle, width, false))
                .collect(),
        )
    }
}

fn distinct_points(polygon: &[Vec2]) -> usize {
    let mut seen: Vec<Vec2> = Vec::with_capacity(polygon.len());
    for p in polygon {
        if !seen.iter().any(|q| q.distance_squared(*p) < 1e-12) {
            seen.push(*p);
        }
    }
    seen.len()
}

/// Type of injected redirection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GainKind {
    Translation,
    Rotation,
    Curvature,
}

/// Redirection actually applied to one avatar during one step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainEvent {
    pub kind: GainKind,
    /// Realized gain: applied quantity over the raw delta it scales
    pub value: f32,
    /// Meters for translation (magnitude), signed degrees otherwise
    pub applied: f32,
}

/// Start of a reset maneuver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResetEvent {
    pub avatar: usize,
    pub time: f32,
}

/// Read-only view of another avatar, in physical space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvatarSnapshot {
    pub id: usize,
    pub position: Vec2,
    pub forward: Vec2,
}

/// Per-avatar redirection state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarState {
    pub id: usize,
    /// Head pose in the virtual world
    pub head: Pose,
    /// Tracking space origin and +y axis, in the virtual world
    pub frame: Pose,

    pub curr_pos: Vec2,
    pub prev_pos: Vec2,
    pub curr_pos_real: Vec2,
    pub prev_pos_real: Vec2,
    pub curr_dir: Vec2,
    pub prev_dir: Vec2,
    pub curr_dir_real: Vec2,
    pub prev_dir_real: Vec2,
    /// Virtual displacement this step
    pub delta_pos: Vec2,
    /// Virtual heading change this step (degrees, clockwise positive)
    pub delta_dir: f32,
    /// Physical displacement this step
    pub delta_pos_real: Vec2,

    /// Time spent walking (not resetting)
    pub redirection_time: f32,
    /// Accumulated virtual displacement
    pub walk_dist: f32,
    pub in_reset: bool,
    /// Blocks a reset from re-triggering in the step right after one ends
    pub just_ended_reset: bool,
    /// Time an autopilot avatar has not moved
    pub same_pos_time: f32,
    /// Set once the avatar exceeds the reset cap or gets stuck
    pub invalid: bool,
    /// All waypoints reached
    pub mission_complete: bool,
}

impl AvatarState {
    /// Fresh state at trial start; physical and virtual frames coincide
    pub fn new(id: usize, initial: Pose) -> Self {
        let head = Pose::new(initial.position, initial.forward);
        Self {
            id,
            head,
            frame: Pose::default(),
            curr_pos: head.position,
            prev_pos: head.position,
            curr_pos_real: head.position,
            prev_pos_real: head.position,
            curr_dir: head.forward,
            prev_dir: head.forward,
            curr_dir_real: head.forward,
            prev_dir_real: head.forward,
            delta_pos: Vec2::ZERO,
            delta_dir: 0.0,
            delta_pos_real: Vec2::ZERO,
            redirection_time: 0.0,
            walk_dist: 0.0,
            in_reset: false,
            just_ended_reset: true,
            same_pos_time: 0.0,
            invalid: false,
            mission_complete: false,
        }
    }

    /// Head pose in physical space
    pub fn real_pose(&self) -> Pose {
        self.frame.inverse_transform_pose(self.head)
    }

    /// Physical point to virtual space
    pub fn to_virtual(&self, real: Vec2) -> Vec2 {
        self.frame.transform_point(real)
    }

    /// Virtual point to physical space
    pub fn to_real(&self, virtual_point: Vec2) -> Vec2 {
        self.frame.inverse_transform_point(virtual_point)
    }

    pub fn snapshot(&self) -> AvatarSnapshot {
        AvatarSnapshot {
            id: self.id,
            position: self.curr_pos_real,
            forward: self.curr_dir_real,
        }
    }

    /// Sample the head pose into the current fields and accumulate walked distance
    pub fn update_current(&mut self) {
        let real = self.real_pose();
        self.curr_pos = self.head.position;
        self.curr_dir = self.head.forward;
        self.curr_pos_real = real.position;
        self.curr_dir_real = real.forward;
        self.walk_dist += (self.curr_pos - self.prev_pos).length();
    }

    /// Recompute the per-step deltas from current vs previous
    pub fn update_deltas(&mut self) {
        self.delta_pos = self.curr_pos - self.prev_pos;
        self.delta_dir = signed_angle(self.prev_dir, self.curr_dir);
        self.delta_pos_real = self.curr_pos_real - self.prev_pos_real;
    }

    /// Store the post-redirection head pose as the previous sample
    pub fn update_previous(&mut self) {
        let real = self.real_pose();
        self.prev_pos = self.head.position;
        self.prev_dir = self.head.forward;
        self.prev_pos_real = real.position;
        self.prev_dir_real = real.forward;
    }

    /// Shift the virtual world under the user: head and frame move together
    pub fn translate_frame(&mut self, translation: Vec2) {
        self.frame.position += translation;
        self.head.position += translation;
    }

    /// Rotate the virtual world around the head; the physical pose is unchanged
    pub fn rotate_frame(&mut self, degrees: f32) {
        self.frame = rotate_pose_around(self.frame, self.head.position, degrees);
        self.head.forward = rotate_vector(self.head.forward, degrees).normalize_or_zero();
    }
}

/// Seeded RNG for trial generation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
    pub stream: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed, stream: 0 }
    }

    pub fn to_rng(&self) -> Pcg32 {
        Pcg32::seed_from_u64(self.seed ^ self.stream.rotate_left(32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_frame_keeps_real_pose() {
        let mut state = AvatarState::new(0, Pose::new(Vec2::new(1.0, 2.0), Vec2::Y));
        let before = state.real_pose();
        state.rotate_frame(37.0);
        let after = state.real_pose();
        assert!((before.position - after.position).length() < 0.0001);
        assert!((before.forward - after.forward).length() < 0.0001);
        assert!((signed_angle(Vec2::Y, state.head.forward) - 37.0).abs() < 0.01);
    }

    #[test]
    fn test_translate_frame_keeps_real_pose() {
        let mut state = AvatarState::new(0, Pose::default());
        state.rotate_frame(90.0);
        state.translate_frame(Vec2::new(0.3, -0.2));
        assert!(state.real_pose().position.length() < 0.0001);
        assert!((state.head.position - Vec2::new(0.3, -0.2)).length() < 0.0001);
    }

    #[test]
    fn test_walking_after_rotation_curves_real_path() {
        let mut state = AvatarState::new(0, Pose::default());
        state.rotate_frame(90.0);
        // User walks straight ahead in the virtual world (now +x)
        state.head.position += state.head.forward;
        let real = state.real_pose();
        assert!((real.position - Vec2::Y).length() < 0.0001);
    }

    #[test]
    fn test_deltas() {
        let mut state = AvatarState::new(0, Pose::default());
        state.head.position = Vec2::new(0.0, 0.5);
        state.head.forward = rotate_vector(Vec2::Y, 10.0);
        state.update_current();
        state.update_deltas();
        assert!((state.walk_dist - 0.5).abs() < 0.0001);
        assert!((state.delta_dir - 10.0).abs() < 0.01);
        assert!((state.delta_pos - Vec2::new(0.0, 0.5)).length() < 0.0001);
    }

    #[test]
    fn test_tracking_space_validation() {
        assert!(TrackingSpace::rectangle(4.0, 4.0).validate().is_ok());
        let bad = TrackingSpace::new(vec![Vec2::ZERO, Vec2::X, Vec2::X], Vec::new());
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_buffer_zones() {
        let space = TrackingSpace::rectangle(4.0, 4.0);
        let (inner, obstacles) = space.buffer_zones(0.5);
        assert_eq!(inner.len(), 4);
        assert!(obstacles.is_empty());
    }
}

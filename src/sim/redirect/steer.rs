//! Steer-to-target redirection
//!
//! - `SteerToCenter`: steer the user toward the tracking space origin.
//! - `SteerToOrbit`: steer the user onto a circle around the origin.
//!
//! Both pick the larger of curvature and rotation, dampen near the target
//! and smooth the applied rotation between steps.

use glam::Vec2;

use super::{RedirectContext, Redirector, steering_direction};
use crate::consts::{CURVATURE_GAIN_CAP_DEG_PER_SEC, ROTATION_GAIN_CAP_DEG_PER_SEC};
use crate::settings::RedirectorKind;
use crate::{angle_between, rotate_vector, signed_angle};

/// Walking slower than this (m/s) earns no curvature
const MOVEMENT_THRESHOLD: f32 = 0.2;
/// Turning slower than this (deg/s) earns no rotation gain
const ROTATION_THRESHOLD: f32 = 1.5;
const DISTANCE_THRESHOLD_FOR_DAMPENING: f32 = 1.25;
const BEARING_THRESHOLD_FOR_DAMPENING: f32 = 45.0;
/// Weight of the new proposal in the smoothed rotation
const SMOOTHING_FACTOR: f32 = 0.125;
/// Bearing (deg) at which a temporary target replaces the centre
const TEMPORARY_TARGET_BEARING: f32 = 160.0;
/// Distance (m) of the temporary target
const TEMPORARY_TARGET_DISTANCE: f32 = 4.0;
/// Orbit radius (m)
pub const ORBIT_RADIUS: f32 = 5.0;

/// Smoothed steering toward a physical target
#[derive(Debug, Default)]
struct Steering {
    last_rotation: f32,
}

impl Steering {
    fn steer_to(&mut self, ctx: &mut RedirectContext<'_>, target: Vec2) {
        let pos = ctx.state.curr_pos_real;
        let dir = ctx.state.curr_dir_real;
        let dt = ctx.dt;
        if dt <= 0.0 {
            return;
        }
        let desired = target - pos;
        let steer = steering_direction(dir, desired);

        let delta_pos = ctx.state.delta_pos;
        let delta_dir = ctx.state.delta_dir;
        let from_curvature = if delta_pos.length() / dt > MOVEMENT_THRESHOLD {
            (delta_pos.length() / ctx.settings.curvature_radius)
                .to_degrees()
                .min(CURVATURE_GAIN_CAP_DEG_PER_SEC * dt)
        } else {
            0.0
        };
        let from_rotation = if delta_dir.abs() / dt >= ROTATION_THRESHOLD {
            let gain = if delta_dir * steer < 0.0 {
                ctx.settings.min_rot_gain
            } else {
                ctx.settings.max_rot_gain
            };
            (delta_dir * gain).abs().min(ROTATION_GAIN_CAP_DEG_PER_SEC * dt)
        } else {
            0.0
        };

        let use_curvature = from_curvature > from_rotation;
        let mut proposed = steer * from_curvature.max(from_rotation);

        let bearing = angle_between(dir, desired);
        if bearing <= BEARING_THRESHOLD_FOR_DAMPENING {
            proposed *= (90.0 * bearing / BEARING_THRESHOLD_FOR_DAMPENING).to_radians().sin();
        }
        let distance = desired.length();
        if distance < DISTANCE_THRESHOLD_FOR_DAMPENING {
            proposed *= (90.0 * distance / DISTANCE_THRESHOLD_FOR_DAMPENING).to_radians().sin();
        }

        self.last_rotation = (1.0 - SMOOTHING_FACTOR) * self.last_rotation + SMOOTHING_FACTOR * proposed;
        if use_curvature {
            ctx.apply_curvature(self.last_rotation);
        } else {
            ctx.apply_rotation(self.last_rotation);
        }
    }
}

/// Point 4 m to the user's side, on the side the centre lies
fn temporary_target(pos: Vec2, dir: Vec2, centre: Vec2) -> Vec2 {
    let side = if signed_angle(dir, centre - pos) >= 0.0 { 90.0 } else { -90.0 };
    pos + rotate_vector(dir, side).normalize_or_zero() * TEMPORARY_TARGET_DISTANCE
}

#[derive(Debug, Default)]
pub struct SteerToCenter {
    steering: Steering,
}

impl SteerToCenter {
    pub fn target(pos: Vec2, dir: Vec2) -> Vec2 {
        let centre = Vec2::ZERO;
        if angle_between(dir, centre - pos) >= TEMPORARY_TARGET_BEARING {
            temporary_target(pos, dir, centre)
        } else {
            centre
        }
    }
}

impl Redirector for SteerToCenter {
    fn kind(&self) -> RedirectorKind {
        RedirectorKind::SteerToCenter
    }

    fn inject_redirection(&mut self, ctx: &mut RedirectContext<'_>) {
        let target = Self::target(ctx.state.curr_pos_real, ctx.state.curr_dir_real);
        self.steering.steer_to(ctx, target);
    }
}

#[derive(Debug, Default)]
pub struct SteerToOrbit {
    steering: Steering,
}

impl SteerToOrbit {
    /// Tangent point of the orbit with the smaller bearing, or the orbit point ahead when inside it
    pub fn target(pos: Vec2, dir: Vec2) -> Vec2 {
        let centre = Vec2::ZERO;
        let user_to_centre = centre - pos;
        let distance = user_to_centre.length();
        if distance <= ORBIT_RADIUS {
            return centre + dir.normalize_or_zero() * ORBIT_RADIUS;
        }
        let spread = (ORBIT_RADIUS / distance).acos().to_degrees();
        let outward = -user_to_centre / distance;
        let cw = centre + rotate_vector(outward, spread) * ORBIT_RADIUS;
        let ccw = centre + rotate_vector(outward, -spread) * ORBIT_RADIUS;
        if angle_between(dir, cw - pos) < angle_between(dir, ccw - pos) {
            cw
        } else {
            ccw
        }
    }
}

impl Redirector for SteerToOrbit {
    fn kind(&self) -> RedirectorKind {
        RedirectorKind::SteerToOrbit
    }

    fn inject_redirection(&mut self, ctx: &mut RedirectContext<'_>) {
        let target = Self::target(ctx.state.curr_pos_real, ctx.state.curr_dir_real);
        self.steering.steer_to(ctx, target);
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{walking_state, with_ctx};
    use super::*;
    use crate::settings::Settings;
    use crate::sim::state::{GainKind, TrackingSpace};

    #[test]
    fn test_center_target_and_temporary_target() {
        assert_eq!(SteerToCenter::target(Vec2::new(0.0, -3.0), Vec2::Y), Vec2::ZERO);
        // Walking straight away from the centre
        let t = SteerToCenter::target(Vec2::new(0.0, 3.0), Vec2::Y);
        assert!((t.y - 3.0).abs() < 1e-4);
        assert!((t.x.abs() - TEMPORARY_TARGET_DISTANCE).abs() < 1e-4);
    }

    #[test]
    fn test_orbit_tangent_points_lie_on_orbit() {
        let pos = Vec2::new(0.0, -10.0);
        let t = SteerToOrbit::target(pos, Vec2::Y);
        assert!((t.length() - ORBIT_RADIUS).abs() < 1e-3);
        // Tangent: radius perpendicular to the line of sight
        assert!(t.dot(t - pos).abs() < 1e-2);
        let inside = SteerToOrbit::target(Vec2::new(1.0, 0.0), Vec2::X);
        assert!((inside - Vec2::new(ORBIT_RADIUS, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_steers_toward_centre() {
        // At (3, 0) heading +y; the centre lies counter-clockwise, so the world turns clockwise
        let space = TrackingSpace::rectangle(10.0, 10.0);
        let settings = Settings::default();
        let mut state = walking_state(Vec2::new(0.0, 1.0 / 60.0), 0.0);
        state.curr_pos_real = Vec2::new(3.0, 0.0);
        state.curr_dir_real = Vec2::Y;
        let (_, events) = with_ctx(&mut state, &space, &[], &settings, |ctx| {
            SteerToCenter::default().inject_redirection(ctx);
        });
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, GainKind::Curvature);
        assert!(events[0].applied > 0.0);
        // Smoothing scales the first proposal down
        assert!(events[0].value.abs() <= 1.0 / settings.curvature_radius * SMOOTHING_FACTOR + 1e-5);
    }

    #[test]
    fn test_no_redirection_while_still() {
        let space = TrackingSpace::rectangle(10.0, 10.0);
        let settings = Settings::default();
        let mut state = walking_state(Vec2::ZERO, 0.0);
        state.curr_pos_real = Vec2::new(3.0, 0.0);
        let (_, events) = with_ctx(&mut state, &space, &[], &settings, |ctx| {
            SteerToOrbit::default().inject_redirection(ctx);
        });
        assert!(events.is_empty());
        assert_eq!(state.head.forward, Vec2::Y);
    }
}

//! Zig-zag redirection: a virtual zig-zag is walked between two fixed physical targets

use glam::Vec2;

use super::{RedirectContext, Redirector};
use crate::settings::RedirectorKind;
use crate::{finite_or_zero, sign, signed_angle};

/// Physical targets, tracking-space coordinates; the user starts at the first
const REAL_TARGET_0: Vec2 = Vec2::new(0.0, 0.0);
const REAL_TARGET_1: Vec2 = Vec2::new(3.0, 3.0);

/// Below this distance to the physical target no gain is injected
const TARGET_REACHED_DISTANCE: f32 = 0.1;

#[derive(Debug)]
pub struct ZigZagRedirector {
    /// Virtual waypoint currently walked toward
    waypoint_index: usize,
    heading_to_target0: bool,
}

impl Default for ZigZagRedirector {
    fn default() -> Self {
        Self {
            waypoint_index: 1,
            heading_to_target0: false,
        }
    }
}

impl ZigZagRedirector {
    pub fn waypoint_index(&self) -> usize {
        self.waypoint_index
    }

    /// (update distance, slow-down speed) thresholds for advancing a waypoint
    fn thresholds(autopilot: bool) -> (f32, f32) {
        if autopilot { (0.1, 100.0) } else { (0.4, 0.25) }
    }

    fn update_waypoint(&mut self, ctx: &RedirectContext<'_>, update_distance: f32, slow_speed: f32) {
        let state = &*ctx.state;
        let near = (state.curr_pos - ctx.waypoints[self.waypoint_index]).length() < update_distance;
        let slow = ctx.dt > 0.0 && state.delta_pos.length() / ctx.dt < slow_speed;
        let more_left = self.waypoint_index < ctx.waypoints.len() - 1;
        if near && slow && more_left && !state.in_reset {
            self.waypoint_index += 1;
            self.heading_to_target0 = !self.heading_to_target0;
        }
    }
}

impl Redirector for ZigZagRedirector {
    fn kind(&self) -> RedirectorKind {
        RedirectorKind::ZigZag
    }

    fn inject_redirection(&mut self, ctx: &mut RedirectContext<'_>) {
        if ctx.waypoints.len() < 2 {
            return;
        }
        let (update_distance, slow_speed) = Self::thresholds(ctx.autopilot);
        self.update_waypoint(ctx, update_distance, slow_speed);

        let settings = ctx.settings;
        let state = &*ctx.state;
        let virtual_target = ctx.waypoints[self.waypoint_index];
        let real_local = if self.heading_to_target0 {
            REAL_TARGET_0
        } else {
            REAL_TARGET_1
        };
        let real_target = state.to_virtual(real_local);

        let angle_to_real_target = signed_angle(state.curr_dir, real_target - state.curr_pos);
        let angle_to_virtual_target = signed_angle(state.curr_dir, virtual_target - state.curr_pos);
        let distance_to_real_target = (real_local - state.curr_pos_real).length();
        let user_to_virtual = virtual_target - state.curr_pos;
        let user_to_real = real_target - state.curr_pos;
        let required_angle = signed_angle(user_to_real, user_to_virtual);

        let min_real_translation = user_to_virtual.length() / (1.0 + settings.max_trans_gain);
        let min_real_rotation = angle_to_virtual_target;

        // Rotation does as much as it can; curvature covers twice the rest
        let from_rotation =
            sign(required_angle) * required_angle.abs().min((min_real_rotation * settings.min_rot_gain).abs());
        let remaining = required_angle - from_rotation;
        let from_curvature = sign(required_angle)
            * (min_real_translation * (1.0_f32.to_degrees() / settings.curvature_radius)).min((2.0 * remaining).abs());
        let required_translation = (real_target - virtual_target).length();

        let target_reached = distance_to_real_target < TARGET_REACHED_DISTANCE;
        let g_c = if target_reached {
            0.0
        } else {
            from_curvature / min_real_translation
        };
        let mut g_r = if target_reached || angle_to_real_target.abs() < 1.0_f32.to_radians() {
            0.0
        } else {
            from_rotation / min_real_rotation.abs()
        };
        let mut g_t = if target_reached {
            0.0
        } else {
            required_translation / distance_to_real_target
        };

        g_t = signed_angle(state.delta_pos, virtual_target - real_target).to_radians().cos() * g_t.abs();
        g_r *= sign(state.delta_dir);

        g_t = if g_t > 0.0 {
            g_t.min(settings.max_trans_gain)
        } else {
            g_t.max(settings.min_trans_gain)
        };
        g_r = if g_r > 0.0 {
            g_r.min(settings.max_rot_gain)
        } else {
            g_r.max(settings.min_rot_gain)
        };

        // Still checking out the previous target
        if (state.curr_pos - ctx.waypoints[self.waypoint_index - 1]).length() < update_distance {
            g_t = 0.0;
        }

        let (g_t, g_r, g_c) = (finite_or_zero(g_t), finite_or_zero(g_r), finite_or_zero(g_c));
        let delta_pos = state.delta_pos;
        let delta_dir = state.delta_dir;
        ctx.apply_translation(delta_pos * g_t);
        ctx.apply_rotation(g_r * delta_dir);
        ctx.apply_curvature(g_c * delta_pos.length());
    }
}

//! Artificial potential field strategies
//!
//! - `ThomasApf`: inverse-square repulsion from the nearest wall, obstacle and
//!   avatar points; gradient-following gains.
//! - `MessingerApf`: per-meter wall segments (exponent 2.656) and heading-aware
//!   avatar repulsion (exponent 3.091); proximity-scaled steering rate.
//! - `DynamicApf`: Messinger forces plus a projected-avatar term and a
//!   gravitational pull toward the most open region; defines a priority.
//! - `PassiveHapticApf`: Thomas repulsion plus attraction to a physical prop,
//!   switching to pure attraction once alignment is reachable.

use glam::Vec2;

use super::{
    RedirectContext, Redirector, SteeringCandidates, apply_larger, rotation_candidate,
    steer_by_negative_gradient, steering_direction,
};
use crate::consts::CURVATURE_GAIN_CAP_DEG_PER_SEC;
use crate::geometry::{edges, nearest_distance_to_obstacles_and_boundary, nearest_point_on_polygon};
use crate::settings::RedirectorKind;
use crate::sim::state::{AvatarSnapshot, TrackingSpace};
use crate::{angle_between, rotate_vector};

/// Wall segments are split to roughly this length (m)
const TARGET_SEG_LENGTH: f32 = 1.0;
/// Wall force constant
const C: f32 = 0.00897;
/// Wall distance exponent
const LAMBDA: f32 = 2.656;
/// Avatar distance exponent
const GAMMA: f32 = 3.091;
/// Maximum steering rate near walls (deg/s)
const M: f32 = 15.0;
/// Rotation rate injected while the user stands still (deg/s)
const BASE_RATE: f32 = 1.5;
/// Weight of the projected-avatar force
const AVATAR_FORCE_WEIGHT: f32 = 0.25;
/// Priority weights: force magnitude and misalignment
const A1: f32 = 1.0;
const A2: f32 = 0.02;
/// Steering target score weights: wall clearance and distance from box centre
const B1: f32 = 2.0;
const B2: f32 = 1.0;

/// Nearest points of every boundary edge, every obstacle and every other avatar
fn nearest_points(pos: Vec2, space: &TrackingSpace, others: &[AvatarSnapshot]) -> Vec<Vec2> {
    let mut points: Vec<Vec2> = (0..space.boundary.len())
        .filter_map(|i| {
            let p = space.boundary[i];
            let q = space.boundary[(i + 1) % space.boundary.len()];
            nearest_point_on_polygon(pos, &[p, q])
        })
        .collect();
    points.extend(
        space
            .obstacles
            .iter()
            .filter_map(|obstacle| nearest_point_on_polygon(pos, obstacle)),
    );
    points.extend(others.iter().map(|other| other.position));
    points
}

/// Sum of `weight * d / |d|^3` over the repelling points (un-normalized)
fn repulsive_gradient(pos: Vec2, points: &[Vec2], weight: f32) -> Vec2 {
    points.iter().fold(Vec2::ZERO, |ng, ob| {
        let d = pos - *ob;
        ng + d * weight * d.length_squared().powf(-1.5)
    })
}

/// Normalized Thomas negative gradient at the avatar's physical position
pub fn thomas_gradient(pos: Vec2, space: &TrackingSpace, others: &[AvatarSnapshot]) -> Vec2 {
    repulsive_gradient(pos, &nearest_points(pos, space, others), 1.0).normalize_or_zero()
}

#[derive(Debug, Default)]
pub struct ThomasApf {
    total_force: Option<Vec2>,
}

impl Redirector for ThomasApf {
    fn kind(&self) -> RedirectorKind {
        RedirectorKind::ThomasApf
    }

    fn inject_redirection(&mut self, ctx: &mut RedirectContext<'_>) {
        let ng = thomas_gradient(ctx.state.curr_pos_real, ctx.space, ctx.others);
        self.total_force = Some(ng);
        steer_by_negative_gradient(ctx, ng);
    }

    fn total_force(&self) -> Option<Vec2> {
        self.total_force
    }
}

/// Repulsion of one wall edge p->q, split into short segments
///
/// Only segments whose outward normal faces the avatar push.
fn wall_force(pos: Vec2, p: Vec2, q: Vec2) -> Vec2 {
    let length = (p - q).length();
    if length <= 0.0 {
        return Vec2::ZERO;
    }
    let seg_num = (length / TARGET_SEG_LENGTH).ceil().max(1.0);
    let seg_length = length / seg_num;
    let unit = (q - p).normalize_or_zero();

    let mut force = Vec2::ZERO;
    for i in 1..=seg_num as usize {
        let sp = p + unit * (i - 1) as f32 * seg_length;
        let sq = p + unit * i as f32 * seg_length;
        let center = (sp + sq) / 2.0;
        let d = pos - center;
        let n = rotate_vector(sq - sp, -90.0).normalize_or_zero();
        if n.dot(d.normalize_or_zero()) > 0.0 {
            force += d.normalize_or_zero() * C * (sq - sp).length() / d.length().powf(LAMBDA);
        }
    }
    force
}

/// Wall forces of the boundary (as listed) and obstacles (reversed edges)
fn walls_force(pos: Vec2, space: &TrackingSpace) -> Vec2 {
    let mut w: Vec2 = edges(&space.boundary).map(|(p, q)| wall_force(pos, p, q)).sum();
    for obstacle in &space.obstacles {
        w += edges(obstacle).map(|(p, q)| wall_force(pos, q, p)).sum::<Vec2>();
    }
    w
}

/// Repulsion from an avatar at `other_pos` heading `other_dir`, scaled by how much the two face each other
fn facing_force(pos: Vec2, dir: Vec2, other_pos: Vec2, other_dir: Vec2) -> Vec2 {
    let theta1 = angle_between(other_pos - pos, dir).to_radians();
    let theta2 = angle_between(pos - other_pos, other_dir).to_radians();
    let k = ((theta1.cos() + theta2.cos()) / 2.0).clamp(0.0, 1.0);
    let d = pos - other_pos;
    d.normalize_or_zero() * k / d.length().powf(GAMMA)
}

fn users_force(pos: Vec2, dir: Vec2, others: &[AvatarSnapshot]) -> Vec2 {
    others
        .iter()
        .map(|other| facing_force(pos, dir, other.position, other.forward))
        .sum()
}

/// Force toward where each other avatar is about to step
fn avatars_force(pos: Vec2, dir: Vec2, others: &[AvatarSnapshot]) -> Vec2 {
    others
        .iter()
        .map(|other| {
            let ahead = other.position + other.forward.normalize_or_zero();
            facing_force(pos, dir, ahead, other.forward) * AVATAR_FORCE_WEIGHT
        })
        .sum()
}

/// Proximity-scaled steering with a standing-still rotation floor
fn steer_by_rate(ctx: &mut RedirectContext<'_>, force: Vec2) {
    let steer = steering_direction(ctx.state.curr_dir_real, force);
    let curvature_cap = CURVATURE_GAIN_CAP_DEG_PER_SEC * ctx.dt;
    let radius = ctx.settings.curvature_radius;

    let speed = if ctx.dt > 0.0 {
        ctx.state.delta_pos.length() / ctx.dt
    } else {
        0.0
    };
    let mut rate = 360.0 * speed / (2.0 * std::f32::consts::PI * radius);
    let dist = ctx.space.nearest_distance(ctx.state.curr_pos_real);
    if dist < radius {
        let t = 1.0 - dist / radius;
        rate = (1.0 - t) * rate + t * M;
    }

    let candidates = SteeringCandidates {
        curvature: steer * (rate * ctx.dt).min(curvature_cap),
        rotation: rotation_candidate(ctx, steer, BASE_RATE * ctx.dt),
    };
    apply_larger(ctx, candidates);
}

#[derive(Debug, Default)]
pub struct MessingerApf {
    total_force: Option<Vec2>,
}

impl Redirector for MessingerApf {
    fn kind(&self) -> RedirectorKind {
        RedirectorKind::MessingerApf
    }

    fn inject_redirection(&mut self, ctx: &mut RedirectContext<'_>) {
        let pos = ctx.state.curr_pos_real;
        let dir = ctx.state.curr_dir_real;
        let force = (walls_force(pos, ctx.space) + users_force(pos, dir, ctx.others)).normalize_or_zero();
        self.total_force = Some(force);
        steer_by_rate(ctx, force);
    }

    fn total_force(&self) -> Option<Vec2> {
        self.total_force
    }
}

#[derive(Debug, Default)]
pub struct DynamicApf {
    total_force: Option<Vec2>,
}

impl DynamicApf {
    /// Direction toward the centre of the largest open box near the emptiest reachable spot
    pub fn gravitational_dir(pos: Vec2, dir: Vec2, space: &TrackingSpace, others: &[AvatarSnapshot]) -> Vec2 {
        let boundary = &space.boundary;
        let n = boundary.len();
        if n < 4 {
            return Vec2::ZERO;
        }

        // Two consecutive walls in front of the user span the search grid
        let mut foot1 = Vec2::ZERO;
        let mut foot2 = Vec2::ZERO;
        for i in 0..n {
            foot1 = nearest_point_on_polygon(pos, &[boundary[i], boundary[(i + 1) % n]]).unwrap_or(pos);
            foot2 = nearest_point_on_polygon(pos, &[boundary[(i + 1) % n], boundary[(i + 2) % n]])
                .unwrap_or(pos);
            if (foot1 - pos).dot(dir) >= 0.0 && (foot2 - pos).dot(dir) >= 0.0 {
                break;
            }
        }
        let x_dir = (foot1 - pos).normalize_or_zero();
        let y_dir = (foot2 - pos).normalize_or_zero();

        let mut primary = pos;
        let mut max_sum = 0.0;
        for i in 0..(foot1 - pos).length() as usize {
            for j in 0..(foot2 - pos).length() as usize {
                let target = pos + x_dir / 2.0 + y_dir / 2.0 + x_dir * i as f32 + y_dir * j as f32;
                let sum: f32 = others.iter().map(|o| (o.position - target).length()).sum();
                if sum > max_sum {
                    primary = target;
                    max_sum = sum;
                }
            }
        }

        // Largest empty box around the primary target
        let mut select: Vec<Vec2> = boundary.clone();
        select.extend(others.iter().map(|o| o.position));
        select.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));

        let mut max_area = 0.0;
        let (mut left, mut right, mut up, mut down) =
            (f32::NEG_INFINITY, f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY);
        for l in 0..select.len().saturating_sub(1) {
            for r in (l + 1)..select.len() {
                let left_x = select[l].x - primary.x;
                let right_x = select[r].x - primary.x;
                if !(left_x <= 0.0 && 0.0 <= right_x) {
                    continue;
                }
                let mut up_y = f32::INFINITY;
                let mut down_y = f32::NEG_INFINITY;
                for p in &select[l..=r] {
                    let dis = p.y - primary.y;
                    if dis >= 0.0 && dis < up_y {
                        up_y = dis;
                    }
                    if dis < 0.0 && dis > down_y {
                        down_y = dis;
                    }
                }
                if up_y.is_finite() && down_y.is_finite() {
                    let area = (up_y - down_y) * (right_x - left_x);
                    if area >= max_area {
                        max_area = area;
                        right = right_x;
                        left = left_x;
                        up = up_y;
                        down = down_y;
                    }
                }
            }
        }
        if !(left.is_finite() && right.is_finite() && up.is_finite() && down.is_finite()) {
            return Vec2::ZERO;
        }

        let x_dir = (boundary[1] - boundary[2]).normalize_or_zero();
        let y_dir = (boundary[2] - boundary[3]).normalize_or_zero();
        let start = primary + x_dir * left + y_dir * down;
        let (width, height) = (right - left, up - down);
        let mut steering_target = primary;
        let mut best = f32::NEG_INFINITY;
        for i in 0..width.ceil() as usize {
            for j in 0..height.ceil() as usize {
                let target = start + x_dir / 2.0 + y_dir / 2.0 + x_dir * i as f32 + y_dir * j as f32;
                let d1 = nearest_distance_to_obstacles_and_boundary(target, boundary, &[]);
                let d2 = (target - start - x_dir * width / 2.0 - y_dir * height / 2.0).length();
                let score = B1 * d1 - B2 * d2;
                if score > best {
                    steering_target = target;
                    best = score;
                }
            }
        }
        (steering_target - pos).normalize_or_zero()
    }
}

impl Redirector for DynamicApf {
    fn kind(&self) -> RedirectorKind {
        RedirectorKind::DynamicApf
    }

    fn inject_redirection(&mut self, ctx: &mut RedirectContext<'_>) {
        let pos = ctx.state.curr_pos_real;
        let dir = ctx.state.curr_dir_real;
        let force = walls_force(pos, ctx.space) + users_force(pos, dir, ctx.others) + avatars_force(pos, dir, ctx.others);
        let gravitation = Self::gravitational_dir(pos, dir, ctx.space, ctx.others) * force.length();
        let total = (force + gravitation).normalize_or_zero();
        self.total_force = Some(force.normalize_or_zero());
        steer_by_rate(ctx, total);
    }

    fn priority(&mut self, ctx: &RedirectContext<'_>) -> Option<f32> {
        let pos = ctx.state.curr_pos_real;
        let dir = ctx.state.curr_dir_real;
        let t = walls_force(pos, ctx.space) + users_force(pos, dir, ctx.others);
        Some(-(A1 * t.length() + A2 * angle_between(t, dir)))
    }

    fn total_force(&self) -> Option<Vec2> {
        self.total_force
    }
}

/// Attraction weight of the physical prop
const ATTRACTION: f32 = 2.0;

#[derive(Debug, Default)]
pub struct PassiveHapticApf {
    total_force: Option<Vec2>,
    /// Once the prop is reachable with allowed gains, only attraction steers
    aligned: bool,
}

impl PassiveHapticApf {
    pub fn is_aligned(&self) -> bool {
        self.aligned
    }

    fn update_alignment(&mut self, ctx: &RedirectContext<'_>, target: Vec2) {
        if self.aligned {
            return;
        }
        let Some(object_virtual) = ctx.waypoints.last() else {
            return;
        };
        let pos_real = ctx.state.curr_pos_real;
        let dv = (*object_virtual - ctx.state.curr_pos).length();
        let dp = (target - pos_real).length();
        let lo = ctx.settings.min_trans_gain + 1.0;
        let hi = ctx.settings.max_trans_gain + 1.0;
        let phi = angle_between(ctx.state.curr_dir_real, target - pos_real).to_radians();
        if lo * dp < dv && dv < hi * dp && phi < ((dp / ctx.settings.curvature_radius) / 2.0).asin() {
            log::debug!("Avatar {} aligned with its physical target", ctx.state.id);
            self.aligned = true;
        }
    }
}

impl Redirector for PassiveHapticApf {
    fn kind(&self) -> RedirectorKind {
        RedirectorKind::PassiveHapticApf
    }

    fn inject_redirection(&mut self, ctx: &mut RedirectContext<'_>) {
        let pos = ctx.state.curr_pos_real;
        let repulsion = repulsive_gradient(pos, &nearest_points(pos, ctx.space, ctx.others), 1.0);
        let ng = match ctx.physical_target {
            Some(target) => {
                self.update_alignment(ctx, target.position);
                let attraction = (target.position - pos) * ATTRACTION;
                if self.aligned { attraction } else { attraction + repulsion }
            }
            None => repulsion,
        }
        .normalize_or_zero();
        self.total_force = Some(ng);
        steer_by_negative_gradient(ctx, ng);
    }

    fn total_force(&self) -> Option<Vec2> {
        self.total_force
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{walking_state, with_ctx};
    use super::*;
    use crate::geometry::Pose;
    use crate::settings::Settings;
    use crate::sim::state::GainKind;

    #[test]
    fn test_thomas_gradient_points_away_from_near_wall() {
        let space = TrackingSpace::rectangle(10.0, 10.0);
        let ng = thomas_gradient(Vec2::new(0.0, 4.0), &space, &[]);
        assert!(ng.y < -0.9);
        let centre = thomas_gradient(Vec2::ZERO, &space, &[]);
        assert!(centre.length() < 0.001);
    }

    #[test]
    fn test_thomas_gradient_repels_from_avatar() {
        let space = TrackingSpace::rectangle(40.0, 40.0);
        let other = AvatarSnapshot {
            id: 1,
            position: Vec2::new(1.0, 0.0),
            forward: Vec2::Y,
        };
        let ng = thomas_gradient(Vec2::ZERO, &space, &[other]);
        assert!(ng.x < -0.9);
    }

    #[test]
    fn test_thomas_steers_toward_gradient() {
        // Near the top wall heading +x: the gradient points -y (clockwise of +x)
        let space = TrackingSpace::rectangle(10.0, 10.0);
        let settings = Settings::default();
        let mut state = walking_state(Vec2::new(1.0 / 60.0, 0.0), 0.0);
        state.head = Pose::new(Vec2::new(0.0, 4.0), Vec2::X);
        state.curr_pos_real = Vec2::new(0.0, 4.0);
        state.curr_dir_real = Vec2::X;
        let (_, events) = with_ctx(&mut state, &space, &[], &settings, |ctx| {
            let mut apf = ThomasApf::default();
            apf.inject_redirection(ctx);
        });
        let curvature = events.iter().find(|e| e.kind == GainKind::Curvature).unwrap();
        // World rotates counter-clockwise so the user turns clockwise physically
        assert!(curvature.applied < 0.0);
        assert!(curvature.value.abs() <= 1.0 / settings.curvature_radius + 1e-5);
    }

    #[test]
    fn test_wall_force_only_from_facing_side() {
        // Boundary edge along +x at y = 5 (counter-clockwise room); avatar below it
        let inside = wall_force(Vec2::new(0.0, 4.0), Vec2::new(5.0, 5.0), Vec2::new(-5.0, 5.0));
        assert!(inside.y < 0.0);
        let outside = wall_force(Vec2::new(0.0, 6.0), Vec2::new(5.0, 5.0), Vec2::new(-5.0, 5.0));
        assert_eq!(outside, Vec2::ZERO);
        assert_eq!(wall_force(Vec2::ZERO, Vec2::ONE, Vec2::ONE), Vec2::ZERO);
    }

    #[test]
    fn test_facing_force_zero_when_back_to_back() {
        let f = facing_force(Vec2::ZERO, -Vec2::X, Vec2::new(1.0, 0.0), Vec2::X);
        assert!(f.length() < 1e-6);
        let f = facing_force(Vec2::ZERO, Vec2::X, Vec2::new(1.0, 0.0), -Vec2::X);
        assert!(f.x < 0.0);
    }

    #[test]
    fn test_messinger_standing_still_uses_base_rate() {
        // Farther than the curvature radius from every wall
        let space = TrackingSpace::rectangle(40.0, 40.0);
        let settings = Settings::default();
        let mut state = walking_state(Vec2::ZERO, 0.0);
        state.curr_pos_real = Vec2::new(0.0, 5.0);
        state.curr_dir_real = Vec2::X;
        let before = state.head.forward;
        with_ctx(&mut state, &space, &[], &settings, |ctx| {
            MessingerApf::default().inject_redirection(ctx);
        });
        let turned = crate::signed_angle(before, state.head.forward).abs();
        assert!((turned - BASE_RATE / 60.0).abs() < 1e-3);
    }

    #[test]
    fn test_base_rate_floor_escapes_rotation_bounds() {
        let space = TrackingSpace::rectangle(40.0, 40.0);
        let settings = Settings::default();
        let slow_turn = |redirector: &mut dyn Redirector| {
            let mut state = walking_state(Vec2::ZERO, 0.001);
            state.curr_pos_real = Vec2::new(0.0, 5.0);
            state.curr_dir_real = Vec2::X;
            let (_, events) = with_ctx(&mut state, &space, &[], &settings, |ctx| {
                redirector.inject_redirection(ctx);
            });
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].kind, GainKind::Rotation);
            events[0].value
        };

        // Floored: 1.5 deg/s over a 0.001 degree turn
        let floored = slow_turn(&mut MessingerApf::default());
        assert!((floored.abs() - BASE_RATE / 60.0 / 0.001).abs() < 0.5);
        assert!(floored.abs() > settings.max_rot_gain);

        let bounded = slow_turn(&mut ThomasApf::default());
        assert!(bounded >= settings.min_rot_gain - 1e-3 && bounded <= settings.max_rot_gain + 1e-3);
    }

    #[test]
    fn test_dynamic_priority_ranks_crowded_avatar_first() {
        let space = TrackingSpace::rectangle(10.0, 10.0);
        let settings = Settings::default();
        let mut apf = DynamicApf::default();

        let mut near_wall = walking_state(Vec2::ZERO, 0.0);
        near_wall.curr_pos_real = Vec2::new(0.0, 4.7);
        let (p_wall, _) = with_ctx(&mut near_wall, &space, &[], &settings, |ctx| apf.priority(ctx));

        let mut centre = walking_state(Vec2::ZERO, 0.0);
        centre.curr_pos_real = Vec2::new(0.0, 0.5);
        let (p_centre, _) = with_ctx(&mut centre, &space, &[], &settings, |ctx| apf.priority(ctx));

        assert!(p_wall.unwrap() < p_centre.unwrap());
    }

    #[test]
    fn test_gravitation_is_finite_unit_or_zero() {
        let space = TrackingSpace::rectangle(10.0, 10.0);
        let others = [AvatarSnapshot {
            id: 1,
            position: Vec2::new(2.0, 2.0),
            forward: Vec2::Y,
        }];
        let g = DynamicApf::gravitational_dir(Vec2::new(-1.0, -1.0), Vec2::Y, &space, &others);
        assert!(g.is_finite());
        assert!(g.length() < 1e-6 || (g.length() - 1.0).abs() < 1e-4);

        let triangle = TrackingSpace::new(vec![Vec2::new(0.0, 5.0), Vec2::new(-5.0, -5.0), Vec2::new(5.0, -5.0)], vec![]);
        assert_eq!(DynamicApf::gravitational_dir(Vec2::ZERO, Vec2::Y, &triangle, &[]), Vec2::ZERO);
    }

    #[test]
    fn test_passive_haptic_attracts_to_target() {
        let space = TrackingSpace::rectangle(20.0, 20.0);
        let settings = Settings::default();
        let mut state = walking_state(Vec2::new(0.0, 1.0 / 60.0), 0.0);
        state.curr_pos_real = Vec2::ZERO;
        state.curr_dir_real = Vec2::Y;
        let target = Pose::new(Vec2::new(5.0, 0.0), Vec2::X);
        let mut apf = PassiveHapticApf::default();
        let mut ctx = crate::sim::redirect::RedirectContext::new(
            &mut state, &space, &[], &settings, 1.0 / 60.0, &[], Some(target), &[], true,
        );
        apf.inject_redirection(&mut ctx);
        let force = apf.total_force().unwrap();
        assert!(force.x > 0.9);
    }

    #[test]
    fn test_passive_haptic_alignment_switch() {
        let space = TrackingSpace::rectangle(20.0, 20.0);
        let settings = Settings::default();
        let mut state = walking_state(Vec2::new(0.0, 1.0 / 60.0), 0.0);
        state.curr_pos = Vec2::ZERO;
        state.curr_pos_real = Vec2::ZERO;
        state.curr_dir_real = Vec2::Y;
        // Prop 4 m ahead physically, object 4.2 m ahead virtually, facing it
        let target = Pose::new(Vec2::new(0.0, 4.0), Vec2::Y);
        let waypoints = [Vec2::new(0.0, 4.2)];
        let mut apf = PassiveHapticApf::default();
        let mut ctx = crate::sim::redirect::RedirectContext::new(
            &mut state, &space, &[], &settings, 1.0 / 60.0, &waypoints, Some(target), &[], true,
        );
        apf.inject_redirection(&mut ctx);
        assert!(apf.is_aligned());
    }
}

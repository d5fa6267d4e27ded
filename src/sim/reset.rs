//! Reset maneuvers
//!
//! A reset starts when the user is about to walk into a wall, an obstacle or
//! another user. The user turns in place while the world is rotated so that
//! afterwards they face open physical space and keep their virtual heading.

use glam::Vec2;

use super::redirect::RedirectContext;
use super::redirect::apf::thomas_gradient;
use super::state::{AvatarSnapshot, TrackingSpace};
use crate::geometry::edges;
use crate::settings::{ResetterKind, Settings};
use crate::{angle_between, cross, sign, signed_angle};

/// Slack (deg) below a right angle for point collisions
const TOLERANCE_ANGLE_ERROR: f32 = 1.0;

/// Walking from `pos` along `dir` would hit `point` within `buffer`
pub fn collides_with_point(pos: Vec2, dir: Vec2, point: Vec2, buffer: f32) -> bool {
    (point - pos).length() <= buffer && angle_between(point - pos, dir) < 90.0 - TOLERANCE_ANGLE_ERROR
}

/// Walking from `pos` along `dir` would hit a wall, an obstacle or another user within `buffer`
pub fn collision_happens(
    pos: Vec2,
    dir: Vec2,
    space: &TrackingSpace,
    others: &[AvatarSnapshot],
    buffer: f32,
) -> bool {
    let polygons = std::iter::once(&space.boundary).chain(space.obstacles.iter());
    for polygon in polygons {
        for (p, q) in edges(polygon) {
            if collides_with_point(pos, dir, p, buffer) {
                return true;
            }
            let edge = q - p;
            let near = cross(edge, pos - p).abs() / edge.length() <= buffer;
            let within = edge.dot(pos - p) >= 0.0 && (p - q).dot(pos - q) >= 0.0;
            if near && within {
                let heading = cross(edge, dir);
                if heading.abs() > 1e-3 && sign(heading) != sign(cross(edge, pos - p)) {
                    return true;
                }
            }
        }
    }
    others
        .iter()
        .any(|other| collides_with_point(pos, dir, other.position, buffer))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetStatus {
    InProgress,
    Finished,
}

/// A reset maneuver
pub trait Resetter {
    fn kind(&self) -> ResetterKind;

    /// A reset must start (or the walker must hold still) at this physical pose
    fn is_reset_required(
        &self,
        pos: Vec2,
        dir: Vec2,
        space: &TrackingSpace,
        others: &[AvatarSnapshot],
        settings: &Settings,
    ) -> bool {
        collision_happens(pos, dir, space, others, settings.reset_trigger_buffer)
    }

    /// Plan the maneuver; `force` is the redirector's last steering force
    fn initialize_reset(&mut self, ctx: &RedirectContext<'_>, force: Option<Vec2>);

    /// Rotate the world for this step's turn
    fn inject_resetting(&mut self, ctx: &mut RedirectContext<'_>) -> ResetStatus;

    fn end_reset(&mut self) {}

    /// Signed in-place turn (deg) the simulated user performs this step
    fn walker_update(&mut self, dt: f32, settings: &Settings) -> f32;
}

/// Rotation the walker performs this step, consuming `required`
fn consume_rotation(required: &mut f32, dt: f32, settings: &Settings) -> f32 {
    let rotate = dt * settings.rotation_speed;
    if rotate >= *required {
        let rest = *required;
        *required = 0.0;
        rest
    } else {
        *required -= rotate;
        rotate
    }
}

/// Never resets; the walker is never held
#[derive(Debug, Default)]
pub struct NullResetter;

impl Resetter for NullResetter {
    fn kind(&self) -> ResetterKind {
        ResetterKind::Null
    }

    fn is_reset_required(
        &self,
        _pos: Vec2,
        _dir: Vec2,
        _space: &TrackingSpace,
        _others: &[AvatarSnapshot],
        _settings: &Settings,
    ) -> bool {
        false
    }

    fn initialize_reset(&mut self, _ctx: &RedirectContext<'_>, _force: Option<Vec2>) {}

    fn inject_resetting(&mut self, _ctx: &mut RedirectContext<'_>) -> ResetStatus {
        ResetStatus::Finished
    }

    fn walker_update(&mut self, _dt: f32, _settings: &Settings) -> f32 {
        0.0
    }
}

/// 180 degree physical turn while the world turns along, for 360 virtual degrees
#[derive(Debug, Default)]
pub struct TwoOneTurnResetter {
    overall_injected: f32,
    required_rotation: f32,
}

impl Resetter for TwoOneTurnResetter {
    fn kind(&self) -> ResetterKind {
        ResetterKind::TwoOneTurn
    }

    fn initialize_reset(&mut self, ctx: &RedirectContext<'_>, _force: Option<Vec2>) {
        log::debug!("Avatar {} starts a 2:1 turn", ctx.state.id);
        self.overall_injected = 0.0;
        self.required_rotation = 180.0;
    }

    fn inject_resetting(&mut self, ctx: &mut RedirectContext<'_>) -> ResetStatus {
        if self.overall_injected.abs() >= 180.0 {
            return ResetStatus::Finished;
        }
        let delta_dir = ctx.state.delta_dir;
        // Keep turning the way the user turns until 180 degrees are injected;
        // a turn too small to measure keeps the side chosen so far
        let clockwise = if delta_dir != 0.0 {
            delta_dir > 0.0
        } else {
            self.overall_injected >= 0.0
        };
        let remaining = if clockwise {
            180.0 - self.overall_injected
        } else {
            -180.0 - self.overall_injected
        };
        if remaining.abs() < delta_dir.abs() || self.required_rotation == 0.0 {
            ctx.apply_reset_rotation(remaining);
            self.overall_injected += remaining;
            ResetStatus::Finished
        } else {
            ctx.apply_reset_rotation(delta_dir);
            self.overall_injected += delta_dir;
            ResetStatus::InProgress
        }
    }

    fn walker_update(&mut self, dt: f32, settings: &Settings) -> f32 {
        consume_rotation(&mut self.required_rotation, dt, settings)
    }
}

/// Turn until facing the potential field force, toward the side of the larger angle
#[derive(Debug, Default)]
pub struct ApfResetter {
    /// World rotation still to inject (deg, unsigned)
    required_steer: f32,
    /// Physical turn still to perform (deg, unsigned)
    required_rotation: f32,
    /// +1 clockwise, -1 counter-clockwise
    rotate_dir: f32,
    speed_ratio: f32,
}

impl Resetter for ApfResetter {
    fn kind(&self) -> ResetterKind {
        ResetterKind::Apf
    }

    fn initialize_reset(&mut self, ctx: &RedirectContext<'_>, force: Option<Vec2>) {
        let dir = ctx.state.curr_dir_real;
        let force = force.unwrap_or_else(|| thomas_gradient(ctx.state.curr_pos_real, ctx.space, ctx.others));
        let target_real = 360.0 - angle_between(force, dir);
        self.rotate_dir = -sign(signed_angle(dir, force));
        self.required_steer = 360.0 - target_real;
        self.required_rotation = target_real;
        self.speed_ratio = self.required_steer / self.required_rotation;
        log::debug!(
            "Avatar {} resets toward {:?}: turn {:.1} deg, steer {:.1} deg",
            ctx.state.id,
            force,
            target_real * self.rotate_dir,
            self.required_steer
        );
    }

    fn inject_resetting(&mut self, ctx: &mut RedirectContext<'_>) -> ResetStatus {
        let steer = self.speed_ratio * ctx.state.delta_dir;
        if self.required_steer.abs() <= steer.abs() || self.required_rotation == 0.0 {
            ctx.apply_reset_rotation(self.required_steer * self.rotate_dir);
            self.required_steer = 0.0;
            ResetStatus::Finished
        } else {
            ctx.apply_reset_rotation(steer);
            self.required_steer -= steer.abs();
            ResetStatus::InProgress
        }
    }

    fn walker_update(&mut self, dt: f32, settings: &Settings) -> f32 {
        consume_rotation(&mut self.required_rotation, dt, settings) * self.rotate_dir
    }
}

/// Build the resetter for `kind`
pub fn create_resetter(kind: ResetterKind) -> Box<dyn Resetter> {
    match kind {
        ResetterKind::Null => Box::new(NullResetter),
        ResetterKind::TwoOneTurn => Box::new(TwoOneTurnResetter::default()),
        ResetterKind::Apf => Box::new(ApfResetter::default()),
    }
}

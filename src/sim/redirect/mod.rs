//! Steering strategies ("redirectors")
//!
//! Every strategy injects redirection through the three primitives on
//! [`RedirectContext`]: `apply_translation`, `apply_rotation` and
//! `apply_curvature`. They edit the avatar's physical frame and are the only
//! place gain events are produced.

pub mod apf;
pub mod learned;
pub mod steer;
pub mod vispoly;
pub mod zigzag;

pub use apf::{DynamicApf, MessingerApf, PassiveHapticApf, ThomasApf};
pub use learned::{LearnedPolicy, NeutralPolicy, PolicyModel};
pub use steer::{SteerToCenter, SteerToOrbit};
pub use vispoly::VisPolyRedirector;
pub use zigzag::ZigZagRedirector;

use glam::Vec2;

use super::state::{AvatarSnapshot, AvatarState, GainEvent, GainKind, TrackingSpace};
use crate::consts::{CURVATURE_GAIN_CAP_DEG_PER_SEC, ROTATION_GAIN_CAP_DEG_PER_SEC};
use crate::geometry::{Polygon, Pose};
use crate::settings::{RedirectorKind, Settings};
use crate::{finite_or_zero, sign, signed_angle};

/// Everything a strategy may read, plus write access to its own avatar
pub struct RedirectContext<'a> {
    pub state: &'a mut AvatarState,
    pub space: &'a TrackingSpace,
    /// Other avatars, physical space
    pub others: &'a [AvatarSnapshot],
    pub settings: &'a Settings,
    /// Step duration (seconds)
    pub dt: f32,
    /// Virtual waypoints of this avatar
    pub waypoints: &'a [Vec2],
    /// Physical prop pose for passive haptics
    pub physical_target: Option<Pose>,
    pub virtual_obstacles: &'a [Polygon],
    /// Motion comes from the built-in autopilot
    pub autopilot: bool,
    events: Vec<GainEvent>,
}

impl<'a> RedirectContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: &'a mut AvatarState,
        space: &'a TrackingSpace,
        others: &'a [AvatarSnapshot],
        settings: &'a Settings,
        dt: f32,
        waypoints: &'a [Vec2],
        physical_target: Option<Pose>,
        virtual_obstacles: &'a [Polygon],
        autopilot: bool,
    ) -> Self {
        Self {
            state,
            space,
            others,
            settings,
            dt,
            waypoints,
            physical_target,
            virtual_obstacles,
            autopilot,
            events: Vec::new(),
        }
    }

    /// Shift the virtual world by `translation` (virtual space)
    pub fn apply_translation(&mut self, translation: Vec2) {
        if !translation.is_finite() || translation.length() <= 0.0 {
            return;
        }
        self.state.translate_frame(translation);
        let delta = self.state.delta_pos.length();
        if delta > 0.0 {
            let gain = sign(translation.dot(self.state.delta_pos)) * translation.length() / delta;
            self.events.push(GainEvent {
                kind: GainKind::Translation,
                value: gain,
                applied: translation.length(),
            });
        }
    }

    /// Rotate the virtual world by `degrees`, attributed to the user's own turning
    pub fn apply_rotation(&mut self, degrees: f32) {
        let degrees = finite_or_zero(degrees);
        if degrees == 0.0 {
            return;
        }
        self.state.rotate_frame(degrees);
        if self.state.delta_dir != 0.0 {
            self.events.push(GainEvent {
                kind: GainKind::Rotation,
                value: degrees / self.state.delta_dir,
                applied: degrees,
            });
        }
    }

    /// Rotate the virtual world by `degrees`, attributed to the user's walking
    ///
    /// The recorded gain is in radians per meter.
    pub fn apply_curvature(&mut self, degrees: f32) {
        let degrees = finite_or_zero(degrees);
        if degrees == 0.0 {
            return;
        }
        self.state.rotate_frame(degrees);
        let walked = self.state.delta_pos.length();
        if walked != 0.0 {
            self.events.push(GainEvent {
                kind: GainKind::Curvature,
                value: degrees.to_radians() / walked,
                applied: degrees,
            });
        }
    }

    /// Reset maneuvers rotate the world without recording a gain
    pub fn apply_reset_rotation(&mut self, degrees: f32) {
        let degrees = finite_or_zero(degrees);
        if degrees != 0.0 {
            self.state.rotate_frame(degrees);
        }
    }

    pub fn into_events(self) -> Vec<GainEvent> {
        self.events
    }

    pub fn events(&self) -> &[GainEvent] {
        &self.events
    }
}

/// A steering strategy
pub trait Redirector {
    fn kind(&self) -> RedirectorKind;

    /// Inject this step's redirection; never called during a reset
    fn inject_redirection(&mut self, ctx: &mut RedirectContext<'_>);

    /// Processing priority for this tick (larger first); `None` keeps input order
    fn priority(&mut self, _ctx: &RedirectContext<'_>) -> Option<f32> {
        None
    }

    /// Last steering force in physical space, if the strategy computes one
    fn total_force(&self) -> Option<Vec2> {
        None
    }
}

/// Strategy that never redirects
#[derive(Debug, Default)]
pub struct NullRedirector;

impl Redirector for NullRedirector {
    fn kind(&self) -> RedirectorKind {
        RedirectorKind::Null
    }

    fn inject_redirection(&mut self, _ctx: &mut RedirectContext<'_>) {}
}

/// Build the strategy for `kind`
pub fn create_redirector(kind: RedirectorKind) -> Box<dyn Redirector> {
    match kind {
        RedirectorKind::Null => Box::new(NullRedirector),
        RedirectorKind::SteerToCenter => Box::new(SteerToCenter::default()),
        RedirectorKind::SteerToOrbit => Box::new(SteerToOrbit::default()),
        RedirectorKind::ZigZag => Box::new(ZigZagRedirector::default()),
        RedirectorKind::ThomasApf => Box::new(ThomasApf::default()),
        RedirectorKind::MessingerApf => Box::new(MessingerApf::default()),
        RedirectorKind::DynamicApf => Box::new(DynamicApf::default()),
        RedirectorKind::DeepLearning => Box::new(LearnedPolicy::default()),
        RedirectorKind::PassiveHapticApf => Box::new(PassiveHapticApf::default()),
        RedirectorKind::VisPoly => Box::new(VisPolyRedirector::default()),
    }
}

/// Candidate rotations of the larger-wins policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SteeringCandidates {
    /// Signed degrees from curvature gain
    pub curvature: f32,
    /// Signed degrees from rotation gain
    pub rotation: f32,
}

/// Direction (+1 / -1) to rotate the world so the user turns physically toward `desired`
#[inline]
pub(crate) fn steering_direction(current_real_dir: Vec2, desired: Vec2) -> f32 {
    -sign(signed_angle(current_real_dir, desired))
}

/// Rotation-gain candidate, using the bound that opposes or supports the current turn
///
/// A non-zero `floor` (deg per step) wins over the bounded gain when the user
/// barely turns. The recorded rotation gain is then `floor / delta_dir` and
/// may lie outside `[min_rot_gain, max_rot_gain]`; only Messinger steering
/// passes a floor.
pub(crate) fn rotation_candidate(ctx: &RedirectContext<'_>, steer: f32, floor: f32) -> f32 {
    let cap = ROTATION_GAIN_CAP_DEG_PER_SEC * ctx.dt;
    let delta_dir = ctx.state.delta_dir;
    let gain = if delta_dir * steer < 0.0 {
        ctx.settings.min_rot_gain
    } else {
        ctx.settings.max_rot_gain
    };
    steer * floor.max((delta_dir * gain).abs().min(cap))
}

/// Apply whichever candidate has the larger magnitude; the other is dropped
pub(crate) fn apply_larger(ctx: &mut RedirectContext<'_>, candidates: SteeringCandidates) {
    if candidates.rotation.abs() > candidates.curvature.abs() {
        ctx.apply_rotation(candidates.rotation);
    } else {
        ctx.apply_curvature(candidates.curvature);
    }
}

/// Gradient-following policy shared by the Thomas-style strategies
///
/// Walking against the gradient earns the minimum translation gain; then the
/// larger of the bounded curvature and rotation candidates is applied.
pub(crate) fn steer_by_negative_gradient(ctx: &mut RedirectContext<'_>, ng: Vec2) {
    let dir_real = ctx.state.curr_dir_real;
    if ng.dot(dir_real) < 0.0 {
        let g_t = -ctx.settings.min_trans_gain;
        let translation = ctx.state.delta_pos * g_t;
        ctx.apply_translation(translation);
    }

    let steer = steering_direction(dir_real, ng);
    let curvature_cap = CURVATURE_GAIN_CAP_DEG_PER_SEC * ctx.dt;
    let from_curvature = (ctx.state.delta_pos.length() / ctx.settings.curvature_radius).to_degrees();
    let candidates = SteeringCandidates {
        curvature: steer * from_curvature.min(curvature_cap),
        rotation: rotation_candidate(ctx, steer, 0.0),
    };
    apply_larger(ctx, candidates);
}

//! rdw-sim - Redirected walking simulation engine
//!
//! Core modules:
//! - `geometry`: 2D kernel (nearest points, buffers, visibility polygons)
//! - `sim`: Deterministic simulation (avatar state, redirectors, resetters, statistics)
//! - `generate`: Virtual path and tracking space generators
//! - `io`: Minimal input schemas (waypoints, tracking spaces, command files)
//! - `settings`: Global parameters and strategy choices
//!
//! Angles are in degrees. Positive angles rotate clockwise when the plane is
//! viewed from above with +x to the right and +y forward.

pub mod error;
pub mod generate;
pub mod geometry;
pub mod io;
pub mod settings;
pub mod sim;

pub use error::{ConfigError, SimError};
pub use geometry::{Polygon, Pose};
pub use settings::{
    AvatarConfig, PathSeedKind, PathSource, RedirectorKind, ResetterKind,
    Settings, TrackingSpaceKind, TrialSetup,
};
pub use sim::{EndState, MotionInput, Simulation, TickInput, TrialSummary};

use glam::Vec2;

/// Default configuration constants
pub mod consts {
    /// Upper bound of the translation gain
    pub const MAX_TRANS_GAIN: f32 = 0.26;
    /// Lower bound of the translation gain
    pub const MIN_TRANS_GAIN: f32 = -0.14;
    /// Upper bound of the rotation gain
    pub const MAX_ROT_GAIN: f32 = 0.49;
    /// Lower bound of the rotation gain
    pub const MIN_ROT_GAIN: f32 = -0.2;
    /// Radius (meters) of the tightest imperceptible curvature
    pub const CURVATURE_RADIUS: f32 = 7.5;
    /// Distance (meters) to a wall, obstacle or avatar that triggers a reset
    pub const RESET_TRIGGER_BUFFER: f32 = 0.5;

    /// Simulation frames per second (fixed step = 1 / TARGET_FPS)
    pub const TARGET_FPS: f32 = 60.0;
    /// Autopilot walking speed (m/s)
    pub const TRANSLATION_SPEED: f32 = 1.0;
    /// Autopilot turning speed (deg/s)
    pub const ROTATION_SPEED: f32 = 90.0;
    /// Distance at which a waypoint counts as reached
    pub const WAYPOINT_THRESHOLD: f32 = 0.05;

    /// Statistics sampling frequency (Hz)
    pub const SAMPLING_FREQUENCY: f32 = 10.0;
    /// Resets allowed before a trial is invalidated
    pub const MAX_RESET_COUNT: u32 = 1000;
    /// Seconds an autopilot avatar may stand still before a trial is invalidated
    pub const MAX_SAME_POS_TIME: f32 = 50.0;

    /// Per-second caps on redirection injected by steering policies
    pub const CURVATURE_GAIN_CAP_DEG_PER_SEC: f32 = 15.0;
    pub const ROTATION_GAIN_CAP_DEG_PER_SEC: f32 = 30.0;

    /// Generated path length (meters)
    pub const PATH_LENGTH: f32 = 400.0;
    /// Area (m^2) the built-in tracking spaces are scaled to
    pub const TARGET_AREA: f32 = 400.0;
    /// Default RNG seed for generated paths
    pub const DEFAULT_SEED: u64 = 3041;
}

/// Sign with 0 treated as positive
#[inline]
pub fn sign(x: f32) -> f32 {
    if x >= 0.0 { 1.0 } else { -1.0 }
}

/// 2D cross product (z component)
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Rotate a vector clockwise by `degrees`
#[inline]
pub fn rotate_vector(v: Vec2, degrees: f32) -> Vec2 {
    let (s, c) = (-degrees.to_radians()).sin_cos();
    Vec2::new(v.x * c - v.y * s, v.x * s + v.y * c)
}

/// Unsigned angle between two vectors in [0, 180]; 0 when either is degenerate
#[inline]
pub fn angle_between(a: Vec2, b: Vec2) -> f32 {
    let denominator = (a.length_squared() * b.length_squared()).sqrt();
    if denominator < 1e-15 {
        return 0.0;
    }
    (a.dot(b) / denominator).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Signed angle from `from` to `to`, positive when `to` is clockwise of `from`
#[inline]
pub fn signed_angle(from: Vec2, to: Vec2) -> f32 {
    sign(-cross(from, to)) * angle_between(from, to)
}

/// Replace NaN (and infinities) with zero
#[inline]
pub fn finite_or_zero(x: f32) -> f32 {
    if x.is_finite() { x } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_vector_clockwise() {
        let v = rotate_vector(Vec2::Y, 90.0);
        assert!((v - Vec2::X).length() < 0.0001);
        let v = rotate_vector(Vec2::Y, -90.0);
        assert!((v + Vec2::X).length() < 0.0001);
    }

    #[test]
    fn test_signed_angle_sign() {
        assert!((signed_angle(Vec2::Y, Vec2::X) - 90.0).abs() < 0.001);
        assert!((signed_angle(Vec2::Y, -Vec2::X) + 90.0).abs() < 0.001);
        assert_eq!(signed_angle(Vec2::Y, Vec2::Y), 0.0);
    }

    #[test]
    fn test_signed_angle_matches_rotation() {
        for deg in [-170.0, -45.0, 10.0, 135.0] {
            let v = rotate_vector(Vec2::new(0.3, 0.8), deg);
            assert!((signed_angle(Vec2::new(0.3, 0.8), v) - deg).abs() < 0.01);
        }
    }

    #[test]
    fn test_angle_with_zero_vector() {
        assert_eq!(angle_between(Vec2::ZERO, Vec2::X), 0.0);
    }

    #[test]
    fn test_sign_of_zero() {
        assert_eq!(sign(0.0), 1.0);
        assert_eq!(sign(-0.5), -1.0);
    }
}

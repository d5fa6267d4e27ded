//! Simulation settings and trial configuration
//!
//! `Settings` holds the global parameters shared by every trial and persists
//! as JSON. `TrialSetup` describes one trial: the tracking space and one
//! `AvatarConfig` per simulated user.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::ConfigError;
use crate::geometry::{Polygon, Pose};
use crate::sim::state::TrackingSpace;

/// Steering strategy applied while the user walks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RedirectorKind {
    #[default]
    Null,
    SteerToCenter,
    SteerToOrbit,
    ZigZag,
    ThomasApf,
    MessingerApf,
    DynamicApf,
    DeepLearning,
    PassiveHapticApf,
    VisPoly,
}

impl RedirectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedirectorKind::Null => "null",
            RedirectorKind::SteerToCenter => "s2c",
            RedirectorKind::SteerToOrbit => "s2o",
            RedirectorKind::ZigZag => "zigzag",
            RedirectorKind::ThomasApf => "thomasapf",
            RedirectorKind::MessingerApf => "messingerapf",
            RedirectorKind::DynamicApf => "dynamicapf",
            RedirectorKind::DeepLearning => "deeplearning",
            RedirectorKind::PassiveHapticApf => "passivehapticapf",
            RedirectorKind::VisPoly => "vispoly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "null" | "none" => Some(RedirectorKind::Null),
            "s2c" => Some(RedirectorKind::SteerToCenter),
            "s2o" => Some(RedirectorKind::SteerToOrbit),
            "zigzag" => Some(RedirectorKind::ZigZag),
            "thomasapf" => Some(RedirectorKind::ThomasApf),
            "messingerapf" => Some(RedirectorKind::MessingerApf),
            "dynamicapf" => Some(RedirectorKind::DynamicApf),
            "deeplearning" => Some(RedirectorKind::DeepLearning),
            "passivehapticapf" => Some(RedirectorKind::PassiveHapticApf),
            "vispoly" => Some(RedirectorKind::VisPoly),
            _ => None,
        }
    }
}

/// Reset maneuver used when a collision is imminent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ResetterKind {
    Null,
    #[default]
    TwoOneTurn,
    Apf,
}

impl ResetterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetterKind::Null => "null",
            ResetterKind::TwoOneTurn => "twooneturn",
            ResetterKind::Apf => "apf",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "null" | "none" => Some(ResetterKind::Null),
            "twooneturn" | "2:1turn" => Some(ResetterKind::TwoOneTurn),
            "apf" | "apfresetter" => Some(ResetterKind::Apf),
            _ => None,
        }
    }
}

/// Virtual path pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PathSeedKind {
    #[default]
    Turn90,
    RandomTurn,
    StraightLine,
    Sawtooth,
    Circle,
    FigureEight,
    FilePath,
    RealUserPath,
}

impl PathSeedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathSeedKind::Turn90 => "90turn",
            PathSeedKind::RandomTurn => "randomturn",
            PathSeedKind::StraightLine => "straightline",
            PathSeedKind::Sawtooth => "sawtooth",
            PathSeedKind::Circle => "circle",
            PathSeedKind::FigureEight => "figureeight",
            PathSeedKind::FilePath => "filepath",
            PathSeedKind::RealUserPath => "realuserpath",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "90turn" => Some(PathSeedKind::Turn90),
            "randomturn" => Some(PathSeedKind::RandomTurn),
            "straightline" => Some(PathSeedKind::StraightLine),
            "sawtooth" => Some(PathSeedKind::Sawtooth),
            "circle" => Some(PathSeedKind::Circle),
            "figureeight" => Some(PathSeedKind::FigureEight),
            "filepath" => Some(PathSeedKind::FilePath),
            "realuserpath" => Some(PathSeedKind::RealUserPath),
            _ => None,
        }
    }
}

/// Built-in tracking space layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TrackingSpaceKind {
    #[default]
    Rectangle,
    Trapezoid,
    Triangle,
    Cross,
    LShape,
    TShape,
    Square,
    FilePath,
}

impl TrackingSpaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingSpaceKind::Rectangle => "rectangle",
            TrackingSpaceKind::Trapezoid => "trapezoid",
            TrackingSpaceKind::Triangle => "triangle",
            TrackingSpaceKind::Cross => "cross",
            TrackingSpaceKind::LShape => "l_shape",
            TrackingSpaceKind::TShape => "t_shape",
            TrackingSpaceKind::Square => "square",
            TrackingSpaceKind::FilePath => "filepath",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "rectangle" => Some(TrackingSpaceKind::Rectangle),
            "trapezoid" => Some(TrackingSpaceKind::Trapezoid),
            "triangle" => Some(TrackingSpaceKind::Triangle),
            "cross" => Some(TrackingSpaceKind::Cross),
            "l_shape" | "lshape" => Some(TrackingSpaceKind::LShape),
            "t_shape" | "tshape" => Some(TrackingSpaceKind::TShape),
            "square" => Some(TrackingSpaceKind::Square),
            "filepath" => Some(TrackingSpaceKind::FilePath),
            _ => None,
        }
    }
}

/// Where an avatar's virtual waypoints come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PathSource {
    /// Generated from a seed pattern with the trial RNG
    Seed(PathSeedKind),
    /// Explicit virtual waypoints, relative to the start position
    Waypoints(Vec<Vec2>),
    /// Recorded walk: waypoints replayed with per-waypoint time intervals
    RealUserPath {
        waypoints: Vec<Vec2>,
        sampling_intervals: Vec<f32>,
    },
}

impl Default for PathSource {
    fn default() -> Self {
        PathSource::Seed(PathSeedKind::default())
    }
}

/// One simulated user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvatarConfig {
    pub redirector: RedirectorKind,
    pub resetter: ResetterKind,
    pub path: PathSource,
    /// Start pose, identical in physical and virtual space
    pub initial_pose: Pose,
    /// Physical prop the passive-haptic strategy aligns the user with
    #[serde(default)]
    pub physical_target: Option<Pose>,
}

/// Everything needed to start one trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialSetup {
    pub tracking_space: TrackingSpace,
    pub avatars: Vec<AvatarConfig>,
    /// Occluders of the virtual world (visibility-polygon steering)
    #[serde(default)]
    pub virtual_obstacles: Vec<Polygon>,
    /// Seed for generated paths
    pub seed: u64,
}

impl TrialSetup {
    pub fn new(tracking_space: TrackingSpace, avatars: Vec<AvatarConfig>) -> Self {
        Self {
            tracking_space,
            avatars,
            virtual_obstacles: Vec::new(),
            seed: DEFAULT_SEED,
        }
    }

    /// Check geometry and per-avatar inputs
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tracking_space.validate()?;
        if self.avatars.is_empty() {
            return Err(ConfigError::NoAvatars);
        }
        for (id, avatar) in self.avatars.iter().enumerate() {
            if avatar.initial_pose.forward.length_squared() < 1e-12 {
                return Err(ConfigError::ZeroForward { avatar: id });
            }
            match &avatar.path {
                PathSource::Seed(PathSeedKind::FilePath) => {
                    return Err(ConfigError::MissingFile { what: "waypoints file" });
                }
                PathSource::Seed(PathSeedKind::RealUserPath) => {
                    return Err(ConfigError::MissingFile { what: "real user path" });
                }
                PathSource::Seed(_) => {}
                PathSource::Waypoints(waypoints) => {
                    if waypoints.is_empty() {
                        return Err(ConfigError::EmptyWaypoints { avatar: id });
                    }
                }
                PathSource::RealUserPath {
                    waypoints,
                    sampling_intervals,
                } => {
                    if waypoints.is_empty() {
                        return Err(ConfigError::EmptyWaypoints { avatar: id });
                    }
                    if waypoints.len() != sampling_intervals.len() {
                        return Err(ConfigError::LengthMismatch {
                            waypoints: waypoints.len(),
                            intervals: sampling_intervals.len(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Global simulation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Gain bounds ===
    pub max_trans_gain: f32,
    pub min_trans_gain: f32,
    pub max_rot_gain: f32,
    pub min_rot_gain: f32,
    /// Radius (m) of the tightest allowed curvature
    pub curvature_radius: f32,
    /// Distance (m) that triggers a reset
    pub reset_trigger_buffer: f32,

    // === Timing ===
    /// Fixed-step rate used for batch runs
    pub target_fps: f32,
    /// Statistics samples per second
    pub sampling_frequency: f32,

    // === Autopilot ===
    /// Walking speed (m/s)
    pub translation_speed: f32,
    /// Turning speed (deg/s), also the pace of reset turns
    pub rotation_speed: f32,
    /// Distance at which a waypoint counts as reached
    pub distance_to_waypoint_threshold: f32,

    // === Trial validity ===
    pub max_reset_count: u32,
    /// Seconds an autopilot avatar may stand still
    pub max_same_pos_time: f32,

    // === Paths ===
    /// Length (m) of generated paths
    pub path_length: f32,
    /// Rotate generated paths by a random angle
    pub path_random_rotation: bool,
    /// Loaded waypoint files include the start point first
    pub first_waypoint_is_start_point: bool,
    /// Rotate waypoints so the path leaves along the initial heading
    pub align_to_initial_forward: bool,
    /// Default seed for trials that do not set one
    pub seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_trans_gain: MAX_TRANS_GAIN,
            min_trans_gain: MIN_TRANS_GAIN,
            max_rot_gain: MAX_ROT_GAIN,
            min_rot_gain: MIN_ROT_GAIN,
            curvature_radius: CURVATURE_RADIUS,
            reset_trigger_buffer: RESET_TRIGGER_BUFFER,

            target_fps: TARGET_FPS,
            sampling_frequency: SAMPLING_FREQUENCY,

            translation_speed: TRANSLATION_SPEED,
            rotation_speed: ROTATION_SPEED,
            distance_to_waypoint_threshold: WAYPOINT_THRESHOLD,

            max_reset_count: MAX_RESET_COUNT,
            max_same_pos_time: MAX_SAME_POS_TIME,

            path_length: PATH_LENGTH,
            path_random_rotation: true,
            first_waypoint_is_start_point: false,
            align_to_initial_forward: true,
            seed: DEFAULT_SEED,
        }
    }
}

impl Settings {
    /// Fixed simulation step (seconds)
    pub fn dt(&self) -> f32 {
        1.0 / self.target_fps
    }

    /// Check every bound; called before a trial starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ranges = [
            ("translation gain", self.min_trans_gain, self.max_trans_gain),
            ("rotation gain", self.min_rot_gain, self.max_rot_gain),
        ];
        for (name, min, max) in ranges {
            if !min.is_finite() || !max.is_finite() || min > max {
                return Err(ConfigError::InvalidRange { name, min, max });
            }
        }
        // A translation gain of -1 or below reverses motion
        if self.min_trans_gain <= -1.0 {
            return Err(ConfigError::InvalidRange {
                name: "translation gain",
                min: self.min_trans_gain,
                max: self.max_trans_gain,
            });
        }

        let positives = [
            ("curvature_radius", self.curvature_radius),
            ("reset_trigger_buffer", self.reset_trigger_buffer),
            ("target_fps", self.target_fps),
            ("sampling_frequency", self.sampling_frequency),
            ("translation_speed", self.translation_speed),
            ("rotation_speed", self.rotation_speed),
            ("distance_to_waypoint_threshold", self.distance_to_waypoint_threshold),
            ("max_same_pos_time", self.max_same_pos_time),
            ("path_length", self.path_length),
        ];
        for (name, value) in positives {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load and validate settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_json()?).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }
}

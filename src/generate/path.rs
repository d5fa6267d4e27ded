//! Virtual path generators
//!
//! Seeded paths follow a walk-then-turn rule from the origin facing +y: walk
//! a sampled distance, turn by a sampled angle, repeat until the target
//! length is reached. The first waypoint is always the start point.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use crate::error::ConfigError;
use crate::rotate_vector;
use crate::settings::{PathSeedKind, Settings};

/// Waypoints per circle lap
pub const CIRCLE_WAYPOINTS: usize = 20;
const ZIG_LENGTH: f32 = 5.0;
const ZAG_ANGLE: f32 = 140.0;

/// How a sampled angle changes sign between legs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alternation {
    None,
    /// Negated with probability 1/2
    Random,
    /// Negated every other leg
    Constant,
}

/// Uniform distribution on [min, max]
#[derive(Debug, Clone, Copy)]
pub struct Uniform {
    pub min: f32,
    pub max: f32,
    pub alternation: Alternation,
}

impl Uniform {
    pub fn new(min: f32, max: f32) -> Self {
        Self {
            min,
            max,
            alternation: Alternation::None,
        }
    }

    pub fn alternating(mut self, alternation: Alternation) -> Self {
        self.alternation = alternation;
        self
    }

    fn sample(&self, rng: &mut Pcg32) -> f32 {
        let value = if self.max > self.min {
            rng.random_range(self.min..=self.max)
        } else {
            self.min
        };
        if self.alternation == Alternation::Random && rng.random::<f32>() < 0.5 {
            -value
        } else {
            value
        }
    }
}

/// Leg length and turn angle distributions of a walk-then-turn path
#[derive(Debug, Clone, Copy)]
pub struct PathSeed {
    pub distance: Uniform,
    pub angle: Uniform,
}

impl PathSeed {
    pub fn turn_90() -> Self {
        Self {
            distance: Uniform::new(2.0, 8.0),
            angle: Uniform::new(90.0, 90.0).alternating(Alternation::Random),
        }
    }

    pub fn random_turn() -> Self {
        Self {
            distance: Uniform::new(2.0, 8.0),
            angle: Uniform::new(-180.0, 180.0),
        }
    }

    pub fn straight_line() -> Self {
        Self {
            distance: Uniform::new(20.0, 20.0),
            angle: Uniform::new(0.0, 0.0),
        }
    }

    pub fn sawtooth() -> Self {
        Self {
            distance: Uniform::new(ZIG_LENGTH, ZIG_LENGTH),
            angle: Uniform::new(ZAG_ANGLE, ZAG_ANGLE).alternating(Alternation::Constant),
        }
    }
}

/// Walk-then-turn path of total length `target_dist`
pub fn generate_initial_path(seed: &PathSeed, target_dist: f32, rng: &mut Pcg32) -> Vec<Vec2> {
    let mut waypoints = vec![Vec2::ZERO];
    let mut position = Vec2::ZERO;
    let mut forward = Vec2::Y;
    let mut walked = 0.0;
    let mut alternator = 1.0;
    // Legs of zero length would never finish
    if target_dist <= 0.0 || seed.distance.max <= 0.0 {
        return waypoints;
    }
    loop {
        let mut distance = seed.distance.sample(rng);
        let finished = distance + walked >= target_dist;
        if finished {
            distance = target_dist - walked;
        }
        let mut rotation = seed.angle.sample(rng);
        if seed.angle.alternation == Alternation::Constant {
            rotation *= alternator;
        }
        position += forward * distance;
        forward = rotate_vector(forward, rotation).normalize();
        waypoints.push(position);
        walked += distance;
        alternator = -alternator;
        if finished {
            return waypoints;
        }
    }
}

/// Clockwise circle through the origin, or a figure eight made of two circles
pub fn generate_circle_path(radius: f32, waypoint_count: usize, figure_eight: bool) -> Vec<Vec2> {
    let mut waypoints = vec![Vec2::ZERO];
    if waypoint_count == 0 {
        return waypoints;
    }
    let step = 360.0 / waypoint_count as f32;
    let mut centre = Vec2::new(radius, 0.0);
    let mut start = -centre;
    for i in 0..waypoint_count {
        waypoints.push(centre + rotate_vector(start, -step * (i + 1) as f32));
    }
    if figure_eight {
        centre = -centre;
        start = -start;
        for i in 0..waypoint_count {
            waypoints.push(centre + rotate_vector(start, step * (i + 1) as f32));
        }
    }
    waypoints
}

/// Rotate every waypoint clockwise around the origin
pub fn rotate_waypoints(waypoints: &[Vec2], degrees: f32) -> Vec<Vec2> {
    waypoints.iter().map(|p| rotate_vector(*p, degrees)).collect()
}

/// Waypoints for a built-in path pattern
pub fn generate_path(kind: PathSeedKind, settings: &Settings, rng: &mut Pcg32) -> Result<Vec<Vec2>, ConfigError> {
    let length = settings.path_length;
    let circle_radius = length / 2.0 / std::f32::consts::PI;
    let waypoints = match kind {
        PathSeedKind::Turn90 => generate_initial_path(&PathSeed::turn_90(), length, rng),
        PathSeedKind::RandomTurn => generate_initial_path(&PathSeed::random_turn(), length, rng),
        PathSeedKind::StraightLine => generate_initial_path(&PathSeed::straight_line(), length, rng),
        PathSeedKind::Sawtooth => generate_initial_path(&PathSeed::sawtooth(), length, rng),
        PathSeedKind::Circle => generate_circle_path(circle_radius, CIRCLE_WAYPOINTS, false),
        PathSeedKind::FigureEight => generate_circle_path(circle_radius / 2.0, CIRCLE_WAYPOINTS, true),
        PathSeedKind::FilePath => return Err(ConfigError::MissingFile { what: "waypoints file" }),
        PathSeedKind::RealUserPath => return Err(ConfigError::MissingFile { what: "real user path" }),
    };
    if settings.path_random_rotation {
        let angle = rng.random_range(0.0..360.0);
        Ok(rotate_waypoints(&waypoints, angle))
    } else {
        Ok(waypoints)
    }
}

/// Length of the polyline through `waypoints`
pub fn path_length(waypoints: &[Vec2]) -> f32 {
    waypoints.windows(2).map(|w| (w[1] - w[0]).length()).sum()
}

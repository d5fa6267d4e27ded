//! Built-in tracking space layouts
//!
//! Every layout is centred on the origin and scaled so its walkable area is
//! [`TARGET_AREA`]. Each comes with default start poses for its avatars;
//! avatar `i` uses pose `i % len`.

use glam::Vec2;

use crate::consts::TARGET_AREA;
use crate::error::ConfigError;
use crate::geometry::{Polygon, Pose};
use crate::rotate_vector;
use crate::settings::TrackingSpaceKind;
use crate::sim::state::TrackingSpace;

/// Circumradius of `regular_polygon` when none is given
pub const DEFAULT_POLYGON_RADIUS: f32 = 5.0;
/// Start poses keep this far from the walls
const DIST_TO_WALL: f32 = 2.0;

/// A generated tracking space with its default start poses
#[derive(Debug, Clone)]
pub struct GeneratedSpace {
    pub space: TrackingSpace,
    pub initial_poses: Vec<Pose>,
}

impl GeneratedSpace {
    fn new(boundary: Polygon, obstacles: Vec<Polygon>, initial_poses: Vec<Pose>) -> Self {
        Self {
            space: TrackingSpace::new(boundary, obstacles),
            initial_poses,
        }
    }

    /// Start pose of avatar `id`, cycling through the defaults
    pub fn initial_pose(&self, id: usize) -> Pose {
        if self.initial_poses.is_empty() {
            Pose::default()
        } else {
            self.initial_poses[id % self.initial_poses.len()]
        }
    }
}

/// Axis-aligned square of side `2 * half` around `center`
fn square(center: Vec2, half: f32) -> Polygon {
    vec![
        Vec2::new(center.x + half, center.y + half),
        Vec2::new(center.x - half, center.y + half),
        Vec2::new(center.x - half, center.y - half),
        Vec2::new(center.x + half, center.y - half),
    ]
}

/// Pose at `p` facing the origin
fn facing_origin(p: Vec2) -> Pose {
    Pose::new(p, -p)
}

/// Regular polygon with `sides` vertices on a circle of `radius`, counter-clockwise
pub fn regular_polygon(sides: usize, radius: f32) -> Polygon {
    if sides == 0 {
        return Vec::new();
    }
    let step = 360.0 / sides as f32;
    let start = if sides % 2 == 1 {
        Vec2::new(0.0, radius)
    } else {
        let half = (step / 2.0).to_radians();
        Vec2::new(radius * half.sin(), radius * half.cos())
    };
    (0..sides).map(|i| rotate_vector(start, -step * i as f32)).collect()
}

pub fn rectangle(obstacle_type: u8, width: f32, height: f32) -> GeneratedSpace {
    let (w, h) = (width / 2.0, height / 2.0);
    let boundary = TrackingSpace::rectangle(width, height).boundary;
    let mut initial_poses = Vec::new();
    for x in [-w + DIST_TO_WALL, w - DIST_TO_WALL] {
        for y in [-h + DIST_TO_WALL, h - DIST_TO_WALL] {
            initial_poses.push(facing_origin(Vec2::new(x, y)));
        }
    }

    let obstacles = match obstacle_type {
        1 => vec![square(Vec2::ZERO, 3.0)],
        2 => {
            initial_poses = [
                Vec2::new(0.0, h - DIST_TO_WALL),
                Vec2::new(0.0, -h + DIST_TO_WALL),
                Vec2::new(-w + DIST_TO_WALL, 0.0),
                Vec2::new(w - DIST_TO_WALL, 0.0),
            ]
            .into_iter()
            .map(facing_origin)
            .collect();
            [(1.0, 1.0), (-1.0, 1.0), (-1.0, -1.0), (1.0, -1.0)]
                .into_iter()
                .map(|(sx, sy)| square(Vec2::new(4.0 * sx, 4.0 * sy), 1.0))
                .collect()
        }
        _ => Vec::new(),
    };
    GeneratedSpace::new(boundary, obstacles, initial_poses)
}

/// Equilateral triangle inscribed in a circle of `radius`
pub fn triangle(obstacle_type: u8, radius: f32) -> GeneratedSpace {
    let boundary = regular_polygon(3, radius);
    let three_ways = |points: &[Vec2]| -> Vec<Pose> {
        points
            .iter()
            .flat_map(|p| (0..3).map(move |i| facing_origin(rotate_vector(*p, 120.0 * i as f32))))
            .collect()
    };
    let mut initial_poses = three_ways(&[Vec2::new(0.0, radius - 5.0), Vec2::new(0.0, radius - 8.0)]);

    let sqrt3 = 3f32.sqrt();
    let obstacles = match obstacle_type {
        1 => vec![vec![
            Vec2::new(3.0, sqrt3),
            Vec2::new(-3.0, sqrt3),
            Vec2::new(0.0, -2.0 * sqrt3),
        ]],
        2 => {
            // Rows of small pillars on a triangular lattice
            let seg = radius * sqrt3 / 6.0;
            let mut h = seg * sqrt3;
            let mut pillars = Vec::new();
            for i in 0..4 {
                let mut center = Vec2::new(-(i as f32) * seg / 2.0, h);
                for _ in 0..=i {
                    pillars.push(square(center, 0.25));
                    center.x += seg;
                }
                h -= seg * sqrt3 / 2.0;
            }
            initial_poses = three_ways(&[
                Vec2::new(0.0, h / 2.0),
                Vec2::new(-seg, h / 2.0),
                Vec2::new(seg, h / 2.0),
            ]);
            pillars
        }
        _ => Vec::new(),
    };
    GeneratedSpace::new(boundary, obstacles, initial_poses)
}

/// Trapezoid with parallel sides `w1` (left) and `w2` (right), `height` apart
pub fn trapezoid(obstacle_type: u8, w1: f32, w2: f32, height: f32) -> GeneratedSpace {
    let top = (w1 + w2) / 4.0;
    let left = -height / 2.0;
    let right = height / 2.0;
    let boundary = vec![
        Vec2::new(left, top),
        Vec2::new(left, top - w1),
        Vec2::new(right, top - w2),
        Vec2::new(right, top),
    ];
    let mut initial_poses = vec![
        Pose::new(Vec2::new(left + 2.0, 5.0), Vec2::X),
        Pose::new(Vec2::new(left + 2.0, -5.0), Vec2::X),
        Pose::new(Vec2::new(right - 2.0, 7.0), Vec2::NEG_Y),
        Pose::new(Vec2::new(right - 2.0, -2.0), Vec2::Y),
    ];

    let obstacles = match obstacle_type {
        1 => vec![vec![
            Vec2::new(left, 1.0),
            Vec2::new(left, -2.0),
            Vec2::new(left + 10.0, -2.0),
            Vec2::new(left + 10.0, 1.0),
        ]],
        2 => {
            initial_poses = vec![
                Pose::new(Vec2::new(left + 2.0, 0.0), Vec2::X),
                Pose::new(Vec2::new(right - 2.0, -1.0), Vec2::NEG_X),
                Pose::new(Vec2::new(left + 2.0, -6.0), Vec2::NEG_X),
                Pose::new(Vec2::new(left + 2.0, -3.0), Vec2::X),
            ];
            let quarter = (w1 + w2) / 8.0;
            vec![
                square(Vec2::new(0.0, -2.0), 1.0),
                square(Vec2::new(-height / 4.0, quarter), 2.0),
                square(Vec2::new(height / 4.0, quarter), 2.0),
            ]
        }
        _ => Vec::new(),
    };
    GeneratedSpace::new(boundary, obstacles, initial_poses)
}

/// Plus-shaped space: a `w` square centre with four arms of length `h`
pub fn cross(obstacle_type: u8, w: f32, h: f32) -> GeneratedSpace {
    let arm = [
        Vec2::new(w / 2.0, w / 2.0),
        Vec2::new(w / 2.0, h + w / 2.0),
        Vec2::new(-w / 2.0, h + w / 2.0),
    ];
    let boundary: Polygon = (0..4)
        .flat_map(|i| arm.iter().map(move |p| rotate_vector(*p, -90.0 * i as f32)))
        .collect();
    let reach = w / 2.0 + h;
    let mut initial_poses: Vec<Pose> = (0..4)
        .map(|i| facing_origin(rotate_vector(Vec2::new(0.0, reach - 2.0), 90.0 * i as f32)))
        .collect();

    let obstacles = match obstacle_type {
        1 => {
            // A thin wall along the vertical arms; start in the horizontal ones
            initial_poses = vec![
                Pose::new(Vec2::new(reach - 2.0, 0.0), Vec2::NEG_X),
                Pose::new(Vec2::new(reach - 5.0, 0.0), Vec2::NEG_X),
                Pose::new(Vec2::new(-reach + 2.0, 0.0), Vec2::X),
                Pose::new(Vec2::new(-reach + 5.0, 0.0), Vec2::X),
            ];
            let half = 0.25;
            let end = reach - 4.0;
            vec![vec![
                Vec2::new(-half, end),
                Vec2::new(-half, -end),
                Vec2::new(half, -end),
                Vec2::new(half, end),
            ]]
        }
        2 => {
            let half = 0.75;
            let corners = [
                Vec2::new(w / 2.0 - half, w / 2.0 + half),
                Vec2::new(-w / 2.0 + half, w / 2.0 + half),
            ];
            (0..4)
                .flat_map(|i| {
                    corners
                        .iter()
                        .map(move |p| square(rotate_vector(*p, 90.0 * i as f32), half))
                })
                .collect()
        }
        _ => Vec::new(),
    };
    GeneratedSpace::new(boundary, obstacles, initial_poses)
}

/// L-shaped space: a `w1` square with arms of length `w2` going up and right
pub fn l_shape(obstacle_type: u8, w1: f32, w2: f32) -> GeneratedSpace {
    let (a, b) = (w1 / 2.0, w1 / 2.0 + w2);
    let boundary = vec![
        Vec2::new(a, a),
        Vec2::new(a, b),
        Vec2::new(-a, b),
        Vec2::new(-a, -a),
        Vec2::new(b, -a),
        Vec2::new(b, a),
    ];
    let (half, dist) = (1.0, DIST_TO_WALL);
    let initial_poses = vec![
        Pose::new(Vec2::new(b - dist, half + dist), Vec2::NEG_X),
        Pose::new(Vec2::new(b - dist, -half - dist), Vec2::NEG_X),
        Pose::new(Vec2::new(-half - dist, b - dist), Vec2::NEG_Y),
        Pose::new(Vec2::new(half + dist, b - dist), Vec2::NEG_Y),
    ];
    let obstacles = match obstacle_type {
        1 => vec![square(Vec2::ZERO, 2.0)],
        2 => vec![
            vec![
                Vec2::new(half, a + 1.0),
                Vec2::new(half, b - 3.0),
                Vec2::new(-half, b - 3.0),
                Vec2::new(-half, a + 1.0),
            ],
            vec![
                Vec2::new(a + 1.0, half),
                Vec2::new(a + 1.0, -half),
                Vec2::new(b - 3.0, -half),
                Vec2::new(b - 3.0, half),
            ],
        ],
        _ => Vec::new(),
    };
    GeneratedSpace::new(boundary, obstacles, initial_poses)
}

/// T-shaped space: a `w1` square with side arms `w2` and a stem `w3` going down
pub fn t_shape(obstacle_type: u8, w1: f32, w2: f32, w3: f32) -> GeneratedSpace {
    let a = w1 / 2.0;
    let boundary = vec![
        Vec2::new(a + w2, a),
        Vec2::new(-a - w2, a),
        Vec2::new(-a - w2, -a),
        Vec2::new(-a, -a),
        Vec2::new(-a, -a - w3),
        Vec2::new(a, -a - w3),
        Vec2::new(a, -a),
        Vec2::new(a + w2, -a),
    ];
    let t_poses = |side: f32, stem_near: f32, stem_far: f32| {
        vec![
            Pose::new(Vec2::new(a + w2 - side, 0.0), Vec2::NEG_X),
            Pose::new(Vec2::new(-a - w2 + side, 0.0), Vec2::X),
            Pose::new(Vec2::new(0.0, -a - w3 + stem_near), Vec2::Y),
            Pose::new(Vec2::new(0.0, -a - w3 + stem_far), Vec2::Y),
        ]
    };
    let mut initial_poses = t_poses(3.0, 3.0, 6.0);
    let obstacles = match obstacle_type {
        1 => vec![square(Vec2::ZERO, 2.0)],
        2 => {
            initial_poses = t_poses(8.0, 7.0, 10.0);
            [
                Vec2::new(0.0, -a - w3 + 4.0),
                Vec2::new(-a - w2 + 4.0, 0.0),
                Vec2::new(a + w2 - 4.0, 0.0),
            ]
            .into_iter()
            .map(|p| square(p, 1.0))
            .collect()
        }
        _ => Vec::new(),
    };
    GeneratedSpace::new(boundary, obstacles, initial_poses)
}

/// Built-in layout scaled to the standard area
///
/// Unknown obstacle types fall back to an empty room. The square ignores the
/// obstacle type and uses `square_width` as its side.
pub fn generate_tracking_space(
    kind: TrackingSpaceKind,
    obstacle_type: u8,
    square_width: f32,
) -> Result<GeneratedSpace, ConfigError> {
    let generated = match kind {
        TrackingSpaceKind::Rectangle => {
            let side = TARGET_AREA.sqrt();
            rectangle(obstacle_type, side, side)
        }
        TrackingSpaceKind::Square => {
            if !(square_width.is_finite() && square_width > 0.0) {
                return Err(ConfigError::NonPositive {
                    name: "square_width",
                    value: square_width,
                });
            }
            rectangle(0, square_width, square_width)
        }
        TrackingSpaceKind::Triangle => {
            let radius = (4.0 * TARGET_AREA / (3.0 * 3f32.sqrt())).sqrt();
            triangle(obstacle_type, radius)
        }
        TrackingSpaceKind::Trapezoid => {
            let w2 = (TARGET_AREA / 3.0).sqrt();
            let w1 = 2.0 * w2;
            trapezoid(obstacle_type, w1, w2, w1)
        }
        TrackingSpaceKind::Cross => {
            let k = 2.0;
            let w = (TARGET_AREA / (4.0 * k + 1.0)).sqrt();
            cross(obstacle_type, w, k * w)
        }
        TrackingSpaceKind::LShape => {
            let w1 = (TARGET_AREA / 3.0).sqrt();
            l_shape(obstacle_type, w1, w1)
        }
        TrackingSpaceKind::TShape => {
            let (k, c) = (0.75, 1.5);
            let w1 = (TARGET_AREA / (1.0 + 2.0 * k + c)).sqrt();
            t_shape(obstacle_type, w1, k * w1, c * w1)
        }
        TrackingSpaceKind::FilePath => {
            return Err(ConfigError::MissingFile {
                what: "tracking space file",
            });
        }
    };
    log::debug!(
        "Generated {} tracking space with {} obstacles",
        kind.as_str(),
        generated.space.obstacles.len()
    );
    Ok(generated)
}

/// Signed area, positive for counter-clockwise polygons
pub fn polygon_area(polygon: &[Vec2]) -> f32 {
    let n = polygon.len();
    (0..n)
        .map(|i| {
            let (p, q) = (polygon[i], polygon[(i + 1) % n]);
            p.x * q.y - q.x * p.y
        })
        .sum::<f32>()
        / 2.0
}

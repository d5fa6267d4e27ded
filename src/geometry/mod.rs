//! 2D geometry kernel
//!
//! Pure functions over `glam::Vec2`. Degenerate inputs (zero-length edges,
//! parallel lines, empty polygons) never panic: they are skipped or reported
//! through `Option`.

pub mod buffer;
pub mod visibility;

pub use buffer::buffer_polygon;
pub use visibility::{convert_to_segments, visibility_polygon, visible_region};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{cross, rotate_vector, signed_angle};

/// Ordered list of points, counter-clockwise
pub type Polygon = Vec<Vec2>;

/// Position and unit heading on the floor plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec2,
    pub forward: Vec2,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            forward: Vec2::Y,
        }
    }
}

impl Pose {
    pub fn new(position: Vec2, forward: Vec2) -> Self {
        Self {
            position,
            forward: forward.normalize_or_zero(),
        }
    }

    /// Clockwise angle of `forward` from +y
    pub fn heading(&self) -> f32 {
        signed_angle(Vec2::Y, self.forward)
    }

    /// Map a point expressed in this pose's local frame into the parent frame
    pub fn transform_point(&self, local: Vec2) -> Vec2 {
        self.position + rotate_vector(local, self.heading())
    }

    pub fn transform_direction(&self, local: Vec2) -> Vec2 {
        rotate_vector(local, self.heading())
    }

    /// Map a parent-frame point into this pose's local frame
    pub fn inverse_transform_point(&self, point: Vec2) -> Vec2 {
        rotate_vector(point - self.position, -self.heading())
    }

    pub fn inverse_transform_direction(&self, dir: Vec2) -> Vec2 {
        rotate_vector(dir, -self.heading())
    }

    /// Express `other` (given in the parent frame) in this pose's frame
    pub fn inverse_transform_pose(&self, other: Pose) -> Pose {
        Pose::new(
            self.inverse_transform_point(other.position),
            self.inverse_transform_direction(other.forward),
        )
    }
}

/// Rotate a pose clockwise by `degrees` around `pivot`
pub fn rotate_pose_around(pose: Pose, pivot: Vec2, degrees: f32) -> Pose {
    Pose {
        position: pivot + rotate_vector(pose.position - pivot, degrees),
        forward: rotate_vector(pose.forward, degrees).normalize_or_zero(),
    }
}

/// Nearest point to `point` on the closed polygon outline
///
/// For each edge the perpendicular foot is used when it falls strictly inside
/// the edge, otherwise the nearer endpoint. A single point is a valid polygon.
pub fn nearest_point_on_polygon(point: Vec2, polygon: &[Vec2]) -> Option<Vec2> {
    let mut best: Option<(Vec2, f32)> = None;
    let mut consider = |candidate: Vec2| {
        let dist = candidate.distance(point);
        if best.is_none_or(|(_, d)| dist < d) {
            best = Some((candidate, dist));
        }
    };

    for i in 0..polygon.len() {
        let p = polygon[i];
        let q = polygon[(i + 1) % polygon.len()];
        if (q - p).dot(point - p) > 0.0 && (p - q).dot(point - q) > 0.0 {
            let edge = (q - p).normalize_or_zero();
            consider(p + edge * (point - p).dot(edge));
        } else {
            consider(p);
            consider(q);
        }
    }
    best.map(|(p, _)| p)
}

/// Distance from `point` to the nearest point of the boundary or any obstacle
///
/// Infinite when there is no geometry at all.
pub fn nearest_distance_to_obstacles_and_boundary(
    point: Vec2,
    boundary: &[Vec2],
    obstacles: &[Polygon],
) -> f32 {
    std::iter::once(boundary)
        .chain(obstacles.iter().map(Vec::as_slice))
        .filter_map(|polygon| nearest_point_on_polygon(point, polygon))
        .map(|nearest| nearest.distance(point))
        .fold(f32::INFINITY, f32::min)
}

const PIP_EPS: f32 = 1e-5;
/// Pre-rotation that keeps axis-aligned edges off the horizontal test ray
const PIP_ROTATION: f32 = 321.543;

#[inline]
fn dcmp(x: f32) -> i32 {
    if x.abs() < PIP_EPS {
        0
    } else if x < 0.0 {
        -1
    } else {
        1
    }
}

fn on_segment(p: Vec2, a: Vec2, b: Vec2) -> bool {
    dcmp(cross(a - p, b - p)) == 0 && dcmp((a - p).dot(b - p)) <= 0
}

/// Crossing-count point-in-polygon test, boundary inclusive
pub fn point_in_polygon(point: Vec2, polygon: &[Vec2]) -> bool {
    let p = rotate_vector(point, PIP_ROTATION);
    let mut crossings = 0;
    for i in 0..polygon.len() {
        let a = rotate_vector(polygon[i], PIP_ROTATION);
        let b = rotate_vector(polygon[(i + 1) % polygon.len()], PIP_ROTATION);
        if on_segment(p, a, b) {
            return true;
        }
        let k = dcmp(cross(b - a, p - a));
        let d1 = dcmp(a.y - p.y);
        let d2 = dcmp(b.y - p.y);
        if k > 0 && d1 <= 0 && d2 > 0 {
            crossings += 1;
        }
        if k < 0 && d2 <= 0 && d1 > 0 {
            crossings -= 1;
        }
    }
    crossings % 2 != 0
}

/// Intersection of the lines `p + t*v` and `q + s*w`, or `None` when parallel
pub fn line_line_intersection(p: Vec2, v: Vec2, q: Vec2, w: Vec2) -> Option<Vec2> {
    let denom = cross(v, w);
    if denom.abs() < 1e-9 {
        return None;
    }
    let t = cross(w, p - q) / denom;
    Some(p + v * t)
}

/// Axis-aligned bounds as (min, max)
pub fn bounding_box(points: &[Vec2]) -> Option<(Vec2, Vec2)> {
    let first = *points.first()?;
    Some(
        points
            .iter()
            .fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p))),
    )
}

/// Outline edges (p, q) of a closed polygon, skipping zero-length ones
pub fn edges(polygon: &[Vec2]) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
    (0..polygon.len())
        .map(move |i| (polygon[i], polygon[(i + 1) % polygon.len()]))
        .filter(|(p, q)| p != q)
}

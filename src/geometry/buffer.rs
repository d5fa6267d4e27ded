//! Buffer zones around polygons
//!
//! Offsets every edge by a fixed width and joins neighbouring offsets either
//! at their intersection or, where they diverge, with an arc fan.

use glam::Vec2;

use super::line_line_intersection;
use crate::{rotate_vector, signed_angle};

/// Angular step (degrees) used when sampling arcs
pub const ARC_SAMPLE_DEGREES: f32 = 1.0;

/// Offset outline of `polygon` at distance `width`
///
/// `inward` offsets toward the interior of a counter-clockwise polygon.
/// A single point yields a sampled circle; an empty input yields nothing.
pub fn buffer_polygon(polygon: &[Vec2], width: f32, inward: bool) -> Vec<Vec2> {
    let mut points: Vec<Vec2> = Vec::with_capacity(polygon.len());
    for p in polygon {
        if points.last() != Some(p) {
            points.push(*p);
        }
    }
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }

    match points.len() {
        0 => Vec::new(),
        1 => circle(points[0], width),
        _ => offset_outline(&points, width, inward),
    }
}

fn circle(center: Vec2, radius: f32) -> Vec<Vec2> {
    let start = Vec2::Y * radius;
    let steps = (360.0 / ARC_SAMPLE_DEGREES) as usize;
    (0..steps)
        .map(|i| center + rotate_vector(start, ARC_SAMPLE_DEGREES * i as f32))
        .collect()
}

fn offset_outline(points: &[Vec2], width: f32, inward: bool) -> Vec<Vec2> {
    let n = points.len();
    // Offset side: clockwise of each edge direction when outward
    let side = if inward { -1.0 } else { 1.0 };
    let mut out = Vec::with_capacity(n * 2);

    for i in 0..n {
        let a = points[(i + n - 1) % n];
        let b = points[i];
        let c = points[(i + 1) % n];
        let bv1 = rotate_vector((b - a).normalize_or_zero() * width, side * 90.0);
        let bv2 = rotate_vector((c - b).normalize_or_zero() * width, side * 90.0);
        let turn = signed_angle(bv1, bv2);

        if turn.abs() < 1e-4 {
            out.push(b + bv1);
        } else if turn * side < 0.0 {
            // Offsets diverge: fill the gap with an arc
            let steps = (turn.abs() / ARC_SAMPLE_DEGREES) as usize;
            for j in 0..=steps {
                out.push(b + rotate_vector(bv1, turn.signum() * ARC_SAMPLE_DEGREES * j as f32));
            }
            out.push(b + bv2);
        } else {
            let corner = line_line_intersection(a + bv1, b - a, b + bv2, c - b).unwrap_or(b + bv1);
            out.push(corner);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{nearest_point_on_polygon, point_in_polygon};

    fn square(half: f32) -> Vec<Vec2> {
        vec![
            Vec2::new(half, half),
            Vec2::new(-half, half),
            Vec2::new(-half, -half),
            Vec2::new(half, -half),
        ]
    }

    #[test]
    fn test_inward_buffer_of_square_is_smaller_square() {
        let inner = buffer_polygon(&square(2.0), 0.5, true);
        assert_eq!(inner.len(), 4);
        for p in &inner {
            assert!((p.x.abs() - 1.5).abs() < 0.001);
            assert!((p.y.abs() - 1.5).abs() < 0.001);
        }
    }

    #[test]
    fn test_outward_buffer_keeps_width() {
        let outer = buffer_polygon(&square(1.0), 0.5, false);
        // Rounded corners add arc samples
        assert!(outer.len() > 4);
        for p in &outer {
            assert!(!point_in_polygon(*p, &square(1.0)));
            let near = nearest_point_on_polygon(*p, &square(1.0)).unwrap();
            assert!((near.distance(*p) - 0.5).abs() < 0.001);
        }
    }

    #[test]
    fn test_single_point_is_circle() {
        let ring = buffer_polygon(&[Vec2::new(1.0, 1.0)], 0.3, false);
        assert_eq!(ring.len(), 360);
        for p in &ring {
            assert!((p.distance(Vec2::new(1.0, 1.0)) - 0.3).abs() < 0.0001);
        }
    }

    #[test]
    fn test_duplicate_vertices_are_ignored() {
        let mut poly = square(2.0);
        poly.insert(1, poly[0]);
        poly.push(poly[0]);
        assert_eq!(buffer_polygon(&poly, 0.5, true).len(), 4);
        assert!(buffer_polygon(&[], 0.5, true).is_empty());
    }
}

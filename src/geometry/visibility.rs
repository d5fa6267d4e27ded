//! Visibility polygon by radial sweep
//!
//! The scene is closed with a bounding box one unit beyond every input point.
//! Segment endpoints are swept in angular order around the observer while a
//! binary heap keeps the nearest segment along the current ray on top.
//! Computation runs in f64; zero-length segments never enter the heap.

use glam::{DVec2, Vec2};

/// Line segment between two points
pub type Segment = [DVec2; 2];

const EPSILON: f64 = 0.0000001;

/// Closed polygons to the segment list of their outlines
pub fn convert_to_segments(polygons: &[Vec<Vec2>]) -> Vec<Segment> {
    let mut segments = Vec::new();
    for polygon in polygons {
        for j in 0..polygon.len() {
            let k = (j + 1) % polygon.len();
            segments.push([polygon[j].as_dvec2(), polygon[k].as_dvec2()]);
        }
    }
    segments
}

/// Visible region from `observer` given occluding polygon outlines (f32 convenience)
pub fn visible_region(observer: Vec2, polygons: &[Vec<Vec2>]) -> Vec<Vec2> {
    visibility_polygon(observer.as_dvec2(), &convert_to_segments(polygons))
        .into_iter()
        .map(|p| p.as_vec2())
        .collect()
}

/// Boundary of the region visible from `observer`, counter-clockwise
pub fn visibility_polygon(observer: DVec2, segments: &[Segment]) -> Vec<DVec2> {
    let mut bounded: Vec<Segment> = segments.to_vec();
    let (mut lo, mut hi) = (observer, observer);
    for seg in segments {
        for p in seg {
            lo = lo.min(*p);
            hi = hi.max(*p);
        }
    }
    lo -= DVec2::ONE;
    hi += DVec2::ONE;
    bounded.push([DVec2::new(lo.x, lo.y), DVec2::new(hi.x, lo.y)]);
    bounded.push([DVec2::new(hi.x, lo.y), DVec2::new(hi.x, hi.y)]);
    bounded.push([DVec2::new(hi.x, hi.y), DVec2::new(lo.x, hi.y)]);
    bounded.push([DVec2::new(lo.x, hi.y), DVec2::new(lo.x, lo.y)]);

    let sorted = sort_points(observer, &bounded);
    let mut sweep = Sweep {
        segments: &bounded,
        position: observer,
        heap: Vec::new(),
        map: vec![None; bounded.len()],
    };

    let start = observer + DVec2::X;
    for i in 0..bounded.len() {
        let a1 = angle(bounded[i][0], observer);
        let a2 = angle(bounded[i][1], observer);
        let active = (a1 > -180.0 && a1 <= 0.0 && a2 <= 180.0 && a2 >= 0.0 && a2 - a1 > 180.0)
            || (a2 > -180.0 && a2 <= 0.0 && a1 <= 180.0 && a1 >= 0.0 && a1 - a2 > 180.0);
        if active {
            sweep.insert(i, start);
        }
    }

    let mut output = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        let mut extend = false;
        let mut shorten = false;
        let orig = i;
        let mut vertex = bounded[sorted[i].segment][sorted[i].point];
        let old_segment = sweep.heap.first().copied();
        loop {
            let sp = sorted[i];
            if let Some(heap_index) = sweep.map[sp.segment] {
                if Some(sp.segment) == old_segment {
                    extend = true;
                    vertex = bounded[sp.segment][sp.point];
                }
                sweep.remove(heap_index, vertex);
            } else {
                sweep.insert(sp.segment, vertex);
                if sweep.heap.first().copied() != old_segment {
                    shorten = true;
                }
            }
            i += 1;
            if i >= sorted.len() || sorted[i].angle >= sorted[orig].angle + EPSILON {
                break;
            }
        }

        let top = sweep.heap.first().copied();
        if extend {
            output.push(vertex);
            if let Some(top) = top {
                let seg = bounded[top];
                if let Some(cur) = intersect_lines(seg[0], seg[1], observer, vertex) {
                    if !equal(cur, vertex) {
                        output.push(cur);
                    }
                }
            }
        } else if shorten {
            if let Some(old) = old_segment {
                let seg = bounded[old];
                if let Some(p) = intersect_lines(seg[0], seg[1], observer, vertex) {
                    output.push(p);
                }
            }
            if let Some(top) = top {
                let seg = bounded[top];
                if let Some(p) = intersect_lines(seg[0], seg[1], observer, vertex) {
                    output.push(p);
                }
            }
        }
    }
    output
}

#[derive(Debug, Clone, Copy)]
struct SegmentPoint {
    segment: usize,
    point: usize,
    angle: f64,
}

fn sort_points(position: DVec2, segments: &[Segment]) -> Vec<SegmentPoint> {
    let mut points: Vec<SegmentPoint> = segments
        .iter()
        .enumerate()
        .flat_map(|(i, seg)| {
            (0..2).map(move |j| SegmentPoint {
                segment: i,
                point: j,
                angle: angle(seg[j], position),
            })
        })
        .collect();
    points.sort_by(|a, b| a.angle.partial_cmp(&b.angle).unwrap_or(std::cmp::Ordering::Equal));
    points
}

/// Direction (degrees) of `b` as seen from `a`
#[inline]
fn angle(a: DVec2, b: DVec2) -> f64 {
    (b.y - a.y).atan2(b.x - a.x).to_degrees()
}

fn angle2(a: DVec2, b: DVec2, c: DVec2) -> f64 {
    let mut a3 = angle(a, b) - angle(b, c);
    if a3 < 0.0 {
        a3 += 360.0;
    }
    if a3 > 360.0 {
        a3 -= 360.0;
    }
    a3
}

/// Intersection of line a1-a2 with line b1-b2
fn intersect_lines(a1: DVec2, a2: DVec2, b1: DVec2, b2: DVec2) -> Option<DVec2> {
    let db = b2 - b1;
    let da = a2 - a1;
    let ub = db.y * da.x - db.x * da.y;
    if ub == 0.0 {
        return None;
    }
    let ua = (db.x * (a1.y - b1.y) - db.y * (a1.x - b1.x)) / ub;
    Some(a1 + da * ua)
}

#[inline]
fn equal(a: DVec2, b: DVec2) -> bool {
    (a.x - b.x).abs() < EPSILON && (a.y - b.y).abs() < EPSILON
}

#[inline]
fn parent(index: usize) -> usize {
    (index - 1) / 2
}

#[inline]
fn child(index: usize) -> usize {
    2 * index + 1
}

/// Heap of segment indices ordered by distance along the current ray
struct Sweep<'a> {
    segments: &'a [Segment],
    position: DVec2,
    heap: Vec<usize>,
    /// Segment index to heap slot
    map: Vec<Option<usize>>,
}

impl Sweep<'_> {
    fn less_than(&self, index1: usize, index2: usize, destination: DVec2) -> bool {
        let s1 = self.segments[index1];
        let s2 = self.segments[index2];
        let (Some(inter1), Some(inter2)) = (
            intersect_lines(s1[0], s1[1], self.position, destination),
            intersect_lines(s2[0], s2[1], self.position, destination),
        ) else {
            return false;
        };
        if !equal(inter1, inter2) {
            return inter1.distance_squared(self.position) < inter2.distance_squared(self.position);
        }
        let end1 = if equal(inter1, s1[0]) { 1 } else { 0 };
        let end2 = if equal(inter2, s2[0]) { 1 } else { 0 };
        let a1 = angle2(s1[end1], inter1, self.position);
        let a2 = angle2(s2[end2], inter2, self.position);
        if a1 < 180.0 {
            if a2 > 180.0 {
                return true;
            }
            return a2 < a1;
        }
        a1 < a2
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.map[self.heap[a]] = Some(b);
        self.map[self.heap[b]] = Some(a);
        self.heap.swap(a, b);
    }

    fn insert(&mut self, index: usize, destination: DVec2) {
        let seg = self.segments[index];
        if intersect_lines(seg[0], seg[1], self.position, destination).is_none() {
            return;
        }
        let mut cur = self.heap.len();
        self.heap.push(index);
        self.map[index] = Some(cur);
        while cur > 0 {
            let p = parent(cur);
            if !self.less_than(self.heap[cur], self.heap[p], destination) {
                break;
            }
            self.swap(cur, p);
            cur = p;
        }
    }

    fn remove(&mut self, index: usize, destination: DVec2) {
        self.map[self.heap[index]] = None;
        let Some(last) = self.heap.pop() else {
            return;
        };
        if index == self.heap.len() {
            return;
        }
        self.heap[index] = last;
        self.map[last] = Some(index);

        let mut cur = index;
        if cur != 0 && self.less_than(self.heap[cur], self.heap[parent(cur)], destination) {
            while cur > 0 {
                let p = parent(cur);
                if !self.less_than(self.heap[cur], self.heap[p], destination) {
                    break;
                }
                self.swap(cur, p);
                cur = p;
            }
        } else {
            loop {
                let left = child(cur);
                let right = left + 1;
                let len = self.heap.len();
                if left < len
                    && self.less_than(self.heap[left], self.heap[cur], destination)
                    && (right == len || self.less_than(self.heap[left], self.heap[right], destination))
                {
                    self.swap(left, cur);
                    cur = left;
                } else if right < len && self.less_than(self.heap[right], self.heap[cur], destination) {
                    self.swap(right, cur);
                    cur = right;
                } else {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_room() -> Vec<Vec<Vec2>> {
        vec![vec![
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, 1.0),
            Vec2::new(-1.0, -1.0),
            Vec2::new(1.0, -1.0),
        ]]
    }

    #[test]
    fn test_empty_room_returns_corners() {
        let poly = visible_region(Vec2::ZERO, &unit_room());
        let expected = [
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, 1.0),
            Vec2::new(-1.0, -1.0),
            Vec2::new(1.0, -1.0),
        ];
        assert_eq!(poly.len(), 4);
        for (p, e) in poly.iter().zip(expected.iter()) {
            assert!((*p - *e).length() < 0.0001, "{p:?} != {e:?}");
        }
    }

    #[test]
    fn test_observer_off_center_still_inside() {
        let observer = Vec2::new(0.3, -0.6);
        let poly = visible_region(observer, &unit_room());
        assert!(poly.len() >= 4);
        assert!(crate::geometry::point_in_polygon(observer, &poly));
    }

    #[test]
    fn test_occluder_hides_corner() {
        let mut polygons = unit_room();
        // Small box between the observer and the (1, 1) corner
        polygons.push(vec![
            Vec2::new(0.6, 0.4),
            Vec2::new(0.4, 0.4),
            Vec2::new(0.4, 0.6),
            Vec2::new(0.6, 0.6),
        ]);
        let poly = visible_region(Vec2::ZERO, &polygons);
        assert!(poly.iter().all(|p| (*p - Vec2::new(1.0, 1.0)).length() > 0.01));
        assert!(crate::geometry::point_in_polygon(Vec2::ZERO, &poly));
    }

    #[test]
    fn test_degenerate_segments_do_not_panic() {
        let segments = vec![
            [DVec2::new(0.5, 0.5), DVec2::new(0.5, 0.5)],
            [DVec2::new(-2.0, 1.0), DVec2::new(2.0, 1.0)],
            [DVec2::new(-2.0, 1.0), DVec2::new(2.0, 1.0)],
        ];
        let poly = visibility_polygon(DVec2::ZERO, &segments);
        assert!(!poly.is_empty());
    }

    #[test]
    fn test_no_segments_sees_bounding_box() {
        let poly = visibility_polygon(DVec2::ZERO, &[]);
        assert_eq!(poly.len(), 4);
        for p in &poly {
            assert!((p.x.abs() - 1.0).abs() < 1e-9 && (p.y.abs() - 1.0).abs() < 1e-9);
        }
    }
}

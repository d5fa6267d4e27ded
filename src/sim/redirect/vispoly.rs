//! Visibility-polygon steering
//!
//! The visible regions around the user in both worlds are cut into triangular
//! slices (observer plus one polygon edge). The virtual slice the user faces
//! is matched with the physical slice of the most similar relative area, and
//! the user is steered into it.

use glam::Vec2;

use super::{RedirectContext, Redirector, steer_by_negative_gradient};
use crate::geometry::{Polygon, visible_region};
use crate::settings::RedirectorKind;
use crate::{angle_between, cross};

#[derive(Debug, Default)]
pub struct VisPolyRedirector {
    total_force: Option<Vec2>,
}

/// Area-weighted bisector of every slice, normalized by the total area
pub fn slice_bisectors(polygon: &[Vec2], observer: Vec2) -> Vec<Vec2> {
    let n = polygon.len();
    let mut total = 0.0;
    let mut bisectors: Vec<Vec2> = (0..n)
        .map(|i| {
            let a = polygon[i] - observer;
            let b = polygon[(i + 1) % n] - observer;
            let area = cross(a, b).abs();
            total += area;
            (a.normalize_or_zero() + b.normalize_or_zero()).normalize_or_zero() * area
        })
        .collect();
    if total > 0.0 {
        for bisector in &mut bisectors {
            *bisector /= total;
        }
    }
    bisectors
}

/// Index of the slice whose bisector is closest to `dir`
fn active_slice(bisectors: &[Vec2], dir: Vec2) -> usize {
    let mut index = 0;
    let mut min_angle = 180.0;
    for (i, bisector) in bisectors.iter().enumerate() {
        let angle = angle_between(*bisector, dir);
        if angle < min_angle {
            index = i;
            min_angle = angle;
        }
    }
    index
}

/// Physical slice whose relative area best matches `target`
fn most_similar_slice(target: f32, bisectors: &[Vec2]) -> Option<Vec2> {
    let mut best: Option<(Vec2, f32)> = None;
    for bisector in bisectors {
        let diff = (target - bisector.length()).abs();
        if best.is_none_or(|(_, d)| diff < d) {
            best = Some((*bisector, diff));
        }
    }
    best.map(|(b, _)| b)
}

impl Redirector for VisPolyRedirector {
    fn kind(&self) -> RedirectorKind {
        RedirectorKind::VisPoly
    }

    fn inject_redirection(&mut self, ctx: &mut RedirectContext<'_>) {
        let state = &*ctx.state;
        let mut physical: Vec<Polygon> = ctx.space.obstacles.clone();
        physical.push(ctx.space.boundary.clone());

        let phys_poly = visible_region(state.curr_pos_real, &physical);
        let virt_poly = visible_region(state.curr_pos, ctx.virtual_obstacles);
        if phys_poly.is_empty() || virt_poly.is_empty() {
            return;
        }
        let phys_sb = slice_bisectors(&phys_poly, state.curr_pos_real);
        let virt_sb = slice_bisectors(&virt_poly, state.curr_pos);

        let index = active_slice(&virt_sb, state.curr_dir);
        let Some(slice) = most_similar_slice(virt_sb[index].length(), &phys_sb) else {
            return;
        };
        let ng = slice.normalize_or_zero();
        self.total_force = Some(ng);
        steer_by_negative_gradient(ctx, ng);
    }

    fn total_force(&self) -> Option<Vec2> {
        self.total_force
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::walking_state;
    use super::*;
    use crate::settings::Settings;
    use crate::sim::state::{GainKind, TrackingSpace};

    #[test]
    fn test_slice_bisectors_sum_to_one() {
        let square = TrackingSpace::rectangle(10.0, 10.0).boundary;
        let sb = slice_bisectors(&square, Vec2::new(0.0, 4.0));
        let total: f32 = sb.iter().map(|b| b.length()).sum();
        assert!((total - 1.0).abs() < 1e-4);
        let largest = sb.iter().copied().fold(Vec2::ZERO, |a, b| if b.length() > a.length() { b } else { a });
        assert!((largest.length() - 0.45).abs() < 1e-4);
        assert!((largest.normalize() - Vec2::new(0.0, -1.0)).length() < 1e-4);
    }

    #[test]
    fn test_active_slice_faces_direction() {
        let sb = vec![Vec2::new(0.1, 0.0), Vec2::new(0.0, 0.3), Vec2::new(-0.2, 0.0)];
        assert_eq!(active_slice(&sb, Vec2::Y), 1);
        assert_eq!(active_slice(&sb, -Vec2::X), 2);
    }

    #[test]
    fn test_steers_toward_matching_open_slice() {
        // Virtually the user faces a long open view; physically that much room is behind them
        let space = TrackingSpace::rectangle(10.0, 10.0);
        let settings = Settings::default();
        let virtual_obstacles = vec![TrackingSpace::rectangle(10.0, 10.0).boundary];
        let mut state = walking_state(Vec2::new(0.0, 1.0 / 60.0), 0.0);
        state.curr_pos = Vec2::new(0.0, -4.0);
        state.curr_dir = Vec2::Y;
        state.curr_pos_real = Vec2::new(0.0, 4.0);
        state.curr_dir_real = Vec2::Y;

        let mut redirector = VisPolyRedirector::default();
        let mut ctx = RedirectContext::new(
            &mut state, &space, &[], &settings, 1.0 / 60.0, &[], None, &virtual_obstacles, true,
        );
        redirector.inject_redirection(&mut ctx);
        let events = ctx.into_events();

        let force = redirector.total_force().unwrap();
        assert!((force - Vec2::new(0.0, -1.0)).length() < 1e-3);
        let translation = events.iter().find(|e| e.kind == GainKind::Translation).unwrap();
        assert!((translation.value + settings.min_trans_gain).abs() < 1e-4);
    }
}

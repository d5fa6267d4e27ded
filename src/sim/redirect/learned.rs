//! Learned steering policy
//!
//! A trained network maps the last ten normalized physical poses to three
//! actions in [-1, 1]: translation, rotation and curvature gain. Inference
//! runs every `INFERENCE_INTERVAL` steps; the latest actions are reused in
//! between. The network itself is pluggable through [`PolicyModel`].

use std::collections::VecDeque;

use glam::Vec2;

use super::{RedirectContext, Redirector};
use crate::settings::RedirectorKind;

/// Poses fed to the network per inference
pub const STATE_WINDOW: usize = 10;
/// Steps between inferences
pub const INFERENCE_INTERVAL: usize = 20;
/// Tracking space widths the networks were trained for
const MODEL_WIDTHS: [u32; 5] = [10, 20, 30, 40, 50];

/// A trained policy network
pub trait PolicyModel {
    /// `input` holds `STATE_WINDOW` (x, y, heading) triples, oldest first
    fn infer(&mut self, input: &[f32]) -> [f32; 3];
}

/// Answers zero actions, which map to the midpoint of every gain range
#[derive(Debug, Default, Clone, Copy)]
pub struct NeutralPolicy;

impl PolicyModel for NeutralPolicy {
    fn infer(&mut self, _input: &[f32]) -> [f32; 3] {
        [0.0; 3]
    }
}

/// Linear map of `v` from [l1, r1] to [l2, r2]
fn convert(l1: f32, r1: f32, l2: f32, r2: f32, v: f32) -> f32 {
    (v - l1) / (r1 - l1) * (r2 - l2) + l2
}

/// Network trained for the width closest to `box_width`
pub fn model_width(box_width: f32) -> u32 {
    let mut target = MODEL_WIDTHS[0];
    for w in MODEL_WIDTHS.iter().skip(1) {
        if (target as f32 - box_width).abs() > (*w as f32 - box_width).abs() {
            target = *w;
        }
    }
    target
}

pub struct LearnedPolicy {
    model: Box<dyn PolicyModel>,
    model_name: Option<String>,
    states: VecDeque<[f32; 3]>,
    calls: usize,
    actions: [f32; 3],
}

impl Default for LearnedPolicy {
    fn default() -> Self {
        Self::with_model(Box::new(NeutralPolicy))
    }
}

impl std::fmt::Debug for LearnedPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LearnedPolicy")
            .field("model_name", &self.model_name)
            .field("calls", &self.calls)
            .field("actions", &self.actions)
            .finish()
    }
}

impl LearnedPolicy {
    pub fn with_model(model: Box<dyn PolicyModel>) -> Self {
        Self {
            model,
            model_name: None,
            states: VecDeque::with_capacity(STATE_WINDOW),
            calls: 0,
            actions: [0.0; 3],
        }
    }

    /// Name of the network selected for the current tracking space
    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    /// Last actions, clamped to [-1, 1]
    pub fn actions(&self) -> [f32; 3] {
        self.actions
    }

    /// Pose normalized to the tracking space bounding box; heading counter-clockwise from +x
    fn observe(ctx: &RedirectContext<'_>) -> [f32; 3] {
        let (min, max) = ctx.space.bounding_box();
        let pos = ctx.state.curr_pos_real;
        let dir = ctx.state.curr_dir_real;
        let heading = dir.y.atan2(dir.x).to_degrees();
        [
            convert(min.x, max.x, 0.0, 1.0, pos.x),
            convert(min.y, max.y, 0.0, 1.0, pos.y),
            convert(-180.0, 180.0, 0.0, 1.0, heading),
        ]
    }

    fn push_state(&mut self, state: [f32; 3]) {
        if self.states.len() == STATE_WINDOW {
            self.states.pop_front();
        }
        self.states.push_back(state);
    }
}

impl Redirector for LearnedPolicy {
    fn kind(&self) -> RedirectorKind {
        RedirectorKind::DeepLearning
    }

    fn inject_redirection(&mut self, ctx: &mut RedirectContext<'_>) {
        if self.model_name.is_none() {
            let (min, max) = ctx.space.bounding_box();
            let box_width = (max.x - min.x + max.y - min.y) / 2.0;
            let name = format!("SRLNet_{}", model_width(box_width));
            log::info!("Avatar {} uses policy {}", ctx.state.id, name);
            self.model_name = Some(name);
        }

        let observation = Self::observe(ctx);
        if self.states.is_empty() || ctx.state.just_ended_reset {
            self.states.clear();
            for _ in 0..STATE_WINDOW {
                self.push_state(observation);
            }
        }

        self.calls += 1;
        if (self.calls - 1) % INFERENCE_INTERVAL == 0 {
            self.push_state(observation);
            let input: Vec<f32> = self.states.iter().flatten().copied().collect();
            let output = self.model.infer(&input);
            self.actions = output.map(|a| if a.is_finite() { a.clamp(-1.0, 1.0) } else { 0.0 });
        }

        let settings = ctx.settings;
        let [a_t, a_r, a_c] = self.actions;
        let g_t = convert(-1.0, 1.0, settings.min_trans_gain, settings.max_trans_gain, a_t);
        let g_r = convert(-1.0, 1.0, settings.min_rot_gain, settings.max_rot_gain, a_r);
        let radius = settings.curvature_radius;
        let g_c = convert(-1.0, 1.0, -1.0 / radius, 1.0 / radius, a_c);

        let delta_pos: Vec2 = ctx.state.delta_pos;
        let delta_dir = ctx.state.delta_dir;
        ctx.apply_translation(delta_pos * g_t);
        ctx.apply_rotation(g_r * delta_dir);
        ctx.apply_curvature((g_c * delta_pos.length()).to_degrees());
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::walking_state;
    use super::*;
    use crate::settings::Settings;
    use crate::sim::state::{GainKind, TrackingSpace};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records inputs and answers a fixed action
    struct FixedPolicy {
        action: [f32; 3],
        inputs: Rc<RefCell<Vec<Vec<f32>>>>,
    }

    impl PolicyModel for FixedPolicy {
        fn infer(&mut self, input: &[f32]) -> [f32; 3] {
            self.inputs.borrow_mut().push(input.to_vec());
            self.action
        }
    }

    fn step(policy: &mut LearnedPolicy, space: &TrackingSpace) -> Vec<crate::sim::state::GainEvent> {
        let settings = Settings::default();
        let mut state = walking_state(Vec2::new(0.0, 0.02), 1.0);
        state.just_ended_reset = false;
        let mut ctx = RedirectContext::new(&mut state, space, &[], &settings, 1.0 / 60.0, &[], None, &[], true);
        policy.inject_redirection(&mut ctx);
        ctx.into_events()
    }

    #[test]
    fn test_model_width_selection() {
        assert_eq!(model_width(4.0), 10);
        assert_eq!(model_width(15.0), 10);
        assert_eq!(model_width(17.0), 20);
        assert_eq!(model_width(100.0), 50);
    }

    #[test]
    fn test_neutral_actions_map_to_range_midpoints() {
        let settings = Settings::default();
        let space = TrackingSpace::rectangle(20.0, 20.0);
        let mut policy = LearnedPolicy::default();
        let events = step(&mut policy, &space);
        assert_eq!(policy.model_name(), Some("SRLNet_20"));
        let rotation = events.iter().find(|e| e.kind == GainKind::Rotation).unwrap();
        let midpoint = (settings.min_rot_gain + settings.max_rot_gain) / 2.0;
        assert!((rotation.value - midpoint).abs() < 1e-4);
        assert!(events.iter().all(|e| e.kind != GainKind::Curvature));
    }

    #[test]
    fn test_inference_every_interval_with_full_window() {
        let inputs = Rc::new(RefCell::new(Vec::new()));
        let mut policy = LearnedPolicy::with_model(Box::new(FixedPolicy {
            action: [5.0, -5.0, 1.0],
            inputs: inputs.clone(),
        }));
        let space = TrackingSpace::rectangle(10.0, 10.0);
        for _ in 0..(INFERENCE_INTERVAL + 1) {
            step(&mut policy, &space);
        }
        assert_eq!(inputs.borrow().len(), 2);
        assert!(inputs.borrow().iter().all(|input| input.len() == STATE_WINDOW * 3));
        // Origin facing +y: centre of the box, heading 90 degrees
        let first = &inputs.borrow()[0];
        assert!((first[0] - 0.5).abs() < 1e-5);
        assert!((first[2] - 0.75).abs() < 1e-5);
        assert_eq!(policy.actions(), [1.0, -1.0, 1.0]);
    }

    #[test]
    fn test_saturated_actions_hit_gain_bounds() {
        let settings = Settings::default();
        let mut policy = LearnedPolicy::with_model(Box::new(FixedPolicy {
            action: [1.0, 1.0, -1.0],
            inputs: Rc::new(RefCell::new(Vec::new())),
        }));
        let events = step(&mut policy, &TrackingSpace::rectangle(10.0, 10.0));
        let value = |kind: GainKind| events.iter().find(|e| e.kind == kind).unwrap().value;
        assert!((value(GainKind::Translation) - settings.max_trans_gain).abs() < 1e-4);
        assert!((value(GainKind::Rotation) - settings.max_rot_gain).abs() < 1e-4);
        assert!((value(GainKind::Curvature) + 1.0 / settings.curvature_radius).abs() < 1e-4);
    }
}

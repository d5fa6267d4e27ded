//! Fixed timestep simulation tick
//!
//! `Simulation` owns one running trial. Each tick advances the clocks, orders
//! the avatars by priority and steps them one after another, so later avatars
//! see the already-updated physical positions of earlier ones.

use glam::Vec2;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::redirect::{RedirectContext, Redirector, create_redirector};
use super::reset::{ResetStatus, Resetter, create_resetter};
use super::state::{AvatarSnapshot, AvatarState, ResetEvent, RngState, TrackingSpace};
use super::stats::{AvatarSummary, Statistics};
use super::walker::{Mission, MotionInput, real_waypoints, rotate_in_place, turn_and_walk};
use crate::angle_between;
use crate::error::{ConfigError, SimError};
use crate::generate::path::generate_path;
use crate::geometry::{Polygon, Pose};
use crate::settings::{
    AvatarConfig, PathSource, RedirectorKind, ResetterKind, Settings, TrialSetup,
};

/// Input commands for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Motion per avatar id; avatars without an entry use the autopilot
    pub motions: Vec<MotionInput>,
    /// End the trial after this tick
    pub end_trial: bool,
}

impl TickInput {
    pub fn motion(&self, id: usize) -> MotionInput {
        self.motions.get(id).copied().unwrap_or_default()
    }
}

/// How a trial ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndState {
    /// Every avatar reached its last waypoint
    Normal,
    /// An avatar exceeded the reset cap or stood still too long
    Invalid,
    /// Ended by the host
    ManuallyEnded,
}

/// Strategy choices of an avatar next to its statistics
#[derive(Debug, Clone, Serialize)]
pub struct AvatarResult {
    pub redirector: RedirectorKind,
    pub resetter: ResetterKind,
    #[serde(flatten)]
    pub stats: AvatarSummary,
}

/// Results of a finished trial
#[derive(Debug, Clone, Serialize)]
pub struct TrialSummary {
    pub end_state: EndState,
    pub ticks: u64,
    /// Simulated seconds
    pub duration: f32,
    pub average_sampling_interval: f32,
    pub avatars: Vec<AvatarResult>,
}

/// One simulated user inside a trial
struct Avatar {
    config: AvatarConfig,
    state: AvatarState,
    mission: Mission,
    redirector: Box<dyn Redirector>,
    resetter: Box<dyn Resetter>,
    /// Time this avatar has been stepped
    elapsed: f32,
}

struct Trial {
    space: TrackingSpace,
    virtual_obstacles: Vec<Polygon>,
    avatars: Vec<Avatar>,
    stats: Statistics,
    resets: Vec<ResetEvent>,
    /// Trial clock (seconds)
    time: f32,
    ticks: u64,
    end_state: Option<EndState>,
}

impl Trial {
    fn avatar(&self, id: usize) -> Result<&Avatar, SimError> {
        self.avatars.get(id).ok_or(SimError::UnknownAvatar(id))
    }

    fn snapshots_except(&self, id: usize) -> Vec<AvatarSnapshot> {
        self.avatars
            .iter()
            .filter(|a| a.state.id != id)
            .map(|a| a.state.snapshot())
            .collect()
    }

    /// Advance one avatar's clocks; the trial clock follows the furthest one
    fn advance_clock(&mut self, id: usize, dt: f32) {
        let avatar = &mut self.avatars[id];
        avatar.elapsed += dt;
        if !avatar.state.in_reset {
            avatar.state.redirection_time += dt;
        }
        self.time = self.time.max(avatar.elapsed);
    }

    /// Processing order for this tick: larger priority first, ties keep id order
    fn priority_order(&mut self, settings: &Settings, dt: f32) -> Vec<usize> {
        let mut priorities = Vec::with_capacity(self.avatars.len());
        for id in 0..self.avatars.len() {
            let others = self.snapshots_except(id);
            let avatar = &mut self.avatars[id];
            let ctx = RedirectContext::new(
                &mut avatar.state,
                &self.space,
                &others,
                settings,
                dt,
                &avatar.mission.waypoints,
                avatar.config.physical_target,
                &self.virtual_obstacles,
                true,
            );
            let priority = avatar
                .redirector
                .priority(&ctx)
                .filter(|p| p.is_finite())
                .unwrap_or(-(id as f32));
            priorities.push((id, priority));
        }
        priorities.sort_by(|a, b| b.1.total_cmp(&a.1));
        priorities.into_iter().map(|(id, _)| id).collect()
    }

    /// Move, redirect and sample one avatar
    fn step_avatar(&mut self, id: usize, dt: f32, motion: MotionInput, settings: &Settings) {
        let others = self.snapshots_except(id);
        let time = self.time;
        let reset_count = self.stats.avatar(id).map_or(0, |s| s.reset_count);
        let avatar = &mut self.avatars[id];

        if !avatar.mission.complete {
            avatar.mission.update(
                avatar.state.curr_pos,
                avatar.state.redirection_time,
                settings.distance_to_waypoint_threshold,
            );
            avatar.state.mission_complete = avatar.mission.complete;
        }

        move_walker(avatar, motion, &self.space, &others, dt, settings);

        if !avatar.state.invalid
            && (reset_count > settings.max_reset_count
                || avatar.state.same_pos_time > settings.max_same_pos_time)
        {
            log::warn!(
                "Avatar {} invalidated: {} resets, {:.1}s without moving",
                id,
                reset_count,
                avatar.state.same_pos_time
            );
            avatar.state.invalid = true;
        }

        let state = &mut avatar.state;
        state.update_current();
        if state.invalid {
            return;
        }
        if state.curr_pos == state.prev_pos {
            if motion.is_autopilot() && !avatar.mission.complete {
                state.same_pos_time += dt;
            }
        } else {
            state.same_pos_time = 0.0;
        }
        state.update_deltas();

        let required = !state.in_reset
            && !state.just_ended_reset
            && avatar.resetter.is_reset_required(
                state.curr_pos_real,
                state.curr_dir_real,
                &self.space,
                &others,
                settings,
            );

        let mut ctx = RedirectContext::new(
            state,
            &self.space,
            &others,
            settings,
            dt,
            &avatar.mission.waypoints,
            avatar.config.physical_target,
            &self.virtual_obstacles,
            motion.is_autopilot(),
        );
        if required {
            log::debug!("Avatar {} starts a reset at {:.2}s", id, time);
            avatar
                .resetter
                .initialize_reset(&ctx, avatar.redirector.total_force());
            ctx.state.in_reset = true;
            self.stats.record_reset(id, time);
            self.resets.push(ResetEvent { avatar: id, time });
        }
        if ctx.state.in_reset {
            if avatar.resetter.inject_resetting(&mut ctx) == ResetStatus::Finished {
                avatar.resetter.end_reset();
                ctx.state.in_reset = false;
                ctx.state.just_ended_reset = true;
            }
        } else {
            avatar.redirector.inject_redirection(&mut ctx);
            ctx.state.just_ended_reset = false;
        }
        for event in ctx.into_events() {
            self.stats.record_gain(id, &event, dt);
        }

        avatar.state.update_previous();
        self.stats.frame_update(&avatar.state, &self.space);
    }

    /// Flush the sampler and decide whether the trial is over
    /// Flush statistics and resolve the end state; `new_frame` counts a tick
    fn finish_tick(&mut self, end_requested: bool, new_frame: bool) -> Option<EndState> {
        if new_frame {
            self.ticks += 1;
        }
        self.stats.maybe_flush(self.time);
        if self.end_state.is_none() {
            if self.avatars.iter().any(|a| a.state.invalid) {
                self.end_state = Some(EndState::Invalid);
            } else if self.avatars.iter().all(|a| a.mission.complete) {
                self.end_state = Some(EndState::Normal);
            } else if end_requested {
                self.end_state = Some(EndState::ManuallyEnded);
            }
        }
        self.end_state
    }

    fn summary(mut self) -> TrialSummary {
        let end_state = self.end_state.unwrap_or(EndState::ManuallyEnded);
        for avatar in &self.avatars {
            let id = avatar.state.id;
            self.stats
                .end_experiment(id, self.time, &avatar.mission.waypoints);
            if avatar.redirector.kind() == RedirectorKind::PassiveHapticApf
                && let Some(target) = avatar.config.physical_target
            {
                let real = avatar.state.real_pose();
                self.stats.set_passive_haptic_error(
                    id,
                    (real.position - target.position).length(),
                    angle_between(real.forward, target.forward),
                );
            }
        }
        log::info!(
            "Trial ended {:?} after {} ticks ({:.1}s), {} resets",
            end_state,
            self.ticks,
            self.time,
            self.resets.len()
        );
        let average_sampling_interval = self.stats.average_sampling_interval();
        let avatars = self
            .stats
            .summaries()
            .into_iter()
            .zip(&self.avatars)
            .map(|(stats, avatar)| AvatarResult {
                redirector: avatar.redirector.kind(),
                resetter: avatar.resetter.kind(),
                stats,
            })
            .collect();
        TrialSummary {
            end_state,
            ticks: self.ticks,
            duration: self.time,
            average_sampling_interval,
            avatars,
        }
    }
}

/// Apply this step's motion to the virtual head
fn move_walker(
    avatar: &mut Avatar,
    motion: MotionInput,
    space: &TrackingSpace,
    others: &[AvatarSnapshot],
    dt: f32,
    settings: &Settings,
) {
    let state = &mut avatar.state;
    match motion {
        MotionInput::Tracked(real) => {
            state.head = Pose::new(
                state.frame.transform_point(real.position),
                state.frame.transform_direction(real.forward),
            );
        }
        // The simulated user turns in place; host input keeps driving during a reset
        MotionInput::Autopilot if state.in_reset => {
            let turn = avatar.resetter.walker_update(dt, settings);
            rotate_in_place(&mut state.head, turn);
        }
        MotionInput::Autopilot => {
            if avatar.mission.complete {
                return;
            }
            if avatar.mission.is_replay() {
                if let Some(pose) = avatar.mission.replay_pose(state.redirection_time) {
                    state.head.position = pose.position;
                    if pose.forward != Vec2::ZERO {
                        state.head.forward = pose.forward;
                    }
                }
                return;
            }
            // Stand still while a reset is pending
            let blocked = avatar.resetter.is_reset_required(
                state.curr_pos_real,
                state.curr_dir_real,
                space,
                others,
                settings,
            );
            if let (false, Some(target)) = (blocked, avatar.mission.target()) {
                turn_and_walk(&mut state.head, target, dt, settings);
            }
        }
        MotionInput::Move { translation, rotation } => {
            if translation.is_finite() {
                state.head.position += translation;
            }
            if rotation.is_finite() {
                rotate_in_place(&mut state.head, rotation);
            }
        }
        MotionInput::Idle => {}
    }
}

/// Virtual waypoints of one avatar, placed at its start pose
fn build_mission(
    config: &AvatarConfig,
    settings: &Settings,
    rng: &mut Pcg32,
) -> Result<Mission, ConfigError> {
    let (recorded, intervals) = match &config.path {
        PathSource::Seed(kind) => (generate_path(*kind, settings, rng)?, None),
        PathSource::Waypoints(waypoints) => (waypoints.clone(), None),
        PathSource::RealUserPath {
            waypoints,
            sampling_intervals,
        } => (waypoints.clone(), Some(sampling_intervals.clone())),
    };
    let waypoints = real_waypoints(&recorded, config.initial_pose, settings);
    Ok(Mission::new(waypoints, intervals))
}

/// Redirected walking simulation
pub struct Simulation {
    settings: Settings,
    trial: Option<Trial>,
}

impl Simulation {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            trial: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Validate `setup` and start a trial, replacing any running one
    pub fn begin_trial(&mut self, setup: TrialSetup) -> Result<(), ConfigError> {
        self.settings.validate()?;
        setup.validate()?;

        let mut rng = RngState::new(setup.seed).to_rng();
        let mut avatars = Vec::with_capacity(setup.avatars.len());
        for (id, config) in setup.avatars.into_iter().enumerate() {
            let mission = build_mission(&config, &self.settings, &mut rng)?;
            log::debug!(
                "Avatar {}: {} / {}, {} waypoints",
                id,
                config.redirector.as_str(),
                config.resetter.as_str(),
                mission.waypoints.len()
            );
            avatars.push(Avatar {
                state: AvatarState::new(id, config.initial_pose),
                redirector: create_redirector(config.redirector),
                resetter: create_resetter(config.resetter),
                mission,
                config,
                elapsed: 0.0,
            });
        }

        log::info!(
            "Trial started: {} avatars, seed {}",
            avatars.len(),
            setup.seed
        );
        self.trial = Some(Trial {
            stats: Statistics::begin(avatars.len(), 0.0, self.settings.sampling_frequency),
            space: setup.tracking_space,
            virtual_obstacles: setup.virtual_obstacles,
            avatars,
            resets: Vec::new(),
            time: 0.0,
            ticks: 0,
            end_state: None,
        });
        Ok(())
    }

    fn trial(&self) -> Result<&Trial, SimError> {
        self.trial.as_ref().ok_or(SimError::NoActiveTrial)
    }

    fn trial_mut(&mut self) -> Result<&mut Trial, SimError> {
        self.trial.as_mut().ok_or(SimError::NoActiveTrial)
    }

    /// Step one avatar by `dt` and return its virtual head pose
    ///
    /// For hosts that drive avatars individually; `tick` steps all of them.
    /// Stepping every avatar once by the same `dt` counts as one tick.
    pub fn step(&mut self, id: usize, dt: f32, motion: MotionInput) -> Result<Pose, SimError> {
        let settings = &self.settings;
        let trial = self.trial.as_mut().ok_or(SimError::NoActiveTrial)?;
        trial.avatar(id)?;
        if trial.end_state.is_none() {
            // Only the avatar that moves the trial clock forward opens a new frame
            let before = trial.time;
            trial.advance_clock(id, dt);
            trial.step_avatar(id, dt, motion, settings);
            let new_frame = trial.time > before;
            trial.finish_tick(false, new_frame);
        }
        Ok(trial.avatars[id].state.head)
    }

    /// Advance every avatar by `dt`; returns the end state once the trial is over
    pub fn tick(&mut self, dt: f32, input: &TickInput) -> Result<Option<EndState>, SimError> {
        let settings = &self.settings;
        let trial = self.trial.as_mut().ok_or(SimError::NoActiveTrial)?;
        if trial.end_state.is_some() {
            return Ok(trial.end_state);
        }
        for id in 0..trial.avatars.len() {
            trial.advance_clock(id, dt);
        }
        for id in trial.priority_order(settings, dt) {
            trial.step_avatar(id, dt, input.motion(id), settings);
        }
        Ok(trial.finish_tick(input.end_trial, true))
    }

    /// Tick with the autopilot at the fixed step until the trial ends or `max_ticks` pass
    pub fn run_to_end(&mut self, max_ticks: u64) -> Result<TrialSummary, SimError> {
        let dt = self.settings.dt();
        let input = TickInput::default();
        for _ in 0..max_ticks {
            if self.tick(dt, &input)?.is_some() {
                break;
            }
        }
        self.end_trial()
    }

    /// Close the running trial; a trial that has not finished counts as manually ended
    pub fn end_trial(&mut self) -> Result<TrialSummary, SimError> {
        let trial = self.trial.take().ok_or(SimError::NoActiveTrial)?;
        Ok(trial.summary())
    }

    pub fn is_running(&self) -> bool {
        self.trial.is_some()
    }

    pub fn end_state(&self) -> Option<EndState> {
        self.trial.as_ref().and_then(|t| t.end_state)
    }

    /// Trial clock (seconds)
    pub fn time(&self) -> Result<f32, SimError> {
        Ok(self.trial()?.time)
    }

    pub fn avatar_count(&self) -> usize {
        self.trial.as_ref().map_or(0, |t| t.avatars.len())
    }

    pub fn state(&self, id: usize) -> Result<&AvatarState, SimError> {
        Ok(&self.trial()?.avatar(id)?.state)
    }

    pub fn virtual_pose(&self, id: usize) -> Result<Pose, SimError> {
        Ok(self.state(id)?.head)
    }

    pub fn real_pose(&self, id: usize) -> Result<Pose, SimError> {
        Ok(self.state(id)?.real_pose())
    }

    /// Virtual waypoints of an avatar
    pub fn waypoints(&self, id: usize) -> Result<&[Vec2], SimError> {
        Ok(&self.trial()?.avatar(id)?.mission.waypoints)
    }

    pub fn tracking_space(&self) -> Result<&TrackingSpace, SimError> {
        Ok(&self.trial()?.space)
    }

    pub fn statistics(&self) -> Result<&Statistics, SimError> {
        Ok(&self.trial()?.stats)
    }

    /// Reset starts so far
    pub fn resets(&self) -> Result<&[ResetEvent], SimError> {
        Ok(&self.trial()?.resets)
    }

    pub fn redirector(&self, id: usize) -> Result<&dyn Redirector, SimError> {
        Ok(self.trial()?.avatar(id)?.redirector.as_ref())
    }

    /// Replace an avatar's strategy, e.g. with a custom `Redirector`
    pub fn set_redirector(&mut self, id: usize, redirector: Box<dyn Redirector>) -> Result<(), SimError> {
        let trial = self.trial_mut()?;
        let avatar = trial.avatars.get_mut(id).ok_or(SimError::UnknownAvatar(id))?;
        log::info!("Avatar {} switches to {}", id, redirector.kind().as_str());
        avatar.redirector = redirector;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::PathSeedKind;

    fn straight_walk(redirector: RedirectorKind, resetter: ResetterKind, size: f32) -> TrialSetup {
        TrialSetup::new(
            TrackingSpace::rectangle(size, size),
            vec![AvatarConfig {
                redirector,
                resetter,
                path: PathSource::Waypoints(vec![Vec2::new(0.0, 15.0)]),
                initial_pose: Pose::new(Vec2::ZERO, Vec2::Y),
                physical_target: None,
            }],
        )
    }

    #[test]
    fn test_null_strategies_walk_to_waypoint() {
        let mut sim = Simulation::new(Settings::default());
        sim.begin_trial(straight_walk(RedirectorKind::Null, ResetterKind::Null, 20.0))
            .unwrap();
        let summary = sim.run_to_end(5000).unwrap();
        assert_eq!(summary.end_state, EndState::Normal);
        let avatar = &summary.avatars[0].stats;
        assert_eq!(avatar.reset_count, 0);
        assert!((avatar.sum_virtual_distance_travelled - 15.0).abs() < 0.06);
        assert_eq!(avatar.sum_injected_translation, 0.0);
        assert!(avatar.g_r.min.is_none());
        assert_eq!(avatar.virtual_distances_between_resets.len(), 1);
        assert!((avatar.virtual_way_distance - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_walk_dist_and_final_pose() {
        let mut sim = Simulation::new(Settings::default());
        sim.begin_trial(straight_walk(RedirectorKind::Null, ResetterKind::Null, 20.0))
            .unwrap();
        let dt = sim.settings().dt();
        while sim.tick(dt, &TickInput::default()).unwrap().is_none() {}
        let state = sim.state(0).unwrap();
        assert!((state.walk_dist - 15.0).abs() < 0.06);
        assert!((state.curr_pos - Vec2::new(0.0, 15.0)).length() < 0.06);
        // No redirection: physical and virtual coincide
        assert!((state.curr_pos_real - state.curr_pos).length() < 1e-4);
    }

    #[test]
    fn test_small_room_triggers_resets() {
        let mut sim = Simulation::new(Settings::default());
        sim.begin_trial(straight_walk(RedirectorKind::Null, ResetterKind::TwoOneTurn, 6.0))
            .unwrap();
        let summary = sim.run_to_end(20_000).unwrap();
        assert_eq!(summary.end_state, EndState::Normal);
        let avatar = &summary.avatars[0].stats;
        assert!(avatar.reset_count >= 2);
        let n = avatar.reset_count as usize;
        assert_eq!(avatar.virtual_distances_between_resets.len(), n + 1);
        assert_eq!(avatar.time_elapsed_between_resets.len(), n + 1);
    }

    #[test]
    fn test_reset_cap_invalidates_trial() {
        let settings = Settings {
            max_reset_count: 0,
            ..Default::default()
        };
        let mut sim = Simulation::new(settings);
        sim.begin_trial(straight_walk(RedirectorKind::Null, ResetterKind::TwoOneTurn, 6.0))
            .unwrap();
        let summary = sim.run_to_end(20_000).unwrap();
        assert_eq!(summary.end_state, EndState::Invalid);
        assert_eq!(summary.avatars[0].stats.reset_count, 1);
    }

    #[test]
    fn test_manual_end_and_missing_trial() {
        let mut sim = Simulation::new(Settings::default());
        assert_eq!(sim.tick(0.1, &TickInput::default()), Err(SimError::NoActiveTrial));
        sim.begin_trial(straight_walk(RedirectorKind::ThomasApf, ResetterKind::TwoOneTurn, 20.0))
            .unwrap();
        assert_eq!(
            sim.step(3, 0.1, MotionInput::Idle),
            Err(SimError::UnknownAvatar(3))
        );
        let input = TickInput {
            end_trial: true,
            ..Default::default()
        };
        assert_eq!(sim.tick(1.0 / 60.0, &input).unwrap(), Some(EndState::ManuallyEnded));
        let summary = sim.end_trial().unwrap();
        assert_eq!(summary.end_state, EndState::ManuallyEnded);
        assert_eq!(summary.ticks, 1);
        assert_eq!(summary.avatars[0].redirector, RedirectorKind::ThomasApf);
        assert!(!sim.is_running());
    }

    #[test]
    fn test_host_move_and_tracked_input() {
        let mut sim = Simulation::new(Settings::default());
        sim.begin_trial(straight_walk(RedirectorKind::Null, ResetterKind::Null, 20.0))
            .unwrap();
        let pose = sim
            .step(
                0,
                0.1,
                MotionInput::Move {
                    translation: Vec2::new(0.0, 0.1),
                    rotation: 90.0,
                },
            )
            .unwrap();
        assert!((pose.position - Vec2::new(0.0, 0.1)).length() < 1e-5);
        assert!((pose.forward - Vec2::X).length() < 1e-4);

        let tracked = Pose::new(Vec2::new(1.0, 1.0), -Vec2::Y);
        sim.step(0, 0.1, MotionInput::Tracked(tracked)).unwrap();
        let real = sim.real_pose(0).unwrap();
        assert!((real.position - tracked.position).length() < 1e-4);
        assert!((real.forward - tracked.forward).length() < 1e-4);
        assert!((sim.time().unwrap() - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_host_move_is_kept_during_reset() {
        let mut sim = Simulation::new(Settings::default());
        sim.begin_trial(straight_walk(RedirectorKind::Null, ResetterKind::TwoOneTurn, 6.0))
            .unwrap();
        let dt = sim.settings().dt();
        let mut steps = 0;
        while !sim.state(0).unwrap().in_reset {
            sim.step(0, dt, MotionInput::Autopilot).unwrap();
            steps += 1;
            assert!(steps < 2000, "no reset in a 6 m room");
        }

        let before = sim.virtual_pose(0).unwrap().forward;
        let still = MotionInput::Move {
            translation: Vec2::ZERO,
            rotation: 0.0,
        };
        let pose = sim.step(0, dt, still).unwrap();
        assert!((pose.forward - before).length() < 1e-6);
        assert!(sim.state(0).unwrap().in_reset);

        // The autopilot turns in place and the world turns along
        let pose = sim.step(0, dt, MotionInput::Autopilot).unwrap();
        assert!(angle_between(before, pose.forward) > 2.0);
    }

    #[test]
    fn test_step_counts_one_tick_per_frame() {
        let mut sim = Simulation::new(Settings::default());
        let mut setup = straight_walk(RedirectorKind::Null, ResetterKind::Null, 20.0);
        setup.avatars.push(setup.avatars[0].clone());
        setup.avatars[1].initial_pose = Pose::new(Vec2::new(3.0, 0.0), Vec2::Y);
        sim.begin_trial(setup).unwrap();
        for _ in 0..3 {
            sim.step(0, 0.1, MotionInput::Idle).unwrap();
            sim.step(1, 0.1, MotionInput::Idle).unwrap();
        }
        let summary = sim.end_trial().unwrap();
        assert_eq!(summary.ticks, 3);
        assert!((summary.duration - 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_stuck_autopilot_invalidates_trial() {
        let settings = Settings {
            max_same_pos_time: 0.5,
            ..Default::default()
        };
        let mut sim = Simulation::new(settings);
        let mut setup = straight_walk(RedirectorKind::Null, ResetterKind::Null, 20.0);
        // A recording that never leaves the start point
        setup.avatars[0].path = PathSource::RealUserPath {
            waypoints: vec![Vec2::ZERO, Vec2::ZERO],
            sampling_intervals: vec![0.0, 100.0],
        };
        sim.begin_trial(setup).unwrap();
        let summary = sim.run_to_end(10_000).unwrap();
        assert_eq!(summary.end_state, EndState::Invalid);
        assert!(summary.duration < 1.0);
        assert_eq!(sim.end_state(), None);
    }

    #[test]
    fn test_generated_path_is_seeded() {
        let setup = |seed| {
            let mut setup = TrialSetup::new(
                TrackingSpace::rectangle(10.0, 10.0),
                vec![AvatarConfig {
                    path: PathSource::Seed(PathSeedKind::RandomTurn),
                    ..Default::default()
                }],
            );
            setup.seed = seed;
            setup
        };
        let mut a = Simulation::new(Settings::default());
        let mut b = Simulation::new(Settings::default());
        a.begin_trial(setup(7)).unwrap();
        b.begin_trial(setup(7)).unwrap();
        assert_eq!(a.waypoints(0).unwrap(), b.waypoints(0).unwrap());
        b.begin_trial(setup(8)).unwrap();
        assert_ne!(a.waypoints(0).unwrap(), b.waypoints(0).unwrap());
    }

    #[test]
    fn test_priority_order_defaults_to_ids() {
        let mut sim = Simulation::new(Settings::default());
        let mut setup = straight_walk(RedirectorKind::Null, ResetterKind::Null, 20.0);
        setup.avatars.push(setup.avatars[0].clone());
        setup.avatars[1].initial_pose = Pose::new(Vec2::new(3.0, 0.0), Vec2::Y);
        sim.begin_trial(setup).unwrap();
        let settings = sim.settings.clone();
        let trial = sim.trial.as_mut().unwrap();
        assert_eq!(trial.priority_order(&settings, 0.1), vec![0, 1]);
    }
}

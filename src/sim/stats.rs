//! Trial statistics
//!
//! The aggregator only sees what the scheduler reports: gain events, reset
//! starts and one frame update per avatar per tick. Raw per-tick values go
//! into buffers that are averaged into a sample series at a fixed sampling
//! frequency. Every average over an empty collection is 0.

use std::ops::{Add, Div};

use glam::Vec2;
use serde::{Serialize, Serializer};

use super::state::{AvatarState, GainEvent, GainKind, TrackingSpace};
use crate::sign;

/// Raw per-tick values plus the series of their flushed means
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer<T> {
    pub samples: Vec<T>,
    buffer: Vec<T>,
}

impl<T> SampleBuffer<T>
where
    T: Copy + Default + Add<Output = T> + Div<f32, Output = T>,
{
    pub fn push(&mut self, value: T) {
        self.buffer.push(value);
    }

    /// Mean of the buffered values, or zero when empty
    pub fn buffered_mean(&self) -> T {
        mean(&self.buffer)
    }

    /// Append the buffered mean to the series and clear the buffer
    pub fn flush(&mut self) {
        self.samples.push(self.buffered_mean());
        self.buffer.clear();
    }

    pub fn average(&self) -> T {
        mean(&self.samples)
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

impl SampleBuffer<f32> {
    pub fn average_of_absolute_values(&self) -> f32 {
        average_abs(&self.samples)
    }
}

impl<T: Serialize> Serialize for SampleBuffer<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.samples.serialize(serializer)
    }
}

fn mean<T>(values: &[T]) -> T
where
    T: Copy + Default + Add<Output = T> + Div<f32, Output = T>,
{
    if values.is_empty() {
        return T::default();
    }
    let sum = values.iter().fold(T::default(), |acc, v| acc + *v);
    sum / values.len() as f32
}

/// Mean of a list, 0 when empty
pub fn average(values: &[f32]) -> f32 {
    mean(values)
}

fn average_abs(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| v.abs()).sum::<f32>() / values.len() as f32
}

/// Running minimum and maximum; `None` until the first value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Extrema {
    pub min: Option<f32>,
    pub max: Option<f32>,
}

impl Extrema {
    pub fn record(&mut self, value: f32) {
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }
}

/// Sampled series of one avatar
#[derive(Debug, Clone, Default, Serialize)]
pub struct AvatarSeries {
    pub real_positions: SampleBuffer<Vec2>,
    pub virtual_positions: SampleBuffer<Vec2>,
    pub g_t: SampleBuffer<f32>,
    pub injected_translations: SampleBuffer<f32>,
    pub g_r: SampleBuffer<f32>,
    pub injected_rotations_from_rotation_gain: SampleBuffer<f32>,
    pub g_c: SampleBuffer<f32>,
    pub injected_rotations_from_curvature_gain: SampleBuffer<f32>,
    pub injected_rotations: SampleBuffer<f32>,
    pub distances_to_boundary: SampleBuffer<f32>,
    pub distances_to_center: SampleBuffer<f32>,
}

impl AvatarSeries {
    fn flush(&mut self) {
        self.real_positions.flush();
        self.virtual_positions.flush();
        for series in [
            &mut self.g_t,
            &mut self.injected_translations,
            &mut self.g_r,
            &mut self.injected_rotations_from_rotation_gain,
            &mut self.g_c,
            &mut self.injected_rotations_from_curvature_gain,
            &mut self.injected_rotations,
            &mut self.distances_to_boundary,
            &mut self.distances_to_center,
        ] {
            series.flush();
        }
    }
}

/// Everything recorded for one avatar during a trial
#[derive(Debug, Clone, Default)]
pub struct AvatarStatistics {
    pub reset_count: u32,

    /// Meters
    pub sum_injected_translation: f32,
    /// Degrees, magnitude
    pub sum_injected_rotation_from_rotation_gain: f32,
    /// Degrees, magnitude
    pub sum_injected_rotation_from_curvature_gain: f32,
    pub sum_virtual_distance: f32,
    pub sum_real_distance: f32,

    pub translation_gain: Extrema,
    pub rotation_gain: Extrema,
    pub curvature_gain: Extrema,

    pub virtual_distances_between_resets: Vec<f32>,
    pub time_elapsed_between_resets: Vec<f32>,
    virtual_distance_since_last_reset: f32,
    time_of_last_reset: f32,

    pub experiment_begin_time: f32,
    pub experiment_end_time: f32,
    /// Length of the waypoint polyline
    pub virtual_way_distance: f32,

    /// Passive haptics: physical distance to the prop at the end (m)
    pub position_error: Option<f32>,
    /// Passive haptics: heading difference to the prop at the end (deg)
    pub angle_error: Option<f32>,

    pub series: AvatarSeries,
}

impl AvatarStatistics {
    fn new(begin_time: f32) -> Self {
        Self {
            time_of_last_reset: begin_time,
            experiment_begin_time: begin_time,
            experiment_end_time: begin_time,
            ..Default::default()
        }
    }

    pub fn summary(&self, id: usize) -> AvatarSummary {
        AvatarSummary {
            id,
            reset_count: self.reset_count,
            virtual_way_distance: self.virtual_way_distance,
            virtual_distance_between_resets_average: average(&self.virtual_distances_between_resets),
            time_elapsed_between_resets_average: average(&self.time_elapsed_between_resets),
            sum_injected_translation: self.sum_injected_translation,
            sum_injected_rotation_g_r: self.sum_injected_rotation_from_rotation_gain,
            sum_injected_rotation_g_c: self.sum_injected_rotation_from_curvature_gain,
            sum_real_distance_travelled: self.sum_real_distance,
            sum_virtual_distance_travelled: self.sum_virtual_distance,
            g_t: self.translation_gain,
            g_r: self.rotation_gain,
            g_c: self.curvature_gain,
            g_t_average: self.series.g_t.average_of_absolute_values(),
            injected_translation_average: self.series.injected_translations.average(),
            g_r_average: self.series.g_r.average_of_absolute_values(),
            injected_rotation_from_rotation_gain_average: self
                .series
                .injected_rotations_from_rotation_gain
                .average(),
            g_c_average: self.series.g_c.average_of_absolute_values(),
            injected_rotation_from_curvature_gain_average: self
                .series
                .injected_rotations_from_curvature_gain
                .average(),
            injected_rotation_average: self.series.injected_rotations.average(),
            real_position_average: self.series.real_positions.average(),
            virtual_position_average: self.series.virtual_positions.average(),
            distance_to_boundary_average: self.series.distances_to_boundary.average(),
            distance_to_center_average: self.series.distances_to_center.average(),
            experiment_duration: self.experiment_end_time - self.experiment_begin_time,
            position_error: self.position_error,
            angle_error: self.angle_error,
            virtual_distances_between_resets: self.virtual_distances_between_resets.clone(),
            time_elapsed_between_resets: self.time_elapsed_between_resets.clone(),
            series: self.series.clone(),
        }
    }
}

/// Per-avatar results of a finished trial
#[derive(Debug, Clone, Serialize)]
pub struct AvatarSummary {
    pub id: usize,
    pub reset_count: u32,
    pub virtual_way_distance: f32,
    pub virtual_distance_between_resets_average: f32,
    pub time_elapsed_between_resets_average: f32,
    pub sum_injected_translation: f32,
    pub sum_injected_rotation_g_r: f32,
    pub sum_injected_rotation_g_c: f32,
    pub sum_real_distance_travelled: f32,
    pub sum_virtual_distance_travelled: f32,
    pub g_t: Extrema,
    pub g_r: Extrema,
    pub g_c: Extrema,
    pub g_t_average: f32,
    pub injected_translation_average: f32,
    pub g_r_average: f32,
    pub injected_rotation_from_rotation_gain_average: f32,
    pub g_c_average: f32,
    pub injected_rotation_from_curvature_gain_average: f32,
    pub injected_rotation_average: f32,
    pub real_position_average: Vec2,
    pub virtual_position_average: Vec2,
    pub distance_to_boundary_average: f32,
    pub distance_to_center_average: f32,
    pub experiment_duration: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_error: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle_error: Option<f32>,
    pub virtual_distances_between_resets: Vec<f32>,
    pub time_elapsed_between_resets: Vec<f32>,
    pub series: AvatarSeries,
}

/// Statistics of every avatar in the running trial
#[derive(Debug, Clone)]
pub struct Statistics {
    pub avatars: Vec<AvatarStatistics>,
    /// Time between consecutive flushes
    pub sampling_intervals: Vec<f32>,
    last_sampling_time: f32,
    sampling_frequency: f32,
}

impl Statistics {
    /// Start recording `avatar_count` avatars at `begin_time`
    pub fn begin(avatar_count: usize, begin_time: f32, sampling_frequency: f32) -> Self {
        Self {
            avatars: (0..avatar_count).map(|_| AvatarStatistics::new(begin_time)).collect(),
            sampling_intervals: Vec::new(),
            last_sampling_time: begin_time,
            sampling_frequency,
        }
    }

    pub fn avatar(&self, id: usize) -> Option<&AvatarStatistics> {
        self.avatars.get(id)
    }

    /// Account one injected gain; `dt` weights the buffered samples
    pub fn record_gain(&mut self, id: usize, event: &GainEvent, dt: f32) {
        let Some(us) = self.avatars.get_mut(id) else {
            return;
        };
        match event.kind {
            GainKind::Translation => {
                us.sum_injected_translation += event.applied;
                us.translation_gain.record(event.value);
                let signed = sign(event.value) * event.applied;
                us.sum_virtual_distance += signed;
                us.virtual_distance_since_last_reset += signed;
                us.series.g_t.push(event.value * dt);
                us.series.injected_translations.push(event.applied * dt);
            }
            GainKind::Rotation => {
                us.sum_injected_rotation_from_rotation_gain += event.applied.abs();
                us.rotation_gain.record(event.value);
                us.series.g_r.push(event.value * dt);
                us.series
                    .injected_rotations_from_rotation_gain
                    .push(event.applied.abs() * dt);
                us.series.injected_rotations.push(event.applied.abs() * dt);
            }
            GainKind::Curvature => {
                us.sum_injected_rotation_from_curvature_gain += event.applied.abs();
                us.curvature_gain.record(event.value);
                us.series.g_c.push(event.value * dt);
                us.series
                    .injected_rotations_from_curvature_gain
                    .push(event.applied.abs() * dt);
                us.series.injected_rotations.push(event.applied.abs() * dt);
            }
        }
    }

    /// A reset started at `time`: close the current between-resets interval
    pub fn record_reset(&mut self, id: usize, time: f32) {
        let Some(us) = self.avatars.get_mut(id) else {
            return;
        };
        us.reset_count += 1;
        us.virtual_distances_between_resets
            .push(us.virtual_distance_since_last_reset);
        us.virtual_distance_since_last_reset = 0.0;
        us.time_elapsed_between_resets.push(time - us.time_of_last_reset);
        us.time_of_last_reset = time;
    }

    /// Per-tick sample of an avatar after its step
    pub fn frame_update(&mut self, state: &AvatarState, space: &TrackingSpace) {
        let Some(us) = self.avatars.get_mut(state.id) else {
            return;
        };
        let walked = state.delta_pos.length();
        us.sum_virtual_distance += walked;
        us.virtual_distance_since_last_reset += walked;
        us.sum_real_distance += state.delta_pos_real.length();

        us.series.virtual_positions.push(state.curr_pos);
        us.series.real_positions.push(state.curr_pos_real);
        us.series
            .distances_to_boundary
            .push(space.nearest_distance(state.curr_pos_real));
        us.series.distances_to_center.push(state.curr_pos_real.length());
    }

    /// Flush every buffer once a sampling period has elapsed
    pub fn maybe_flush(&mut self, time: f32) -> bool {
        if time - self.last_sampling_time <= 1.0 / self.sampling_frequency {
            return false;
        }
        self.sampling_intervals.push(time - self.last_sampling_time);
        self.last_sampling_time = time;
        for us in &mut self.avatars {
            us.series.flush();
        }
        true
    }

    /// Close the last between-resets interval and measure the waypoint path
    pub fn end_experiment(&mut self, id: usize, time: f32, waypoints: &[Vec2]) {
        let Some(us) = self.avatars.get_mut(id) else {
            return;
        };
        us.virtual_distances_between_resets
            .push(us.virtual_distance_since_last_reset);
        us.time_elapsed_between_resets.push(time - us.time_of_last_reset);
        us.experiment_end_time = time;
        us.virtual_way_distance = waypoints.windows(2).map(|w| (w[1] - w[0]).length()).sum();
    }

    pub fn set_passive_haptic_error(&mut self, id: usize, position_error: f32, angle_error: f32) {
        if let Some(us) = self.avatars.get_mut(id) {
            us.position_error = Some(position_error);
            us.angle_error = Some(angle_error);
        }
    }

    pub fn average_sampling_interval(&self) -> f32 {
        average(&self.sampling_intervals)
    }

    pub fn summaries(&self) -> Vec<AvatarSummary> {
        self.avatars
            .iter()
            .enumerate()
            .map(|(id, us)| us.summary(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Pose;

    #[test]
    fn test_flush_takes_buffer_mean() {
        let mut buffer = SampleBuffer::<f32>::default();
        buffer.push(1.0);
        buffer.push(2.0);
        buffer.push(6.0);
        buffer.flush();
        assert_eq!(buffer.samples, vec![3.0]);
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn test_empty_flush_yields_zero() {
        let mut buffer = SampleBuffer::<Vec2>::default();
        buffer.flush();
        assert_eq!(buffer.samples, vec![Vec2::ZERO]);
        assert_eq!(SampleBuffer::<f32>::default().average(), 0.0);
        assert_eq!(average(&[]), 0.0);
    }

    #[test]
    fn test_average_of_absolute_values() {
        let buffer = SampleBuffer {
            samples: vec![-1.0, 3.0],
            buffer: Vec::new(),
        };
        assert_eq!(buffer.average(), 1.0);
        assert_eq!(buffer.average_of_absolute_values(), 2.0);
    }

    #[test]
    fn test_extrema() {
        let mut extrema = Extrema::default();
        assert_eq!(extrema.min, None);
        for v in [0.2, -0.1, 0.05] {
            extrema.record(v);
        }
        assert_eq!(extrema.min, Some(-0.1));
        assert_eq!(extrema.max, Some(0.2));
    }

    #[test]
    fn test_reset_intervals_have_one_more_entry_than_resets() {
        let mut stats = Statistics::begin(1, 0.0, 10.0);
        let mut state = AvatarState::new(0, Pose::default());
        let space = TrackingSpace::rectangle(10.0, 10.0);
        state.delta_pos = Vec2::new(0.0, 1.0);
        stats.frame_update(&state, &space);
        stats.record_reset(0, 2.0);
        stats.frame_update(&state, &space);
        stats.frame_update(&state, &space);
        stats.record_reset(0, 5.0);
        stats.end_experiment(0, 6.0, &[Vec2::ZERO, Vec2::new(0.0, 3.0), Vec2::new(4.0, 3.0)]);

        let us = stats.avatar(0).unwrap();
        assert_eq!(us.reset_count, 2);
        assert_eq!(us.virtual_distances_between_resets, vec![1.0, 2.0, 0.0]);
        assert_eq!(us.time_elapsed_between_resets, vec![2.0, 3.0, 1.0]);
        assert!((us.virtual_way_distance - 7.0).abs() < 1e-5);
        assert!((us.sum_virtual_distance - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_gain_events_accumulate() {
        let mut stats = Statistics::begin(1, 0.0, 10.0);
        let events = [
            GainEvent {
                kind: GainKind::Translation,
                value: -0.1,
                applied: 0.002,
            },
            GainEvent {
                kind: GainKind::Rotation,
                value: 0.4,
                applied: -2.0,
            },
            GainEvent {
                kind: GainKind::Curvature,
                value: 0.1,
                applied: 0.5,
            },
        ];
        for event in &events {
            stats.record_gain(0, event, 0.1);
        }
        let us = stats.avatar(0).unwrap();
        assert!((us.sum_injected_translation - 0.002).abs() < 1e-6);
        assert!((us.sum_virtual_distance + 0.002).abs() < 1e-6);
        assert_eq!(us.sum_injected_rotation_from_rotation_gain, 2.0);
        assert_eq!(us.sum_injected_rotation_from_curvature_gain, 0.5);
        assert_eq!(us.rotation_gain.max, Some(0.4));
        assert_eq!(us.series.injected_rotations.pending(), 2);
    }

    #[test]
    fn test_flush_waits_for_sampling_period() {
        let mut stats = Statistics::begin(2, 0.0, 10.0);
        assert!(!stats.maybe_flush(0.05));
        assert!(stats.maybe_flush(0.15));
        assert_eq!(stats.sampling_intervals, vec![0.15]);
        assert_eq!(stats.avatars[1].series.g_t.samples, vec![0.0]);
        assert!(!stats.maybe_flush(0.2));
        assert!((stats.average_sampling_interval() - 0.15).abs() < 1e-6);
    }

    #[test]
    fn test_summary_serializes_series_as_lists() {
        let mut stats = Statistics::begin(1, 0.0, 10.0);
        stats.record_gain(
            0,
            &GainEvent {
                kind: GainKind::Rotation,
                value: -0.2,
                applied: 1.0,
            },
            1.0,
        );
        stats.maybe_flush(1.0);
        let summary = stats.summaries().remove(0);
        assert!((summary.g_r_average - 0.2).abs() < 1e-6);
        assert_eq!(summary.position_error, None);
        let json = serde_json::to_value(&summary).unwrap();
        let g_r = json["series"]["g_r"].as_array().unwrap();
        assert_eq!(g_r.len(), 1);
        assert!((g_r[0].as_f64().unwrap() + 0.2).abs() < 1e-6);
        assert!(json.get("position_error").is_none());
    }
}

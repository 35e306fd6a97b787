//! Short-horizon prediction of surrounding traffic.
//!
//! Each observed vehicle is assumed to keep its lateral offset and its speed
//! along the track. The model has no memory: a vehicle seen for the first
//! time is projected from its instantaneous state like any other.

use crate::common::{Point2D, TrackFrame, TrackPosition};

use super::config::HorizonConfig;
use super::observation::TrafficObservation;

/// Trait for traffic motion predictors
pub trait MotionPredictor: Send + Sync {
    /// One path per observation, in observation order
    fn predict(&self, observations: &[TrafficObservation], track: &dyn TrackFrame)
        -> Predictions;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictedSample {
    /// Time from now [s]
    pub t: f64,
    pub track: TrackPosition,
    pub position: Point2D,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictedPath {
    pub id: i64,
    pub lane: Option<usize>,
    /// Speed along the track [m/s]
    pub speed: f64,
    /// Track position at t = 0
    pub initial: TrackPosition,
    /// Samples at t = dt, 2 dt, ..., N dt
    pub samples: Vec<PredictedSample>,
}

impl PredictedPath {
    pub fn last(&self) -> Option<&PredictedSample> {
        self.samples.last()
    }
}

/// All predicted paths of one tick
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Predictions {
    paths: Vec<PredictedPath>,
}

impl Predictions {
    pub fn new(paths: Vec<PredictedPath>) -> Self {
        Self { paths }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PredictedPath> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn in_lane(&self, lane: usize) -> impl Iterator<Item = &PredictedPath> {
        self.paths.iter().filter(move |p| p.lane == Some(lane))
    }

    /// Nearest vehicle ahead of `ego_s` in `lane` and the gap to it.
    ///
    /// The gap is the smaller of the current gap and the gap at the end of
    /// the horizon with the ego holding `ego_speed`, floored at zero.
    pub fn leader(
        &self,
        lane: usize,
        ego_s: f64,
        ego_speed: f64,
        track: &dyn TrackFrame,
    ) -> Option<(&PredictedPath, f64)> {
        self.in_lane(lane)
            .filter_map(|path| {
                let current_gap = track.s_distance(ego_s, path.initial.s);
                if current_gap <= 0.0 {
                    return None;
                }
                let horizon_gap = path
                    .last()
                    .map(|last| track.s_distance(ego_s + ego_speed * last.t, last.track.s))
                    .unwrap_or(current_gap);
                Some((path, current_gap.min(horizon_gap).max(0.0)))
            })
            .fold(None, |best: Option<(&PredictedPath, f64)>, cur| match best {
                Some(b) if b.1 <= cur.1 => Some(b),
                _ => Some(cur),
            })
    }

    /// Whether a vehicle in `lane` currently sits within `min_gap` of `ego_s`,
    /// ahead or behind
    pub fn gap_occupied(&self, lane: usize, ego_s: f64, min_gap: f64, track: &dyn TrackFrame) -> bool {
        self.in_lane(lane)
            .any(|path| track.s_distance(ego_s, path.initial.s).abs() < min_gap)
    }
}

/// Constant-velocity, constant-lane predictor
#[derive(Debug, Clone)]
pub struct ConstantVelocityPredictor {
    points: usize,
    dt: f64,
}

impl ConstantVelocityPredictor {
    pub fn new(points: usize, dt: f64) -> Self {
        Self { points, dt }
    }

    pub fn from_config(horizon: &HorizonConfig) -> Self {
        Self::new(horizon.points, horizon.dt)
    }

    pub fn predict_one(
        &self,
        observation: &TrafficObservation,
        track: &dyn TrackFrame,
    ) -> PredictedPath {
        let samples = (1..=self.points)
            .map(|k| {
                let t = k as f64 * self.dt;
                let s = track.wrap_s(observation.track.s + observation.speed * t);
                let d = observation.track.d;
                PredictedSample {
                    t,
                    track: TrackPosition::new(s, d),
                    position: track.to_cartesian(s, d).position(),
                }
            })
            .collect();

        PredictedPath {
            id: observation.id,
            lane: observation.lane,
            speed: observation.speed,
            initial: observation.track,
            samples,
        }
    }
}

impl MotionPredictor for ConstantVelocityPredictor {
    fn predict(
        &self,
        observations: &[TrafficObservation],
        track: &dyn TrackFrame,
    ) -> Predictions {
        Predictions::new(
            observations
                .iter()
                .map(|obs| self.predict_one(obs, track))
                .collect(),
        )
    }
}

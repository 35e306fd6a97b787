//! Ego vehicle state carried across ticks.

use std::collections::VecDeque;

use log::trace;

use crate::common::{Pose, PlannerResult, TrackFrame, TrackPosition};

use super::behavior::Target;
use super::config::RoadConfig;
use super::observation::EgoObservation;

/// Number of lane samples kept in the history
pub const LANE_HISTORY_LEN: usize = 30;

/// Fixed-length FIFO of recently occupied lanes, one sample per tick
#[derive(Debug, Clone, PartialEq)]
pub struct LaneHistory {
    samples: VecDeque<usize>,
    capacity: usize,
}

impl LaneHistory {
    /// A full history where every sample is `lane`
    pub fn filled(capacity: usize, lane: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: std::iter::repeat(lane).take(capacity).collect(),
            capacity,
        }
    }

    /// Push the newest sample, dropping the oldest one
    pub fn push(&mut self, lane: usize) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(lane);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True when every sample in the window is `lane`
    pub fn is_settled_in(&self, lane: usize) -> bool {
        self.samples.iter().all(|&l| l == lane)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EgoState {
    pub pose: Pose,
    pub track: TrackPosition,
    pub lane: usize,
    /// Measured speed [m/s]
    pub speed: f64,
    /// Target speed chosen on the previous tick [m/s]
    pub target_speed: f64,
    lane_history: LaneHistory,
}

impl EgoState {
    /// State before the first telemetry message arrives
    pub fn new(initial_lane: usize) -> Self {
        Self {
            pose: Pose::new(0.0, 0.0, 0.0),
            track: TrackPosition::new(0.0, 0.0),
            lane: initial_lane,
            speed: 0.0,
            target_speed: 0.0,
            lane_history: LaneHistory::filled(LANE_HISTORY_LEN, initial_lane),
        }
    }

    /// Refresh pose, track position, lane and speed from telemetry.
    /// The lane history is left for [`EgoState::commit`].
    pub fn observe(
        &mut self,
        observation: &EgoObservation,
        track: &dyn TrackFrame,
        road: &RoadConfig,
    ) -> PlannerResult<()> {
        observation.validate()?;
        self.pose = observation.pose;
        self.speed = observation.speed;
        self.track = track.to_track(&observation.pose);
        self.lane = road.lane_clamped(self.track.d);
        trace!(
            "ego s={:.2} d={:.2} lane={} v={:.2}",
            self.track.s,
            self.track.d,
            self.lane,
            self.speed
        );
        Ok(())
    }

    /// Record the tick's decision: remember the target speed and push the
    /// lane occupied during this tick.
    pub fn commit(&mut self, target: &Target) {
        self.target_speed = target.speed;
        self.lane_history.push(self.lane);
    }

    pub fn lane_history(&self) -> &LaneHistory {
        &self.lane_history
    }
}

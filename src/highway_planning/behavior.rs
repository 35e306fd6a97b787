//! Behavior layer: which lane to aim for and how fast.
//!
//! A one-step decision: from the current lane the ego may keep it or move to
//! an adjacent lane. Every tick the generator lists the behaviors that are
//! structurally possible and not blocked right now, each with a target speed
//! derived from the traffic ahead in that lane.

use std::fmt;

use log::debug;

use crate::common::TrackFrame;

use super::config::PlannerConfig;
use super::ego::EgoState;
use super::prediction::Predictions;

/// Lateral intent of a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Behavior {
    KeepLane,
    ChangeLeft,
    ChangeRight,
}

impl Behavior {
    /// Generation order, which is also the tie-break order
    pub const ALL: [Behavior; 3] = [Behavior::KeepLane, Behavior::ChangeLeft, Behavior::ChangeRight];

    /// Lane this behavior leads to from `current`, None if it leaves the road
    pub fn target_lane(self, current: usize, lane_count: usize) -> Option<usize> {
        let lane = match self {
            Behavior::KeepLane => Some(current),
            Behavior::ChangeLeft => current.checked_sub(1),
            Behavior::ChangeRight => current.checked_add(1),
        }?;
        if lane < lane_count {
            Some(lane)
        } else {
            None
        }
    }

    pub fn is_lane_change(self) -> bool {
        !matches!(self, Behavior::KeepLane)
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Behavior::KeepLane => "keep-lane",
            Behavior::ChangeLeft => "change-left",
            Behavior::ChangeRight => "change-right",
        };
        write!(f, "{}", name)
    }
}

/// A candidate decision: behavior, lane and target speed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub behavior: Behavior,
    pub lane: usize,
    /// [m/s]
    pub speed: f64,
}

impl Target {
    pub fn new(behavior: Behavior, lane: usize, speed: f64) -> Self {
        Self {
            behavior,
            lane,
            speed,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (lane {}, {:.2} m/s)", self.behavior, self.lane, self.speed)
    }
}

pub struct BehaviorGenerator<'a> {
    config: &'a PlannerConfig,
    track: &'a dyn TrackFrame,
}

impl<'a> BehaviorGenerator<'a> {
    pub fn new(config: &'a PlannerConfig, track: &'a dyn TrackFrame) -> Self {
        Self { config, track }
    }

    /// Candidates in fixed order: keep lane, then left, then right.
    /// Keep-lane is always present.
    pub fn targets(&self, ego: &EgoState, predictions: &Predictions) -> Vec<Target> {
        let lane_count = self.config.road.lane_count;
        let mut targets = Vec::with_capacity(Behavior::ALL.len());

        for behavior in Behavior::ALL {
            let lane = match behavior.target_lane(ego.lane, lane_count) {
                Some(lane) => lane,
                None => continue,
            };
            let min_gap = self.config.safety.lane_change_min_gap;
            if behavior.is_lane_change()
                && predictions.gap_occupied(lane, ego.track.s, min_gap, self.track)
            {
                debug!("{} into lane {} blocked by adjacent traffic", behavior, lane);
                continue;
            }
            let speed = self.lane_speed(lane, ego, predictions);
            targets.push(Target::new(behavior, lane, speed));
        }

        targets
    }

    /// Free-flow limit, reduced when a leader sits inside the safety buffer
    pub fn lane_speed(&self, lane: usize, ego: &EgoState, predictions: &Predictions) -> f64 {
        let limit = self.config.road.speed_limit;
        let buffer = self.config.safety.safety_buffer;

        match predictions.leader(lane, ego.track.s, ego.speed, self.track) {
            Some((leader, gap)) if gap < buffer => {
                let scale = (gap / buffer).clamp(0.5, 1.0);
                (leader.speed.max(0.0) * scale).min(limit)
            }
            _ => limit,
        }
    }
}

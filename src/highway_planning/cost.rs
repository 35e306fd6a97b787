//! Candidate scoring.
//!
//! Every term is normalized to [0, 1] and weighted by [`CostWeights`]; the
//! weighted sum is what the selector minimizes. Trajectory point `i` is
//! compared with prediction sample `i`, both taken `(i + 1) * dt` from now.

use std::fmt;

use crate::common::{Point2D, Pose, TrackFrame, TrackPosition};

use super::config::{CostWeights, PlannerConfig};
use super::ego::EgoState;
use super::prediction::Predictions;
use super::trajectory::CandidateTrajectory;

/// Ramp height reached just before a gap collapses to the collision radius
const PROXIMITY_SCALE: f64 = 0.9;

/// Unweighted cost terms of one candidate
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CostBreakdown {
    /// Proximity to predicted traffic, 1.0 on collision
    pub collision: f64,
    /// 1.0 when the candidate leaves the current lane
    pub lane_change: f64,
    /// Shortfall of the target speed below the limit
    pub efficiency: f64,
    /// 1.0 when the candidate leaves the drivable lanes
    pub legality: f64,
    /// Excess of total acceleration over the comfort bound
    pub comfort: f64,
    /// 1.0 for a lane change right after the previous one
    pub settling: f64,
}

impl CostBreakdown {
    pub fn total(&self, weights: &CostWeights) -> f64 {
        weights.collision * self.collision
            + weights.lane_change * self.lane_change
            + weights.efficiency * self.efficiency
            + weights.legality * self.legality
            + weights.comfort * self.comfort
            + weights.settling * self.settling
    }
}

impl fmt::Display for CostBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "collision={:.3} lane_change={:.0} efficiency={:.3} legality={:.0} comfort={:.3} settling={:.0}",
            self.collision, self.lane_change, self.efficiency, self.legality, self.comfort, self.settling
        )
    }
}

/// Penalty for a free distance of `distance` against a desired `buffer`.
///
/// Zero at or beyond the buffer, growing quadratically up to 0.9 as the
/// distance shrinks toward `radius`, and 1.0 at or inside it.
pub fn proximity_penalty(distance: f64, buffer: f64, radius: f64) -> f64 {
    if distance <= radius {
        return 1.0;
    }
    if distance >= buffer {
        return 0.0;
    }
    let x = (buffer - distance) / (buffer - radius);
    PROXIMITY_SCALE * x * x
}

pub struct CostEvaluator<'a> {
    config: &'a PlannerConfig,
    track: &'a dyn TrackFrame,
}

impl<'a> CostEvaluator<'a> {
    pub fn new(config: &'a PlannerConfig, track: &'a dyn TrackFrame) -> Self {
        Self { config, track }
    }

    pub fn evaluate(
        &self,
        candidate: &CandidateTrajectory,
        ego: &EgoState,
        predictions: &Predictions,
    ) -> CostBreakdown {
        let target = &candidate.target;
        let frenet = self.frenet(candidate.points());
        let lane_change = target.lane != ego.lane;

        CostBreakdown {
            collision: self.collision(candidate, &frenet, predictions),
            lane_change: if lane_change { 1.0 } else { 0.0 },
            efficiency: self.efficiency(target.speed),
            legality: self.legality(target.lane, &frenet),
            comfort: self.comfort(candidate.points()),
            settling: if lane_change && !ego.lane_history().is_settled_in(ego.lane) {
                1.0
            } else {
                0.0
            },
        }
    }

    fn frenet(&self, points: &[Point2D]) -> Vec<TrackPosition> {
        let mut yaw = 0.0;
        points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                if let Some(next) = points.get(i + 1) {
                    yaw = (next.y - p.y).atan2(next.x - p.x);
                }
                self.track.to_track(&Pose::new(p.x, p.y, yaw))
            })
            .collect()
    }

    /// Worst proximity over all samples. Any vehicle overlapping the ego
    /// laterally within the collision radius counts; buffers apply to
    /// vehicles in the target lane, and the rear buffer only while merging
    /// into it.
    fn collision(
        &self,
        candidate: &CandidateTrajectory,
        frenet: &[TrackPosition],
        predictions: &Predictions,
    ) -> f64 {
        let safety = &self.config.safety;
        let merging = candidate.target.behavior.is_lane_change();
        let mut worst: f64 = 0.0;

        for path in predictions.iter() {
            let in_target_lane = path.lane == Some(candidate.target.lane);
            for (pos, sample) in frenet.iter().zip(path.samples.iter()) {
                let gap = self.track.s_distance(pos.s, sample.track.s);
                if self.overlaps(gap, pos.d - sample.track.d) {
                    return 1.0;
                }
                if !in_target_lane {
                    continue;
                }
                let penalty = if gap >= 0.0 {
                    proximity_penalty(gap, safety.safety_buffer, safety.collision_radius)
                } else if merging {
                    proximity_penalty(-gap, safety.rear_buffer, safety.collision_radius)
                } else {
                    0.0
                };
                worst = worst.max(penalty);
            }
        }
        worst
    }

    // Same stretch of road and sharing a lane: closer than half a lane
    // laterally and within the collision radius along the track
    fn overlaps(&self, gap: f64, lateral: f64) -> bool {
        gap.abs() <= self.config.safety.collision_radius
            && lateral.abs() < 0.5 * self.config.road.lane_width
    }

    fn efficiency(&self, speed: f64) -> f64 {
        let limit = self.config.road.speed_limit;
        ((limit - speed) / limit).clamp(0.0, 1.0)
    }

    fn legality(&self, lane: usize, frenet: &[TrackPosition]) -> f64 {
        let road = &self.config.road;
        let width = road.road_width();
        let off_road = frenet.iter().any(|p| !(0.0..=width).contains(&p.d));
        if !road.is_legal_lane(lane) || off_road {
            1.0
        } else {
            0.0
        }
    }

    /// Windowed finite differences: velocity over `w` samples, acceleration
    /// from velocities `w` samples apart. The penalty is how far the peak
    /// total acceleration overshoots its bound, saturating at twice the bound.
    fn comfort(&self, points: &[Point2D]) -> f64 {
        let w = self.config.synthesis.comfort_window;
        let span = w as f64 * self.config.horizon.dt;
        if points.len() <= 2 * w {
            return 0.0;
        }

        let velocities: Vec<(f64, f64)> = points
            .iter()
            .zip(&points[w..])
            .map(|(a, b)| ((b.x - a.x) / span, (b.y - a.y) / span))
            .collect();
        let peak = velocities
            .iter()
            .zip(&velocities[w..])
            .map(|(a, b)| ((b.0 - a.0) / span).hypot((b.1 - a.1) / span))
            .fold(0.0, f64::max);

        let ratio = peak / self.config.limits.max_total_acceleration;
        (ratio - 1.0).clamp(0.0, 1.0)
    }
}

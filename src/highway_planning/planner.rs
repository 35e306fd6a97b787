//! Per-tick entry point tying the pipeline together:
//! observe -> predict -> generate targets -> synthesize -> score -> select.

use log::{debug, info, warn};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::common::{PlannerResult, TrackFrame};

use super::behavior::{Behavior, BehaviorGenerator, Target};
use super::config::PlannerConfig;
use super::continuation::ContinuationBuffer;
use super::cost::{CostBreakdown, CostEvaluator};
use super::ego::EgoState;
use super::observation::{EgoObservation, TrafficObservation};
use super::prediction::{ConstantVelocityPredictor, MotionPredictor, Predictions};
use super::selector::{select, ScoredCandidate};
use super::track::WaypointTrack;
use super::trajectory::TrajectorySynthesizer;

/// Result of one planning tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    /// Trajectory handed to the controller
    pub trajectory: ContinuationBuffer,
    /// Target lane of the chosen candidate
    pub lane: usize,
    /// Target speed of the chosen candidate [m/s]
    pub target_speed: f64,
    pub behavior: Behavior,
    pub cost: CostBreakdown,
    pub candidates_evaluated: usize,
    /// Weighted total of every scored candidate, in generation order
    pub scores: Vec<(Target, f64)>,
    /// True when the previous trajectory was re-emitted after a bad input
    pub held: bool,
}

pub struct Planner<T: TrackFrame = WaypointTrack> {
    config: PlannerConfig,
    track: T,
    predictor: Box<dyn MotionPredictor>,
}

impl<T: TrackFrame> Planner<T> {
    /// Planner with the constant-velocity predictor
    pub fn new(config: PlannerConfig, track: T) -> PlannerResult<Self> {
        let predictor = Box::new(ConstantVelocityPredictor::from_config(&config.horizon));
        Self::with_predictor(config, track, predictor)
    }

    pub fn with_predictor(
        config: PlannerConfig,
        track: T,
        predictor: Box<dyn MotionPredictor>,
    ) -> PlannerResult<Self> {
        config.validate()?;
        info!(
            "planner ready: {} lanes, {:.1} m/s limit, {} points over {:.2} s",
            config.road.lane_count,
            config.road.speed_limit,
            config.horizon.points,
            config.horizon.duration()
        );
        Ok(Self {
            config,
            track,
            predictor,
        })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn track(&self) -> &T {
        &self.track
    }

    /// Run one planning cycle.
    ///
    /// All inputs are validated before `ego` is touched, so on error the
    /// state is exactly as it was.
    pub fn plan_tick(
        &self,
        ego: &mut EgoState,
        observation: &EgoObservation,
        buffer: &ContinuationBuffer,
        traffic: &[TrafficObservation],
    ) -> PlannerResult<TickOutput> {
        observation.validate()?;
        buffer.validate()?;
        for vehicle in traffic {
            vehicle.validate()?;
        }
        ego.observe(observation, &self.track, &self.config.road)?;

        let predictions = self.predictor.predict(traffic, &self.track);
        let targets = BehaviorGenerator::new(&self.config, &self.track).targets(ego, &predictions);
        let candidates = self.score_all(&targets, ego, buffer, &predictions);
        let candidates_evaluated = candidates.len();
        let scores: Vec<(Target, f64)> = candidates
            .iter()
            .map(|c| (c.trajectory.target, c.total))
            .collect();

        let best = select(candidates, ego)?;
        let target = best.trajectory.target;
        debug!(
            "selected {} at s={:.1} total={:.3}",
            target, ego.track.s, best.total
        );

        Ok(TickOutput {
            trajectory: ContinuationBuffer::from(best.trajectory.path),
            lane: target.lane,
            target_speed: target.speed,
            behavior: target.behavior,
            cost: best.cost,
            candidates_evaluated,
            scores,
            held: false,
        })
    }

    /// Like [`Planner::plan_tick`], but a recoverable error re-emits the
    /// previous trajectory instead of failing the cycle.
    ///
    /// With an empty `buffer` there is nothing to hold and the error is
    /// returned as is.
    pub fn plan_or_hold(
        &self,
        ego: &mut EgoState,
        observation: &EgoObservation,
        buffer: &ContinuationBuffer,
        traffic: &[TrafficObservation],
    ) -> PlannerResult<TickOutput> {
        match self.plan_tick(ego, observation, buffer, traffic) {
            Err(e) if e.is_recoverable() && !buffer.is_empty() => {
                warn!("holding previous trajectory: {}", e);
                Ok(TickOutput {
                    trajectory: buffer.clone(),
                    lane: ego.lane,
                    target_speed: ego.target_speed,
                    behavior: Behavior::KeepLane,
                    cost: CostBreakdown::default(),
                    candidates_evaluated: 0,
                    scores: Vec::new(),
                    held: true,
                })
            }
            other => other,
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn score_all(
        &self,
        targets: &[Target],
        ego: &EgoState,
        buffer: &ContinuationBuffer,
        predictions: &Predictions,
    ) -> Vec<ScoredCandidate> {
        targets
            .iter()
            .map(|t| self.score(t, ego, buffer, predictions))
            .collect()
    }

    // collect() on an indexed parallel iterator keeps generation order
    #[cfg(feature = "parallel")]
    fn score_all(
        &self,
        targets: &[Target],
        ego: &EgoState,
        buffer: &ContinuationBuffer,
        predictions: &Predictions,
    ) -> Vec<ScoredCandidate> {
        targets
            .par_iter()
            .map(|t| self.score(t, ego, buffer, predictions))
            .collect()
    }

    fn score(
        &self,
        target: &Target,
        ego: &EgoState,
        buffer: &ContinuationBuffer,
        predictions: &Predictions,
    ) -> ScoredCandidate {
        let trajectory = TrajectorySynthesizer::new(&self.config, &self.track).synthesize(target, ego, buffer);
        let cost = CostEvaluator::new(&self.config, &self.track).evaluate(&trajectory, ego, predictions);
        let total = cost.total(&self.config.weights);
        ScoredCandidate {
            trajectory,
            cost,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{PlannerError, Point2D};

    fn straight() -> WaypointTrack {
        let pts: Vec<Point2D> = (0..=20).map(|i| Point2D::new(i as f64 * 100.0, 0.0)).collect();
        WaypointTrack::new(&pts, false).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = PlannerConfig::default();
        config.horizon.points = 0;
        assert!(matches!(
            Planner::new(config, straight()),
            Err(PlannerError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_first_tick_on_free_road() {
        let planner = Planner::new(PlannerConfig::default(), straight()).unwrap();
        let mut ego = EgoState::new(1);
        let obs = EgoObservation::new(100.0, -6.0, 0.0, 0.0);

        let out = planner
            .plan_tick(&mut ego, &obs, &ContinuationBuffer::new(), &[])
            .unwrap();
        assert!(!out.held);
        assert_eq!(out.behavior, Behavior::KeepLane);
        assert_eq!(out.lane, 1);
        assert_eq!(out.candidates_evaluated, 3);
        assert_eq!(out.trajectory.len(), 50);
        assert_eq!(ego.target_speed, 22.0);
    }

    #[test]
    fn test_bad_input_leaves_state_untouched() {
        let planner = Planner::new(PlannerConfig::default(), straight()).unwrap();
        let mut ego = EgoState::new(1);
        let before = ego.clone();
        let buffer = ContinuationBuffer::from_points(vec![Point2D::new(100.0, -6.0)]);
        let obs = EgoObservation::new(100.0, -6.0, f64::NAN, 10.0);

        assert!(planner.plan_tick(&mut ego, &obs, &buffer, &[]).is_err());
        assert_eq!(ego, before);

        let out = planner.plan_or_hold(&mut ego, &obs, &buffer, &[]).unwrap();
        assert!(out.held);
        assert_eq!(out.trajectory, buffer);
        assert_eq!(ego, before);
    }

    #[test]
    fn test_nothing_to_hold_on_first_tick() {
        let planner = Planner::new(PlannerConfig::default(), straight()).unwrap();
        let mut ego = EgoState::new(1);
        let before = ego.clone();
        let obs = EgoObservation::new(100.0, -6.0, 0.0, f64::NAN);

        let res = planner.plan_or_hold(&mut ego, &obs, &ContinuationBuffer::new(), &[]);
        assert!(matches!(res, Err(PlannerError::InvalidObservation(_))));
        assert_eq!(ego, before);
    }

    #[test]
    fn test_chosen_candidate_is_cheapest() {
        let planner = Planner::new(PlannerConfig::default(), straight()).unwrap();
        let mut ego = EgoState::new(1);
        let obs = EgoObservation::new(100.0, -6.0, 0.0, 15.0);
        let road = &planner.config().road;
        let traffic = [TrafficObservation::new(1, 118.0, -6.0, 10.0, 0.0, planner.track(), road).unwrap()];

        let out = planner
            .plan_tick(&mut ego, &obs, &ContinuationBuffer::new(), &traffic)
            .unwrap();
        assert_eq!(out.scores.len(), out.candidates_evaluated);
        let chosen = out.cost.total(&planner.config().weights);
        assert!(out.scores.iter().any(|(t, total)| t.behavior == out.behavior && *total == chosen));
        assert!(out.scores.iter().all(|(_, total)| chosen <= *total));
    }
}

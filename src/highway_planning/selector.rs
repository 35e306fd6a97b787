//! Candidate selection.

use log::debug;
use ordered_float::OrderedFloat;

use crate::common::{PlannerError, PlannerResult};

use super::cost::CostBreakdown;
use super::ego::EgoState;
use super::trajectory::CandidateTrajectory;

/// A synthesized candidate together with its cost
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub trajectory: CandidateTrajectory,
    pub cost: CostBreakdown,
    pub total: f64,
}

/// Pick the cheapest candidate and commit its target into `ego`.
///
/// Candidates are expected in generation order; on equal totals the earliest
/// one wins. `ego` is untouched when the list is empty.
pub fn select(
    candidates: Vec<ScoredCandidate>,
    ego: &mut EgoState,
) -> PlannerResult<ScoredCandidate> {
    for c in &candidates {
        debug!("candidate {}: total={:.3} [{}]", c.trajectory.target, c.total, c.cost);
    }

    // min_by_key keeps the first of several equal minima
    let best = candidates
        .into_iter()
        .min_by_key(|c| OrderedFloat(c.total))
        .ok_or(PlannerError::NoViableCandidate)?;

    ego.commit(&best.trajectory.target);
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Path2D;
    use crate::highway_planning::behavior::{Behavior, Target};

    fn scored(behavior: Behavior, lane: usize, total: f64) -> ScoredCandidate {
        ScoredCandidate {
            trajectory: CandidateTrajectory {
                target: Target::new(behavior, lane, 20.0),
                path: Path2D::new(),
                reused: 0,
                fallback: false,
            },
            cost: CostBreakdown::default(),
            total,
        }
    }

    #[test]
    fn test_picks_minimum() {
        let mut ego = EgoState::new(1);
        let best = select(
            vec![
                scored(Behavior::KeepLane, 1, 27.8),
                scored(Behavior::ChangeLeft, 0, 1.0),
                scored(Behavior::ChangeRight, 2, 3.0),
            ],
            &mut ego,
        )
        .unwrap();
        assert_eq!(best.trajectory.target.behavior, Behavior::ChangeLeft);
        assert_eq!(ego.target_speed, 20.0);
    }

    #[test]
    fn test_tie_goes_to_first() {
        let mut ego = EgoState::new(1);
        let best = select(
            vec![
                scored(Behavior::KeepLane, 1, 1.0),
                scored(Behavior::ChangeLeft, 0, 1.0),
                scored(Behavior::ChangeRight, 2, 1.0),
            ],
            &mut ego,
        )
        .unwrap();
        assert_eq!(best.trajectory.target.behavior, Behavior::KeepLane);
    }

    #[test]
    fn test_empty_is_an_error() {
        let mut ego = EgoState::new(1);
        let before = ego.clone();
        assert!(matches!(
            select(Vec::new(), &mut ego),
            Err(PlannerError::NoViableCandidate)
        ));
        assert_eq!(ego, before);
    }
}

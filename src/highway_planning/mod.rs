//! Highway motion planning: per-tick lane and trajectory selection for an
//! ego vehicle among surrounding traffic.

pub mod behavior;
pub mod config;
pub mod continuation;
pub mod cost;
pub mod ego;
pub mod observation;
pub mod planner;
pub mod prediction;
pub mod selector;
pub mod track;
pub mod trajectory;

pub use behavior::{Behavior, BehaviorGenerator, Target};
pub use config::PlannerConfig;
pub use continuation::ContinuationBuffer;
pub use cost::{CostBreakdown, CostEvaluator};
pub use ego::{EgoState, LaneHistory};
pub use observation::{EgoObservation, TrafficObservation};
pub use planner::{Planner, TickOutput};
pub use prediction::{ConstantVelocityPredictor, MotionPredictor, PredictedPath, Predictions};
pub use selector::{select, ScoredCandidate};
pub use track::WaypointTrack;
pub use trajectory::{CandidateTrajectory, TrajectorySynthesizer};

//! HighwayPlanner - per-tick motion planning for a vehicle on a multi-lane road
//!
//! This crate provides the track model, traffic prediction, behavior
//! generation, trajectory synthesis, cost evaluation and candidate selection
//! that together turn one telemetry message into a short trajectory.

// Core modules
pub mod common;
pub mod utils;

// Algorithm modules
pub mod path_planning;
pub mod highway_planning;

// Re-export common types for convenience
pub use common::{Path2D, Point2D, Pose, TrackPosition};
pub use common::{TrackFrame, Visualizable};
pub use common::{PlannerError, PlannerResult};
pub use highway_planning::{
    ContinuationBuffer, EgoObservation, EgoState, Planner, PlannerConfig, TickOutput,
    TrafficObservation, WaypointTrack,
};

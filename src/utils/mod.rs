//! Utility modules for highway_planner

pub mod visualization;

pub use visualization::{colors, HighwayScene, PathStyle, PointStyle};

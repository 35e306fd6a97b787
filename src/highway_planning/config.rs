//! Planner configuration.
//!
//! All tuning constants consumed by the pipeline, grouped in sections and
//! loadable from a single YAML file. Missing sections or fields fall back to
//! the defaults below, which are calibrated for a three-lane highway with a
//! 50 mph limit sampled at 50 Hz.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::{PlannerError, PlannerResult};

/// Full planner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlannerConfig {
    /// Output / prediction sampling
    #[serde(default)]
    pub horizon: HorizonConfig,

    /// Reuse of the previous trajectory
    #[serde(default)]
    pub continuation: ContinuationConfig,

    /// Lane layout and speed limit
    #[serde(default)]
    pub road: RoadConfig,

    /// Acceleration / jerk bounds
    #[serde(default)]
    pub limits: ComfortLimits,

    /// Distances used by behavior and cost
    #[serde(default)]
    pub safety: SafetyConfig,

    /// Trajectory synthesis tuning
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Cost term weights
    #[serde(default)]
    pub weights: CostWeights,
}

impl PlannerConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> PlannerResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate from a YAML string
    pub fn from_yaml(yaml: &str) -> PlannerResult<Self> {
        let config: PlannerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> PlannerResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> PlannerResult<()> {
        let invalid = |msg: &str| Err(PlannerError::InvalidParameter(msg.to_string()));

        if self.horizon.points == 0 {
            return invalid("horizon.points must be positive");
        }
        if !(self.horizon.dt > 0.0) {
            return invalid("horizon.dt must be positive");
        }
        if self.continuation.reuse >= self.horizon.points {
            return invalid("continuation.reuse must be smaller than horizon.points");
        }
        if self.road.lane_count == 0 {
            return invalid("road.lane_count must be positive");
        }
        if !(self.road.lane_width > 0.0) {
            return invalid("road.lane_width must be positive");
        }
        if !(self.road.speed_limit > 0.0) {
            return invalid("road.speed_limit must be positive");
        }
        if !(self.limits.max_acceleration > 0.0)
            || !(self.limits.max_total_acceleration > 0.0)
            || !(self.limits.max_jerk > 0.0)
        {
            return invalid("acceleration and jerk limits must be positive");
        }
        if !(self.safety.collision_radius > 0.0) {
            return invalid("safety.collision_radius must be positive");
        }
        if self.safety.safety_buffer <= self.safety.collision_radius
            || self.safety.rear_buffer <= self.safety.collision_radius
        {
            return invalid("safety buffers must exceed the collision radius");
        }
        if !(self.synthesis.anchor_spacing > 0.0) || self.synthesis.anchor_count == 0 {
            return invalid("synthesis anchors must be positive");
        }
        if self.synthesis.comfort_window == 0 {
            return invalid("synthesis.comfort_window must be positive");
        }
        if !self.weights.all_non_negative() {
            return invalid("cost weights must be non-negative");
        }
        Ok(())
    }
}

/// Output length and time step; predictions share the same sampling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonConfig {
    /// Points per emitted trajectory (also predicted samples per vehicle)
    pub points: usize,
    /// Time between consecutive points [s]
    pub dt: f64,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            points: 50,
            dt: 0.02,
        }
    }
}

impl HorizonConfig {
    /// Covered time span [s]
    pub fn duration(&self) -> f64 {
        self.points as f64 * self.dt
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuationConfig {
    /// Upper bound on previous-trajectory points kept verbatim
    pub reuse: usize,
}

impl Default for ContinuationConfig {
    fn default() -> Self {
        // ~100 ms at 50 Hz
        Self { reuse: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadConfig {
    /// Lane width [m]
    pub lane_width: f64,
    /// Number of lanes, lane 0 next to the centerline
    pub lane_count: usize,
    /// Free-flow speed limit [m/s]
    pub speed_limit: f64,
}

impl Default for RoadConfig {
    fn default() -> Self {
        Self {
            lane_width: 4.0,
            lane_count: 3,
            speed_limit: 22.0,
        }
    }
}

impl RoadConfig {
    /// Lane containing lateral offset `d`, None when off the road
    pub fn lane_of(&self, d: f64) -> Option<usize> {
        if !d.is_finite() || d < 0.0 {
            return None;
        }
        let lane = (d / self.lane_width).floor() as usize;
        if lane < self.lane_count {
            Some(lane)
        } else {
            None
        }
    }

    /// Lane index of `d` clamped into the legal range
    pub fn lane_clamped(&self, d: f64) -> usize {
        if !(d > 0.0) {
            return 0;
        }
        ((d / self.lane_width).floor() as usize).min(self.lane_count - 1)
    }

    /// Lateral offset of a lane center
    pub fn lane_center(&self, lane: usize) -> f64 {
        (lane as f64 + 0.5) * self.lane_width
    }

    pub fn is_legal_lane(&self, lane: usize) -> bool {
        lane < self.lane_count
    }

    /// Total drivable width [m]
    pub fn road_width(&self) -> f64 {
        self.lane_count as f64 * self.lane_width
    }
}

/// Kinematic bounds on the generated motion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComfortLimits {
    /// Longitudinal speed ramp bound [m/s²]
    pub max_acceleration: f64,
    /// Bound on total (longitudinal + lateral) acceleration [m/s²]
    pub max_total_acceleration: f64,
    /// Jerk bound [m/s³]
    pub max_jerk: f64,
}

impl Default for ComfortLimits {
    fn default() -> Self {
        Self {
            max_acceleration: 5.0,
            max_total_acceleration: 10.0,
            max_jerk: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Desired free distance ahead [m]
    pub safety_buffer: f64,
    /// Desired free distance behind when merging into a lane [m]
    pub rear_buffer: f64,
    /// Longitudinal distance treated as a collision between vehicles less
    /// than half a lane apart laterally [m]
    pub collision_radius: f64,
    /// A lane change is not generated while a vehicle in the target lane is
    /// within this distance of the ego, ahead or behind [m]
    pub lane_change_min_gap: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            safety_buffer: 30.0,
            rear_buffer: 10.0,
            collision_radius: 4.0,
            lane_change_min_gap: 6.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Spacing of the far anchors along the track [m]
    pub anchor_spacing: f64,
    /// Number of far anchors
    pub anchor_count: usize,
    /// Minimum local-frame x spacing between consecutive anchors [m]
    pub min_anchor_spacing: f64,
    /// Samples per finite-difference window in the comfort check
    pub comfort_window: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            anchor_spacing: 30.0,
            anchor_count: 3,
            min_anchor_spacing: 0.05,
            comfort_window: 10,
        }
    }
}

/// Weights of the normalized cost terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostWeights {
    pub collision: f64,
    pub lane_change: f64,
    pub efficiency: f64,
    pub legality: f64,
    pub comfort: f64,
    pub settling: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            collision: 100.0,
            lane_change: 1.0,
            efficiency: 10.0,
            legality: 1000.0,
            comfort: 5.0,
            settling: 2.0,
        }
    }
}

impl CostWeights {
    fn all_non_negative(&self) -> bool {
        [
            self.collision,
            self.lane_change,
            self.efficiency,
            self.legality,
            self.comfort,
            self.settling,
        ]
        .iter()
        .all(|w| *w >= 0.0)
    }
}

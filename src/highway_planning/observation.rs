//! Validated telemetry inputs.
//!
//! The transport layer hands over raw numbers; everything here checks them
//! before they reach the pipeline so that a malformed message turns into an
//! [`PlannerError::InvalidObservation`] instead of a NaN trajectory.

use crate::common::{Point2D, Pose, PlannerError, PlannerResult, TrackFrame, TrackPosition};

use super::config::RoadConfig;

pub const MPH_TO_MPS: f64 = 0.44704;

/// Columns of a sensor-fusion row: id, x, y, vx, vy, s, d
pub const SENSOR_FUSION_COLUMNS: usize = 7;

fn require_finite(name: &str, value: f64) -> PlannerResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PlannerError::InvalidObservation(format!(
            "{} is not finite ({})",
            name, value
        )))
    }
}

/// Ego localization for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EgoObservation {
    pub pose: Pose,
    /// Speed [m/s]
    pub speed: f64,
}

impl EgoObservation {
    pub fn new(x: f64, y: f64, yaw: f64, speed: f64) -> Self {
        Self {
            pose: Pose::new(x, y, yaw),
            speed,
        }
    }

    /// Simulator units: yaw in degrees, speed in mph
    pub fn from_telemetry(x: f64, y: f64, yaw_deg: f64, speed_mph: f64) -> Self {
        Self::new(x, y, yaw_deg.to_radians(), speed_mph * MPH_TO_MPS)
    }

    pub fn validate(&self) -> PlannerResult<()> {
        require_finite("ego x", self.pose.x)?;
        require_finite("ego y", self.pose.y)?;
        require_finite("ego yaw", self.pose.yaw)?;
        require_finite("ego speed", self.speed)?;
        if self.speed < 0.0 {
            return Err(PlannerError::InvalidObservation(format!(
                "ego speed is negative ({})",
                self.speed
            )));
        }
        Ok(())
    }
}

/// One neighboring vehicle as reported by sensor fusion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficObservation {
    pub id: i64,
    pub position: Point2D,
    pub vx: f64,
    pub vy: f64,
    pub track: TrackPosition,
    /// Speed along the track direction [m/s]
    pub speed: f64,
    /// None while the vehicle is off the drivable lanes
    pub lane: Option<usize>,
}

impl TrafficObservation {
    pub fn new(
        id: i64,
        x: f64,
        y: f64,
        vx: f64,
        vy: f64,
        track: &dyn TrackFrame,
        road: &RoadConfig,
    ) -> PlannerResult<Self> {
        require_finite("vehicle x", x)?;
        require_finite("vehicle y", y)?;
        require_finite("vehicle vx", vx)?;
        require_finite("vehicle vy", vy)?;

        let heading = vy.atan2(vx);
        let track_pos = track.to_track(&Pose::new(x, y, heading));
        let centerline_yaw = track.to_cartesian(track_pos.s, 0.0).yaw;
        let speed = vx * centerline_yaw.cos() + vy * centerline_yaw.sin();

        Ok(Self {
            id,
            position: Point2D::new(x, y),
            vx,
            vy,
            track: track_pos,
            speed,
            lane: road.lane_of(track_pos.d),
        })
    }

    /// Build from a `[id, x, y, vx, vy, s, d]` row. The reported s and d are
    /// recomputed through `track` so every vehicle shares the ego's frame.
    pub fn from_sensor_fusion(
        row: &[f64],
        track: &dyn TrackFrame,
        road: &RoadConfig,
    ) -> PlannerResult<Self> {
        if row.len() < SENSOR_FUSION_COLUMNS {
            return Err(PlannerError::InvalidObservation(format!(
                "sensor fusion row has {} columns, expected {}",
                row.len(),
                SENSOR_FUSION_COLUMNS
            )));
        }
        let id = require_finite("vehicle id", row[0])?;
        Self::new(id as i64, row[1], row[2], row[3], row[4], track, road)
    }

    pub fn validate(&self) -> PlannerResult<()> {
        if !self.position.is_finite()
            || !self.vx.is_finite()
            || !self.vy.is_finite()
            || !self.track.s.is_finite()
            || !self.track.d.is_finite()
            || !self.speed.is_finite()
        {
            return Err(PlannerError::InvalidObservation(format!(
                "vehicle {} has non-finite state",
                self.id
            )));
        }
        Ok(())
    }
}

/// Convert every sensor-fusion row, failing on the first malformed one
pub fn parse_sensor_fusion(
    rows: &[Vec<f64>],
    track: &dyn TrackFrame,
    road: &RoadConfig,
) -> PlannerResult<Vec<TrafficObservation>> {
    rows.iter()
        .map(|row| TrafficObservation::from_sensor_fusion(row, track, road))
        .collect()
}

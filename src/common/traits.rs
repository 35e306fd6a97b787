//! Common traits defining the seams of the planning pipeline

use crate::common::types::*;

/// Conversion between the Cartesian frame and the track frame.
///
/// Both directions are total over the drivable corridor. Outside of it the
/// result is whatever the implementation extrapolates to.
pub trait TrackFrame: Send + Sync {
    /// Cartesian pose to (s, d)
    fn to_track(&self, pose: &Pose) -> TrackPosition;

    /// (s, d) to a Cartesian pose whose yaw follows the centerline heading
    fn to_cartesian(&self, s: f64, d: f64) -> Pose;

    /// Centerline length [m]
    fn length(&self) -> f64;

    /// Whether s wraps around at `length()`
    fn is_closed(&self) -> bool {
        true
    }

    /// Map s into [0, length) on closed tracks
    fn wrap_s(&self, s: f64) -> f64 {
        let length = self.length();
        if self.is_closed() && length > 0.0 {
            s.rem_euclid(length)
        } else {
            s
        }
    }

    /// Signed distance along the track from `from` to `to`. On closed tracks
    /// the shorter way round is taken, so the result lies in (-L/2, L/2].
    fn s_distance(&self, from: f64, to: f64) -> f64 {
        let diff = to - from;
        let length = self.length();
        if !self.is_closed() || length <= 0.0 {
            return diff;
        }
        let mut wrapped = diff.rem_euclid(length);
        if wrapped > length / 2.0 {
            wrapped -= length;
        }
        wrapped
    }
}

/// Things that can draw themselves into a highway scene
pub trait Visualizable {
    fn visualize(&self, scene: &mut crate::utils::HighwayScene);
}

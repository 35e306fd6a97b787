//! Trajectory synthesis
//!
//! Turns a [`Target`] into a point sequence sampled every `dt`:
//!
//! 1. the first points of the continuation buffer are copied verbatim;
//! 2. a sparse set of anchors is placed: the last two reused points (or the
//!    ego pose and a point behind it) followed by far points on the target
//!    lane center;
//! 3. anchors are expressed in the frame of the reference point, a cubic
//!    spline y(x) is fit through them and walked with a speed profile that
//!    ramps toward the target speed under the acceleration and jerk bounds;
//! 4. samples are transformed back to the map frame.
//!
//! When the anchors do not form a usable spline (local x not increasing,
//! typically at near-standstill) the new points extend the reference
//! heading in a straight line instead.

use itertools::Itertools;
use log::debug;
use nalgebra::{Isometry2, Point2, Vector2};

use crate::common::{Path2D, Point2D, Pose, TrackFrame};
use crate::path_planning::Spline;

use super::behavior::Target;
use super::config::{ComfortLimits, PlannerConfig};
use super::continuation::ContinuationBuffer;
use super::ego::EgoState;

/// Distance of the synthesized anchor behind the ego when no history exists [m]
const BEHIND_ANCHOR_DISTANCE: f64 = 1.0;

/// A synthesized trajectory for one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateTrajectory {
    pub target: Target,
    pub path: Path2D,
    /// Number of leading points copied from the continuation buffer
    pub reused: usize,
    /// True when the straight-line fallback produced the new points
    pub fallback: bool,
}

impl CandidateTrajectory {
    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub fn points(&self) -> &[Point2D] {
        &self.path.points
    }
}

/// Where the new part of the trajectory starts
#[derive(Debug, Clone, Copy)]
struct Reference {
    pose: Pose,
    behind: Point2D,
    speed: f64,
    acceleration: f64,
}

pub struct TrajectorySynthesizer<'a> {
    config: &'a PlannerConfig,
    track: &'a dyn TrackFrame,
}

impl<'a> TrajectorySynthesizer<'a> {
    pub fn new(config: &'a PlannerConfig, track: &'a dyn TrackFrame) -> Self {
        Self { config, track }
    }

    pub fn synthesize(
        &self,
        target: &Target,
        ego: &EgoState,
        buffer: &ContinuationBuffer,
    ) -> CandidateTrajectory {
        let total = self.config.horizon.points;
        let dt = self.config.horizon.dt;
        let prefix = buffer.prefix(self.config.continuation.reuse);

        let mut path = Path2D::with_capacity(total);
        path.points.extend_from_slice(prefix);

        let reference = self.reference(prefix, ego);
        let speeds = speed_profile(
            reference.speed,
            reference.acceleration,
            target.speed,
            &self.config.limits,
            dt,
            total - prefix.len(),
        );

        let frame = Isometry2::new(
            Vector2::new(reference.pose.x, reference.pose.y),
            reference.pose.yaw,
        );
        let (local, fallback) = match self.local_spline(&reference, target, &frame) {
            Some(spline) => (walk_spline(&spline, &speeds, dt), false),
            None => {
                debug!(
                    "degenerate anchors for {}, extending heading {:.3} rad",
                    target, reference.pose.yaw
                );
                (extend_linear(&speeds, dt), true)
            }
        };
        path.points
            .extend(local.iter().map(|p| Point2D::from(frame.transform_point(p))));

        CandidateTrajectory {
            target: *target,
            path,
            reused: prefix.len(),
            fallback,
        }
    }

    fn reference(&self, prefix: &[Point2D], ego: &EgoState) -> Reference {
        let dt = self.config.horizon.dt;
        let min_spacing = self.config.synthesis.min_anchor_spacing;

        match prefix {
            [.., prev, last] => {
                let spacing = last.distance(prev);
                // heading from nearly coincident points is noise
                let yaw = if spacing >= min_spacing {
                    (last.y - prev.y).atan2(last.x - prev.x)
                } else {
                    ego.pose.yaw
                };
                let acceleration = match prefix {
                    [.., before, prev, _] => (spacing - prev.distance(before)) / (dt * dt),
                    _ => 0.0,
                };
                Reference {
                    pose: Pose::new(last.x, last.y, yaw),
                    behind: *prev,
                    speed: spacing / dt,
                    acceleration,
                }
            }
            [only] => {
                let pose = Pose::new(only.x, only.y, ego.pose.yaw);
                Reference {
                    pose,
                    behind: pose.project(-BEHIND_ANCHOR_DISTANCE),
                    speed: ego.speed,
                    acceleration: 0.0,
                }
            }
            [] => Reference {
                pose: ego.pose,
                behind: ego.pose.project(-BEHIND_ANCHOR_DISTANCE),
                speed: ego.speed,
                acceleration: 0.0,
            },
        }
    }

    /// Spline through the anchors in the reference frame, None when the
    /// anchors are degenerate.
    fn local_spline(
        &self,
        reference: &Reference,
        target: &Target,
        frame: &Isometry2<f64>,
    ) -> Option<Spline> {
        let synthesis = &self.config.synthesis;
        let ref_s = self.track.to_track(&reference.pose).s;
        let lane_d = self.config.road.lane_center(target.lane);

        let far = (1..=synthesis.anchor_count).map(|k| {
            self.track
                .to_cartesian(ref_s + k as f64 * synthesis.anchor_spacing, lane_d)
                .position()
        });
        let local: Vec<Point2<f64>> = [reference.behind, reference.pose.position()]
            .into_iter()
            .chain(far)
            .map(|p| frame.inverse_transform_point(&p.to_na_point()))
            .collect();

        let increasing = local
            .iter()
            .tuple_windows()
            .all(|(a, b)| b.x - a.x >= synthesis.min_anchor_spacing);
        if !increasing {
            return None;
        }

        let xs: Vec<f64> = local.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = local.iter().map(|p| p.y).collect();
        Spline::new(&xs, &ys).ok()
    }
}

/// Speeds for `n` consecutive samples moving from `start` toward `target`.
///
/// Acceleration is bounded by `max_acceleration` and changes by at most
/// `max_jerk * dt` per sample. Near the target the acceleration is capped at
/// sqrt(2 * jerk * |dv|) so it can unwind to zero without overshooting.
/// Speeds never go below zero.
pub fn speed_profile(
    start: f64,
    start_acceleration: f64,
    target: f64,
    limits: &ComfortLimits,
    dt: f64,
    n: usize,
) -> Vec<f64> {
    let max_accel = limits.max_acceleration;
    let jerk_step = limits.max_jerk * dt;
    let mut v = start.max(0.0);
    let mut a = start_acceleration.clamp(-max_accel, max_accel);

    (0..n)
        .map(|_| {
            let dv = target - v;
            let cap = (2.0 * limits.max_jerk * dv.abs()).sqrt().min(max_accel);
            let desired = dv.signum() * cap;
            a += (desired - a).clamp(-jerk_step, jerk_step);

            let next = v + a * dt;
            if (target - next) * dv < 0.0 || dv == 0.0 {
                v = target;
                a = 0.0;
            } else {
                v = next;
            }
            if v < 0.0 {
                v = 0.0;
                a = 0.0;
            }
            v
        })
        .collect()
}

// Step along the spline so each sample advances about v * dt of arc length.
fn walk_spline(spline: &Spline, speeds: &[f64], dt: f64) -> Vec<Point2<f64>> {
    let mut x = 0.0;
    speeds
        .iter()
        .map(|&v| {
            let slope = spline.calcd(x);
            x += v * dt / (1.0 + slope * slope).sqrt();
            Point2::new(x, spline.calc(x))
        })
        .collect()
}

fn extend_linear(speeds: &[f64], dt: f64) -> Vec<Point2<f64>> {
    let mut x = 0.0;
    speeds
        .iter()
        .map(|&v| {
            x += v * dt;
            Point2::new(x, 0.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TrackPosition;
    use crate::highway_planning::behavior::Behavior;
    use crate::highway_planning::track::WaypointTrack;
    use approx::assert_relative_eq;

    fn straight() -> WaypointTrack {
        let pts: Vec<Point2D> = (0..=10).map(|i| Point2D::new(i as f64 * 100.0, 0.0)).collect();
        WaypointTrack::new(&pts, false).unwrap()
    }

    fn ego_at(s: f64, lane: usize, speed: f64, config: &PlannerConfig) -> EgoState {
        let d = config.road.lane_center(lane);
        let mut ego = EgoState::new(lane);
        ego.pose = Pose::new(s, -d, 0.0);
        ego.track = TrackPosition::new(s, d);
        ego.speed = speed;
        ego
    }

    #[test]
    fn test_speed_profile_respects_bounds() {
        let limits = ComfortLimits::default();
        let dt = 0.02;
        let speeds = speed_profile(10.0, 0.0, 22.0, &limits, dt, 200);
        assert_eq!(speeds.len(), 200);
        assert_relative_eq!(speeds[0], 10.0 + limits.max_jerk * dt * dt, epsilon = 1e-9);

        let mut prev_v = 10.0;
        let mut prev_a = 0.0;
        for &v in &speeds {
            let a = (v - prev_v) / dt;
            assert!(a <= limits.max_acceleration + 1e-9, "a = {}", a);
            assert!(a >= -1e-9);
            assert!(v <= 22.0 + 1e-9);
            // the final clamp onto the target may release a small residual
            if v < 22.0 {
                assert!((a - prev_a).abs() <= limits.max_jerk * dt + 1e-9);
            }
            prev_v = v;
            prev_a = a;
        }
        assert_relative_eq!(speeds[199], 22.0, epsilon = 1e-9);
    }

    #[test]
    fn test_speed_profile_braking_and_standstill() {
        let limits = ComfortLimits::default();
        let speeds = speed_profile(20.0, 0.0, 5.0, &limits, 0.02, 50);
        assert!(speeds.windows(2).all(|w| w[1] <= w[0]));
        assert!(speeds.iter().all(|&v| v >= 5.0));

        let speeds = speed_profile(0.0, 0.0, 0.0, &limits, 0.02, 3);
        assert!(speeds.iter().all(|&v| v == 0.0));

        let speeds = speed_profile(22.0, 0.0, 22.0, &limits, 0.02, 3);
        assert!(speeds.iter().all(|&v| v == 22.0));
    }

    #[test]
    fn test_keep_lane_from_empty_buffer() {
        let track = straight();
        let config = PlannerConfig::default();
        let synth = TrajectorySynthesizer::new(&config, &track);
        let ego = ego_at(100.0, 1, 10.0, &config);
        let target = Target::new(Behavior::KeepLane, 1, 22.0);

        let traj = synth.synthesize(&target, &ego, &ContinuationBuffer::new());
        assert_eq!(traj.len(), config.horizon.points);
        assert_eq!(traj.reused, 0);
        assert!(!traj.fallback);
        for (i, p) in traj.points().iter().enumerate() {
            assert_relative_eq!(p.y, -6.0, epsilon = 1e-6);
            if i > 0 {
                assert!(p.x > traj.points()[i - 1].x);
            }
        }
        // the first step only carries one jerk increment of acceleration
        let v0 = 10.0 + config.limits.max_jerk * 0.02 * 0.02;
        assert_relative_eq!(traj.points()[0].x - 100.0, v0 * 0.02, epsilon = 1e-6);
    }

    #[test]
    fn test_prefix_is_copied_exactly() {
        let track = straight();
        let config = PlannerConfig::default();
        let synth = TrajectorySynthesizer::new(&config, &track);
        let ego = ego_at(100.0, 1, 10.0, &config);
        let buffer = ContinuationBuffer::from_points(
            (1..=20)
                .map(|i| Point2D::new(100.0 + 0.2 * i as f64, -6.0 + 1e-3 * i as f64))
                .collect(),
        );
        let target = Target::new(Behavior::ChangeLeft, 0, 22.0);

        let traj = synth.synthesize(&target, &ego, &buffer);
        assert_eq!(traj.len(), config.horizon.points);
        assert_eq!(traj.reused, config.continuation.reuse);
        assert_eq!(&traj.points()[..traj.reused], buffer.prefix(config.continuation.reuse));
    }

    #[test]
    fn test_lane_change_moves_toward_target_lane() {
        let track = straight();
        let config = PlannerConfig::default();
        let synth = TrajectorySynthesizer::new(&config, &track);
        let ego = ego_at(100.0, 1, 20.0, &config);
        let target = Target::new(Behavior::ChangeLeft, 0, 22.0);

        let traj = synth.synthesize(&target, &ego, &ContinuationBuffer::new());
        let last = traj.path.last().unwrap();
        let d = track.to_track(&Pose::new(last.x, last.y, 0.0)).d;
        assert!(d < 6.0 && d > 2.0, "d = {}", d);
    }

    #[test]
    fn test_standstill_prefix_falls_back_to_linear() {
        let track = straight();
        let config = PlannerConfig::default();
        let synth = TrajectorySynthesizer::new(&config, &track);
        let ego = ego_at(100.0, 1, 0.0, &config);
        let buffer = ContinuationBuffer::from_points(vec![Point2D::new(100.0, -6.0); 8]);
        let target = Target::new(Behavior::KeepLane, 1, 22.0);

        let traj = synth.synthesize(&target, &ego, &buffer);
        assert!(traj.fallback);
        assert_eq!(traj.len(), config.horizon.points);
        let last = traj.path.last().unwrap();
        assert_relative_eq!(last.y, -6.0, epsilon = 1e-9);
        assert!(last.x > 100.0);
    }
}

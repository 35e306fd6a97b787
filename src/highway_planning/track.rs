//! Waypoint track model
//!
//! Reference implementation of [`TrackFrame`]: the centerline is a cubic
//! spline through map waypoints, parameterized by chord length. Cartesian to
//! track conversion finds the nearest point of a coarse lookup table and
//! refines it with Newton steps on the spline.

use std::path::Path;

use log::{debug, info};

use crate::common::{Point2D, Pose, PlannerError, PlannerResult, TrackFrame, TrackPosition};
use crate::path_planning::Spline2D;

/// Spacing of the nearest-point lookup table [m]
const LOOKUP_STEP: f64 = 1.0;
/// Newton refinement iterations in `to_track`
const NEWTON_ITERATIONS: usize = 6;

pub struct WaypointTrack {
    spline: Spline2D,
    length: f64,
    closed: bool,
    lookup: Vec<(f64, Point2D)>,
}

impl WaypointTrack {
    /// Build a track from centerline waypoints. A closed track joins the last
    /// waypoint back to the first.
    pub fn new(waypoints: &[Point2D], closed: bool) -> PlannerResult<Self> {
        if waypoints.len() < 2 {
            return Err(PlannerError::InvalidTrack(format!(
                "need at least 2 waypoints, got {}",
                waypoints.len()
            )));
        }
        if waypoints.iter().any(|p| !p.is_finite()) {
            return Err(PlannerError::InvalidTrack(
                "waypoints must be finite".to_string(),
            ));
        }

        let mut x: Vec<f64> = waypoints.iter().map(|p| p.x).collect();
        let mut y: Vec<f64> = waypoints.iter().map(|p| p.y).collect();
        if closed {
            x.push(waypoints[0].x);
            y.push(waypoints[0].y);
        }

        let spline = Spline2D::new(&x, &y)
            .map_err(|e| PlannerError::InvalidTrack(format!("centerline spline: {}", e)))?;
        let length = spline.s_end();

        let n = (length / LOOKUP_STEP).ceil().max(1.0) as usize;
        let lookup = (0..=n)
            .map(|i| {
                let s = (i as f64 * LOOKUP_STEP).min(length);
                (s, Point2D::from(spline.calc_position(s)))
            })
            .collect();

        debug!(
            "built {} track: {} waypoints, length {:.1} m",
            if closed { "closed" } else { "open" },
            waypoints.len(),
            length
        );

        Ok(Self {
            spline,
            length,
            closed,
            lookup,
        })
    }

    /// Load a closed track from a map file with one waypoint per line. Only
    /// the first two columns (x, y) are used; further columns (s, dx, dy)
    /// are ignored. Blank lines and `#` comments are skipped.
    pub fn from_file(path: &Path) -> PlannerResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let waypoints = Self::parse_waypoints(&contents)?;
        info!(
            "loaded {} waypoints from {}",
            waypoints.len(),
            path.display()
        );
        Self::new(&waypoints, true)
    }

    pub fn parse_waypoints(contents: &str) -> PlannerResult<Vec<Point2D>> {
        let mut waypoints = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut cols = line
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|c| !c.is_empty())
                .map(|c| c.parse::<f64>());
            match (cols.next(), cols.next()) {
                (Some(Ok(x)), Some(Ok(y))) => waypoints.push(Point2D::new(x, y)),
                _ => {
                    return Err(PlannerError::InvalidTrack(format!(
                        "line {}: expected at least two numeric columns",
                        line_no + 1
                    )))
                }
            }
        }
        Ok(waypoints)
    }

    /// Wraps s on closed tracks. Open tracks leave it as is, and the spline
    /// extrapolates past either end.
    fn normalize_s(&self, s: f64) -> f64 {
        if self.closed {
            s.rem_euclid(self.length)
        } else {
            s
        }
    }

    fn nearest_lookup_s(&self, p: &Point2D) -> f64 {
        self.lookup
            .iter()
            .map(|(s, q)| (*s, (q.x - p.x).powi(2) + (q.y - p.y).powi(2)))
            .fold((0.0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
            .0
    }

    // Newton iterations on f(s) = (C(s) - p) . C'(s)
    fn refine_s(&self, p: &Point2D, mut s: f64) -> f64 {
        for _ in 0..NEWTON_ITERATIONS {
            let (cx, cy) = self.spline.calc_position(self.normalize_s(s));
            let (dx, dy) = self.spline.calc_derivative(self.normalize_s(s));
            let (ddx, ddy) = self.spline.calc_second_derivative(self.normalize_s(s));
            let ex = cx - p.x;
            let ey = cy - p.y;
            let f = ex * dx + ey * dy;
            let df = dx * dx + dy * dy + ex * ddx + ey * ddy;
            if df.abs() < 1e-12 {
                break;
            }
            let step = (f / df).clamp(-LOOKUP_STEP, LOOKUP_STEP);
            s -= step;
            if step.abs() < 1e-9 {
                break;
            }
        }
        s
    }
}

impl TrackFrame for WaypointTrack {
    fn to_track(&self, pose: &Pose) -> TrackPosition {
        let p = pose.position();
        let s = self.normalize_s(self.refine_s(&p, self.nearest_lookup_s(&p)));
        let (cx, cy) = self.spline.calc_position(s);
        let yaw = self.spline.calc_yaw(s);
        // right-hand normal of the driving direction
        let d = (p.x - cx) * yaw.sin() - (p.y - cy) * yaw.cos();
        TrackPosition::new(s, d)
    }

    fn to_cartesian(&self, s: f64, d: f64) -> Pose {
        let s = self.normalize_s(s);
        let (cx, cy) = self.spline.calc_position(s);
        let yaw = self.spline.calc_yaw(s);
        Pose::new(cx + d * yaw.sin(), cy - d * yaw.cos(), yaw)
    }

    fn length(&self) -> f64 {
        self.length
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

//! Common types used throughout highway_planner

use nalgebra::Point2;

/// 2D point representation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn to_na_point(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point2D {
    fn from(tuple: (f64, f64)) -> Self {
        Self { x: tuple.0, y: tuple.1 }
    }
}

impl From<Point2<f64>> for Point2D {
    fn from(p: Point2<f64>) -> Self {
        Self { x: p.x, y: p.y }
    }
}

/// Cartesian pose (position + heading)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    /// Point `distance` metres along the heading (negative goes backwards)
    pub fn project(&self, distance: f64) -> Point2D {
        Point2D::new(
            self.x + distance * self.yaw.cos(),
            self.y + distance * self.yaw.sin(),
        )
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.yaw.is_finite()
    }
}

/// Track-frame coordinates: distance along the centerline and signed lateral
/// offset (positive to the right of the driving direction).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPosition {
    pub s: f64,
    pub d: f64,
}

impl TrackPosition {
    pub fn new(s: f64, d: f64) -> Self {
        Self { s, d }
    }
}

/// Path represented as a sequence of 2D points
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path2D {
    pub points: Vec<Point2D>,
}

impl Path2D {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn from_points(points: Vec<Point2D>) -> Self {
        Self { points }
    }

    pub fn push(&mut self, point: Point2D) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&Point2D> {
        self.points.last()
    }

    pub fn x_coords(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.x).collect()
    }

    pub fn y_coords(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_point2d_distance() {
        let p1 = Point2D::new(0.0, 0.0);
        let p2 = Point2D::new(3.0, 4.0);
        assert!((p1.distance(&p2) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_pose_project() {
        let pose = Pose::new(1.0, 1.0, PI / 2.0);
        let p = pose.project(-2.0);
        assert!((p.x - 1.0).abs() < 1e-12);
        assert!((p.y + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_path2d_coords() {
        let path = Path2D::from_points(vec![Point2D::new(0.0, 1.0), Point2D::new(2.0, 3.0)]);
        assert_eq!(path.x_coords(), vec![0.0, 2.0]);
        assert_eq!(path.y_coords(), vec![1.0, 3.0]);
        assert_eq!(path.last(), Some(&Point2D::new(2.0, 3.0)));
    }
}

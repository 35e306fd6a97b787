//! Continuation buffer: the part of the last emitted trajectory the vehicle
//! has not driven yet.

use crate::common::{Path2D, Point2D, PlannerError, PlannerResult};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContinuationBuffer {
    path: Path2D,
}

impl ContinuationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: Vec<Point2D>) -> Self {
        Self {
            path: Path2D::from_points(points),
        }
    }

    /// Build from the `previous_path_x` / `previous_path_y` telemetry arrays
    pub fn from_xy(x: &[f64], y: &[f64]) -> PlannerResult<Self> {
        if x.len() != y.len() {
            return Err(PlannerError::InvalidObservation(format!(
                "previous path has {} x and {} y values",
                x.len(),
                y.len()
            )));
        }
        let points: Vec<Point2D> = x
            .iter()
            .zip(y.iter())
            .map(|(&x, &y)| Point2D::new(x, y))
            .collect();
        let buffer = Self::from_points(points);
        buffer.validate()?;
        Ok(buffer)
    }

    pub fn validate(&self) -> PlannerResult<()> {
        match self.path.points.iter().position(|p| !p.is_finite()) {
            Some(i) => Err(PlannerError::InvalidObservation(format!(
                "previous path point {} is not finite",
                i
            ))),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub fn points(&self) -> &[Point2D] {
        &self.path.points
    }

    pub fn path(&self) -> &Path2D {
        &self.path
    }

    /// The points reused verbatim by the next trajectory
    pub fn prefix(&self, bound: usize) -> &[Point2D] {
        let n = self.path.len().min(bound);
        &self.path.points[..n]
    }

    /// Drop the first `n` points, as the vehicle does while driving them
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.path.len());
        self.path.points.drain(..n);
    }
}

impl From<Path2D> for ContinuationBuffer {
    fn from(path: Path2D) -> Self {
        Self { path }
    }
}

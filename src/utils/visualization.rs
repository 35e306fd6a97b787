//! Visualization utilities for highway_planner
//!
//! A [`HighwayScene`] collects layers (lines and point sets) and renders them
//! into a single gnuplot axes, either as a one-off plot or frame by frame in
//! an animation loop.

use std::path::Path;

use gnuplot::{AutoOption, AxesCommon, Caption, Color, Figure, LineWidth, PointSize, PointSymbol};

use crate::common::{Path2D, Point2D, Pose, TrackFrame, Visualizable};
use crate::highway_planning::config::RoadConfig;
use crate::highway_planning::observation::TrafficObservation;
use crate::highway_planning::prediction::Predictions;

/// Color palette for consistent styling
pub mod colors {
    pub const BLACK: &str = "#000000";
    pub const RED: &str = "#FF0000";
    pub const BLUE: &str = "#0000FF";
    pub const ORANGE: &str = "#FFA500";
    pub const GRAY: &str = "#808080";

    // Semantic colors
    pub const CENTERLINE: &str = BLACK;
    pub const LANE_LINE: &str = GRAY;
    pub const EGO: &str = BLUE;
    pub const TRAJECTORY: &str = RED;
    pub const TRAFFIC: &str = ORANGE;
    pub const PREDICTION: &str = "#DD3355";
}

/// Style for path rendering
#[derive(Debug, Clone, PartialEq)]
pub struct PathStyle {
    pub color: String,
    pub line_width: f64,
    pub caption: String,
}

impl PathStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            line_width: 2.0,
            caption: caption.to_string(),
        }
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }
}

impl Default for PathStyle {
    fn default() -> Self {
        Self::new(colors::TRAJECTORY, "Trajectory")
    }
}

/// Style for point rendering
#[derive(Debug, Clone, PartialEq)]
pub struct PointStyle {
    pub color: String,
    pub size: f64,
    pub symbol: char,
    pub caption: String,
}

impl PointStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            size: 1.0,
            symbol: 'O',
            caption: caption.to_string(),
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_symbol(mut self, symbol: char) -> Self {
        self.symbol = symbol;
        self
    }
}

#[derive(Debug, Clone)]
enum Layer {
    Lines {
        x: Vec<f64>,
        y: Vec<f64>,
        style: PathStyle,
    },
    Points {
        x: Vec<f64>,
        y: Vec<f64>,
        style: PointStyle,
    },
}

pub struct HighwayScene {
    figure: Figure,
    layers: Vec<Layer>,
    title: String,
    x_range: Option<(f64, f64)>,
    y_range: Option<(f64, f64)>,
}

impl HighwayScene {
    pub fn new() -> Self {
        Self {
            figure: Figure::new(),
            layers: Vec::new(),
            title: String::new(),
            x_range: None,
            y_range: None,
        }
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    pub fn set_x_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.x_range = Some((min, max));
        self
    }

    pub fn set_y_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.y_range = Some((min, max));
        self
    }

    /// Center a square window of half-width `radius` on `center`
    pub fn follow(&mut self, center: Point2D, radius: f64) -> &mut Self {
        self.set_x_range(center.x - radius, center.x + radius)
            .set_y_range(center.y - radius, center.y + radius)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Drop every layer, keeping title and ranges
    pub fn clear_layers(&mut self) -> &mut Self {
        self.layers.clear();
        self
    }

    pub fn add_path(&mut self, path: &Path2D, style: &PathStyle) -> &mut Self {
        self.add_path_xy(path.x_coords(), path.y_coords(), style)
    }

    pub fn add_path_xy(&mut self, x: Vec<f64>, y: Vec<f64>, style: &PathStyle) -> &mut Self {
        if !x.is_empty() {
            self.layers.push(Layer::Lines {
                x,
                y,
                style: style.clone(),
            });
        }
        self
    }

    pub fn add_points(&mut self, points: &[Point2D], style: &PointStyle) -> &mut Self {
        if !points.is_empty() {
            self.layers.push(Layer::Points {
                x: points.iter().map(|p| p.x).collect(),
                y: points.iter().map(|p| p.y).collect(),
                style: style.clone(),
            });
        }
        self
    }

    /// Vehicle marker with a short heading tick
    pub fn add_vehicle(&mut self, pose: &Pose, style: &PointStyle) -> &mut Self {
        let nose = pose.project(2.0 * style.size);
        self.add_points(&[pose.position()], style);
        self.add_path_xy(
            vec![pose.x, nose.x],
            vec![pose.y, nose.y],
            &PathStyle::new(&style.color, "").with_line_width(2.0),
        )
    }

    /// Centerline and lane boundaries sampled every `step` meters of track
    pub fn add_lane_lines(&mut self, track: &dyn TrackFrame, road: &RoadConfig, step: f64) -> &mut Self {
        let n = (track.length() / step).ceil().max(1.0) as usize;
        for k in 0..=road.lane_count {
            let d = k as f64 * road.lane_width;
            let (x, y): (Vec<f64>, Vec<f64>) = (0..=n)
                .map(|i| {
                    let pose = track.to_cartesian(i as f64 * step, d);
                    (pose.x, pose.y)
                })
                .unzip();
            let style = if k == 0 {
                PathStyle::new(colors::CENTERLINE, "").with_line_width(1.5)
            } else {
                PathStyle::new(colors::LANE_LINE, "").with_line_width(0.5)
            };
            self.add_path_xy(x, y, &style);
        }
        self
    }

    pub fn draw<V: Visualizable + ?Sized>(&mut self, item: &V) -> &mut Self {
        item.visualize(self);
        self
    }

    /// Show the scene, keeping gnuplot open for the next frame
    pub fn show(&mut self) -> Result<(), String> {
        self.render();
        self.figure
            .show_and_keep_running()
            .map_err(|e| e.to_string())
            .map(|_| ())
    }

    pub fn save_svg(&mut self, path: &Path, width: u32, height: u32) -> Result<(), String> {
        self.render();
        let path = path.to_str().ok_or("non UTF-8 output path")?;
        self.figure
            .save_to_svg(path, width, height)
            .map_err(|e| e.to_string())
    }

    fn render(&mut self) {
        self.figure.clear_axes();
        let axes = self.figure.axes2d();

        for layer in &self.layers {
            match layer {
                Layer::Lines { x, y, style } => {
                    axes.lines(
                        x,
                        y,
                        &[
                            Caption(&style.caption),
                            Color(&style.color),
                            LineWidth(style.line_width),
                        ],
                    );
                }
                Layer::Points { x, y, style } => {
                    axes.points(
                        x,
                        y,
                        &[
                            Caption(&style.caption),
                            Color(&style.color),
                            PointSymbol(style.symbol),
                            PointSize(style.size),
                        ],
                    );
                }
            }
        }

        if !self.title.is_empty() {
            axes.set_title(&self.title, &[]);
        }
        axes.set_x_label("X [m]", &[]);
        axes.set_y_label("Y [m]", &[]);
        if let Some((min, max)) = self.x_range {
            axes.set_x_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some((min, max)) = self.y_range {
            axes.set_y_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        // meters on both axes
        axes.set_aspect_ratio(AutoOption::Fix(1.0));
    }
}

impl Default for HighwayScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Visualizable for Predictions {
    fn visualize(&self, scene: &mut HighwayScene) {
        for path in self.iter() {
            let points: Vec<Point2D> = path.samples.iter().map(|s| s.position).collect();
            scene.add_points(
                &points,
                &PointStyle::new(colors::PREDICTION, "").with_size(0.3).with_symbol('.'),
            );
        }
    }
}

impl Visualizable for [TrafficObservation] {
    fn visualize(&self, scene: &mut HighwayScene) {
        for vehicle in self {
            let pose = Pose::new(vehicle.position.x, vehicle.position.y, vehicle.vy.atan2(vehicle.vx));
            scene.add_vehicle(&pose, &PointStyle::new(colors::TRAFFIC, "").with_size(1.5).with_symbol('S'));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highway_planning::track::WaypointTrack;

    #[test]
    fn test_path_style() {
        let style = PathStyle::new(colors::RED, "Test Path").with_line_width(3.0);
        assert_eq!(style.line_width, 3.0);
        assert_eq!(style.color, colors::RED);
    }

    #[test]
    fn test_empty_layers_are_skipped() {
        let mut scene = HighwayScene::new();
        scene.add_path(&Path2D::new(), &PathStyle::default());
        scene.add_points(&[], &PointStyle::new(colors::TRAFFIC, "Traffic"));
        assert_eq!(scene.layer_count(), 0);

        scene.add_vehicle(&Pose::new(0.0, 0.0, 0.0), &PointStyle::new(colors::EGO, "Ego"));
        assert_eq!(scene.layer_count(), 2);
        scene.clear_layers();
        assert_eq!(scene.layer_count(), 0);
    }

    #[test]
    fn test_lane_lines_one_per_boundary() {
        let pts: Vec<Point2D> = (0..=3).map(|i| Point2D::new(i as f64 * 100.0, 0.0)).collect();
        let track = WaypointTrack::new(&pts, false).unwrap();
        let mut scene = HighwayScene::new();
        scene.add_lane_lines(&track, &RoadConfig::default(), 10.0);
        assert_eq!(scene.layer_count(), 4);
    }

    #[test]
    fn test_draw_traffic() {
        let pts: Vec<Point2D> = (0..=3).map(|i| Point2D::new(i as f64 * 100.0, 0.0)).collect();
        let track = WaypointTrack::new(&pts, false).unwrap();
        let road = RoadConfig::default();
        let traffic = vec![
            TrafficObservation::new(1, 50.0, -2.0, 10.0, 0.0, &track, &road).unwrap(),
            TrafficObservation::new(2, 80.0, -6.0, 10.0, 0.0, &track, &road).unwrap(),
        ];
        let mut scene = HighwayScene::new();
        scene.draw(traffic.as_slice());
        // marker and heading tick per vehicle
        assert_eq!(scene.layer_count(), 4);
    }
}

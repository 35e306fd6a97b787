// Overtaking a slow leader on a straight three-lane road.
//
// Records the ego speed and lateral offset over time and plots both, which
// shows the braking behind the leader, the lane change and the ramp back up
// to the speed limit.
use std::error::Error;

use log::info;
use plotlib::page::Page;
use plotlib::repr::Plot;
use plotlib::style::LineStyle;
use plotlib::view::ContinuousView;

use highway_planner::{
    ContinuationBuffer, EgoObservation, EgoState, Planner, PlannerConfig, Point2D, Pose,
    TrackFrame, TrafficObservation, WaypointTrack,
};

const POINTS_PER_TICK: usize = 3;
const SIM_TICKS: usize = 300;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = PlannerConfig::default();
    let waypoints: Vec<Point2D> = (0..=40).map(|i| Point2D::new(i as f64 * 100.0, 0.0)).collect();
    let planner = Planner::new(config.clone(), WaypointTrack::new(&waypoints, false)?)?;
    let track = planner.track();
    let dt = config.horizon.dt;

    let lane = 1;
    let mut ego = EgoState::new(lane);
    let mut pose = track.to_cartesian(50.0, config.road.lane_center(lane));
    let mut speed = 20.0;
    let mut buffer = ContinuationBuffer::new();

    let leader_speed = 12.0;
    let mut leader_s = 110.0;

    let mut speed_trace: Vec<(f64, f64)> = Vec::with_capacity(SIM_TICKS);
    let mut lateral_trace: Vec<(f64, f64)> = Vec::with_capacity(SIM_TICKS);

    for tick in 0..SIM_TICKS {
        let leader = track.to_cartesian(leader_s, config.road.lane_center(lane));
        let traffic = [TrafficObservation::new(
            1,
            leader.x,
            leader.y,
            leader_speed,
            0.0,
            track,
            &config.road,
        )?];
        let observation = EgoObservation::new(pose.x, pose.y, pose.yaw, speed);
        let output = planner.plan_tick(&mut ego, &observation, &buffer, &traffic)?;

        let t = (tick * POINTS_PER_TICK) as f64 * dt;
        speed_trace.push((t, speed));
        lateral_trace.push((t, ego.track.d));
        if output.behavior.is_lane_change() {
            info!("t={:.2}s: {} (cost {:.2})", t, output.behavior, output.cost.total(&config.weights));
        }

        buffer = output.trajectory;
        let points = buffer.points();
        let last = points[POINTS_PER_TICK - 1];
        let before = points[POINTS_PER_TICK - 2];
        pose = Pose::new(last.x, last.y, (last.y - before.y).atan2(last.x - before.x));
        speed = last.distance(&before) / dt;
        buffer.consume(POINTS_PER_TICK);
        leader_s += leader_speed * POINTS_PER_TICK as f64 * dt;
    }

    std::fs::create_dir_all("img")?;

    let speed_plot: Plot = Plot::new(speed_trace).line_style(
        LineStyle::new()
            .colour("#35C788")
            .width(2.),
    );
    let v = ContinuousView::new()
        .add(speed_plot)
        .x_label("t [s]")
        .y_label("speed [m/s]");
    Page::single(&v)
        .save("./img/overtake_speed.svg")
        .map_err(|e| format!("{:?}", e))?;

    let lateral_plot: Plot = Plot::new(lateral_trace).line_style(
        LineStyle::new()
            .colour("#DD3355")
            .width(2.),
    );
    let v = ContinuousView::new()
        .add(lateral_plot)
        .x_label("t [s]")
        .y_label("d [m]");
    Page::single(&v)
        .save("./img/overtake_lateral.svg")
        .map_err(|e| format!("{:?}", e))?;

    Ok(())
}

// Closed-loop highway driving on a ring road with random traffic.
//
// The ego drives the planned trajectory point by point; every few points the
// planner runs again on the unconsumed rest, just as it would against a
// simulator that reports back the previous path.
//
// usage: highway_planner [config.yaml] [--headless]
use std::error::Error;
use std::f64::consts::PI;
use std::path::Path;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use highway_planner::highway_planning::{ConstantVelocityPredictor, MotionPredictor};
use highway_planner::utils::{colors, HighwayScene, PathStyle, PointStyle};
use highway_planner::{
    ContinuationBuffer, EgoObservation, EgoState, Planner, PlannerConfig, Point2D, Pose,
    TrackFrame, TrafficObservation, WaypointTrack,
};

const RING_RADIUS: f64 = 300.0;
const RING_WAYPOINTS: usize = 90;
const TRAFFIC_COUNT: usize = 14;
// trajectory points driven between two planning ticks
const POINTS_PER_TICK: usize = 3;
const SIM_TICKS: usize = 2500;
const PLOT_EVERY: usize = 5;
// traffic keeps at least this far behind whatever is ahead in its lane [m]
const FOLLOW_GAP: f64 = 15.0;

struct Vehicle {
    id: i64,
    s: f64,
    lane: usize,
    speed: f64,
    cruise: f64,
}

fn ring_track() -> Result<WaypointTrack, Box<dyn Error>> {
    let waypoints: Vec<Point2D> = (0..RING_WAYPOINTS)
        .map(|i| {
            let a = 2.0 * PI * i as f64 / RING_WAYPOINTS as f64;
            Point2D::new(RING_RADIUS * a.cos(), RING_RADIUS * a.sin())
        })
        .collect();
    Ok(WaypointTrack::new(&waypoints, true)?)
}

fn spawn_traffic(rng: &mut StdRng, config: &PlannerConfig, length: f64) -> Result<Vec<Vehicle>, Box<dyn Error>> {
    let speeds = Normal::new(0.8 * config.road.speed_limit, 2.5)?;
    Ok((0..TRAFFIC_COUNT)
        .map(|i| {
            let cruise = speeds.sample(rng).clamp(8.0, config.road.speed_limit + 2.0);
            Vehicle {
                id: i as i64,
                // keep the start of the ring free for the ego
                s: rng.gen_range(40.0..length - 20.0),
                lane: rng.gen_range(0..config.road.lane_count),
                speed: cruise,
                cruise,
            }
        })
        .collect())
}

/// Advance traffic by `dt`, slowing down behind whatever is ahead in the lane
fn step_traffic(traffic: &mut [Vehicle], ego: &EgoState, track: &WaypointTrack, dt: f64) {
    let snapshot: Vec<(usize, f64, f64)> = traffic.iter().map(|v| (v.lane, v.s, v.speed)).collect();
    for vehicle in traffic.iter_mut() {
        let leader = snapshot
            .iter()
            .copied()
            .chain(std::iter::once((ego.lane, ego.track.s, ego.speed)))
            .filter(|&(lane, _, _)| lane == vehicle.lane)
            .map(|(_, s, speed)| (track.s_distance(vehicle.s, s), speed))
            .filter(|&(gap, _)| gap > 0.0)
            .min_by(|a, b| a.0.total_cmp(&b.0));

        vehicle.speed = match leader {
            Some((gap, speed)) if gap < FOLLOW_GAP => speed.min(vehicle.cruise),
            _ => vehicle.cruise,
        };
        vehicle.s = track.wrap_s(vehicle.s + vehicle.speed * dt);
    }
}

fn observe_traffic(
    traffic: &[Vehicle],
    track: &WaypointTrack,
    config: &PlannerConfig,
) -> Result<Vec<TrafficObservation>, Box<dyn Error>> {
    let mut observations = Vec::with_capacity(traffic.len());
    for v in traffic {
        let pose = track.to_cartesian(v.s, config.road.lane_center(v.lane));
        observations.push(TrafficObservation::new(
            v.id,
            pose.x,
            pose.y,
            v.speed * pose.yaw.cos(),
            v.speed * pose.yaw.sin(),
            track,
            &config.road,
        )?);
    }
    Ok(observations)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let headless = args.iter().any(|a| a == "--headless");
    let config = match args.iter().find(|a| a.ends_with(".yaml") || a.ends_with(".yml")) {
        Some(path) => PlannerConfig::load(Path::new(path))?,
        None => PlannerConfig::default(),
    };

    let planner = Planner::new(config.clone(), ring_track()?)?;
    let track = planner.track();
    let predictor = ConstantVelocityPredictor::from_config(&config.horizon);
    let dt = config.horizon.dt;

    let mut rng = StdRng::seed_from_u64(7);
    let mut traffic = spawn_traffic(&mut rng, &config, track.length())?;

    let start_lane = 1.min(config.road.lane_count - 1);
    let mut ego = EgoState::new(start_lane);
    let mut pose = track.to_cartesian(0.0, config.road.lane_center(start_lane));
    let mut speed = 0.0;
    let mut buffer = ContinuationBuffer::new();

    let mut scene = HighwayScene::new();
    scene.set_title("Highway planner");

    let mut distance = 0.0;
    let mut lane_changes = 0;
    let mut near_misses = 0;
    let mut last_lane = start_lane;

    for tick in 0..SIM_TICKS {
        let observation = EgoObservation::new(pose.x, pose.y, pose.yaw, speed);
        let observations = observe_traffic(&traffic, track, &config)?;
        let output = planner.plan_or_hold(&mut ego, &observation, &buffer, &observations)?;
        if output.lane != last_lane {
            lane_changes += 1;
            info!("tick {}: {} toward lane {}", tick, output.behavior, output.lane);
            last_lane = output.lane;
        }

        if !headless && tick % PLOT_EVERY == 0 {
            let predictions = predictor.predict(&observations, track);
            scene.clear_layers();
            scene
                .follow(pose.position(), 80.0)
                .add_lane_lines(track, &config.road, 5.0)
                .draw(&predictions)
                .draw(observations.as_slice())
                .add_path(output.trajectory.path(), &PathStyle::default())
                .add_vehicle(&pose, &PointStyle::new(colors::EGO, "Ego").with_size(1.5));
            scene.show()?;
        }

        // drive the first points of the plan
        buffer = output.trajectory;
        let driven = POINTS_PER_TICK.min(buffer.len());
        let previous = pose.position();
        let points = buffer.points();
        if driven > 0 {
            let last = points[driven - 1];
            let before = if driven > 1 { points[driven - 2] } else { previous };
            let step = last.distance(&before);
            if step > 1e-6 {
                pose = Pose::new(last.x, last.y, (last.y - before.y).atan2(last.x - before.x));
            } else {
                pose = Pose::new(last.x, last.y, pose.yaw);
            }
            speed = step / dt;
        }
        buffer.consume(driven);
        distance += pose.position().distance(&previous);
        step_traffic(&mut traffic, &ego, track, driven as f64 * dt);

        let ego_track = track.to_track(&pose);
        for vehicle in &traffic {
            let gap = track.s_distance(ego_track.s, vehicle.s);
            let lateral = ego_track.d - config.road.lane_center(vehicle.lane);
            if gap.abs() < config.safety.collision_radius
                && lateral.abs() < 0.5 * config.road.lane_width
            {
                near_misses += 1;
                warn!("tick {}: vehicle {} within collision radius", tick, vehicle.id);
            }
        }
    }

    info!(
        "done: {:.0} m driven, {} lane changes, {} collision-radius violations",
        distance, lane_changes, near_misses
    );

    if !headless {
        std::fs::create_dir_all("img")?;
        scene.save_svg(Path::new("img/highway_planner.svg"), 800, 600)?;
    }
    Ok(())
}

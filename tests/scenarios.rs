//! End-to-end planning scenarios on a straight three-lane road.

use approx::assert_relative_eq;
use proptest::prelude::*;

use highway_planner::common::Path2D;
use highway_planner::highway_planning::{
    select, Behavior, CandidateTrajectory, CostBreakdown, ScoredCandidate, Target,
};
use highway_planner::{
    ContinuationBuffer, EgoObservation, EgoState, Planner, PlannerConfig, Point2D, Pose,
    TrackFrame, TrackPosition, TrafficObservation, WaypointTrack,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn straight() -> WaypointTrack {
    let pts: Vec<Point2D> = (0..=30).map(|i| Point2D::new(i as f64 * 100.0, 0.0)).collect();
    WaypointTrack::new(&pts, false).unwrap()
}

fn planner(config: PlannerConfig) -> Planner {
    Planner::new(config, straight()).unwrap()
}

/// Ego pose at track position (s, lane center), heading along the road
fn ego_observation(s: f64, lane: usize, speed: f64) -> EgoObservation {
    let d = PlannerConfig::default().road.lane_center(lane);
    EgoObservation::new(s, -d, 0.0, speed)
}

fn vehicle(id: i64, s: f64, lane: usize, speed: f64) -> TrafficObservation {
    let config = PlannerConfig::default();
    let d = config.road.lane_center(lane);
    TrafficObservation::new(id, s, -d, speed, 0.0, &straight(), &config.road).unwrap()
}

fn score_of(scores: &[(Target, f64)], behavior: Behavior) -> f64 {
    scores
        .iter()
        .find(|(t, _)| t.behavior == behavior)
        .map(|(_, total)| *total)
        .unwrap()
}

/// Drive the first `n` points of `buffer`, returning the new observation
fn drive(buffer: &mut ContinuationBuffer, n: usize, dt: f64) -> EgoObservation {
    let last = buffer.points()[n - 1];
    let before = buffer.points()[n - 2];
    buffer.consume(n);
    EgoObservation::new(
        last.x,
        last.y,
        (last.y - before.y).atan2(last.x - before.x),
        last.distance(&before) / dt,
    )
}

#[test]
fn free_road_accelerates_within_bound() {
    init_logger();
    let config = PlannerConfig::default();
    let dt = config.horizon.dt;
    let max_accel = config.limits.max_acceleration;
    let planner = planner(config);

    let mut ego = EgoState::new(1);
    let mut observation = ego_observation(100.0, 1, 10.0);
    let mut buffer = ContinuationBuffer::new();
    let mut driven = vec![observation.pose.position()];

    for _ in 0..150 {
        let out = planner.plan_tick(&mut ego, &observation, &buffer, &[]).unwrap();
        assert_eq!(out.behavior, Behavior::KeepLane);
        assert_eq!(out.lane, 1);
        assert_eq!(out.trajectory.len(), 50);

        buffer = out.trajectory;
        driven.extend_from_slice(&buffer.points()[..3]);
        observation = drive(&mut buffer, 3, dt);
    }

    let speeds: Vec<f64> = driven.windows(2).map(|w| w[1].distance(&w[0]) / dt).collect();
    for w in speeds.windows(2) {
        let accel = (w[1] - w[0]) / dt;
        assert!(accel <= max_accel + 0.1, "accel {}", accel);
        assert!(accel >= -0.1, "unexpected braking {}", accel);
    }
    assert_relative_eq!(*speeds.last().unwrap(), 22.0, epsilon = 0.05);
    assert!(driven.iter().all(|p| (p.y + 6.0).abs() < 1e-3));
}

#[test]
fn reused_prefix_is_identical() {
    init_logger();
    let config = PlannerConfig::default();
    let reuse = config.continuation.reuse;
    let dt = config.horizon.dt;
    let planner = planner(config);

    let mut ego = EgoState::new(1);
    let out = planner
        .plan_tick(&mut ego, &ego_observation(100.0, 1, 15.0), &ContinuationBuffer::new(), &[])
        .unwrap();
    let mut buffer = out.trajectory;
    let observation = drive(&mut buffer, 3, dt);
    assert_eq!(buffer.len(), 47);

    let next = planner.plan_tick(&mut ego, &observation, &buffer, &[]).unwrap();
    assert_eq!(next.trajectory.len(), 50);
    assert_eq!(&next.trajectory.points()[..reuse], &buffer.points()[..reuse]);
}

#[test]
fn slow_leader_triggers_lane_change() {
    init_logger();
    let planner = planner(PlannerConfig::default());
    let mut ego = EgoState::new(1);
    let traffic = [vehicle(1, 120.0, 1, 10.0)];

    let out = planner
        .plan_tick(&mut ego, &ego_observation(100.0, 1, 15.0), &ContinuationBuffer::new(), &traffic)
        .unwrap();
    assert_eq!(out.candidates_evaluated, 3);
    // both adjacent lanes are free; left is generated first
    assert_eq!(out.behavior, Behavior::ChangeLeft);
    assert_eq!(out.lane, 0);
    assert_eq!(ego.target_speed, 22.0);
}

#[test]
fn slow_vehicle_ahead_in_target_lane_keeps_lane() {
    init_logger();
    let planner = planner(PlannerConfig::default());
    let mut ego = EgoState::new(0);
    let traffic = [vehicle(1, 110.0, 1, 20.0)];

    let out = planner
        .plan_tick(&mut ego, &ego_observation(100.0, 0, 20.0), &ContinuationBuffer::new(), &traffic)
        .unwrap();
    assert_eq!(out.candidates_evaluated, 2);
    assert_eq!(out.behavior, Behavior::KeepLane);
    assert_eq!(out.lane, 0);
    let keep = score_of(&out.scores, Behavior::KeepLane);
    let change = score_of(&out.scores, Behavior::ChangeRight);
    assert!(change > keep, "change {} keep {}", change, keep);
}

#[test]
fn fast_vehicle_behind_in_target_lane_keeps_lane() {
    init_logger();
    let planner = planner(PlannerConfig::default());
    let mut ego = EgoState::new(0);
    let traffic = [vehicle(1, 85.0, 1, 30.0)];

    let out = planner
        .plan_tick(&mut ego, &ego_observation(100.0, 0, 20.0), &ContinuationBuffer::new(), &traffic)
        .unwrap();
    assert_eq!(out.candidates_evaluated, 2);
    assert_eq!(out.behavior, Behavior::KeepLane);
    assert!(score_of(&out.scores, Behavior::ChangeRight) > score_of(&out.scores, Behavior::KeepLane));
}

#[test]
fn vehicle_alongside_removes_candidate() {
    init_logger();
    let planner = planner(PlannerConfig::default());
    let mut ego = EgoState::new(1);
    let traffic = [vehicle(1, 102.0, 2, 20.0)];

    let out = planner
        .plan_tick(&mut ego, &ego_observation(100.0, 1, 20.0), &ContinuationBuffer::new(), &traffic)
        .unwrap();
    assert_eq!(out.candidates_evaluated, 2);
    assert_ne!(out.lane, 2);
}

#[test]
fn equal_costs_prefer_keep_lane() {
    init_logger();
    let mut config = PlannerConfig::default();
    config.weights.lane_change = 0.0;
    config.weights.comfort = 0.0;
    config.weights.settling = 0.0;
    let planner = planner(config);
    let mut ego = EgoState::new(1);

    let out = planner
        .plan_tick(&mut ego, &ego_observation(100.0, 1, 22.0), &ContinuationBuffer::new(), &[])
        .unwrap();
    assert_eq!(out.candidates_evaluated, 3);
    assert_eq!(out.cost.total(&planner.config().weights), 0.0);
    assert_eq!(out.behavior, Behavior::KeepLane);
}

#[test]
fn malformed_input_holds_previous_trajectory() {
    init_logger();
    let planner = planner(PlannerConfig::default());
    let mut ego = EgoState::new(1);
    let first = planner
        .plan_tick(&mut ego, &ego_observation(100.0, 1, 15.0), &ContinuationBuffer::new(), &[])
        .unwrap();
    let before = ego.clone();

    let nan_ego = EgoObservation::new(f64::NAN, -6.0, 0.0, 15.0);
    let out = planner
        .plan_or_hold(&mut ego, &nan_ego, &first.trajectory, &[])
        .unwrap();
    assert!(out.held);
    assert_eq!(out.trajectory, first.trajectory);
    assert_eq!(ego, before);

    let mut broken = vehicle(3, 150.0, 1, 10.0);
    broken.speed = f64::NAN;
    let out = planner
        .plan_or_hold(&mut ego, &ego_observation(101.0, 1, 15.0), &first.trajectory, &[broken])
        .unwrap();
    assert!(out.held);
    assert_eq!(ego, before);
}

#[test]
fn edge_lanes_never_leave_the_road() {
    init_logger();
    let planner = planner(PlannerConfig::default());
    let leader = |lane| [vehicle(1, 115.0, lane, 5.0)];

    let mut ego = EgoState::new(0);
    let out = planner
        .plan_tick(&mut ego, &ego_observation(100.0, 0, 15.0), &ContinuationBuffer::new(), &leader(0))
        .unwrap();
    assert_eq!(out.candidates_evaluated, 2);
    assert_eq!(out.lane, 1);

    let mut ego = EgoState::new(2);
    let out = planner
        .plan_tick(&mut ego, &ego_observation(100.0, 2, 15.0), &ContinuationBuffer::new(), &leader(2))
        .unwrap();
    assert_eq!(out.candidates_evaluated, 2);
    assert_eq!(out.lane, 1);
}

fn scored(total: f64, index: usize) -> ScoredCandidate {
    ScoredCandidate {
        trajectory: CandidateTrajectory {
            target: Target::new(Behavior::KeepLane, index, 20.0),
            path: Path2D::new(),
            reused: 0,
            fallback: false,
        },
        cost: CostBreakdown::default(),
        total,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn selection_is_the_first_minimum(totals in prop::collection::vec(0.0f64..5.0, 1..4)) {
        let candidates: Vec<ScoredCandidate> =
            totals.iter().enumerate().map(|(i, &t)| scored(t, i)).collect();
        let mut ego = EgoState::new(1);
        let best = select(candidates, &mut ego).unwrap();

        let min = totals.iter().cloned().fold(f64::INFINITY, f64::min);
        let first = totals.iter().position(|&t| t == min).unwrap();
        prop_assert_eq!(best.total, min);
        prop_assert_eq!(best.trajectory.target.lane, first);
    }

    #[test]
    fn chosen_lane_is_adjacent_and_legal(
        lane in 0usize..3,
        speed in 5.0f64..22.0,
        others in prop::collection::vec((20.0f64..200.0, 0usize..3, 5.0f64..25.0), 0..6),
    ) {
        let planner = planner(PlannerConfig::default());
        let traffic: Vec<TrafficObservation> = others
            .iter()
            .enumerate()
            .map(|(i, &(s, l, v))| vehicle(i as i64, s, l, v))
            .collect();
        let mut ego = EgoState::new(lane);
        let out = planner
            .plan_tick(&mut ego, &ego_observation(100.0, lane, speed), &ContinuationBuffer::new(), &traffic)
            .unwrap();

        let chosen = out.cost.total(&planner.config().weights);
        prop_assert_eq!(out.scores.len(), out.candidates_evaluated);
        prop_assert!(out.scores.iter().all(|(_, total)| chosen <= *total));
        prop_assert!(out.lane < 3);
        prop_assert!((out.lane as i64 - lane as i64).abs() <= 1);
        prop_assert_eq!(out.trajectory.len(), 50);
        let track = planner.track();
        let end = out.trajectory.points()[49];
        let TrackPosition { d, .. } = track.to_track(&Pose::new(end.x, end.y, 0.0));
        prop_assert!((0.0..=12.0).contains(&d));
    }
}

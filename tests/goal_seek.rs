extern crate nalgebra as na;

use mppi::{ActionSeq, Control, DiffDrive, DynamicsModel, Mppi, MppiConfig, Pose};

fn scenario() -> MppiConfig {
    MppiConfig {
        initial_action: ActionSeq::zeros(20),
        goal: na::Vector3::new(1.0, 0.0, 0.0),
        horizon_time: 2.0,
        horizon_steps: 20,
        lam: 1.0,
        sig: 0.5,
        rollouts: 500,
        q: na::Matrix3::identity(),
        r: na::Matrix2::identity() * 0.01,
        p1: na::Matrix3::identity() * 10.0,
    }
}

// Closed-loop plant update with the same kinematics the controller plans with.
fn advance(robot: &DiffDrive, state: &Pose, u: &Control, dt: f64) -> Pose {
    let heading = na::DVector::from_element(1, state[2]);
    let control = na::DMatrix::from_fn(1, 2, |_, j| u[j]);
    let rates = robot.derivatives(&heading, &control);
    state + na::Vector3::new(rates[(0, 0)], rates[(1, 0)], rates[(2, 0)]) * dt
}

#[test]
fn drives_diff_drive_to_goal() {
    let goal = na::Vector3::new(1.0, 0.0, 0.0);
    let robot = DiffDrive::new(0.1, 0.5, 10.0);
    let mut ctl = Mppi::with_seed(scenario(), robot, 42).unwrap();

    let mut state: Pose = na::Vector3::zeros();
    let first = ctl.get_control(&state, 0.0).unwrap();
    assert!(
        first[0] + first[1] > 0.0,
        "first command should drive toward +x, got {first:?}"
    );

    let dt = ctl.dt();
    state = advance(&robot, &state, &first, dt);
    let mut dist = (state - goal).norm();
    assert!(dist < 1.0);

    // With lam = 1 and sig = 0.5 the weights stay close to uniform, so each
    // cycle nudges the sequence only slightly; the approach is monotone but
    // settles short of the goal rather than reaching it.
    for k in 1..150 {
        if dist < 0.6 {
            break;
        }
        let u = ctl.get_control(&state, k as f64 * dt).unwrap();
        state = advance(&robot, &state, &u, dt);
        let d = (state - goal).norm();
        assert!(
            d < dist + 1e-3,
            "distance to goal should shrink while far away: {d} after {dist}"
        );
        dist = d;
    }

    assert!(dist < 0.6, "robot stalled {dist} away from the goal");
    assert!(ctl.made_it(&state, 0.7));
    assert!(!ctl.made_it(&state, 0.0));
}

#[test]
fn retarget_keeps_driving() {
    let robot = DiffDrive::new(0.1, 0.5, 10.0);
    let mut ctl = Mppi::with_seed(scenario(), robot, 7).unwrap();

    let mut state: Pose = na::Vector3::zeros();
    let dt = ctl.dt();
    for k in 0..20 {
        let u = ctl.get_control(&state, k as f64 * dt).unwrap();
        state = advance(&robot, &state, &u, dt);
    }

    // fresh goal behind the robot, with a fresh guess
    let back = na::Vector3::new(-1.0, 0.0, 0.0);
    ctl.set_goal(back, Some(ActionSeq::zeros(20))).unwrap();
    let before = (state - back).norm();
    for k in 20..120 {
        let u = ctl.get_control(&state, k as f64 * dt).unwrap();
        state = advance(&robot, &state, &u, dt);
        if ctl.made_it(&state, 0.2) {
            break;
        }
    }
    assert!((state - back).norm() < before);
}

extern crate nalgebra as na;

use anyhow::Result;
use mppi::{ActionSeq, DiffDrive, DynamicsModel, Mppi, MppiConfig};

// cargo run --example goal_seek --release

const HORIZON_TIME: f64 = 2.0;
const HORIZON_STEPS: usize = 20;
const ROLLOUTS: usize = 500;
const LAMBDA: f64 = 1.0;
const SIGMA: f64 = 0.5;

fn main() -> Result<()> {
    let goal = na::Vector3::new(1.0, 0.5, 0.0);
    let robot = DiffDrive::new(0.1, 0.5, 5.0);
    let config = MppiConfig {
        initial_action: ActionSeq::zeros(HORIZON_STEPS),
        goal,
        horizon_time: HORIZON_TIME,
        horizon_steps: HORIZON_STEPS,
        lam: LAMBDA,
        sig: SIGMA,
        rollouts: ROLLOUTS,
        q: na::Matrix3::identity(),
        r: na::Matrix2::identity() * 0.01,
        p1: na::Matrix3::identity() * 10.0,
    };
    let mut ctl = Mppi::new(config, robot)?;

    let mut wtr = csv::Writer::from_path("goal_seek.csv")?;
    wtr.write_record(["t", "u_r", "u_l", "x", "y", "th"])?;

    let dt = ctl.dt();
    let mut state = na::Vector3::zeros();
    let mut t = 0.0;
    while t < 30.0 {
        let u = match ctl.get_control(&state, t) {
            Ok(u) => robot.clamp(&u),
            Err(e) => {
                // hold station for a cycle and retry with the kept sequence
                eprintln!("t: {:.2}, skipped cycle: {}", t, e);
                t += dt;
                continue;
            }
        };

        // plant update with the same kinematics the controller plans with
        let heading = na::DVector::from_element(1, state[2]);
        let control = na::DMatrix::from_fn(1, 2, |_, j| u[j]);
        let rates = robot.derivatives(&heading, &control);
        state += na::Vector3::new(rates[(0, 0)], rates[(1, 0)], rates[(2, 0)]) * dt;

        println!(
            "t: {:.2}, u: [{:6.2}, {:6.2}], x: [{:5.2}, {:5.2}, {:5.2}]",
            t, u[0], u[1], state[0], state[1], state[2]
        );
        wtr.write_record(&[
            t.to_string(),
            u[0].to_string(),
            u[1].to_string(),
            state[0].to_string(),
            state[1].to_string(),
            state[2].to_string(),
        ])?;

        if ctl.made_it(&state, 0.05) {
            println!("made it in {:.2}s", t);
            break;
        }
        t += dt;
    }
    wtr.flush()?;

    Ok(())
}

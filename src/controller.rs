use rayon::prelude::*;

use crate::model::DynamicsModel;
use crate::sampler::PerturbationSampler;
use crate::savgol::Savgol;
use crate::{ActionSeq, Control, MppiError, Pose};

/// Smoothing polynomial order; the window always spans the horizon minus one.
const SAVGOL_ORDER: usize = 3;
/// Additive floor keeping the weight normalizer away from zero when every
/// rollout is equally bad.
const WEIGHT_FLOOR: f64 = 1e-8;
/// Slack on the positive semi-definite check of the cost weights.
const PSD_TOL: f64 = 1e-9;

/// Constructor parameters for [`Mppi`].
#[derive(Debug, Clone)]
pub struct MppiConfig {
    /// Initial guess for the horizon, one column per step. Its first column
    /// becomes the seed action appended after every warm-start shift.
    pub initial_action: ActionSeq,
    /// Target pose (x, y, heading).
    pub goal: Pose,
    /// Duration covered by the horizon; `dt = horizon_time / horizon_steps`.
    pub horizon_time: f64,
    pub horizon_steps: usize,
    /// Temperature. Lower values chase the best rollouts, higher values
    /// average over all of them.
    pub lam: f64,
    /// Scale of the sampled perturbations, also the weight of the
    /// control-cost cross term in the stage cost.
    pub sig: f64,
    /// Number of rollouts per cycle.
    pub rollouts: usize,
    /// State tracking weight.
    pub q: na::Matrix3<f64>,
    /// Control effort weight.
    pub r: na::Matrix2<f64>,
    /// Terminal state weight.
    pub p1: na::Matrix3<f64>,
}

impl MppiConfig {
    fn validate(&self) -> Result<(), MppiError> {
        if self.rollouts == 0 {
            return Err(MppiError::NoRollouts);
        }
        if self.horizon_steps == 0 {
            return Err(MppiError::NoHorizon);
        }
        if !(self.horizon_time > 0.0) {
            return Err(MppiError::HorizonTime(self.horizon_time));
        }
        if !(self.lam > 0.0) {
            return Err(MppiError::Temperature(self.lam));
        }
        if !(self.sig >= 0.0) {
            return Err(MppiError::Deviation(self.sig));
        }
        if self.initial_action.ncols() != self.horizon_steps {
            return Err(MppiError::ActionLength {
                got: self.initial_action.ncols(),
                expected: self.horizon_steps,
            });
        }
        if !psd3(&self.q) {
            return Err(MppiError::IndefiniteWeight { name: "Q" });
        }
        if !psd2(&self.r) {
            return Err(MppiError::IndefiniteWeight { name: "R" });
        }
        if !psd3(&self.p1) {
            return Err(MppiError::IndefiniteWeight { name: "P1" });
        }
        Ok(())
    }
}

fn psd3(m: &na::Matrix3<f64>) -> bool {
    (m + na::Matrix3::identity() * PSD_TOL).cholesky().is_some()
}

fn psd2(m: &na::Matrix2<f64>) -> bool {
    (m + na::Matrix2::identity() * PSD_TOL).cholesky().is_some()
}

/// MPPI (Model Predictive Path Integral) controller.
///
/// Owns the warm-started action sequence and the goal. `&mut self` on
/// [`get_control`](Mppi::get_control) and [`set_goal`](Mppi::set_goal) keeps
/// the sequence from being torn mid-update; share the controller behind a
/// mutex if a planning thread retargets it.
pub struct Mppi<M> {
    robot: M,
    sampler: PerturbationSampler,
    smoother: Savgol,
    goal: Pose,
    /// Mean action sequence, 2 x horizon.
    a: ActionSeq,
    /// Appended to the tail after each warm-start shift.
    a0: Control,
    horizon: usize,
    dt: f64,
    lam: f64,
    sig: f64,
    rollouts: usize,
    q: na::Matrix3<f64>,
    r: na::Matrix2<f64>,
    p1: na::Matrix3<f64>,
    /// Timestamp of the last issued command. Diagnostic only, never consumed
    /// by the optimization.
    last_time: f64,
}

impl<M: DynamicsModel> Mppi<M> {
    pub fn new(config: MppiConfig, robot: M) -> Result<Self, MppiError> {
        let sampler = PerturbationSampler::from_entropy(config.sig)?;
        Self::with_sampler(config, robot, sampler)
    }

    /// Builds a controller whose rollouts are reproducible from `seed`.
    pub fn with_seed(config: MppiConfig, robot: M, seed: u64) -> Result<Self, MppiError> {
        let sampler = PerturbationSampler::seeded(config.sig, seed)?;
        Self::with_sampler(config, robot, sampler)
    }

    pub fn with_sampler(
        config: MppiConfig,
        robot: M,
        sampler: PerturbationSampler,
    ) -> Result<Self, MppiError> {
        config.validate()?;
        let smoother = Savgol::new(config.horizon_steps - 1, SAVGOL_ORDER)?;
        let a0 = config.initial_action.column(0).into_owned();
        Ok(Self {
            robot,
            sampler,
            smoother,
            goal: config.goal,
            a: config.initial_action,
            a0,
            horizon: config.horizon_steps,
            dt: config.horizon_time / config.horizon_steps as f64,
            lam: config.lam,
            sig: config.sig,
            rollouts: config.rollouts,
            q: config.q,
            r: config.r,
            p1: config.p1,
            last_time: 0.0,
        })
    }

    /// Runs one optimization cycle and returns the wheel command to issue.
    ///
    /// Samples `rollouts` perturbed control sequences, integrates them
    /// through the dynamics model, turns the costs-to-go into per-step
    /// importance weights, updates and smooths the mean sequence, then
    /// shifts it one step for the next cycle with the seed action appended.
    ///
    /// On [`MppiError::NonFiniteCost`] the action sequence is left exactly
    /// as it was, so the caller can hold the previous command and retry.
    pub fn get_control(&mut self, state: &Pose, time: f64) -> Result<Control, MppiError> {
        let h = self.horizon;
        let n = self.rollouts;

        // all rollouts start from the measured state
        let mut states = na::MatrixXx3::from_fn(n, |_, c| state[c]);
        let mut eps: Vec<na::DMatrix<f64>> = Vec::with_capacity(h);
        let mut costs: Vec<na::DVector<f64>> = Vec::with_capacity(h + 1);

        for t in 0..h {
            let e = self.sampler.draw(n);
            let a_t: Control = self.a.column(t).into_owned();
            costs.push(self.stage_cost(&states, &a_t, &e, t)?);
            let perturbed = na::DMatrix::from_fn(n, 2, |i, j| a_t[j] + e[(i, j)]);
            states = self.step(&states, &perturbed);
            eps.push(e);
        }
        costs.push(self.terminal_cost(&states)?);

        let togo = cost_to_go(costs);

        let mut updated = self.a.clone();
        for t in 0..h {
            let w = importance_weights(&togo[t], self.lam);
            let delta = eps[t].transpose() * &w;
            updated[(0, t)] += delta[0];
            updated[(1, t)] += delta[1];
        }

        for ch in 0..2 {
            let row: Vec<f64> = updated.row(ch).iter().copied().collect();
            for (t, v) in self.smoother.smooth(&row).into_iter().enumerate() {
                updated[(ch, t)] = v;
            }
        }

        let cmd: Control = updated.column(0).into_owned();

        // warm start: drop the issued step, append the seed action
        let a0 = self.a0;
        self.a = ActionSeq::from_fn(h, |r, t| if t + 1 < h { updated[(r, t + 1)] } else { a0[r] });
        self.last_time = time;

        Ok(cmd)
    }

    /// Retargets the controller. A replacement action sequence swaps both the
    /// warm start and the seed action; without one the existing sequence is
    /// kept, which may be a poor guess when the new goal is far from the old.
    pub fn set_goal(&mut self, goal: Pose, action_seq: Option<ActionSeq>) -> Result<(), MppiError> {
        if let Some(seq) = action_seq {
            if seq.ncols() != self.horizon {
                return Err(MppiError::ActionLength {
                    got: seq.ncols(),
                    expected: self.horizon,
                });
            }
            self.a0 = seq.column(0).into_owned();
            self.a = seq;
        }
        self.goal = goal;
        Ok(())
    }

    /// Whether `state` is strictly within `lim` of the goal (L2).
    pub fn made_it(&self, state: &Pose, lim: f64) -> bool {
        (state - self.goal).norm() < lim
    }

    pub fn goal(&self) -> &Pose {
        &self.goal
    }

    pub fn action_sequence(&self) -> &ActionSeq {
        &self.a
    }

    pub fn seed_action(&self) -> &Control {
        &self.a0
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn last_time(&self) -> f64 {
        self.last_time
    }

    /// One explicit Euler step for the whole batch.
    fn step(&self, states: &na::MatrixXx3<f64>, control: &na::DMatrix<f64>) -> na::MatrixXx3<f64> {
        let heading = states.column(2).into_owned();
        let rates = self.robot.derivatives(&heading, control);
        states + rates.transpose() * self.dt
    }

    /// Quadratic stage cost per rollout, with the MPPI cross term tying the
    /// mean control to each rollout's perturbation.
    fn stage_cost(
        &self,
        states: &na::MatrixXx3<f64>,
        a: &Control,
        eps: &na::DMatrix<f64>,
        step: usize,
    ) -> Result<na::DVector<f64>, MppiError> {
        let goal = &self.goal;
        let q = &self.q;
        let control_cost = a.dot(&(self.r * a));
        let lam_sig = self.lam * self.sig;
        let costs: Vec<f64> = (0..self.rollouts)
            .into_par_iter()
            .map(|i| {
                let dx = na::Vector3::new(
                    states[(i, 0)] - goal[0],
                    states[(i, 1)] - goal[1],
                    states[(i, 2)] - goal[2],
                );
                let cross = lam_sig * (a[0] * eps[(i, 0)] + a[1] * eps[(i, 1)]);
                dx.dot(&(q * dx)) + control_cost + cross
            })
            .collect();
        finite(costs, step)
    }

    fn terminal_cost(&self, states: &na::MatrixXx3<f64>) -> Result<na::DVector<f64>, MppiError> {
        let goal = &self.goal;
        let p1 = &self.p1;
        let costs: Vec<f64> = (0..self.rollouts)
            .into_par_iter()
            .map(|i| {
                let dx = na::Vector3::new(
                    states[(i, 0)] - goal[0],
                    states[(i, 1)] - goal[1],
                    states[(i, 2)] - goal[2],
                );
                dx.dot(&(p1 * dx))
            })
            .collect();
        finite(costs, self.horizon)
    }
}

fn finite(costs: Vec<f64>, step: usize) -> Result<na::DVector<f64>, MppiError> {
    if costs.iter().all(|c| c.is_finite()) {
        Ok(na::DVector::from_vec(costs))
    } else {
        Err(MppiError::NonFiniteCost { step })
    }
}

/// Reverse cumulative sum: entry `t` becomes the cost from step `t` through
/// the end of the horizon, terminal cost included.
fn cost_to_go(mut costs: Vec<na::DVector<f64>>) -> Vec<na::DVector<f64>> {
    for t in (0..costs.len().saturating_sub(1)).rev() {
        let next = costs[t + 1].clone();
        costs[t] += next;
    }
    costs
}

/// Normalized exponential weights over the rollouts for one time step. The
/// minimum cost is subtracted first so the exponential cannot overflow.
fn importance_weights(togo: &na::DVector<f64>, lam: f64) -> na::DVector<f64> {
    let min = togo.min();
    let mut w = togo.map(|c| ((min - c) / lam).exp() + WEIGHT_FLOOR);
    let sum = w.sum();
    w /= sum;
    w
}

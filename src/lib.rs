//! Model Predictive Path Integral (MPPI) control for wheeled robots.
//!
//! Each control cycle the [`Mppi`] controller perturbs its current action
//! sequence with Gaussian noise, simulates the rollouts through a
//! [`DynamicsModel`], scores them against a quadratic cost, and combines the
//! perturbations by exponentially weighted averaging. The first entry of the
//! smoothed sequence is issued as the command and the rest is kept as the
//! warm start for the next cycle.

extern crate nalgebra as na;

pub mod controller;
pub mod error;
pub mod model;
pub mod sampler;
pub mod savgol;

pub use controller::{Mppi, MppiConfig};
pub use error::MppiError;
pub use model::{DiffDrive, DynamicsModel};
pub use sampler::PerturbationSampler;
pub use savgol::Savgol;

/// Robot pose and goal representation: x, y, heading.
pub type Pose = na::Vector3<f64>;
/// One wheel command pair: right, left wheel velocity.
pub type Control = na::Vector2<f64>;
/// Horizon of wheel commands, one column per step.
pub type ActionSeq = na::Matrix2xX<f64>;

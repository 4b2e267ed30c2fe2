use crate::Control;

/// Batched robot kinematics, `x_dot = f(heading, u)`.
///
/// Implementations must be pure over the rollout dimension: entry `i` of the
/// output depends only on entry `i` of the inputs, so the controller may
/// evaluate rollouts in any order or in parallel.
pub trait DynamicsModel {
    /// State rates for a batch of rollouts.
    ///
    /// `heading` holds one orientation per rollout and `control` is an N x 2
    /// matrix of (right, left) wheel velocities. Returns a 3 x N matrix whose
    /// columns are the (x, y, heading) rates.
    fn derivatives(&self, heading: &na::DVector<f64>, control: &na::DMatrix<f64>)
        -> na::Matrix3xX<f64>;
}

/// Differential drive kinematic model.
#[derive(Debug, Clone, Copy)]
pub struct DiffDrive {
    /// Wheel radius.
    pub radius: f64,
    /// Distance between the wheels.
    pub wheel_base: f64,
    /// Max velocity a wheel can spin. Not consulted by the controller;
    /// callers clamp issued commands against it.
    pub wheel_speed_limit: f64,
}

impl DiffDrive {
    pub fn new(radius: f64, wheel_base: f64, wheel_speed_limit: f64) -> Self {
        Self {
            radius,
            wheel_base,
            wheel_speed_limit,
        }
    }

    /// Clamps a command pair to the wheel speed limit.
    pub fn clamp(&self, u: &Control) -> Control {
        u.map(|v| v.clamp(-self.wheel_speed_limit, self.wheel_speed_limit))
    }
}

impl DynamicsModel for DiffDrive {
    fn derivatives(
        &self,
        heading: &na::DVector<f64>,
        control: &na::DMatrix<f64>,
    ) -> na::Matrix3xX<f64> {
        na::Matrix3xX::from_fn(heading.len(), |row, i| {
            let right = control[(i, 0)];
            let left = control[(i, 1)];
            match row {
                0 => self.radius / 2.0 * heading[i].cos() * (right + left),
                1 => self.radius / 2.0 * heading[i].sin() * (right + left),
                _ => self.radius / self.wheel_base * (right - left),
            }
        })
    }
}

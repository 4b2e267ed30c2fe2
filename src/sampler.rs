use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::MppiError;

/// Gaussian exploration noise for the rollouts.
///
/// Owns its generator so a fixed seed reproduces the exact perturbation
/// stream. Samples are independent across rollouts, time steps and control
/// channels. A zero deviation is allowed and yields all-zero draws.
pub struct PerturbationSampler {
    rng: Xoshiro256PlusPlus,
    dist: Normal<f64>,
}

impl PerturbationSampler {
    pub fn from_entropy(sig: f64) -> Result<Self, MppiError> {
        Ok(Self {
            rng: Xoshiro256PlusPlus::from_entropy(),
            dist: Self::dist(sig)?,
        })
    }

    pub fn seeded(sig: f64, seed: u64) -> Result<Self, MppiError> {
        Ok(Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            dist: Self::dist(sig)?,
        })
    }

    fn dist(sig: f64) -> Result<Normal<f64>, MppiError> {
        if !(sig >= 0.0) {
            return Err(MppiError::Deviation(sig));
        }
        Normal::new(0.0, sig).map_err(|_| MppiError::Deviation(sig))
    }

    /// Draws one N x 2 perturbation matrix, one row per rollout.
    pub fn draw(&mut self, rollouts: usize) -> na::DMatrix<f64> {
        na::DMatrix::from_fn(rollouts, 2, |_, _| self.dist.sample(&mut self.rng))
    }
}

use thiserror::Error;

/// Failures from controller configuration, goal updates and per-cycle
/// computation.
#[derive(Debug, Error)]
pub enum MppiError {
    #[error("action sequence has {got} steps, expected horizon of {expected}")]
    ActionLength { got: usize, expected: usize },
    #[error("rollout count must be positive")]
    NoRollouts,
    #[error("horizon must contain at least one step")]
    NoHorizon,
    #[error("horizon time must be positive, got {0}")]
    HorizonTime(f64),
    #[error("temperature lambda must be positive, got {0}")]
    Temperature(f64),
    #[error("perturbation deviation must be non-negative, got {0}")]
    Deviation(f64),
    #[error("cost weight {name} must be positive semi-definite")]
    IndefiniteWeight { name: &'static str },
    #[error("smoothing window must be odd and wider than the polynomial order, got {0}")]
    SmoothingWindow(usize),
    #[error("failed to derive smoothing coefficients for window {0}")]
    SmoothingDesign(usize),
    /// A rollout cost evaluated to NaN/Inf, usually a diverging dynamics
    /// model. The cycle is aborted before the exponential weighting and the
    /// action sequence is left untouched.
    #[error("non-finite rollout cost at horizon step {step}")]
    NonFiniteCost { step: usize },
}

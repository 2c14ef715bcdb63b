//! Physical constants and solver parameters

/// Speed of light in vacuum (m/s), for converting arrival times in seconds to range units
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Added under the square root of every residual distance so the gradient
/// stays defined when a candidate position sits on a receiver
pub const RESIDUAL_EPSILON: f64 = 1e-8;

/// Minimum receivers for any position estimate
pub const MIN_RECEIVERS: usize = 3;

/// Minimum receivers for the linearized least-squares solver
pub const MIN_RECEIVERS_LINEAR: usize = 4;

/// Minimum receivers for nonlinear refinement (one receiver pair)
pub const MIN_RECEIVERS_REFINEMENT: usize = 2;

/// Relative size below which a baseline or an off-axis offset counts as zero
/// (coincident or collinear receivers)
pub const GEOMETRY_EPSILON: f64 = 1e-9;

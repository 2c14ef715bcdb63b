//! TDOA Positioning System
//!
//! Estimates a 2D emitter position from the arrival timestamps reported by
//! three or more fixed receivers: a closed-form solution for three receivers,
//! linearized least squares for more, and optional Levenberg-Marquardt
//! refinement of the true hyperbolic residuals.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod validation;
pub mod utils;
pub mod api;

// Re-export commonly used types
pub use core::{Position, Receiver, SPEED_OF_LIGHT};
pub use algorithms::{
    exact_tdoa, initial_guess, linear_tdoa, nonlinear_optimization, ArmPreference, Estimate, ExactSolver,
    LinearSolver, Method, NonlinearRefiner, Refinement, Solution, SolverKind, TdoaLocator, TdoaResidual,
};
pub use validation::{LocatorError, LocatorResult, SolveWarning};
pub use utils::config::{ConfigurationManager, LocatorConfig};

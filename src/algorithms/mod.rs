//! Positioning algorithms

pub mod algebra;
pub mod estimate;
pub mod exact;
pub mod linear;
pub mod locator;
pub mod refinement;
pub mod residual;

pub use estimate::{Estimate, SolverKind};
pub use exact::{exact_tdoa, ArmPreference, ExactSolver};
pub use linear::{linear_tdoa, LinearSolver};
pub use locator::{initial_guess, Method, Solution, TdoaLocator};
pub use refinement::{nonlinear_optimization, NonlinearRefiner, Refinement, Termination};
pub use residual::TdoaResidual;

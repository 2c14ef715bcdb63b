//! Levenberg-Marquardt refinement of a position estimate
//!
//! Minimizes `½ Σ r_ij²` over every unordered receiver pair, with Jacobian rows
//! obtained from the dual-number evaluation of [`TdoaResidual`].

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::algorithms::estimate::{Estimate, SolverKind};
use crate::algorithms::residual::{pairwise_residuals, TdoaResidual};
use crate::core::{Position, Receiver, MIN_RECEIVERS_REFINEMENT};
use crate::validation::error::{LocatorError, LocatorResult, SolveWarning};

/// Why the iteration stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Relative cost decrease fell below `function_tolerance`
    FunctionTolerance,
    /// Max-norm of the gradient fell below `gradient_tolerance`
    GradientTolerance,
    /// Step length fell below `parameter_tolerance` relative to the iterate
    ParameterTolerance,
    /// `max_iterations` steps were taken
    MaxIterations,
    /// The damped normal equations could not be factored
    SingularSystem,
}

impl Termination {
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            Termination::FunctionTolerance | Termination::GradientTolerance | Termination::ParameterTolerance
        )
    }
}

/// Outcome of a refinement run
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    /// Best iterate, flagged with `NonConverged` when no tolerance was met
    pub estimate: Estimate,
    pub converged: bool,
    pub iterations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub termination: Termination,
}

impl Refinement {
    pub fn position(&self) -> Position {
        self.estimate.position
    }
}

/// Nonlinear least-squares refiner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonlinearRefiner {
    /// Maximum number of LM steps
    pub max_iterations: usize,
    /// Relative cost decrease counted as converged
    pub function_tolerance: f64,
    /// Gradient max-norm counted as converged
    pub gradient_tolerance: f64,
    /// Step length, relative to the iterate, counted as converged
    pub parameter_tolerance: f64,
    /// Initial damping, scaled by the largest diagonal entry of `JᵀJ`
    pub initial_damping: f64,
}

impl Default for NonlinearRefiner {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            function_tolerance: 1e-6,
            gradient_tolerance: 1e-10,
            parameter_tolerance: 1e-8,
            initial_damping: 1e-4,
        }
    }
}

/// Cost, `JᵀJ` and `Jᵀr` at one iterate
struct Linearization {
    cost: f64,
    normal: Matrix2<f64>,
    gradient: Vector2<f64>,
}

impl NonlinearRefiner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Refine `initial` against every receiver pair.
    ///
    /// Only fewer than two receivers is an error. A run that stops without
    /// meeting a tolerance still returns its best iterate, with
    /// `converged == false` and a `NonConverged` warning on the estimate.
    pub fn refine(&self, receivers: &[Receiver], initial: Position) -> LocatorResult<Refinement> {
        if receivers.len() < MIN_RECEIVERS_REFINEMENT {
            return Err(LocatorError::InsufficientReceivers {
                available: receivers.len(),
                required: MIN_RECEIVERS_REFINEMENT,
            });
        }

        let residuals = pairwise_residuals(receivers);
        let mut point = initial.to_vector();
        let mut current = Self::linearize(&residuals, &point);
        let initial_cost = current.cost;

        let mut mu = self.initial_damping * current.normal[(0, 0)].max(current.normal[(1, 1)]);
        let mut nu = 2.0;
        let mut iterations = 0;
        let mut termination = Termination::MaxIterations;

        while iterations < self.max_iterations {
            if current.gradient.amax() <= self.gradient_tolerance {
                termination = Termination::GradientTolerance;
                break;
            }

            let damped = current.normal + Matrix2::identity() * mu;
            let step = match damped.cholesky() {
                Some(factor) => factor.solve(&-current.gradient),
                None => {
                    termination = Termination::SingularSystem;
                    break;
                }
            };
            iterations += 1;

            if step.norm() <= self.parameter_tolerance * (point.norm() + self.parameter_tolerance) {
                termination = Termination::ParameterTolerance;
                break;
            }

            let candidate = point + step;
            let next = Self::linearize(&residuals, &candidate);
            let predicted = 0.5 * step.dot(&(step * mu - current.gradient));
            let gain = if predicted > 0.0 {
                (current.cost - next.cost) / predicted
            } else {
                -1.0
            };
            trace!(iterations, cost = current.cost, gain, mu, "lm step");

            if gain > 0.0 {
                let decrease = current.cost - next.cost;
                let previous_cost = current.cost;
                point = candidate;
                current = next;
                mu *= (1.0 / 3.0_f64).max(1.0 - (2.0 * gain - 1.0).powi(3));
                nu = 2.0;
                if decrease <= self.function_tolerance * previous_cost {
                    termination = Termination::FunctionTolerance;
                    break;
                }
            } else {
                mu *= nu;
                nu *= 2.0;
            }
        }

        let converged = termination.is_converged();
        let mut estimate = Estimate::new(point.into(), SolverKind::Nonlinear);
        if converged {
            debug!(iterations, initial_cost, final_cost = current.cost, ?termination, "refinement converged");
        } else {
            warn!(iterations, final_cost = current.cost, ?termination, "refinement did not converge");
            estimate = estimate.with_warning(SolveWarning::NonConverged {
                iterations,
                final_cost: current.cost,
            });
        }

        Ok(Refinement {
            estimate,
            converged,
            iterations,
            initial_cost,
            final_cost: current.cost,
            termination,
        })
    }

    fn linearize(residuals: &[TdoaResidual], point: &Vector2<f64>) -> Linearization {
        let mut cost = 0.0;
        let mut normal = Matrix2::zeros();
        let mut gradient = Vector2::zeros();

        for residual in residuals {
            let (value, row) = residual.value_and_gradient(point.x, point.y);
            cost += 0.5 * value * value;
            normal += row * row.transpose();
            gradient += row * value;
        }

        Linearization { cost, normal, gradient }
    }
}

/// Refine with default settings, returning the position and convergence flag
pub fn nonlinear_optimization(receivers: &[Receiver], initial: Position) -> LocatorResult<Refinement> {
    NonlinearRefiner::default().refine(receivers, initial)
}

//! Solver dispatch: closed-form or linearized initial guess, optionally refined

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::algorithms::estimate::Estimate;
use crate::algorithms::exact::ExactSolver;
use crate::algorithms::linear::LinearSolver;
use crate::algorithms::refinement::{NonlinearRefiner, Refinement};
use crate::core::{Position, Receiver, MIN_RECEIVERS};
use crate::validation::error::{LocatorError, LocatorResult};

/// Positioning method offered to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Method {
    /// Initial guess only
    #[default]
    Linear = 1,
    /// Initial guess followed by nonlinear refinement
    Nonlinear = 2,
}

impl Method {
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for Method {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Method::Linear),
            2 => Ok(Method::Nonlinear),
            other => Err(format!("Invalid method {}: expected 1 (linear) or 2 (nonlinear)", other)),
        }
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "linear" => Ok(Method::Linear),
            "2" | "nonlinear" => Ok(Method::Nonlinear),
            other => Err(format!("Invalid method '{}': expected 1, 2, linear or nonlinear", other)),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Linear => write!(f, "linear"),
            Method::Nonlinear => write!(f, "nonlinear"),
        }
    }
}

/// Located emitter; `converged` is set only when refinement ran
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub estimate: Estimate,
    pub converged: Option<bool>,
}

impl Solution {
    pub fn position(&self) -> Position {
        self.estimate.position
    }
}

/// Stateless dispatcher over the three solvers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TdoaLocator {
    pub exact: ExactSolver,
    pub linear: LinearSolver,
    pub refiner: NonlinearRefiner,
}

impl TdoaLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact solve for three receivers, linearized solve for more
    pub fn initial_guess(&self, receivers: &[Receiver]) -> LocatorResult<Estimate> {
        match receivers.len() {
            n if n < MIN_RECEIVERS => Err(LocatorError::InsufficientReceivers {
                available: n,
                required: MIN_RECEIVERS,
            }),
            MIN_RECEIVERS => {
                debug!(receivers = MIN_RECEIVERS, "dispatching to exact solver");
                self.exact.solve(receivers)
            }
            n => {
                debug!(receivers = n, "dispatching to linear solver");
                self.linear.solve(receivers)
            }
        }
    }

    /// Refine `initial` against `receivers`
    pub fn refine(&self, receivers: &[Receiver], initial: Position) -> LocatorResult<Refinement> {
        self.refiner.refine(receivers, initial)
    }

    /// Full pipeline for one record.
    ///
    /// With `Method::Nonlinear` the refined estimate keeps the warnings of
    /// the initial guess ahead of its own.
    pub fn locate(&self, receivers: &[Receiver], method: Method) -> LocatorResult<Solution> {
        let initial = self.initial_guess(receivers)?;
        match method {
            Method::Linear => Ok(Solution {
                estimate: initial,
                converged: None,
            }),
            Method::Nonlinear => {
                let refinement = self.refine(receivers, initial.position)?;
                let mut estimate = refinement.estimate;
                let mut warnings = initial.warnings;
                warnings.append(&mut estimate.warnings);
                estimate.warnings = warnings;
                Ok(Solution {
                    estimate,
                    converged: Some(refinement.converged),
                })
            }
        }
    }
}

/// Initial guess with default solver settings
pub fn initial_guess(receivers: &[Receiver]) -> LocatorResult<Estimate> {
    TdoaLocator::default().initial_guess(receivers)
}

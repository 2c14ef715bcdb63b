//! Linearized least-squares multilateration for four or more receivers
//!
//! Differencing every hyperbolic range equation against receiver 0 removes the
//! quadratic range term and leaves `A · [Δ, x, y]ᵀ = b`, where `Δ` is the unknown
//! range from the emitter to receiver 0.

use nalgebra::{DMatrix, DVector, Dyn, SVD};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::algorithms::algebra::norm_sq;
use crate::algorithms::estimate::{Estimate, SolverKind};
use crate::core::{Position, Receiver, MIN_RECEIVERS_LINEAR};
use crate::validation::error::{LocatorError, LocatorResult, SolveWarning};

/// Linearized TDOA solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearSolver {
    /// Singular values below `rank_tolerance × σ_max` count as zero
    pub rank_tolerance: f64,
}

impl Default for LinearSolver {
    fn default() -> Self {
        Self { rank_tolerance: 1e-10 }
    }
}

impl LinearSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Solve the linearized system.
    ///
    /// Four receivers give a square system solved by column-pivoted QR; more
    /// receivers are solved in the least-squares sense through the SVD. A
    /// rank-deficient system still yields the least-norm answer, flagged with
    /// `RankDeficientGeometry`.
    pub fn solve(&self, receivers: &[Receiver]) -> LocatorResult<Estimate> {
        if receivers.len() < MIN_RECEIVERS_LINEAR {
            return Err(LocatorError::InsufficientReceivers {
                available: receivers.len(),
                required: MIN_RECEIVERS_LINEAR,
            });
        }

        let (a, b) = Self::build_system(receivers);
        let unknowns = a.ncols();

        let svd = SVD::new(a.clone(), true, true);
        let sigma_max = svd.singular_values.max();
        let sigma_min = svd.singular_values.min();
        let eps = self.rank_tolerance * sigma_max;
        let rank = svd.rank(eps);

        let solution = if receivers.len() == MIN_RECEIVERS_LINEAR && rank == unknowns {
            match a.col_piv_qr().solve(&b) {
                Some(sol) => sol,
                None => Self::svd_solve(&svd, &b, eps)?,
            }
        } else {
            Self::svd_solve(&svd, &b, eps)?
        };

        debug!(receivers = receivers.len(), rank, range_offset = solution[0], "linear solve");

        let mut estimate = Estimate::new(Position::new(solution[1], solution[2]), SolverKind::Linear);
        if rank < unknowns {
            let condition_number = if sigma_min > 0.0 { sigma_max / sigma_min } else { f64::INFINITY };
            warn!(rank, condition_number, "rank-deficient receiver geometry");
            estimate = estimate.with_warning(SolveWarning::RankDeficientGeometry { rank, condition_number });
        }
        Ok(estimate)
    }

    /// Row `i` pairs receiver 0 with receiver `i + 1`
    fn build_system(receivers: &[Receiver]) -> (DMatrix<f64>, DVector<f64>) {
        let r0 = &receivers[0];
        let rows = receivers.len() - 1;
        let mut a = DMatrix::zeros(rows, 3);
        let mut b = DVector::zeros(rows);

        for (i, ri) in receivers[1..].iter().enumerate() {
            let tau = r0.timestamp - ri.timestamp;
            a[(i, 0)] = -tau;
            a[(i, 1)] = r0.x - ri.x;
            a[(i, 2)] = r0.y - ri.y;
            b[i] = 0.5 * (tau * tau + norm_sq(r0.x, r0.y) - norm_sq(ri.x, ri.y));
        }

        (a, b)
    }

    fn svd_solve(svd: &SVD<f64, Dyn, Dyn>, b: &DVector<f64>, eps: f64) -> LocatorResult<DVector<f64>> {
        svd.solve(b, eps).map_err(|e| LocatorError::NoRealSolution {
            detail: format!("least-squares solve failed: {}", e),
        })
    }
}

/// Linear solve with default tolerances
pub fn linear_tdoa(receivers: &[Receiver]) -> LocatorResult<Estimate> {
    LinearSolver::default().solve(receivers)
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::algorithms::exact::ArmPreference;
use crate::core::Position;

/// Result type for single-solve operations
pub type LocatorResult<T> = Result<T, LocatorError>;

/// Failures of a single position solve
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocatorError {
    /// Fewer receivers than the solver needs
    #[error("Insufficient receivers: {available} available, {required} required")]
    InsufficientReceivers { available: usize, required: usize },

    /// A receiver record has the wrong shape or non-numeric content
    #[error("Malformed measurement for {field}: {reason}")]
    MalformedMeasurement { field: String, reason: String },

    /// The timestamps admit no real position for this geometry
    #[error("No real solution exists for the position: {detail}")]
    NoRealSolution { detail: String },

    /// Neither closed-form candidate reproduces the observed range-difference sign
    #[error("No candidate matches the observed range difference {tau:.6}")]
    NoConsistentSolution { tau: f64 },
}

/// How badly an error affects the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// The solve produced no position
    Critical,
    /// The input was rejected before solving
    High,
}

impl LocatorError {
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        LocatorError::MalformedMeasurement {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable tag
    pub fn kind(&self) -> &'static str {
        match self {
            LocatorError::InsufficientReceivers { .. } => "insufficient_receivers",
            LocatorError::MalformedMeasurement { .. } => "malformed_measurement",
            LocatorError::NoRealSolution { .. } => "no_real_solution",
            LocatorError::NoConsistentSolution { .. } => "no_consistent_solution",
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            LocatorError::InsufficientReceivers { .. } | LocatorError::MalformedMeasurement { .. } => {
                ErrorSeverity::High
            }
            LocatorError::NoRealSolution { .. } | LocatorError::NoConsistentSolution { .. } => {
                ErrorSeverity::Critical
            }
        }
    }

    /// Hard failures of a solve, as opposed to input rejected at the boundary
    /// or geometry that merely degrades the answer
    pub fn is_hard_failure(&self) -> bool {
        matches!(
            self,
            LocatorError::InsufficientReceivers { .. } | LocatorError::NoRealSolution { .. }
        )
    }
}

/// Non-fatal diagnostics attached to an estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SolveWarning {
    /// Both closed-form candidates match the observation; `chosen` names the arm returned
    AmbiguousSolution {
        chosen: ArmPreference,
        alternative: Position,
    },
    /// The linearized system is (near-)singular; the answer is a least-norm best effort
    RankDeficientGeometry { rank: usize, condition_number: f64 },
    /// The refiner ran out of iterations before meeting any tolerance
    NonConverged { iterations: usize, final_cost: f64 },
    /// Two receivers of the record sit closer than the validator's minimum separation
    CoincidentReceivers { first: usize, second: usize, distance: f64 },
    /// A range difference longer than the baseline cannot come from any emitter position
    ImpossibleTimeDifference {
        first: usize,
        second: usize,
        tau: f64,
        baseline: f64,
    },
}

impl SolveWarning {
    pub fn kind(&self) -> &'static str {
        match self {
            SolveWarning::AmbiguousSolution { .. } => "ambiguous_solution",
            SolveWarning::RankDeficientGeometry { .. } => "rank_deficient_geometry",
            SolveWarning::NonConverged { .. } => "non_converged",
            SolveWarning::CoincidentReceivers { .. } => "coincident_receivers",
            SolveWarning::ImpossibleTimeDifference { .. } => "impossible_time_difference",
        }
    }
}

impl std::fmt::Display for SolveWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveWarning::AmbiguousSolution { chosen, alternative } => write!(
                f,
                "Multiple solutions exist; {:?} arm returned (other arm at {:.5}, {:.5})",
                chosen, alternative.x, alternative.y
            ),
            SolveWarning::RankDeficientGeometry { rank, condition_number } => write!(
                f,
                "Rank-deficient receiver geometry (rank {}, condition number {:.3e})",
                rank, condition_number
            ),
            SolveWarning::NonConverged { iterations, final_cost } => write!(
                f,
                "Refinement did not converge after {} iterations (cost {:.3e})",
                iterations, final_cost
            ),
            SolveWarning::CoincidentReceivers { first, second, distance } => {
                write!(f, "Receivers {} and {} coincide: {:.3e} apart", first, second, distance)
            }
            SolveWarning::ImpossibleTimeDifference { first, second, tau, baseline } => write!(
                f,
                "Time difference {:.5} between receivers {} and {} exceeds their baseline {:.5}",
                tau, first, second, baseline
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_failure_classification() {
        let insufficient = LocatorError::InsufficientReceivers { available: 2, required: 3 };
        let no_real = LocatorError::NoRealSolution { detail: "negative discriminant".to_string() };
        let malformed = LocatorError::malformed("gnb1", "expected 3 values, got 2");
        let inconsistent = LocatorError::NoConsistentSolution { tau: 2.0 };

        assert!(insufficient.is_hard_failure());
        assert!(no_real.is_hard_failure());
        assert!(!malformed.is_hard_failure());
        assert!(!inconsistent.is_hard_failure());

        assert_eq!(malformed.severity(), ErrorSeverity::High);
        assert_eq!(no_real.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_error_display() {
        let err = LocatorError::InsufficientReceivers { available: 2, required: 3 };
        assert_eq!(err.to_string(), "Insufficient receivers: 2 available, 3 required");
        assert_eq!(err.kind(), "insufficient_receivers");
    }

    #[test]
    fn test_warning_serialization_is_tagged() {
        let warning = SolveWarning::NonConverged { iterations: 50, final_cost: 0.25 };
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "non_converged");
        assert_eq!(json["iterations"], 50);
        assert_eq!(warning.kind(), "non_converged");
    }
}

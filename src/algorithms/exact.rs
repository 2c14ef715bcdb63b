//! Closed-form hyperbolic trilateration for three receivers
//!
//! The frame is rotated so the first receiver sits at the origin and the
//! reference receiver on the positive x-axis. The reference is whichever of the
//! other two shows the larger range difference to the first. The two range-difference hyperbolas then reduce to a
//! quadratic in the rotated x-coordinate, whose roots are mapped back and
//! filtered by the sign of the observed range difference.

use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::algorithms::algebra::{norm, sgn};
use crate::algorithms::estimate::{Estimate, SolverKind};
use crate::core::{Receiver, GEOMETRY_EPSILON, MIN_RECEIVERS};
use crate::validation::error::{LocatorError, LocatorResult, SolveWarning};

/// Which quadratic root to return when both match the observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmPreference {
    #[default]
    Positive,
    Negative,
}

/// Exact three-receiver solver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExactSolver {
    /// Candidate returned for ambiguous geometry
    pub arm: ArmPreference,
}

/// Coefficients of the rotated-frame problem, kept for diagnostics
#[derive(Debug, Clone, Copy)]
struct Quadratic {
    g: f64,
    h: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Quadratic {
    fn discriminant(&self) -> f64 {
        self.e * self.e - 4.0 * self.d * self.f
    }
}

impl ExactSolver {
    pub fn new(arm: ArmPreference) -> Self {
        Self { arm }
    }

    /// Solve from the first three receivers.
    ///
    /// Fails with `NoRealSolution` for coincident or collinear stations, for
    /// three equal timestamps and for timestamps the geometry cannot reproduce,
    /// and with `NoConsistentSolution` when neither root has the sign of the
    /// reference range difference.
    pub fn solve(&self, receivers: &[Receiver]) -> LocatorResult<Estimate> {
        if receivers.len() < MIN_RECEIVERS {
            return Err(LocatorError::InsufficientReceivers {
                available: receivers.len(),
                required: MIN_RECEIVERS,
            });
        }

        let r0 = &receivers[0];
        let (mut r1, mut r2) = (&receivers[1], &receivers[2]);
        let mut tau_01 = r0.timestamp - r1.timestamp;
        let mut tau_02 = r0.timestamp - r2.timestamp;
        // The closed form divides by the reference range difference, so the
        // larger one anchors the frame
        if tau_02.abs() > tau_01.abs() {
            std::mem::swap(&mut r1, &mut r2);
            std::mem::swap(&mut tau_01, &mut tau_02);
        }

        let s0 = r0.to_vector();
        let s1 = r1.to_vector();
        let s2 = r2.to_vector();

        let theta = (r1.y - r0.y).atan2(r1.x - r0.x);
        let rotation = Rotation2::new(theta);
        let s1r = rotation.inverse_transform_vector(&(s1 - s0));
        let s2r = rotation.inverse_transform_vector(&(s2 - s0));

        let b = s1r.x;
        let cx = s2r.x;
        let cy = s2r.y;
        let c = norm(cx, cy);

        if b.abs() < GEOMETRY_EPSILON || c < GEOMETRY_EPSILON {
            return Err(LocatorError::NoRealSolution {
                detail: "receivers coincide".to_string(),
            });
        }
        if cy.abs() <= GEOMETRY_EPSILON * c.max(b) {
            return Err(LocatorError::NoRealSolution {
                detail: "receivers are collinear".to_string(),
            });
        }
        if tau_01.abs() <= GEOMETRY_EPSILON * c.max(b) {
            return Err(LocatorError::NoRealSolution {
                detail: "all receivers report the same timestamp".to_string(),
            });
        }

        let q = Self::coefficients(b, cx, cy, c, tau_01, tau_02);
        let discriminant = q.discriminant();
        debug!(theta, tau_01, discriminant, "exact solve");

        if !discriminant.is_finite() || discriminant < 0.0 {
            return Err(LocatorError::NoRealSolution {
                detail: format!("discriminant {:.6e}", discriminant),
            });
        }

        let root = discriminant.sqrt();
        let xp = (-q.e + root) / (2.0 * q.d);
        let xm = (-q.e - root) / (2.0 * q.d);
        let positive = rotation * Vector2::new(xp, q.g * xp + q.h) + s0;
        let negative = rotation * Vector2::new(xm, q.g * xm + q.h) + s0;

        if !positive.iter().chain(negative.iter()).all(|v| v.is_finite()) {
            return Err(LocatorError::NoRealSolution {
                detail: "quadratic degenerates for this geometry".to_string(),
            });
        }

        // A valid candidate reproduces the sign of the reference range difference
        let observed = sgn(tau_01);
        let matches = |p: &Vector2<f64>| sgn((p - s0).norm() - (p - s1).norm()) == observed;

        match (matches(&positive), matches(&negative)) {
            (true, true) => {
                let (chosen, alternative) = match self.arm {
                    ArmPreference::Positive => (positive, negative),
                    ArmPreference::Negative => (negative, positive),
                };
                warn!(arm = ?self.arm, "multiple exact solutions exist");
                Ok(Estimate::new(chosen.into(), SolverKind::Exact).with_warning(
                    SolveWarning::AmbiguousSolution {
                        chosen: self.arm,
                        alternative: alternative.into(),
                    },
                ))
            }
            (true, false) => Ok(Estimate::new(positive.into(), SolverKind::Exact)),
            (false, true) => Ok(Estimate::new(negative.into(), SolverKind::Exact)),
            (false, false) => Err(LocatorError::NoConsistentSolution { tau: tau_01 }),
        }
    }

    /// Line `y = g·x + h` linking both hyperbolas, then `d·x² + e·x + f = 0`
    fn coefficients(b: f64, cx: f64, cy: f64, c: f64, tau_01: f64, tau_02: f64) -> Quadratic {
        let ratio = b / tau_01;
        let k = 1.0 - ratio * ratio;

        let g = ((tau_02 / tau_01) * b - cx) / cy;
        let h = (c * c - tau_02 * tau_02 + tau_01 * tau_02 * k) / (2.0 * cy);

        let d = -(1.0 + g * g - ratio * ratio);
        let e = b * k - 2.0 * g * h;
        let f = tau_01 * tau_01 / 4.0 * k * k - h * h;

        Quadratic { g, h, d, e, f }
    }
}

/// Exact solve with an explicit arm preference
pub fn exact_tdoa(receivers: &[Receiver], arm: ArmPreference) -> LocatorResult<Estimate> {
    ExactSolver::new(arm).solve(receivers)
}

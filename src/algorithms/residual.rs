//! TDOA residual for one receiver pair, generic over the scalar type
//!
//! The same formula is evaluated at `f64` for cost and at dual numbers for
//! forward-mode derivatives, so the refiner never hand-codes a Jacobian.

use nalgebra::Vector2;
use num_dual::{Dual64, DualNum};

use crate::core::{Receiver, RESIDUAL_EPSILON};

/// Residual `(t_i - t_j) - (|r_i - p| - |r_j - p|)` for the pair `(i, j)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TdoaResidual {
    pub first: Receiver,
    pub second: Receiver,
}

impl TdoaResidual {
    pub fn new(first: Receiver, second: Receiver) -> Self {
        Self { first, second }
    }

    /// Evaluate at `(x, y)` for any scalar carrying `f64` arithmetic
    pub fn evaluate<D: DualNum<f64>>(&self, x: D, y: D) -> D {
        let d_first = smoothed_distance(&self.first, x.clone(), y.clone());
        let d_second = smoothed_distance(&self.second, x, y);
        (d_second - d_first) + (self.first.timestamp - self.second.timestamp)
    }

    pub fn value(&self, x: f64, y: f64) -> f64 {
        self.evaluate(x, y)
    }

    /// Residual value and its gradient in `(x, y)`, one dual pass per coordinate
    pub fn value_and_gradient(&self, x: f64, y: f64) -> (f64, Vector2<f64>) {
        let along_x = self.evaluate(Dual64::new(x, 1.0), Dual64::new(y, 0.0));
        let along_y = self.evaluate(Dual64::new(x, 0.0), Dual64::new(y, 1.0));
        (along_x.re, Vector2::new(along_x.eps, along_y.eps))
    }
}

/// Distance with `RESIDUAL_EPSILON` under the root, differentiable at the receiver
fn smoothed_distance<D: DualNum<f64>>(receiver: &Receiver, x: D, y: D) -> D {
    let dx = x - receiver.x;
    let dy = y - receiver.y;
    (dx.clone() * dx + dy.clone() * dy + RESIDUAL_EPSILON).sqrt()
}

/// One residual per unordered receiver pair `i < j`
pub fn pairwise_residuals(receivers: &[Receiver]) -> Vec<TdoaResidual> {
    let mut residuals = Vec::with_capacity(receivers.len() * receivers.len().saturating_sub(1) / 2);
    for (i, first) in receivers.iter().enumerate() {
        for second in &receivers[i + 1..] {
            residuals.push(TdoaResidual::new(*first, *second));
        }
    }
    residuals
}

//! Scalar geometry helpers shared by the solvers

/// Squared Euclidean norm of (x, y)
#[inline]
pub fn norm_sq(x: f64, y: f64) -> f64 {
    x * x + y * y
}

/// Euclidean norm of (x, y)
#[inline]
pub fn norm(x: f64, y: f64) -> f64 {
    norm_sq(x, y).sqrt()
}

/// Sign of `value` as -1, 0 or 1
#[inline]
pub fn sgn(value: f64) -> i8 {
    (0.0 < value) as i8 - (value < 0.0) as i8
}

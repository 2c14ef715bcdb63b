//! Core data types for the positioning system

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// 2D position estimate in the receivers' coordinate frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self::default()
    }

    /// Euclidean distance to another position
    pub fn distance_to(&self, other: &Position) -> f64 {
        (self.to_vector() - other.to_vector()).norm()
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<Vector2<f64>> for Position {
    fn from(v: Vector2<f64>) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl From<Position> for Vector2<f64> {
    fn from(p: Position) -> Self {
        p.to_vector()
    }
}

/// Fixed reference station with the arrival time it measured for the current event.
///
/// Timestamps are expressed in range units (time multiplied by the propagation
/// speed), so timestamp differences compare directly with distance differences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    pub x: f64,
    pub y: f64,
    pub timestamp: f64,
}

impl Receiver {
    pub fn new(x: f64, y: f64, timestamp: f64) -> Self {
        Self { x, y, timestamp }
    }

    /// Station geometry only; the timestamp is assigned later per measurement round
    pub fn at(x: f64, y: f64) -> Self {
        Self { x, y, timestamp: 0.0 }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    /// Copy of this station carrying a new arrival timestamp
    pub fn with_timestamp(&self, timestamp: f64) -> Self {
        Self { timestamp, ..*self }
    }

    pub fn distance_to(&self, position: &Position) -> f64 {
        self.position().distance_to(position)
    }
}

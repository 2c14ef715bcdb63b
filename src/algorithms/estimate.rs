//! Solver output carrying the position and any diagnostics

use serde::{Deserialize, Serialize};

use crate::core::Position;
use crate::validation::error::SolveWarning;

/// Which algorithm produced an estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    Exact,
    Linear,
    Nonlinear,
}

/// Position estimate with the warnings raised while computing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub position: Position,
    pub solver: SolverKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<SolveWarning>,
}

impl Estimate {
    pub fn new(position: Position, solver: SolverKind) -> Self {
        Self {
            position,
            solver,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: SolveWarning) -> Self {
        self.warnings.push(warning);
        self
    }
}

use serde::{Deserialize, Serialize};

/// Why a solve stopped. Every variant still carries a usable iterate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Optimality and feasibility tolerances met.
    Converged,
    /// Iteration limit reached first.
    MaxIterations,
    /// Wall-clock budget exhausted first.
    TimeLimit,
    /// No acceptable step could be found.
    Stalled,
    /// The step system could not be factorized.
    NumericalFailure,
    /// The problem has bounds or inequalities this backend does not handle.
    InvalidProblem,
}

impl SolveStatus {
    pub fn is_converged(self) -> bool {
        matches!(self, Self::Converged)
    }
}

/// Solution returned by an [`super::NlpSolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NlpSolution {
    /// Best iterate (the final one when converged).
    pub x: Vec<f64>,
    /// Constraint multipliers matching `x`.
    pub lambda: Vec<f64>,
    pub status: SolveStatus,
    /// Newton iterations performed.
    pub iterations: usize,
    /// Objective value at `x`.
    pub objective: f64,
    /// `max_j |g_j(x) - g_target_j|`.
    pub max_constraint_violation: f64,
    /// Scaled `||∇f + Jᵀλ||∞` at `x`.
    pub dual_infeasibility: f64,
    /// Wall time spent in the solver, in milliseconds.
    pub elapsed_ms: f64,
}

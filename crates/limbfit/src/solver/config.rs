use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the exact-penalty weight of the merit function evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyStrategy {
    /// Raise the weight whenever the multiplier estimates outgrow it.
    #[default]
    Adaptive,
    /// Keep `initial_penalty` for the whole solve.
    Fixed,
}

/// Termination and globalization settings for the SQP backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Tolerance on the scaled dual infeasibility `||∇f + Jᵀλ||∞`.
    pub tol: f64,
    /// Tolerance on `max_j |g_j(x) - g_target_j|`.
    pub constr_viol_tol: f64,
    /// Maximum number of Newton iterations.
    pub max_iter: usize,
    /// Hard wall-clock budget per solve, in milliseconds.
    pub max_wall_time_ms: f64,
    /// Merit penalty update policy.
    pub penalty: PenaltyStrategy,
    /// Starting weight of the constraint-violation term in the merit function.
    pub initial_penalty: f64,
    /// Emit one `trace` event per iteration.
    pub log_iterations: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tol: 1e-4,
            constr_viol_tol: 1e-4,
            max_iter: 100,
            max_wall_time_ms: 50.0,
            penalty: PenaltyStrategy::Adaptive,
            initial_penalty: 1.0,
            log_iterations: false,
        }
    }
}

impl SolverConfig {
    pub fn wall_time_budget(&self) -> Duration {
        Duration::from_secs_f64((self.max_wall_time_ms / 1000.0).max(0.0))
    }
}

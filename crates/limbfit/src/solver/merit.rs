use nalgebra::DVector;

use super::config::PenaltyStrategy;

/// Headroom kept above the largest multiplier magnitude.
const PENALTY_MARGIN: f64 = 1.1;
const PENALTY_FLOOR: f64 = 1e-6;

/// Weight `ν` of the l1 merit `φ(x) = f(x) + ν ||c(x)||₁`.
#[derive(Debug, Clone, Copy)]
pub(super) struct PenaltyParameter {
    strategy: PenaltyStrategy,
    value: f64,
}

impl PenaltyParameter {
    pub fn new(strategy: PenaltyStrategy, initial: f64) -> Self {
        Self {
            strategy,
            value: initial.max(PENALTY_FLOOR),
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Keep `ν > ||λ||∞` so that a Newton step is a merit descent direction.
    /// Never decreases.
    pub fn update(&mut self, lambda: &DVector<f64>) {
        if self.strategy == PenaltyStrategy::Fixed {
            return;
        }
        let required = PENALTY_MARGIN * lambda.amax() + PENALTY_FLOOR;
        if required > self.value {
            self.value = required;
        }
    }

    pub fn merit(&self, objective: f64, residual: &DVector<f64>) -> f64 {
        objective + self.value * residual.lp_norm(1)
    }
}

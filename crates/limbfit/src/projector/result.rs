use serde::{Deserialize, Serialize};

use crate::chain::TaggedPoint;
use crate::solver::SolveStatus;

/// Length-corrected chain, root excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainProjection {
    /// Corrected non-root keypoints in chain order.
    pub points: Vec<TaggedPoint>,
    /// Solver outcome; the points are usable for every status.
    pub status: SolveStatus,
    pub iterations: usize,
    /// Sum of squared displacements from the observations.
    pub objective: f64,
    /// Largest `| ||p_j - p_{j-1}||² - L_j² |` over all segments.
    pub max_constraint_violation: f64,
    pub elapsed_ms: f64,
}

impl ChainProjection {
    pub fn is_converged(&self) -> bool {
        self.status.is_converged()
    }

    /// Corrected position for `tag`, if it belongs to this chain.
    pub fn position(&self, tag: &str) -> Option<[f64; 3]> {
        self.points
            .iter()
            .find(|p| p.tag == tag)
            .map(|p| p.position)
    }
}

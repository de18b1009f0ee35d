//! Chain projector: bone-length preserving correction of one keypoint chain.
//!
//! [`ChainProjector`] is the primary entry point. Each call formulates a
//! fresh [`LimbProblem`], seeds it with the observed chain, runs the solver
//! under its iteration and wall-clock budget, and maps the solution back to
//! tagged points. A call never fails once its inputs are valid: timeouts and
//! non-convergence are reported through [`ChainProjection::status`].
//!
//! # Examples
//!
//! ```
//! use limbfit::{Chain, ChainProjector, SegmentLengths, TaggedPoint};
//!
//! let chain = Chain::new(vec![
//!     TaggedPoint::new("shoulder", [0.0, 0.0, 0.0]),
//!     TaggedPoint::new("elbow", [0.31, 0.02, 0.0]),
//!     TaggedPoint::new("hand", [0.33, 0.27, 0.01]),
//! ])
//! .unwrap();
//! let lengths = SegmentLengths::new(vec![0.3, 0.25]).unwrap();
//!
//! let projection = ChainProjector::default().project(&chain, &lengths).unwrap();
//! assert_eq!(projection.points[0].tag, "elbow");
//! assert!(projection.max_constraint_violation < 1e-3);
//! ```

mod result;
mod warm_start;

#[cfg(test)]
mod tests;

pub use result::ChainProjection;

use crate::chain::{Chain, ChainError, KeyPoint, SegmentLengths, TaggedPoint};
use crate::config::{ProjectorConfig, WarmStartConfig};
use crate::nlp::LimbProblem;
use crate::solver::{NlpSolution, NlpSolver, SqpSolver};

/// Projects observed chains onto fixed segment lengths.
///
/// Holds configuration only; every call allocates its own problem and solver
/// state, so one projector can serve several threads.
#[derive(Debug, Clone)]
pub struct ChainProjector<S = SqpSolver> {
    solver: S,
    warm_start: WarmStartConfig,
}

impl Default for ChainProjector<SqpSolver> {
    fn default() -> Self {
        Self::new(ProjectorConfig::default())
    }
}

impl ChainProjector<SqpSolver> {
    /// Projector backed by the bundled SQP solver.
    pub fn new(config: ProjectorConfig) -> Self {
        Self {
            solver: SqpSolver::new(config.solver),
            warm_start: config.warm_start,
        }
    }
}

impl<S: NlpSolver> ChainProjector<S> {
    /// Projector backed by a custom solver.
    pub fn with_solver(solver: S, warm_start: WarmStartConfig) -> Self {
        Self { solver, warm_start }
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn warm_start(&self) -> &WarmStartConfig {
        &self.warm_start
    }

    /// Correct `chain` so that segment `j` has length `lengths[j]`.
    ///
    /// Fails only when the number of lengths differs from the number of
    /// segments.
    pub fn project(
        &self,
        chain: &Chain,
        lengths: &SegmentLengths,
    ) -> Result<ChainProjection, ChainError> {
        let problem = LimbProblem::new(chain, lengths)?;
        let x0 = warm_start::initial_iterate(chain, lengths, &self.warm_start);
        let problem = problem.with_start(x0);

        let solution = self.solver.solve(&problem);
        log_solution(chain, &solution);
        Ok(extract(chain, solution))
    }

    /// Linked-list entry point: validates raw inputs, then projects.
    pub fn project_linked(
        &self,
        root: &KeyPoint,
        lengths: &[f64],
    ) -> Result<ChainProjection, ChainError> {
        let chain = Chain::from_root(root)?;
        let lengths = SegmentLengths::new(lengths.to_vec())?;
        self.project(&chain, &lengths)
    }
}

fn log_solution(chain: &Chain, solution: &NlpSolution) {
    if solution.status.is_converged() {
        tracing::debug!(
            root = %chain.root().tag,
            iterations = solution.iterations,
            objective = solution.objective,
            violation = solution.max_constraint_violation,
            elapsed_ms = solution.elapsed_ms,
            "chain projected"
        );
    } else {
        tracing::warn!(
            root = %chain.root().tag,
            status = ?solution.status,
            iterations = solution.iterations,
            violation = solution.max_constraint_violation,
            elapsed_ms = solution.elapsed_ms,
            "chain projection did not converge, returning best iterate"
        );
    }
}

/// Pair every non-root tag with its 3-block of the solution, in chain order.
fn extract(chain: &Chain, solution: NlpSolution) -> ChainProjection {
    let points = chain
        .descendants()
        .iter()
        .zip(solution.x.chunks_exact(3))
        .map(|(kp, p)| TaggedPoint::new(kp.tag.clone(), [p[0], p[1], p[2]]))
        .collect();

    ChainProjection {
        points,
        status: solution.status,
        iterations: solution.iterations,
        objective: solution.objective,
        max_constraint_violation: solution.max_constraint_violation,
        elapsed_ms: solution.elapsed_ms,
    }
}

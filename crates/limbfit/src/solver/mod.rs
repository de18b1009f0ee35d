//! Constrained NLP solver backends.
//!
//! [`NlpSolver`] is the seam between problem formulations
//! ([`crate::nlp::ConstrainedNlp`]) and numerical backends. The bundled
//! [`SqpSolver`] handles equality constraints on free variables, which is
//! all the chain projection needs.

mod config;
mod kkt;
mod merit;
mod result;
mod sqp;

pub use config::{PenaltyStrategy, SolverConfig};
pub use result::{NlpSolution, SolveStatus};
pub use sqp::SqpSolver;

use crate::nlp::ConstrainedNlp;

/// A backend able to drive a [`ConstrainedNlp`] to a (local) solution.
///
/// Implementations must always return an iterate, reporting problems through
/// [`SolveStatus`] instead of failing.
pub trait NlpSolver {
    fn solve(&self, nlp: &dyn ConstrainedNlp) -> NlpSolution;
}

//! limbfit: bone-length preserving correction of 3D skeletal keypoint chains.
//!
//! Skeleton trackers report joint positions with noise that makes bone
//! lengths fluctuate from frame to frame. limbfit moves the observed joints
//! of a kinematic chain (e.g. shoulder → elbow → hand) as little as possible,
//! in the least-squares sense, so that every segment matches a known length
//! exactly. The chain root stays fixed.
//!
//! The pieces are:
//!
//! 1. **Chain** – tagged keypoints, linked or flattened, and target lengths.
//! 2. **NLP** – the length-constrained least-squares formulation with analytic
//!    derivatives and sparsity ([`nlp::ConstrainedNlp`]).
//! 3. **Solver** – a Newton-KKT / SQP backend with iteration and wall-clock
//!    budgets ([`solver::NlpSolver`]).
//! 4. **Projector** – warm start, solve, and result extraction
//!    ([`ChainProjector`]).
//! 5. **Skeleton** – standard limbs, reference lengths, and whole-frame
//!    projection ([`SkeletonProjector`]).
//!
//! # Public API
//! - [`ChainProjector`] with [`ProjectorConfig`] as the primary entry point
//! - [`Chain`], [`KeyPoint`], [`SegmentLengths`] inputs and [`ChainProjection`] output
//! - [`nlp`] and [`solver`] traits for plugging in other formulations or backends

mod chain;
mod config;
pub mod nlp;
mod projector;
pub mod skeleton;
pub mod solver;

#[cfg(test)]
pub(crate) mod test_utils;

pub use chain::{Chain, ChainError, KeyPoint, KeyPointIter, SegmentLengths, TaggedPoint};
pub use config::{ProjectorConfig, WarmStartConfig};
pub use projector::{ChainProjection, ChainProjector};
pub use skeleton::{Limb, LimbLengths, SkeletonFrame, SkeletonProjection, SkeletonProjector};
pub use solver::{PenaltyStrategy, SolveStatus, SolverConfig};

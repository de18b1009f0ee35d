//! Length-constrained least-squares formulation for one kinematic chain.
//!
//!   min  Σ_j ||p_j - obs_j||²
//!   s.t. ||p_j - p_{j-1}||² = L_j²,   j = 0..m-1,   p_{-1} = root
//!
//! The root is held fixed; only the `m` descendants are decision variables.

use nalgebra::Vector3;

use crate::chain::{Chain, ChainError, SegmentLengths};

use super::sparsity::{
    chain_hessian_values, chain_jacobian_nnz, chain_jacobian_pattern, lower_triangle_nnz,
    lower_triangle_pattern,
};
use super::{ConstrainedNlp, NlpBounds, NlpDims, SparsityPattern};

#[inline]
fn block(x: &[f64], j: usize) -> Vector3<f64> {
    Vector3::new(x[3 * j], x[3 * j + 1], x[3 * j + 2])
}

/// Projection problem for one chain against fixed segment lengths.
#[derive(Debug, Clone)]
pub struct LimbProblem {
    root: Vector3<f64>,
    observed: Vec<Vector3<f64>>,
    lengths_sq: Vec<f64>,
    start: Vec<f64>,
}

impl LimbProblem {
    /// Formulate the problem; the starting point is the observed chain.
    pub fn new(chain: &Chain, lengths: &SegmentLengths) -> Result<Self, ChainError> {
        chain.ensure_matches(lengths)?;
        let observed: Vec<Vector3<f64>> =
            chain.descendants().iter().map(|p| p.vector()).collect();
        let start = observed.iter().flat_map(|p| [p.x, p.y, p.z]).collect();
        Ok(Self {
            root: chain.root().vector(),
            observed,
            lengths_sq: lengths.as_slice().iter().map(|l| l * l).collect(),
            start,
        })
    }

    /// Replace the initial iterate. `x0` must hold `3m` values.
    pub fn with_start(mut self, x0: Vec<f64>) -> Self {
        debug_assert_eq!(x0.len(), self.start.len());
        self.start = x0;
        self
    }

    /// Number of movable points `m`.
    pub fn n_points(&self) -> usize {
        self.observed.len()
    }

    pub fn root(&self) -> Vector3<f64> {
        self.root
    }

    pub fn observed(&self) -> &[Vector3<f64>] {
        &self.observed
    }

    pub fn target_lengths_sq(&self) -> &[f64] {
        &self.lengths_sq
    }

    /// Predecessor of point `j` in `x`: the root for `j == 0`.
    #[inline]
    fn prev(&self, x: &[f64], j: usize) -> Vector3<f64> {
        if j == 0 {
            self.root
        } else {
            block(x, j - 1)
        }
    }
}

impl ConstrainedNlp for LimbProblem {
    fn dims(&self) -> NlpDims {
        let m = self.n_points();
        NlpDims {
            n_vars: 3 * m,
            n_constraints: m,
            nnz_jacobian: chain_jacobian_nnz(m),
            nnz_hessian: lower_triangle_nnz(3 * m),
        }
    }

    fn bounds(&self) -> NlpBounds {
        let n = 3 * self.n_points();
        NlpBounds {
            x_lower: vec![f64::NEG_INFINITY; n],
            x_upper: vec![f64::INFINITY; n],
            g_lower: self.lengths_sq.clone(),
            g_upper: self.lengths_sq.clone(),
        }
    }

    fn starting_point(&self, x: &mut [f64]) {
        x.copy_from_slice(&self.start);
    }

    fn objective(&self, x: &[f64]) -> f64 {
        self.observed
            .iter()
            .enumerate()
            .map(|(j, obs)| (block(x, j) - obs).norm_squared())
            .sum()
    }

    fn objective_gradient(&self, x: &[f64], grad: &mut [f64]) {
        for (j, obs) in self.observed.iter().enumerate() {
            let d = 2.0 * (block(x, j) - obs);
            grad[3 * j..3 * j + 3].copy_from_slice(d.as_slice());
        }
    }

    fn constraints(&self, x: &[f64], g: &mut [f64]) {
        for (j, gj) in g.iter_mut().enumerate() {
            *gj = (block(x, j) - self.prev(x, j)).norm_squared();
        }
    }

    fn jacobian_structure(&self) -> SparsityPattern {
        chain_jacobian_pattern(self.n_points())
    }

    fn jacobian_values(&self, x: &[f64], values: &mut [f64]) {
        // Same layout as `chain_jacobian_pattern`: predecessor block first.
        let mut k = 0;
        for j in 0..self.n_points() {
            let d = 2.0 * (block(x, j) - self.prev(x, j));
            if j > 0 {
                values[k..k + 3].copy_from_slice((-d).as_slice());
                k += 3;
            }
            values[k..k + 3].copy_from_slice(d.as_slice());
            k += 3;
        }
    }

    fn hessian_structure(&self) -> SparsityPattern {
        lower_triangle_pattern(3 * self.n_points())
    }

    fn hessian_values(&self, _x: &[f64], obj_factor: f64, lambda: &[f64], values: &mut [f64]) {
        chain_hessian_values(obj_factor, lambda, values);
    }
}

//! Nonlinear-program interface between formulations and solver backends.
//!
//! A formulation describes a problem of the form
//!
//!   min f(x)  s.t.  g_l <= g(x) <= g_u,  x_l <= x <= x_u
//!
//! through callbacks that fill caller-owned buffers. Derivative matrices are
//! exchanged as triplets: the structure (row/column lists) is queried once
//! per solve, values are re-evaluated at every iterate in the same order.
//! Equalities are expressed with `g_l[j] == g_u[j]`.

mod limb;
mod sparsity;

pub use limb::LimbProblem;
pub use sparsity::{chain_hessian_values, chain_jacobian_pattern, lower_triangle_pattern};

/// Problem dimensions reported by a formulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NlpDims {
    /// Number of decision variables.
    pub n_vars: usize,
    /// Number of constraint rows.
    pub n_constraints: usize,
    /// Nonzeros in the constraint Jacobian.
    pub nnz_jacobian: usize,
    /// Nonzeros in the lower triangle of the Lagrangian Hessian.
    pub nnz_hessian: usize,
}

/// Variable and constraint bounds. Infinite values mean "unbounded".
#[derive(Debug, Clone, PartialEq)]
pub struct NlpBounds {
    pub x_lower: Vec<f64>,
    pub x_upper: Vec<f64>,
    pub g_lower: Vec<f64>,
    pub g_upper: Vec<f64>,
}

impl NlpBounds {
    /// True when every variable is free and every constraint is an equality.
    pub fn is_equality_only(&self) -> bool {
        self.x_lower.iter().all(|v| *v == f64::NEG_INFINITY)
            && self.x_upper.iter().all(|v| *v == f64::INFINITY)
            && self
                .g_lower
                .iter()
                .zip(&self.g_upper)
                .all(|(l, u)| l == u && l.is_finite())
    }
}

/// Coordinate list of structurally nonzero entries of a sparse matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparsityPattern {
    rows: Vec<usize>,
    cols: Vec<usize>,
}

impl SparsityPattern {
    pub fn with_capacity(nnz: usize) -> Self {
        Self {
            rows: Vec::with_capacity(nnz),
            cols: Vec::with_capacity(nnz),
        }
    }

    pub fn push(&mut self, row: usize, col: usize) {
        self.rows.push(row);
        self.cols.push(col);
    }

    pub fn nnz(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn cols(&self) -> &[usize] {
        &self.cols
    }

    /// `(row, col)` pairs in value order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.rows.iter().copied().zip(self.cols.iter().copied())
    }
}

/// Callback interface a constrained NLP formulation exposes to a solver.
///
/// All slices are sized according to [`ConstrainedNlp::dims`].
pub trait ConstrainedNlp {
    fn dims(&self) -> NlpDims;

    fn bounds(&self) -> NlpBounds;

    /// Fill the initial iterate.
    fn starting_point(&self, x: &mut [f64]);

    fn objective(&self, x: &[f64]) -> f64;

    fn objective_gradient(&self, x: &[f64], grad: &mut [f64]);

    fn constraints(&self, x: &[f64], g: &mut [f64]);

    fn jacobian_structure(&self) -> SparsityPattern;

    /// Jacobian values in the order of [`ConstrainedNlp::jacobian_structure`].
    fn jacobian_values(&self, x: &[f64], values: &mut [f64]);

    /// Lower-triangular structure of the Lagrangian Hessian.
    fn hessian_structure(&self) -> SparsityPattern;

    /// Values of `obj_factor * ∇²f + Σ lambda_j ∇²g_j` in structure order.
    fn hessian_values(&self, x: &[f64], obj_factor: f64, lambda: &[f64], values: &mut [f64]);
}

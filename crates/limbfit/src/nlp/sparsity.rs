//! Derivative sparsity for chain length constraints.
//!
//! Point `j` (0-based, root excluded) owns variables `3j..3j+3`. Constraint
//! `j` couples point `j` with point `j-1`, or with the fixed root for `j == 0`.

use super::SparsityPattern;

/// Columns of variable block `block`.
fn block_cols(block: usize) -> std::ops::Range<usize> {
    3 * block..3 * block + 3
}

/// Constraint Jacobian pattern for a chain with `m` movable points.
///
/// Row 0 holds the 3 columns of block 0. Row `j >= 1` holds the columns of
/// block `j-1` followed by block `j`. Total nonzeros: `3 + 6(m-1)`.
pub fn chain_jacobian_pattern(m: usize) -> SparsityPattern {
    let mut pattern = SparsityPattern::with_capacity(chain_jacobian_nnz(m));
    for j in 0..m {
        if j > 0 {
            for c in block_cols(j - 1) {
                pattern.push(j, c);
            }
        }
        for c in block_cols(j) {
            pattern.push(j, c);
        }
    }
    pattern
}

pub(crate) fn chain_jacobian_nnz(m: usize) -> usize {
    if m == 0 {
        0
    } else {
        3 + 6 * (m - 1)
    }
}

/// Dense lower triangle of an `n x n` symmetric matrix, row-major.
pub fn lower_triangle_pattern(n: usize) -> SparsityPattern {
    let mut pattern = SparsityPattern::with_capacity(lower_triangle_nnz(n));
    for r in 0..n {
        for c in 0..=r {
            pattern.push(r, c);
        }
    }
    pattern
}

pub(crate) fn lower_triangle_nnz(n: usize) -> usize {
    n * (n + 1) / 2
}

#[inline]
fn lower_triangle_index(r: usize, c: usize) -> usize {
    debug_assert!(c <= r);
    r * (r + 1) / 2 + c
}

/// Fill Lagrangian Hessian values over [`lower_triangle_pattern`] of `3m`.
///
/// Only the band is nonzero: diagonal entries of point `j` get
/// `2 obj_factor + 2 lambda[j] + 2 lambda[j+1]` (last term while `j+1 < m`),
/// and coordinate `i` of point `j` couples with coordinate `i` of point `j-1`
/// through `-2 lambda[j]`.
pub fn chain_hessian_values(obj_factor: f64, lambda: &[f64], values: &mut [f64]) {
    let m = lambda.len();
    let n = 3 * m;
    debug_assert_eq!(values.len(), lower_triangle_nnz(n));

    values.fill(0.0);
    for r in 0..n {
        let j = r / 3;
        let mut diag = 2.0 * (obj_factor + lambda[j]);
        if j + 1 < m {
            diag += 2.0 * lambda[j + 1];
        }
        values[lower_triangle_index(r, r)] = diag;
        if j >= 1 {
            values[lower_triangle_index(r, r - 3)] = -2.0 * lambda[j];
        }
    }
}

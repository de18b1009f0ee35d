//! Newton step on the KKT system of an equality-constrained problem.
//!
//!   [ W + δI   Jᵀ ] [ dx ]   [ -∇f ]
//!   [ J        0  ] [ λ⁺ ] = [ -c  ]
//!
//! solved through the Schur complement `S = J (W + δI)⁻¹ Jᵀ`. `δ` is raised
//! until `W + δI` admits a Cholesky factorization, which keeps `dx` a descent
//! direction for the exact-penalty merit function.

use nalgebra::{DMatrix, DVector};

/// First nonzero Hessian shift tried when the previous solve needed none.
const DELTA_FIRST: f64 = 1e-4;
const DELTA_MIN: f64 = 1e-20;
const DELTA_MAX: f64 = 1e20;
const DELTA_GROWTH: f64 = 8.0;
const DELTA_DECAY: f64 = 1.0 / 3.0;
/// Shift applied to `S` when `J` is rank deficient.
const SCHUR_SHIFT: f64 = 1e-8;

#[derive(Debug, Clone)]
pub(super) struct KktStep {
    pub dx: DVector<f64>,
    pub lambda: DVector<f64>,
    /// Hessian shift `δ` that made the factorization succeed.
    pub delta: f64,
}

fn shifted(w: &DMatrix<f64>, delta: f64) -> DMatrix<f64> {
    let mut h = w.clone();
    if delta > 0.0 {
        for i in 0..h.nrows() {
            h[(i, i)] += delta;
        }
    }
    h
}

/// Solve the regularized KKT system. `last_delta` is the shift of the
/// previous iteration and seeds the search for this one.
pub(super) fn solve_kkt(
    w: &DMatrix<f64>,
    jac: &DMatrix<f64>,
    grad: &DVector<f64>,
    c: &DVector<f64>,
    last_delta: f64,
) -> Option<KktStep> {
    let mut delta = 0.0;
    let h_chol = loop {
        if let Some(chol) = shifted(w, delta).cholesky() {
            break chol;
        }
        delta = if delta > 0.0 {
            delta * DELTA_GROWTH
        } else if last_delta > 0.0 {
            (last_delta * DELTA_DECAY).max(DELTA_MIN)
        } else {
            DELTA_FIRST
        };
        if delta > DELTA_MAX {
            return None;
        }
    };

    let h_inv_jt = h_chol.solve(&jac.transpose());
    let h_inv_g = h_chol.solve(grad);
    let schur = jac * &h_inv_jt;
    let rhs = c - jac * &h_inv_g;

    let s_chol = schur.clone().cholesky().or_else(|| {
        let scale = schur.diagonal().amax().max(1.0);
        shifted(&schur, SCHUR_SHIFT * scale).cholesky()
    })?;
    let lambda = s_chol.solve(&rhs);
    let dx = -(h_inv_g + &h_inv_jt * &lambda);

    if dx.iter().chain(lambda.iter()).any(|v| !v.is_finite()) {
        return None;
    }
    Some(KktStep { dx, lambda, delta })
}

/// Minimum-norm correction `-Jᵀ(JJᵀ)⁻¹ c` toward `c = 0` along the rows of `jac`.
pub(super) fn minimum_norm_correction(
    jac: &DMatrix<f64>,
    c: &DVector<f64>,
) -> Option<DVector<f64>> {
    let jjt = jac * jac.transpose();
    let scale = jjt.diagonal().amax().max(1.0);
    let chol = jjt
        .clone()
        .cholesky()
        .or_else(|| shifted(&jjt, SCHUR_SHIFT * scale).cholesky())?;
    Some(-(jac.transpose() * chol.solve(c)))
}

/// Least-squares multipliers `argmin ||∇f + Jᵀλ||`, or zeros when they are
/// unavailable or larger than `max_abs`.
pub(super) fn least_squares_multipliers(
    jac: &DMatrix<f64>,
    grad: &DVector<f64>,
    max_abs: f64,
) -> DVector<f64> {
    let jg = jac * grad;
    (jac * jac.transpose())
        .cholesky()
        .map(|chol| -chol.solve(&jg))
        .filter(|l| l.iter().all(|v| v.is_finite()) && l.amax() <= max_abs)
        .unwrap_or_else(|| DVector::zeros(jac.nrows()))
}

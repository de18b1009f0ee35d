//! Newton-KKT (SQP) backend for equality-constrained problems with free
//! variables.
//!
//! Each iteration solves the regularized KKT system for a primal step and new
//! multipliers, then globalizes with a backtracking line search on the l1
//! exact-penalty merit function (plus one second-order correction when the
//! full step is rejected). The solve stops on convergence, iteration limit,
//! wall-clock budget or numerical failure; in every case the best iterate
//! seen so far is returned.

use std::time::Instant;

use nalgebra::{DMatrix, DVector};

use crate::nlp::{ConstrainedNlp, SparsityPattern};

use super::config::SolverConfig;
use super::kkt::{least_squares_multipliers, minimum_norm_correction, solve_kkt};
use super::merit::PenaltyParameter;
use super::result::{NlpSolution, SolveStatus};
use super::NlpSolver;

/// Sufficient-decrease fraction of the Armijo test.
const ARMIJO: f64 = 1e-4;
const MIN_STEP_FRACTION: f64 = 1e-10;
/// Relative primal step size treated as "no progress".
const TINY_STEP: f64 = 1e-14;
const MAX_TINY_STEPS: usize = 3;
/// Initial multiplier estimates above this magnitude are discarded.
const MULTIPLIER_INIT_MAX: f64 = 1e3;
/// Dual infeasibility scaling threshold.
const DUAL_SCALE_MAX: f64 = 100.0;

/// Function values and first derivatives at one point.
#[derive(Debug, Clone)]
struct Iterate {
    x: DVector<f64>,
    objective: f64,
    grad: DVector<f64>,
    /// `g(x) - g_target`.
    residual: DVector<f64>,
    jac: DMatrix<f64>,
}

impl Iterate {
    fn is_finite(&self) -> bool {
        self.objective.is_finite() && self.residual.iter().all(|v| v.is_finite())
    }

    fn violation(&self) -> f64 {
        self.residual.amax()
    }

    fn dual_infeasibility(&self, lambda: &DVector<f64>) -> f64 {
        let m = lambda.len().max(1) as f64;
        let s_d = (lambda.lp_norm(1) / m).max(DUAL_SCALE_MAX) / DUAL_SCALE_MAX;
        (&self.grad + self.jac.transpose() * lambda).amax() / s_d
    }
}

/// Evaluates a problem through cached derivative structures.
struct Evaluator<'a> {
    nlp: &'a dyn ConstrainedNlp,
    target: DVector<f64>,
    jac_structure: SparsityPattern,
    hess_structure: SparsityPattern,
    jac_values: Vec<f64>,
    hess_values: Vec<f64>,
    g: Vec<f64>,
}

impl<'a> Evaluator<'a> {
    fn new(nlp: &'a dyn ConstrainedNlp, target: Vec<f64>) -> Self {
        let jac_structure = nlp.jacobian_structure();
        let hess_structure = nlp.hessian_structure();
        Self {
            nlp,
            g: vec![0.0; target.len()],
            target: DVector::from_vec(target),
            jac_values: vec![0.0; jac_structure.nnz()],
            hess_values: vec![0.0; hess_structure.nnz()],
            jac_structure,
            hess_structure,
        }
    }

    fn evaluate(&mut self, x: DVector<f64>) -> Iterate {
        let n = x.len();
        let xs = x.as_slice();

        let objective = self.nlp.objective(xs);
        let mut grad = DVector::zeros(n);
        self.nlp.objective_gradient(xs, grad.as_mut_slice());

        self.nlp.constraints(xs, &mut self.g);
        let residual = DVector::from_column_slice(&self.g) - &self.target;

        self.nlp.jacobian_values(xs, &mut self.jac_values);
        let mut jac = DMatrix::zeros(self.target.len(), n);
        for ((r, c), v) in self.jac_structure.iter().zip(&self.jac_values) {
            jac[(r, c)] += *v;
        }

        Iterate {
            x,
            objective,
            grad,
            residual,
            jac,
        }
    }

    /// Dense symmetric Lagrangian Hessian from its lower-triangular triplets.
    fn hessian(&mut self, x: &DVector<f64>, lambda: &DVector<f64>) -> DMatrix<f64> {
        let n = x.len();
        self.nlp
            .hessian_values(x.as_slice(), 1.0, lambda.as_slice(), &mut self.hess_values);
        let mut w = DMatrix::zeros(n, n);
        for ((r, c), v) in self.hess_structure.iter().zip(&self.hess_values) {
            w[(r, c)] += *v;
            if r != c {
                w[(c, r)] += *v;
            }
        }
        w
    }
}

/// Iterate snapshot used to return the best point on early termination.
#[derive(Debug, Clone)]
struct Candidate {
    x: DVector<f64>,
    lambda: DVector<f64>,
    objective: f64,
    violation: f64,
    dual: f64,
}

impl Candidate {
    fn of(it: &Iterate, lambda: &DVector<f64>) -> Self {
        Self {
            x: it.x.clone(),
            lambda: lambda.clone(),
            objective: it.objective,
            violation: it.violation(),
            dual: it.dual_infeasibility(lambda),
        }
    }

    /// Feasible beats infeasible; among feasible prefer lower objective,
    /// among infeasible prefer lower violation.
    fn improves_on(&self, other: &Candidate, constr_viol_tol: f64) -> bool {
        let feasible = self.violation <= constr_viol_tol;
        let other_feasible = other.violation <= constr_viol_tol;
        match (feasible, other_feasible) {
            (true, false) => true,
            (false, true) => false,
            (true, true) => self.objective < other.objective,
            (false, false) => self.violation < other.violation,
        }
    }
}

/// Sequential quadratic programming solver with exact Hessian.
#[derive(Debug, Clone, Default)]
pub struct SqpSolver {
    config: SolverConfig,
}

impl SqpSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn line_search(
        &self,
        eval: &mut Evaluator<'_>,
        it: &Iterate,
        dx: &DVector<f64>,
        penalty: &PenaltyParameter,
    ) -> Option<Iterate> {
        let phi0 = penalty.merit(it.objective, &it.residual);
        let slope = (it.grad.dot(dx) - penalty.value() * it.residual.lp_norm(1)).min(0.0);

        let mut alpha = 1.0;
        while alpha >= MIN_STEP_FRACTION {
            let trial = eval.evaluate(&it.x + dx * alpha);
            if trial.is_finite()
                && penalty.merit(trial.objective, &trial.residual) <= phi0 + ARMIJO * alpha * slope
            {
                return Some(trial);
            }
            if alpha == 1.0 && trial.is_finite() {
                if let Some(corrected) = self.second_order_correction(eval, it, &trial) {
                    if corrected.is_finite()
                        && penalty.merit(corrected.objective, &corrected.residual)
                            <= phi0 + ARMIJO * slope
                    {
                        return Some(corrected);
                    }
                }
            }
            alpha *= 0.5;
        }
        None
    }

    /// Pull a rejected full step back toward the constraint manifold using
    /// the current Jacobian.
    fn second_order_correction(
        &self,
        eval: &mut Evaluator<'_>,
        it: &Iterate,
        trial: &Iterate,
    ) -> Option<Iterate> {
        let correction = minimum_norm_correction(&it.jac, &trial.residual)?;
        Some(eval.evaluate(&trial.x + correction))
    }
}

impl NlpSolver for SqpSolver {
    fn solve(&self, nlp: &dyn ConstrainedNlp) -> NlpSolution {
        let started = Instant::now();
        let budget = self.config.wall_time_budget();
        let dims = nlp.dims();
        let bounds = nlp.bounds();

        let mut x0 = vec![0.0; dims.n_vars];
        nlp.starting_point(&mut x0);

        if !bounds.is_equality_only() {
            tracing::warn!("sqp: problem has bounds or inequalities, returning starting point");
            let mut eval = Evaluator::new(nlp, bounds.g_lower);
            let it = eval.evaluate(DVector::from_vec(x0));
            let lambda = DVector::zeros(dims.n_constraints);
            return finish(
                Candidate::of(&it, &lambda),
                SolveStatus::InvalidProblem,
                0,
                started,
            );
        }

        let mut eval = Evaluator::new(nlp, bounds.g_lower);
        let mut it = eval.evaluate(DVector::from_vec(x0));
        let mut lambda = least_squares_multipliers(&it.jac, &it.grad, MULTIPLIER_INIT_MAX);
        let mut penalty = PenaltyParameter::new(self.config.penalty, self.config.initial_penalty);
        penalty.update(&lambda);

        let mut best = Candidate::of(&it, &lambda);
        let mut last_delta = 0.0;
        let mut tiny_steps = 0;
        let mut iterations = 0;

        let status = loop {
            let current = Candidate::of(&it, &lambda);
            if self.config.log_iterations {
                tracing::trace!(
                    iter = iterations,
                    objective = current.objective,
                    inf_pr = current.violation,
                    inf_du = current.dual,
                    penalty = penalty.value(),
                    delta = last_delta,
                    "sqp iteration"
                );
            }
            if !it.is_finite() {
                break SolveStatus::NumericalFailure;
            }
            let converged = current.dual <= self.config.tol
                && current.violation <= self.config.constr_viol_tol;
            if converged {
                best = current;
                break SolveStatus::Converged;
            }
            if current.improves_on(&best, self.config.constr_viol_tol) {
                best = current;
            }
            if iterations >= self.config.max_iter {
                break SolveStatus::MaxIterations;
            }
            if started.elapsed() >= budget {
                break SolveStatus::TimeLimit;
            }

            let w = eval.hessian(&it.x, &lambda);
            let Some(step) = solve_kkt(&w, &it.jac, &it.grad, &it.residual, last_delta) else {
                break SolveStatus::NumericalFailure;
            };
            last_delta = step.delta;
            penalty.update(&step.lambda);
            iterations += 1;

            if step.dx.amax() <= TINY_STEP * (1.0 + it.x.amax()) {
                lambda = step.lambda;
                tiny_steps += 1;
                if tiny_steps >= MAX_TINY_STEPS {
                    break SolveStatus::Stalled;
                }
                continue;
            }
            tiny_steps = 0;

            match self.line_search(&mut eval, &it, &step.dx, &penalty) {
                Some(next) => {
                    it = next;
                    lambda = step.lambda;
                }
                None => break SolveStatus::Stalled,
            }
        };

        finish(best, status, iterations, started)
    }
}

fn finish(
    best: Candidate,
    status: SolveStatus,
    iterations: usize,
    started: Instant,
) -> NlpSolution {
    NlpSolution {
        x: best.x.as_slice().to_vec(),
        lambda: best.lambda.as_slice().to_vec(),
        status,
        iterations,
        objective: best.objective,
        max_constraint_violation: best.violation,
        dual_infeasibility: best.dual,
        elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
    }
}

use approx::assert_abs_diff_eq;
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::*;
use crate::solver::{SolveStatus, SolverConfig};
use crate::test_utils::{
    chain_of, consistent_chain, max_violation, perturbed, random_lengths, relaxed_config,
    scaled_chain,
};

const CONSTR_TOL: f64 = 1e-4;

fn projector() -> ChainProjector {
    ChainProjector::new(relaxed_config())
}

#[test]
fn already_feasible_chain_is_returned_unchanged() {
    let chain = chain_of(&[
        ("root", [0.0, 0.0, 0.0]),
        ("A", [1.0, 0.0, 0.0]),
        ("B", [1.0, 1.0, 0.0]),
    ]);
    let lengths = SegmentLengths::new(vec![1.0, 1.0]).unwrap();

    let out = ChainProjector::default().project(&chain, &lengths).unwrap();
    assert_eq!(out.status, SolveStatus::Converged);
    assert_eq!(out.iterations, 0);
    assert_eq!(
        out.points,
        vec![
            TaggedPoint::new("A", [1.0, 0.0, 0.0]),
            TaggedPoint::new("B", [1.0, 1.0, 0.0]),
        ]
    );
}

#[test]
fn output_preserves_chain_order() {
    let root = KeyPoint::new("shoulder", [0.0, 0.0, 0.0]).with_child(
        KeyPoint::new("elbow", [0.05, -0.32, 0.02])
            .with_child(KeyPoint::new("hand", [0.1, -0.55, 0.1])),
    );
    let out = projector().project_linked(&root, &[0.3, 0.27]).unwrap();
    let tags: Vec<&str> = out.points.iter().map(|p| p.tag.as_str()).collect();
    assert_eq!(tags, ["elbow", "hand"]);
    assert!(out.position("hand").is_some());
    assert!(out.position("shoulder").is_none());
}

#[test]
fn single_segment_projects_radially_onto_sphere() {
    let chain = chain_of(&[("hip", [0.1, 0.2, 0.3]), ("knee", [0.4, -0.1, 0.5])]);
    let lengths = SegmentLengths::new(vec![0.45]).unwrap();
    let out = projector().project(&chain, &lengths).unwrap();
    assert!(out.is_converged());

    let root = Vector3::new(0.1, 0.2, 0.3);
    let obs = Vector3::new(0.4, -0.1, 0.5);
    let expected = root + (obs - root).normalize() * 0.45;
    let got = Vector3::from(out.points[0].position);
    assert_abs_diff_eq!((got - expected).norm(), 0.0, epsilon = 1e-4);
}

#[test]
fn noisy_chains_satisfy_length_constraints() {
    let mut rng = StdRng::seed_from_u64(7);
    let projector = projector();
    for trial in 0..25 {
        let n_segments = 1 + trial % 5;
        let lengths = random_lengths(&mut rng, n_segments);
        let truth = consistent_chain(&mut rng, [0.2, -0.1, 1.5], &lengths);
        let observed = perturbed(&mut rng, &truth, 0.04);

        let out = projector.project(&observed, &lengths).unwrap();
        assert!(out.is_converged(), "trial {trial}: {:?}", out.status);
        let viol = max_violation(&observed, &out, &lengths);
        assert!(viol <= CONSTR_TOL, "trial {trial}: violation {viol}");
        assert_abs_diff_eq!(viol, out.max_constraint_violation, epsilon = 1e-9);
    }
}

#[test]
fn consistent_chains_are_fixed_points() {
    let mut rng = StdRng::seed_from_u64(11);
    let projector = projector();
    for _ in 0..10 {
        let lengths = random_lengths(&mut rng, 4);
        let chain = consistent_chain(&mut rng, [0.0, 0.0, 0.0], &lengths);
        let out = projector.project(&chain, &lengths).unwrap();
        for (got, want) in out.points.iter().zip(chain.descendants()) {
            assert_eq!(got.tag, want.tag);
            for k in 0..3 {
                assert_abs_diff_eq!(got.position[k], want.position[k], epsilon = 1e-6);
            }
        }
    }
}

#[test]
fn uniform_scaling_scales_the_solution() {
    let mut rng = StdRng::seed_from_u64(3);
    let lengths = random_lengths(&mut rng, 3);
    let truth = consistent_chain(&mut rng, [0.0, 0.1, 0.2], &lengths);
    let observed = perturbed(&mut rng, &truth, 0.03);

    let k = 3.0;
    let scaled_lengths =
        SegmentLengths::new(lengths.as_slice().iter().map(|l| l * k).collect()).unwrap();

    let projector = projector();
    let base = projector.project(&observed, &lengths).unwrap();
    let scaled = projector
        .project(&scaled_chain(&observed, k), &scaled_lengths)
        .unwrap();

    for (a, b) in base.points.iter().zip(&scaled.points) {
        for i in 0..3 {
            assert_abs_diff_eq!(a.position[i] * k, b.position[i], epsilon = 1e-3 * k);
        }
    }
}

#[test]
fn collapsed_observation_still_meets_lengths() {
    let p = [0.2, 0.2, 0.2];
    let chain = chain_of(&[("a", p), ("b", p), ("c", p), ("d", p)]);
    let lengths = SegmentLengths::new(vec![0.3, 0.25, 0.2]).unwrap();

    let out = projector().project(&chain, &lengths).unwrap();
    assert!(out.points.iter().all(|q| q.position.iter().all(|v| v.is_finite())));
    assert!(max_violation(&chain, &out, &lengths) <= CONSTR_TOL);
}

#[test]
fn nearly_collapsed_observation_converges() {
    let chain = chain_of(&[
        ("a", [0.2, 0.2, 0.2]),
        ("b", [0.2 + 1e-5, 0.2, 0.2]),
        ("c", [0.2 + 1e-5, 0.2 + 5e-4, 0.2]),
        ("d", [0.2 + 1e-5, 0.2 + 5e-4, 0.2 + 1e-3]),
    ]);
    let lengths = SegmentLengths::new(vec![0.3, 0.25, 0.2]).unwrap();

    let out = projector().project(&chain, &lengths).unwrap();
    assert!(out.is_converged(), "{:?}", out.status);
    assert!(max_violation(&chain, &out, &lengths) <= CONSTR_TOL);
}

#[test]
fn collapsed_observation_without_repair_degrades_gracefully() {
    let p = [0.2, 0.2, 0.2];
    let chain = chain_of(&[("a", p), ("b", p), ("c", p)]);
    let lengths = SegmentLengths::new(vec![0.3, 0.25]).unwrap();
    let mut config = relaxed_config();
    config.warm_start.repair_degenerate = false;

    let out = ChainProjector::new(config).project(&chain, &lengths).unwrap();
    assert_eq!(out.points.len(), 2);
    assert!(!out.is_converged());
    assert!(out.points.iter().all(|q| q.position.iter().all(|v| v.is_finite())));
}

#[test]
fn far_outlier_is_pulled_back_onto_the_limb() {
    let chain = chain_of(&[
        ("shoulder", [0.0, 0.0, 0.0]),
        ("elbow", [0.0, -0.3, 0.0]),
        ("hand", [2.0, 3.0, -1.0]),
    ]);
    let lengths = SegmentLengths::new(vec![0.3, 0.25]).unwrap();
    let out = projector().project(&chain, &lengths).unwrap();
    assert!(out.is_converged());
    assert!(max_violation(&chain, &out, &lengths) <= CONSTR_TOL);
}

#[test]
fn zero_budget_returns_observed_chain() {
    let chain = chain_of(&[
        ("shoulder", [0.0, 0.0, 0.0]),
        ("elbow", [0.33, 0.0, 0.0]),
        ("hand", [0.33, 0.2, 0.0]),
    ]);
    let lengths = SegmentLengths::new(vec![0.3, 0.25]).unwrap();
    let mut config = ProjectorConfig::default();
    config.solver.max_wall_time_ms = 0.0;

    let out = ChainProjector::new(config).project(&chain, &lengths).unwrap();
    assert_eq!(out.status, SolveStatus::TimeLimit);
    assert_eq!(out.points, chain.descendants());
}

#[test]
fn length_count_mismatch_is_rejected() {
    let chain = chain_of(&[("a", [0.0; 3]), ("b", [1.0, 0.0, 0.0])]);
    let lengths = SegmentLengths::new(vec![1.0, 1.0]).unwrap();
    assert_eq!(
        ChainProjector::default()
            .project(&chain, &lengths)
            .unwrap_err(),
        ChainError::LengthCountMismatch {
            segments: 1,
            lengths: 2
        }
    );
}

#[test]
fn linked_entry_point_rejects_bad_lengths() {
    let root = KeyPoint::new("a", [0.0; 3]).with_child(KeyPoint::new("b", [1.0, 0.0, 0.0]));
    let err = ChainProjector::default()
        .project_linked(&root, &[0.0])
        .unwrap_err();
    assert!(matches!(err, ChainError::NonPositiveLength { index: 0, .. }));
}

#[test]
fn independent_chains_project_concurrently() {
    let mut rng = StdRng::seed_from_u64(21);
    let lengths = random_lengths(&mut rng, 2);
    let chains: Vec<Chain> = (0..4)
        .map(|_| {
            let truth = consistent_chain(&mut rng, [0.0, 0.0, 0.0], &lengths);
            perturbed(&mut rng, &truth, 0.02)
        })
        .collect();

    let projector = &projector();
    let lengths = &lengths;
    let results: Vec<ChainProjection> = std::thread::scope(|s| {
        let handles: Vec<_> = chains
            .iter()
            .map(|c| s.spawn(move || projector.project(c, lengths)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    });

    for (chain, out) in chains.iter().zip(&results) {
        assert!(out.is_converged());
        assert!(max_violation(chain, out, &lengths) <= CONSTR_TOL);
    }
}

#[test]
fn projector_types_are_thread_safe() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ChainProjector>();
    assert_send_sync::<crate::nlp::LimbProblem>();
    assert_send_sync::<ChainProjection>();
}

/// Backend that echoes the starting point, to exercise solver substitution.
struct EchoSolver;

impl NlpSolver for EchoSolver {
    fn solve(&self, nlp: &dyn crate::nlp::ConstrainedNlp) -> NlpSolution {
        let dims = nlp.dims();
        let mut x = vec![0.0; dims.n_vars];
        nlp.starting_point(&mut x);
        NlpSolution {
            objective: nlp.objective(&x),
            x,
            lambda: vec![0.0; dims.n_constraints],
            status: SolveStatus::MaxIterations,
            iterations: 0,
            max_constraint_violation: f64::NAN,
            dual_infeasibility: f64::NAN,
            elapsed_ms: 0.0,
        }
    }
}

#[test]
fn custom_backend_results_are_marshalled_in_order() {
    let chain = chain_of(&[
        ("r", [0.0; 3]),
        ("x", [1.0, 2.0, 3.0]),
        ("y", [4.0, 5.0, 6.0]),
    ]);
    let lengths = SegmentLengths::new(vec![1.0, 1.0]).unwrap();
    let projector = ChainProjector::with_solver(EchoSolver, WarmStartConfig::default());

    let out = projector.project(&chain, &lengths).unwrap();
    assert_eq!(out.status, SolveStatus::MaxIterations);
    assert_eq!(out.points, chain.descendants());
    assert_eq!(out.objective, 0.0);
}

#[test]
fn solver_config_is_carried_into_the_backend() {
    let config = ProjectorConfig {
        solver: SolverConfig {
            max_iter: 7,
            ..SolverConfig::default()
        },
        ..ProjectorConfig::default()
    };
    let projector = ChainProjector::new(config);
    assert_eq!(projector.solver().config().max_iter, 7);
}

//! Shared helpers for synthetic-chain unit tests.

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::Rng;

use crate::chain::{Chain, SegmentLengths, TaggedPoint};
use crate::config::ProjectorConfig;
use crate::projector::ChainProjection;
use crate::solver::SolverConfig;

/// Default configuration with a wall-clock budget that unoptimized test
/// builds on loaded machines cannot hit.
pub(crate) fn relaxed_config() -> ProjectorConfig {
    ProjectorConfig {
        solver: SolverConfig {
            max_wall_time_ms: 10_000.0,
            ..SolverConfig::default()
        },
        ..ProjectorConfig::default()
    }
}

pub(crate) fn chain_of(points: &[(&str, [f64; 3])]) -> Chain {
    Chain::new(
        points
            .iter()
            .map(|(tag, p)| TaggedPoint::new(*tag, *p))
            .collect(),
    )
    .expect("valid test chain")
}

fn random_unit(rng: &mut StdRng) -> Vector3<f64> {
    loop {
        let v = Vector3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let n = v.norm();
        if n > 0.1 && n <= 1.0 {
            return v / n;
        }
    }
}

/// Chain rooted at `root` whose segments have exactly `lengths`.
pub(crate) fn consistent_chain(
    rng: &mut StdRng,
    root: [f64; 3],
    lengths: &SegmentLengths,
) -> Chain {
    let mut p = Vector3::from(root);
    let mut points = vec![TaggedPoint::new("k0", root)];
    for (i, l) in lengths.as_slice().iter().enumerate() {
        p += random_unit(rng) * *l;
        points.push(TaggedPoint::new(format!("k{}", i + 1), [p.x, p.y, p.z]));
    }
    Chain::new(points).expect("valid synthetic chain")
}

/// Add uniform noise in `[-sigma, sigma]` to every non-root coordinate.
pub(crate) fn perturbed(rng: &mut StdRng, chain: &Chain, sigma: f64) -> Chain {
    let mut points = chain.points().to_vec();
    for p in points.iter_mut().skip(1) {
        for v in p.position.iter_mut() {
            *v += rng.gen_range(-sigma..sigma);
        }
    }
    Chain::new(points).expect("valid perturbed chain")
}

pub(crate) fn scaled_chain(chain: &Chain, k: f64) -> Chain {
    Chain::new(
        chain
            .points()
            .iter()
            .map(|p| TaggedPoint::new(p.tag.clone(), p.position.map(|v| v * k)))
            .collect(),
    )
    .expect("valid scaled chain")
}

pub(crate) fn random_lengths(rng: &mut StdRng, n: usize) -> SegmentLengths {
    SegmentLengths::new((0..n).map(|_| rng.gen_range(0.1..0.5)).collect())
        .expect("positive lengths")
}

/// Largest `| ||p_j - p_{j-1}||² - L_j² |` of a projection re-attached to its root.
pub(crate) fn max_violation(
    chain: &Chain,
    projection: &ChainProjection,
    lengths: &SegmentLengths,
) -> f64 {
    let mut points = vec![chain.root().clone()];
    points.extend(projection.points.iter().cloned());
    Chain::new(points)
        .expect("projection has at least one point")
        .length_residuals(lengths)
        .into_iter()
        .fold(0.0, |acc, r| acc.max(r.abs()))
}

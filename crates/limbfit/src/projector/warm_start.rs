use nalgebra::Vector3;

use crate::chain::{Chain, SegmentLengths};
use crate::config::WarmStartConfig;

/// Initial iterate: the observed descendants, flattened in chain order.
///
/// With `repair_degenerate`, a point lying on top of its (possibly re-seeded)
/// predecessor is moved to the target distance along the previous segment's
/// direction, `+x` for the first segment. Otherwise the constraint gradient
/// vanishes at the start and the Newton system has no information about
/// which way to extend the segment.
pub(super) fn initial_iterate(
    chain: &Chain,
    lengths: &SegmentLengths,
    config: &WarmStartConfig,
) -> Vec<f64> {
    let mut x = Vec::with_capacity(3 * chain.segment_count());
    let mut prev = chain.root().vector();
    let mut prev_dir = Vector3::x();

    for (j, (point, &length)) in chain
        .descendants()
        .iter()
        .zip(lengths.as_slice())
        .enumerate()
    {
        let mut cur = point.vector();
        if config.repair_degenerate && (cur - prev).norm() <= config.degenerate_ratio * length {
            cur = prev + prev_dir * length;
            tracing::debug!(
                segment = j,
                tag = %point.tag,
                "degenerate segment in warm start, re-seeding at target length"
            );
        }

        let seg = cur - prev;
        let norm = seg.norm();
        if norm > 0.0 {
            prev_dir = seg / norm;
        }
        x.extend_from_slice(cur.as_slice());
        prev = cur;
    }
    x
}

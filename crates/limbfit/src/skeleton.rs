//! Standard-skeleton helpers on top of [`ChainProjector`].
//!
//! A [`SkeletonFrame`] maps keypoint tags to positions for one time step.
//! Limb target lengths are measured once on a reference frame (typically the
//! subject's initial pose) and then enforced on every later frame.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chain::{Chain, SegmentLengths, TaggedPoint};
use crate::projector::ChainProjector;
use crate::solver::{NlpSolver, SolveStatus, SqpSolver};

/// Keypoint tags of the standard skeleton.
pub mod tags {
    pub const SHOULDER_CENTER: &str = "shoulderCenter";
    pub const HEAD: &str = "head";
    pub const SHOULDER_LEFT: &str = "shoulderLeft";
    pub const ELBOW_LEFT: &str = "elbowLeft";
    pub const HAND_LEFT: &str = "handLeft";
    pub const SHOULDER_RIGHT: &str = "shoulderRight";
    pub const ELBOW_RIGHT: &str = "elbowRight";
    pub const HAND_RIGHT: &str = "handRight";
    pub const HIP_CENTER: &str = "hipCenter";
    pub const HIP_LEFT: &str = "hipLeft";
    pub const KNEE_LEFT: &str = "kneeLeft";
    pub const ANKLE_LEFT: &str = "ankleLeft";
    pub const HIP_RIGHT: &str = "hipRight";
    pub const KNEE_RIGHT: &str = "kneeRight";
    pub const ANKLE_RIGHT: &str = "ankleRight";
}

/// Kinematic chains of the standard skeleton that get length-corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Limb {
    ArmLeft,
    ArmRight,
    LegLeft,
    LegRight,
}

impl Limb {
    pub const ALL: [Limb; 4] = [Limb::ArmLeft, Limb::ArmRight, Limb::LegLeft, Limb::LegRight];

    /// Tags from the anchored root to the end effector.
    pub fn tags(self) -> &'static [&'static str] {
        use tags::*;
        match self {
            Limb::ArmLeft => &[SHOULDER_LEFT, ELBOW_LEFT, HAND_LEFT],
            Limb::ArmRight => &[SHOULDER_RIGHT, ELBOW_RIGHT, HAND_RIGHT],
            Limb::LegLeft => &[HIP_LEFT, KNEE_LEFT, ANKLE_LEFT],
            Limb::LegRight => &[HIP_RIGHT, KNEE_RIGHT, ANKLE_RIGHT],
        }
    }

    /// Chain of this limb in `frame`, or `None` if a keypoint is missing.
    pub fn chain(self, frame: &SkeletonFrame) -> Option<Chain> {
        let points = self
            .tags()
            .iter()
            .map(|t| frame.get(t).map(|p| TaggedPoint::new(*t, p)))
            .collect::<Option<Vec<_>>>()?;
        Chain::new(points).ok()
    }
}

/// Keypoint positions of one skeleton observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkeletonFrame {
    pub keypoints: BTreeMap<String, [f64; 3]>,
}

impl SkeletonFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tag: impl Into<String>, position: [f64; 3]) -> Self {
        self.insert(tag, position);
        self
    }

    pub fn insert(&mut self, tag: impl Into<String>, position: [f64; 3]) {
        self.keypoints.insert(tag.into(), position);
    }

    pub fn get(&self, tag: &str) -> Option<[f64; 3]> {
        self.keypoints.get(tag).copied()
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Target segment lengths per limb.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LimbLengths {
    lengths: BTreeMap<Limb, SegmentLengths>,
}

impl LimbLengths {
    /// Measure every limb fully present in `reference`.
    ///
    /// Limbs with a missing keypoint or a zero-length segment are left out.
    pub fn from_reference(reference: &SkeletonFrame) -> Self {
        let lengths = Limb::ALL
            .into_iter()
            .filter_map(|limb| {
                let chain = limb.chain(reference)?;
                match SegmentLengths::measured(&chain) {
                    Ok(l) => Some((limb, l)),
                    Err(e) => {
                        tracing::warn!(?limb, "skipping reference limb: {e}");
                        None
                    }
                }
            })
            .collect();
        Self { lengths }
    }

    pub fn insert(&mut self, limb: Limb, lengths: SegmentLengths) {
        self.lengths.insert(limb, lengths);
    }

    pub fn get(&self, limb: Limb) -> Option<&SegmentLengths> {
        self.lengths.get(&limb)
    }

    pub fn limbs(&self) -> impl Iterator<Item = Limb> + '_ {
        self.lengths.keys().copied()
    }
}

/// What happened to one limb of a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LimbOutcome {
    Projected {
        status: SolveStatus,
        iterations: usize,
        max_constraint_violation: f64,
    },
    /// The frame lacks at least one keypoint of the limb.
    MissingKeypoints,
    /// No target lengths are known for the limb.
    MissingLengths,
    /// The stored lengths do not fit the limb's chain.
    Rejected { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimbReport {
    pub limb: Limb,
    #[serde(flatten)]
    pub outcome: LimbOutcome,
}

/// Corrected frame plus a report for every standard limb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkeletonProjection {
    /// Input frame with projected limb keypoints overwritten.
    pub frame: SkeletonFrame,
    pub limbs: Vec<LimbReport>,
}

/// Applies a [`ChainProjector`] to every limb of skeleton frames.
#[derive(Debug, Clone)]
pub struct SkeletonProjector<S = SqpSolver> {
    projector: ChainProjector<S>,
    lengths: LimbLengths,
}

impl<S: NlpSolver> SkeletonProjector<S> {
    pub fn new(projector: ChainProjector<S>, lengths: LimbLengths) -> Self {
        Self { projector, lengths }
    }

    pub fn lengths(&self) -> &LimbLengths {
        &self.lengths
    }

    /// Project all standard limbs of `frame`. Keypoints outside the limbs
    /// and roots of the limbs are copied unchanged.
    pub fn project_frame(&self, frame: &SkeletonFrame) -> SkeletonProjection {
        let mut out = frame.clone();
        let limbs = Limb::ALL
            .into_iter()
            .map(|limb| LimbReport {
                limb,
                outcome: self.project_limb(limb, frame, &mut out),
            })
            .collect();
        SkeletonProjection { frame: out, limbs }
    }

    fn project_limb(
        &self,
        limb: Limb,
        frame: &SkeletonFrame,
        out: &mut SkeletonFrame,
    ) -> LimbOutcome {
        let Some(lengths) = self.lengths.get(limb) else {
            return LimbOutcome::MissingLengths;
        };
        let Some(chain) = limb.chain(frame) else {
            return LimbOutcome::MissingKeypoints;
        };
        match self.projector.project(&chain, lengths) {
            Ok(projection) => {
                for p in &projection.points {
                    out.insert(p.tag.clone(), p.position);
                }
                LimbOutcome::Projected {
                    status: projection.status,
                    iterations: projection.iterations,
                    max_constraint_violation: projection.max_constraint_violation,
                }
            }
            Err(e) => {
                tracing::warn!(?limb, "limb projection rejected: {e}");
                LimbOutcome::Rejected {
                    error: e.to_string(),
                }
            }
        }
    }
}

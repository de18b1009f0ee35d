//! Kinematic chain model.
//!
//! Observations arrive as a singly-linked [`KeyPoint`] list (root with one
//! child, which has one child, ...). Projection works on a flattened
//! [`Chain`] built once by traversal, so every later stage is index-based.

use nalgebra::Vector3;

/// A tagged 3D keypoint owning at most one child link.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPoint {
    tag: String,
    position: [f64; 3],
    child: Option<Box<KeyPoint>>,
}

impl KeyPoint {
    /// Create a leaf keypoint.
    pub fn new(tag: impl Into<String>, position: [f64; 3]) -> Self {
        Self {
            tag: tag.into(),
            position,
            child: None,
        }
    }

    /// Attach `child` as the direct descendant, replacing any previous one.
    pub fn with_child(mut self, child: KeyPoint) -> Self {
        self.child = Some(Box::new(child));
        self
    }

    /// Build a linked chain from `(tag, position)` pairs, first pair is the root.
    pub fn linked<I, S>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (S, [f64; 3])>,
        I::IntoIter: DoubleEndedIterator,
        S: Into<String>,
    {
        points.into_iter().rev().fold(None, |child, (tag, p)| {
            let mut kp = KeyPoint::new(tag, p);
            kp.child = child.map(Box::new);
            Some(kp)
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn position(&self) -> [f64; 3] {
        self.position
    }

    pub fn child(&self) -> Option<&KeyPoint> {
        self.child.as_deref()
    }

    /// Iterate this keypoint and all descendants in link order.
    pub fn iter(&self) -> KeyPointIter<'_> {
        KeyPointIter { next: Some(self) }
    }
}

/// Iterator over a linked keypoint chain.
#[derive(Debug, Clone)]
pub struct KeyPointIter<'a> {
    next: Option<&'a KeyPoint>,
}

impl<'a> Iterator for KeyPointIter<'a> {
    type Item = &'a KeyPoint;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;
        self.next = cur.child();
        Some(cur)
    }
}

/// A keypoint tag paired with a position, used in flattened chains and results.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TaggedPoint {
    pub tag: String,
    pub position: [f64; 3],
}

impl TaggedPoint {
    pub fn new(tag: impl Into<String>, position: [f64; 3]) -> Self {
        Self {
            tag: tag.into(),
            position,
        }
    }

    pub(crate) fn vector(&self) -> Vector3<f64> {
        Vector3::from(self.position)
    }
}

/// Errors raised while assembling projection inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainError {
    /// A chain needs a root and at least one descendant.
    TooShort { len: usize },
    /// A keypoint position contains NaN or infinity.
    NonFinitePosition { tag: String },
    /// Segment length at `index` is not a finite positive number.
    NonPositiveLength { index: usize, value: f64 },
    /// Number of lengths does not match the number of chain segments.
    LengthCountMismatch { segments: usize, lengths: usize },
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooShort { len } => {
                write!(f, "chain has {len} keypoint(s), at least 2 are required")
            }
            Self::NonFinitePosition { tag } => {
                write!(f, "keypoint '{tag}' has a non-finite position")
            }
            Self::NonPositiveLength { index, value } => {
                write!(f, "segment length #{index} must be finite and > 0 (got {value})")
            }
            Self::LengthCountMismatch { segments, lengths } => write!(
                f,
                "chain has {segments} segment(s) but {lengths} length(s) were given"
            ),
        }
    }
}

impl std::error::Error for ChainError {}

/// Flattened, validated kinematic chain: root first, then descendants in order.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "Vec<TaggedPoint>", into = "Vec<TaggedPoint>")]
pub struct Chain {
    points: Vec<TaggedPoint>,
}

impl Chain {
    /// Validate and wrap an ordered point list.
    pub fn new(points: Vec<TaggedPoint>) -> Result<Self, ChainError> {
        if points.len() < 2 {
            return Err(ChainError::TooShort { len: points.len() });
        }
        if let Some(bad) = points
            .iter()
            .find(|p| p.position.iter().any(|v| !v.is_finite()))
        {
            return Err(ChainError::NonFinitePosition {
                tag: bad.tag.clone(),
            });
        }
        Ok(Self { points })
    }

    /// Flatten a linked chain by following child links from `root`.
    pub fn from_root(root: &KeyPoint) -> Result<Self, ChainError> {
        Self::new(
            root.iter()
                .map(|k| TaggedPoint::new(k.tag(), k.position()))
                .collect(),
        )
    }

    /// Rebuild the linked representation.
    pub fn to_linked(&self) -> KeyPoint {
        let root = self.root();
        let mut linked = KeyPoint::new(root.tag.clone(), root.position);
        linked.child = KeyPoint::linked(
            self.descendants()
                .iter()
                .map(|p| (p.tag.clone(), p.position)),
        )
        .map(Box::new);
        linked
    }

    pub fn root(&self) -> &TaggedPoint {
        &self.points[0]
    }

    /// Points after the root, in traversal order.
    pub fn descendants(&self) -> &[TaggedPoint] {
        &self.points[1..]
    }

    pub fn points(&self) -> &[TaggedPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.points.len() - 1
    }

    /// Euclidean length of every consecutive segment.
    pub fn segment_lengths(&self) -> Vec<f64> {
        self.points
            .windows(2)
            .map(|w| (w[1].vector() - w[0].vector()).norm())
            .collect()
    }

    /// Signed squared-length residuals `||p_j - p_{j-1}||^2 - L_j^2`.
    pub fn length_residuals(&self, lengths: &SegmentLengths) -> Vec<f64> {
        self.points
            .windows(2)
            .zip(lengths.as_slice())
            .map(|(w, l)| (w[1].vector() - w[0].vector()).norm_squared() - l * l)
            .collect()
    }

    pub(crate) fn ensure_matches(&self, lengths: &SegmentLengths) -> Result<(), ChainError> {
        if lengths.len() != self.segment_count() {
            return Err(ChainError::LengthCountMismatch {
                segments: self.segment_count(),
                lengths: lengths.len(),
            });
        }
        Ok(())
    }
}

impl TryFrom<Vec<TaggedPoint>> for Chain {
    type Error = ChainError;

    fn try_from(points: Vec<TaggedPoint>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<Chain> for Vec<TaggedPoint> {
    fn from(chain: Chain) -> Self {
        chain.points
    }
}

/// Fixed target length for every segment of a chain, all finite and `> 0`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct SegmentLengths(Vec<f64>);

impl SegmentLengths {
    pub fn new(lengths: Vec<f64>) -> Result<Self, ChainError> {
        if let Some((index, &value)) = lengths
            .iter()
            .enumerate()
            .find(|(_, l)| !(l.is_finite() && **l > 0.0))
        {
            return Err(ChainError::NonPositiveLength { index, value });
        }
        Ok(Self(lengths))
    }

    /// Lengths measured on a reference chain, e.g. an initial calibration pose.
    pub fn measured(reference: &Chain) -> Result<Self, ChainError> {
        Self::new(reference.segment_lengths())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<f64>> for SegmentLengths {
    type Error = ChainError;

    fn try_from(lengths: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(lengths)
    }
}

impl From<SegmentLengths> for Vec<f64> {
    fn from(lengths: SegmentLengths) -> Self {
        lengths.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn arm() -> KeyPoint {
        KeyPoint::new("shoulder", [0.0, 0.0, 0.0]).with_child(
            KeyPoint::new("elbow", [0.3, 0.0, 0.0])
                .with_child(KeyPoint::new("hand", [0.3, 0.4, 0.0])),
        )
    }

    #[test]
    fn traversal_follows_child_links() {
        let root = arm();
        let tags: Vec<&str> = root.iter().map(KeyPoint::tag).collect();
        assert_eq!(tags, ["shoulder", "elbow", "hand"]);
    }

    #[test]
    fn linked_builder_matches_manual_links() {
        let built = KeyPoint::linked([
            ("shoulder", [0.0, 0.0, 0.0]),
            ("elbow", [0.3, 0.0, 0.0]),
            ("hand", [0.3, 0.4, 0.0]),
        ]);
        assert_eq!(built, Some(arm()));
    }

    #[test]
    fn chain_flattening_roundtrips_through_links() {
        let chain = Chain::from_root(&arm()).unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.root().tag, "shoulder");
        assert_eq!(chain.descendants()[1].tag, "hand");
        assert_eq!(chain.to_linked(), arm());
    }

    #[test]
    fn two_point_chain_links_root_to_leaf() {
        let chain = Chain::new(vec![
            TaggedPoint::new("hip", [0.1, 0.0, 0.9]),
            TaggedPoint::new("knee", [0.1, 0.0, 0.5]),
        ])
        .unwrap();
        let root = chain.to_linked();
        assert_eq!(root.tag(), "hip");
        let leaf = root.child().unwrap();
        assert_eq!(leaf.tag(), "knee");
        assert_eq!(leaf.position(), [0.1, 0.0, 0.5]);
        assert!(leaf.child().is_none());
    }

    #[test]
    fn segment_lengths_are_measured_in_order() {
        let chain = Chain::from_root(&arm()).unwrap();
        let l = chain.segment_lengths();
        assert_abs_diff_eq!(l[0], 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(l[1], 0.4, epsilon = 1e-12);

        let measured = SegmentLengths::measured(&chain).unwrap();
        for r in chain.length_residuals(&measured) {
            assert_abs_diff_eq!(r, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn single_point_chain_is_rejected() {
        let err = Chain::from_root(&KeyPoint::new("root", [0.0; 3])).unwrap_err();
        assert_eq!(err, ChainError::TooShort { len: 1 });
    }

    #[test]
    fn non_finite_positions_are_rejected() {
        let err = Chain::new(vec![
            TaggedPoint::new("a", [0.0; 3]),
            TaggedPoint::new("b", [f64::NAN, 0.0, 0.0]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ChainError::NonFinitePosition {
                tag: "b".to_string()
            }
        );
    }

    #[test]
    fn non_positive_lengths_are_rejected() {
        assert!(SegmentLengths::new(vec![0.3, 0.25]).is_ok());
        assert_eq!(
            SegmentLengths::new(vec![0.3, 0.0]).unwrap_err(),
            ChainError::NonPositiveLength {
                index: 1,
                value: 0.0
            }
        );
        assert!(SegmentLengths::new(vec![-1.0]).is_err());
        assert!(SegmentLengths::new(vec![f64::INFINITY]).is_err());
    }

    #[test]
    fn length_count_must_match_segments() {
        let chain = Chain::from_root(&arm()).unwrap();
        let lengths = SegmentLengths::new(vec![0.3]).unwrap();
        assert_eq!(
            chain.ensure_matches(&lengths).unwrap_err(),
            ChainError::LengthCountMismatch {
                segments: 2,
                lengths: 1
            }
        );
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let ok: Result<SegmentLengths, _> = serde_json::from_str("[0.3, 0.2]");
        assert!(ok.is_ok());
        let bad: Result<SegmentLengths, _> = serde_json::from_str("[0.3, -0.2]");
        assert!(bad.is_err());
        let short: Result<Chain, _> =
            serde_json::from_str(r#"[{"tag": "root", "position": [0, 0, 0]}]"#);
        assert!(short.is_err());
    }

    #[test]
    fn json_preserves_lengths_and_positions_exactly() {
        let lengths = SegmentLengths::new(vec![0.4505552130427524, 0.1 + 0.2]).unwrap();
        let json = serde_json::to_string(&lengths).unwrap();
        assert_eq!(serde_json::from_str::<SegmentLengths>(&json).unwrap(), lengths);

        let chain = Chain::new(vec![
            TaggedPoint::new("a", [0.0; 3]),
            TaggedPoint::new("b", [0.45055521304275237, 1.0 / 3.0, -2.0f64.sqrt()]),
        ])
        .unwrap();
        let json = serde_json::to_string(&chain).unwrap();
        assert_eq!(serde_json::from_str::<Chain>(&json).unwrap(), chain);
    }
}

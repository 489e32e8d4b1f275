//! Spatial partition tree over a fixed training set.
//!
//! The tree recursively splits a point set into axis-aligned bounding
//! regions. Leaves hold raw points; internal nodes hold split metadata and
//! aggregate statistics (point count and mean). Once built, the tree is
//! immutable and may be shared read-only across any number of concurrent
//! queries.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Policy for choosing the split index when partitioning a sorted subset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SplitPolicy {
    /// Split at the median index `n / 2`.
    #[default]
    Median,
    /// Split at the first index whose coordinate crosses the midpoint of the
    /// 10th/90th-percentile window, falling back to the median when that
    /// index would leave an empty side.
    WidthBalanced,
}

/// Axis-aligned min/max envelope of a point set: one `(min, max)` pair per axis.
///
/// Invariant: the box of a node contains every point of every descendant of
/// that node.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundingBox {
    ranges: Vec<(f64, f64)>,
}

impl BoundingBox {
    /// Computes the per-axis min/max envelope of `points`.
    ///
    /// Callers guarantee `points` is non-empty with uniform dimensionality.
    pub(crate) fn from_points(points: &[Vec<f64>]) -> Self {
        let k = points[0].len();
        let mut ranges = vec![(f64::INFINITY, f64::NEG_INFINITY); k];
        for p in points {
            for (range, &v) in ranges.iter_mut().zip(p) {
                range.0 = range.0.min(v);
                range.1 = range.1.max(v);
            }
        }
        Self { ranges }
    }

    /// Returns the number of axes.
    pub fn dim(&self) -> usize {
        self.ranges.len()
    }

    /// Returns the lower edge of the box on `axis`.
    ///
    /// # Panics
    ///
    /// Panics if `axis >= self.dim()`.
    pub fn min(&self, axis: usize) -> f64 {
        self.ranges[axis].0
    }

    /// Returns the upper edge of the box on `axis`.
    ///
    /// # Panics
    ///
    /// Panics if `axis >= self.dim()`.
    pub fn max(&self, axis: usize) -> f64 {
        self.ranges[axis].1
    }

    /// Returns true iff `q` falls within all axis ranges (edges inclusive).
    ///
    /// # Panics
    ///
    /// Panics if `q.len() < self.dim()`.
    pub fn contains(&self, q: &[f64]) -> bool {
        self.ranges
            .iter()
            .enumerate()
            .all(|(i, &(lo, hi))| q[i] >= lo && q[i] <= hi)
    }

    /// For each axis independently, bounds the absolute coordinate-wise
    /// difference between `q` and any point that could lie inside the box.
    ///
    /// Returns `(min_diff, max_diff)` vectors of length `self.dim()`.
    fn min_max_diff_vectors(&self, q: &[f64]) -> (Vec<f64>, Vec<f64>) {
        assert_eq!(
            q.len(),
            self.ranges.len(),
            "Query dimension {} doesn't match box dimension {}",
            q.len(),
            self.ranges.len()
        );

        let k = self.ranges.len();
        let mut min_diff = vec![0.0; k];
        let mut max_diff = vec![0.0; k];
        for (i, &(lo, hi)) in self.ranges.iter().enumerate() {
            let d_lo = q[i] - lo;
            let d_hi = q[i] - hi;
            if d_hi >= 0.0 {
                // Query lies to the right of the box on this axis.
                min_diff[i] = d_hi;
                max_diff[i] = d_lo;
            } else if d_lo >= 0.0 {
                // Query lies inside the box: minimum difference is exactly zero.
                min_diff[i] = 0.0;
                max_diff[i] = if d_lo > -d_hi { d_lo } else { -d_hi };
            } else {
                // Query lies to the left of the box.
                min_diff[i] = -d_lo;
                max_diff[i] = -d_hi;
            }
        }
        (min_diff, max_diff)
    }
}

enum Node {
    Leaf {
        items: Vec<Vec<f64>>,
    },
    Internal {
        split_axis: usize,
        split_value: f64,
        lo: Box<KdTree>,
        hi: Box<KdTree>,
    },
}

/// A node of the spatial partition tree.
///
/// Built once from the full training set via [`KdTree::build`], then
/// read-only. Every node carries its bounding box, the number of points
/// beneath it (`n_below`) and their mean; internal nodes own exactly two
/// children split on a round-robin axis.
///
/// # Examples
///
/// ```
/// use treekde::{KdTree, SplitPolicy};
///
/// let points = vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0], vec![4.0]];
/// let tree = KdTree::build(points, 3, SplitPolicy::Median).unwrap();
///
/// assert_eq!(tree.n_below(), 5);
/// assert!(!tree.is_leaf());
/// assert!((tree.mean()[0] - 2.0).abs() < 1e-9);
/// ```
pub struct KdTree {
    bounds: BoundingBox,
    mean: Vec<f64>,
    n_below: usize,
    node: Node,
}

impl KdTree {
    /// Builds a tree over `points` in a single batch pass.
    ///
    /// The split axis cycles round-robin starting at axis 0 for the root.
    /// The split value is the midpoint between the coordinates on either
    /// side of the split index, so partitioning is index-based and never
    /// produces an empty child, even with duplicate coordinates.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidLeafCapacity` if `leaf_capacity < 1`.
    /// Returns `Error::EmptySamples` if `points` is empty.
    /// Returns `Error::ZeroDimensions` if the vectors have zero length.
    /// Returns `Error::DimensionMismatch` if dimensions are inconsistent.
    pub fn build(
        points: Vec<Vec<f64>>,
        leaf_capacity: usize,
        split_policy: SplitPolicy,
    ) -> Result<Self> {
        if leaf_capacity < 1 {
            return Err(Error::InvalidLeafCapacity(leaf_capacity));
        }
        if points.is_empty() {
            return Err(Error::EmptySamples);
        }
        let k = points[0].len();
        if k == 0 {
            return Err(Error::ZeroDimensions);
        }
        for (i, p) in points.iter().enumerate() {
            if p.len() != k {
                return Err(Error::DimensionMismatch {
                    expected: k,
                    got: p.len(),
                    sample_index: i,
                });
            }
        }
        Ok(Self::build_node(points, 0, leaf_capacity, split_policy))
    }

    #[allow(clippy::cast_precision_loss)]
    fn build_node(
        mut points: Vec<Vec<f64>>,
        axis: usize,
        leaf_capacity: usize,
        split_policy: SplitPolicy,
    ) -> Self {
        let k = points[0].len();
        let n = points.len();
        let bounds = BoundingBox::from_points(&points);

        if n <= leaf_capacity {
            let mut mean = vec![0.0; k];
            for p in &points {
                for (m, &v) in mean.iter_mut().zip(p) {
                    *m += v;
                }
            }
            for m in &mut mean {
                *m /= n as f64;
            }
            return Self {
                bounds,
                mean,
                n_below: n,
                node: Node::Leaf { items: points },
            };
        }

        points.sort_by(|a, b| a[axis].total_cmp(&b[axis]));
        let split_index = Self::pick_split_index(&points, axis, split_policy);
        let split_value = 0.5 * (points[split_index - 1][axis] + points[split_index][axis]);

        let hi_points = points.split_off(split_index);
        let next_axis = (axis + 1) % k;
        let lo = Box::new(Self::build_node(points, next_axis, leaf_capacity, split_policy));
        let hi = Box::new(Self::build_node(
            hi_points,
            next_axis,
            leaf_capacity,
            split_policy,
        ));

        // Aggregate statistics come from the children, never from a rescan.
        let mean = (0..k)
            .map(|i| {
                (lo.mean[i] * lo.n_below as f64 + hi.mean[i] * hi.n_below as f64) / n as f64
            })
            .collect();

        Self {
            bounds,
            mean,
            n_below: n,
            node: Node::Internal {
                split_axis: axis,
                split_value,
                lo,
                hi,
            },
        }
    }

    /// Picks the right-inclusive index at which to split `points`, which are
    /// sorted by `axis`.
    fn pick_split_index(points: &[Vec<f64>], axis: usize, split_policy: SplitPolicy) -> usize {
        let n = points.len();
        match split_policy {
            SplitPolicy::Median => n / 2,
            SplitPolicy::WidthBalanced => {
                let mid_point = 0.5 * (points[n / 10][axis] + points[9 * n / 10][axis]);
                let i = points
                    .iter()
                    .position(|p| p[axis] >= mid_point)
                    .unwrap_or(n);
                if i == 0 || i >= n - 1 {
                    n / 2
                } else {
                    i
                }
            }
        }
    }

    /// For each axis independently, bounds the absolute coordinate-wise
    /// difference between `q` and any point under this node.
    ///
    /// Returns `(min_diff, max_diff)` vectors.
    ///
    /// # Panics
    ///
    /// Panics if `q.len()` doesn't match the tree dimensionality.
    pub fn min_max_distance_vectors(&self, q: &[f64]) -> (Vec<f64>, Vec<f64>) {
        self.bounds.min_max_diff_vectors(q)
    }

    /// Bounds the squared Euclidean distance from `q` to any point that
    /// could lie inside this node's bounding box.
    ///
    /// Returns `(min_sq, max_sq)`.
    ///
    /// # Panics
    ///
    /// Panics if `q.len()` doesn't match the tree dimensionality.
    pub fn min_max_distances(&self, q: &[f64]) -> (f64, f64) {
        let (min_diff, max_diff) = self.min_max_distance_vectors(q);
        let min_sq = min_diff.iter().map(|d| d * d).sum();
        let max_sq = max_diff.iter().map(|d| d * d).sum();
        (min_sq, max_sq)
    }

    /// Returns true iff `q` falls within this node's bounding box.
    ///
    /// # Panics
    ///
    /// Panics if `q.len()` is shorter than the tree dimensionality.
    pub fn is_inside_boundaries(&self, q: &[f64]) -> bool {
        self.bounds.contains(q)
    }

    /// Returns the number of dimensions of the points under this tree.
    pub fn dim(&self) -> usize {
        self.bounds.dim()
    }

    /// Returns the mean of all points beneath this node.
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Returns the number of points beneath this node.
    pub fn n_below(&self) -> usize {
        self.n_below
    }

    /// Returns this node's bounding box.
    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bounds
    }

    /// Returns the child holding points below the split, or `None` for leaves.
    pub fn lo_child(&self) -> Option<&KdTree> {
        match &self.node {
            Node::Leaf { .. } => None,
            Node::Internal { lo, .. } => Some(lo),
        }
    }

    /// Returns the child holding points at or above the split, or `None` for leaves.
    pub fn hi_child(&self) -> Option<&KdTree> {
        match &self.node {
            Node::Leaf { .. } => None,
            Node::Internal { hi, .. } => Some(hi),
        }
    }

    /// Returns true iff this node is a leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self.node, Node::Leaf { .. })
    }

    /// Returns the split axis, or `None` for leaves.
    pub fn split_axis(&self) -> Option<usize> {
        match &self.node {
            Node::Leaf { .. } => None,
            Node::Internal { split_axis, .. } => Some(*split_axis),
        }
    }

    /// Returns the split value, or `None` for leaves.
    pub fn split_value(&self) -> Option<f64> {
        match &self.node {
            Node::Leaf { .. } => None,
            Node::Internal { split_value, .. } => Some(*split_value),
        }
    }

    /// Returns the raw points stored in this node, or `None` for internal nodes.
    pub fn items(&self) -> Option<&[Vec<f64>]> {
        match &self.node {
            Node::Leaf { items } => Some(items),
            Node::Internal { .. } => None,
        }
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let tabs = " ".repeat(indent + 1);
        match &self.node {
            Node::Internal {
                split_axis,
                split_value,
                lo,
                hi,
            } => {
                writeln!(f, "KdNode: dim={split_axis} split={split_value:.3}")?;
                write!(f, "{tabs}LO: ")?;
                lo.fmt_node(f, indent + 1)?;
                writeln!(f)?;
                write!(f, "{tabs}HI: ")?;
                hi.fmt_node(f, indent + 1)
            }
            Node::Leaf { items } => {
                write!(f, "KdNode:")?;
                for item in items {
                    write!(f, "\n{tabs} - {item:?}")?;
                }
                Ok(())
            }
        }
    }
}

/// Depth-first diagnostic dump: indentation proportional to depth, split
/// axis/value per internal node, raw vectors per leaf.
impl fmt::Display for KdTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, 0)
    }
}

//! Per-query branch-and-bound frontier nodes.
//!
//! A [`ScoreEstimate`] brackets the total kernel weight contributed by all
//! points under one tree node to a fixed query point. Estimates live only
//! for the duration of a single query: one is created when a node enters
//! the search frontier and discarded when the node is either resolved
//! exactly (leaf) or replaced by its children (split).

use core::cmp::Ordering;

use crate::kernel::Kernel;
use crate::tree::KdTree;

/// An interval bound `[lower, upper]` on the summed kernel weight under a
/// tree node, for one query point.
///
/// By the kernel monotonicity contract, the kernel evaluated at the
/// minimum possible difference vector times `n_below` upper-bounds the
/// sum, and the maximum difference vector lower-bounds it.
pub(crate) struct ScoreEstimate<'a> {
    node: &'a KdTree,
    lower: f64,
    upper: f64,
}

impl<'a> ScoreEstimate<'a> {
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn new(kernel: &dyn Kernel, node: &'a KdTree, q: &[f64]) -> Self {
        let (min_diff, max_diff) = node.min_max_distance_vectors(q);
        let n = node.n_below() as f64;
        Self {
            node,
            lower: kernel.density(&max_diff) * n,
            upper: kernel.density(&min_diff) * n,
        }
    }

    pub(crate) fn lower(&self) -> f64 {
        self.lower
    }

    pub(crate) fn upper(&self) -> f64 {
        self.upper
    }

    /// Produces fresh estimates for the lo/hi children, each recomputed
    /// independently from its own bounding box. Returns `None` for leaves.
    pub(crate) fn split(&self, kernel: &dyn Kernel, q: &[f64]) -> Option<(Self, Self)> {
        let lo = self.node.lo_child()?;
        let hi = self.node.hi_child()?;
        Some((Self::new(kernel, lo, q), Self::new(kernel, hi, q)))
    }

    /// Evaluates the kernel for every raw point in a leaf against `q` and
    /// sums the weights. Internal nodes hold no raw points and contribute
    /// nothing here.
    pub(crate) fn exact_weight(&self, kernel: &dyn Kernel, q: &[f64]) -> f64 {
        let items = self.node.items().unwrap_or(&[]);
        let mut weight = 0.0;
        for item in items {
            let diff: Vec<f64> = q.iter().zip(item).map(|(&a, &b)| a - b).collect();
            weight += kernel.density(&diff);
        }
        weight
    }
}

// Max-heap ordering by upper bound. Ties break arbitrarily; ordering
// stability is not a correctness requirement.
impl PartialEq for ScoreEstimate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.upper.total_cmp(&other.upper) == Ordering::Equal
    }
}

impl Eq for ScoreEstimate<'_> {}

impl PartialOrd for ScoreEstimate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoreEstimate<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.upper.total_cmp(&other.upper)
    }
}

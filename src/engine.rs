//! Approximate query engine.
//!
//! Builds the spatial partition tree once over the training set, then
//! answers density queries with a best-first branch-and-bound refinement
//! loop: a max-priority queue of [`ScoreEstimate`]s ordered by upper bound,
//! refined until the running interval is tight enough (tolerance rule), the
//! point is confidently dense (cutoff rule), the work budget is spent, or
//! every bound has collapsed to an exact value (exhaustion).

use std::collections::BinaryHeap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bandwidth;
use crate::error::{Error, Result};
use crate::estimate::ScoreEstimate;
use crate::kernel::{Kernel, KernelType};
use crate::tree::{KdTree, SplitPolicy};

/// Which rule ended the refinement loop for one query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Termination {
    /// The running interval width dropped below `tolerance * N`.
    Tolerance,
    /// The running lower bound exceeded `cutoff * N`; the point is
    /// confidently denser than the cutoff and the exact value is unneeded.
    Cutoff,
    /// The node budget was spent before any other rule fired.
    Budget,
    /// The queue emptied: every bound collapsed to an exact value.
    Exhausted,
}

/// Per-query diagnostic counters, returned to the caller.
///
/// Aggregate these across queries to tune `tolerance` and `cutoff`; they
/// are not required for correctness.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QueryStats {
    /// The rule that terminated the refinement loop.
    pub termination: Termination,
    /// Number of frontier nodes created during the search (the root counts
    /// as 1, each split adds 2).
    pub nodes_processed: u64,
}

struct Trained {
    tree: KdTree,
    kernel: Box<dyn Kernel>,
    bandwidth: Vec<f64>,
    num_points: usize,
    /// `tolerance * num_points`, cached at train time.
    unscaled_tolerance: f64,
    /// `cutoff * num_points`, cached at train time.
    unscaled_cutoff: f64,
}

/// Approximate kernel density estimator over a spatial partition tree.
///
/// Configure through [`TreeKde::builder`], call [`train`](TreeKde::train)
/// once with the full training set, then query [`density`](TreeKde::density)
/// and [`score`](TreeKde::score) as often as needed. The trained engine
/// holds no mutable per-query state, so it can be shared read-only (e.g.
/// behind an `Arc`) across arbitrarily many concurrent queries.
///
/// # Examples
///
/// ```
/// use treekde::TreeKde;
///
/// let mut kde = TreeKde::builder()
///     .leaf_capacity(3)
///     .bandwidth(vec![2.0])
///     .build()
///     .unwrap();
/// kde.train(vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0], vec![4.0]])
///     .unwrap();
///
/// let score = kde.score(&[0.0]).unwrap();
/// assert!((score - 2.1400523).abs() < 1e-5);
/// ```
pub struct TreeKde {
    leaf_capacity: usize,
    split_policy: SplitPolicy,
    tolerance: f64,
    cutoff: f64,
    kernel_type: KernelType,
    bandwidth: Option<Vec<f64>>,
    node_budget: Option<u64>,
    trained: Option<Trained>,
}

impl TreeKde {
    /// Creates a builder for configuring the engine.
    ///
    /// # Examples
    ///
    /// ```
    /// use treekde::{KernelType, SplitPolicy, TreeKde};
    ///
    /// let kde = TreeKde::builder()
    ///     .leaf_capacity(20)
    ///     .split_policy(SplitPolicy::WidthBalanced)
    ///     .kernel(KernelType::Epanechnikov)
    ///     .tolerance(1e-5)
    ///     .cutoff(7e-4)
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn builder() -> TreeKdeBuilder {
        TreeKdeBuilder::new()
    }

    /// Builds the tree over `data` and fixes the kernel.
    ///
    /// If no bandwidth was configured, a Scott's-rule bandwidth is selected
    /// from the data. The training set is consumed; the resulting tree is
    /// immutable and reused by every subsequent query.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptySamples` if `data` is empty.
    /// Returns `Error::ZeroDimensions` if the vectors have zero length.
    /// Returns `Error::DimensionMismatch` if dimensions are inconsistent.
    /// Returns `Error::BandwidthDimensionMismatch` if a configured bandwidth
    /// has a different length than the data.
    #[allow(clippy::cast_precision_loss)]
    pub fn train(&mut self, data: Vec<Vec<f64>>) -> Result<()> {
        if data.is_empty() {
            return Err(Error::EmptySamples);
        }
        let k = data[0].len();
        if k == 0 {
            return Err(Error::ZeroDimensions);
        }
        for (i, p) in data.iter().enumerate() {
            if p.len() != k {
                return Err(Error::DimensionMismatch {
                    expected: k,
                    got: p.len(),
                    sample_index: i,
                });
            }
        }

        let bandwidth = match &self.bandwidth {
            Some(bw) => {
                if bw.len() != k {
                    return Err(Error::BandwidthDimensionMismatch {
                        expected: k,
                        got: bw.len(),
                    });
                }
                bw.clone()
            }
            None => bandwidth::scotts_rule(&data, k),
        };
        let kernel = self.kernel_type.initialize(bandwidth.clone())?;

        let num_points = data.len();
        trace_info!(num_points, "training tree KDE");

        let tree = KdTree::build(data, self.leaf_capacity, self.split_policy)?;
        self.trained = Some(Trained {
            tree,
            kernel,
            bandwidth,
            num_points,
            unscaled_tolerance: self.tolerance * num_points as f64,
            unscaled_cutoff: self.cutoff * num_points as f64,
        });
        Ok(())
    }

    /// Returns the normalized density estimate at `q`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotTrained` before [`train`](TreeKde::train).
    /// Returns `Error::QueryDimensionMismatch` if `q` has the wrong length.
    pub fn density(&self, q: &[f64]) -> Result<f64> {
        self.density_with_stats(q).map(|(d, _)| d)
    }

    /// Returns the normalized density estimate at `q` together with the
    /// per-query diagnostics.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotTrained` before [`train`](TreeKde::train).
    /// Returns `Error::QueryDimensionMismatch` if `q` has the wrong length.
    #[allow(clippy::cast_precision_loss)]
    pub fn density_with_stats(&self, q: &[f64]) -> Result<(f64, QueryStats)> {
        let trained = self.trained(q)?;
        let (unscaled, stats) = self.pq_score(trained, q);
        Ok((unscaled / trained.num_points as f64, stats))
    }

    /// Returns the negative log of the normalized density at `q`.
    ///
    /// Larger values indicate more anomalous (lower-density) points, so
    /// callers can select top-scoring points as outliers. A density that
    /// underflows to zero yields the maximal-outlier sentinel
    /// `f64::INFINITY` rather than an error; this is part of the contract.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotTrained` before [`train`](TreeKde::train).
    /// Returns `Error::QueryDimensionMismatch` if `q` has the wrong length.
    pub fn score(&self, q: &[f64]) -> Result<f64> {
        self.score_with_stats(q).map(|(s, _)| s)
    }

    /// Returns the negative log density at `q` together with the per-query
    /// diagnostics. See [`score`](TreeKde::score) for the sign convention
    /// and the zero-density sentinel.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotTrained` before [`train`](TreeKde::train).
    /// Returns `Error::QueryDimensionMismatch` if `q` has the wrong length.
    #[allow(clippy::cast_precision_loss)]
    pub fn score_with_stats(&self, q: &[f64]) -> Result<(f64, QueryStats)> {
        let trained = self.trained(q)?;
        let (unscaled, stats) = self.pq_score(trained, q);
        let score = -(unscaled.ln() - (trained.num_points as f64).ln());
        Ok((score, stats))
    }

    /// Returns the trained tree, or `None` before training.
    pub fn tree(&self) -> Option<&KdTree> {
        self.trained.as_ref().map(|t| &t.tree)
    }

    /// Returns the bandwidth in effect, or `None` before training.
    pub fn bandwidth(&self) -> Option<&[f64]> {
        self.trained.as_ref().map(|t| t.bandwidth.as_slice())
    }

    /// Returns the training set size, or `None` before training.
    pub fn num_points(&self) -> Option<usize> {
        self.trained.as_ref().map(|t| t.num_points)
    }

    fn trained(&self, q: &[f64]) -> Result<&Trained> {
        let trained = self.trained.as_ref().ok_or(Error::NotTrained)?;
        let expected = trained.tree.dim();
        if q.len() != expected {
            return Err(Error::QueryDimensionMismatch {
                expected,
                got: q.len(),
            });
        }
        Ok(trained)
    }

    /// Runs the best-first refinement loop; returns `density * N` and the
    /// per-query counters.
    fn pq_score(&self, trained: &Trained, q: &[f64]) -> (f64, QueryStats) {
        let kernel = trained.kernel.as_ref();
        let root = ScoreEstimate::new(kernel, &trained.tree, q);
        let mut w_min = root.lower();
        let mut w_max = root.upper();
        let mut nodes_processed: u64 = 1;

        let mut pq = BinaryHeap::new();
        pq.push(root);

        let mut termination = Termination::Exhausted;
        while let Some(cur) = pq.pop() {
            if w_max - w_min < trained.unscaled_tolerance {
                termination = Termination::Tolerance;
                break;
            }
            if w_min > trained.unscaled_cutoff {
                termination = Termination::Cutoff;
                break;
            }
            if self.node_budget.is_some_and(|budget| nodes_processed >= budget) {
                termination = Termination::Budget;
                break;
            }

            // Resolve the dominant remaining source of uncertainty first.
            w_min -= cur.lower();
            w_max -= cur.upper();
            if let Some((lo, hi)) = cur.split(kernel, q) {
                w_min += lo.lower() + hi.lower();
                w_max += lo.upper() + hi.upper();
                pq.push(lo);
                pq.push(hi);
                nodes_processed += 2;
            } else {
                // Leaf: the exact weight sum re-enters as a zero-width interval.
                let exact = cur.exact_weight(kernel, q);
                w_min += exact;
                w_max += exact;
            }
        }

        let unscaled = 0.5 * (w_min + w_max);
        trace_debug!(?termination, nodes_processed, "query refined");
        (
            unscaled,
            QueryStats {
                termination,
                nodes_processed,
            },
        )
    }
}

/// Builder for [`TreeKde`].
///
/// # Examples
///
/// ```
/// use treekde::TreeKdeBuilder;
///
/// let kde = TreeKdeBuilder::new()
///     .leaf_capacity(3)
///     .tolerance(1e-5)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct TreeKdeBuilder {
    leaf_capacity: usize,
    split_policy: SplitPolicy,
    tolerance: f64,
    cutoff: f64,
    kernel_type: KernelType,
    bandwidth: Option<Vec<f64>>,
    node_budget: Option<u64>,
}

impl TreeKdeBuilder {
    /// Creates a new builder with default settings.
    ///
    /// Default settings:
    /// - `leaf_capacity`: 20
    /// - `split_policy`: `Median`
    /// - `tolerance`: 0.0 (exact)
    /// - `cutoff`: `+∞` (disabled)
    /// - `kernel`: `Gaussian`
    /// - `bandwidth`: None (Scott's rule at train time)
    /// - `node_budget`: None (unlimited)
    pub fn new() -> Self {
        Self {
            leaf_capacity: 20,
            split_policy: SplitPolicy::Median,
            tolerance: 0.0,
            cutoff: f64::INFINITY,
            kernel_type: KernelType::Gaussian,
            bandwidth: None,
            node_budget: None,
        }
    }

    /// Sets the maximum number of points a tree region may hold before it
    /// becomes a leaf. Must be at least 1.
    pub fn leaf_capacity(mut self, leaf_capacity: usize) -> Self {
        self.leaf_capacity = leaf_capacity;
        self
    }

    /// Sets the split-index policy used during tree construction.
    pub fn split_policy(mut self, split_policy: SplitPolicy) -> Self {
        self.split_policy = split_policy;
        self
    }

    /// Sets the per-point density tolerance. A query stops refining once
    /// the interval width drops below `tolerance * N`. Zero means exact.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the density cutoff. A query stops refining once the lower bound
    /// exceeds `cutoff * N`: the point is then confidently denser than the
    /// cutoff and non-outliers are fast-rejected. `+∞` disables the rule.
    pub fn cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Sets the kernel variant.
    pub fn kernel(mut self, kernel_type: KernelType) -> Self {
        self.kernel_type = kernel_type;
        self
    }

    /// Sets an explicit per-axis bandwidth vector. Its length must equal
    /// the training data dimensionality at train time. If unset, Scott's
    /// rule selects a bandwidth from the data.
    pub fn bandwidth(mut self, bandwidth: Vec<f64>) -> Self {
        self.bandwidth = Some(bandwidth);
        self
    }

    /// Caps the number of frontier nodes a single query may create. When
    /// the budget is spent the query returns the midpoint of the current
    /// interval. Unset means unlimited.
    pub fn node_budget(mut self, node_budget: u64) -> Self {
        self.node_budget = Some(node_budget);
        self
    }

    /// Validates the configuration and creates the engine.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidLeafCapacity` if `leaf_capacity < 1`.
    /// Returns `Error::InvalidTolerance` if the tolerance is negative or NaN.
    /// Returns `Error::InvalidCutoff` if the cutoff is NaN.
    /// Returns `Error::InvalidBandwidth` if an explicit bandwidth has a
    /// non-positive component.
    pub fn build(self) -> Result<TreeKde> {
        if self.leaf_capacity < 1 {
            return Err(Error::InvalidLeafCapacity(self.leaf_capacity));
        }
        if self.tolerance.is_nan() || self.tolerance < 0.0 {
            return Err(Error::InvalidTolerance(self.tolerance));
        }
        if self.cutoff.is_nan() {
            return Err(Error::InvalidCutoff(self.cutoff));
        }
        if let Some(bw) = &self.bandwidth {
            for &h in bw {
                if h <= 0.0 || !h.is_finite() {
                    return Err(Error::InvalidBandwidth(h));
                }
            }
        }
        Ok(TreeKde {
            leaf_capacity: self.leaf_capacity,
            split_policy: self.split_policy,
            tolerance: self.tolerance,
            cutoff: self.cutoff,
            kernel_type: self.kernel_type,
            bandwidth: self.bandwidth,
            node_budget: self.node_budget,
            trained: None,
        })
    }
}

impl Default for TreeKdeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_data() -> Vec<Vec<f64>> {
        vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0], vec![4.0]]
    }

    #[test]
    fn test_builder_rejects_zero_leaf_capacity() {
        let result = TreeKde::builder().leaf_capacity(0).build();
        assert!(matches!(result, Err(Error::InvalidLeafCapacity(0))));
    }

    #[test]
    fn test_builder_rejects_negative_tolerance() {
        let result = TreeKde::builder().tolerance(-1e-3).build();
        assert!(matches!(result, Err(Error::InvalidTolerance(_))));
    }

    #[test]
    fn test_builder_rejects_nan_cutoff() {
        let result = TreeKde::builder().cutoff(f64::NAN).build();
        assert!(matches!(result, Err(Error::InvalidCutoff(_))));
    }

    #[test]
    fn test_builder_rejects_non_positive_bandwidth() {
        let result = TreeKde::builder().bandwidth(vec![1.0, -0.5]).build();
        assert!(matches!(result, Err(Error::InvalidBandwidth(_))));
    }

    #[test]
    fn test_score_before_train_fails() {
        let kde = TreeKde::builder().build().unwrap();
        assert!(matches!(kde.score(&[0.0]), Err(Error::NotTrained)));
        assert!(matches!(kde.density(&[0.0]), Err(Error::NotTrained)));
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let mut kde = TreeKde::builder().bandwidth(vec![2.0]).build().unwrap();
        kde.train(line_data()).unwrap();
        assert!(matches!(
            kde.density(&[0.0, 1.0]),
            Err(Error::QueryDimensionMismatch {
                expected: 1,
                got: 2
            })
        ));
    }

    #[test]
    fn test_train_rejects_bandwidth_length_mismatch() {
        let mut kde = TreeKde::builder()
            .bandwidth(vec![1.0, 1.0])
            .build()
            .unwrap();
        assert!(matches!(
            kde.train(line_data()),
            Err(Error::BandwidthDimensionMismatch {
                expected: 1,
                got: 2
            })
        ));
    }

    #[test]
    fn test_train_rejects_empty_data() {
        let mut kde = TreeKde::builder().build().unwrap();
        assert!(matches!(kde.train(Vec::new()), Err(Error::EmptySamples)));
    }

    #[test]
    fn test_train_selects_default_bandwidth() {
        let mut kde = TreeKde::builder().build().unwrap();
        kde.train(line_data()).unwrap();
        let bw = kde.bandwidth().unwrap();
        assert_eq!(bw.len(), 1);
        assert!(bw[0] > 0.0);
        assert_eq!(kde.num_points(), Some(5));
    }

    #[test]
    fn test_exhaustive_query_reports_exhaustion() {
        let mut kde = TreeKde::builder()
            .leaf_capacity(2)
            .bandwidth(vec![2.0])
            .build()
            .unwrap();
        kde.train(line_data()).unwrap();
        let (_, stats) = kde.density_with_stats(&[2.0]).unwrap();
        assert_eq!(stats.termination, Termination::Exhausted);
        assert!(stats.nodes_processed >= 1);
    }

    #[test]
    fn test_node_budget_stops_refinement() {
        let mut kde = TreeKde::builder()
            .leaf_capacity(1)
            .bandwidth(vec![2.0])
            .node_budget(1)
            .build()
            .unwrap();
        kde.train(line_data()).unwrap();
        let (density, stats) = kde.density_with_stats(&[2.0]).unwrap();
        assert_eq!(stats.termination, Termination::Budget);
        assert_eq!(stats.nodes_processed, 1);
        assert!(density.is_finite() && density >= 0.0);
    }

    #[test]
    fn test_zero_density_scores_as_maximal_outlier() {
        let mut kde = TreeKde::builder().bandwidth(vec![2.0]).build().unwrap();
        kde.train(line_data()).unwrap();
        // Far enough for the Gaussian weight to underflow to zero.
        let score = kde.score(&[1e9]).unwrap();
        assert!(score.is_infinite() && score > 0.0);
    }
}

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]
#![allow(clippy::module_name_repetitions)]

//! Approximate kernel density estimation with provable error bounds.
//!
//! A k-d tree is built once over a fixed training set of k-dimensional
//! vectors. Each query then runs a best-first branch-and-bound search over
//! the tree: every frontier node carries an interval bounding the total
//! kernel weight of the points beneath it, and the search always refines
//! the node with the largest upper bound. The loop stops as soon as either
//! early-termination criterion fires, so most queries never touch most of
//! the training points:
//!
//! - **tolerance**: the interval is narrower than `tolerance * N`, bounding
//!   the absolute density error per point;
//! - **cutoff**: the lower bound already exceeds `cutoff * N`, so the point
//!   is confidently dense and can be fast-rejected as a non-outlier.
//!
//! # Getting Started
//!
//! ```
//! use treekde::prelude::*;
//!
//! let points = vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0], vec![4.0]];
//!
//! let mut kde = TreeKde::builder()
//!     .leaf_capacity(3)
//!     .bandwidth(vec![2.0])
//!     .build()
//!     .unwrap();
//! kde.train(points).unwrap();
//!
//! // Negative log density: larger means more anomalous.
//! let score = kde.score(&[4.0]).unwrap();
//! assert!(score > kde.score(&[2.0]).unwrap());
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`TreeKde`] | Train once, then answer `density`/`score` queries with bounded error. |
//! | [`KdTree`] | Immutable spatial partition tree; read-only introspection and diagnostics. |
//! | [`Kernel`](kernel::Kernel) | Capability mapping a difference vector to a non-negative, monotone weight. |
//! | [`KernelType`] | Kernel variant selected at configuration time — Gaussian or Epanechnikov. |
//! | [`SplitPolicy`] | How the tree picks its split index — median or width-balanced. |
//! | [`QueryStats`] | Per-query counters: which rule terminated the search, how many nodes it expanded. |
//!
//! # Concurrency
//!
//! The tree is immutable after [`TreeKde::train`] and each query owns its
//! own frontier, so a trained engine can be shared behind an `Arc` and
//! queried from any number of threads without locking.
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `serde` | `Serialize`/`Deserialize` on plain-data public types | off |
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at train and query time | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

mod bandwidth;
mod engine;
mod error;
mod estimate;
pub mod kernel;
pub mod tree;

pub use engine::{QueryStats, Termination, TreeKde, TreeKdeBuilder};
pub use error::{Error, Result};
pub use kernel::{EpanechnikovKernel, GaussianKernel, Kernel, KernelType};
pub use tree::{BoundingBox, KdTree, SplitPolicy};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use treekde::prelude::*;
/// ```
pub mod prelude {
    pub use crate::engine::{QueryStats, Termination, TreeKde, TreeKdeBuilder};
    pub use crate::error::{Error, Result};
    pub use crate::kernel::{EpanechnikovKernel, GaussianKernel, Kernel, KernelType};
    pub use crate::tree::{BoundingBox, KdTree, SplitPolicy};
}

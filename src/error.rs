#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when training is attempted on an empty point set.
    #[error("training set cannot be empty")]
    EmptySamples,

    /// Returned when training vectors have zero dimensions.
    #[error("training vectors must have at least one dimension")]
    ZeroDimensions,

    /// Returned when training vectors have inconsistent dimensions.
    #[error(
        "dimension mismatch: expected {expected} dimensions but vector {sample_index} has {got}"
    )]
    DimensionMismatch {
        /// The expected number of dimensions.
        expected: usize,
        /// The actual number of dimensions in the vector.
        got: usize,
        /// The index of the vector with mismatched dimensions.
        sample_index: usize,
    },

    /// Returned when a query point's dimensionality doesn't match the training set.
    #[error("query dimension mismatch: expected {expected} dimensions but got {got}")]
    QueryDimensionMismatch {
        /// The expected number of dimensions.
        expected: usize,
        /// The actual number of dimensions in the query point.
        got: usize,
    },

    /// Returned when the bandwidth vector length doesn't match the number of dimensions.
    #[error("bandwidth dimension mismatch: expected {expected} bandwidths but got {got}")]
    BandwidthDimensionMismatch {
        /// The expected number of bandwidths.
        expected: usize,
        /// The actual number of bandwidths provided.
        got: usize,
    },

    /// Returned when a bandwidth component is not positive.
    #[error("invalid bandwidth: {0} must be positive")]
    InvalidBandwidth(f64),

    /// Returned when the leaf capacity is configured below 1.
    #[error("invalid leaf capacity: {0} must be at least 1")]
    InvalidLeafCapacity(usize),

    /// Returned when the tolerance is negative or NaN.
    #[error("invalid tolerance: {0} must be a non-negative number")]
    InvalidTolerance(f64),

    /// Returned when the cutoff is NaN.
    #[error("invalid cutoff: {0} must be a number")]
    InvalidCutoff(f64),

    /// Returned when scoring is attempted before `train` has been called.
    #[error("engine has not been trained")]
    NotTrained,
}

pub type Result<T> = core::result::Result<T, Error>;

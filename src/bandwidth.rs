//! Default bandwidth selection.
//!
//! Scott's rule for multivariate KDE sets the bandwidth per dimension as
//! `h_j = n^(-1/(d+4)) * sigma_j`, where n is the number of samples, d the
//! dimensionality and `sigma_j` the standard deviation of the j-th
//! dimension. Used only when the caller configures no explicit bandwidth.

/// Computes per-axis bandwidths for `samples` using Scott's rule.
///
/// Callers guarantee `samples` is non-empty with uniform dimensionality
/// `n_dims`. Degenerate axes (zero variance) fall back to a bandwidth of 1.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn scotts_rule(samples: &[Vec<f64>], n_dims: usize) -> Vec<f64> {
    let n = samples.len() as f64;
    let d = n_dims as f64;

    let exponent = -1.0 / (d + 4.0);
    let scale_factor = n.powf(exponent);

    (0..n_dims)
        .map(|dim| {
            let std_dev = dimension_std_dev(samples, dim);
            if std_dev < f64::EPSILON {
                1.0
            } else {
                scale_factor * std_dev
            }
        })
        .collect()
}

/// Computes the sample standard deviation for a single dimension.
#[allow(clippy::cast_precision_loss)]
fn dimension_std_dev(samples: &[Vec<f64>], dim: usize) -> f64 {
    let n = samples.len() as f64;
    let mean = samples.iter().map(|s| s[dim]).sum::<f64>() / n;
    let variance = samples.iter().map(|s| (s[dim] - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

//! Kernel capability: maps a k-dimensional difference vector to a
//! non-negative weight.
//!
//! Every kernel is configured once with a per-axis bandwidth vector. The
//! contract the branch-and-bound engine relies on is monotonicity: the
//! weight must be non-increasing as the bandwidth-scaled magnitude of the
//! difference vector grows. Evaluating at the minimum possible difference
//! vector of a bounding box therefore upper-bounds any point's contribution
//! inside the box, and the maximum difference vector lower-bounds it.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A density kernel over k-dimensional difference vectors.
///
/// Implementations must be non-negative, monotonically non-increasing in
/// the bandwidth-scaled magnitude of `diff`, and integrate to unit mass so
/// that normalized density outputs are meaningful.
pub trait Kernel: Send + Sync {
    /// Returns the number of dimensions the kernel was configured for.
    fn dim(&self) -> usize;

    /// Returns the weight for the difference vector `diff`.
    ///
    /// # Panics
    ///
    /// Panics if `diff.len() != self.dim()`.
    fn density(&self, diff: &[f64]) -> f64;
}

fn validate_bandwidth(bandwidth: &[f64]) -> Result<()> {
    if bandwidth.is_empty() {
        return Err(Error::ZeroDimensions);
    }
    for &h in bandwidth {
        if h <= 0.0 || !h.is_finite() {
            return Err(Error::InvalidBandwidth(h));
        }
    }
    Ok(())
}

/// A product Gaussian kernel with a diagonal bandwidth matrix:
///
/// `K(d) = (2π)^(-k/2) / Π hᵢ · exp(-½ Σ (dᵢ/hᵢ)²)`
///
/// # Examples
///
/// ```
/// use treekde::{GaussianKernel, Kernel};
///
/// let kernel = GaussianKernel::new(vec![2.0]).unwrap();
/// let at_zero = kernel.density(&[0.0]);
/// let at_one = kernel.density(&[1.0]);
/// assert!(at_zero > at_one);
/// ```
#[derive(Clone, Debug)]
pub struct GaussianKernel {
    bandwidth: Vec<f64>,
    /// Normalization constant `(2π)^(-k/2) / Π hᵢ`, fixed at construction.
    norm: f64,
}

impl GaussianKernel {
    /// Creates a Gaussian kernel with the given per-axis bandwidths.
    ///
    /// # Errors
    ///
    /// Returns `Error::ZeroDimensions` if `bandwidth` is empty.
    /// Returns `Error::InvalidBandwidth` if any component is not positive.
    pub fn new(bandwidth: Vec<f64>) -> Result<Self> {
        validate_bandwidth(&bandwidth)?;
        let sqrt_2pi = (2.0 * core::f64::consts::PI).sqrt();
        let norm = bandwidth.iter().fold(1.0, |acc, &h| acc / (h * sqrt_2pi));
        Ok(Self { bandwidth, norm })
    }

    /// Returns the configured bandwidth vector.
    pub fn bandwidth(&self) -> &[f64] {
        &self.bandwidth
    }
}

impl Kernel for GaussianKernel {
    fn dim(&self) -> usize {
        self.bandwidth.len()
    }

    fn density(&self, diff: &[f64]) -> f64 {
        assert_eq!(
            diff.len(),
            self.bandwidth.len(),
            "Difference dimension {} doesn't match kernel dimension {}",
            diff.len(),
            self.bandwidth.len()
        );
        let scaled_sq: f64 = diff
            .iter()
            .zip(&self.bandwidth)
            .map(|(&d, &h)| {
                let z = d / h;
                z * z
            })
            .sum();
        self.norm * (-0.5 * scaled_sq).exp()
    }
}

/// A product Epanechnikov kernel with a diagonal bandwidth matrix:
///
/// `K(d) = Π max(0, 0.75 (1 - (dᵢ/hᵢ)²)) / hᵢ`
///
/// Compactly supported: the weight is exactly zero once any axis difference
/// exceeds its bandwidth.
#[derive(Clone, Debug)]
pub struct EpanechnikovKernel {
    bandwidth: Vec<f64>,
}

impl EpanechnikovKernel {
    /// Creates an Epanechnikov kernel with the given per-axis bandwidths.
    ///
    /// # Errors
    ///
    /// Returns `Error::ZeroDimensions` if `bandwidth` is empty.
    /// Returns `Error::InvalidBandwidth` if any component is not positive.
    pub fn new(bandwidth: Vec<f64>) -> Result<Self> {
        validate_bandwidth(&bandwidth)?;
        Ok(Self { bandwidth })
    }

    /// Returns the configured bandwidth vector.
    pub fn bandwidth(&self) -> &[f64] {
        &self.bandwidth
    }
}

impl Kernel for EpanechnikovKernel {
    fn dim(&self) -> usize {
        self.bandwidth.len()
    }

    fn density(&self, diff: &[f64]) -> f64 {
        assert_eq!(
            diff.len(),
            self.bandwidth.len(),
            "Difference dimension {} doesn't match kernel dimension {}",
            diff.len(),
            self.bandwidth.len()
        );
        let mut weight = 1.0;
        for (&d, &h) in diff.iter().zip(&self.bandwidth) {
            let z = d / h;
            if z.abs() >= 1.0 {
                return 0.0;
            }
            weight *= 0.75 * (1.0 - z * z) / h;
        }
        weight
    }
}

/// The kernel variant selected at configuration time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum KernelType {
    /// Product Gaussian kernel, [`GaussianKernel`].
    #[default]
    Gaussian,
    /// Product Epanechnikov kernel, [`EpanechnikovKernel`].
    Epanechnikov,
}

impl KernelType {
    /// Constructs the selected kernel, fixing its per-axis scale.
    ///
    /// # Errors
    ///
    /// Returns `Error::ZeroDimensions` if `bandwidth` is empty.
    /// Returns `Error::InvalidBandwidth` if any component is not positive.
    pub fn initialize(self, bandwidth: Vec<f64>) -> Result<Box<dyn Kernel>> {
        match self {
            KernelType::Gaussian => Ok(Box::new(GaussianKernel::new(bandwidth)?)),
            KernelType::Epanechnikov => Ok(Box::new(EpanechnikovKernel::new(bandwidth)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian_known_value_at_zero() {
        // 1-D, bandwidth 2: K(0) = 1 / (2 * sqrt(2*pi))
        let kernel = GaussianKernel::new(vec![2.0]).unwrap();
        let expected = 1.0 / (2.0 * (2.0 * core::f64::consts::PI).sqrt());
        assert!((kernel.density(&[0.0]) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_gaussian_monotone_in_magnitude() {
        let kernel = GaussianKernel::new(vec![1.0, 2.0]).unwrap();
        let mut prev = kernel.density(&[0.0, 0.0]);
        for step in 1..20 {
            let d = f64::from(step) * 0.25;
            let cur = kernel.density(&[d, d]);
            assert!(
                cur <= prev,
                "density must be non-increasing: K({d}) = {cur} > {prev}"
            );
            prev = cur;
        }
    }

    #[test]
    fn test_gaussian_integrates_to_one_1d() {
        let kernel = GaussianKernel::new(vec![0.7]).unwrap();
        let n_points = 4000;
        let (low, high) = (-8.0, 8.0);
        let dx = (high - low) / f64::from(n_points);
        let integral: f64 = (0..n_points)
            .map(|i| kernel.density(&[low + (f64::from(i) + 0.5) * dx]) * dx)
            .sum();
        assert!((integral - 1.0).abs() < 1e-6, "integral = {integral}");
    }

    #[test]
    fn test_epanechnikov_compact_support() {
        let kernel = EpanechnikovKernel::new(vec![1.0, 2.0]).unwrap();
        assert!(kernel.density(&[0.0, 0.0]) > 0.0);
        assert!((kernel.density(&[1.0, 0.0]) - 0.0).abs() < f64::EPSILON);
        assert!((kernel.density(&[0.0, 2.5]) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_epanechnikov_integrates_to_one_1d() {
        let kernel = EpanechnikovKernel::new(vec![1.5]).unwrap();
        let n_points = 4000;
        let (low, high) = (-2.0, 2.0);
        let dx = (high - low) / f64::from(n_points);
        let integral: f64 = (0..n_points)
            .map(|i| kernel.density(&[low + (f64::from(i) + 0.5) * dx]) * dx)
            .sum();
        assert!((integral - 1.0).abs() < 1e-5, "integral = {integral}");
    }

    #[test]
    fn test_epanechnikov_monotone_in_magnitude() {
        let kernel = EpanechnikovKernel::new(vec![3.0]).unwrap();
        let mut prev = kernel.density(&[0.0]);
        for step in 1..20 {
            let d = f64::from(step) * 0.2;
            let cur = kernel.density(&[d]);
            assert!(cur <= prev, "K({d}) = {cur} > {prev}");
            prev = cur;
        }
    }

    #[test]
    fn test_rejects_non_positive_bandwidth() {
        assert!(matches!(
            GaussianKernel::new(vec![1.0, 0.0]),
            Err(Error::InvalidBandwidth(bw)) if bw.abs() < f64::EPSILON
        ));
        assert!(matches!(
            EpanechnikovKernel::new(vec![-2.0]),
            Err(Error::InvalidBandwidth(bw)) if (bw + 2.0).abs() < f64::EPSILON
        ));
    }

    #[test]
    fn test_rejects_empty_bandwidth() {
        assert!(matches!(
            GaussianKernel::new(Vec::new()),
            Err(Error::ZeroDimensions)
        ));
    }

    #[test]
    fn test_kernel_type_dispatch() {
        let gaussian = KernelType::Gaussian.initialize(vec![1.0]).unwrap();
        let epa = KernelType::Epanechnikov.initialize(vec![1.0]).unwrap();
        assert_eq!(gaussian.dim(), 1);
        assert_eq!(epa.dim(), 1);
        // Gaussian has unbounded support, Epanechnikov does not.
        assert!(gaussian.density(&[5.0]) > 0.0);
        assert!((epa.density(&[5.0]) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    #[should_panic(expected = "Difference dimension")]
    fn test_density_wrong_dimension_panics() {
        let kernel = GaussianKernel::new(vec![1.0, 1.0]).unwrap();
        let _ = kernel.density(&[0.0]);
    }
}

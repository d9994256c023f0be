// kernel.rs — Square smoothing kernel.
//
// CONVENTION: `weight(row, col)` — `row` runs along the value axis (texel
// rows), `col` along the time axis (texel columns), centred on `(c, c)`
// with `c = (size - 1) / 2`. The time axis is mirrored, the value axis is
// not:
//
//   out(x, y) = Σ_{row,col} weight(row, col) * in(x + c - col, y + row - c)
//
// so a weight right of centre pushes mass towards later time columns.
//
// Only odd sizes have a well-defined centre; even or non-square inputs are
// rejected before any render target is allocated.

use crate::error::{HeatmapError, Result};

/// A validated `size × size` kernel with odd `size`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianKernel {
    size: usize,
    /// Row-major weights, `size * size` entries.
    weights: Vec<f32>,
}

impl GaussianKernel {
    /// Validate and pack a kernel given as rows.
    ///
    /// # Errors
    /// `InvalidKernel` if the matrix is empty, any row length differs from
    /// the number of rows, the size is even, or a weight is not finite.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let size = rows.len();
        if size == 0 {
            return Err(HeatmapError::InvalidKernel("kernel is empty".into()));
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != size) {
            return Err(HeatmapError::InvalidKernel(format!(
                "kernel must be square: row {i} has {} entries, expected {size}",
                row.len()
            )));
        }
        if size % 2 == 0 {
            return Err(HeatmapError::InvalidKernel(format!(
                "kernel size must be odd (got {size}x{size})"
            )));
        }
        let weights: Vec<f32> = rows.iter().flatten().copied().collect();
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(HeatmapError::InvalidKernel("kernel weights must be finite".into()));
        }
        Ok(GaussianKernel { size, weights })
    }

    /// The trivial `[[1]]` kernel. Smoothing with it is the identity.
    pub fn identity() -> Self {
        GaussianKernel { size: 1, weights: vec![1.0] }
    }

    /// A normalized isotropic Gaussian of side `2 * half_size + 1`.
    ///
    /// Built as the outer product of the 1D Gaussian
    /// `g[i] = exp(-i² / 2σ²) / Σg`, so the weights sum to 1.0 and smoothing
    /// preserves each column's mass away from tile borders.
    ///
    /// # Errors
    /// `InvalidKernel` if `sigma` is not a positive finite number.
    pub fn gaussian(half_size: usize, sigma: f32) -> Result<Self> {
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(HeatmapError::InvalidKernel(format!(
                "sigma must be positive (got {sigma})"
            )));
        }
        let g = gaussian_1d(half_size, sigma);
        let size = g.len();
        let mut weights = Vec::with_capacity(size * size);
        for &gy in &g {
            for &gx in &g {
                weights.push(gy * gx);
            }
        }
        Ok(GaussianKernel { size, weights })
    }

    /// Side length (always odd).
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Index of the centre row/column: `(size - 1) / 2`.
    #[inline]
    pub fn center(&self) -> usize {
        (self.size - 1) / 2
    }

    /// Weight at `row` (value axis), `col` (time axis).
    #[inline]
    pub fn weight(&self, row: usize, col: usize) -> f32 {
        self.weights[row * self.size + col]
    }

    /// Row-major weights, as uploaded to the GPU.
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Iterate over `(dx, dy, weight)`, where `(x + dx, y + dy)` is the
    /// source texel the weight reads for output `(x, y)`.
    pub fn taps(&self) -> impl Iterator<Item = (isize, isize, f32)> + '_ {
        let c = self.center() as isize;
        let size = self.size;
        self.weights.iter().enumerate().map(move |(i, &w)| {
            let row = (i / size) as isize;
            let col = (i % size) as isize;
            (c - col, row - c, w)
        })
    }
}

/// Normalized 1D Gaussian of length `2 * half_size + 1`.
fn gaussian_1d(half_size: usize, sigma: f32) -> Vec<f32> {
    let len = 2 * half_size + 1;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..len)
        .map(|i| {
            let x = i as f32 - half_size as f32;
            (-x * x / two_sigma_sq).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_square() {
        let err = GaussianKernel::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap_err();
        assert!(matches!(err, HeatmapError::InvalidKernel(_)));
    }

    #[test]
    fn test_rejects_even() {
        let err = GaussianKernel::from_rows(&[vec![0.25, 0.25], vec![0.25, 0.25]]).unwrap_err();
        assert!(matches!(err, HeatmapError::InvalidKernel(_)));
        assert!(err.to_string().contains("odd"), "{err}");
    }

    #[test]
    fn test_rejects_empty_and_nan() {
        assert!(GaussianKernel::from_rows(&[]).is_err());
        assert!(GaussianKernel::from_rows(&[vec![f32::NAN]]).is_err());
    }

    #[test]
    fn test_center_and_taps() {
        let k = GaussianKernel::from_rows(&[
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
            vec![7.0, 8.0, 9.0],
        ])
        .unwrap();
        assert_eq!(k.size(), 3);
        assert_eq!(k.center(), 1);
        assert_eq!(k.weight(0, 2), 3.0);
        let taps: Vec<_> = k.taps().collect();
        assert_eq!(taps[0], (1, -1, 1.0));
        assert_eq!(taps[2], (-1, -1, 3.0));
        assert_eq!(taps[4], (0, 0, 5.0));
        assert_eq!(taps[6], (1, 1, 7.0));
    }

    #[test]
    fn test_gaussian_properties() {
        let k = GaussianKernel::gaussian(2, 1.0).unwrap();
        assert_eq!(k.size(), 5);
        let sum: f32 = k.weights().iter().sum();
        assert!((sum - 1.0).abs() < 1e-5, "sum = {sum}");
        // Symmetric and peaked at the centre.
        assert!((k.weight(0, 1) - k.weight(1, 0)).abs() < 1e-7);
        assert!((k.weight(0, 0) - k.weight(4, 4)).abs() < 1e-7);
        assert!(k.weight(2, 2) > k.weight(2, 1));
        assert!(k.weight(2, 1) > k.weight(2, 0));
    }

    #[test]
    fn test_gaussian_rejects_bad_sigma() {
        assert!(GaussianKernel::gaussian(1, 0.0).is_err());
        assert!(GaussianKernel::gaussian(1, f32::INFINITY).is_err());
    }

    #[test]
    fn test_identity() {
        let k = GaussianKernel::identity();
        assert_eq!(k.size(), 1);
        assert_eq!(k.center(), 0);
        assert_eq!(k.taps().collect::<Vec<_>>(), vec![(0, 0, 1.0)]);
    }
}

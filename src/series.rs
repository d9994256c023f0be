// series.rs — Row-major matrix of aligned time series.
//
// Layout: `num_series` rows of `num_points` samples each, contiguous.
// All series share the implicit time axis t = 0, 1, ..., num_points-1, so
// the sample index *is* the time coordinate fed to the X bins.
//
//   data index:  0  1  2  3 | 4  5  6  7 | 8  9 10 11
//   series:      |-- s0 ---|  |-- s1 ---|  |-- s2 ---|
//
// The matrix is immutable once built; the pipeline only ever borrows rows.

use crate::error::{HeatmapError, Result};

/// A `[num_series][num_points]` matrix of `f32` samples.
#[derive(Clone, PartialEq)]
pub struct SeriesMatrix {
    data: Vec<f32>,
    num_series: usize,
    num_points: usize,
}

impl SeriesMatrix {
    /// Build from a flat row-major buffer.
    ///
    /// Fails with `InvalidConfig` if `data.len() != num_series * num_points`
    /// or if any sample is NaN or infinite.
    pub fn from_vec(num_series: usize, num_points: usize, data: Vec<f32>) -> Result<Self> {
        let expected = num_series.checked_mul(num_points).ok_or_else(|| {
            HeatmapError::InvalidConfig(format!(
                "series matrix {num_series}x{num_points} overflows usize"
            ))
        })?;
        if data.len() != expected {
            return Err(HeatmapError::InvalidConfig(format!(
                "data length ({}) must equal num_series * num_points ({expected})",
                data.len()
            )));
        }
        if let Some(i) = data.iter().position(|v| !v.is_finite()) {
            return Err(HeatmapError::InvalidConfig(format!(
                "sample {} of series {} is not finite ({})",
                i % num_points.max(1),
                i / num_points.max(1),
                data[i]
            )));
        }
        Ok(SeriesMatrix { data, num_series, num_points })
    }

    /// Build from one `Vec` per series. All rows must have the same length.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let num_series = rows.len();
        let num_points = rows.first().map_or(0, Vec::len);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != num_points) {
            return Err(HeatmapError::InvalidConfig(format!(
                "series {i} has {} samples, expected {num_points}",
                row.len()
            )));
        }
        let data = rows.into_iter().flatten().collect();
        Self::from_vec(num_series, num_points, data)
    }

    /// An empty matrix (zero series) with the given sample count.
    pub fn empty(num_points: usize) -> Self {
        SeriesMatrix { data: Vec::new(), num_series: 0, num_points }
    }

    #[inline]
    pub fn num_series(&self) -> usize {
        self.num_series
    }

    #[inline]
    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// Borrow the samples of series `index`.
    ///
    /// # Panics
    /// Panics if `index >= num_series`.
    #[inline]
    pub fn row(&self, index: usize) -> &[f32] {
        assert!(
            index < self.num_series,
            "series {index} out of bounds ({} series)",
            self.num_series
        );
        let start = index * self.num_points;
        &self.data[start..start + self.num_points]
    }

    /// Borrow a contiguous range of series as one flat slice
    /// (`range.len() * num_points` samples, row-major).
    pub fn rows(&self, range: std::ops::Range<usize>) -> &[f32] {
        assert!(
            range.end <= self.num_series,
            "series range {range:?} out of bounds ({} series)",
            self.num_series
        );
        &self.data[range.start * self.num_points..range.end * self.num_points]
    }

    /// Iterate over all series in order.
    pub fn iter(&self) -> impl Iterator<Item = &[f32]> + '_ {
        (0..self.num_series).map(move |i| self.row(i))
    }

    /// The whole matrix as a flat row-major slice.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

impl std::fmt::Debug for SeriesMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SeriesMatrix {{ {}x{} }}", self.num_series, self.num_points)
    }
}

// surface.rs — Host-side render targets.
//
// `Surface<T>` is the CPU stand-in for a GPU framebuffer: a row-major,
// tightly packed 2D buffer of texels. Two texel types are used:
//
//   Rgba  = [f32; 4]  — raw line, smoothed, column-sum, accumulation and
//                       pre-merge targets (one series per channel)
//   f32               — the final merged heatmap (channels collapsed)
//
// Row 0 is the *first* texel row, exactly as a wgpu texture is laid out
// on readback. Within a tile, row index == value-bin index and column
// index == time-bin index.

use std::fmt;

/// Four independent channels packed into one texel.
pub type Rgba = [f32; 4];

/// Texel types that can live in a [`Surface`].
pub trait Texel: Copy + Default + Send + Sync + PartialEq + 'static {
    /// Component-wise addition, used by accumulating passes.
    fn accumulate(self, other: Self) -> Self;

    /// Sum of all components (the scalar density carried by the texel).
    fn total(self) -> f32;
}

impl Texel for f32 {
    #[inline]
    fn accumulate(self, other: Self) -> Self {
        self + other
    }

    #[inline]
    fn total(self) -> f32 {
        self
    }
}

impl Texel for Rgba {
    #[inline]
    fn accumulate(self, o: Self) -> Self {
        [self[0] + o[0], self[1] + o[1], self[2] + o[2], self[3] + o[3]]
    }

    #[inline]
    fn total(self) -> f32 {
        self[0] + self[1] + self[2] + self[3]
    }
}

/// A 2D render target with runtime dimensions.
#[derive(Clone, PartialEq)]
pub struct Surface<T: Texel> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T: Texel> Surface<T> {
    /// Create a zero-initialized surface.
    pub fn new(width: usize, height: usize) -> Self {
        Surface {
            data: vec![T::default(); width * height],
            width,
            height,
        }
    }

    /// Wrap an existing texel vector.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "data length ({}) must equal width * height ({})",
            data.len(),
            width * height,
        );
        Surface { data, width, height }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Texel at column `x`, row `y`.
    ///
    /// # Panics
    /// Panics if (x, y) is out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self.bounds_check(x, y);
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        self.bounds_check(x, y);
        let idx = y * self.width + x;
        &mut self.data[idx]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        *self.get_mut(x, y) = value;
    }

    /// Reset every texel to zero (the clear-color of every target).
    pub fn clear(&mut self) {
        self.data.fill(T::default());
    }

    /// Borrow row `y`.
    #[inline]
    pub fn row(&self, y: usize) -> &[T] {
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        &self.data[y * self.width..(y + 1) * self.width]
    }

    /// Iterate over all texels as `(x, y, value)`.
    pub fn texels(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        (0..self.height)
            .flat_map(move |y| (0..self.width).map(move |x| (x, y, self.data[y * self.width + x])))
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Sum of `Texel::total` over the whole surface.
    pub fn total(&self) -> f32 {
        self.data.iter().map(|t| t.total()).sum()
    }

    #[inline]
    fn bounds_check(&self, x: usize, y: usize) {
        assert!(
            x < self.width && y < self.height,
            "texel ({x},{y}) out of bounds for surface {}×{}",
            self.width,
            self.height,
        );
    }
}

impl Surface<Rgba> {
    /// Set one channel of texel (x, y), leaving the other three untouched.
    /// This is what a color-write mask does on the GPU.
    #[inline]
    pub fn write_channel(&mut self, x: usize, y: usize, channel: usize, value: f32) {
        self.get_mut(x, y)[channel] = value;
    }
}

impl<T: Texel + fmt::Debug> fmt::Debug for Surface<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Surface<{}> {{ {}×{} }}",
            std::any::type_name::<T>(),
            self.width,
            self.height,
        )?;
        for y in 0..self.height.min(8) {
            write!(f, "  row {y}: [")?;
            for x in 0..self.width.min(8) {
                if x > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{:?}", self.get(x, y))?;
            }
            if self.width > 8 {
                write!(f, ", ...")?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zeroed() {
        let s = Surface::<Rgba>::new(3, 2);
        assert_eq!(s.width(), 3);
        assert_eq!(s.height(), 2);
        assert!(s.as_slice().iter().all(|t| *t == [0.0; 4]));
    }

    #[test]
    fn test_write_channel_masks_others() {
        let mut s = Surface::<Rgba>::new(2, 2);
        s.write_channel(1, 0, 2, 1.0);
        s.write_channel(1, 0, 0, 1.0);
        assert_eq!(s.get(1, 0), [1.0, 0.0, 1.0, 0.0]);
        assert_eq!(s.get(0, 0), [0.0; 4]);
    }

    #[test]
    fn test_total_and_clear() {
        let mut s = Surface::<Rgba>::new(2, 1);
        s.set(0, 0, [1.0, 2.0, 3.0, 4.0]);
        s.set(1, 0, [0.5, 0.0, 0.0, 0.0]);
        assert_eq!(s.total(), 10.5);
        s.clear();
        assert_eq!(s.total(), 0.0);
    }

    #[test]
    fn test_texels_row_major() {
        let s = Surface::<f32>::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]);
        let v: Vec<_> = s.texels().collect();
        assert_eq!(v, vec![(0, 0, 1.0), (1, 0, 2.0), (0, 1, 3.0), (1, 1, 4.0)]);
        assert_eq!(s.row(1), &[3.0, 4.0]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_get_out_of_bounds_panics() {
        let s = Surface::<f32>::new(2, 2);
        s.get(2, 0);
    }
}

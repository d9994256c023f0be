// smooth.rs — Tile-isolated 2D kernel smoothing (CPU reference).
//
// out(x, y) = Σ_{row,col} kernel[row][col] * in(x + c - col, y + row - c)
//
// (`GaussianKernel::taps` yields the source offsets `dx = c - col`,
// `dy = row - c`.)
//
// BORDER HANDLING: Zero, per tile.
// The repeated tiles of a render target hold unrelated series, so a
// neighbour contributes only if it lies in the same tile as (x, y):
//
//   same_tile  ⇔  (x + dx) / tile_w == x / tile_w
//              ∧  (y + dy) / tile_h == y / tile_h
//
// Neighbours outside the render target or in another tile read as zero.
// The image border of a single tile is therefore a zero border too, unlike
// the clamp border used for image pyramids.
//
// Rows are independent, so the pass runs one row per rayon task.

use rayon::prelude::*;

use crate::kernel::GaussianKernel;
use crate::surface::{Rgba, Surface};
use crate::tiling::TileLayout;

/// Smooth every tile of `src` independently with `kernel`.
///
/// # Panics
/// Panics if `src` is not `layout.target_width() × layout.target_height()`.
pub fn smooth_tiles(src: &Surface<Rgba>, kernel: &GaussianKernel, layout: &TileLayout) -> Surface<Rgba> {
    let w = src.width();
    let h = src.height();
    assert_eq!(
        (w, h),
        (layout.target_width() as usize, layout.target_height() as usize),
        "surface does not match the tile layout"
    );
    let tw = layout.tile_width as usize;
    let th = layout.tile_height as usize;
    let taps: Vec<(isize, isize, f32)> = kernel.taps().filter(|&(_, _, w)| w != 0.0).collect();

    let mut dst = Surface::<Rgba>::new(w, h);
    dst.as_mut_slice()
        .par_chunks_mut(w.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            let tile_y = y / th;
            for (x, out) in row.iter_mut().enumerate() {
                let tile_x = x / tw;
                let mut acc = [0.0f32; 4];
                for &(dx, dy, weight) in &taps {
                    let sx = x as isize + dx;
                    let sy = y as isize + dy;
                    if sx < 0 || sy < 0 || sx >= w as isize || sy >= h as isize {
                        continue;
                    }
                    let (sx, sy) = (sx as usize, sy as usize);
                    if sx / tw != tile_x || sy / th != tile_y {
                        continue;
                    }
                    let v = src.get(sx, sy);
                    for c in 0..4 {
                        acc[c] += weight * v[c];
                    }
                }
                *out = acc;
            }
        });
    dst
}

// reduce.rs — Column sums, normalization and tile merging (CPU reference).
//
// Per batch:
//
//   sums(x, r)     = max(Σ_{j<H} lines(x, r*H + j), 1)       per channel
//   accum(x, y)   += lines(x, y) / sums(x, y / H)            per channel
//
// where H is the tile height and r the tile row. `sums` has one texel row per
// tile row: it is `target_w × repeats_y`. The max(·, 1) clamp turns empty
// columns into 0 / 1 = 0 instead of NaN.
//
// Once, after the last batch:
//
//   horizontal(x, y) = Σ_{i<repeats_x} accum(i*W + x, y)      W × target_h
//   heatmap(x, y)    = Σ_{i<repeats_y} total(horizontal(x, i*H + y))   W × H
//
// `total` collapses the four channels (r + g + b + a) into one scalar.

use rayon::prelude::*;

use crate::surface::{Rgba, Surface, Texel};
use crate::tiling::TileLayout;

/// Per-column, per-tile-row channel sums of `lines`, clamped to at least 1.
pub fn column_sums(lines: &Surface<Rgba>, layout: &TileLayout) -> Surface<Rgba> {
    let w = lines.width();
    let th = layout.tile_height as usize;
    let ry = layout.repeats_y as usize;
    let mut sums = Surface::<Rgba>::new(w, ry);
    sums.as_mut_slice()
        .par_chunks_mut(w.max(1))
        .enumerate()
        .for_each(|(r, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let mut acc = [0.0f32; 4];
                for j in 0..th {
                    acc = acc.accumulate(lines.get(x, r * th + j));
                }
                *out = acc.map(|s| s.max(1.0));
            }
        });
    sums
}

/// `accum += lines / sums`, per channel. `accum` is never cleared here.
pub fn normalize_accumulate(
    accum: &mut Surface<Rgba>,
    lines: &Surface<Rgba>,
    sums: &Surface<Rgba>,
    layout: &TileLayout,
) {
    let w = accum.width();
    let th = layout.tile_height as usize;
    accum
        .as_mut_slice()
        .par_chunks_mut(w.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            let r = y / th;
            for (x, out) in row.iter_mut().enumerate() {
                let v = lines.get(x, y);
                let s = sums.get(x, r);
                let mut q = [0.0f32; 4];
                for c in 0..4 {
                    q[c] = v[c] / s[c];
                }
                *out = out.accumulate(q);
            }
        });
}

/// Sum the `repeats_x` tile columns into one tile-wide surface.
pub fn merge_horizontal(accum: &Surface<Rgba>, layout: &TileLayout) -> Surface<Rgba> {
    let tw = layout.tile_width as usize;
    let rx = layout.repeats_x as usize;
    let h = accum.height();
    let mut out = Surface::<Rgba>::new(tw, h);
    for y in 0..h {
        for x in 0..tw {
            let mut acc = [0.0f32; 4];
            for i in 0..rx {
                acc = acc.accumulate(accum.get(i * tw + x, y));
            }
            out.set(x, y, acc);
        }
    }
    out
}

/// Sum the `repeats_y` tile rows and collapse channels into the final
/// `tile_width × tile_height` heatmap.
pub fn merge_vertical(horizontal: &Surface<Rgba>, layout: &TileLayout) -> Surface<f32> {
    let tw = layout.tile_width as usize;
    let th = layout.tile_height as usize;
    let ry = layout.repeats_y as usize;
    let mut out = Surface::<f32>::new(tw, th);
    for y in 0..th {
        for x in 0..tw {
            let mut acc = 0.0f32;
            for i in 0..ry {
                acc += horizontal.get(x, i * th + y).total();
            }
            out.set(x, y, acc);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(tw: u32, th: u32, rx: u32, ry: u32) -> TileLayout {
        TileLayout { tile_width: tw, tile_height: th, repeats_x: rx, repeats_y: ry }
    }

    #[test]
    fn test_column_sums_per_tile_row() {
        let l = layout(2, 2, 1, 2);
        let mut lines = Surface::<Rgba>::new(2, 4);
        lines.set(0, 0, [1.0, 0.0, 0.0, 0.0]);
        lines.set(0, 1, [1.0, 1.0, 0.0, 0.0]);
        lines.set(1, 3, [0.0, 0.0, 3.0, 0.0]);
        let sums = column_sums(&lines, &l);
        assert_eq!((sums.width(), sums.height()), (2, 2));
        assert_eq!(sums.get(0, 0), [2.0, 1.0, 1.0, 1.0]);
        assert_eq!(sums.get(1, 0), [1.0; 4]);
        assert_eq!(sums.get(1, 1), [1.0, 1.0, 3.0, 1.0]);
    }

    #[test]
    fn test_normalize_accumulates_across_calls() {
        let l = layout(1, 2, 1, 1);
        let mut lines = Surface::<Rgba>::new(1, 2);
        lines.set(0, 0, [1.0, 0.0, 0.0, 0.0]);
        lines.set(0, 1, [1.0, 0.0, 0.0, 0.0]);
        let sums = column_sums(&lines, &l);
        let mut accum = Surface::<Rgba>::new(1, 2);
        normalize_accumulate(&mut accum, &lines, &sums, &l);
        assert_eq!(accum.get(0, 0), [0.5, 0.0, 0.0, 0.0]);
        normalize_accumulate(&mut accum, &lines, &sums, &l);
        assert_eq!(accum.get(0, 1), [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_column_stays_zero() {
        let l = layout(2, 2, 1, 1);
        let lines = Surface::<Rgba>::new(2, 2);
        let sums = column_sums(&lines, &l);
        let mut accum = Surface::<Rgba>::new(2, 2);
        normalize_accumulate(&mut accum, &lines, &sums, &l);
        assert!(accum.as_slice().iter().all(|t| t.iter().all(|v| *v == 0.0)));
    }

    #[test]
    fn test_merges_collapse_tiles_and_channels() {
        let l = layout(2, 1, 2, 2);
        let mut accum = Surface::<Rgba>::new(4, 2);
        accum.set(0, 0, [1.0, 0.0, 0.0, 0.0]);
        accum.set(2, 0, [0.0, 1.0, 0.0, 0.0]);
        accum.set(2, 1, [0.0, 0.0, 0.5, 0.5]);
        accum.set(3, 1, [0.25, 0.0, 0.0, 0.0]);
        let h = merge_horizontal(&accum, &l);
        assert_eq!((h.width(), h.height()), (2, 2));
        assert_eq!(h.get(0, 0), [1.0, 1.0, 0.0, 0.0]);
        assert_eq!(h.get(0, 1), [0.0, 0.0, 0.5, 0.5]);
        let v = merge_vertical(&h, &l);
        assert_eq!((v.width(), v.height()), (2, 1));
        assert_eq!(v.get(0, 0), 3.0);
        assert_eq!(v.get(1, 0), 0.25);
        assert_eq!(v.total(), accum.total());
    }
}

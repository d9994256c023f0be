// raster.rs — Line rasterization (CPU reference).
//
// Each series is drawn as ONE triangle strip. Every sample contributes two
// vertices, pushed to either side of the polyline along the normal of the
// tangent to the next sample:
//
//        v0 ─────────── v2 ─────────── v4          v(2j)   = p_j + n_j * h
//        │  p0 ───────── p1 ───────── p2  │          v(2j+1) = p_j - n_j * h
//        v1 ─────────── v3 ─────────── v5
//
// Consecutive vertex triples (v0,v1,v2), (v1,v2,v3), ... form the strip.
// The first and last sample are additionally pushed outward along the
// tangent by `tangent_extent` (end caps).
//
// This is exactly what the GPU vertex stage computes (shaders/lines.wgsl);
// `stroke_vertices` is the shared definition both backends are tested
// against.
//
// COVERAGE RULE
// ─────────────
// A texel is covered when its centre (x + 0.5, y + 0.5) lies inside a
// triangle. Centres exactly on an edge are covered only for top and left
// edges — the fill convention of D3D/Vulkan/Metal rasterizers, so that
// texels on a shared edge are not double counted and results match the GPU.
//
// Output is binary presence: covered texels get 1.0 in the series' channel.
// Overlapping triangles of the same series overwrite, never add.
//
// COORDINATES
// ───────────
// Tile-local texel space, x to the right, y downward (row index). A sample
// (t, v) maps to ((t - x.start) / x.step, (v - y.start) / y.step): both axes
// in bin units. The stroke is clipped to the tile rectangle, so a series
// never leaks into a neighbouring tile.

use crate::bins::BinConfig;
use crate::error::{HeatmapError, Result};
use crate::surface::{Rgba, Surface};
use crate::tiling::{TileLayout, TileRect};

/// Stroke thickness parameters, in texels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    /// Distance from the polyline to each stroke edge.
    pub half_width: f32,
    /// End-cap extension along the tangent.
    pub tangent_extent: f32,
}

impl StrokeStyle {
    /// `half_width = 0.5 * line_width + normal_extent`.
    ///
    /// # Errors
    /// `InvalidConfig` if any input is non-finite or the resulting stroke
    /// has no thickness.
    pub fn new(line_width: f32, tangent_extent: f32, normal_extent: f32) -> Result<Self> {
        if !(line_width.is_finite() && tangent_extent.is_finite() && normal_extent.is_finite()) {
            return Err(HeatmapError::InvalidConfig(
                "line width and extents must be finite".into(),
            ));
        }
        let half_width = 0.5 * line_width + normal_extent;
        if half_width <= 0.0 {
            return Err(HeatmapError::InvalidConfig(format!(
                "stroke half-width must be positive (line_width={line_width}, normal_extent={normal_extent})"
            )));
        }
        Ok(StrokeStyle { half_width, tangent_extent })
    }
}

impl Default for StrokeStyle {
    fn default() -> Self {
        StrokeStyle { half_width: 0.5, tangent_extent: 0.0 }
    }
}

/// Maps (sample index, value) to tile-local texel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisMapping {
    pub x_start: f32,
    pub x_step: f32,
    pub y_start: f32,
    pub y_step: f32,
}

impl AxisMapping {
    pub fn new(bin_x: &BinConfig, bin_y: &BinConfig) -> Self {
        AxisMapping {
            x_start: bin_x.start,
            x_step: bin_x.step,
            y_start: bin_y.start,
            y_step: bin_y.step,
        }
    }

    /// Tile-local position of sample `index` with value `value`.
    #[inline]
    pub fn position(&self, index: usize, value: f32) -> [f32; 2] {
        [
            (index as f32 - self.x_start) / self.x_step,
            (value - self.y_start) / self.y_step,
        ]
    }
}

/// Strip vertices for one series: `2 * values.len()` positions, or none
/// when the series has fewer than two samples.
pub fn stroke_vertices(values: &[f32], map: &AxisMapping, style: &StrokeStyle) -> Vec<[f32; 2]> {
    let n = values.len();
    if n < 2 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(2 * n);
    for j in 0..n {
        let p = map.position(j, values[j]);
        let d = if j + 1 < n {
            sub(map.position(j + 1, values[j + 1]), p)
        } else {
            sub(p, map.position(j - 1, values[j - 1]))
        };
        let len = (d[0] * d[0] + d[1] * d[1]).sqrt();
        let tangent = if len > 0.0 && len.is_finite() {
            [d[0] / len, d[1] / len]
        } else {
            [1.0, 0.0]
        };
        let normal = [-tangent[1], tangent[0]];
        let cap = if j == 0 {
            -1.0
        } else if j == n - 1 {
            1.0
        } else {
            0.0
        };
        let along = style.tangent_extent * cap;
        for side in [1.0f32, -1.0] {
            let across = style.half_width * side;
            out.push([
                p[0] + normal[0] * across + tangent[0] * along,
                p[1] + normal[1] * across + tangent[1] * along,
            ]);
        }
    }
    out
}

/// Rasterize a triangle strip into a `width × height` texel grid, calling
/// `plot(x, y)` for every covered texel (texels covered by several
/// triangles are reported more than once).
pub fn rasterize_strip(
    vertices: &[[f32; 2]],
    width: u32,
    height: u32,
    mut plot: impl FnMut(u32, u32),
) {
    for tri in vertices.windows(3) {
        rasterize_triangle(tri[0], tri[1], tri[2], width, height, &mut plot);
    }
}

/// Rasterize one triangle with the top-left fill rule.
pub fn rasterize_triangle(
    a: [f32; 2],
    b: [f32; 2],
    c: [f32; 2],
    width: u32,
    height: u32,
    plot: &mut impl FnMut(u32, u32),
) {
    if width == 0 || height == 0 {
        return;
    }
    let area = edge(a, b, c);
    if area == 0.0 || !area.is_finite() {
        return;
    }
    // Orient so interior points have positive edge functions.
    let (b, c) = if area < 0.0 { (c, b) } else { (b, c) };

    let min_x = a[0].min(b[0]).min(c[0]);
    let max_x = a[0].max(b[0]).max(c[0]);
    let min_y = a[1].min(b[1]).min(c[1]);
    let max_y = a[1].max(b[1]).max(c[1]);

    // Texel x is a candidate when its centre x + 0.5 lies in [min_x, max_x].
    let x_lo = clamp_index((min_x - 0.5).ceil(), width);
    let x_hi = clamp_index((max_x - 0.5).floor(), width);
    let y_lo = clamp_index((min_y - 0.5).ceil(), height);
    let y_hi = clamp_index((max_y - 0.5).floor(), height);
    let (Some(x_lo), Some(x_hi), Some(y_lo), Some(y_hi)) = (x_lo, x_hi, y_lo, y_hi) else {
        return;
    };

    for y in y_lo..=y_hi {
        for x in x_lo..=x_hi {
            let p = [x as f32 + 0.5, y as f32 + 0.5];
            if covers(edge(b, c, p), b, c) && covers(edge(c, a, p), c, a) && covers(edge(a, b, p), a, b)
            {
                plot(x, y);
            }
        }
    }
}

/// Draw one series into channel `channel` of tile `rect` of `target`.
pub fn rasterize_series(
    target: &mut Surface<Rgba>,
    rect: TileRect,
    channel: usize,
    values: &[f32],
    map: &AxisMapping,
    style: &StrokeStyle,
) {
    let vertices = stroke_vertices(values, map, style);
    rasterize_strip(&vertices, rect.width, rect.height, |x, y| {
        target.write_channel((rect.x0 + x) as usize, (rect.y0 + y) as usize, channel, 1.0);
    });
}

/// Clear `target` and draw a whole batch. `batch` holds the batch's series
/// back to back (`num_points` samples each); series `i` goes to slot `i`.
pub fn rasterize_batch(
    target: &mut Surface<Rgba>,
    layout: &TileLayout,
    batch: &[f32],
    num_points: usize,
    map: &AxisMapping,
    style: &StrokeStyle,
) {
    target.clear();
    if num_points == 0 {
        return;
    }
    for (i, values) in batch.chunks_exact(num_points).enumerate() {
        let slot = layout.slot(i);
        let rect = layout.tile_rect(slot.column, slot.row);
        rasterize_series(target, rect, slot.channel as usize, values, map, style);
    }
}

#[inline]
fn sub(a: [f32; 2], b: [f32; 2]) -> [f32; 2] {
    [a[0] - b[0], a[1] - b[1]]
}

/// Twice the signed area of (a, b, p); positive when p is on the interior
/// side of a→b for a positively oriented triangle (y down).
#[inline]
fn edge(a: [f32; 2], b: [f32; 2], p: [f32; 2]) -> f32 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

#[inline]
fn covers(w: f32, from: [f32; 2], to: [f32; 2]) -> bool {
    w > 0.0 || (w == 0.0 && is_top_left(from, to))
}

/// Top edge: horizontal, interior below it. Left edge: runs upward.
#[inline]
fn is_top_left(from: [f32; 2], to: [f32; 2]) -> bool {
    let dx = to[0] - from[0];
    let dy = to[1] - from[1];
    (dy == 0.0 && dx > 0.0) || dy < 0.0
}

/// Clamp a texel coordinate to `[0, limit)`; `None` when the range lies
/// entirely outside.
fn clamp_index(v: f32, limit: u32) -> Option<u32> {
    if v.is_nan() {
        return None;
    }
    Some(v.clamp(0.0, (limit - 1) as f32) as u32)
}

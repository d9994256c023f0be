// demos/density_png.rs — Render a density heatmap of synthetic random walks
// to a grayscale PNG.
//
// Higher value bins are drawn at the top; brightness is the cell value
// divided by the column maximum, gamma-corrected.
//
// USAGE
// ─────
//   cargo run --example density_png                        # 2000 walks → density.png
//   cargo run --example density_png -- out.png 5000 800    # 5000 walks, 800 samples
//   cargo run --example density_png -- out.png 5000 800 options.json
//   DENSITY_BACKEND=cpu cargo run --example density_png    # software backend
//
// options.json holds `HeatmapOptions` fields, e.g.
//   { "gaussian_kernel": [[0.0625, 0.125, 0.0625], [0.125, 0.25, 0.125], [0.0625, 0.125, 0.0625]],
//     "line_width": 1.5 }
//
// Logging follows RUST_LOG (default `info`).

#[path = "../tests/common/mod.rs"]
mod common;

use series_density::{BinConfig, HeatmapCell, HeatmapOptions, Pipeline, SeriesMatrix};
use tracing::info;
use tracing_subscriber::EnvFilter;

const HEIGHT_BINS: f32 = 256.0;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // --- Parse arguments ---
    let args: Vec<String> = std::env::args().collect();
    let out_path = args.get(1).cloned().unwrap_or_else(|| "density.png".into());
    let num_series: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(2000);
    let num_points: usize = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(512);
    let options = match args.get(4) {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .unwrap_or_else(|e| panic!("failed to read options {path}: {e}"));
            HeatmapOptions::from_json(&json).unwrap_or_else(|e| panic!("{e}"))
        }
        None => HeatmapOptions::default(),
    };

    // --- Synthesize input ---
    let series = random_walks(num_series, num_points);
    // Sample j sits on time coordinate j; the last sample closes the last bin.
    let bin_x = BinConfig::new(0.0, num_points.saturating_sub(1) as f32, 1.0);
    let bin_y = BinConfig::new(0.0, HEIGHT_BINS, 1.0);
    info!(num_series, num_points, "generated random walks");

    // --- Compute ---
    let use_cpu = std::env::var("DENSITY_BACKEND").is_ok_and(|b| b == "cpu");
    let cells = if use_cpu {
        Pipeline::cpu().compute(&series, &bin_x, &bin_y, &options)
    } else {
        Pipeline::gpu().and_then(|mut p| p.compute(&series, &bin_x, &bin_y, &options))
    }
    .unwrap_or_else(|e| panic!("heatmap failed: {e}"));

    // --- Write PNG ---
    let (w, h) = (bin_x.count(), bin_y.count());
    let img = to_image(&cells, w, h);
    img.save(&out_path).unwrap_or_else(|e| panic!("failed to write {out_path}: {e}"));
    info!(path = %out_path, width = w, height = h, "wrote heatmap");
}

/// Cells are time-bin outer, value-bin inner.
fn to_image(cells: &[HeatmapCell], width: u32, height: u32) -> image::GrayImage {
    let mut img = image::GrayImage::new(width, height);
    for (x, column) in cells.chunks(height as usize).enumerate() {
        let max = column.iter().map(|c| c.value).fold(0.0f32, f32::max);
        if max <= 0.0 {
            continue;
        }
        for (y, cell) in column.iter().enumerate() {
            let v = (cell.value / max).powf(1.0 / 2.2);
            let row = height - 1 - y as u32;
            img.put_pixel(x as u32, row, image::Luma([(v * 255.0).round() as u8]));
        }
    }
    img
}

/// Seeded random walks spanning the value range.
fn random_walks(count: usize, len: usize) -> SeriesMatrix {
    let rows = common::random_walks(count, len, HEIGHT_BINS, 1.5, 0x853c_49e6_748f_ea9b);
    SeriesMatrix::from_rows(rows).unwrap_or_else(|e| panic!("{e}"))
}

// demos/gpu_vs_cpu.rs — Run one input through both backends and report the
// largest per-cell deviation plus wall time of each.
//
// USAGE
// ─────
//   cargo run --release --example gpu_vs_cpu                 # 500 walks, 256 samples
//   cargo run --release --example gpu_vs_cpu -- 4000 1024    # 4000 walks, 1024 samples
//   cargo run --release --example gpu_vs_cpu -- 4000 1024 512
//                                                            # cap render targets at 512
//
// Both runs use a 5×5 Gaussian (sigma 1) so every pass is exercised.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use series_density::gpu::GpuBackend;
use series_density::{BinConfig, GaussianKernel, HeatmapOptions, Pipeline, SeriesMatrix};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let num_series: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(500);
    let num_points: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(256);
    let cap: Option<u32> = args.get(3).and_then(|s| s.parse().ok());

    let series = sine_bundle(num_series, num_points);
    let bin_x = BinConfig::new(0.0, num_points.saturating_sub(1) as f32, 1.0);
    let bin_y = BinConfig::new(-1.5, 1.5, 3.0 / 128.0);
    let mut options = HeatmapOptions::default().with_kernel(&GaussianKernel::gaussian(2, 1.0).unwrap());
    options.max_render_target_size = cap;

    eprintln!("[gpu_vs_cpu] {num_series} series × {num_points} samples, cap {cap:?}");

    let gpu_backend = GpuBackend::new().unwrap_or_else(|e| panic!("GPU init failed: {e}"));
    eprintln!("[gpu_vs_cpu] {}", gpu_backend.device());
    let mut gpu = Pipeline::new(gpu_backend);
    let mut cpu = Pipeline::cpu();

    let t = Instant::now();
    let cpu_cells = cpu.compute(&series, &bin_x, &bin_y, &options).unwrap_or_else(|e| panic!("{e}"));
    let cpu_ms = t.elapsed().as_secs_f64() * 1e3;

    let t = Instant::now();
    let gpu_cells = gpu.compute(&series, &bin_x, &bin_y, &options).unwrap_or_else(|e| panic!("{e}"));
    let gpu_ms = t.elapsed().as_secs_f64() * 1e3;

    let (mut max_err, mut worst) = (0.0f32, (0.0f32, 0.0f32));
    for (g, c) in gpu_cells.iter().zip(&cpu_cells) {
        let err = (g.value - c.value).abs();
        if err > max_err {
            max_err = err;
            worst = (c.x, c.y);
        }
    }

    eprintln!("[gpu_vs_cpu] cells:   {}", cpu_cells.len());
    eprintln!("[gpu_vs_cpu] cpu:     {cpu_ms:.1} ms");
    eprintln!("[gpu_vs_cpu] gpu:     {gpu_ms:.1} ms");
    eprintln!("[gpu_vs_cpu] max err: {max_err:.2e} at ({}, {})", worst.0, worst.1);
}

/// Noisy sines with random phase and amplitude in [0.5, 1].
fn sine_bundle(count: usize, len: usize) -> SeriesMatrix {
    let mut rng = StdRng::seed_from_u64(0x2545_f491_4f6c_dd1d);
    let rows = (0..count)
        .map(|_| {
            let phase = rng.random_range(0.0..std::f32::consts::TAU);
            let amp = rng.random_range(0.5..=1.0);
            (0..len)
                .map(|j| amp * (j as f32 * 0.05 + phase).sin() + rng.random_range(-0.05..0.05))
                .collect()
        })
        .collect();
    SeriesMatrix::from_rows(rows).unwrap_or_else(|e| panic!("{e}"))
}

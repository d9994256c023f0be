// benches/gpu_benchmarks.rs — GPU pipeline benchmarks.
//
// Each benchmark runs the same input through the CPU and GPU backends in
// one group for direct comparison.
//
//   cargo bench --bench gpu_benchmarks
//
//
// CRITERION + GPU CAVEATS
// ────────────────────────
// Criterion measures wall time including CPU overhead (target allocation,
// shader compilation in `configure`, sample upload, submit, poll). Targets
// and programs are rebuilt on every `compute`, so this is the end-to-end
// cost a caller sees. The first iterations also pay driver pipeline-cache
// misses; warm-up is set explicitly.

#[path = "../tests/common/mod.rs"]
mod common;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

use series_density::gpu::GpuBackend;
use series_density::{BinConfig, GaussianKernel, HeatmapOptions, Pipeline, SeriesMatrix};

// ============================================================
// Shared helpers
// ============================================================

/// `count` random walks of `len` samples inside `[0, hi)`.
fn make_walks(count: usize, len: usize, hi: f32) -> SeriesMatrix {
    SeriesMatrix::from_rows(common::random_walks(count, len, hi, 0.5, 0x9e37_79b9_7f4a_7c15)).unwrap()
}

// ============================================================
// Pipeline: CPU vs GPU, varying series count
// ============================================================

fn bench_pipeline(c: &mut Criterion) {
    let bx = BinConfig::new(0.0, 512.0, 1.0);
    let by = BinConfig::new(0.0, 256.0, 1.0);
    let opts = HeatmapOptions::default().with_kernel(&GaussianKernel::gaussian(2, 1.0).unwrap());

    let mut cpu = Pipeline::cpu();
    let mut gpu = Pipeline::new(GpuBackend::new().expect("no suitable GPU adapter"));

    let mut group = c.benchmark_group("pipeline");
    group.warm_up_time(Duration::from_secs(2));
    group.sample_size(10);

    for count in [64usize, 1024, 8192] {
        let series = make_walks(count, 512, 256.0);
        if count <= 1024 {
            group.bench_with_input(BenchmarkId::new("cpu", count), &series, |b, s| {
                b.iter(|| cpu.compute(s, &bx, &by, &opts).unwrap())
            });
        }
        group.bench_with_input(BenchmarkId::new("gpu", count), &series, |b, s| {
            b.iter(|| gpu.compute(s, &bx, &by, &opts).unwrap())
        });
    }

    group.finish();
}

// ============================================================
// Batching: same input, shrinking render-target cap
// ============================================================

fn bench_batching(c: &mut Criterion) {
    let bx = BinConfig::new(0.0, 256.0, 1.0);
    let by = BinConfig::new(0.0, 128.0, 1.0);
    let series = make_walks(2048, 256, 128.0);
    let mut gpu = Pipeline::new(GpuBackend::new().expect("no suitable GPU adapter"));

    let mut group = c.benchmark_group("batching_gpu");
    group.warm_up_time(Duration::from_secs(2));
    group.sample_size(10);

    for cap in [4096u32, 1024, 256] {
        let opts = HeatmapOptions::default().with_max_render_target_size(cap);
        group.bench_with_input(BenchmarkId::from_parameter(cap), &opts, |b, o| {
            b.iter(|| gpu.compute(&series, &bx, &by, o).unwrap())
        });
    }

    group.finish();
}

// ============================================================
// Register
// ============================================================

criterion_group!(benches, bench_pipeline, bench_batching);
criterion_main!(benches);

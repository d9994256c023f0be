// tests/test_pipeline.rs — End-to-end properties on the CPU backend.

use proptest::prelude::*;

use series_density::result::nonzero;
use series_density::{
    BinConfig, ColumnScale, CpuBackend, GaussianKernel, HeatmapCell, HeatmapError, HeatmapOptions,
    Pipeline, SeriesMatrix, Surface,
};

mod common;

/// Seeded random walks clamped to `[0, hi)`, one unit step at most.
fn random_walks(count: usize, len: usize, hi: f32, seed: u64) -> SeriesMatrix {
    SeriesMatrix::from_rows(common::random_walks(count, len, hi, 1.0, seed)).unwrap()
}

/// Straight lines `v = base + 0.5 * k + slope * j`, one per `k`. A straight
/// stroke crosses every pixel-centre column between its end samples.
fn straight_lines(count: usize, len: usize, base: f32, slope: f32) -> SeriesMatrix {
    let rows = (0..count)
        .map(|k| (0..len).map(|j| base + 0.5 * k as f32 + slope * j as f32).collect())
        .collect();
    SeriesMatrix::from_rows(rows).unwrap()
}

fn column_totals(cells: &[HeatmapCell]) -> Vec<(f32, f32)> {
    let mut totals: Vec<(f32, f32)> = Vec::new();
    for c in cells {
        match totals.last_mut() {
            Some((x, sum)) if *x == c.x => *sum += c.value,
            _ => totals.push((c.x, c.value)),
        }
    }
    totals
}

fn assert_cells_close(a: &[HeatmapCell], b: &[HeatmapCell], tol: f32) {
    assert_eq!(a.len(), b.len());
    for (p, q) in a.iter().zip(b) {
        assert_eq!((p.x, p.y), (q.x, q.y));
        assert!(
            (p.value - q.value).abs() <= tol,
            "cell ({}, {}): {} vs {}",
            p.x,
            p.y,
            p.value,
            q.value
        );
    }
}

// ===== Result shape =====

#[test]
fn result_has_one_cell_per_bin() {
    let series = random_walks(10, 30, 20.0, 1);
    let bx = BinConfig::new(0.0, 30.0, 1.0);
    let by = BinConfig::new(0.0, 20.0, 2.5);
    let cells = Pipeline::cpu().compute(&series, &bx, &by, &HeatmapOptions::default()).unwrap();
    assert_eq!(cells.len(), 30 * 8);
    assert_eq!((cells[0].x, cells[0].y), (0.0, 0.0));
    assert_eq!((cells[1].x, cells[1].y), (0.0, 2.5));
    assert_eq!(cells[8].x, 1.0);
}

#[test]
fn fractional_bin_count_is_floored() {
    let series = random_walks(3, 10, 5.0, 2);
    let bx = BinConfig::new(0.0, 10.5, 1.0);
    let by = BinConfig::new(0.0, 5.0, 2.0);
    let cells = Pipeline::cpu().compute(&series, &bx, &by, &HeatmapOptions::default()).unwrap();
    assert_eq!(cells.len(), 10 * 2);
}

// ===== Normalization =====

#[test]
fn crossed_columns_sum_to_one() {
    let series = random_walks(57, 40, 32.0, 3);
    let bx = BinConfig::new(0.0, 40.0, 1.0);
    let by = BinConfig::new(0.0, 32.0, 1.0);
    let cells = Pipeline::cpu().compute(&series, &bx, &by, &HeatmapOptions::default()).unwrap();

    // The last sample sits on x = 39; no stroke reaches column 39's centre.
    for (x, total) in column_totals(&cells) {
        if x < 39.0 {
            assert!((total - 1.0).abs() < 1e-4, "column {x} sums to {total}");
        } else {
            assert_eq!(total, 0.0);
        }
    }
}

#[test]
fn time_bins_ending_on_the_last_sample_are_all_crossed() {
    let series = random_walks(57, 40, 32.0, 3);
    let bx = BinConfig::new(0.0, 39.0, 1.0);
    let by = BinConfig::new(0.0, 32.0, 1.0);
    let cells = Pipeline::cpu().compute(&series, &bx, &by, &HeatmapOptions::default()).unwrap();

    let totals = column_totals(&cells);
    assert_eq!(totals.len(), 39);
    for (x, total) in totals {
        assert!((total - 1.0).abs() < 1e-4, "column {x} sums to {total}");
    }
}

#[test]
fn decimal_bin_steps_do_not_gain_a_cell() {
    let series = straight_lines(3, 11, 0.05, 0.05);
    let bx = BinConfig::new(0.0, 10.0, 1.0);
    let by = BinConfig::new(0.0, 0.7, 0.1);
    let cells = Pipeline::cpu().compute(&series, &bx, &by, &HeatmapOptions::default()).unwrap();
    assert_eq!(by.count(), 6);
    assert_eq!(cells.len(), 10 * 6);
}

#[test]
fn series_count_scale_reports_crossings() {
    let series = straight_lines(12, 20, 2.3, 0.15);
    let bx = BinConfig::new(0.0, 20.0, 1.0);
    let by = BinConfig::new(0.0, 16.0, 1.0);
    let opts = HeatmapOptions { column_scale: ColumnScale::SeriesCount, ..Default::default() };
    let cells = Pipeline::cpu().compute(&series, &bx, &by, &opts).unwrap();
    for (x, total) in column_totals(&cells) {
        if x < 19.0 {
            assert!((total - 12.0).abs() < 1e-3, "column {x} sums to {total}");
        } else {
            assert_eq!(total, 0.0);
        }
    }
}

// ===== Determinism and batching =====

#[test]
fn repeated_runs_are_identical() {
    let series = random_walks(20, 25, 10.0, 5);
    let bx = BinConfig::new(0.0, 25.0, 1.0);
    let by = BinConfig::new(0.0, 10.0, 0.5);
    let opts = HeatmapOptions::default().with_kernel(&GaussianKernel::gaussian(1, 0.8).unwrap());
    let mut pipeline = Pipeline::cpu();
    let a = pipeline.compute(&series, &bx, &by, &opts).unwrap();
    let b = pipeline.compute(&series, &bx, &by, &opts).unwrap();
    assert_eq!(a, b);
}

#[test]
fn batching_does_not_change_the_result() {
    let series = random_walks(45, 16, 8.0, 6);
    let bx = BinConfig::new(0.0, 16.0, 1.0);
    let by = BinConfig::new(0.0, 8.0, 1.0);
    let opts = HeatmapOptions::default().with_kernel(&GaussianKernel::gaussian(1, 1.0).unwrap());

    let single = Pipeline::cpu().compute(&series, &bx, &by, &opts).unwrap();
    // One tile column, two tile rows: 8 series per batch, 6 batches.
    let batched = Pipeline::cpu()
        .compute(&series, &bx, &by, &opts.clone().with_max_render_target_size(16))
        .unwrap();
    assert_cells_close(&single, &batched, 1e-5);

    // Same, through the backend's own limit.
    let limited = Pipeline::new(CpuBackend::with_max_render_target_size(16))
        .compute(&series, &bx, &by, &opts)
        .unwrap();
    assert_cells_close(&single, &limited, 1e-5);
}

// ===== Smoothing =====

#[test]
fn unit_kernel_reproduces_unsmoothed_result() {
    let series = random_walks(9, 20, 12.0, 7);
    let bx = BinConfig::new(0.0, 20.0, 1.0);
    let by = BinConfig::new(0.0, 12.0, 1.0);
    let plain = Pipeline::cpu().compute(&series, &bx, &by, &HeatmapOptions::default()).unwrap();
    let opts = HeatmapOptions { gaussian_kernel: Some(vec![vec![1.0]]), ..Default::default() };
    let smoothed = Pipeline::cpu().compute(&series, &bx, &by, &opts).unwrap();
    assert_eq!(plain, smoothed);
}

#[test]
fn smoothing_spreads_density() {
    let series = SeriesMatrix::from_rows(vec![vec![8.5; 16]]).unwrap();
    let bx = BinConfig::new(0.0, 16.0, 1.0);
    let by = BinConfig::new(0.0, 16.0, 1.0);
    let plain = Pipeline::cpu().compute(&series, &bx, &by, &HeatmapOptions::default()).unwrap();
    let opts = HeatmapOptions::default().with_kernel(&GaussianKernel::gaussian(2, 1.0).unwrap());
    let smoothed = Pipeline::cpu().compute(&series, &bx, &by, &opts).unwrap();
    assert!(nonzero(&smoothed).count() > nonzero(&plain).count());
    for (_, total) in column_totals(&smoothed).into_iter().take(15) {
        assert!((total - 1.0).abs() < 1e-4);
    }
}

// ===== Validation =====

#[test]
fn non_square_kernel_rejected() {
    let series = random_walks(2, 4, 4.0, 8);
    let bins = BinConfig::new(0.0, 4.0, 1.0);
    let opts = HeatmapOptions {
        gaussian_kernel: Some(vec![vec![0.1, 0.2, 0.1], vec![0.2, 0.4, 0.2]]),
        ..Default::default()
    };
    let err = Pipeline::cpu().compute(&series, &bins, &bins, &opts).unwrap_err();
    assert!(matches!(err, HeatmapError::InvalidKernel(_)), "{err}");
}

#[test]
fn even_kernel_rejected() {
    let series = random_walks(2, 4, 4.0, 9);
    let bins = BinConfig::new(0.0, 4.0, 1.0);
    let opts = HeatmapOptions {
        gaussian_kernel: Some(vec![vec![0.25, 0.25], vec![0.25, 0.25]]),
        ..Default::default()
    };
    let err = Pipeline::cpu().compute(&series, &bins, &bins, &opts).unwrap_err();
    assert!(matches!(err, HeatmapError::InvalidKernel(_)), "{err}");
}

#[test]
fn degenerate_bins_rejected() {
    let series = random_walks(2, 4, 4.0, 10);
    let good = BinConfig::new(0.0, 4.0, 1.0);
    for bad in [BinConfig::new(0.0, 4.0, 0.0), BinConfig::new(4.0, 0.0, 1.0), BinConfig::new(0.0, 0.5, 1.0)] {
        let err = Pipeline::cpu().compute(&series, &bad, &good, &HeatmapOptions::default()).unwrap_err();
        assert!(err.is_config_error(), "{err}");
        let err = Pipeline::cpu().compute(&series, &good, &bad, &HeatmapOptions::default()).unwrap_err();
        assert!(err.is_config_error(), "{err}");
    }
}

#[test]
fn options_from_json() {
    let opts = HeatmapOptions::from_json(
        r#"{ "gaussian_kernel": [[0, 0.125, 0], [0.125, 0.5, 0.125], [0, 0.125, 0]],
             "line_width": 2.0, "column_scale": "series_count" }"#,
    )
    .unwrap();
    assert_eq!(opts.line_width, 2.0);
    assert_eq!(opts.column_scale, ColumnScale::SeriesCount);
    assert_eq!(opts.kernel().unwrap().unwrap().size(), 3);
    assert!(HeatmapOptions::from_json("{ \"line_width\": \"wide\" }").is_err());
}

// ===== Boundary =====

#[test]
fn diagonal_pair_lights_two_half_cells() {
    let series = SeriesMatrix::from_rows(vec![vec![0.0, 2.0]]).unwrap();
    let bins = BinConfig::new(0.0, 2.0, 1.0);
    let cells = Pipeline::cpu().compute(&series, &bins, &bins, &HeatmapOptions::default()).unwrap();
    assert_eq!(cells.len(), 4);

    let lit: Vec<_> = nonzero(&cells).collect();
    assert_eq!(lit.len(), 2, "{cells:?}");
    for c in &lit {
        assert_eq!(c.x, 0.0);
        assert!((c.value - 0.5).abs() < 1e-6);
    }
    assert_eq!((lit[0].y, lit[1].y), (0.0, 1.0));
}

#[test]
fn single_sample_series_draw_nothing() {
    let series = SeriesMatrix::from_rows(vec![vec![1.0], vec![2.0]]).unwrap();
    let bins = BinConfig::new(0.0, 4.0, 1.0);
    let cells = Pipeline::cpu().compute(&series, &bins, &bins, &HeatmapOptions::default()).unwrap();
    assert_eq!(cells.len(), 16);
    assert_eq!(nonzero(&cells).count(), 0);
}

#[test]
fn values_outside_the_grid_are_clipped() {
    let series = SeriesMatrix::from_rows(vec![vec![-50.0; 8], vec![50.0; 8]]).unwrap();
    let bins = BinConfig::new(0.0, 8.0, 1.0);
    let cells = Pipeline::cpu().compute(&series, &bins, &bins, &HeatmapOptions::default()).unwrap();
    assert_eq!(nonzero(&cells).count(), 0);
}

// ===== Debug surface =====

#[test]
fn debug_surface_holds_accumulation() {
    let series = straight_lines(6, 12, 1.0, 0.1);
    let bx = BinConfig::new(0.0, 12.0, 1.0);
    let by = BinConfig::new(0.0, 6.0, 1.0);
    let opts = HeatmapOptions::default();

    let mut debug = Surface::new(0, 0);
    let cells = Pipeline::cpu().compute_with_debug(&series, &bx, &by, &opts, &mut debug).unwrap();
    let plain = Pipeline::cpu().compute(&series, &bx, &by, &opts).unwrap();
    assert_eq!(cells, plain);

    // 6 series → two tiles side by side.
    assert_eq!((debug.width(), debug.height()), (24, 6));
    // Each series contributes one unit per crossed column (11 of 12).
    assert!((debug.total() - 6.0 * 11.0).abs() < 1e-3, "total {}", debug.total());
}

// ===== Properties =====

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_result_length_matches_bins(
        start in -10i32..10,
        width in 1u32..40,
        height in 1u32..40,
        step in prop::sample::select(vec![0.25f32, 0.5, 1.0, 2.0]),
    ) {
        let start = start as f32;
        let bx = BinConfig::new(start, start + width as f32 * step, step);
        let by = BinConfig::new(0.0, height as f32, 1.0);
        let series = random_walks(3, 8, height as f32, width as u64);
        let cells = Pipeline::cpu().compute(&series, &bx, &by, &HeatmapOptions::default()).unwrap();
        prop_assert_eq!(cells.len(), bx.count() as usize * by.count() as usize);
    }

    #[test]
    fn prop_columns_normalized(
        count in 1usize..30,
        len in 2usize..24,
        seed in any::<u64>(),
    ) {
        let series = random_walks(count, len, 16.0, seed);
        let bx = BinConfig::new(0.0, len as f32, 1.0);
        let by = BinConfig::new(0.0, 16.0, 1.0);
        let cells = Pipeline::cpu().compute(&series, &bx, &by, &HeatmapOptions::default()).unwrap();
        for (_, total) in column_totals(&cells) {
            prop_assert!(total == 0.0 || (total - 1.0).abs() < 1e-4);
        }
    }
}

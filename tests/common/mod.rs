// tests/common/mod.rs — Seeded synthetic series for tests, benches and demos.
//
// Pulled in with `mod common;` from integration tests and with
// `#[path = ...]` from unit tests, benches and demos. Returns plain rows so
// it builds both inside and outside the library crate.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `count` random walks of `len` samples, each starting uniformly in
/// `[0, hi)` and moving by up to `±step` per sample, clamped below `hi`.
pub fn random_walks(count: usize, len: usize, hi: f32, step: f32, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let top = hi - 1e-3;
    (0..count)
        .map(|_| {
            let mut v = rng.random_range(0.0..hi);
            (0..len)
                .map(|_| {
                    v = (v + rng.random_range(-step..=step)).clamp(0.0, top);
                    v
                })
                .collect()
        })
        .collect()
}

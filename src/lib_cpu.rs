#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use rand::Rng;
use std::time::Duration;

use crate::lib_mem::PAGE_SIZE;

/// Operations per burst at full intensity when memory is also stressed.
pub const MEMORY_OPS_SCALE: f64 = 1000.0;
/// Operations per burst at full intensity for CPU-only runs.
pub const CPU_ONLY_OPS_SCALE: f64 = 10_000.0;
const MAX_PAUSE_MS: f64 = 5.0;

pub fn burst_ops(intensity: f64, scale: f64) -> usize {
    (intensity.clamp(0.0, 1.0) * scale).floor() as usize
}

/// Pause after a burst: 5 ms at intensity 0, none at intensity 1.
pub fn burst_pause(intensity: f64) -> Duration {
    Duration::from_secs_f64(MAX_PAUSE_MS * (1.0 - intensity.clamp(0.0, 1.0)) / 1000.0)
}

/// One burst of `burst_ops(intensity, scale)` operations.
///
/// Each operation accumulates a random float and, when `chunks` is not empty,
/// reads then rewrites one byte at a random page of a random chunk and at the
/// page right after it.
pub fn cpu_burst<R: Rng>(intensity: f64, scale: f64, chunks: &mut [Vec<u8>], rng: &mut R) -> f64 {
    let mut sum = 0.0;
    for _ in 0..burst_ops(intensity, scale) {
        sum += rng.gen::<f64>();
        if chunks.is_empty() {
            continue;
        }
        let idx = rng.gen_range(0..chunks.len());
        let chunk = &mut chunks[idx];
        if chunk.is_empty() {
            continue;
        }
        let page = rng.gen_range(0..chunk.len().div_ceil(PAGE_SIZE)) * PAGE_SIZE;
        for offset in [page, page + PAGE_SIZE] {
            if offset < chunk.len() {
                sum += f64::from(chunk[offset]);
                chunk[offset] = rng.gen();
            }
        }
    }
    std::hint::black_box(sum)
}

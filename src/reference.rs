//! Sequential CPU implementation of the counting, finalization and colorize
//! stages. Same semantics as the kernels; used to verify them and as the
//! `--cpu` path of the binary.

use crate::{
    config::{HistogramConfig, OutOfRangePolicy},
    error::HistogramResult,
    grid::Grid,
    pipeline::HistogramOutput,
};

pub fn count(grid: &Grid, bin_count: u32, policy: OutOfRangePolicy) -> Vec<u32> {
    let mut counts = vec![0u32; bin_count as usize];
    for &value in grid.samples() {
        if let Some(bin) = policy.resolve(value, bin_count) {
            counts[bin as usize] += 1;
        }
    }
    counts
}

pub fn finalize(counts: &[u32], total: u32, color_scaler: f32) -> Vec<f32> {
    counts
        .iter()
        .map(|&c| (c as f32 / total as f32) * color_scaler)
        .collect()
}

pub fn colorize(grid: &Grid, finalized: &[f32], policy: OutOfRangePolicy) -> Vec<f32> {
    let bin_count = finalized.len() as u32;
    grid.samples()
        .iter()
        .map(|&value| match policy.resolve(value, bin_count) {
            Some(bin) => finalized[bin as usize],
            None => 0.0,
        })
        .collect()
}

/// Whole pipeline on the CPU, with the same validation as the GPU entry point.
pub fn histogram(grid: &Grid, config: &HistogramConfig) -> HistogramResult<HistogramOutput> {
    config.validate()?;
    grid.check_range(config.bin_count, config.policy)?;

    let total = grid.cells();
    let counts = count(grid, config.bin_count, config.policy);
    let finalized = finalize(&counts, total, config.color_scaler);
    let density = config
        .colorize
        .then(|| colorize(grid, &finalized, config.policy));

    Ok(HistogramOutput {
        width: grid.width(),
        height: grid.height(),
        total,
        counts,
        finalized,
        density,
    })
}

//! Host side of the histogram: the orchestrator that sequences the kernels
//! and the entry point that owns the device buffers for one call.

use serde::Serialize;

use crate::{
    config::HistogramConfig,
    error::{HistogramError, HistogramResult},
    geometry::LaunchGeometry,
    gpu::{ComputeContext, DeviceBuffers, HistogramKernels, read_back},
    grid::Grid,
    params::FinalizeParams,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramOutput {
    pub width: u32,
    pub height: u32,
    /// `width * height`, the normalization denominator.
    pub total: u32,
    pub counts: Vec<u32>,
    /// One value per bin: `counts[b] / total * color_scaler`.
    pub finalized: Vec<f32>,
    /// One value per grid cell, present when colorizing was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density: Option<Vec<f32>>,
}

impl HistogramOutput {
    /// Samples that landed in a bin. Equals `total` unless samples were skipped.
    pub fn counted(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }
}

/// Run counting then finalization over device-resident buffers.
///
/// The histogram must already be zeroed. Counting is submitted and waited on
/// before the finalize parameters are written and finalization is submitted.
#[track_caller]
pub fn histogram_gpu(
    ctx: &ComputeContext,
    kernels: &HistogramKernels,
    buffers: &DeviceBuffers,
    geometry: &LaunchGeometry,
    width: u32,
    height: u32,
    color_scaler: f32,
) -> HistogramResult<()> {
    if width != buffers.width || height != buffers.height {
        return Err(HistogramError::InvalidLaunch(format!(
            "dimensions {width}x{height} do not match the uploaded {}x{} grid",
            buffers.width, buffers.height
        )));
    }
    let total = width
        .checked_mul(height)
        .ok_or(HistogramError::GridTooLarge {
            cells: u64::from(width) * u64::from(height),
            limit: u64::from(u32::MAX),
        })?;
    if total == 0 {
        return Err(HistogramError::EmptyGrid { width, height });
    }

    let limits = ctx.limits();
    kernels.check_grid_geometry(geometry, width, height)?;
    geometry.check_limits(&limits)?;
    let bin_geometry = kernels.bin_geometry(buffers.bin_count);
    kernels.check_bin_geometry(&bin_geometry, buffers.bin_count)?;
    bin_geometry.check_limits(&limits)?;

    log::debug!(
        "histogram {width}x{height}: count dispatch {:?} x block {:?}, finalize dispatch {:?} x block {:?}",
        geometry.grid,
        geometry.block,
        bin_geometry.grid,
        bin_geometry.block
    );

    ctx.submit_checked("histogram count dispatch", |encoder| {
        kernels.encode_count(&ctx.device, encoder, buffers, geometry);
    })?;
    ctx.wait("histogram count synchronize")?;

    let params = FinalizeParams::new(buffers.bin_count, total, color_scaler);
    ctx.checked("finalize params upload", |_, queue| {
        queue.write_buffer(&buffers.finalize_params, 0, bytemuck::bytes_of(&params));
    })?;
    ctx.submit_checked("histogram finalize dispatch", |encoder| {
        kernels.encode_finalize(&ctx.device, encoder, buffers, &bin_geometry);
    })?;
    Ok(())
}

/// Map every grid cell through its finalized bin into the density buffer.
/// Must run after [`histogram_gpu`].
#[track_caller]
pub fn colorize_gpu(
    ctx: &ComputeContext,
    kernels: &HistogramKernels,
    buffers: &DeviceBuffers,
    geometry: &LaunchGeometry,
) -> HistogramResult<()> {
    if buffers.density.is_none() {
        return Err(HistogramError::InvalidLaunch(
            "colorize requested without a density buffer".to_string(),
        ));
    }
    kernels.check_grid_geometry(geometry, buffers.width, buffers.height)?;
    geometry.check_limits(&ctx.limits())?;
    ctx.submit_checked("histogram colorize dispatch", |encoder| {
        kernels.encode_colorize(&ctx.device, encoder, buffers, geometry);
    })?;
    Ok(())
}

/// Full pipeline for one host grid: validate, upload, count, finalize,
/// optionally colorize, read back. Compiles the kernels for `config` first.
#[track_caller]
pub fn histogram(
    ctx: &ComputeContext,
    grid: &Grid,
    config: &HistogramConfig,
) -> HistogramResult<HistogramOutput> {
    config.validate()?;
    let kernels = HistogramKernels::for_config(ctx, config)?;
    histogram_with_kernels(ctx, &kernels, grid, config)
}

/// Same as [`histogram`] with kernels compiled ahead of time.
#[track_caller]
pub fn histogram_with_kernels(
    ctx: &ComputeContext,
    kernels: &HistogramKernels,
    grid: &Grid,
    config: &HistogramConfig,
) -> HistogramResult<HistogramOutput> {
    config.validate()?;
    if kernels.block() != config.block || kernels.finalize_block() != config.finalize_block {
        return Err(HistogramError::InvalidLaunch(format!(
            "kernels compiled for block {:?}/{} but config asks for {:?}/{}",
            kernels.block(),
            kernels.finalize_block(),
            config.block,
            config.finalize_block
        )));
    }
    grid.check_range(config.bin_count, config.policy)?;

    let buffers = DeviceBuffers::upload(ctx, grid, config)?;
    buffers.reset_histogram(ctx)?;

    let geometry = kernels.grid_geometry(grid.width(), grid.height());
    histogram_gpu(
        ctx,
        kernels,
        &buffers,
        &geometry,
        grid.width(),
        grid.height(),
        config.color_scaler,
    )?;
    if config.colorize {
        colorize_gpu(ctx, kernels, &buffers, &geometry)?;
    }

    let counts = read_back::<u32>(ctx, &buffers.histogram, config.bin_count, "histogram counts readback")?;
    let finalized = read_back::<f32>(ctx, &buffers.output, config.bin_count, "histogram output readback")?;
    let density = match buffers.density.as_ref() {
        Some(density) => Some(read_back::<f32>(ctx, density, grid.cells(), "density readback")?),
        None => None,
    };

    Ok(HistogramOutput {
        width: grid.width(),
        height: grid.height(),
        total: buffers.total(),
        counts,
        finalized,
        density,
    })
}

/// Device context plus kernels compiled once for a fixed config, for
/// repeated calls over many grids.
pub struct GpuHistogram {
    ctx: ComputeContext,
    kernels: HistogramKernels,
    config: HistogramConfig,
}

impl GpuHistogram {
    #[track_caller]
    pub fn new(ctx: ComputeContext, config: HistogramConfig) -> HistogramResult<Self> {
        config.validate()?;
        let kernels = HistogramKernels::for_config(&ctx, &config)?;
        Ok(Self {
            ctx,
            kernels,
            config,
        })
    }

    pub fn config(&self) -> &HistogramConfig {
        &self.config
    }

    pub fn context(&self) -> &ComputeContext {
        &self.ctx
    }

    #[track_caller]
    pub fn run(&self, grid: &Grid) -> HistogramResult<HistogramOutput> {
        histogram_with_kernels(&self.ctx, &self.kernels, grid, &self.config)
    }
}

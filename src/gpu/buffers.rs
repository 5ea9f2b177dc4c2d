//! Device-resident buffers for one histogram call.
//!
//! Buffers are released when `DeviceBuffers` is dropped, on success and on
//! every early error return alike.

use std::panic::Location;

use bytemuck::Pod;
use wgpu::util::DeviceExt;

use crate::{
    config::HistogramConfig,
    error::{HistogramError, HistogramResult, status},
    grid::Grid,
    params::{FinalizeParams, GridParams},
};

use super::context::ComputeContext;

pub struct DeviceBuffers {
    /// `width * height` samples, read-only to the kernels.
    pub grid: wgpu::Buffer,
    /// `bin_count` atomic counters.
    pub histogram: wgpu::Buffer,
    /// `bin_count` finalized values.
    pub output: wgpu::Buffer,
    /// Per-cell density field; only allocated when colorizing.
    pub density: Option<wgpu::Buffer>,
    pub grid_params: wgpu::Buffer,
    pub finalize_params: wgpu::Buffer,
    pub width: u32,
    pub height: u32,
    pub bin_count: u32,
}

fn byte_len<T>(count: u32) -> u64 {
    u64::from(count) * std::mem::size_of::<T>() as u64
}

/// Largest element count a single storage binding may hold on this device.
pub fn max_storage_elements<T>(limits: &wgpu::Limits) -> u64 {
    let binding = u64::from(limits.max_storage_buffer_binding_size);
    binding.min(limits.max_buffer_size) / std::mem::size_of::<T>() as u64
}

impl DeviceBuffers {
    /// Allocate every buffer for `grid` and copy the samples to the device.
    /// The histogram still has to be zeroed with [`DeviceBuffers::reset_histogram`].
    #[track_caller]
    pub fn upload(
        ctx: &ComputeContext,
        grid: &Grid,
        config: &HistogramConfig,
    ) -> HistogramResult<Self> {
        let limits = ctx.limits();
        let cells = u64::from(grid.cells());
        let max_cells = max_storage_elements::<i32>(&limits);
        if cells > max_cells {
            return Err(HistogramError::GridTooLarge {
                cells,
                limit: max_cells,
            });
        }
        let max_bins = max_storage_elements::<u32>(&limits);
        if u64::from(config.bin_count) > max_bins {
            return Err(HistogramError::InvalidConfig(format!(
                "binCount {} exceeds the device storage limit of {max_bins}",
                config.bin_count
            )));
        }

        let params = GridParams::new(grid.width(), grid.height(), config.bin_count, config.policy);

        ctx.checked("device buffer allocation", |device, _| {
            let grid_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("sys.histogram.grid"),
                contents: bytemuck::cast_slice(grid.samples()),
                usage: wgpu::BufferUsages::STORAGE,
            });

            let histogram = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("sys.histogram.counts"),
                size: byte_len::<u32>(config.bin_count),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            });

            let output = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("sys.histogram.output"),
                size: byte_len::<f32>(config.bin_count),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            });

            let density = config.colorize.then(|| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("sys.histogram.density"),
                    size: byte_len::<f32>(grid.cells()),
                    usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                    mapped_at_creation: false,
                })
            });

            let grid_params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("sys.histogram.grid_params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

            let finalize_params = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("sys.histogram.finalize_params"),
                size: std::mem::size_of::<FinalizeParams>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });

            Self {
                grid: grid_buffer,
                histogram,
                output,
                density,
                grid_params,
                finalize_params,
                width: grid.width(),
                height: grid.height(),
                bin_count: config.bin_count,
            }
        })
    }

    /// Zero every histogram counter. Must precede each counting dispatch.
    #[track_caller]
    pub fn reset_histogram(&self, ctx: &ComputeContext) -> HistogramResult<()> {
        ctx.submit_checked("histogram clear", |encoder| {
            encoder.clear_buffer(&self.histogram, 0, None);
        })?;
        Ok(())
    }

    pub fn total(&self) -> u32 {
        // `Grid` caps the cell count at u32::MAX.
        self.width * self.height
    }
}

/// Copy `len` elements of `source` into a staging buffer and map them back to the host.
#[track_caller]
pub fn read_back<T: Pod>(
    ctx: &ComputeContext,
    source: &wgpu::Buffer,
    len: u32,
    call: &'static str,
) -> HistogramResult<Vec<T>> {
    let location = Location::caller();
    if len == 0 {
        return Ok(Vec::new());
    }
    let size = byte_len::<T>(len);

    let staging = ctx.checked(call, |device, _| {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sys.histogram.staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    })?;
    ctx.submit_checked(call, |encoder| {
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, size);
    })?;

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |res| {
        let _ = tx.send(res);
    });
    ctx.wait(call)?;

    let mapped = rx.recv().map_err(|_| {
        HistogramError::device(call, status::MAP, "map_async callback dropped", location)
    })?;
    mapped.map_err(|e| HistogramError::device(call, status::MAP, e.to_string(), location))?;

    let data = slice.get_mapped_range();
    let out: Vec<T> = bytemuck::pod_collect_to_vec(&data[..]);
    drop(data);
    staging.unmap();

    log::trace!("{call}: read back {len} elements ({size} bytes)");
    Ok(out)
}

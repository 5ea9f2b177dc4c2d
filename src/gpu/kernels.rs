use std::borrow::Cow;

use crate::{
    config::HistogramConfig,
    error::{HistogramError, HistogramResult},
    geometry::LaunchGeometry,
    validation::check_kernel_source,
};

use super::{
    bindings::{buffer_entry, storage_read_entry, storage_read_write_entry, uniform_entry},
    buffers::DeviceBuffers,
    context::ComputeContext,
    shaders,
};

const COUNT_LABEL: &str = "sys.histogram.count";
const FINALIZE_LABEL: &str = "sys.histogram.finalize";
const COLORIZE_LABEL: &str = "sys.histogram.colorize";

pub struct PipelineBundle {
    pub pipeline: wgpu::ComputePipeline,
    pub layout: wgpu::BindGroupLayout,
}

/// Compiled counting, finalization and colorize pipelines for one block shape.
pub struct HistogramKernels {
    count: PipelineBundle,
    finalize: PipelineBundle,
    colorize: PipelineBundle,
    block: [u32; 2],
    finalize_block: u32,
}

fn create_pipeline(
    device: &wgpu::Device,
    label: &'static str,
    source: &str,
    entries: &[wgpu::BindGroupLayoutEntry],
) -> PipelineBundle {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
    });

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries,
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    });

    PipelineBundle { pipeline, layout }
}

fn dispatch(
    encoder: &mut wgpu::CommandEncoder,
    label: &'static str,
    bundle: &PipelineBundle,
    bind_group: &wgpu::BindGroup,
    geometry: &LaunchGeometry,
) {
    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some(label),
        timestamp_writes: None,
    });
    pass.set_pipeline(&bundle.pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.dispatch_workgroups(geometry.grid[0], geometry.grid[1], 1);
}

// Kernels bake their workgroup size in.
fn check_block(geometry: &LaunchGeometry, expected: [u32; 2]) -> HistogramResult<()> {
    if geometry.block != expected {
        return Err(HistogramError::InvalidLaunch(format!(
            "launch block {:?} does not match compiled workgroup size {expected:?}",
            geometry.block
        )));
    }
    Ok(())
}

impl HistogramKernels {
    /// Generate, validate and compile all kernels for the given workgroup shapes.
    #[track_caller]
    pub fn new(
        ctx: &ComputeContext,
        block: [u32; 2],
        finalize_block: u32,
    ) -> HistogramResult<Self> {
        let limits = ctx.limits();
        LaunchGeometry { block, grid: [1, 1] }.check_limits(&limits)?;
        LaunchGeometry::for_bins(1, finalize_block).check_limits(&limits)?;

        let count_source = shaders::counting_shader(block);
        let finalize_source = shaders::finalize_shader(finalize_block);
        let colorize_source = shaders::colorize_shader(block);
        check_kernel_source(COUNT_LABEL, &count_source)?;
        check_kernel_source(FINALIZE_LABEL, &finalize_source)?;
        check_kernel_source(COLORIZE_LABEL, &colorize_source)?;

        let kernels = ctx.checked("kernel pipeline creation", |device, _| Self {
            count: create_pipeline(
                device,
                COUNT_LABEL,
                &count_source,
                &[
                    storage_read_entry(0),
                    storage_read_write_entry(1),
                    uniform_entry(2),
                ],
            ),
            finalize: create_pipeline(
                device,
                FINALIZE_LABEL,
                &finalize_source,
                &[
                    storage_read_entry(0),
                    storage_read_write_entry(1),
                    uniform_entry(2),
                ],
            ),
            colorize: create_pipeline(
                device,
                COLORIZE_LABEL,
                &colorize_source,
                &[
                    storage_read_entry(0),
                    storage_read_entry(1),
                    storage_read_write_entry(2),
                    uniform_entry(3),
                ],
            ),
            block,
            finalize_block,
        })?;

        log::debug!("compiled histogram kernels: block={block:?} finalize_block={finalize_block}");
        Ok(kernels)
    }

    #[track_caller]
    pub fn for_config(ctx: &ComputeContext, config: &HistogramConfig) -> HistogramResult<Self> {
        Self::new(ctx, config.block, config.finalize_block)
    }

    pub fn block(&self) -> [u32; 2] {
        self.block
    }

    pub fn finalize_block(&self) -> u32 {
        self.finalize_block
    }

    /// Geometry covering a `width x height` grid with this kernel set's block.
    pub fn grid_geometry(&self, width: u32, height: u32) -> LaunchGeometry {
        LaunchGeometry::for_grid(width, height, self.block)
    }

    pub fn bin_geometry(&self, bin_count: u32) -> LaunchGeometry {
        LaunchGeometry::for_bins(bin_count, self.finalize_block)
    }

    /// A per-cell launch must use the compiled block and reach every cell.
    pub fn check_grid_geometry(
        &self,
        geometry: &LaunchGeometry,
        width: u32,
        height: u32,
    ) -> HistogramResult<()> {
        check_block(geometry, self.block)?;
        if !geometry.covers(width, height) {
            let [ix, iy] = geometry.invocations();
            return Err(HistogramError::InvalidLaunch(format!(
                "dispatch {:?} x block {:?} reaches {ix}x{iy} cells, grid is {width}x{height}",
                geometry.grid, geometry.block
            )));
        }
        Ok(())
    }

    /// A per-bin launch must use the compiled finalize block and reach every bin.
    pub fn check_bin_geometry(
        &self,
        geometry: &LaunchGeometry,
        bin_count: u32,
    ) -> HistogramResult<()> {
        check_block(geometry, [self.finalize_block, 1])?;
        if !geometry.covers(bin_count, 1) {
            return Err(HistogramError::InvalidLaunch(format!(
                "dispatch {:?} x block {:?} does not reach all {bin_count} bins",
                geometry.grid, geometry.block
            )));
        }
        Ok(())
    }

    pub fn encode_count(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        buffers: &DeviceBuffers,
        geometry: &LaunchGeometry,
    ) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sys.histogram.count.bg"),
            layout: &self.count.layout,
            entries: &[
                buffer_entry(0, &buffers.grid),
                buffer_entry(1, &buffers.histogram),
                buffer_entry(2, &buffers.grid_params),
            ],
        });
        dispatch(encoder, "sys.histogram.count.pass", &self.count, &bind_group, geometry);
    }

    pub fn encode_finalize(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        buffers: &DeviceBuffers,
        geometry: &LaunchGeometry,
    ) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sys.histogram.finalize.bg"),
            layout: &self.finalize.layout,
            entries: &[
                buffer_entry(0, &buffers.histogram),
                buffer_entry(1, &buffers.output),
                buffer_entry(2, &buffers.finalize_params),
            ],
        });
        dispatch(
            encoder,
            "sys.histogram.finalize.pass",
            &self.finalize,
            &bind_group,
            geometry,
        );
    }

    /// Returns false without encoding when the buffers carry no density field.
    pub fn encode_colorize(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        buffers: &DeviceBuffers,
        geometry: &LaunchGeometry,
    ) -> bool {
        let Some(density) = buffers.density.as_ref() else {
            return false;
        };
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sys.histogram.colorize.bg"),
            layout: &self.colorize.layout,
            entries: &[
                buffer_entry(0, &buffers.grid),
                buffer_entry(1, &buffers.output),
                buffer_entry(2, density),
                buffer_entry(3, &buffers.grid_params),
            ],
        });
        dispatch(
            encoder,
            "sys.histogram.colorize.pass",
            &self.colorize,
            &bind_group,
            geometry,
        );
        true
    }
}

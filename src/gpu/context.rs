use std::panic::Location;

use pollster::block_on;

use crate::error::{HistogramError, HistogramResult, status};

#[derive(Debug, Clone)]
pub struct ComputeContextConfig {
    pub power_preference: wgpu::PowerPreference,
    pub force_fallback_adapter: bool,
}

impl Default for ComputeContextConfig {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
        }
    }
}

/// Headless device and queue the histogram kernels run on.
pub struct ComputeContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
}

impl ComputeContext {
    pub fn new(config: ComputeContextConfig) -> HistogramResult<Self> {
        let instance = wgpu::Instance::default();
        let adapter = block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: config.power_preference,
            force_fallback_adapter: config.force_fallback_adapter,
            compatible_surface: None,
        }))
        .map_err(|e| HistogramError::NoAdapter(e.to_string()))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "histogram adapter: {} ({:?}, {:?})",
            adapter_info.name,
            adapter_info.backend,
            adapter_info.device_type
        );

        let (device, queue) = block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("sys.histogram.device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            ..Default::default()
        }))
        .map_err(|e| HistogramError::RequestDevice(e.to_string()))?;

        Ok(Self {
            device,
            queue,
            adapter_info,
        })
    }

    pub fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }

    /// Run `f` inside validation and out-of-memory error scopes. A captured
    /// error is reported against the caller's source location.
    #[track_caller]
    pub fn checked<T>(
        &self,
        call: &'static str,
        f: impl FnOnce(&wgpu::Device, &wgpu::Queue) -> T,
    ) -> HistogramResult<T> {
        let location = Location::caller();

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let value = f(&self.device, &self.queue);

        let validation = block_on(self.device.pop_error_scope());
        let out_of_memory = block_on(self.device.pop_error_scope());
        match validation.or(out_of_memory) {
            Some(err) => Err(HistogramError::from_wgpu(call, &err, location)),
            None => Ok(value),
        }
    }

    /// Encode one command buffer and submit it as a checked runtime call.
    #[track_caller]
    pub fn submit_checked(
        &self,
        call: &'static str,
        encode: impl FnOnce(&mut wgpu::CommandEncoder),
    ) -> HistogramResult<wgpu::SubmissionIndex> {
        self.checked(call, |device, queue| {
            let mut encoder =
                device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(call) });
            encode(&mut encoder);
            queue.submit(std::iter::once(encoder.finish()))
        })
    }

    /// Block until all submitted work has finished.
    #[track_caller]
    pub fn wait(&self, call: &'static str) -> HistogramResult<()> {
        let location = Location::caller();
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| HistogramError::device(call, status::POLL, e.to_string(), location))
    }
}

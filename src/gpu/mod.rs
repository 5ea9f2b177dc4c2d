pub mod bindings;
pub mod buffers;
pub mod context;
pub mod kernels;
pub mod shaders;

pub use buffers::{DeviceBuffers, read_back};
pub use context::{ComputeContext, ComputeContextConfig};
pub use kernels::HistogramKernels;

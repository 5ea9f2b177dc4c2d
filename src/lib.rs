//! GPU histogram of integer grids with normalized, color-scaled output.
//!
//! Counting runs as a wgpu compute kernel that atomically increments one bin
//! per grid cell. Finalization runs as a second kernel that turns each count
//! into `count / (width * height) * color_scaler`.

pub mod config;
pub mod error;
pub mod export;
pub mod fatal;
pub mod geometry;
pub mod gpu;
pub mod grid;
pub mod params;
pub mod pipeline;
pub mod reference;
pub mod validation;

pub use config::{HistogramConfig, OutOfRangePolicy};
pub use error::{HistogramError, HistogramResult};
pub use geometry::LaunchGeometry;
pub use gpu::{ComputeContext, ComputeContextConfig, HistogramKernels};
pub use grid::Grid;
pub use pipeline::{GpuHistogram, HistogramOutput, histogram, histogram_gpu};

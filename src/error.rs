//! Error type shared by every layer of the histogram pipeline.
//!
//! Device failures keep the call site that issued the failing runtime call so
//! the fail-fast adapter in [`crate::fatal`] can report it.

use std::panic::Location;

use thiserror::Error;

/// Status codes for device failures. Domain errors use the 100 range.
pub mod status {
    pub const VALIDATION: i32 = 1;
    pub const OUT_OF_MEMORY: i32 = 2;
    pub const INTERNAL: i32 = 3;
    pub const POLL: i32 = 4;
    pub const MAP: i32 = 5;

    pub const EMPTY_GRID: i32 = 100;
    pub const GRID_SIZE_MISMATCH: i32 = 101;
    pub const GRID_TOO_LARGE: i32 = 102;
    pub const SAMPLE_OUT_OF_RANGE: i32 = 103;
    pub const INVALID_CONFIG: i32 = 104;

    pub const NO_ADAPTER: i32 = 200;
    pub const REQUEST_DEVICE: i32 = 201;
    pub const INVALID_LAUNCH: i32 = 202;
    pub const SHADER: i32 = 300;
}

#[derive(Debug, Error)]
pub enum HistogramError {
    #[error("grid has zero area ({width}x{height})")]
    EmptyGrid { width: u32, height: u32 },

    #[error("grid {width}x{height} expects {expected} samples, got {actual}")]
    GridSizeMismatch {
        width: u32,
        height: u32,
        expected: u64,
        actual: usize,
    },

    #[error("grid of {cells} cells exceeds the limit of {limit}")]
    GridTooLarge { cells: u64, limit: u64 },

    #[error("sample {value} at index {index} is outside the bin range [0, {bin_count})")]
    SampleOutOfRange {
        index: usize,
        value: i32,
        bin_count: u32,
    },

    #[error("invalid histogram config: {0}")]
    InvalidConfig(String),

    #[error("no compatible GPU adapter: {0}")]
    NoAdapter(String),

    #[error("failed to request GPU device: {0}")]
    RequestDevice(String),

    #[error("invalid launch configuration: {0}")]
    InvalidLaunch(String),

    #[error("{call} failed: {message}")]
    Device {
        call: &'static str,
        status: i32,
        message: String,
        location: &'static Location<'static>,
    },

    #[error("shader '{label}' is invalid:\n{message}")]
    Shader { label: &'static str, message: String },
}

pub type HistogramResult<T> = Result<T, HistogramError>;

impl HistogramError {
    pub(crate) fn device(
        call: &'static str,
        status: i32,
        message: impl Into<String>,
        location: &'static Location<'static>,
    ) -> Self {
        HistogramError::Device {
            call,
            status,
            message: message.into(),
            location,
        }
    }

    pub(crate) fn from_wgpu(
        call: &'static str,
        err: &wgpu::Error,
        location: &'static Location<'static>,
    ) -> Self {
        let code = match err {
            wgpu::Error::OutOfMemory { .. } => status::OUT_OF_MEMORY,
            wgpu::Error::Validation { .. } => status::VALIDATION,
            #[allow(unreachable_patterns)]
            _ => status::INTERNAL,
        };
        Self::device(call, code, err.to_string(), location)
    }

    /// Numeric status reported next to the description on abort.
    pub fn status(&self) -> i32 {
        match self {
            HistogramError::EmptyGrid { .. } => status::EMPTY_GRID,
            HistogramError::GridSizeMismatch { .. } => status::GRID_SIZE_MISMATCH,
            HistogramError::GridTooLarge { .. } => status::GRID_TOO_LARGE,
            HistogramError::SampleOutOfRange { .. } => status::SAMPLE_OUT_OF_RANGE,
            HistogramError::InvalidConfig(_) => status::INVALID_CONFIG,
            HistogramError::NoAdapter(_) => status::NO_ADAPTER,
            HistogramError::RequestDevice(_) => status::REQUEST_DEVICE,
            HistogramError::InvalidLaunch(_) => status::INVALID_LAUNCH,
            HistogramError::Device { status, .. } => *status,
            HistogramError::Shader { .. } => status::SHADER,
        }
    }

    /// Source location of the failing runtime call, when one was recorded.
    pub fn location(&self) -> Option<&'static Location<'static>> {
        match self {
            HistogramError::Device { location, .. } => Some(location),
            _ => None,
        }
    }

    /// True for errors raised by the GPU runtime rather than by input validation.
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            HistogramError::NoAdapter(_)
                | HistogramError::RequestDevice(_)
                | HistogramError::InvalidLaunch(_)
                | HistogramError::Device { .. }
                | HistogramError::Shader { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_error_keeps_call_site() {
        let here = Location::caller();
        let err = HistogramError::device("queue.submit", status::VALIDATION, "bad bind group", here);
        assert_eq!(err.status(), status::VALIDATION);
        assert_eq!(err.location().map(|l| l.file()), Some(file!()));
        assert!(err.is_device_error());
        assert_eq!(err.to_string(), "queue.submit failed: bad bind group");
    }

    #[test]
    fn domain_errors_have_no_location() {
        let err = HistogramError::SampleOutOfRange {
            index: 3,
            value: 9,
            bin_count: 4,
        };
        assert!(err.location().is_none());
        assert!(!err.is_device_error());
        assert_eq!(err.status(), status::SAMPLE_OUT_OF_RANGE);
    }
}

//! Uniform blocks shared with the WGSL kernels. Layouts must match the
//! `GridParams` and `FinalizeParams` structs in `gpu::shaders`.

use bytemuck::{Pod, Zeroable};

use crate::config::OutOfRangePolicy;

/// Used by the counting and colorize kernels.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct GridParams {
    pub width: u32,
    pub height: u32,
    pub bin_count: u32,
    pub policy: u32,
}

impl GridParams {
    pub fn new(width: u32, height: u32, bin_count: u32, policy: OutOfRangePolicy) -> Self {
        Self {
            width,
            height,
            bin_count,
            policy: policy.as_u32(),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FinalizeParams {
    pub bin_count: u32,
    pub total: u32,
    pub color_scaler: f32,
    pub _pad: u32,
}

impl FinalizeParams {
    pub fn new(bin_count: u32, total: u32, color_scaler: f32) -> Self {
        Self {
            bin_count,
            total,
            color_scaler,
            _pad: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_blocks_are_16_bytes() {
        assert_eq!(std::mem::size_of::<GridParams>(), 16);
        assert_eq!(std::mem::size_of::<FinalizeParams>(), 16);
    }

    #[test]
    fn finalize_params_byte_layout() {
        let params = FinalizeParams::new(3, 4, 2.0);
        let words: &[u32] = bytemuck::cast_slice(bytemuck::bytes_of(&params));
        assert_eq!(words, &[3, 4, 2.0f32.to_bits(), 0]);
    }
}

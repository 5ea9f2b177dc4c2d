//! WGSL sources for the histogram kernels.
//!
//! Workgroup sizes are baked in when the source is generated, so the
//! templates carry `{block_x}` style placeholders.

const GRID_PARAMS_WGSL: &str = r#"
struct GridParams {
    width: u32,
    height: u32,
    bin_count: u32,
    policy: u32,
}

const POLICY_CLAMP: u32 = 1u;

// Bin for a sample, or -1 when the sample is not counted.
fn bin_of(value: i32, bin_count: u32, policy: u32) -> i32 {
    if (value >= 0 && u32(value) < bin_count) {
        return value;
    }
    if (policy == POLICY_CLAMP) {
        if (value < 0) {
            return 0;
        }
        return i32(bin_count - 1u);
    }
    return -1;
}
"#;

const COUNTING_WGSL: &str = r#"
@group(0) @binding(0)
var<storage, read> grid: array<i32>;

@group(0) @binding(1)
var<storage, read_write> histogram: array<atomic<u32>>;

@group(0) @binding(2)
var<uniform> params: GridParams;

@compute @workgroup_size({block_x}, {block_y}, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.width || gid.y >= params.height) {
        return;
    }

    let value = grid[gid.y * params.width + gid.x];
    let slot = bin_of(value, params.bin_count, params.policy);
    if (slot < 0) {
        return;
    }
    atomicAdd(&histogram[u32(slot)], 1u);
}
"#;

const FINALIZE_WGSL: &str = r#"
struct FinalizeParams {
    bin_count: u32,
    total: u32,
    color_scaler: f32,
    pad: u32,
}

@group(0) @binding(0)
var<storage, read> histogram: array<u32>;

@group(0) @binding(1)
var<storage, read_write> output: array<f32>;

@group(0) @binding(2)
var<uniform> params: FinalizeParams;

@compute @workgroup_size({block_len}, 1, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if (i >= params.bin_count) {
        return;
    }

    let normalized = f32(histogram[i]) / f32(params.total);
    output[i] = normalized * params.color_scaler;
}
"#;

const COLORIZE_WGSL: &str = r#"
@group(0) @binding(0)
var<storage, read> grid: array<i32>;

@group(0) @binding(1)
var<storage, read> finalized: array<f32>;

@group(0) @binding(2)
var<storage, read_write> density: array<f32>;

@group(0) @binding(3)
var<uniform> params: GridParams;

@compute @workgroup_size({block_x}, {block_y}, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.width || gid.y >= params.height) {
        return;
    }

    let idx = gid.y * params.width + gid.x;
    let slot = bin_of(grid[idx], params.bin_count, params.policy);
    if (slot < 0) {
        density[idx] = 0.0;
        return;
    }
    density[idx] = finalized[u32(slot)];
}
"#;

/// Per-cell counting kernel: one invocation per grid cell, atomic increment per sample.
pub fn counting_shader(block: [u32; 2]) -> String {
    let body = COUNTING_WGSL
        .replace("{block_x}", &block[0].to_string())
        .replace("{block_y}", &block[1].to_string());
    format!("{GRID_PARAMS_WGSL}{body}")
}

/// Per-bin finalization kernel: `count / total * color_scaler`.
pub fn finalize_shader(block_len: u32) -> String {
    FINALIZE_WGSL.replace("{block_len}", &block_len.to_string())
}

/// Per-cell lookup of each sample's finalized bin value.
pub fn colorize_shader(block: [u32; 2]) -> String {
    let body = COLORIZE_WGSL
        .replace("{block_x}", &block[0].to_string())
        .replace("{block_y}", &block[1].to_string());
    format!("{GRID_PARAMS_WGSL}{body}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate_wgsl;

    #[test]
    fn counting_shader_is_valid_wgsl() {
        for block in [[16, 16], [8, 8], [32, 1], [7, 3]] {
            let source = counting_shader(block);
            assert!(
                source.contains(&format!("@workgroup_size({}, {}, 1)", block[0], block[1])),
                "{source}"
            );
            validate_wgsl(&source).unwrap_or_else(|e| panic!("block {block:?}: {e:#}"));
        }
    }

    #[test]
    fn finalize_shader_is_valid_wgsl() {
        for block_len in [1, 64, 256] {
            validate_wgsl(&finalize_shader(block_len))
                .unwrap_or_else(|e| panic!("block {block_len}: {e:#}"));
        }
    }

    #[test]
    fn colorize_shader_is_valid_wgsl() {
        validate_wgsl(&colorize_shader([16, 16])).unwrap_or_else(|e| panic!("{e:#}"));
    }

    #[test]
    fn counting_kernel_guards_bounds_before_reading() {
        let source = counting_shader([16, 16]);
        let guard = source.find("gid.x >= params.width").unwrap();
        let read = source.find("grid[gid.y * params.width + gid.x]").unwrap();
        assert!(guard < read);
        assert!(source.contains("atomicAdd(&histogram[u32(slot)], 1u)"));
    }

    #[test]
    fn no_placeholders_survive() {
        for source in [
            counting_shader([4, 4]),
            finalize_shader(32),
            colorize_shader([4, 4]),
        ] {
            assert!(!source.contains("{block"), "{source}");
        }
    }
}

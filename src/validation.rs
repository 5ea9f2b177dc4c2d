//! WGSL validation using the naga library.

use anyhow::{Context, Result, anyhow};

use crate::error::HistogramError;

/// Parse and validate WGSL source code.
///
/// Runs naga's front end and then its validator, so type errors that only
/// surface at pipeline creation are caught here with a readable message.
pub fn validate_wgsl(source: &str) -> Result<naga::Module> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| anyhow!("WGSL parse failed:\n{}", format_naga_error(source, &e)))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .map_err(|e| anyhow!("WGSL validation failed: {e:?}"))?;

    Ok(module)
}

/// Validate WGSL and provide context about which kernel generated it.
pub fn validate_wgsl_with_context(source: &str, context: &str) -> Result<naga::Module> {
    validate_wgsl(source).with_context(|| format!("{} generated invalid WGSL", context))
}

/// Validation failure as a pipeline error, for use before `create_shader_module`.
pub(crate) fn check_kernel_source(label: &'static str, source: &str) -> Result<(), HistogramError> {
    validate_wgsl_with_context(source, label)
        .map(|_| ())
        .map_err(|e| HistogramError::Shader {
            label,
            message: format!("{e:#}"),
        })
}

fn format_naga_error(source: &str, error: &naga::front::wgsl::ParseError) -> String {
    let mut output = String::new();

    output.push_str(&format!("  {}\n", error));

    output.push_str("\nGenerated WGSL:\n");
    output.push_str("---\n");
    for (line_num, line) in source.lines().enumerate() {
        output.push_str(&format!("{:4} | {}\n", line_num + 1, line));
    }
    output.push_str("---\n");

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_compute_wgsl() {
        let source = r#"
@group(0) @binding(0) var<storage, read_write> data: array<atomic<u32>>;

@compute @workgroup_size(64, 1, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    atomicAdd(&data[gid.x % 4u], 1u);
}
"#;
        assert!(validate_wgsl(source).is_ok());
    }

    #[test]
    fn test_invalid_wgsl_syntax() {
        let source = "fn invalid() -> { return 1u; }";
        assert!(validate_wgsl(source).is_err());
    }

    #[test]
    fn test_invalid_wgsl_type_error() {
        let source = r#"
@compute @workgroup_size(1)
fn main() {
    let x: u32 = 1.0;
}
"#;
        assert!(validate_wgsl(source).is_err());
    }

    #[test]
    fn test_kernel_source_error_names_the_kernel() {
        let err = check_kernel_source("histogram.count", "not wgsl").unwrap_err();
        assert!(matches!(err, HistogramError::Shader { label: "histogram.count", .. }));
        assert!(err.to_string().contains("histogram.count"));
    }
}

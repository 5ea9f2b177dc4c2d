use std::{fmt, path::Path, str::FromStr};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::error::{HistogramError, HistogramResult};

pub const DEFAULT_BIN_COUNT: u32 = 256;
pub const DEFAULT_BLOCK: [u32; 2] = [16, 16];
pub const DEFAULT_FINALIZE_BLOCK: u32 = 64;

/// Invocations per workgroup guaranteed by `wgpu::Limits::downlevel_defaults`.
pub const MAX_WORKGROUP_INVOCATIONS: u32 = 256;

/// `u32` counters that fit the 128 MiB storage binding of `wgpu::Limits::default`.
pub const MAX_BIN_COUNT: u32 = 1 << 25;

/// What happens to samples outside `[0, bin_count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutOfRangePolicy {
    /// Fail the call before any device work is launched.
    #[default]
    Reject,
    /// Fold into the first or last bin.
    Clamp,
    /// Leave uncounted; the total stays `width * height`.
    Skip,
}

impl OutOfRangePolicy {
    /// Value of the `policy` uniform the kernels switch on.
    pub fn as_u32(self) -> u32 {
        match self {
            OutOfRangePolicy::Reject => 0,
            OutOfRangePolicy::Clamp => 1,
            OutOfRangePolicy::Skip => 2,
        }
    }

    /// Bin a sample lands in, or `None` when it is not counted.
    ///
    /// `Reject` behaves like `Skip` here: rejection happens on the host before
    /// the kernels run, so they only ever see in-range grids under it.
    pub fn resolve(self, value: i32, bin_count: u32) -> Option<u32> {
        if value >= 0 && (value as u32) < bin_count {
            return Some(value as u32);
        }
        match self {
            OutOfRangePolicy::Clamp if bin_count > 0 => {
                Some(if value < 0 { 0 } else { bin_count - 1 })
            }
            _ => None,
        }
    }
}

impl FromStr for OutOfRangePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(OutOfRangePolicy::Reject),
            "clamp" => Ok(OutOfRangePolicy::Clamp),
            "skip" => Ok(OutOfRangePolicy::Skip),
            other => Err(anyhow!(
                "unknown out-of-range policy: {other} (supported: reject, clamp, skip)"
            )),
        }
    }
}

impl fmt::Display for OutOfRangePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutOfRangePolicy::Reject => "reject",
            OutOfRangePolicy::Clamp => "clamp",
            OutOfRangePolicy::Skip => "skip",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistogramConfig {
    /// Number of histogram bins; fixed for the pipeline, never derived from the grid.
    pub bin_count: u32,
    /// Multiplier applied to every normalized frequency.
    pub color_scaler: f32,
    /// Workgroup shape for the counting and colorize kernels.
    pub block: [u32; 2],
    /// Workgroup length for the finalization kernel.
    pub finalize_block: u32,
    pub policy: OutOfRangePolicy,
    /// Also produce the per-cell density field.
    pub colorize: bool,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            bin_count: DEFAULT_BIN_COUNT,
            color_scaler: 1.0,
            block: DEFAULT_BLOCK,
            finalize_block: DEFAULT_FINALIZE_BLOCK,
            policy: OutOfRangePolicy::default(),
            colorize: false,
        }
    }
}

impl HistogramConfig {
    pub fn with_bins(mut self, bin_count: u32) -> Self {
        self.bin_count = bin_count;
        self
    }

    pub fn with_color_scaler(mut self, color_scaler: f32) -> Self {
        self.color_scaler = color_scaler;
        self
    }

    pub fn with_block(mut self, block: [u32; 2]) -> Self {
        self.block = block;
        self
    }

    pub fn with_policy(mut self, policy: OutOfRangePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_colorize(mut self, colorize: bool) -> Self {
        self.colorize = colorize;
        self
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read config {}: {e}", path.display()))?;
        let config: HistogramConfig = serde_json::from_str(&text)
            .map_err(|e| anyhow!("invalid histogram config json in {}: {e}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> HistogramResult<()> {
        if self.bin_count == 0 {
            return Err(HistogramError::InvalidConfig(
                "binCount must be at least 1".to_string(),
            ));
        }
        if self.bin_count > MAX_BIN_COUNT {
            return Err(HistogramError::InvalidConfig(format!(
                "binCount {} exceeds the maximum of {MAX_BIN_COUNT}",
                self.bin_count
            )));
        }
        if !self.color_scaler.is_finite() {
            return Err(HistogramError::InvalidConfig(format!(
                "colorScaler must be finite, got {}",
                self.color_scaler
            )));
        }
        let [bx, by] = self.block;
        if bx == 0 || by == 0 || self.finalize_block == 0 {
            return Err(HistogramError::InvalidConfig(format!(
                "block dimensions must be non-zero (block={:?}, finalizeBlock={})",
                self.block, self.finalize_block
            )));
        }
        if bx.saturating_mul(by) > MAX_WORKGROUP_INVOCATIONS
            || self.finalize_block > MAX_WORKGROUP_INVOCATIONS
        {
            return Err(HistogramError::InvalidConfig(format!(
                "workgroups are limited to {MAX_WORKGROUP_INVOCATIONS} invocations \
                 (block={:?}, finalizeBlock={})",
                self.block, self.finalize_block
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = HistogramConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bin_count, 256);
        assert_eq!(config.block, [16, 16]);
        assert_eq!(config.policy, OutOfRangePolicy::Reject);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: HistogramConfig =
            serde_json::from_str(r#"{ "binCount": 3, "colorScaler": 2.0, "policy": "clamp" }"#)
                .unwrap();
        assert_eq!(config.bin_count, 3);
        assert_eq!(config.color_scaler, 2.0);
        assert_eq!(config.policy, OutOfRangePolicy::Clamp);
        assert_eq!(config.block, DEFAULT_BLOCK);
        assert!(!config.colorize);
    }

    #[test]
    fn rejects_degenerate_configs() {
        assert!(HistogramConfig::default().with_bins(0).validate().is_err());
        assert!(HistogramConfig::default().with_bins(MAX_BIN_COUNT).validate().is_ok());
        assert!(
            HistogramConfig::default()
                .with_bins(MAX_BIN_COUNT + 1)
                .validate()
                .is_err()
        );
        assert!(
            HistogramConfig::default()
                .with_color_scaler(f32::NAN)
                .validate()
                .is_err()
        );
        assert!(HistogramConfig::default().with_block([0, 8]).validate().is_err());
        assert!(HistogramConfig::default().with_block([32, 16]).validate().is_err());
    }

    #[test]
    fn policy_resolution() {
        assert_eq!(OutOfRangePolicy::Reject.resolve(2, 3), Some(2));
        assert_eq!(OutOfRangePolicy::Reject.resolve(3, 3), None);
        assert_eq!(OutOfRangePolicy::Clamp.resolve(-4, 3), Some(0));
        assert_eq!(OutOfRangePolicy::Clamp.resolve(17, 3), Some(2));
        assert_eq!(OutOfRangePolicy::Skip.resolve(-1, 3), None);
    }

    #[test]
    fn policy_parses_from_cli_text() {
        assert_eq!("Clamp".parse::<OutOfRangePolicy>().unwrap(), OutOfRangePolicy::Clamp);
        assert!("wrap".parse::<OutOfRangePolicy>().is_err());
    }
}

//! Launch geometry: how many workgroups of which shape cover a grid or a bin range.

use crate::error::{HistogramError, HistogramResult};

/// Workgroup shape (`block`) and dispatch size in workgroups (`grid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchGeometry {
    pub block: [u32; 2],
    pub grid: [u32; 2],
}

pub fn dispatch_size(elements: u32, workgroup: u32) -> u32 {
    if elements == 0 || workgroup == 0 {
        0
    } else {
        elements.div_ceil(workgroup)
    }
}

impl LaunchGeometry {
    /// 2D cover of a `width x height` grid. Edge workgroups may overhang the grid.
    pub fn for_grid(width: u32, height: u32, block: [u32; 2]) -> Self {
        Self {
            block,
            grid: [
                dispatch_size(width, block[0]),
                dispatch_size(height, block[1]),
            ],
        }
    }

    /// 1D cover of `bin_count` bins.
    pub fn for_bins(bin_count: u32, block_len: u32) -> Self {
        Self {
            block: [block_len, 1],
            grid: [dispatch_size(bin_count, block_len), 1],
        }
    }

    /// Invocations launched along each axis, overhang included.
    pub fn invocations(&self) -> [u64; 2] {
        [
            u64::from(self.block[0]) * u64::from(self.grid[0]),
            u64::from(self.block[1]) * u64::from(self.grid[1]),
        ]
    }

    /// True when at least one invocation lands on every cell of `width x height`.
    pub fn covers(&self, width: u32, height: u32) -> bool {
        let [ix, iy] = self.invocations();
        ix >= u64::from(width) && iy >= u64::from(height)
    }

    pub fn is_empty(&self) -> bool {
        self.grid[0] == 0 || self.grid[1] == 0
    }

    pub fn check_limits(&self, limits: &wgpu::Limits) -> HistogramResult<()> {
        let [bx, by] = self.block;
        if bx > limits.max_compute_workgroup_size_x || by > limits.max_compute_workgroup_size_y {
            return Err(HistogramError::InvalidLaunch(format!(
                "workgroup {bx}x{by} exceeds device maximum {}x{}",
                limits.max_compute_workgroup_size_x, limits.max_compute_workgroup_size_y
            )));
        }
        if bx.saturating_mul(by) > limits.max_compute_invocations_per_workgroup {
            return Err(HistogramError::InvalidLaunch(format!(
                "workgroup {bx}x{by} exceeds {} invocations",
                limits.max_compute_invocations_per_workgroup
            )));
        }
        let max_groups = limits.max_compute_workgroups_per_dimension;
        if self.grid[0] > max_groups || self.grid[1] > max_groups {
            return Err(HistogramError::InvalidLaunch(format!(
                "dispatch {}x{} exceeds {max_groups} workgroups per dimension",
                self.grid[0], self.grid[1]
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up_partial_blocks() {
        let geometry = LaunchGeometry::for_grid(17, 16, [16, 16]);
        assert_eq!(geometry.grid, [2, 1]);
        assert_eq!(geometry.invocations(), [32, 16]);
    }

    #[test]
    fn exact_multiples_do_not_overhang() {
        let geometry = LaunchGeometry::for_grid(64, 32, [16, 8]);
        assert_eq!(geometry.grid, [4, 4]);
        assert_eq!(geometry.invocations(), [64, 32]);
    }

    #[test]
    fn coverage_requires_every_cell() {
        assert!(LaunchGeometry::for_grid(17, 31, [16, 16]).covers(17, 31));
        let partial = LaunchGeometry {
            block: [16, 16],
            grid: [1, 1],
        };
        assert!(partial.covers(16, 16));
        assert!(!partial.covers(32, 32));
        assert!(!partial.covers(17, 1));
        assert!(LaunchGeometry::for_bins(65, 64).covers(65, 1));
    }

    #[test]
    fn bins_are_one_dimensional() {
        let geometry = LaunchGeometry::for_bins(256, 64);
        assert_eq!(geometry.block, [64, 1]);
        assert_eq!(geometry.grid, [4, 1]);
        assert_eq!(LaunchGeometry::for_bins(3, 64).grid, [1, 1]);
    }

    #[test]
    fn zero_extent_is_empty() {
        assert!(LaunchGeometry::for_grid(0, 5, [16, 16]).is_empty());
        assert_eq!(dispatch_size(0, 64), 0);
    }

    #[test]
    fn downlevel_limits_reject_oversized_dispatch() {
        let limits = wgpu::Limits::downlevel_defaults();
        assert!(LaunchGeometry::for_grid(1024, 1024, [16, 16]).check_limits(&limits).is_ok());

        let too_wide = LaunchGeometry {
            block: [1, 1],
            grid: [limits.max_compute_workgroups_per_dimension + 1, 1],
        };
        assert!(matches!(
            too_wide.check_limits(&limits),
            Err(HistogramError::InvalidLaunch(_))
        ));

        let too_fat = LaunchGeometry::for_grid(64, 64, [32, 32]);
        assert!(too_fat.check_limits(&limits).is_err());
    }
}

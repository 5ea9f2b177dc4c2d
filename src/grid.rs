use std::path::Path;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::{
    config::OutOfRangePolicy,
    error::{HistogramError, HistogramResult},
};

/// Row-major `width x height` grid of integer samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GridFile")]
pub struct Grid {
    width: u32,
    height: u32,
    samples: Vec<i32>,
}

#[derive(Deserialize)]
struct GridFile {
    width: u32,
    height: u32,
    samples: Vec<i32>,
}

impl TryFrom<GridFile> for Grid {
    type Error = HistogramError;

    fn try_from(file: GridFile) -> HistogramResult<Self> {
        Grid::new(file.width, file.height, file.samples)
    }
}

impl Grid {
    pub fn new(width: u32, height: u32, samples: Vec<i32>) -> HistogramResult<Self> {
        if width == 0 || height == 0 {
            return Err(HistogramError::EmptyGrid { width, height });
        }
        let cells = u64::from(width) * u64::from(height);
        if cells > u64::from(u32::MAX) {
            return Err(HistogramError::GridTooLarge {
                cells,
                limit: u64::from(u32::MAX),
            });
        }
        if samples.len() as u64 != cells {
            return Err(HistogramError::GridSizeMismatch {
                width,
                height,
                expected: cells,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    pub fn filled(width: u32, height: u32, value: i32) -> HistogramResult<Self> {
        let cells = u64::from(width) * u64::from(height);
        if cells > u64::from(u32::MAX) {
            return Err(HistogramError::GridTooLarge {
                cells,
                limit: u64::from(u32::MAX),
            });
        }
        Self::new(width, height, vec![value; cells as usize])
    }

    /// Samples are the 8-bit luma values, so they always fit 256 bins.
    pub fn from_luma(image: &image::GrayImage) -> HistogramResult<Self> {
        let samples = image.as_raw().iter().map(|&v| i32::from(v)).collect();
        Self::new(image.width(), image.height(), samples)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn samples(&self) -> &[i32] {
        &self.samples
    }

    /// Total sample count, the normalization denominator.
    pub fn cells(&self) -> u32 {
        // Bounded by `Grid::new`.
        self.samples.len() as u32
    }

    pub fn get(&self, x: u32, y: u32) -> Option<i32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.samples
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Host-side guard run before any device work under [`OutOfRangePolicy::Reject`].
    pub fn check_range(&self, bin_count: u32, policy: OutOfRangePolicy) -> HistogramResult<()> {
        if policy != OutOfRangePolicy::Reject {
            return Ok(());
        }
        let bad = self
            .samples
            .iter()
            .enumerate()
            .find(|&(_, &v)| v < 0 || v as u32 >= bin_count);
        match bad {
            Some((index, &value)) => Err(HistogramError::SampleOutOfRange {
                index,
                value,
                bin_count,
            }),
            None => Ok(()),
        }
    }
}

/// Load a grid from `*.json` (`{ "width", "height", "samples" }`) or from any
/// image format `image` can decode, converted to 8-bit luma.
pub fn load_grid_from_path(path: impl AsRef<Path>) -> Result<Grid> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read grid {}: {e}", path.display()))?;
        return serde_json::from_str(&text)
            .map_err(|e| anyhow!("invalid grid json in {}: {e}", path.display()));
    }

    let image = image::open(path)
        .map_err(|e| anyhow!("failed to decode grid image {}: {e}", path.display()))?;
    Ok(Grid::from_luma(&image.to_luma8())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_area() {
        let err = Grid::new(0, 4, Vec::new()).unwrap_err();
        assert!(matches!(err, HistogramError::EmptyGrid { width: 0, height: 4 }));
    }

    #[test]
    fn rejects_sample_count_mismatch() {
        let err = Grid::new(2, 2, vec![0, 1, 2]).unwrap_err();
        assert!(matches!(
            err,
            HistogramError::GridSizeMismatch {
                expected: 4,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn row_major_lookup() {
        let grid = Grid::new(3, 2, vec![0, 1, 2, 3, 4, 5]).unwrap();
        assert_eq!(grid.get(2, 0), Some(2));
        assert_eq!(grid.get(0, 1), Some(3));
        assert_eq!(grid.get(3, 0), None);
        assert_eq!(grid.cells(), 6);
    }

    #[test]
    fn reject_policy_reports_first_bad_sample() {
        let grid = Grid::new(2, 2, vec![0, 5, -1, 1]).unwrap();
        let err = grid.check_range(3, OutOfRangePolicy::Reject).unwrap_err();
        assert!(matches!(
            err,
            HistogramError::SampleOutOfRange {
                index: 1,
                value: 5,
                bin_count: 3
            }
        ));
        assert!(grid.check_range(3, OutOfRangePolicy::Clamp).is_ok());
    }

    #[test]
    fn json_goes_through_validation() {
        let ok: Grid = serde_json::from_str(r#"{"width":2,"height":1,"samples":[4,7]}"#).unwrap();
        assert_eq!(ok.samples(), &[4, 7]);
        let bad = serde_json::from_str::<Grid>(r#"{"width":2,"height":2,"samples":[4,7]}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn luma_image_becomes_grid() {
        let image = image::GrayImage::from_raw(2, 2, vec![0, 255, 128, 128]).unwrap();
        let grid = Grid::from_luma(&image).unwrap();
        assert_eq!(grid.samples(), &[0, 255, 128, 128]);
        assert!(grid.check_range(256, OutOfRangePolicy::Reject).is_ok());
    }
}

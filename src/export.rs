use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::pipeline::HistogramOutput;

fn to_u8_channel(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Grayscale image of the per-cell density; values are clamped to `[0, 1]`.
pub fn density_image(output: &HistogramOutput) -> Result<image::GrayImage> {
    let density = output
        .density
        .as_ref()
        .ok_or_else(|| anyhow!("histogram output has no density field (colorize was off)"))?;
    let pixels = density.iter().copied().map(to_u8_channel).collect();
    image::GrayImage::from_raw(output.width, output.height, pixels).ok_or_else(|| {
        anyhow!(
            "density has {} values, expected {}x{}",
            density.len(),
            output.width,
            output.height
        )
    })
}

pub fn write_density_png(output: &HistogramOutput, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    density_image(output)?
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write density png {}", path.display()))
}

pub fn write_json(output: &HistogramOutput, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let text = serde_json::to_string_pretty(output)?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output_with_density(density: Option<Vec<f32>>) -> HistogramOutput {
        HistogramOutput {
            width: 2,
            height: 2,
            total: 4,
            counts: vec![1, 2, 1],
            finalized: vec![0.5, 1.0, 0.5],
            density,
        }
    }

    #[test]
    fn density_maps_to_clamped_luma() {
        let out = output_with_density(Some(vec![0.5, 1.0, 2.0, -1.0]));
        let image = density_image(&out).unwrap();
        assert_eq!(image.as_raw(), &vec![128, 255, 255, 0]);
    }

    #[test]
    fn missing_density_is_an_error() {
        assert!(density_image(&output_with_density(None)).is_err());
    }

    #[test]
    fn json_omits_absent_density() {
        let text = serde_json::to_string(&output_with_density(None)).unwrap();
        assert!(!text.contains("density"));
        assert!(text.contains(r#""finalized":[0.5,1.0,0.5]"#));
    }
}

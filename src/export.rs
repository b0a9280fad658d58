//! Grayscale PNG dumps of cascade slices for inspection.

use std::path::Path;

use image::{GrayImage, Luma};

use crate::error::{OceanError, Result};
use crate::sim::TextureBinding;

/// Value range of one exported slice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportRange {
    pub min: f32,
    pub max: f32,
}

/// Map `values` (row-major, `resolution` per side) to 8-bit gray, stretched
/// to their own range. A flat slice maps to mid-gray.
pub fn slice_to_image(values: &[f32], resolution: u32) -> Result<(GrayImage, ExportRange)> {
    let expected = resolution as usize * resolution as usize;
    if values.len() != expected {
        return Err(OceanError::Export(format!(
            "slice has {} texels, expected {}",
            values.len(),
            expected
        )));
    }

    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let range = if min <= max {
        ExportRange { min, max }
    } else {
        ExportRange { min: 0.0, max: 0.0 }
    };
    let span = range.max - range.min;

    let mut img = GrayImage::new(resolution, resolution);
    for (i, value) in values.iter().enumerate() {
        let t = if span > 0.0 && value.is_finite() {
            (value - range.min) / span
        } else {
            0.5
        };
        let gray = (t * 255.0).round().clamp(0.0, 255.0) as u8;
        let (x, y) = (i as u32 % resolution, i as u32 / resolution);
        img.put_pixel(x, y, Luma([gray]));
    }
    Ok((img, range))
}

/// Write one slice of a binding (height channel for vector data)
pub fn write_slice_png(binding: &TextureBinding, slice: usize, path: &Path) -> Result<ExportRange> {
    let stack = binding.stack();
    if slice >= stack.slice_count() {
        return Err(OceanError::Export(format!(
            "slice {} out of range (stack has {})",
            slice,
            stack.slice_count()
        )));
    }
    let (img, range) = slice_to_image(&binding.scalar_slice(slice), stack.resolution())?;
    img.save(path)?;
    Ok(range)
}

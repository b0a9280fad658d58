//! Cascade stack (LOD) configuration.

use crate::error::{OceanError, Result};

/// Upper bound on the number of cascades in a stack
pub const MAX_LOD_COUNT: usize = 15;

/// Smallest and largest supported texel resolution per cascade side
pub const MIN_RESOLUTION: u32 = 8;
pub const MAX_RESOLUTION: u32 = 512;

/// Cascade stack parameters
#[derive(Debug, Clone)]
pub struct LodSettings {
    /// Number of cascades `k` (slice 0 finest, slice k-1 coarsest)
    pub lod_count: usize,

    /// Texels per cascade side (power of two)
    pub resolution: u32,

    /// Smallest base scale in meters (power of two). Slice 0 covers 4x this.
    pub min_scale_m: f32,

    /// Largest base scale in meters (power of two), `None` for unbounded
    pub max_scale_m: Option<f32>,

    /// World-space altitude of the undisturbed sea surface (meters)
    pub sea_level_m: f32,
}

impl Default for LodSettings {
    fn default() -> Self {
        Self {
            lod_count: 7,
            resolution: 128,
            min_scale_m: 8.0,
            max_scale_m: Some(256.0),
            sea_level_m: 0.0,
        }
    }
}

impl LodSettings {
    pub fn with_lod_count(mut self, lod_count: usize) -> Self {
        self.lod_count = lod_count;
        self
    }

    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = resolution;
        self
    }

    /// Validate configuration (power-of-two sizes, cascade count bounds)
    pub fn validate(&self) -> Result<()> {
        if self.lod_count == 0 || self.lod_count > MAX_LOD_COUNT {
            return Err(OceanError::InvalidLodSettings(format!(
                "LOD count must be in 1..={}, got {}",
                MAX_LOD_COUNT, self.lod_count
            )));
        }
        if !self.resolution.is_power_of_two()
            || !(MIN_RESOLUTION..=MAX_RESOLUTION).contains(&self.resolution)
        {
            return Err(OceanError::InvalidLodSettings(format!(
                "Resolution must be a power of two in {}..={}, got {}",
                MIN_RESOLUTION, MAX_RESOLUTION, self.resolution
            )));
        }
        if !is_power_of_two_f32(self.min_scale_m) {
            return Err(OceanError::InvalidLodSettings(format!(
                "Minimum scale must be a positive power of two, got {}",
                self.min_scale_m
            )));
        }
        if let Some(max) = self.max_scale_m {
            if !is_power_of_two_f32(max) || max < self.min_scale_m {
                return Err(OceanError::InvalidLodSettings(format!(
                    "Maximum scale must be a power of two >= {}, got {}",
                    self.min_scale_m, max
                )));
            }
        }
        if !self.sea_level_m.is_finite() {
            return Err(OceanError::InvalidLodSettings(
                "Sea level must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// True for finite positive values that are an exact power of two
pub(crate) fn is_power_of_two_f32(value: f32) -> bool {
    value.is_finite() && value > 0.0 && value.log2().fract() == 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(LodSettings::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_resolution() {
        let settings = LodSettings::default().with_resolution(100);
        assert!(settings.validate().is_err());

        let settings = LodSettings::default().with_resolution(1024);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_lod_count() {
        assert!(LodSettings::default().with_lod_count(0).validate().is_err());
        assert!(LodSettings::default().with_lod_count(16).validate().is_err());
        assert!(LodSettings::default().with_lod_count(15).validate().is_ok());
    }

    #[test]
    fn test_scales_must_be_powers_of_two() {
        let mut settings = LodSettings::default();
        settings.min_scale_m = 6.0;
        assert!(settings.validate().is_err());

        let mut settings = LodSettings::default();
        settings.max_scale_m = Some(4.0);
        assert!(settings.validate().is_err());
    }
}

//! Wind and wave spectrum parameters.

use crate::error::{OceanError, Result};

/// Number of wavelength octaves the spectrum is authored in
pub const OCTAVE_COUNT: usize = 14;

/// Smallest authored wavelength is 2^SMALLEST_WL_POW_2 meters (0.0625 m)
pub const SMALLEST_WL_POW_2: i32 = -4;

/// Standard gravity (m/s²)
pub const DEFAULT_GRAVITY: f32 = 9.81;

/// Supported FFT resolutions (texels per side)
pub const MIN_FFT_RESOLUTION: u32 = 8;
pub const MAX_FFT_RESOLUTION: u32 = 512;

/// Spectrum generator inputs (wind model, looping, per-octave power)
#[derive(Debug, Clone)]
pub struct SpectrumSettings {
    /// Wind speed (m/s, > 0)
    pub wind_speed_mps: f32,

    /// Wind heading in degrees, 0 = +X, 90 = +Z
    pub wind_direction_deg: f32,

    /// Share of nearly isotropic energy (0 = all wind-driven, 1 = isotropic)
    pub turbulence: f32,

    /// Narrowness of the wind-facing lobe (0 = broad cos², 1 = very narrow)
    pub alignment: f32,

    /// Gravity used by the dispersion relation (m/s²)
    pub gravity_mps2: f32,

    /// Loop period (seconds). When set, every bin's angular frequency is
    /// rounded so a whole number of periods fits the loop.
    pub loop_period_s: Option<f32>,

    /// Power multiplier per octave (1 = Pierson-Moskowitz, 0 disables)
    pub octave_power: [f32; OCTAVE_COUNT],

    /// Horizontal displacement relative to vertical (dimensionless)
    pub choppiness: f32,

    /// Overall amplitude multiplier (dimensionless)
    pub amplitude_multiplier: f32,

    /// FFT resolution per wave slice (power of two, 8..=512)
    pub resolution: u32,

    /// Seed for the per-bin random draws
    pub seed: u64,
}

impl Default for SpectrumSettings {
    fn default() -> Self {
        Self {
            wind_speed_mps: 10.0,
            wind_direction_deg: 0.0,
            turbulence: 0.15,
            alignment: 0.0,
            gravity_mps2: DEFAULT_GRAVITY,
            loop_period_s: None,
            octave_power: [1.0; OCTAVE_COUNT],
            choppiness: 1.0,
            amplitude_multiplier: 1.0,
            resolution: 64,
            seed: 0,
        }
    }
}

impl SpectrumSettings {
    pub fn with_wind(mut self, speed_mps: f32, turbulence: f32, alignment: f32) -> Self {
        self.wind_speed_mps = speed_mps;
        self.turbulence = turbulence;
        self.alignment = alignment;
        self
    }

    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_loop_period(mut self, period_s: f32) -> Self {
        self.loop_period_s = Some(period_s);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Wind heading as a unit vector in the XZ plane
    pub fn wind_direction(&self) -> glam::Vec2 {
        let radians = self.wind_direction_deg.to_radians();
        glam::Vec2::new(radians.cos(), radians.sin())
    }

    /// Validate configuration (FFT size must be power of 2, ranges, etc.)
    pub fn validate(&self) -> Result<()> {
        if !(self.wind_speed_mps > 0.0 && self.wind_speed_mps.is_finite()) {
            return Err(OceanError::InvalidSpectrum(format!(
                "Wind speed must be > 0, got {}",
                self.wind_speed_mps
            )));
        }
        if !(0.0..=1.0).contains(&self.turbulence) {
            return Err(OceanError::InvalidSpectrum(format!(
                "Turbulence must be in [0, 1], got {}",
                self.turbulence
            )));
        }
        if !(0.0..=1.0).contains(&self.alignment) {
            return Err(OceanError::InvalidSpectrum(format!(
                "Alignment must be in [0, 1], got {}",
                self.alignment
            )));
        }
        if !(self.gravity_mps2 > 0.0 && self.gravity_mps2.is_finite()) {
            return Err(OceanError::InvalidSpectrum(format!(
                "Gravity must be > 0, got {}",
                self.gravity_mps2
            )));
        }
        if let Some(period) = self.loop_period_s {
            if !(period > 0.0 && period.is_finite()) {
                return Err(OceanError::InvalidSpectrum(format!(
                    "Loop period must be > 0, got {}",
                    period
                )));
            }
        }
        if self.octave_power.iter().any(|p| !(*p >= 0.0 && p.is_finite())) {
            return Err(OceanError::InvalidSpectrum(
                "Octave power multipliers must be finite and >= 0".to_string(),
            ));
        }
        if !self.resolution.is_power_of_two()
            || !(MIN_FFT_RESOLUTION..=MAX_FFT_RESOLUTION).contains(&self.resolution)
        {
            return Err(OceanError::InvalidSpectrum(format!(
                "FFT resolution must be a power of two in {}..={}, got {}",
                MIN_FFT_RESOLUTION, MAX_FFT_RESOLUTION, self.resolution
            )));
        }
        Ok(())
    }
}

/// Upper bound on explicit Gerstner components in one wave set
pub const MAX_GERSTNER_COMPONENTS: usize = 512;

/// Gerstner wave set drawn from a spectrum
#[derive(Debug, Clone)]
pub struct GerstnerSettings {
    /// Components drawn per enabled octave
    pub components_per_octave: u32,

    /// Horizontal displacement relative to vertical (dimensionless)
    pub chop: f32,
}

impl Default for GerstnerSettings {
    fn default() -> Self {
        Self {
            components_per_octave: 4,
            chop: 1.0,
        }
    }
}

impl GerstnerSettings {
    pub fn validate(&self) -> Result<()> {
        let total = self.components_per_octave as usize * OCTAVE_COUNT;
        if self.components_per_octave == 0 || total > MAX_GERSTNER_COMPONENTS {
            return Err(OceanError::InvalidSpectrum(format!(
                "Gerstner components per octave must be in 1..={}, got {}",
                MAX_GERSTNER_COMPONENTS / OCTAVE_COUNT,
                self.components_per_octave
            )));
        }
        if !(self.chop >= 0.0 && self.chop.is_finite()) {
            return Err(OceanError::InvalidSpectrum(format!(
                "Gerstner chop must be >= 0, got {}",
                self.chop
            )));
        }
        Ok(())
    }
}

//! Per-simulation tuning parameters.

use crate::error::{OceanError, Result};
use crate::sim::SimKind;

/// Shape combination (animated waves) parameters
#[derive(Debug, Clone)]
pub struct AnimatedWaveSettings {
    /// Advect wave content by the flow simulation
    pub flow_advection: bool,

    /// Period of the two-phase flow offset blend (seconds)
    pub flow_period_s: f32,
}

impl Default for AnimatedWaveSettings {
    fn default() -> Self {
        Self {
            flow_advection: true,
            flow_period_s: 1.0,
        }
    }
}

impl AnimatedWaveSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.flow_period_s > 0.0 && self.flow_period_s.is_finite()) {
            return Err(OceanError::simulation(
                SimKind::AnimatedWaves,
                format!("flow period must be > 0, got {}", self.flow_period_s),
            ));
        }
        Ok(())
    }
}

/// Dynamic wave (2D wave equation) solver parameters
#[derive(Debug, Clone)]
pub struct DynamicWaveSettings {
    /// Solver step rate (Hz); frame time is split into substeps at this rate
    pub simulation_frequency_hz: f32,

    /// Upper bound on substeps per tick
    pub max_substeps: u32,

    /// Velocity damping rate (1/s)
    pub damping: f32,

    /// Courant number C in (0, 1]; 1 is the 2D stability limit
    /// `speed = texel / (sqrt(2) dt)`
    pub courant_number: f32,

    /// Multiplier on gravity for the wave speed estimate
    pub gravity_multiplier: f32,

    /// Horizontal displacement from the height gradient (dimensionless)
    pub horiz_displace: f32,

    /// Clamp on horizontal displacement, in texels
    pub displace_clamp: f32,

    /// Attenuate waves where depth < half the slice's minimum wavelength
    pub attenuation_in_shallows: f32,
}

impl Default for DynamicWaveSettings {
    fn default() -> Self {
        Self {
            simulation_frequency_hz: 60.0,
            max_substeps: 8,
            damping: 0.05,
            courant_number: 0.7,
            gravity_multiplier: 1.0,
            horiz_displace: 3.0,
            displace_clamp: 0.3,
            attenuation_in_shallows: 0.95,
        }
    }
}

impl DynamicWaveSettings {
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(OceanError::simulation(SimKind::DynamicWaves, reason));
        if !(self.simulation_frequency_hz > 0.0 && self.simulation_frequency_hz.is_finite()) {
            return fail(format!(
                "simulation frequency must be > 0, got {}",
                self.simulation_frequency_hz
            ));
        }
        if self.max_substeps == 0 {
            return fail("at least one substep is required".to_string());
        }
        if !(self.courant_number > 0.0 && self.courant_number <= 1.0) {
            return fail(format!(
                "Courant number must be in (0, 1], got {}",
                self.courant_number
            ));
        }
        if !(self.damping >= 0.0) || !(self.gravity_multiplier > 0.0) {
            return fail("damping must be >= 0 and gravity multiplier > 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.attenuation_in_shallows) {
            return fail(format!(
                "shallow attenuation must be in [0, 1], got {}",
                self.attenuation_in_shallows
            ));
        }
        Ok(())
    }
}

/// Foam accumulation and decay parameters
#[derive(Debug, Clone)]
pub struct FoamSettings {
    /// Exponential fade rate (1/s)
    pub fade_rate: f32,

    /// Foam generated per second where waves fold (scale)
    pub wave_foam_strength: f32,

    /// Jacobian determinant below which waves generate foam
    pub wave_foam_coverage: f32,

    /// Depth (m) under which shoreline foam is generated
    pub shoreline_foam_max_depth_m: f32,

    /// Shoreline foam generated per second
    pub shoreline_foam_strength: f32,

    /// Upper clamp on the foam value
    pub max_foam: f32,
}

impl Default for FoamSettings {
    fn default() -> Self {
        Self {
            fade_rate: 0.8,
            wave_foam_strength: 1.0,
            wave_foam_coverage: 0.8,
            shoreline_foam_max_depth_m: 0.65,
            shoreline_foam_strength: 2.0,
            max_foam: 1.0,
        }
    }
}

impl FoamSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.fade_rate >= 0.0 && self.fade_rate.is_finite()) {
            return Err(OceanError::simulation(
                SimKind::Foam,
                format!("fade rate must be >= 0, got {}", self.fade_rate),
            ));
        }
        if !(self.max_foam > 0.0) {
            return Err(OceanError::simulation(
                SimKind::Foam,
                format!("max foam must be > 0, got {}", self.max_foam),
            ));
        }
        Ok(())
    }
}

/// Shadow temporal filter parameters
#[derive(Debug, Clone)]
pub struct ShadowSettings {
    /// Fraction of the new sample blended in per tick (0, 1]
    pub jitter_rate: f32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self { jitter_rate: 0.2 }
    }
}

impl ShadowSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.jitter_rate > 0.0 && self.jitter_rate <= 1.0) {
            return Err(OceanError::simulation(
                SimKind::Shadow,
                format!("jitter rate must be in (0, 1], got {}", self.jitter_rate),
            ));
        }
        Ok(())
    }
}

/// Point query parameters
#[derive(Debug, Clone)]
pub struct QuerySettings {
    /// Fixed-point iterations inverting the displacement map
    pub max_iterations: u32,

    /// Residual (meters) under which an inversion counts as converged
    pub tolerance_m: f32,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            max_iterations: 4,
            tolerance_m: 0.01,
        }
    }
}

impl QuerySettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 || !(self.tolerance_m > 0.0) {
            return Err(OceanError::simulation(
                SimKind::AnimatedWaves,
                format!(
                    "queries need >= 1 iteration and a positive tolerance, got {} and {}",
                    self.max_iterations, self.tolerance_m
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AnimatedWaveSettings::default().validate().is_ok());
        assert!(DynamicWaveSettings::default().validate().is_ok());
        assert!(FoamSettings::default().validate().is_ok());
        assert!(ShadowSettings::default().validate().is_ok());
        assert!(QuerySettings::default().validate().is_ok());
    }

    #[test]
    fn test_courant_above_one_rejected() {
        let mut settings = DynamicWaveSettings::default();
        settings.courant_number = 1.5;
        assert!(settings.validate().is_err());
    }
}

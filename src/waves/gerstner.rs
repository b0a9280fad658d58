//! Gerstner (trochoidal) wave summation in the spatial domain.
//!
//! Each component is a forward and a backward travelling trochoid sharing
//! wavelength and phase speed. Their weights `1 - r` and `r` give the same
//! standing-wave beating the FFT path shows, so both paths mix in one scene.

use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{OceanError, Result};
use crate::params::{
    GerstnerSettings, SpectrumSettings, DEFAULT_GRAVITY, MAX_GERSTNER_COMPONENTS, OCTAVE_COUNT,
};
use crate::spectrum::{dispersion, pierson_moskowitz, DirectionalSpread, WaveBand};

const SEED_SALT: u64 = 0x6765_7273_746E_6572;

/// One explicitly authored wave
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GerstnerComponent {
    /// Wavelength (meters, > 0)
    pub wavelength_m: f32,
    /// Crest height above rest (meters)
    pub amplitude_m: f32,
    /// Travel heading in degrees, 0 = +X, 90 = +Z
    pub direction_deg: f32,
    /// Phase offset (radians)
    pub phase_rad: f32,
    /// Horizontal displacement relative to amplitude
    pub chop: f32,
    /// Share of the backward travelling wave, in [0, 1]
    pub reverse_fraction: f32,
}

impl GerstnerComponent {
    pub fn new(wavelength_m: f32, amplitude_m: f32, direction_deg: f32) -> Self {
        Self {
            wavelength_m,
            amplitude_m,
            direction_deg,
            phase_rad: 0.0,
            chop: 1.0,
            reverse_fraction: 0.0,
        }
    }

    pub fn direction(&self) -> Vec2 {
        let radians = self.direction_deg.to_radians();
        Vec2::new(radians.cos(), radians.sin())
    }

    pub fn wavenumber(&self) -> f32 {
        TAU / self.wavelength_m
    }
}

/// A bounded set of Gerstner components
#[derive(Debug, Clone)]
pub struct GerstnerWaves {
    /// Contribution multiplier when combined with other sources
    pub weight: f32,
    components: Vec<GerstnerComponent>,
    gravity_mps2: f32,
    loop_period_s: Option<f32>,
    time_s: f32,
    valid: bool,
}

impl GerstnerWaves {
    pub fn new(components: Vec<GerstnerComponent>) -> Self {
        Self {
            weight: 1.0,
            components,
            gravity_mps2: DEFAULT_GRAVITY,
            loop_period_s: None,
            time_s: 0.0,
            valid: true,
        }
    }

    pub fn with_gravity(mut self, gravity_mps2: f32) -> Self {
        self.gravity_mps2 = gravity_mps2;
        self
    }

    pub fn with_loop_period(mut self, period_s: f32) -> Self {
        self.loop_period_s = Some(period_s);
        self
    }

    /// Draw `components_per_octave` components per enabled octave from the
    /// wind spectrum, deterministically from the spectrum seed
    pub fn from_spectrum(spectrum: &SpectrumSettings, settings: &GerstnerSettings) -> Result<Self> {
        spectrum.validate()?;
        settings.validate()?;

        let mut rng = ChaCha8Rng::seed_from_u64(spectrum.seed ^ SEED_SALT);
        let spread = DirectionalSpread::new(spectrum);
        let wind_deg = spectrum.wind_direction_deg;
        let g = spectrum.gravity_mps2;
        let per_octave = settings.components_per_octave as usize;

        let mut components = Vec::with_capacity(per_octave * OCTAVE_COUNT);
        for octave in 0..OCTAVE_COUNT {
            let power = spectrum.octave_power[octave];
            if power <= 0.0 {
                continue;
            }
            let band = WaveBand::for_wave_slice(octave);
            let min_wl = band.min_wavelength;
            let variance = octave_variance(min_wl, 2.0 * min_wl, g, spectrum.wind_speed_mps) * power;
            let amplitude =
                (2.0 * variance / per_octave as f32).sqrt() * spectrum.amplitude_multiplier;
            if amplitude <= 0.0 {
                continue;
            }

            for j in 0..per_octave {
                // Stratified in log wavelength across the octave
                let t = (j as f32 + rng.gen::<f32>()) / per_octave as f32;
                let offset = sample_axis_offset(&spread, wind_deg, &mut rng);
                let direction_deg = wind_deg + offset.to_degrees();
                let axis = Vec2::new(direction_deg.to_radians().cos(), direction_deg.to_radians().sin());

                let forward = spread.factor(axis);
                let backward = spread.factor(-axis);
                let reverse_fraction = if forward + backward > 0.0 {
                    backward / (forward + backward)
                } else {
                    0.0
                };

                components.push(GerstnerComponent {
                    wavelength_m: min_wl * 2f32.powf(t),
                    amplitude_m: amplitude,
                    direction_deg,
                    phase_rad: rng.gen::<f32>() * TAU,
                    chop: settings.chop * spectrum.choppiness,
                    reverse_fraction,
                });
            }
        }

        let mut waves = Self::new(components).with_gravity(g);
        waves.loop_period_s = spectrum.loop_period_s;
        Ok(waves)
    }

    pub fn validate(&self) -> Result<()> {
        if self.components.len() > MAX_GERSTNER_COMPONENTS {
            return Err(OceanError::InvalidSpectrum(format!(
                "At most {} Gerstner components are supported, got {}",
                MAX_GERSTNER_COMPONENTS,
                self.components.len()
            )));
        }
        if !(self.gravity_mps2 > 0.0 && self.gravity_mps2.is_finite()) {
            return Err(OceanError::InvalidSpectrum(format!(
                "Gravity must be > 0, got {}",
                self.gravity_mps2
            )));
        }
        for (i, c) in self.components.iter().enumerate() {
            let finite = c.amplitude_m.is_finite()
                && c.direction_deg.is_finite()
                && c.phase_rad.is_finite()
                && c.chop.is_finite();
            if !(c.wavelength_m > 0.0 && c.wavelength_m.is_finite()) || !finite {
                return Err(OceanError::InvalidSpectrum(format!(
                    "Gerstner component {} has a non-finite or non-positive parameter",
                    i
                )));
            }
            if !(0.0..=1.0).contains(&c.reverse_fraction) {
                return Err(OceanError::InvalidSpectrum(format!(
                    "Gerstner component {} reverse fraction must be in [0, 1], got {}",
                    i, c.reverse_fraction
                )));
            }
        }
        Ok(())
    }

    pub fn components(&self) -> &[GerstnerComponent] {
        &self.components
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    pub fn set_time(&mut self, time_s: f32) {
        self.time_s = time_s;
    }

    pub fn time(&self) -> f32 {
        self.time_s
    }

    /// Upper bound on |vertical displacement|
    pub fn amplitude_bound(&self) -> f32 {
        self.weight * self.components.iter().map(|c| c.amplitude_m.abs()).sum::<f32>()
    }

    /// Angular frequency of a component, loop-quantised if configured
    pub fn omega(&self, component: &GerstnerComponent) -> f32 {
        dispersion(component.wavenumber(), self.gravity_mps2, self.loop_period_s)
    }

    /// Summed displacement of the components whose wavelength lies in `band`
    pub fn displacement(&self, band: &WaveBand, world: Vec2) -> Vec3 {
        let mut total = Vec3::ZERO;
        for component in &self.components {
            if band.contains(component.wavelength_m) {
                total += self.component_displacement(component, world);
            }
        }
        total * self.weight
    }

    fn component_displacement(&self, c: &GerstnerComponent, world: Vec2) -> Vec3 {
        let k = c.wavenumber();
        let omega = self.omega(c);
        let dir = c.direction();
        let x = k * dir.dot(world);
        let temporal = omega * self.time_s - c.phase_rad;

        let r = c.reverse_fraction;
        let forward = trochoid(dir, x - temporal, c.amplitude_m, c.chop);
        let backward = trochoid(-dir, -x - temporal, c.amplitude_m, c.chop);
        forward * (1.0 - r) + backward * r
    }
}

/// Displacement of one trochoid travelling along `dir` at phase `theta`
fn trochoid(dir: Vec2, theta: f32, amplitude: f32, chop: f32) -> Vec3 {
    let (sin, cos) = theta.sin_cos();
    let horizontal = -dir * (chop * amplitude * sin);
    Vec3::new(horizontal.x, amplitude * cos, horizontal.y)
}

/// Height variance (m²) of wavelengths in `[min_wl, max_wl)`, integrating
/// the frequency spectrum over the matching band
fn octave_variance(min_wl: f32, max_wl: f32, gravity: f32, wind_speed: f32) -> f32 {
    const STEPS: usize = 64;
    let omega_lo = (gravity * TAU / max_wl).sqrt();
    let omega_hi = (gravity * TAU / min_wl).sqrt();
    let step = (omega_hi - omega_lo) / STEPS as f32;
    (0..STEPS)
        .map(|i| pierson_moskowitz(omega_lo + (i as f32 + 0.5) * step, gravity, wind_speed) * step)
        .sum()
}

/// Angle from the wind axis in [-pi/2, pi/2], drawn with density
/// proportional to the energy on both ends of the axis
fn sample_axis_offset(spread: &DirectionalSpread, wind_deg: f32, rng: &mut ChaCha8Rng) -> f32 {
    const ATTEMPTS: usize = 64;
    let wind = wind_deg.to_radians();
    let axis_energy = |offset: f32| {
        let dir = Vec2::new((wind + offset).cos(), (wind + offset).sin());
        spread.factor(dir) + spread.factor(-dir)
    };
    let peak = axis_energy(0.0);
    if peak <= 0.0 {
        return 0.0;
    }
    for _ in 0..ATTEMPTS {
        let offset = (rng.gen::<f32>() - 0.5) * PI;
        if rng.gen::<f32>() * peak <= axis_energy(offset) {
            return offset;
        }
    }
    0.0
}

//! Frequency-domain wave spectrum generation.
//!
//! Each wave slice is a tileable square patch whose FFT grid holds one
//! wavelength octave. Per bin the generator stores the initial amplitude
//! `h0(k)` and `conj(h0(-k))`, so time evolution is a per-bin complex
//! multiply instead of a regeneration.

pub mod cache;

use std::f32::consts::{PI, TAU};

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use rustfft::num_complex::Complex32;

use crate::cascade::MIN_TEXELS_PER_WAVE;
use crate::error::Result;
use crate::params::{SpectrumSettings, OCTAVE_COUNT, SMALLEST_WL_POW_2};

pub use cache::SpectrumCache;

/// One wave slice per authored octave
pub const WAVE_SLICE_COUNT: usize = OCTAVE_COUNT;

/// Wavenumbers below this are treated as zero
pub const WAVENUMBER_EPSILON: f32 = 1e-6;

/// Range of wavelengths owned by one wave slice (or one LOD slice)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveBand {
    /// Inclusive lower bound (meters)
    pub min_wavelength: f32,
    /// Exclusive upper bound (meters), infinite for the coarsest slice
    pub max_wavelength: f32,
}

impl WaveBand {
    /// Octave `[2^(s-4), 2^(s-3))`; the last slice is open-ended
    pub fn for_wave_slice(slice: usize) -> Self {
        let min_wavelength = wave_slice_min_wavelength(slice);
        let max_wavelength = if slice + 1 >= WAVE_SLICE_COUNT {
            f32::INFINITY
        } else {
            2.0 * min_wavelength
        };
        Self {
            min_wavelength,
            max_wavelength,
        }
    }

    pub fn contains(&self, wavelength: f32) -> bool {
        wavelength >= self.min_wavelength && wavelength < self.max_wavelength
    }

    pub fn overlaps(&self, other: &WaveBand) -> bool {
        self.min_wavelength < other.max_wavelength && other.min_wavelength < self.max_wavelength
    }
}

/// Shortest wavelength owned by wave slice `slice`
pub fn wave_slice_min_wavelength(slice: usize) -> f32 {
    2f32.powi(SMALLEST_WL_POW_2 + slice as i32)
}

/// Wave slice whose band holds `wavelength`, `None` below the smallest octave
pub fn wave_slice_for_wavelength(wavelength: f32) -> Option<usize> {
    if !(wavelength > 0.0) {
        return None;
    }
    let mut octave = wavelength.log2().floor() as i32 - SMALLEST_WL_POW_2;
    // log2 can round across a power of two; settle on the exact band edges
    if octave >= 0 && wavelength < wave_slice_min_wavelength(octave as usize) {
        octave -= 1;
    } else if octave >= -1 && wavelength >= 2f32.powi(SMALLEST_WL_POW_2 + octave + 1) {
        octave += 1;
    }
    if octave < 0 {
        None
    } else {
        Some((octave as usize).min(WAVE_SLICE_COUNT - 1))
    }
}

/// World size of a wave slice's tileable patch (meters)
pub fn wave_slice_patch_size(slice: usize, resolution: usize) -> f32 {
    wave_slice_min_wavelength(slice) * resolution as f32 / MIN_TEXELS_PER_WAVE
}

/// Deep-water dispersion `omega = sqrt(g k)`, optionally quantised so an
/// integer number of periods fits `loop_period_s`
pub fn dispersion(wavenumber: f32, gravity: f32, loop_period_s: Option<f32>) -> f32 {
    let omega = (gravity * wavenumber.max(0.0)).sqrt();
    match loop_period_s {
        Some(period) if period > 0.0 => {
            let base = TAU / period;
            (omega / base).round() * base
        }
        _ => omega,
    }
}

/// Pierson-Moskowitz frequency spectrum S(omega) (m²·s)
pub fn pierson_moskowitz(omega: f32, gravity: f32, wind_speed: f32) -> f32 {
    if omega <= 0.0 || wind_speed <= 0.0 {
        return 0.0;
    }
    let omega_peak = 0.87 * gravity / wind_speed;
    8.1e-3 * gravity * gravity / omega.powi(5) * (-1.25 * (omega_peak / omega).powi(4)).exp()
}

/// Directional spreading blended between a wind-facing cosine-power lobe
/// and an isotropic floor; integrates to 1 over the full circle.
#[derive(Debug, Clone, Copy)]
pub struct DirectionalSpread {
    wind: Vec2,
    power: f32,
    normalisation: f32,
    turbulence: f32,
}

impl DirectionalSpread {
    pub fn new(settings: &SpectrumSettings) -> Self {
        let power = 2.0 + 30.0 * settings.alignment;
        Self {
            wind: settings.wind_direction(),
            power,
            normalisation: 1.0 / cosine_power_integral(power),
            turbulence: settings.turbulence,
        }
    }

    /// Spreading factor for a wave travelling along `direction` (unit)
    pub fn factor(&self, direction: Vec2) -> f32 {
        let cos_theta = direction.dot(self.wind).max(0.0);
        let aligned = self.normalisation * cos_theta.powf(self.power);
        let isotropic = 1.0 / TAU;
        aligned + (isotropic - aligned) * self.turbulence
    }
}

/// ∫ cos^p over [-pi/2, pi/2], midpoint rule
fn cosine_power_integral(power: f32) -> f32 {
    const STEPS: usize = 512;
    let step = PI / STEPS as f32;
    (0..STEPS)
        .map(|i| {
            let theta = -0.5 * PI + (i as f32 + 0.5) * step;
            theta.cos().max(0.0).powf(power) * step
        })
        .sum()
}

/// Stateless 64-bit mix of the bin identity into an RNG seed
fn bin_seed(seed: u64, slice: usize, x: usize, y: usize) -> u64 {
    let mut h = seed ^ 0x9E37_79B9_7F4A_7C15;
    for v in [slice as u64, x as u64, y as u64] {
        h ^= v.wrapping_add(0x9E37_79B9_7F4A_7C15).wrapping_add(h << 6).wrapping_add(h >> 2);
        // splitmix64 finaliser
        h = (h ^ (h >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        h = (h ^ (h >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        h ^= h >> 31;
    }
    h
}

/// Complex standard Gaussian draw (Box-Muller) for one bin
fn gaussian_pair(seed: u64) -> Complex32 {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let u1: f32 = 1.0 - rng.gen::<f32>();
    let u2: f32 = rng.gen::<f32>();
    let r = (-2.0 * u1.ln()).sqrt();
    Complex32::new(r * (TAU * u2).cos(), r * (TAU * u2).sin())
}

/// Cached initial condition for one bin
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpectrumTexel {
    /// h0(k)
    pub h0: Complex32,
    /// conj(h0(-k))
    pub h0_minus_conj: Complex32,
    /// Angular frequency (rad/s)
    pub omega: f32,
}

/// Frequency-domain initial conditions for every wave slice
#[derive(Debug, Clone)]
pub struct WaveSpectrum {
    settings: SpectrumSettings,
    resolution: usize,
    slices: Vec<Vec<SpectrumTexel>>,
    amplitude_bound: f32,
}

impl WaveSpectrum {
    /// Generate all wave slices for `settings`
    pub fn generate(settings: &SpectrumSettings) -> Result<Self> {
        settings.validate()?;
        let n = settings.resolution as usize;

        let slices: Vec<Vec<SpectrumTexel>> = (0..WAVE_SLICE_COUNT)
            .into_par_iter()
            .map(|slice| generate_slice(settings, slice, n))
            .collect();

        let amplitude_bound: f32 = slices
            .iter()
            .flatten()
            .map(|t| t.h0.norm() + t.h0_minus_conj.norm())
            .sum();

        Ok(Self {
            settings: settings.clone(),
            resolution: n,
            slices,
            amplitude_bound,
        })
    }

    pub fn settings(&self) -> &SpectrumSettings {
        &self.settings
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }

    pub fn slice(&self, slice: usize) -> &[SpectrumTexel] {
        &self.slices[slice]
    }

    pub fn patch_size(&self, slice: usize) -> f32 {
        wave_slice_patch_size(slice, self.resolution)
    }

    /// Wavenumber of bin (x, y); bins are centred so index N/2 is k = 0
    pub fn wavenumber(&self, slice: usize, x: usize, y: usize) -> Vec2 {
        bin_wavenumber(self.patch_size(slice), self.resolution, x, y)
    }

    /// Upper bound on |height| anywhere: sum of all bin amplitudes
    pub fn amplitude_bound(&self) -> f32 {
        self.amplitude_bound
    }

    /// Height variance (m²) summed over every slice
    pub fn height_variance(&self) -> f32 {
        self.slices
            .iter()
            .flatten()
            .map(|t| t.h0.norm_sqr() + t.h0_minus_conj.norm_sqr())
            .sum()
    }

    /// `h(k, t) = h0 e^{-i omega t} + conj(h0(-k)) e^{i omega t}` per bin,
    /// so the energy drawn for direction `k` travels along `k`
    pub fn evolve_slice(&self, slice: usize, time_s: f32, out: &mut [Complex32]) {
        for (texel, h) in self.slices[slice].iter().zip(out.iter_mut()) {
            let phase = Complex32::from_polar(1.0, texel.omega * time_s);
            *h = texel.h0 * phase.conj() + texel.h0_minus_conj * phase;
        }
    }
}

fn bin_wavenumber(patch_size: f32, n: usize, x: usize, y: usize) -> Vec2 {
    let half = (n / 2) as f32;
    Vec2::new(x as f32 - half, y as f32 - half) * (TAU / patch_size)
}

fn generate_slice(settings: &SpectrumSettings, slice: usize, n: usize) -> Vec<SpectrumTexel> {
    let patch = wave_slice_patch_size(slice, n);
    let band = WaveBand::for_wave_slice(slice);
    let spread = DirectionalSpread::new(settings);
    let dk = TAU / patch;
    let g = settings.gravity_mps2;

    let h0: Vec<Complex32> = (0..n * n)
        .map(|i| {
            let (x, y) = (i % n, i / n);
            let k = bin_wavenumber(patch, n, x, y);
            let k_mag = k.length();
            if k_mag < WAVENUMBER_EPSILON {
                return Complex32::new(0.0, 0.0);
            }
            let wavelength = TAU / k_mag;
            if !band.contains(wavelength) {
                return Complex32::new(0.0, 0.0);
            }
            let octave_power = wave_slice_for_wavelength(wavelength)
                .map(|o| settings.octave_power[o])
                .unwrap_or(0.0);
            if octave_power <= 0.0 {
                return Complex32::new(0.0, 0.0);
            }

            // S(k) dk = S(omega) d(omega), spread over direction per unit k
            let omega = (g * k_mag).sqrt();
            let s_omega = pierson_moskowitz(omega, g, settings.wind_speed_mps);
            let s_k = s_omega * g / (2.0 * omega) / k_mag * spread.factor(k / k_mag);
            let variance = s_k * dk * dk * octave_power;

            let amplitude = 0.5 * variance.max(0.0).sqrt() * settings.amplitude_multiplier;
            gaussian_pair(bin_seed(settings.seed, slice, x, y)) * amplitude
        })
        .collect();

    (0..n * n)
        .map(|i| {
            let (x, y) = (i % n, i / n);
            let mirrored = ((n - y) % n) * n + (n - x) % n;
            let k_mag = bin_wavenumber(patch, n, x, y).length();
            SpectrumTexel {
                h0: h0[i],
                h0_minus_conj: h0[mirrored].conj(),
                omega: dispersion(k_mag, g, settings.loop_period_s),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_settings() -> SpectrumSettings {
        SpectrumSettings::default().with_resolution(16)
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = WaveSpectrum::generate(&small_settings()).unwrap();
        let b = WaveSpectrum::generate(&small_settings()).unwrap();
        for slice in 0..WAVE_SLICE_COUNT {
            for (ta, tb) in a.slice(slice).iter().zip(b.slice(slice)) {
                assert_eq!(ta.h0.re.to_bits(), tb.h0.re.to_bits());
                assert_eq!(ta.h0.im.to_bits(), tb.h0.im.to_bits());
                assert_eq!(ta.h0_minus_conj, tb.h0_minus_conj);
            }
        }
    }

    #[test]
    fn test_bin_draw_follows_chacha8_stream() {
        for seed in [0u64, 1, 0xDEAD_BEEF, u64::MAX] {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let u1: f32 = 1.0 - rng.gen::<f32>();
            let u2: f32 = rng.gen::<f32>();
            let r = (-2.0 * u1.ln()).sqrt();
            let expected = Complex32::new(r * (TAU * u2).cos(), r * (TAU * u2).sin());
            assert_eq!(gaussian_pair(seed), expected);
            assert_eq!(gaussian_pair(seed), gaussian_pair(seed));
        }
    }

    #[test]
    fn test_seed_changes_phases() {
        let a = WaveSpectrum::generate(&small_settings()).unwrap();
        let b = WaveSpectrum::generate(&small_settings().with_seed(7)).unwrap();
        let differs = (0..WAVE_SLICE_COUNT).any(|s| a.slice(s) != b.slice(s));
        assert!(differs);
    }

    #[test]
    fn test_bins_outside_band_are_zero() {
        let spectrum = WaveSpectrum::generate(&small_settings()).unwrap();
        for slice in 0..WAVE_SLICE_COUNT {
            let band = WaveBand::for_wave_slice(slice);
            let n = spectrum.resolution();
            for y in 0..n {
                for x in 0..n {
                    let k = spectrum.wavenumber(slice, x, y).length();
                    let texel = spectrum.slice(slice)[y * n + x];
                    if k < WAVENUMBER_EPSILON || !band.contains(TAU / k) {
                        assert_eq!(texel.h0, Complex32::new(0.0, 0.0));
                    }
                }
            }
        }
    }

    #[test]
    fn test_wave_bands_are_disjoint() {
        for a in 0..WAVE_SLICE_COUNT {
            for b in (a + 1)..WAVE_SLICE_COUNT {
                assert!(!WaveBand::for_wave_slice(a).overlaps(&WaveBand::for_wave_slice(b)));
            }
        }
        // Every wavelength above the smallest lands in exactly one band
        for i in 0..2000 {
            let wavelength = 0.0625 * 1.01f32.powi(i);
            let owners = (0..WAVE_SLICE_COUNT)
                .filter(|s| WaveBand::for_wave_slice(*s).contains(wavelength))
                .count();
            assert_eq!(owners, 1, "wavelength {}", wavelength);
            assert!(WaveBand::for_wave_slice(wave_slice_for_wavelength(wavelength).unwrap())
                .contains(wavelength));
        }
    }

    #[test]
    fn test_loop_period_quantises_omega() {
        let period = 10.0;
        for k in [0.01f32, 0.3, 1.7, 25.0] {
            let omega = dispersion(k, 9.81, Some(period));
            let cycles = omega * period / TAU;
            assert!((cycles - cycles.round()).abs() < 1e-3);
        }
    }

    #[test]
    fn test_looping_spectrum_repeats() {
        let settings = small_settings().with_loop_period(8.0);
        let spectrum = WaveSpectrum::generate(&settings).unwrap();
        let n = spectrum.resolution();
        let mut a = vec![Complex32::new(0.0, 0.0); n * n];
        let mut b = a.clone();
        spectrum.evolve_slice(9, 1.25, &mut a);
        spectrum.evolve_slice(9, 9.25, &mut b);
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).norm() < 1e-3 * (1.0 + x.norm()));
        }
    }

    #[test]
    fn test_spread_integrates_to_one() {
        for (turbulence, alignment) in [(0.0, 0.0), (0.15, 0.0), (0.5, 0.7), (1.0, 1.0)] {
            let settings = SpectrumSettings::default().with_wind(10.0, turbulence, alignment);
            let spread = DirectionalSpread::new(&settings);
            let steps = 4096;
            let total: f32 = (0..steps)
                .map(|i| {
                    let theta = (i as f32 + 0.5) / steps as f32 * TAU;
                    spread.factor(Vec2::new(theta.cos(), theta.sin())) * TAU / steps as f32
                })
                .sum();
            assert!((total - 1.0).abs() < 0.01, "total {}", total);
        }
    }

    #[test]
    fn test_aligned_spectrum_favours_wind_direction() {
        let settings = SpectrumSettings::default().with_wind(10.0, 0.0, 1.0);
        let spread = DirectionalSpread::new(&settings);
        assert!(spread.factor(Vec2::X) > 1.0);
        assert_eq!(spread.factor(-Vec2::X), 0.0);
    }

    #[test]
    fn test_disabled_octave_is_empty() {
        let mut settings = small_settings();
        settings.octave_power[10] = 0.0;
        let spectrum = WaveSpectrum::generate(&settings).unwrap();
        assert!(spectrum.slice(10).iter().all(|t| t.h0.norm() == 0.0));
        assert!(spectrum.amplitude_bound() > 0.0);
    }

    #[test]
    fn test_pierson_moskowitz_peaks_near_peak_frequency() {
        let g = 9.81;
        let wind = 10.0;
        let peak = 0.87 * g / wind;
        let at_peak = pierson_moskowitz(peak * 1.05, g, wind);
        assert!(at_peak > pierson_moskowitz(peak * 0.5, g, wind));
        assert!(at_peak > pierson_moskowitz(peak * 3.0, g, wind));
    }
}

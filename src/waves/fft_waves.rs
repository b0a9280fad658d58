//! FFT wave source: evolves a cached spectrum and synthesises tileable
//! displacement patches, one per wave slice.

use std::sync::Arc;

use glam::{Vec2, Vec3};
use rayon::prelude::*;
use rustfft::num_complex::Complex32;

use crate::cascade::texture::bilinear_wrapped;
use crate::error::Result;
use crate::fft::Fft2d;
use crate::params::SpectrumSettings;
use crate::spectrum::{SpectrumCache, WaveBand, WaveSpectrum, WAVENUMBER_EPSILON, WAVE_SLICE_COUNT};

/// Height, x and z displacement per texel
const CHANNELS: usize = 3;

/// Spectrum-driven wave source
#[derive(Debug)]
pub struct FftWaves {
    /// Contribution multiplier when combined with other sources
    pub weight: f32,
    settings: SpectrumSettings,
    spectrum: Option<Arc<WaveSpectrum>>,
    fft: Option<Fft2d>,
    /// Periodic displacement patch per wave slice, empty when not synthesised
    patches: Vec<Vec<Vec3>>,
    /// Wave slices with any non-zero bin
    active: [bool; WAVE_SLICE_COUNT],
    time_s: f32,
    valid: bool,
}

impl FftWaves {
    pub fn new(settings: SpectrumSettings) -> Self {
        Self {
            weight: 1.0,
            settings,
            spectrum: None,
            fft: None,
            patches: vec![Vec::new(); WAVE_SLICE_COUNT],
            active: [false; WAVE_SLICE_COUNT],
            time_s: 0.0,
            valid: true,
        }
    }

    pub fn settings(&self) -> &SpectrumSettings {
        &self.settings
    }

    /// Replace the spectrum parameters; takes effect on the next `prepare`
    pub fn set_settings(&mut self, settings: SpectrumSettings) {
        self.settings = settings;
    }

    pub fn spectrum(&self) -> Option<&Arc<WaveSpectrum>> {
        self.spectrum.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    pub fn resolution(&self) -> usize {
        self.settings.resolution as usize
    }

    /// Acquire the spectrum for the current settings from `cache`.
    ///
    /// The previous spectrum is released only after the new one is held,
    /// so the cache can retire it at the end of the tick.
    pub fn prepare(&mut self, cache: &mut SpectrumCache) -> Result<()> {
        let spectrum = cache.acquire(&self.settings)?;
        let unchanged = self
            .spectrum
            .as_ref()
            .map(|current| Arc::ptr_eq(current, &spectrum))
            .unwrap_or(false);
        if unchanged {
            return Ok(());
        }

        let n = spectrum.resolution();
        if self.fft.as_ref().map(|f| f.size()) != Some(n) {
            self.fft = Some(Fft2d::new(n)?);
        }
        for slice in 0..WAVE_SLICE_COUNT {
            self.active[slice] = spectrum
                .slice(slice)
                .iter()
                .any(|t| t.h0.norm_sqr() > 0.0 || t.h0_minus_conj.norm_sqr() > 0.0);
        }
        self.spectrum = Some(spectrum);
        Ok(())
    }

    /// Synthesise every wave slice at `time_s` whose band is at least
    /// `finest_wavelength` (finer slices cannot be represented by any LOD)
    pub fn update(&mut self, time_s: f32, finest_wavelength: f32) {
        self.time_s = time_s;
        let (spectrum, fft) = match (&self.spectrum, &self.fft) {
            (Some(spectrum), Some(fft)) => (spectrum, fft),
            _ => return,
        };
        let choppiness = self.settings.choppiness;
        let active = self.active;

        self.patches
            .par_iter_mut()
            .enumerate()
            .for_each(|(slice, patch)| {
                let band = WaveBand::for_wave_slice(slice);
                if !active[slice] || band.max_wavelength <= finest_wavelength {
                    patch.clear();
                    return;
                }
                synthesise_slice(spectrum, fft, slice, time_s, choppiness, patch);
            });
    }

    pub fn time(&self) -> f32 {
        self.time_s
    }

    /// Synthesised patch of one wave slice, empty if skipped
    pub fn patch(&self, slice: usize) -> &[Vec3] {
        &self.patches[slice]
    }

    /// Periodic bilinear sample of one wave slice at a world position
    pub fn sample_slice(&self, slice: usize, world: Vec2) -> Vec3 {
        let patch = &self.patches[slice];
        if patch.is_empty() {
            return Vec3::ZERO;
        }
        let n = self.resolution();
        let size = crate::spectrum::wave_slice_patch_size(slice, n);
        // Sample x sits at x * size / n; texel i spans [i, i + 1)
        let coord = world / size * n as f32 + 0.5;
        bilinear_wrapped(patch, n, coord)
    }

    /// Wave slices whose minimum wavelength lies in `band`
    pub fn slices_in_band(band: &WaveBand) -> impl Iterator<Item = usize> + '_ {
        (0..WAVE_SLICE_COUNT).filter(move |s| band.contains(WaveBand::for_wave_slice(*s).min_wavelength))
    }

    pub fn displacement(&self, band: &WaveBand, world: Vec2) -> Vec3 {
        Self::slices_in_band(band)
            .map(|slice| self.sample_slice(slice, world))
            .sum::<Vec3>()
            * self.weight
    }

    pub fn amplitude_bound(&self) -> f32 {
        self.spectrum
            .as_ref()
            .map(|s| s.amplitude_bound() * self.weight)
            .unwrap_or(0.0)
    }
}

/// Evolve one slice and run the shared three-channel inverse FFT
fn synthesise_slice(
    spectrum: &WaveSpectrum,
    fft: &Fft2d,
    slice: usize,
    time_s: f32,
    choppiness: f32,
    patch: &mut Vec<Vec3>,
) {
    let n = spectrum.resolution();
    let mut heights = vec![Complex32::default(); n * n];
    spectrum.evolve_slice(slice, time_s, &mut heights);

    let i = Complex32::new(0.0, 1.0);
    let mut channels = vec![Complex32::default(); n * n * CHANNELS];
    for (index, h) in heights.iter().enumerate() {
        let k = spectrum.wavenumber(slice, index % n, index / n);
        let k_len = k.length();
        let base = index * CHANNELS;
        channels[base] = *h;
        if k_len > WAVENUMBER_EPSILON {
            let horizontal = i * *h * choppiness;
            channels[base + 1] = horizontal * (k.x / k_len);
            channels[base + 2] = horizontal * (k.y / k_len);
        }
    }

    fft.inverse_channels(&mut channels, CHANNELS);

    patch.clear();
    patch.extend(
        channels
            .chunks_exact(CHANNELS)
            .map(|c| Vec3::new(c[1].re, c[0].re, c[2].re)),
    );
}

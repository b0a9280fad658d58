//! Wave sources feeding the shape combine.
//!
//! Both paths answer the same question: the displacement a source adds for
//! one wavelength band at a world position. Sharing the band partition is
//! what lets FFT and Gerstner content mix in one scene without double
//! counting.

pub mod fft_waves;
pub mod gerstner;

use glam::{Vec2, Vec3};

use crate::error::Result;
use crate::params::SpectrumSettings;
use crate::spectrum::{SpectrumCache, WaveBand};

pub use fft_waves::FftWaves;
pub use gerstner::{GerstnerComponent, GerstnerWaves};

/// A registered wave generator
#[derive(Debug)]
pub enum WaveSource {
    Fft(FftWaves),
    Gerstner(GerstnerWaves),
}

impl WaveSource {
    pub fn fft(settings: SpectrumSettings) -> Self {
        WaveSource::Fft(FftWaves::new(settings))
    }

    pub fn gerstner(waves: GerstnerWaves) -> Self {
        WaveSource::Gerstner(waves)
    }

    pub fn label(&self) -> &'static str {
        match self {
            WaveSource::Fft(_) => "FFT",
            WaveSource::Gerstner(_) => "Gerstner",
        }
    }

    pub fn weight(&self) -> f32 {
        match self {
            WaveSource::Fft(w) => w.weight,
            WaveSource::Gerstner(w) => w.weight,
        }
    }

    pub fn set_weight(&mut self, weight: f32) {
        match self {
            WaveSource::Fft(w) => w.weight = weight,
            WaveSource::Gerstner(w) => w.weight = weight,
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            WaveSource::Fft(w) => w.is_valid(),
            WaveSource::Gerstner(w) => w.is_valid(),
        }
    }

    /// Validate and acquire shared state. A failure disables the source.
    pub fn prepare(&mut self, cache: &mut SpectrumCache) -> Result<()> {
        let result = match self {
            WaveSource::Fft(w) => w.prepare(cache),
            WaveSource::Gerstner(w) => w.validate(),
        };
        self.set_valid(result.is_ok());
        result
    }

    fn set_valid(&mut self, valid: bool) {
        match self {
            WaveSource::Fft(w) => w.set_valid(valid),
            WaveSource::Gerstner(w) => w.set_valid(valid),
        }
    }

    /// Advance to `time_s`; bands shorter than `finest_wavelength` are skipped
    pub fn update(&mut self, time_s: f32, finest_wavelength: f32) {
        match self {
            WaveSource::Fft(w) => w.update(time_s, finest_wavelength),
            WaveSource::Gerstner(w) => w.set_time(time_s),
        }
    }

    /// Weighted displacement this source adds for `band` at `world`
    pub fn displacement(&self, band: &WaveBand, world: Vec2) -> Vec3 {
        if !self.is_valid() {
            return Vec3::ZERO;
        }
        match self {
            WaveSource::Fft(w) => w.displacement(band, world),
            WaveSource::Gerstner(w) => w.displacement(band, world),
        }
    }

    /// Upper bound on |vertical displacement| from this source
    pub fn amplitude_bound(&self) -> f32 {
        if !self.is_valid() {
            return 0.0;
        }
        match self {
            WaveSource::Fft(w) => w.amplitude_bound(),
            WaveSource::Gerstner(w) => w.amplitude_bound(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_source_contributes_nothing() {
        let mut cache = SpectrumCache::new();
        let mut source = WaveSource::gerstner(GerstnerWaves::new(vec![GerstnerComponent::new(
            0.0, 1.0, 0.0,
        )]));
        assert!(source.prepare(&mut cache).is_err());
        assert!(!source.is_valid());
        let band = WaveBand::for_wave_slice(5);
        assert_eq!(source.displacement(&band, Vec2::ZERO), Vec3::ZERO);
        assert_eq!(source.amplitude_bound(), 0.0);
    }

    #[test]
    fn test_invalid_spectrum_disables_fft_source() {
        let mut cache = SpectrumCache::new();
        let mut source = WaveSource::fft(SpectrumSettings::default().with_resolution(12));
        assert!(source.prepare(&mut cache).is_err());
        assert!(!source.is_valid());
    }

    #[test]
    fn test_fft_and_gerstner_share_bands() {
        // A band is owned by exactly one LOD slice for both paths
        let mut cache = SpectrumCache::new();
        let mut fft = WaveSource::fft(SpectrumSettings::default().with_resolution(8));
        fft.prepare(&mut cache).unwrap();
        fft.update(0.0, 0.0);

        let band = WaveBand {
            min_wavelength: 4.0,
            max_wavelength: 8.0,
        };
        let slices: Vec<usize> = FftWaves::slices_in_band(&band).collect();
        assert_eq!(slices, vec![6]);

        let gerstner = WaveSource::gerstner(GerstnerWaves::new(vec![
            GerstnerComponent::new(5.0, 0.2, 0.0),
            GerstnerComponent::new(9.0, 0.2, 0.0),
        ]));
        let d = gerstner.displacement(&band, Vec2::ZERO);
        assert!((d.y - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_weight_scales_contribution() {
        let mut source = WaveSource::gerstner(GerstnerWaves::new(vec![GerstnerComponent::new(
            5.0, 0.2, 0.0,
        )]));
        source.set_weight(0.5);
        let band = WaveBand::for_wave_slice(6);
        assert!((source.displacement(&band, Vec2::ZERO).y - 0.1).abs() < 1e-6);
    }
}

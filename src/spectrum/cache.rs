//! Lazily generated, reference-counted spectrum state.
//!
//! Generators are shared by parameter identity. An entry is retired only once
//! nothing outside the cache holds its `Arc`, so consumers still reading an
//! older spectrum are never disturbed by a regeneration.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};

use super::WaveSpectrum;
use crate::error::Result;
use crate::params::{SpectrumSettings, OCTAVE_COUNT};

/// Generations within `CHURN_WINDOW_TICKS` above which a warning is logged
pub const CHURN_WARN_THRESHOLD: usize = 8;
pub const CHURN_WINDOW_TICKS: u64 = 60;

/// Bit-exact identity of every parameter that changes `h0`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpectrumKey {
    wind_speed: u32,
    wind_direction: u32,
    turbulence: u32,
    alignment: u32,
    gravity: u32,
    loop_period: Option<u32>,
    octave_power: [u32; OCTAVE_COUNT],
    amplitude_multiplier: u32,
    resolution: u32,
    seed: u64,
}

impl SpectrumKey {
    pub fn new(settings: &SpectrumSettings) -> Self {
        Self {
            wind_speed: settings.wind_speed_mps.to_bits(),
            wind_direction: settings.wind_direction_deg.to_bits(),
            turbulence: settings.turbulence.to_bits(),
            alignment: settings.alignment.to_bits(),
            gravity: settings.gravity_mps2.to_bits(),
            loop_period: settings.loop_period_s.map(f32::to_bits),
            octave_power: settings.octave_power.map(f32::to_bits),
            amplitude_multiplier: settings.amplitude_multiplier.to_bits(),
            resolution: settings.resolution,
            seed: settings.seed,
        }
    }
}

/// Shared spectrum generators keyed by parameter identity
#[derive(Debug, Default)]
pub struct SpectrumCache {
    entries: HashMap<SpectrumKey, Arc<WaveSpectrum>>,
    tick: u64,
    window_start: u64,
    generated_in_window: usize,
    generated_total: usize,
}

impl SpectrumCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spectrum for `settings`, generated on first request
    pub fn acquire(&mut self, settings: &SpectrumSettings) -> Result<Arc<WaveSpectrum>> {
        let key = SpectrumKey::new(settings);
        if let Some(spectrum) = self.entries.get(&key) {
            return Ok(Arc::clone(spectrum));
        }

        let spectrum = Arc::new(WaveSpectrum::generate(settings)?);
        debug!(
            "Generated spectrum: wind {} m/s, resolution {}, {} cached",
            settings.wind_speed_mps,
            settings.resolution,
            self.entries.len() + 1
        );
        self.entries.insert(key, Arc::clone(&spectrum));
        self.note_generation();
        Ok(spectrum)
    }

    fn note_generation(&mut self) {
        self.generated_total += 1;
        self.generated_in_window += 1;
        if self.generated_in_window == CHURN_WARN_THRESHOLD + 1 {
            warn!(
                "{} spectra generated within {} ticks; varying spectrum parameters every tick is expensive",
                self.generated_in_window, CHURN_WINDOW_TICKS
            );
        }
    }

    /// Advance the churn window; called once per simulation tick
    pub fn begin_tick(&mut self) {
        self.tick += 1;
        if self.tick - self.window_start >= CHURN_WINDOW_TICKS {
            self.window_start = self.tick;
            self.generated_in_window = 0;
        }
    }

    /// Drop every entry no consumer references any more
    pub fn retire_unused(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, spectrum| Arc::strong_count(spectrum) > 1);
        let retired = before - self.entries.len();
        if retired > 0 {
            debug!("Retired {} unused spectra", retired);
        }
        retired
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spectra generated over the cache's lifetime
    pub fn generated_total(&self) -> usize {
        self.generated_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(wind: f32) -> SpectrumSettings {
        SpectrumSettings::default()
            .with_resolution(8)
            .with_wind(wind, 0.2, 0.3)
    }

    #[test]
    fn test_same_parameters_share_generator() {
        let mut cache = SpectrumCache::new();
        let a = cache.acquire(&settings(8.0)).unwrap();
        let b = cache.acquire(&settings(8.0)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.generated_total(), 1);
    }

    #[test]
    fn test_choppiness_does_not_regenerate() {
        let mut cache = SpectrumCache::new();
        let mut chop = settings(8.0);
        chop.choppiness = 0.3;
        let a = cache.acquire(&settings(8.0)).unwrap();
        let b = cache.acquire(&chop).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_retire_keeps_referenced_entries() {
        let mut cache = SpectrumCache::new();
        let old = cache.acquire(&settings(8.0)).unwrap();
        let new = cache.acquire(&settings(12.0)).unwrap();
        assert_eq!(cache.len(), 2);

        // Nothing retired while both are held
        assert_eq!(cache.retire_unused(), 0);

        drop(new);
        assert_eq!(cache.retire_unused(), 1);
        assert_eq!(cache.len(), 1);

        // The old generator is still intact for its holder
        assert_eq!(old.settings().wind_speed_mps, 8.0);
        drop(old);
        assert_eq!(cache.retire_unused(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut cache = SpectrumCache::new();
        assert!(cache.acquire(&settings(-1.0)).is_err());
        assert!(cache.is_empty());
    }
}

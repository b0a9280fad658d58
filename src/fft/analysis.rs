//! Measured spectral energy of a spatial field, per wavelength octave.
//!
//! Independent of the synthesis butterflies: uses rustfft, so it doubles as
//! a check on what the wave sources actually produce.

use std::f32::consts::{PI, TAU};

use rustfft::{num_complex::Complex, FftPlanner};

use crate::spectrum::{wave_slice_for_wavelength, wave_slice_min_wavelength, WAVE_SLICE_COUNT};

/// Window applied before analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Field is periodic over the patch (wave slice buffers)
    None,
    /// Field has hard edges (cascade slices)
    Hann,
}

/// Variance (m²) attributed to each wave-slice octave
#[derive(Debug, Clone, PartialEq)]
pub struct OctaveEnergy {
    pub bands: [f32; WAVE_SLICE_COUNT],
    /// Variance at wavelengths below the smallest octave
    pub unresolved: f32,
}

impl OctaveEnergy {
    pub fn total(&self) -> f32 {
        self.bands.iter().sum::<f32>() + self.unresolved
    }

    /// (min wavelength, variance) for every non-empty octave
    pub fn non_empty(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.bands
            .iter()
            .enumerate()
            .filter(|(_, e)| **e > 0.0)
            .map(|(slice, e)| (wave_slice_min_wavelength(slice), *e))
    }
}

/// Energy per octave of a square `size x size` field covering `patch_size_m`
pub fn octave_energy(field: &[f32], size: usize, patch_size_m: f32, window: Window) -> OctaveEnergy {
    let mut energy = OctaveEnergy {
        bands: [0.0; WAVE_SLICE_COUNT],
        unresolved: 0.0,
    };
    if size == 0 || field.len() != size * size {
        return energy;
    }

    let mean = field.iter().sum::<f32>() / field.len() as f32;
    let weights: Vec<f32> = (0..size)
        .map(|i| match window {
            Window::None => 1.0,
            Window::Hann => hann_window(i, size),
        })
        .collect();
    let window_power = {
        let mean_sq = weights.iter().map(|w| w * w).sum::<f32>() / size as f32;
        mean_sq * mean_sq
    };

    let mut data: Vec<Complex<f32>> = field
        .iter()
        .enumerate()
        .map(|(i, v)| Complex::new((v - mean) * weights[i % size] * weights[i / size], 0.0))
        .collect();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(size);
    for row in data.chunks_mut(size) {
        fft.process(row);
    }
    let mut column = vec![Complex::new(0.0, 0.0); size];
    for x in 0..size {
        for y in 0..size {
            column[y] = data[y * size + x];
        }
        fft.process(&mut column);
        for y in 0..size {
            data[y * size + x] = column[y];
        }
    }

    // Parseval: mean(f²) = sum |F|² / N⁴
    let norm = 1.0 / ((size * size) as f32).powi(2) / window_power;
    for y in 0..size {
        for x in 0..size {
            let fx = signed_bin(x, size);
            let fy = signed_bin(y, size);
            if fx == 0 && fy == 0 {
                continue;
            }
            let k = (TAU / patch_size_m) * ((fx * fx + fy * fy) as f32).sqrt();
            let power = data[y * size + x].norm_sqr() * norm;
            match wave_slice_for_wavelength(TAU / k) {
                Some(slice) => energy.bands[slice] += power,
                None => energy.unresolved += power,
            }
        }
    }
    energy
}

fn signed_bin(index: usize, size: usize) -> i64 {
    if index < size / 2 {
        index as i64
    } else {
        index as i64 - size as i64
    }
}

/// Hann window function for spectral analysis
pub fn hann_window(index: usize, size: usize) -> f32 {
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}

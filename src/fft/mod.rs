//! Radix-2 2D FFT for ocean synthesis.
//!
//! The butterfly network is described by a lookup table built once per
//! resolution: for every stage and output index it names the two inputs and
//! the twiddle factor, so a pass is a uniform `out[i] = in[a] + w * in[b]`.
//! Several channels stored interleaved share each table lookup.
//!
//! Spectra are centred (bin `N/2` is wavenumber zero), so spatial results
//! carry a `(-1)^(x+y)` checkerboard that is removed after the inverse.

pub mod analysis;

use std::f64::consts::TAU;

use rayon::prelude::*;
use rustfft::num_complex::Complex32;

use crate::error::{OceanError, Result};
use crate::params::{MAX_FFT_RESOLUTION, MIN_FFT_RESOLUTION};

/// One output of one butterfly stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Butterfly {
    pub a: u32,
    pub b: u32,
    /// Inverse-direction twiddle; the forward transform uses its conjugate
    pub twiddle: Complex32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Inverse,
}

/// Precomputed bit-reversal and twiddle lookups for one size
#[derive(Debug, Clone)]
pub struct ButterflyTable {
    size: usize,
    stages: Vec<Vec<Butterfly>>,
}

impl ButterflyTable {
    pub fn new(size: usize) -> Result<Self> {
        if !size.is_power_of_two()
            || size < MIN_FFT_RESOLUTION as usize
            || size > MAX_FFT_RESOLUTION as usize
        {
            return Err(OceanError::InvalidSpectrum(format!(
                "FFT size {} must be a power of two in {}..={}",
                size, MIN_FFT_RESOLUTION, MAX_FFT_RESOLUTION
            )));
        }

        let bits = size.trailing_zeros();
        let reverse = |i: usize| (i.reverse_bits() >> (usize::BITS - bits)) as u32;

        let stages = (0..bits)
            .map(|stage| {
                let block = 2usize << stage;
                let span = block / 2;
                (0..size)
                    .map(|i| {
                        let k = i % block;
                        let (a, b) = if k < span { (i, i + span) } else { (i - span, i) };
                        let angle = TAU * k as f64 / block as f64;
                        let twiddle = Complex32::new(angle.cos() as f32, angle.sin() as f32);
                        if stage == 0 {
                            Butterfly {
                                a: reverse(a),
                                b: reverse(b),
                                twiddle,
                            }
                        } else {
                            Butterfly {
                                a: a as u32,
                                b: b as u32,
                                twiddle,
                            }
                        }
                    })
                    .collect()
            })
            .collect();

        Ok(Self { size, stages })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage(&self, stage: usize) -> &[Butterfly] {
        &self.stages[stage]
    }

    /// Unnormalised 1D transform of one line of `channels` interleaved
    /// signals, ping-ponging with `scratch`
    pub fn process_line(
        &self,
        line: &mut [Complex32],
        scratch: &mut [Complex32],
        channels: usize,
        direction: Direction,
    ) {
        let mut latest_in_line = true;
        for butterflies in &self.stages {
            let (src, dst): (&[Complex32], &mut [Complex32]) = if latest_in_line {
                (&*line, &mut *scratch)
            } else {
                (&*scratch, &mut *line)
            };
            for (i, fly) in butterflies.iter().enumerate() {
                let w = match direction {
                    Direction::Inverse => fly.twiddle,
                    Direction::Forward => fly.twiddle.conj(),
                };
                let (a, b) = (fly.a as usize * channels, fly.b as usize * channels);
                for c in 0..channels {
                    dst[i * channels + c] = src[a + c] + w * src[b + c];
                }
            }
            latest_in_line = !latest_in_line;
        }
        if !latest_in_line {
            line.copy_from_slice(scratch);
        }
    }

    pub fn inverse_1d(&self, line: &mut [Complex32]) {
        let mut scratch = vec![Complex32::default(); line.len()];
        self.process_line(line, &mut scratch, 1, Direction::Inverse);
    }

    pub fn forward_1d(&self, line: &mut [Complex32]) {
        let mut scratch = vec![Complex32::default(); line.len()];
        self.process_line(line, &mut scratch, 1, Direction::Forward);
    }
}

/// Separable `N x N` transform over interleaved multi-channel fields
#[derive(Debug, Clone)]
pub struct Fft2d {
    table: ButterflyTable,
}

impl Fft2d {
    pub fn new(size: usize) -> Result<Self> {
        Ok(Self {
            table: ButterflyTable::new(size)?,
        })
    }

    pub fn size(&self) -> usize {
        self.table.size()
    }

    pub fn table(&self) -> &ButterflyTable {
        &self.table
    }

    /// Centred spectrum to spatial field, unnormalised.
    ///
    /// `data` holds `channels` values per texel, row-major.
    pub fn inverse_channels(&self, data: &mut [Complex32], channels: usize) {
        debug_assert_eq!(data.len(), self.size() * self.size() * channels);
        self.transform(data, channels, Direction::Inverse);
        apply_checkerboard(data, self.size(), channels);
    }

    pub fn inverse(&self, data: &mut [Complex32]) {
        self.inverse_channels(data, 1);
    }

    /// Spatial field to centred spectrum, divided by `N^2`
    pub fn forward(&self, data: &mut [Complex32]) {
        let n = self.size();
        apply_checkerboard(data, n, 1);
        self.transform(data, 1, Direction::Forward);
        let scale = 1.0 / (n * n) as f32;
        data.par_iter_mut().for_each(|v| *v *= scale);
    }

    fn transform(&self, data: &mut [Complex32], channels: usize, direction: Direction) {
        let n = self.size();
        self.rows(data, channels, direction);
        transpose(data, n, channels);
        self.rows(data, channels, direction);
        transpose(data, n, channels);
    }

    fn rows(&self, data: &mut [Complex32], channels: usize, direction: Direction) {
        let line = self.size() * channels;
        data.par_chunks_mut(line).for_each_init(
            || vec![Complex32::default(); line],
            |scratch, row| self.table.process_line(row, scratch, channels, direction),
        );
    }
}

/// Negate texels with odd `x + y`
pub fn apply_checkerboard(data: &mut [Complex32], size: usize, channels: usize) {
    data.par_chunks_mut(size * channels)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, texel) in row.chunks_mut(channels).enumerate() {
                if (x + y) % 2 == 1 {
                    for v in texel {
                        *v = -*v;
                    }
                }
            }
        });
}

fn transpose(data: &mut [Complex32], size: usize, channels: usize) {
    for y in 0..size {
        for x in (y + 1)..size {
            for c in 0..channels {
                data.swap((y * size + x) * channels + c, (x * size + y) * channels + c);
            }
        }
    }
}

//! Shape combine: builds each slice's full displacement from its own
//! octave band plus everything the coarser slices hold.

use std::sync::Arc;

use glam::{UVec2, Vec2, Vec3};
use rayon::prelude::*;

use super::inputs::{slice_for_wavelength, BoxedInput};
use super::{SurfaceFields, TickContext};
use crate::cascade::texture::{bilinear_clamped, FlipBuffer, SliceArray};
use crate::cascade::CascadeStack;
use crate::params::AnimatedWaveSettings;
use crate::spectrum::WaveBand;
use crate::waves::WaveSource;

/// Combined displacement per cascade
#[derive(Debug)]
pub struct AnimatedWaves {
    settings: AnimatedWaveSettings,
    data: FlipBuffer<Vec3>,
    valid: bool,
}

impl AnimatedWaves {
    pub fn new(stack: &CascadeStack, settings: AnimatedWaveSettings) -> Self {
        Self {
            settings,
            data: FlipBuffer::new(stack, Vec3::ZERO),
            valid: true,
        }
    }

    pub fn settings(&self) -> &AnimatedWaveSettings {
        &self.settings
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    pub fn displacement(&self) -> &Arc<SliceArray<Vec3>> {
        self.data.current()
    }

    /// Combine from the coarsest slice down, so each slice reads its
    /// coarser neighbour already complete
    pub fn update(&mut self, ctx: &TickContext, fields: &SurfaceFields, inputs: &[BoxedInput<Vec3>]) {
        let stack = ctx.stack;
        let count = stack.slice_count();
        // Un-targeted inputs land in the coarsest slice and reach every finer one
        let input_slices: Vec<usize> = inputs
            .iter()
            .map(|input| match input.wavelength_m() {
                Some(wavelength) => slice_for_wavelength(stack, wavelength),
                None => count.saturating_sub(1),
            })
            .collect();
        let advection = self.settings.flow_advection && fields.flow.is_some();
        let period = self.settings.flow_period_s;

        let (_, target) = self.data.advance(stack);
        let res = target.resolution();
        for slice in (0..count).rev() {
            let cascade = *stack.cascade(slice);
            let coarser_cascade = *stack.cascade(slice + 1);
            let band = stack.band(slice);
            let weight = stack.weight(slice);
            let (out, coarser) = target.slice_with_coarser_mut(slice);

            out.par_chunks_mut(res).enumerate().for_each(|(y, row)| {
                for (x, texel) in row.iter_mut().enumerate() {
                    let id = UVec2::new(x as u32, y as u32);
                    let world = cascade.id_to_world(id);

                    let own = if advection {
                        let flow = fields.flow_at(slice, id);
                        advected_band(ctx.sources, &band, world, flow, ctx.time_s, period)
                    } else {
                        band_displacement(ctx.sources, &band, world)
                    };
                    let mut value = own * weight + fields.dynamic_at(slice, id);

                    if let Some(coarser) = coarser {
                        let coord = coarser_cascade.world_to_texel(world);
                        value += bilinear_clamped(coarser, res, coord);
                    }

                    for (input, target_slice) in inputs.iter().zip(&input_slices) {
                        if *target_slice != slice {
                            continue;
                        }
                        if let Some(s) = input.sample(world, ctx.time_s) {
                            value = input.blend_mode().apply(value, s.value, s.weight.clamp(0.0, 1.0));
                        }
                    }

                    *texel = if value.is_finite() { value } else { Vec3::ZERO };
                }
            });
        }
    }

    pub fn destroy(&mut self) {
        self.data.release();
        self.valid = false;
    }
}

fn band_displacement(sources: &[WaveSource], band: &WaveBand, world: Vec2) -> Vec3 {
    sources.iter().map(|s| s.displacement(band, world)).sum()
}

/// Flow-advected band content: two samples offset along the flow by a
/// sawtooth phase half a period apart, each faded out as its offset resets
fn advected_band(sources: &[WaveSource], band: &WaveBand, world: Vec2, flow: Vec2, time_s: f32, period: f32) -> Vec3 {
    if flow == Vec2::ZERO {
        return band_displacement(sources, band, world);
    }
    let cycle = time_s / period;
    let phase0 = cycle.rem_euclid(1.0);
    let phase1 = (cycle + 0.5).rem_euclid(1.0);
    let weight0 = 1.0 - (2.0 * phase0 - 1.0).abs();
    let weight1 = 1.0 - weight0;

    let a = band_displacement(sources, band, world - flow * phase0 * period);
    let b = band_displacement(sources, band, world - flow * phase1 * period);
    a * weight0 + b * weight1
}

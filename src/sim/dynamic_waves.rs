//! Explicit finite-difference solver for the 2D wave equation, one grid per
//! cascade slice.
//!
//! State per texel is (height, vertical velocity). Each substep reads the
//! previous state through world positions, so origin snapping and scale
//! changes between ticks carry the simulation along instead of dragging it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::f32::consts::FRAC_1_SQRT_2;
use std::sync::Arc;

use glam::{Vec2, Vec3};
use log::debug;

use super::field::{signed_depth, upstream};
use super::inputs::{slice_for_wavelength, BoxedInput};
use super::SurfaceFields;
use crate::cascade::texture::{fetch_clamped, EdgePolicy, FlipBuffer, SliceArray};
use crate::cascade::CascadeStack;
use crate::params::DynamicWaveSettings;

/// Wave speed for a slice, limited so the explicit scheme stays stable.
///
/// The five-point Laplacian in 2D is stable up to `c dt / texel = 1/sqrt(2)`,
/// so a Courant number of 1 maps to that limit: `c <= courant * texel / (sqrt(2) dt)`
pub fn wave_speed(
    min_wavelength: f32,
    texel_size: f32,
    dt: f32,
    gravity: f32,
    settings: &DynamicWaveSettings,
) -> f32 {
    let physical = (gravity * min_wavelength / std::f32::consts::TAU).sqrt() * settings.gravity_multiplier;
    if dt <= 0.0 {
        return physical;
    }
    physical.min(settings.courant_number * FRAC_1_SQRT_2 * texel_size / dt)
}

/// Number of substeps and their length for a frame of `dt` seconds
pub fn substeps(dt: f32, settings: &DynamicWaveSettings) -> (u32, f32) {
    if !(dt > 0.0) {
        return (1, 0.0);
    }
    let count = (dt * settings.simulation_frequency_hz).ceil().max(1.0) as u32;
    let count = count.min(settings.max_substeps);
    (count, dt / count as f32)
}

/// Everything a substep reads besides the previous state
struct StepInputs<'a> {
    stack: &'a CascadeStack,
    fields: &'a SurfaceFields<'a>,
    inputs: &'a [BoxedInput<f32>],
    input_slices: &'a [usize],
    dt: f32,
    time_s: f32,
    sea_level_m: f32,
    gravity: f32,
}

/// Dynamic-wave state and its derived displacement
#[derive(Debug)]
pub struct DynamicWaves {
    settings: DynamicWaveSettings,
    /// (height, velocity)
    state: FlipBuffer<Vec2>,
    displacement: FlipBuffer<Vec3>,
    zeroed_last_tick: usize,
    valid: bool,
}

impl DynamicWaves {
    pub fn new(stack: &CascadeStack, settings: DynamicWaveSettings) -> Self {
        Self {
            settings,
            state: FlipBuffer::new(stack, Vec2::ZERO),
            displacement: FlipBuffer::new(stack, Vec3::ZERO),
            zeroed_last_tick: 0,
            valid: true,
        }
    }

    pub fn settings(&self) -> &DynamicWaveSettings {
        &self.settings
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    /// Latest (height, velocity) per texel
    pub fn state(&self) -> &Arc<SliceArray<Vec2>> {
        self.state.current()
    }

    /// Latest displacement derived from the height field
    pub fn displacement(&self) -> &Arc<SliceArray<Vec3>> {
        self.displacement.current()
    }

    /// Non-finite texels reset during the last tick
    pub fn zeroed_last_tick(&self) -> usize {
        self.zeroed_last_tick
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        stack: &CascadeStack,
        shift: i32,
        fields: &SurfaceFields,
        inputs: &[BoxedInput<f32>],
        dt: f32,
        time_s: f32,
        sea_level_m: f32,
        gravity: f32,
    ) {
        let (count, step_dt) = substeps(dt, &self.settings);
        let input_slices: Vec<usize> = inputs
            .iter()
            .map(|input| match input.wavelength_m() {
                Some(wavelength) => slice_for_wavelength(stack, wavelength),
                None => 0,
            })
            .collect();
        let step = StepInputs {
            stack,
            fields,
            inputs,
            input_slices: &input_slices,
            dt: step_dt,
            time_s,
            sea_level_m,
            gravity,
        };

        let zeroed = AtomicUsize::new(0);
        for substep in 0..count {
            // Only the first substep crosses from the previous tick's placement
            let shift = if substep == 0 { shift } else { 0 };
            let (previous, target) = self.state.advance(stack);
            integrate(previous, target, shift, &step, &self.settings, &zeroed);
        }

        self.zeroed_last_tick = zeroed.into_inner();
        if self.zeroed_last_tick > 0 {
            debug!(
                "Dynamic waves: zeroed {} non-finite texels",
                self.zeroed_last_tick
            );
        }

        let state = Arc::clone(self.state.current());
        let (_, displacement) = self.displacement.advance(stack);
        to_displacement(&state, displacement, &self.settings);
    }

    pub fn destroy(&mut self) {
        self.state.release();
        self.displacement.release();
        self.valid = false;
    }
}

fn integrate(
    previous: &SliceArray<Vec2>,
    target: &mut SliceArray<Vec2>,
    shift: i32,
    step: &StepInputs,
    settings: &DynamicWaveSettings,
    zeroed: &AtomicUsize,
) {
    let damping = (-settings.damping * step.dt).exp();
    let attenuation = settings.attenuation_in_shallows;

    target.par_for_each_texel(|slice, id, texel| {
        let cascade = step.stack.cascade(slice);
        let world = cascade.id_to_world(id);

        let source = slice as i32 + shift;
        if source < 0 || source as usize >= previous.slice_count() {
            *texel = Vec2::ZERO;
            return;
        }
        let source = source as usize;

        let depth = signed_depth(
            step.sea_level_m,
            step.fields.level_at(slice, id),
            step.fields.floor_at(slice, id, step.sea_level_m),
        );
        if depth <= 0.0 {
            *texel = Vec2::ZERO;
            return;
        }

        let texel_size = cascade.texel_size;
        let from = upstream(world, step.fields.flow_at(slice, id), step.dt);
        let sample = |p: Vec2| previous.sample_world(source, p, EdgePolicy::Zero);
        let centre = sample(from);
        let neighbours = sample(from + Vec2::new(texel_size, 0.0)).x
            + sample(from - Vec2::new(texel_size, 0.0)).x
            + sample(from + Vec2::new(0.0, texel_size)).x
            + sample(from - Vec2::new(0.0, texel_size)).x;
        let laplacian = (neighbours - 4.0 * centre.x) / (texel_size * texel_size);

        let min_wavelength = cascade.min_wavelength();
        let c = wave_speed(min_wavelength, texel_size, step.dt, step.gravity, settings);

        let mut velocity = (centre.y + step.dt * c * c * laplacian) * damping;
        for (input, target_slice) in step.inputs.iter().zip(step.input_slices) {
            if *target_slice != slice {
                continue;
            }
            if let Some(s) = input.sample(world, step.time_s) {
                velocity += s.value * s.weight * step.dt;
            }
        }
        let mut height = centre.x + step.dt * velocity;

        // Waves slow and break where the water is shallower than half a wavelength
        let half_wavelength = 0.5 * min_wavelength;
        if depth < half_wavelength {
            let depth_mul = 1.0 - (1.0 - (depth / half_wavelength).clamp(0.0, 1.0)) * step.dt * 2.0;
            let factor = attenuation * depth_mul + (1.0 - attenuation);
            height *= factor;
            velocity *= factor;
        }

        *texel = if height.is_finite() && velocity.is_finite() {
            Vec2::new(height, velocity)
        } else {
            zeroed.fetch_add(1, Ordering::Relaxed);
            Vec2::ZERO
        };
    });
}

/// Horizontal displacement pulls texels toward crests along the height
/// gradient, limited to a fraction of a texel
fn to_displacement(state: &SliceArray<Vec2>, target: &mut SliceArray<Vec3>, settings: &DynamicWaveSettings) {
    let res = state.resolution();
    target.par_for_each_texel(|slice, id, texel| {
        let data = state.slice(slice);
        let texel_size = state.stack().cascade(slice).texel_size;
        let (x, y) = (id.x as i32, id.y as i32);
        let h = |dx: i32, dy: i32| fetch_clamped(data, res, x + dx, y + dy).x;

        // Height difference across one texel (meters)
        let gradient = Vec2::new(h(1, 0) - h(-1, 0), h(0, 1) - h(0, -1)) * 0.5;
        let limit = settings.displace_clamp * texel_size;
        let horizontal = (gradient * settings.horiz_displace).clamp_length_max(limit);

        *texel = Vec3::new(horizontal.x, h(0, 0), horizontal.y);
    });
}

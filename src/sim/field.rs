//! Simulations that are pure functions of their inputs each tick, plus the
//! temporally filtered shadow.

use std::sync::Arc;

use glam::Vec2;

use super::inputs::{blend_inputs, BoxedInput};
use super::SimKind;
use crate::cascade::texture::{EdgePolicy, FlipBuffer, SliceArray, Texel};
use crate::cascade::CascadeStack;
use crate::params::ShadowSettings;

/// Sea floor this far below sea level counts as open ocean (meters)
pub const DEEP_WATER_DEPTH_M: f32 = 500.0;

/// Cleared to a default, then painted by inputs, every tick
#[derive(Debug)]
pub struct FieldSim<T> {
    kind: SimKind,
    default_value: T,
    data: FlipBuffer<T>,
    valid: bool,
}

impl<T: Texel> FieldSim<T> {
    pub fn new(kind: SimKind, stack: &CascadeStack, default_value: T) -> Self {
        Self {
            kind,
            default_value,
            data: FlipBuffer::new(stack, default_value),
            valid: true,
        }
    }

    pub fn kind(&self) -> SimKind {
        self.kind
    }

    pub fn default_value(&self) -> T {
        self.default_value
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    pub fn update(&mut self, stack: &CascadeStack, inputs: &[BoxedInput<T>], time_s: f32) {
        let default_value = self.default_value;
        let (_, target) = self.data.advance(stack);
        if inputs.is_empty() {
            target.fill(default_value);
            return;
        }
        target.par_for_each_texel(|slice, id, texel| {
            let world = stack.cascade(slice).id_to_world(id);
            *texel = blend_inputs(inputs, default_value, world, time_s);
        });
    }

    pub fn current(&self) -> &Arc<SliceArray<T>> {
        self.data.current()
    }

    pub fn destroy(&mut self) {
        self.data.release();
        self.valid = false;
    }
}

/// Shadow term low-pass filtered over ticks to hide sampling jitter
#[derive(Debug)]
pub struct ShadowSim {
    settings: ShadowSettings,
    data: FlipBuffer<f32>,
    valid: bool,
}

impl ShadowSim {
    pub fn new(stack: &CascadeStack, settings: ShadowSettings) -> Self {
        Self {
            settings,
            data: FlipBuffer::new(stack, 0.0),
            valid: true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    pub fn settings(&self) -> &ShadowSettings {
        &self.settings
    }

    /// `lerp(previous, target, jitter_rate)` where the previous tick's data
    /// is resampled onto this tick's placement
    pub fn update(&mut self, stack: &CascadeStack, shift: i32, inputs: &[BoxedInput<f32>], time_s: f32) {
        let rate = self.settings.jitter_rate;
        let (previous, target) = self.data.advance(stack);
        target.par_for_each_texel(|slice, id, texel| {
            let world = stack.cascade(slice).id_to_world(id);
            let sample = blend_inputs(inputs, 0.0, world, time_s);
            let source = slice as i32 + shift;
            *texel = if source >= 0 && (source as usize) < previous.slice_count() {
                let source = source as usize;
                if previous.stack().cascade(source).contains(world) {
                    let old = previous.sample_world(source, world, EdgePolicy::Clamp);
                    old + (sample - old) * rate
                } else {
                    sample
                }
            } else {
                sample
            };
        });
    }

    pub fn current(&self) -> &Arc<SliceArray<f32>> {
        self.data.current()
    }

    pub fn destroy(&mut self) {
        self.data.release();
        self.valid = false;
    }
}

/// Sea floor altitude default for the depth simulation
pub fn default_floor_altitude(sea_level_m: f32) -> f32 {
    sea_level_m - DEEP_WATER_DEPTH_M
}

/// Water depth above the floor; negative where the floor is above water
pub fn signed_depth(sea_level_m: f32, level_offset_m: f32, floor_altitude_m: f32) -> f32 {
    sea_level_m + level_offset_m - floor_altitude_m
}

/// Flow offset for a sample `dt` seconds upstream
pub fn upstream(world: Vec2, flow: Vec2, dt: f32) -> Vec2 {
    world - flow * dt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::LodScale;
    use crate::sim::inputs::{BlendMode, ConstantInput};

    fn stack() -> CascadeStack {
        CascadeStack::with_scale(
            Vec2::ZERO,
            LodScale {
                scale: 8.0,
                alpha: 0.0,
            },
            3,
            16,
        )
    }

    #[test]
    fn test_field_cleared_each_tick() {
        let s = stack();
        let mut field = FieldSim::new(SimKind::Level, &s, 0.0f32);
        let inputs: Vec<BoxedInput<f32>> = vec![Box::new(ConstantInput::new(1.5, BlendMode::Additive))];
        field.update(&s, &inputs, 0.0);
        field.update(&s, &inputs, 0.1);
        assert_eq!(field.current().get(1, 4, 4), 1.5);

        field.update(&s, &[], 0.2);
        assert_eq!(field.current().get(1, 4, 4), 0.0);
    }

    #[test]
    fn test_field_input_region() {
        let s = stack();
        let mut field = FieldSim::new(SimKind::Flow, &s, Vec2::ZERO);
        let inputs: Vec<BoxedInput<Vec2>> = vec![Box::new(
            ConstantInput::new(Vec2::X, BlendMode::Alpha).within(Vec2::ZERO, Vec2::splat(100.0)),
        )];
        field.update(&s, &inputs, 0.0);
        let current = field.current();
        let inside = s.cascade(0).id_to_world(glam::UVec2::new(12, 12));
        let outside = s.cascade(0).id_to_world(glam::UVec2::new(2, 2));
        assert!(inside.x > 0.0 && outside.x < 0.0);
        assert_eq!(current.get(0, 12, 12), Vec2::X);
        assert_eq!(current.get(0, 2, 2), Vec2::ZERO);
    }

    #[test]
    fn test_shadow_converges_at_jitter_rate() {
        let s = stack();
        let mut shadow = ShadowSim::new(&s, ShadowSettings { jitter_rate: 0.5 });
        let inputs: Vec<BoxedInput<f32>> = vec![Box::new(ConstantInput::new(1.0, BlendMode::Maximum))];
        shadow.update(&s, 0, &inputs, 0.0);
        assert!((shadow.current().get(0, 8, 8) - 0.5).abs() < 1e-5);
        shadow.update(&s, 0, &inputs, 0.1);
        assert!((shadow.current().get(0, 8, 8) - 0.75).abs() < 1e-5);
    }

    #[test]
    fn test_signed_depth() {
        let floor = default_floor_altitude(2.0);
        assert_eq!(signed_depth(2.0, 0.0, floor), DEEP_WATER_DEPTH_M);
        assert!(signed_depth(0.0, 0.5, 1.0) < 0.0);
    }

    #[test]
    fn test_destroy_releases_storage() {
        let s = stack();
        let mut field = FieldSim::new(SimKind::Clip, &s, 0.0f32);
        field.destroy();
        assert!(!field.is_valid());
        assert!(field.current().data().is_empty());
    }
}

//! Whitecap and shoreline foam: advected, decayed, and regenerated where
//! the displaced surface folds or the water runs shallow.

use std::sync::Arc;

use glam::{UVec2, Vec3};

use super::field::{signed_depth, upstream};
use super::inputs::{blend_inputs, BoxedInput};
use super::{SurfaceFields, TickContext};
use crate::cascade::texture::{fetch_clamped, EdgePolicy, FlipBuffer, SliceArray};
use crate::cascade::CascadeStack;
use crate::params::FoamSettings;

#[derive(Debug)]
pub struct FoamSim {
    settings: FoamSettings,
    data: FlipBuffer<f32>,
    valid: bool,
}

impl FoamSim {
    pub fn new(stack: &CascadeStack, settings: FoamSettings) -> Self {
        Self {
            settings,
            data: FlipBuffer::new(stack, 0.0),
            valid: true,
        }
    }

    pub fn settings(&self) -> &FoamSettings {
        &self.settings
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    pub fn current(&self) -> &Arc<SliceArray<f32>> {
        self.data.current()
    }

    pub fn update(&mut self, ctx: &TickContext, fields: &SurfaceFields, inputs: &[BoxedInput<f32>]) {
        let settings = &self.settings;
        let dt = ctx.dt.max(0.0);
        let decay = (-settings.fade_rate * dt).exp();
        let (previous, target) = self.data.advance(ctx.stack);

        target.par_for_each_texel(|slice, id, texel| {
            let world = ctx.stack.cascade(slice).id_to_world(id);

            let source = slice as i32 + ctx.source_slice_shift;
            let mut foam = if source >= 0 {
                let from = upstream(world, fields.flow_at(slice, id), dt);
                previous.sample_world(source as usize, from, EdgePolicy::Zero) * decay
            } else {
                0.0
            };

            if let Some(animated) = fields.animated {
                let det = jacobian_determinant(animated, slice, id);
                foam += settings.wave_foam_strength * (settings.wave_foam_coverage - det).clamp(0.0, 1.0) * dt;
            }

            let depth = signed_depth(
                ctx.sea_level_m,
                fields.level_at(slice, id),
                fields.floor_at(slice, id, ctx.sea_level_m),
            );
            if depth < settings.shoreline_foam_max_depth_m {
                let shallowness = (1.0 - depth / settings.shoreline_foam_max_depth_m).clamp(0.0, 1.0);
                foam += settings.shoreline_foam_strength * shallowness * dt;
            }

            foam = blend_inputs(inputs, foam, world, ctx.time_s);
            *texel = if foam.is_finite() {
                foam.clamp(0.0, settings.max_foam)
            } else {
                0.0
            };
        });
    }

    pub fn destroy(&mut self) {
        self.data.release();
        self.valid = false;
    }
}

/// Area change of the horizontal displacement map; below 1 the surface
/// compresses, below 0 it folds over
pub fn jacobian_determinant(displacement: &SliceArray<Vec3>, slice: usize, id: UVec2) -> f32 {
    if slice >= displacement.slice_count() {
        return 1.0;
    }
    let res = displacement.resolution();
    let data = displacement.slice(slice);
    let texel_size = displacement.stack().cascade(slice).texel_size;
    let (x, y) = (id.x as i32, id.y as i32);
    let d = |dx: i32, dy: i32| fetch_clamped(data, res, x + dx, y + dy);

    let inv = 0.5 / texel_size;
    let ddx = (d(1, 0) - d(-1, 0)) * inv;
    let ddz = (d(0, 1) - d(0, -1)) * inv;
    (1.0 + ddx.x) * (1.0 + ddz.z) - ddz.x * ddx.z
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::LodScale;
    use crate::sim::inputs::{BlendMode, ConstantInput, InputRegistry};
    use glam::Vec2;

    fn stack() -> CascadeStack {
        CascadeStack::with_scale(
            Vec2::ZERO,
            LodScale {
                scale: 8.0,
                alpha: 0.0,
            },
            2,
            16,
        )
    }

    fn ctx<'a>(stack: &'a CascadeStack, inputs: &'a InputRegistry, dt: f32) -> TickContext<'a> {
        TickContext {
            stack,
            source_slice_shift: 0,
            dt,
            time_s: 0.0,
            sea_level_m: 0.0,
            gravity_mps2: 9.81,
            sources: &[],
            inputs,
        }
    }

    #[test]
    fn test_flat_surface_has_unit_jacobian() {
        let s = stack();
        let flat = SliceArray::new(s.clone(), Vec3::new(0.3, 1.0, -0.2));
        assert!((jacobian_determinant(&flat, 0, UVec2::new(5, 5)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_converging_displacement_folds() {
        let s = stack();
        let mut squeeze = SliceArray::new(s.clone(), Vec3::ZERO);
        // dDx/dx = -1.5 everywhere in x
        let texel = s.cascade(0).texel_size;
        squeeze.par_for_each_texel(|_, id, t| *t = Vec3::new(-1.5 * id.x as f32 * texel, 0.0, 0.0));
        assert!(jacobian_determinant(&squeeze, 0, UVec2::new(8, 8)) < 0.0);
    }

    #[test]
    fn test_foam_decays_exponentially() {
        let s = stack();
        let registry = InputRegistry::new();
        let settings = FoamSettings {
            fade_rate: 1.0,
            wave_foam_coverage: -10.0,
            ..Default::default()
        };
        let mut foam = FoamSim::new(&s, settings);
        let seed: Vec<BoxedInput<f32>> = vec![Box::new(ConstantInput::new(1.0, BlendMode::Maximum))];
        foam.update(&ctx(&s, &registry, 0.1), &SurfaceFields::default(), &seed);
        assert_eq!(foam.current().get(0, 8, 8), 1.0);

        for _ in 0..10 {
            foam.update(&ctx(&s, &registry, 0.1), &SurfaceFields::default(), &[]);
        }
        let expected = (-1.0f32).exp();
        assert!((foam.current().get(0, 8, 8) - expected).abs() < 1e-3);
    }

    #[test]
    fn test_shoreline_generates_foam() {
        let s = stack();
        let registry = InputRegistry::new();
        let mut foam = FoamSim::new(&s, FoamSettings::default());
        let floor = SliceArray::new(s.clone(), -0.1f32);
        let fields = SurfaceFields {
            depth: Some(&floor),
            ..Default::default()
        };
        foam.update(&ctx(&s, &registry, 0.1), &fields, &[]);
        assert!(foam.current().get(1, 3, 3) > 0.0);

        let mut deep = FoamSim::new(&s, FoamSettings::default());
        deep.update(&ctx(&s, &registry, 0.1), &SurfaceFields::default(), &[]);
        assert_eq!(deep.current().get(1, 3, 3), 0.0);
    }

    #[test]
    fn test_foam_clamped_to_max() {
        let s = stack();
        let registry = InputRegistry::new();
        let settings = FoamSettings {
            max_foam: 0.5,
            ..Default::default()
        };
        let mut foam = FoamSim::new(&s, settings);
        let seed: Vec<BoxedInput<f32>> = vec![Box::new(ConstantInput::new(3.0, BlendMode::Additive))];
        foam.update(&ctx(&s, &registry, 0.1), &SurfaceFields::default(), &seed);
        assert_eq!(foam.current().get(0, 0, 0), 0.5);
    }
}

//! The closed set of per-cascade simulations and their tick ordering.
//!
//! Every simulation owns double-buffered slice arrays laid out on the
//! current cascade stack. The manager runs them in [`SimKind::ORDER`] and
//! hands each one the simulations already updated this tick, so reads of
//! another simulation's data always see this tick's values.

pub mod animated_waves;
pub mod dynamic_waves;
pub mod field;
pub mod foam;
pub mod inputs;

use std::sync::Arc;

use glam::{UVec2, Vec2, Vec3, Vec4};
use log::warn;

use crate::cascade::texture::{SliceArray, Texel};
use crate::cascade::CascadeStack;
use crate::error::Result;
use crate::params::OceanConfig;
use crate::waves::WaveSource;

pub use animated_waves::AnimatedWaves;
pub use dynamic_waves::DynamicWaves;
pub use field::{FieldSim, ShadowSim};
pub use foam::FoamSim;
pub use inputs::{BlendMode, BoxedInput, InputRegistry, LodInput, SimInput};

/// Simulation variants, declared in tick order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimKind {
    Depth,
    Level,
    Flow,
    DynamicWaves,
    AnimatedWaves,
    Foam,
    Absorption,
    Scattering,
    Clip,
    Albedo,
    Shadow,
}

impl SimKind {
    /// Tick order; later steps sample earlier steps' fresh data
    pub const ORDER: [SimKind; 11] = [
        SimKind::Depth,
        SimKind::Level,
        SimKind::Flow,
        SimKind::DynamicWaves,
        SimKind::AnimatedWaves,
        SimKind::Foam,
        SimKind::Absorption,
        SimKind::Scattering,
        SimKind::Clip,
        SimKind::Albedo,
        SimKind::Shadow,
    ];

    /// Binding name for the host
    pub fn name(self) -> &'static str {
        match self {
            SimKind::Depth => "depth",
            SimKind::Level => "level",
            SimKind::Flow => "flow",
            SimKind::DynamicWaves => "dynamic_waves",
            SimKind::AnimatedWaves => "animated_waves",
            SimKind::Foam => "foam",
            SimKind::Absorption => "absorption",
            SimKind::Scattering => "scattering",
            SimKind::Clip => "clip",
            SimKind::Albedo => "albedo",
            SimKind::Shadow => "shadow",
        }
    }

    fn order_index(self) -> usize {
        Self::ORDER.iter().position(|k| *k == self).unwrap_or(Self::ORDER.len())
    }
}

/// Shared, read-only state for one tick
pub struct TickContext<'a> {
    pub stack: &'a CascadeStack,
    /// Offset from a slice to the same-texel slice of last tick's stack
    pub source_slice_shift: i32,
    pub dt: f32,
    pub time_s: f32,
    pub sea_level_m: f32,
    pub gravity_mps2: f32,
    pub sources: &'a [WaveSource],
    pub inputs: &'a InputRegistry,
}

/// This tick's data of simulations that already ran, read by texel index
#[derive(Debug, Default, Clone, Copy)]
pub struct SurfaceFields<'a> {
    /// Sea floor altitude
    pub depth: Option<&'a SliceArray<f32>>,
    pub level: Option<&'a SliceArray<f32>>,
    pub flow: Option<&'a SliceArray<Vec2>>,
    pub dynamic: Option<&'a SliceArray<Vec3>>,
    pub animated: Option<&'a SliceArray<Vec3>>,
}

impl<'a> SurfaceFields<'a> {
    /// Collect the valid simulations among `done`
    pub fn from_done(done: &'a [Simulation]) -> Self {
        let mut fields = Self::default();
        for sim in done.iter().filter(|s| s.is_valid()) {
            match sim {
                Simulation::Depth(f) => fields.depth = Some(f.current().as_ref()),
                Simulation::Level(f) => fields.level = Some(f.current().as_ref()),
                Simulation::Flow(f) => fields.flow = Some(f.current().as_ref()),
                Simulation::DynamicWaves(w) => fields.dynamic = Some(w.displacement().as_ref()),
                Simulation::AnimatedWaves(w) => fields.animated = Some(w.displacement().as_ref()),
                _ => {}
            }
        }
        fields
    }

    pub fn level_at(&self, slice: usize, id: UVec2) -> f32 {
        texel_at(self.level, slice, id).unwrap_or(0.0)
    }

    /// Floor altitude, open ocean where no depth data exists
    pub fn floor_at(&self, slice: usize, id: UVec2, sea_level_m: f32) -> f32 {
        texel_at(self.depth, slice, id).unwrap_or_else(|| field::default_floor_altitude(sea_level_m))
    }

    pub fn flow_at(&self, slice: usize, id: UVec2) -> Vec2 {
        texel_at(self.flow, slice, id).unwrap_or(Vec2::ZERO)
    }

    pub fn dynamic_at(&self, slice: usize, id: UVec2) -> Vec3 {
        texel_at(self.dynamic, slice, id).unwrap_or(Vec3::ZERO)
    }
}

fn texel_at<T: Texel>(array: Option<&SliceArray<T>>, slice: usize, id: UVec2) -> Option<T> {
    let array = array?;
    let res = array.resolution();
    let (x, y) = (id.x as usize, id.y as usize);
    if slice >= array.slice_count() || x >= res || y >= res {
        return None;
    }
    Some(array.get(slice, x, y))
}

/// Read-only view of a simulation's current buffer for the host
#[derive(Debug, Clone)]
pub enum TextureBinding {
    Scalar(Arc<SliceArray<f32>>),
    Vector2(Arc<SliceArray<Vec2>>),
    Vector3(Arc<SliceArray<Vec3>>),
    Vector4(Arc<SliceArray<Vec4>>),
}

impl TextureBinding {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            TextureBinding::Scalar(a) => a.as_bytes(),
            TextureBinding::Vector2(a) => a.as_bytes(),
            TextureBinding::Vector3(a) => a.as_bytes(),
            TextureBinding::Vector4(a) => a.as_bytes(),
        }
    }

    /// f32 components per texel
    pub fn components(&self) -> usize {
        match self {
            TextureBinding::Scalar(_) => 1,
            TextureBinding::Vector2(_) => 2,
            TextureBinding::Vector3(_) => 3,
            TextureBinding::Vector4(_) => 4,
        }
    }

    pub fn stack(&self) -> &CascadeStack {
        match self {
            TextureBinding::Scalar(a) => a.stack(),
            TextureBinding::Vector2(a) => a.stack(),
            TextureBinding::Vector3(a) => a.stack(),
            TextureBinding::Vector4(a) => a.stack(),
        }
    }

    /// Scalar view of the height-like channel, for export and statistics
    pub fn scalar_slice(&self, slice: usize) -> Vec<f32> {
        match self {
            TextureBinding::Scalar(a) => a.slice(slice).to_vec(),
            TextureBinding::Vector2(a) => a.slice(slice).iter().map(|v| v.x).collect(),
            TextureBinding::Vector3(a) => a.slice(slice).iter().map(|v| v.y).collect(),
            TextureBinding::Vector4(a) => a.slice(slice).iter().map(|v| v.w).collect(),
        }
    }
}

/// One simulation of the closed set
#[derive(Debug)]
pub enum Simulation {
    Depth(FieldSim<f32>),
    Level(FieldSim<f32>),
    Flow(FieldSim<Vec2>),
    DynamicWaves(DynamicWaves),
    AnimatedWaves(AnimatedWaves),
    Foam(FoamSim),
    Absorption(FieldSim<Vec3>),
    Scattering(FieldSim<Vec3>),
    Clip(FieldSim<f32>),
    Albedo(FieldSim<Vec4>),
    Shadow(ShadowSim),
}

impl Simulation {
    /// Build a simulation on `stack`. Bad settings leave it disabled.
    pub fn new(kind: SimKind, stack: &CascadeStack, config: &OceanConfig) -> Self {
        let mut sim = match kind {
            SimKind::Depth => Simulation::Depth(FieldSim::new(
                kind,
                stack,
                field::default_floor_altitude(config.lod.sea_level_m),
            )),
            SimKind::Level => Simulation::Level(FieldSim::new(kind, stack, 0.0)),
            SimKind::Flow => Simulation::Flow(FieldSim::new(kind, stack, Vec2::ZERO)),
            SimKind::DynamicWaves => {
                Simulation::DynamicWaves(DynamicWaves::new(stack, config.dynamic_waves.clone()))
            }
            SimKind::AnimatedWaves => {
                Simulation::AnimatedWaves(AnimatedWaves::new(stack, config.animated_waves.clone()))
            }
            SimKind::Foam => Simulation::Foam(FoamSim::new(stack, config.foam.clone())),
            SimKind::Absorption => Simulation::Absorption(FieldSim::new(kind, stack, Vec3::ZERO)),
            SimKind::Scattering => Simulation::Scattering(FieldSim::new(kind, stack, Vec3::ZERO)),
            SimKind::Clip => Simulation::Clip(FieldSim::new(kind, stack, 0.0)),
            SimKind::Albedo => Simulation::Albedo(FieldSim::new(kind, stack, Vec4::ZERO)),
            SimKind::Shadow => Simulation::Shadow(ShadowSim::new(stack, config.shadow.clone())),
        };

        if let Err(e) = Self::validate(kind, config) {
            warn!("Disabling {} simulation: {}", kind.name(), e);
            sim.set_valid(false);
        }
        sim
    }

    fn validate(kind: SimKind, config: &OceanConfig) -> Result<()> {
        match kind {
            SimKind::DynamicWaves => config.dynamic_waves.validate(),
            SimKind::AnimatedWaves => config.animated_waves.validate(),
            SimKind::Foam => config.foam.validate(),
            SimKind::Shadow => config.shadow.validate(),
            _ => Ok(()),
        }
    }

    pub fn kind(&self) -> SimKind {
        match self {
            Simulation::Depth(_) => SimKind::Depth,
            Simulation::Level(_) => SimKind::Level,
            Simulation::Flow(_) => SimKind::Flow,
            Simulation::DynamicWaves(_) => SimKind::DynamicWaves,
            Simulation::AnimatedWaves(_) => SimKind::AnimatedWaves,
            Simulation::Foam(_) => SimKind::Foam,
            Simulation::Absorption(_) => SimKind::Absorption,
            Simulation::Scattering(_) => SimKind::Scattering,
            Simulation::Clip(_) => SimKind::Clip,
            Simulation::Albedo(_) => SimKind::Albedo,
            Simulation::Shadow(_) => SimKind::Shadow,
        }
    }

    /// Position in the tick order
    pub fn order(&self) -> usize {
        self.kind().order_index()
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Simulation::Depth(f) | Simulation::Level(f) | Simulation::Clip(f) => f.is_valid(),
            Simulation::Flow(f) => f.is_valid(),
            Simulation::DynamicWaves(w) => w.is_valid(),
            Simulation::AnimatedWaves(w) => w.is_valid(),
            Simulation::Foam(f) => f.is_valid(),
            Simulation::Absorption(f) | Simulation::Scattering(f) => f.is_valid(),
            Simulation::Albedo(f) => f.is_valid(),
            Simulation::Shadow(s) => s.is_valid(),
        }
    }

    fn set_valid(&mut self, valid: bool) {
        match self {
            Simulation::Depth(f) | Simulation::Level(f) | Simulation::Clip(f) => f.set_valid(valid),
            Simulation::Flow(f) => f.set_valid(valid),
            Simulation::DynamicWaves(w) => w.set_valid(valid),
            Simulation::AnimatedWaves(w) => w.set_valid(valid),
            Simulation::Foam(f) => f.set_valid(valid),
            Simulation::Absorption(f) | Simulation::Scattering(f) => f.set_valid(valid),
            Simulation::Albedo(f) => f.set_valid(valid),
            Simulation::Shadow(s) => s.set_valid(valid),
        }
    }

    /// Run this tick's step. `done` holds the simulations that precede this
    /// one in tick order, already updated.
    pub fn update(&mut self, ctx: &TickContext, done: &[Simulation]) {
        if !self.is_valid() {
            return;
        }
        let inputs = ctx.inputs;
        let (stack, time) = (ctx.stack, ctx.time_s);
        match self {
            Simulation::Depth(f) => f.update(stack, &inputs.depth, time),
            Simulation::Level(f) => f.update(stack, &inputs.level, time),
            Simulation::Flow(f) => f.update(stack, &inputs.flow, time),
            Simulation::DynamicWaves(w) => {
                let fields = SurfaceFields::from_done(done);
                w.update(
                    stack,
                    ctx.source_slice_shift,
                    &fields,
                    &inputs.dynamic_waves,
                    ctx.dt,
                    time,
                    ctx.sea_level_m,
                    ctx.gravity_mps2,
                );
            }
            Simulation::AnimatedWaves(w) => {
                let fields = SurfaceFields::from_done(done);
                w.update(ctx, &fields, &inputs.animated_waves);
            }
            Simulation::Foam(f) => {
                let fields = SurfaceFields::from_done(done);
                f.update(ctx, &fields, &inputs.foam);
            }
            Simulation::Absorption(f) => f.update(stack, &inputs.absorption, time),
            Simulation::Scattering(f) => f.update(stack, &inputs.scattering, time),
            Simulation::Clip(f) => f.update(stack, &inputs.clip, time),
            Simulation::Albedo(f) => f.update(stack, &inputs.albedo, time),
            Simulation::Shadow(s) => s.update(stack, ctx.source_slice_shift, &inputs.shadow, time),
        }
    }

    /// Current buffer for the host; `None` while disabled
    pub fn bind(&self) -> Option<TextureBinding> {
        if !self.is_valid() {
            return None;
        }
        let binding = match self {
            Simulation::Depth(f) | Simulation::Level(f) | Simulation::Clip(f) => {
                TextureBinding::Scalar(Arc::clone(f.current()))
            }
            Simulation::Flow(f) => TextureBinding::Vector2(Arc::clone(f.current())),
            Simulation::DynamicWaves(w) => TextureBinding::Vector2(Arc::clone(w.state())),
            Simulation::AnimatedWaves(w) => TextureBinding::Vector3(Arc::clone(w.displacement())),
            Simulation::Foam(f) => TextureBinding::Scalar(Arc::clone(f.current())),
            Simulation::Absorption(f) | Simulation::Scattering(f) => {
                TextureBinding::Vector3(Arc::clone(f.current()))
            }
            Simulation::Albedo(f) => TextureBinding::Vector4(Arc::clone(f.current())),
            Simulation::Shadow(s) => TextureBinding::Scalar(Arc::clone(s.current())),
        };
        Some(binding)
    }

    /// Release storage; the simulation stays disabled afterwards
    pub fn destroy(&mut self) {
        match self {
            Simulation::Depth(f) | Simulation::Level(f) | Simulation::Clip(f) => f.destroy(),
            Simulation::Flow(f) => f.destroy(),
            Simulation::DynamicWaves(w) => w.destroy(),
            Simulation::AnimatedWaves(w) => w.destroy(),
            Simulation::Foam(f) => f.destroy(),
            Simulation::Absorption(f) | Simulation::Scattering(f) => f.destroy(),
            Simulation::Albedo(f) => f.destroy(),
            Simulation::Shadow(s) => s.destroy(),
        }
    }
}

/// Run every simulation in order, each seeing only those before it
pub fn run_tick(simulations: &mut [Simulation], ctx: &TickContext) {
    for index in 0..simulations.len() {
        let (done, rest) = simulations.split_at_mut(index);
        rest[0].update(ctx, done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::LodScale;
    use crate::params::FoamSettings;
    use crate::sim::inputs::ConstantInput;

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

    fn ctx<'a>(stack: &'a CascadeStack, inputs: &'a InputRegistry) -> TickContext<'a> {
        TickContext {
            stack,
            source_slice_shift: 0,
            dt: 0.1,
            time_s: 0.1,
            sea_level_m: 0.0,
            gravity_mps2: 9.81,
            sources: &[],
            inputs,
        }
    }

    #[test]
    fn test_order_is_declared_order() {
        for (i, kind) in SimKind::ORDER.iter().enumerate() {
            assert_eq!(kind.order_index(), i);
        }
        assert!(SimKind::Depth.order_index() < SimKind::DynamicWaves.order_index());
        assert!(SimKind::AnimatedWaves.order_index() < SimKind::Foam.order_index());
    }

    #[test]
    fn test_bad_settings_disable_only_that_simulation() {
        let s = stack();
        let mut config = OceanConfig::default();
        config.foam = FoamSettings {
            max_foam: 0.0,
            ..Default::default()
        };
        let foam = Simulation::new(SimKind::Foam, &s, &config);
        assert!(!foam.is_valid());
        assert!(foam.bind().is_none());

        let depth = Simulation::new(SimKind::Depth, &s, &config);
        assert!(depth.is_valid());
        assert!(depth.bind().is_some());
    }

    #[test]
    fn test_later_steps_read_this_tick_data() {
        let s = stack();
        let config = OceanConfig::default();
        let mut registry = InputRegistry::new();
        registry.register(SimInput::Depth(Box::new(ConstantInput::new(3.0, BlendMode::Maximum))));

        let mut sims: Vec<Simulation> = [SimKind::Depth, SimKind::DynamicWaves]
            .iter()
            .map(|k| Simulation::new(*k, &s, &config))
            .collect();

        // The dynamic step sees the dry floor written moments earlier
        let (done, rest) = sims.split_at_mut(1);
        let context = ctx(&s, &registry);
        rest[0].update(&context, done);
        let fields = SurfaceFields::from_done(done);
        assert!(fields.depth.is_some());
        assert_eq!(fields.floor_at(0, UVec2::new(3, 3), 0.0), -DEEP_FLOOR);

        run_tick(&mut sims, &context);
        let fields = SurfaceFields::from_done(&sims[..1]);
        assert_eq!(fields.floor_at(0, UVec2::new(3, 3), 0.0), 3.0);
    }

    const DEEP_FLOOR: f32 = field::DEEP_WATER_DEPTH_M;

    #[test]
    fn test_missing_fields_fall_back_to_open_ocean() {
        let fields = SurfaceFields::default();
        let id = UVec2::new(1, 1);
        assert_eq!(fields.floor_at(0, id, 2.0), 2.0 - field::DEEP_WATER_DEPTH_M);
        assert_eq!(fields.level_at(0, id), 0.0);
        assert_eq!(fields.flow_at(0, id), Vec2::ZERO);
    }

    #[test]
    fn test_destroy_disables() {
        let s = stack();
        let mut sim = Simulation::new(SimKind::Albedo, &s, &OceanConfig::default());
        sim.destroy();
        assert!(!sim.is_valid());
        assert!(sim.bind().is_none());
    }

    #[test]
    fn test_binding_bytes_match_layout() {
        let s = stack();
        let sim = Simulation::new(SimKind::Flow, &s, &OceanConfig::default());
        let binding = sim.bind().unwrap();
        assert_eq!(binding.components(), 2);
        assert_eq!(binding.as_bytes().len(), 3 * 16 * 16 * 2 * 4);
    }
}

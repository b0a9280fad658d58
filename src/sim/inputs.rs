//! Data painted into simulations each tick.
//!
//! An input is sampled at texel world positions and blended into the
//! simulation's freshly cleared (or freshly integrated) value. Field
//! simulations take every input at every slice. Wave-carrying simulations
//! take each input in one slice only, picked by its wavelength, since
//! coarser slices already reach finer ones through the combine.

use std::fmt;

use glam::{Vec2, Vec3, Vec4};
use noise::{NoiseFn, OpenSimplex};

use super::SimKind;
use crate::cascade::texture::Texel;
use crate::cascade::CascadeStack;

/// How an input value meets the value already in a texel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// `dst + value * weight`
    #[default]
    Additive,
    /// `lerp(dst, value, weight)`
    Alpha,
    /// Component-wise maximum where covered
    Maximum,
    /// Component-wise minimum where covered
    Minimum,
}

impl BlendMode {
    pub fn apply<T: Texel>(self, dst: T, value: T, weight: f32) -> T {
        match self {
            BlendMode::Additive => dst + value * weight,
            BlendMode::Alpha => dst * (1.0 - weight) + value * weight,
            BlendMode::Maximum => dst.max_texel(value),
            BlendMode::Minimum => dst.min_texel(value),
        }
    }
}

/// One input's contribution at a position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSample<T> {
    pub value: T,
    /// Coverage in [0, 1]
    pub weight: f32,
}

impl<T> InputSample<T> {
    pub fn full(value: T) -> Self {
        Self { value, weight: 1.0 }
    }
}

/// Something that paints values into a simulation
pub trait LodInput<T>: Send + Sync {
    /// Value at `world`, `None` where the input does not reach
    fn sample(&self, world: Vec2, time_s: f32) -> Option<InputSample<T>>;

    fn blend_mode(&self) -> BlendMode {
        BlendMode::Additive
    }

    /// Characteristic wavelength (meters) for wave-carrying simulations
    fn wavelength_m(&self) -> Option<f32> {
        None
    }
}

pub type BoxedInput<T> = Box<dyn LodInput<T>>;

/// Blend every input in order over `base`
pub fn blend_inputs<T: Texel>(inputs: &[BoxedInput<T>], base: T, world: Vec2, time_s: f32) -> T {
    inputs.iter().fold(base, |value, input| match input.sample(world, time_s) {
        Some(sample) => input.blend_mode().apply(value, sample.value, sample.weight.clamp(0.0, 1.0)),
        None => value,
    })
}

/// Slice whose band holds `wavelength`, clamped to the stack
pub fn slice_for_wavelength(stack: &CascadeStack, wavelength: f32) -> usize {
    let count = stack.slice_count();
    (0..count)
        .find(|slice| stack.band(*slice).contains(wavelength))
        .unwrap_or(if wavelength < stack.cascade(0).min_wavelength() {
            0
        } else {
            count.saturating_sub(1)
        })
}

/// The same value everywhere, or inside an axis-aligned XZ rectangle
#[derive(Debug, Clone)]
pub struct ConstantInput<T> {
    pub value: T,
    pub blend: BlendMode,
    /// (min, max) corners; `None` covers the whole plane
    pub region: Option<(Vec2, Vec2)>,
}

impl<T: Texel> ConstantInput<T> {
    pub fn new(value: T, blend: BlendMode) -> Self {
        Self {
            value,
            blend,
            region: None,
        }
    }

    pub fn within(mut self, min: Vec2, max: Vec2) -> Self {
        self.region = Some((min, max));
        self
    }
}

impl<T: Texel> LodInput<T> for ConstantInput<T> {
    fn sample(&self, world: Vec2, _time_s: f32) -> Option<InputSample<T>> {
        match self.region {
            Some((min, max)) if world.cmplt(min).any() || world.cmpge(max).any() => None,
            _ => Some(InputSample::full(self.value)),
        }
    }

    fn blend_mode(&self) -> BlendMode {
        self.blend
    }
}

/// Closure-backed input
pub struct FnInput<F> {
    f: F,
    blend: BlendMode,
    wavelength_m: Option<f32>,
}

impl<F> FnInput<F> {
    pub fn new(f: F, blend: BlendMode) -> Self {
        Self {
            f,
            blend,
            wavelength_m: None,
        }
    }

    pub fn with_wavelength(mut self, wavelength_m: f32) -> Self {
        self.wavelength_m = Some(wavelength_m);
        self
    }
}

impl<T, F> LodInput<T> for FnInput<F>
where
    F: Fn(Vec2, f32) -> Option<T> + Send + Sync,
{
    fn sample(&self, world: Vec2, time_s: f32) -> Option<InputSample<T>> {
        (self.f)(world, time_s).map(InputSample::full)
    }

    fn blend_mode(&self) -> BlendMode {
        self.blend
    }

    fn wavelength_m(&self) -> Option<f32> {
        self.wavelength_m
    }
}

/// Procedural sea floor altitude for the depth simulation.
///
/// Two octaves of OpenSimplex noise around a base depth; shallow banks and
/// islands appear where the noise lifts the floor above sea level.
pub struct NoiseSeabed {
    simplex: OpenSimplex,
    /// Floor altitude where the noise is zero (meters)
    pub base_altitude_m: f32,
    /// Peak deviation from the base (meters)
    pub relief_m: f32,
    /// Horizontal size of the largest features (meters)
    pub feature_size_m: f32,
}

impl NoiseSeabed {
    pub fn new(seed: u32, base_altitude_m: f32, relief_m: f32, feature_size_m: f32) -> Self {
        Self {
            simplex: OpenSimplex::new(seed),
            base_altitude_m,
            relief_m,
            feature_size_m,
        }
    }

    /// Noise in [-1, 1] at a world position
    pub fn sample_2d(&self, world: Vec2) -> f32 {
        let p = world.as_dvec2() / self.feature_size_m.max(1e-3) as f64;
        let coarse = self.simplex.get([p.x, p.y]);
        let fine = self.simplex.get([p.x * 2.0 + 17.3, p.y * 2.0 - 4.1]);
        ((coarse * 0.7 + fine * 0.3) as f32).clamp(-1.0, 1.0)
    }
}

impl LodInput<f32> for NoiseSeabed {
    fn sample(&self, world: Vec2, _time_s: f32) -> Option<InputSample<f32>> {
        Some(InputSample::full(self.base_altitude_m + self.relief_m * self.sample_2d(world)))
    }

    fn blend_mode(&self) -> BlendMode {
        BlendMode::Maximum
    }
}

/// Vertical push on the dynamic-wave surface from a sphere at the surface
#[derive(Debug, Clone, Copy)]
pub struct SphereImpulse {
    /// XZ centre (meters)
    pub centre: Vec2,
    /// Radius (meters)
    pub radius_m: f32,
    /// Peak vertical acceleration (m/s²); negative pushes water down
    pub strength: f32,
    /// Active until this time (seconds), `None` for always
    pub until_s: Option<f32>,
}

impl LodInput<f32> for SphereImpulse {
    fn sample(&self, world: Vec2, time_s: f32) -> Option<InputSample<f32>> {
        if self.until_s.is_some_and(|until| time_s > until) {
            return None;
        }
        let distance = world.distance(self.centre);
        if distance >= self.radius_m {
            return None;
        }
        let falloff = 1.0 - distance / self.radius_m;
        Some(InputSample::full(self.strength * falloff * falloff))
    }

    fn wavelength_m(&self) -> Option<f32> {
        Some(2.0 * self.radius_m)
    }
}

/// An input tagged with the simulation it feeds
pub enum SimInput {
    /// Sea floor altitude (meters)
    Depth(BoxedInput<f32>),
    /// Water level offset (meters)
    Level(BoxedInput<f32>),
    /// Horizontal current (m/s)
    Flow(BoxedInput<Vec2>),
    /// Vertical acceleration (m/s²)
    DynamicWaves(BoxedInput<f32>),
    /// Displacement added on top of the waves (meters)
    AnimatedWaves(BoxedInput<Vec3>),
    Foam(BoxedInput<f32>),
    Absorption(BoxedInput<Vec3>),
    Scattering(BoxedInput<Vec3>),
    Clip(BoxedInput<f32>),
    Albedo(BoxedInput<Vec4>),
    Shadow(BoxedInput<f32>),
}

impl SimInput {
    pub fn kind(&self) -> SimKind {
        match self {
            SimInput::Depth(_) => SimKind::Depth,
            SimInput::Level(_) => SimKind::Level,
            SimInput::Flow(_) => SimKind::Flow,
            SimInput::DynamicWaves(_) => SimKind::DynamicWaves,
            SimInput::AnimatedWaves(_) => SimKind::AnimatedWaves,
            SimInput::Foam(_) => SimKind::Foam,
            SimInput::Absorption(_) => SimKind::Absorption,
            SimInput::Scattering(_) => SimKind::Scattering,
            SimInput::Clip(_) => SimKind::Clip,
            SimInput::Albedo(_) => SimKind::Albedo,
            SimInput::Shadow(_) => SimKind::Shadow,
        }
    }
}

impl fmt::Debug for SimInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SimInput::{:?}", self.kind())
    }
}

/// Registered inputs, grouped by the simulation they feed
#[derive(Default)]
pub struct InputRegistry {
    pub depth: Vec<BoxedInput<f32>>,
    pub level: Vec<BoxedInput<f32>>,
    pub flow: Vec<BoxedInput<Vec2>>,
    pub dynamic_waves: Vec<BoxedInput<f32>>,
    pub animated_waves: Vec<BoxedInput<Vec3>>,
    pub foam: Vec<BoxedInput<f32>>,
    pub absorption: Vec<BoxedInput<Vec3>>,
    pub scattering: Vec<BoxedInput<Vec3>>,
    pub clip: Vec<BoxedInput<f32>>,
    pub albedo: Vec<BoxedInput<Vec4>>,
    pub shadow: Vec<BoxedInput<f32>>,
}

impl InputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input; returns the simulation it feeds
    pub fn register(&mut self, input: SimInput) -> SimKind {
        let kind = input.kind();
        match input {
            SimInput::Depth(i) => self.depth.push(i),
            SimInput::Level(i) => self.level.push(i),
            SimInput::Flow(i) => self.flow.push(i),
            SimInput::DynamicWaves(i) => self.dynamic_waves.push(i),
            SimInput::AnimatedWaves(i) => self.animated_waves.push(i),
            SimInput::Foam(i) => self.foam.push(i),
            SimInput::Absorption(i) => self.absorption.push(i),
            SimInput::Scattering(i) => self.scattering.push(i),
            SimInput::Clip(i) => self.clip.push(i),
            SimInput::Albedo(i) => self.albedo.push(i),
            SimInput::Shadow(i) => self.shadow.push(i),
        }
        kind
    }

    pub fn count(&self, kind: SimKind) -> usize {
        match kind {
            SimKind::Depth => self.depth.len(),
            SimKind::Level => self.level.len(),
            SimKind::Flow => self.flow.len(),
            SimKind::DynamicWaves => self.dynamic_waves.len(),
            SimKind::AnimatedWaves => self.animated_waves.len(),
            SimKind::Foam => self.foam.len(),
            SimKind::Absorption => self.absorption.len(),
            SimKind::Scattering => self.scattering.len(),
            SimKind::Clip => self.clip.len(),
            SimKind::Albedo => self.albedo.len(),
            SimKind::Shadow => self.shadow.len(),
        }
    }
}

impl fmt::Debug for InputRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in SimKind::ORDER {
            map.entry(&kind, &self.count(kind));
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::LodSettings;

    #[test]
    fn test_blend_modes() {
        assert_eq!(BlendMode::Additive.apply(1.0f32, 2.0, 0.5), 2.0);
        assert_eq!(BlendMode::Alpha.apply(1.0f32, 3.0, 0.5), 2.0);
        assert_eq!(BlendMode::Maximum.apply(1.0f32, 3.0, 0.1), 3.0);
        assert_eq!(BlendMode::Minimum.apply(1.0f32, 3.0, 0.1), 1.0);
    }

    #[test]
    fn test_inputs_blend_in_registration_order() {
        let inputs: Vec<BoxedInput<f32>> = vec![
            Box::new(ConstantInput::new(5.0, BlendMode::Maximum)),
            Box::new(ConstantInput::new(1.0, BlendMode::Additive)),
            Box::new(ConstantInput::new(2.0, BlendMode::Minimum).within(Vec2::ZERO, Vec2::ONE)),
        ];
        assert_eq!(blend_inputs(&inputs, 0.0, Vec2::splat(0.5), 0.0), 2.0);
        assert_eq!(blend_inputs(&inputs, 0.0, Vec2::splat(3.0), 0.0), 6.0);
    }

    #[test]
    fn test_fn_input_coverage() {
        let input = FnInput::new(|p: Vec2, t: f32| (p.x > 0.0).then_some(t), BlendMode::Additive);
        assert_eq!(input.sample(Vec2::X, 2.0).map(|s| s.value), Some(2.0));
        assert!(LodInput::<f32>::sample(&input, -Vec2::X, 2.0).is_none());
    }

    #[test]
    fn test_sphere_impulse_falloff_and_expiry() {
        let sphere = SphereImpulse {
            centre: Vec2::ZERO,
            radius_m: 2.0,
            strength: 4.0,
            until_s: Some(1.0),
        };
        assert_eq!(sphere.sample(Vec2::ZERO, 0.0).map(|s| s.value), Some(4.0));
        assert_eq!(sphere.sample(Vec2::X, 0.0).map(|s| s.value), Some(1.0));
        assert!(sphere.sample(Vec2::new(3.0, 0.0), 0.0).is_none());
        assert!(sphere.sample(Vec2::ZERO, 1.5).is_none());
    }

    #[test]
    fn test_noise_seabed_is_bounded_and_deterministic() {
        let a = NoiseSeabed::new(3, -20.0, 5.0, 100.0);
        let b = NoiseSeabed::new(3, -20.0, 5.0, 100.0);
        for i in 0..50 {
            let p = Vec2::new(i as f32 * 7.3, i as f32 * -3.1);
            let va = a.sample(p, 0.0).unwrap().value;
            assert!((-25.0..=-15.0).contains(&va));
            assert_eq!(va, b.sample(p, 0.0).unwrap().value);
        }
    }

    #[test]
    fn test_slice_for_wavelength_clamps() {
        let stack = CascadeStack::around_viewer(Vec3::ZERO, &LodSettings::default().with_lod_count(4));
        let finest = stack.cascade(0).min_wavelength();
        assert_eq!(slice_for_wavelength(&stack, finest * 0.1), 0);
        assert_eq!(slice_for_wavelength(&stack, finest * 2.5), 1);
        assert_eq!(slice_for_wavelength(&stack, 1.0e6), 3);
    }

    #[test]
    fn test_registry_groups_by_kind() {
        let mut registry = InputRegistry::new();
        let kind = registry.register(SimInput::Foam(Box::new(ConstantInput::new(1.0, BlendMode::Maximum))));
        assert_eq!(kind, SimKind::Foam);
        assert_eq!(registry.count(SimKind::Foam), 1);
        assert_eq!(registry.count(SimKind::Depth), 0);
    }
}

//! Parameter definitions with physical units and documented semantics.
//!
//! All tunables live here with:
//! - Physical units (meters, seconds, Hz, etc.)
//! - Documented ranges and meanings
//! - A `validate` method where a bad value would break a simulation

mod lod;
mod simulation;
mod spectrum;
mod viewer;

// Re-export all types
pub use lod::{LodSettings, MAX_LOD_COUNT, MAX_RESOLUTION, MIN_RESOLUTION};
pub use simulation::{
    AnimatedWaveSettings, DynamicWaveSettings, FoamSettings, QuerySettings, ShadowSettings,
};
pub use spectrum::{
    GerstnerSettings, SpectrumSettings, DEFAULT_GRAVITY, MAX_FFT_RESOLUTION,
    MAX_GERSTNER_COMPONENTS, MIN_FFT_RESOLUTION, OCTAVE_COUNT, SMALLEST_WL_POW_2,
};
pub use viewer::{BasicFlight, FixedViewer, OrbitFlight, ViewerPreset};

use crate::sim::SimKind;

/// Everything needed to build an [`crate::ocean::OceanSystem`]
#[derive(Debug, Clone)]
pub struct OceanConfig {
    /// Cascade stack layout
    pub lod: LodSettings,

    /// Simulations to run. Animated waves always run.
    pub simulations: Vec<SimKind>,

    pub animated_waves: AnimatedWaveSettings,
    pub dynamic_waves: DynamicWaveSettings,
    pub foam: FoamSettings,
    pub shadow: ShadowSettings,
    pub query: QuerySettings,

    /// Gravity shared by the solvers (m/s²)
    pub gravity_mps2: f32,
}

impl Default for OceanConfig {
    fn default() -> Self {
        Self {
            lod: LodSettings::default(),
            simulations: vec![
                SimKind::Depth,
                SimKind::Level,
                SimKind::Flow,
                SimKind::DynamicWaves,
                SimKind::AnimatedWaves,
                SimKind::Foam,
            ],
            animated_waves: AnimatedWaveSettings::default(),
            dynamic_waves: DynamicWaveSettings::default(),
            foam: FoamSettings::default(),
            shadow: ShadowSettings::default(),
            query: QuerySettings::default(),
            gravity_mps2: DEFAULT_GRAVITY,
        }
    }
}

impl OceanConfig {
    pub fn with_lod(mut self, lod: LodSettings) -> Self {
        self.lod = lod;
        self
    }

    /// Enable every simulation variant
    pub fn with_all_simulations(mut self) -> Self {
        self.simulations = SimKind::ORDER.to_vec();
        self
    }

    pub fn with_simulations(mut self, kinds: &[SimKind]) -> Self {
        self.simulations = kinds.to_vec();
        self
    }

    pub fn is_enabled(&self, kind: SimKind) -> bool {
        kind == SimKind::AnimatedWaves || self.simulations.contains(&kind)
    }
}

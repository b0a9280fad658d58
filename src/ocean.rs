//! Cascade stack manager: owns the simulations, wave sources and inputs,
//! and runs one ordered tick at a time around the viewer.

pub mod snapshot;

use std::sync::Arc;

use glam::{Vec2, Vec3};
use log::{debug, info, warn};

use crate::cascade::CascadeStack;
use crate::error::Result;
use crate::params::OceanConfig;
use crate::query::{QueryEngine, QueryKind, QueryRequest, QueryTicket};
use crate::sim::{self, InputRegistry, SimInput, SimKind, Simulation, TickContext};
use crate::spectrum::SpectrumCache;
use crate::waves::WaveSource;

pub use snapshot::{CascadeParams, FrameSnapshot};

/// Viewer altitude above sea level before the first `set_viewer`
const DEFAULT_VIEWER_ALTITUDE_M: f32 = 10.0;

/// High-level ocean system: the single per-tick entry point for the host
pub struct OceanSystem {
    config: OceanConfig,
    viewer: Vec3,
    stack: CascadeStack,
    simulations: Vec<Simulation>,
    sources: Vec<WaveSource>,
    inputs: InputRegistry,
    spectra: SpectrumCache,
    queries: QueryEngine,
    snapshot: Option<Arc<FrameSnapshot>>,
    time_s: f32,
    tick_count: u64,
}

impl OceanSystem {
    /// Build the stack and every enabled simulation.
    ///
    /// Invalid LOD settings are fatal. Invalid per-simulation settings only
    /// disable that simulation.
    pub fn new(config: OceanConfig) -> Result<Self> {
        config.lod.validate()?;
        if let Err(e) = config.query.validate() {
            warn!("Query settings invalid, using defaults: {}", e);
        }

        let viewer = Vec3::new(0.0, config.lod.sea_level_m + DEFAULT_VIEWER_ALTITUDE_M, 0.0);
        let stack = CascadeStack::around_viewer(viewer, &config.lod);
        let simulations: Vec<Simulation> = SimKind::ORDER
            .iter()
            .filter(|kind| config.is_enabled(**kind))
            .map(|kind| Simulation::new(*kind, &stack, &config))
            .collect();
        let query_settings = if config.query.validate().is_ok() {
            config.query.clone()
        } else {
            Default::default()
        };

        info!(
            "Ocean system: {} cascades at {}x{}, {} simulations",
            stack.slice_count(),
            config.lod.resolution,
            config.lod.resolution,
            simulations.len()
        );

        Ok(Self {
            config,
            viewer,
            stack,
            simulations,
            sources: Vec::new(),
            inputs: InputRegistry::new(),
            spectra: SpectrumCache::new(),
            queries: QueryEngine::new(query_settings),
            snapshot: None,
            time_s: 0.0,
            tick_count: 0,
        })
    }

    pub fn config(&self) -> &OceanConfig {
        &self.config
    }

    /// Viewer position for the next tick; altitude comes from `position.y`
    pub fn set_viewer(&mut self, position: Vec3) {
        if position.is_finite() {
            self.viewer = position;
        } else {
            warn!("Ignoring non-finite viewer position {:?}", position);
        }
    }

    pub fn viewer(&self) -> Vec3 {
        self.viewer
    }

    /// Register an input; it applies from the next tick
    pub fn register_input(&mut self, input: SimInput) -> SimKind {
        let kind = input.kind();
        if !self.config.is_enabled(kind) {
            warn!("Input registered for disabled {} simulation", kind.name());
        }
        self.inputs.register(input)
    }

    pub fn inputs(&self) -> &InputRegistry {
        &self.inputs
    }

    /// Add a wave source and return its index. A source with bad settings
    /// is kept but disabled.
    pub fn add_wave_source(&mut self, mut source: WaveSource) -> usize {
        if let Err(e) = source.prepare(&mut self.spectra) {
            warn!("Disabling {} wave source: {}", source.label(), e);
        }
        self.sources.push(source);
        self.sources.len() - 1
    }

    pub fn wave_sources(&self) -> &[WaveSource] {
        &self.sources
    }

    /// Mutable access to a source; setting changes apply on the next tick
    pub fn wave_source_mut(&mut self, index: usize) -> Option<&mut WaveSource> {
        self.sources.get_mut(index)
    }

    pub fn simulation(&self, kind: SimKind) -> Option<&Simulation> {
        self.simulations.iter().find(|s| s.kind() == kind)
    }

    pub fn simulations(&self) -> &[Simulation] {
        &self.simulations
    }

    pub fn stack(&self) -> &CascadeStack {
        &self.stack
    }

    pub fn spectrum_cache(&self) -> &SpectrumCache {
        &self.spectra
    }

    pub fn time(&self) -> f32 {
        self.time_s
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Latest published tick, `None` before the first
    pub fn snapshot(&self) -> Option<Arc<FrameSnapshot>> {
        self.snapshot.clone()
    }

    /// Submit a batch against the latest snapshot. Results are guaranteed
    /// by the start of the next tick.
    pub fn query(&mut self, kind: QueryKind, requests: Vec<QueryRequest>) -> Result<QueryTicket> {
        self.queries.submit(self.snapshot.as_ref(), kind, requests)
    }

    pub fn query_engine(&self) -> &QueryEngine {
        &self.queries
    }

    /// Advance the simulation by `dt` seconds
    pub fn tick(&mut self, dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        // 1. Nothing may read the buffers about to be recycled
        self.queries.complete_in_flight();

        // 2. Re-snap around the viewer
        let stack = CascadeStack::around_viewer(self.viewer, &self.config.lod);
        let shift = stack.source_slice_shift(&self.stack);
        if stack.scale != self.stack.scale {
            debug!(
                "LOD scale {} -> {} (slice shift {})",
                self.stack.scale, stack.scale, shift
            );
        }
        self.stack = stack;
        self.time_s += dt;

        // 3. Wave sources
        self.spectra.begin_tick();
        let finest = self.stack.cascade(0).min_wavelength();
        for source in &mut self.sources {
            let was_valid = source.is_valid();
            if let Err(e) = source.prepare(&mut self.spectra) {
                if was_valid {
                    warn!("Disabling {} wave source: {}", source.label(), e);
                }
                continue;
            }
            source.update(self.time_s, finest);
        }

        // 4. Simulations in declared order
        let ctx = TickContext {
            stack: &self.stack,
            source_slice_shift: shift,
            dt,
            time_s: self.time_s,
            sea_level_m: self.config.lod.sea_level_m,
            gravity_mps2: self.config.gravity_mps2,
            sources: &self.sources,
            inputs: &self.inputs,
        };
        sim::run_tick(&mut self.simulations, &ctx);

        // 5-6. Publish; queries from here on read this tick
        self.tick_count += 1;
        self.snapshot = Some(Arc::new(FrameSnapshot::capture(
            self.tick_count,
            self.time_s,
            self.config.lod.sea_level_m,
            self.viewer,
            &self.stack,
            &self.simulations,
        )));

        // 7. Spectra nothing holds any more
        self.spectra.retire_unused();
    }

    /// Release every simulation's storage
    pub fn destroy(&mut self) {
        self.queries.complete_in_flight();
        for sim in &mut self.simulations {
            sim.destroy();
        }
        self.snapshot = None;
    }

    /// World XZ of the viewer
    pub fn viewer_xz(&self) -> Vec2 {
        Vec2::new(self.viewer.x, self.viewer.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{LodSettings, SpectrumSettings};
    use crate::query::QueryResult;
    use crate::sim::inputs::{BlendMode, ConstantInput};

    fn small_config() -> OceanConfig {
        OceanConfig::default().with_lod(LodSettings::default().with_lod_count(3).with_resolution(16))
    }

    #[test]
    fn test_bad_lod_settings_fail_construction() {
        let config = OceanConfig::default().with_lod(LodSettings::default().with_resolution(20));
        assert!(OceanSystem::new(config).is_err());
    }

    #[test]
    fn test_query_before_first_tick() {
        let mut ocean = OceanSystem::new(small_config()).unwrap();
        assert!(ocean.snapshot().is_none());
        assert!(ocean
            .query(QueryKind::Depth, vec![QueryRequest::new(Vec2::ZERO, 1.0)])
            .is_err());
    }

    #[test]
    fn test_tick_publishes_snapshot() {
        let mut ocean = OceanSystem::new(small_config()).unwrap();
        ocean.tick(0.1);
        let snapshot = ocean.snapshot().unwrap();
        assert_eq!(snapshot.tick, 1);
        assert!((snapshot.time_s - 0.1).abs() < 1e-6);
        assert_eq!(snapshot.cascade_params.len(), 4);
        assert!(snapshot.displacement().is_some());
    }

    #[test]
    fn test_invalid_source_disabled_rest_runs() {
        let mut ocean = OceanSystem::new(small_config()).unwrap();
        let bad = ocean.add_wave_source(WaveSource::fft(SpectrumSettings::default().with_resolution(12)));
        let good = ocean.add_wave_source(WaveSource::fft(SpectrumSettings::default().with_resolution(16)));
        assert!(!ocean.wave_sources()[bad].is_valid());
        assert!(ocean.wave_sources()[good].is_valid());
        ocean.tick(0.1);
        let displacement = ocean.snapshot().unwrap().displacement().cloned().unwrap();
        assert!(displacement.data().iter().any(|d| d.length() > 0.0));
    }

    #[test]
    fn test_viewer_climb_shifts_slices() {
        let mut ocean = OceanSystem::new(small_config()).unwrap();
        ocean.set_viewer(Vec3::new(0.0, 10.0, 0.0));
        ocean.tick(0.1);
        let before = ocean.stack().scale;
        ocean.set_viewer(Vec3::new(0.0, 40.0, 0.0));
        ocean.tick(0.1);
        assert_eq!(ocean.stack().scale, 4.0 * before);
    }

    #[test]
    fn test_depth_query_sees_registered_floor() {
        let mut ocean = OceanSystem::new(small_config()).unwrap();
        ocean.register_input(SimInput::Depth(Box::new(ConstantInput::new(-3.0, BlendMode::Maximum))));
        ocean.tick(0.1);
        let results = ocean
            .query(QueryKind::Depth, vec![QueryRequest::new(Vec2::ZERO, 1.0)])
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(results, vec![QueryResult::Depth(3.0)]);
    }

    #[test]
    fn test_surface_height_reads_level_at_rest_position() {
        use crate::sim::inputs::FnInput;
        use crate::waves::{GerstnerComponent, GerstnerWaves};

        let mut ocean = OceanSystem::new(small_config()).unwrap();
        ocean.register_input(SimInput::Level(Box::new(FnInput::new(
            |p: Vec2, _: f32| Some(0.1 * p.x),
            BlendMode::Additive,
        ))));
        let waves = GerstnerWaves::new(vec![GerstnerComponent::new(64.0, 0.5, 0.0)]);
        ocean.add_wave_source(WaveSource::gerstner(waves));
        ocean.set_viewer(Vec3::new(0.0, 10.0, 0.0));
        ocean.tick(0.7);

        let requests = (0..9)
            .map(|i| QueryRequest::new(Vec2::new(i as f32 * 2.0 - 8.0, 2.0), 1.0))
            .collect();
        let results = ocean
            .query(QueryKind::Displacement, requests)
            .unwrap()
            .wait()
            .unwrap();

        let mut largest_shift = 0.0f32;
        for (i, result) in results.iter().enumerate() {
            let QueryResult::Displacement(sample) = result else {
                panic!("no surface for request {}: {:?}", i, result);
            };
            let target_x = i as f32 * 2.0 - 8.0;
            let d = sample.displacement;
            let expected = 0.1 * (target_x - d.x) + d.y;
            assert!(
                (sample.height_m - expected).abs() <= 0.1 * sample.residual_m + 1e-3,
                "request {}: height {} expected {}",
                i,
                sample.height_m,
                expected
            );
            largest_shift = largest_shift.max(d.x.abs());
        }
        // The rest position differs from the target by enough to matter
        assert!(largest_shift > 0.1);
    }

    #[test]
    fn test_spectrum_swap_retires_old() {
        let mut ocean = OceanSystem::new(small_config()).unwrap();
        let index = ocean.add_wave_source(WaveSource::fft(SpectrumSettings::default().with_resolution(16)));
        ocean.tick(0.1);
        assert_eq!(ocean.spectrum_cache().len(), 1);

        if let Some(WaveSource::Fft(fft)) = ocean.wave_source_mut(index) {
            let mut settings = fft.settings().clone();
            settings.wind_speed_mps = 15.0;
            fft.set_settings(settings);
        }
        ocean.tick(0.1);
        assert_eq!(ocean.spectrum_cache().len(), 1);
    }
}

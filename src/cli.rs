//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::info;

use wavecascade::params::{
    BasicFlight, FixedViewer, GerstnerSettings, LodSettings, OceanConfig, OrbitFlight,
    SpectrumSettings, ViewerPreset,
};
use wavecascade::sim::SimKind;

/// Wave source selection
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaveMode {
    Fft,
    Gerstner,
    Both,
}

/// Viewer path selection
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewerMode {
    Fixed,
    Basic,
    Orbit,
}

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "wavecascade")]
#[command(about = "Headless cascaded ocean wave simulation", long_about = None)]
pub struct Args {
    /// Number of simulation ticks to run
    #[arg(long, default_value_t = 120)]
    pub ticks: u32,

    /// Tick length (seconds)
    #[arg(long, value_name = "SECONDS", default_value_t = 1.0 / 60.0)]
    pub dt: f32,

    /// Cascade count
    #[arg(long, default_value_t = 5)]
    pub lods: usize,

    /// Texels per cascade side (power of two)
    #[arg(long, default_value_t = 64)]
    pub resolution: u32,

    /// Wind speed (m/s)
    #[arg(long, value_name = "M_PER_S", default_value_t = 10.0)]
    pub wind: f32,

    /// Turbulence in [0, 1]
    #[arg(long, default_value_t = 0.15)]
    pub turbulence: f32,

    /// Directional alignment in [0, 1]
    #[arg(long, default_value_t = 0.0)]
    pub alignment: f32,

    /// FFT resolution per wave slice (power of two)
    #[arg(long, default_value_t = 64)]
    pub fft_resolution: u32,

    /// Spectrum seed
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Spectrum loop period (seconds)
    #[arg(long, value_name = "SECONDS")]
    pub loop_period: Option<f32>,

    /// Wave synthesis path
    #[arg(long, value_enum, default_value_t = WaveMode::Fft)]
    pub waves: WaveMode,

    /// Viewer path
    #[arg(long, value_enum, default_value_t = ViewerMode::Fixed)]
    pub viewer: ViewerMode,

    /// Viewer altitude for the fixed path (meters above sea level)
    #[arg(long, value_name = "METERS", default_value_t = 10.0)]
    pub elevation: f32,

    /// Run every simulation variant, not just the default set
    #[arg(long)]
    pub all_simulations: bool,

    /// Add a procedural sea floor with shallows
    #[arg(long)]
    pub seabed: bool,

    /// Drop a sphere into the dynamic waves at the origin
    #[arg(long)]
    pub splash: bool,

    /// Write PNGs of every slice to this directory after the run
    #[arg(long, value_name = "DIR")]
    pub export: Option<PathBuf>,
}

impl Args {
    pub fn to_config(&self) -> OceanConfig {
        let lod = LodSettings::default()
            .with_lod_count(self.lods)
            .with_resolution(self.resolution);
        let config = OceanConfig::default().with_lod(lod);
        if self.all_simulations {
            config.with_all_simulations()
        } else {
            config
        }
    }

    pub fn spectrum_settings(&self) -> SpectrumSettings {
        let settings = SpectrumSettings::default()
            .with_wind(self.wind, self.turbulence, self.alignment)
            .with_resolution(self.fft_resolution)
            .with_seed(self.seed);
        match self.loop_period {
            Some(period) => settings.with_loop_period(period),
            None => settings,
        }
    }

    pub fn gerstner_settings(&self) -> GerstnerSettings {
        GerstnerSettings::default()
    }

    /// Parse viewer preset from command-line arguments
    pub fn viewer_preset(&self) -> ViewerPreset {
        match self.viewer {
            ViewerMode::Fixed => {
                info!("Viewer: fixed (elevation: {}m)", self.elevation);
                let mut fixed = FixedViewer::default();
                fixed.position[1] = self.elevation;
                ViewerPreset::Fixed(fixed)
            }
            ViewerMode::Basic => {
                info!("Viewer: basic (straight-line flight)");
                ViewerPreset::Basic(BasicFlight::default())
            }
            ViewerMode::Orbit => {
                info!("Viewer: orbit (circling, climbing and diving)");
                ViewerPreset::Orbit(OrbitFlight::default())
            }
        }
    }

    /// Simulations worth exporting after a run
    pub fn export_kinds(&self) -> Vec<SimKind> {
        let mut kinds = vec![SimKind::AnimatedWaves, SimKind::Foam, SimKind::DynamicWaves];
        if self.seabed {
            kinds.push(SimKind::Depth);
        }
        kinds
    }
}

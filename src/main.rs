//! wavecascade - headless driver for the cascaded ocean simulation
//!
//! Flies a scripted viewer over the water for a number of ticks, then
//! reports what each cascade holds and optionally dumps it to PNG.

mod cli;

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use glam::Vec2;
use log::info;

use cli::{Args, WaveMode};
use wavecascade::export::write_slice_png;
use wavecascade::fft::analysis::{octave_energy, Window};
use wavecascade::ocean::OceanSystem;
use wavecascade::query::{QueryKind, QueryRequest, QueryResult};
use wavecascade::sim::inputs::{NoiseSeabed, SphereImpulse};
use wavecascade::sim::SimInput;
use wavecascade::viewer::ViewerPath;
use wavecascade::waves::{GerstnerWaves, WaveSource};

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = args.to_config();
    let sea_level = config.lod.sea_level_m;
    let mut ocean = OceanSystem::new(config).context("Failed to build ocean system")?;

    let spectrum = args.spectrum_settings();
    if matches!(args.waves, WaveMode::Fft | WaveMode::Both) {
        ocean.add_wave_source(WaveSource::fft(spectrum.clone()));
    }
    if matches!(args.waves, WaveMode::Gerstner | WaveMode::Both) {
        let gerstner = GerstnerWaves::from_spectrum(&spectrum, &args.gerstner_settings())
            .context("Failed to build Gerstner components")?;
        ocean.add_wave_source(WaveSource::gerstner(gerstner));
    }
    if args.seabed {
        ocean.register_input(SimInput::Depth(Box::new(NoiseSeabed::new(
            args.seed as u32,
            sea_level - 6.0,
            8.0,
            120.0,
        ))));
    }
    if args.splash {
        ocean.register_input(SimInput::DynamicWaves(Box::new(SphereImpulse {
            centre: Vec2::ZERO,
            radius_m: 1.5,
            strength: -30.0,
            until_s: Some(0.25),
        })));
    }

    let path = ViewerPath::new(args.viewer_preset(), sea_level);
    let start = Instant::now();
    for _ in 0..args.ticks {
        ocean.set_viewer(path.position(ocean.time()));
        ocean.tick(args.dt);
    }
    let elapsed = start.elapsed();
    println!(
        "Simulated {:.2}s in {} ticks ({:.2}ms per tick)",
        ocean.time(),
        ocean.tick_count(),
        elapsed.as_secs_f64() * 1000.0 / args.ticks.max(1) as f64
    );

    let snapshot = ocean
        .snapshot()
        .context("No tick ran; nothing to report")?;
    println!(
        "Viewer at ({:.1}, {:.1}, {:.1}), scale {} m, alpha {:.2}",
        snapshot.viewer.x, snapshot.viewer.y, snapshot.viewer.z, snapshot.stack.scale, snapshot.stack.alpha
    );

    if let Some(displacement) = snapshot.displacement() {
        let res = displacement.resolution();
        for (slice, cascade) in snapshot.stack.cascades().iter().enumerate() {
            let heights: Vec<f32> = displacement.slice(slice).iter().map(|d| d.y).collect();
            let (lo, hi) = heights
                .iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), h| (lo.min(*h), hi.max(*h)));
            let foam = snapshot
                .foam()
                .map(|f| f.slice(slice).iter().copied().fold(0.0f32, f32::max))
                .unwrap_or(0.0);
            println!(
                "  slice {}: {:7.1} m wide, texel {:.3} m, height [{:+.3}, {:+.3}] m, max foam {:.3}",
                slice,
                cascade.world_size(),
                cascade.texel_size,
                lo,
                hi,
                foam
            );
        }

        let heights: Vec<f32> = displacement.slice(0).iter().map(|d| d.y).collect();
        let energy = octave_energy(&heights, res, snapshot.stack.cascade(0).world_size(), Window::Hann);
        println!("Slice 0 height variance by octave:");
        for (wavelength, variance) in energy.non_empty() {
            println!("  >= {:8.3} m: {:.6} m^2", wavelength, variance);
        }
    }

    let probe = Vec2::new(snapshot.viewer.x, snapshot.viewer.z);
    let results = ocean
        .query(QueryKind::Displacement, vec![QueryRequest::new(probe, 0.5)])?
        .wait()?;
    match results.first() {
        Some(QueryResult::Displacement(s)) => println!(
            "Surface under viewer: height {:+.3} m, normal ({:.3}, {:.3}, {:.3}), residual {:.4} m{}",
            s.height_m,
            s.normal.x,
            s.normal.y,
            s.normal.z,
            s.residual_m,
            if s.converged { "" } else { " (not converged)" }
        ),
        _ => println!("Surface under viewer: unavailable"),
    }

    if let Some(dir) = &args.export {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create export directory {}", dir.display()))?;
        for kind in args.export_kinds() {
            let Some(binding) = snapshot.binding(kind) else {
                continue;
            };
            for slice in 0..snapshot.stack.slice_count() {
                let file = dir.join(format!("{}_{}.png", kind.name(), slice));
                let range = write_slice_png(binding, slice, &file)
                    .with_context(|| format!("Failed to write {}", file.display()))?;
                info!("Wrote {} [{:.3}, {:.3}]", file.display(), range.min, range.max);
            }
        }
        println!("Exported slices to {}", dir.display());
    }

    Ok(())
}

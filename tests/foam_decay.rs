use glam::{Vec2, Vec3};
use wavecascade::params::{LodSettings, OceanConfig};
use wavecascade::sim::inputs::{BlendMode, FnInput};
use wavecascade::sim::SimInput;
use wavecascade::OceanSystem;

fn foam_ocean() -> OceanSystem {
    let mut config =
        OceanConfig::default().with_lod(LodSettings::default().with_lod_count(3).with_resolution(32));
    // No wave-driven foam; only the injected burst
    config.foam.wave_foam_coverage = -10.0;
    config.foam.fade_rate = 1.0;
    let mut ocean = OceanSystem::new(config).unwrap();
    ocean.set_viewer(Vec3::new(0.0, 10.0, 0.0));
    ocean
}

fn max_foam(ocean: &OceanSystem) -> f32 {
    let snapshot = ocean.snapshot().unwrap();
    let foam = snapshot.foam().unwrap();
    foam.data().iter().copied().fold(0.0, f32::max)
}

#[test]
fn injected_foam_decays_away() {
    let mut ocean = foam_ocean();
    ocean.register_input(SimInput::Foam(Box::new(FnInput::new(
        |_: Vec2, t: f32| (t < 0.15).then_some(1.0f32),
        BlendMode::Maximum,
    ))));

    ocean.tick(0.1);
    assert!((max_foam(&ocean) - 1.0).abs() < 1e-5);

    let mut last = max_foam(&ocean);
    for _ in 0..50 {
        ocean.tick(0.1);
        let now = max_foam(&ocean);
        assert!(now <= last + 1e-6, "foam grew from {} to {}", last, now);
        last = now;
    }
    assert!(last < 0.01, "foam still at {} after 5s", last);
}

#[test]
fn foam_without_inputs_stays_empty() {
    let mut ocean = foam_ocean();
    for _ in 0..10 {
        ocean.tick(0.1);
    }
    assert_eq!(max_foam(&ocean), 0.0);
}

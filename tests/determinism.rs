use glam::Vec3;
use wavecascade::params::{LodSettings, OceanConfig, SpectrumSettings};
use wavecascade::waves::WaveSource;
use wavecascade::OceanSystem;

fn run(seed: u64, ticks: u32) -> OceanSystem {
    let config =
        OceanConfig::default().with_lod(LodSettings::default().with_lod_count(3).with_resolution(32));
    let mut ocean = OceanSystem::new(config).unwrap();
    ocean.add_wave_source(WaveSource::fft(
        SpectrumSettings::default()
            .with_wind(12.0, 0.3, 0.5)
            .with_resolution(32)
            .with_seed(seed),
    ));
    ocean.set_viewer(Vec3::new(3.0, 12.0, -7.0));
    for _ in 0..ticks {
        ocean.tick(1.0 / 30.0);
    }
    ocean
}

fn heights(ocean: &OceanSystem) -> Vec<Vec3> {
    ocean.snapshot().unwrap().displacement().unwrap().data().to_vec()
}

#[test]
fn same_seed_same_ocean() {
    let a = run(42, 5);
    let b = run(42, 5);

    let (WaveSource::Fft(fa), WaveSource::Fft(fb)) = (&a.wave_sources()[0], &b.wave_sources()[0]) else {
        panic!("expected FFT sources");
    };
    let (sa, sb) = (fa.spectrum().unwrap(), fb.spectrum().unwrap());
    for slice in 0..sa.slice_count() {
        let ha: Vec<_> = sa.slice(slice).iter().map(|t| (t.h0, t.h0_minus_conj)).collect();
        let hb: Vec<_> = sb.slice(slice).iter().map(|t| (t.h0, t.h0_minus_conj)).collect();
        assert_eq!(ha, hb, "spectrum slice {} differs", slice);
    }

    assert_eq!(heights(&a), heights(&b));
}

#[test]
fn different_seed_different_ocean() {
    let a = run(1, 2);
    let b = run(2, 2);
    assert_ne!(heights(&a), heights(&b));
}

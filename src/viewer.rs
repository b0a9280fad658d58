//! Scripted viewer paths for headless runs.

use glam::Vec3;

use crate::params::{BasicFlight, FixedViewer, OrbitFlight, ViewerPreset};

/// Viewer position as a function of time
pub struct ViewerPath {
    preset: ViewerPreset,
    sea_level_m: f32,
}

impl ViewerPath {
    pub fn new(preset: ViewerPreset, sea_level_m: f32) -> Self {
        Self {
            preset,
            sea_level_m,
        }
    }

    pub fn preset(&self) -> &ViewerPreset {
        &self.preset
    }

    /// World-space viewer position at `time_s`
    pub fn position(&self, time_s: f32) -> Vec3 {
        let local = match &self.preset {
            ViewerPreset::Fixed(p) => Self::fixed(p),
            ViewerPreset::Basic(p) => Self::basic(p, time_s),
            ViewerPreset::Orbit(p) => Self::orbit(p, time_s),
        };
        local + Vec3::Y * self.sea_level_m
    }

    fn fixed(p: &FixedViewer) -> Vec3 {
        Vec3::from_array(p.position)
    }

    /// Straight line along +Z at constant altitude
    fn basic(p: &BasicFlight, time_s: f32) -> Vec3 {
        Vec3::new(0.0, p.altitude_m, time_s * p.forward_speed_m_per_s)
    }

    /// Circle around the origin while the altitude swings, so the LOD scale
    /// crosses several power-of-two boundaries
    fn orbit(p: &OrbitFlight, time_s: f32) -> Vec3 {
        let angle = time_s * p.angular_speed_rad_per_s;
        let swing = (time_s * p.altitude_swing_hz * std::f32::consts::TAU).sin() * p.altitude_swing_m;
        let y = (p.base_altitude_m + swing).max(p.min_altitude_m);
        Vec3::new(angle.cos() * p.radius_m, y, angle.sin() * p.radius_m)
    }
}

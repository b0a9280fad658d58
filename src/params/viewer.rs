//! Viewer path configuration and presets.

/// Stationary viewer (for debugging and baking)
#[derive(Debug, Clone)]
pub struct FixedViewer {
    /// Viewer position (meters)
    pub position: [f32; 3],
}

impl Default for FixedViewer {
    fn default() -> Self {
        Self {
            position: [0.0, 10.0, 0.0],
        }
    }
}

/// Straight-line flight at constant altitude
#[derive(Debug, Clone)]
pub struct BasicFlight {
    /// Constant altitude above sea level (meters)
    pub altitude_m: f32,

    /// Forward movement speed along +Z (meters per second)
    pub forward_speed_m_per_s: f32,
}

impl Default for BasicFlight {
    fn default() -> Self {
        Self {
            altitude_m: 30.0,
            forward_speed_m_per_s: 15.0,
        }
    }
}

/// Circling flight that also climbs and dives, exercising LOD blending
#[derive(Debug, Clone)]
pub struct OrbitFlight {
    /// Orbit radius (meters)
    pub radius_m: f32,

    /// Angular speed (radians per second)
    pub angular_speed_rad_per_s: f32,

    /// Base altitude (meters)
    pub base_altitude_m: f32,

    /// Altitude swing amplitude (meters)
    pub altitude_swing_m: f32,

    /// Altitude swing frequency (Hz)
    pub altitude_swing_hz: f32,

    /// Lowest altitude allowed (meters)
    pub min_altitude_m: f32,
}

impl Default for OrbitFlight {
    fn default() -> Self {
        Self {
            radius_m: 200.0,
            angular_speed_rad_per_s: 0.05,
            base_altitude_m: 60.0,
            altitude_swing_m: 50.0,
            altitude_swing_hz: 0.02,
            min_altitude_m: 2.0,
        }
    }
}

/// Viewer preset selection
#[derive(Debug, Clone)]
pub enum ViewerPreset {
    /// Fixed preset: stationary viewer
    Fixed(FixedViewer),

    /// Basic preset: straight-line flight at constant altitude
    Basic(BasicFlight),

    /// Orbit preset: circling, climbing and diving
    Orbit(OrbitFlight),
}

impl Default for ViewerPreset {
    fn default() -> Self {
        Self::Fixed(FixedViewer::default())
    }
}

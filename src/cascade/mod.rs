//! Cascade geometry: coordinate mapping for one square grid and the
//! power-of-two nested stack of them around the viewer.
//!
//! Slice 0 is the finest cascade. Slice `i` covers `4 * scale * 2^i` meters
//! per side. Origins are snapped to whole texels so texel centres never
//! slide between ticks.

pub mod texture;

use glam::{UVec2, Vec2, Vec3};

use crate::params::LodSettings;
use crate::spectrum::WaveBand;

/// A wave needs this many texels per wavelength to be represented in a slice
pub const MIN_TEXELS_PER_WAVE: f32 = 4.0;

/// One square grid of simulation texels at a fixed world-space placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cascade {
    /// Snapped world-space XZ centre (meters)
    pub origin: Vec2,
    /// World units per texel (meters)
    pub texel_size: f32,
    /// Texels per side
    pub resolution: u32,
}

impl Cascade {
    pub fn new(origin: Vec2, texel_size: f32, resolution: u32) -> Self {
        Self {
            origin,
            texel_size,
            resolution,
        }
    }

    /// Cascade centred on `viewer_xz` rounded down to a whole texel
    pub fn snapped(viewer_xz: Vec2, texel_size: f32, resolution: u32) -> Self {
        let origin = Vec2::new(
            viewer_xz.x - viewer_xz.x.rem_euclid(texel_size),
            viewer_xz.y - viewer_xz.y.rem_euclid(texel_size),
        );
        Self::new(origin, texel_size, resolution)
    }

    /// Side length in meters
    pub fn world_size(&self) -> f32 {
        self.texel_size * self.resolution as f32
    }

    /// Shortest wavelength this cascade can hold (meters)
    pub fn min_wavelength(&self) -> f32 {
        self.texel_size * MIN_TEXELS_PER_WAVE
    }

    /// Upper end of this cascade's own octave band (meters)
    pub fn max_wavelength(&self) -> f32 {
        2.0 * self.min_wavelength()
    }

    /// World XZ position of a texel centre
    pub fn id_to_world(&self, id: UVec2) -> Vec2 {
        let half = self.resolution as f32 * 0.5;
        self.origin + (id.as_vec2() + 0.5 - half) * self.texel_size
    }

    /// Normalized [0, 1)² coordinate of a world XZ position
    pub fn world_to_uv(&self, world: Vec2) -> Vec2 {
        (world - self.origin) / self.world_size() + 0.5
    }

    pub fn uv_to_world(&self, uv: Vec2) -> Vec2 {
        self.origin + (uv - 0.5) * self.world_size()
    }

    /// Continuous texel coordinate; texel `i` spans `[i, i + 1)`
    pub fn world_to_texel(&self, world: Vec2) -> Vec2 {
        self.world_to_uv(world) * self.resolution as f32
    }

    pub fn contains(&self, world: Vec2) -> bool {
        let uv = self.world_to_uv(world);
        uv.x >= 0.0 && uv.x < 1.0 && uv.y >= 0.0 && uv.y < 1.0
    }
}

/// Base scale and blend factor derived from viewer altitude
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LodScale {
    /// Power-of-two base scale (meters)
    pub scale: f32,
    /// Position of the altitude between `scale` and `2 * scale`, in [0, 1)
    pub alpha: f32,
}

impl LodScale {
    /// Scale from viewer altitude above the water.
    ///
    /// `alpha` is continuous in altitude; at the integer-power boundaries
    /// it wraps from 1 to 0 exactly when `scale` doubles.
    pub fn from_altitude(altitude_m: f32, settings: &LodSettings) -> Self {
        let mut level = altitude_m.abs().max(settings.min_scale_m);
        if let Some(max) = settings.max_scale_m {
            level = level.min(1.99 * max);
        }
        if !level.is_finite() {
            level = settings.min_scale_m;
        }

        let l2 = level.log2();
        let l2f = l2.floor();
        Self {
            scale: 2f32.powf(l2f),
            alpha: l2 - l2f,
        }
    }
}

/// The ordered slices for one tick, plus a duplicate of the coarsest
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeStack {
    pub scale: f32,
    pub alpha: f32,
    /// `k + 1` entries, the last repeating slice `k - 1`
    cascades: Vec<Cascade>,
}

impl CascadeStack {
    /// Stack snapped around `viewer` for the current tick
    pub fn around_viewer(viewer: Vec3, settings: &LodSettings) -> Self {
        let lod_scale = LodScale::from_altitude(viewer.y - settings.sea_level_m, settings);
        Self::with_scale(
            Vec2::new(viewer.x, viewer.z),
            lod_scale,
            settings.lod_count,
            settings.resolution,
        )
    }

    pub fn with_scale(viewer_xz: Vec2, lod_scale: LodScale, lod_count: usize, resolution: u32) -> Self {
        let mut cascades = Vec::with_capacity(lod_count + 1);
        for slice in 0..lod_count {
            let world_size = 4.0 * lod_scale.scale * 2f32.powi(slice as i32);
            let texel_size = world_size / resolution as f32;
            cascades.push(Cascade::snapped(viewer_xz, texel_size, resolution));
        }
        if let Some(last) = cascades.last().copied() {
            cascades.push(last);
        }

        Self {
            scale: lod_scale.scale,
            alpha: lod_scale.alpha,
            cascades,
        }
    }

    /// Stack with no slices, used for released storage
    pub fn empty() -> Self {
        Self {
            scale: 1.0,
            alpha: 0.0,
            cascades: Vec::new(),
        }
    }

    /// Number of real slices `k`
    pub fn slice_count(&self) -> usize {
        self.cascades.len().saturating_sub(1)
    }

    pub fn resolution(&self) -> u32 {
        self.cascades.first().map(|c| c.resolution).unwrap_or(0)
    }

    /// Slice `index`; indices past the coarsest read the duplicate entry
    pub fn cascade(&self, index: usize) -> &Cascade {
        let last = self.cascades.len().saturating_sub(1);
        &self.cascades[index.min(last)]
    }

    /// All slices including the trailing duplicate
    pub fn cascades_with_duplicate(&self) -> &[Cascade] {
        &self.cascades
    }

    pub fn cascades(&self) -> &[Cascade] {
        &self.cascades[..self.slice_count()]
    }

    /// Wave content weight for a slice's own octave band.
    ///
    /// The finest band fades out as the viewer climbs toward the next scale,
    /// where it would otherwise vanish abruptly.
    pub fn weight(&self, slice: usize) -> f32 {
        if slice == 0 {
            1.0 - self.alpha
        } else {
            1.0
        }
    }

    /// Wavelengths slice `slice` represents itself. The coarsest slice
    /// also takes everything longer.
    pub fn band(&self, slice: usize) -> WaveBand {
        let cascade = self.cascade(slice);
        WaveBand {
            min_wavelength: cascade.min_wavelength(),
            max_wavelength: if slice + 1 >= self.slice_count() {
                f32::INFINITY
            } else {
                cascade.max_wavelength()
            },
        }
    }

    /// Geometry blend toward double scale for the transition slice (and its
    /// duplicate)
    pub fn mesh_scale_lerp(&self, slice: usize) -> f32 {
        if slice + 1 >= self.slice_count() {
            self.alpha
        } else {
            0.0
        }
    }

    /// Offset from a slice index in this stack to the slice with the same
    /// texel size in `previous` (+1 when the scale doubled)
    pub fn source_slice_shift(&self, previous: &CascadeStack) -> i32 {
        (self.scale / previous.scale).log2().round() as i32
    }

    /// Finest slice containing `world`, if any
    pub fn finest_containing(&self, world: Vec2) -> Option<usize> {
        self.cascades().iter().position(|c| c.contains(world))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> LodSettings {
        LodSettings::default().with_lod_count(5).with_resolution(64)
    }

    #[test]
    fn test_nesting_doubles_extent() {
        let stack = CascadeStack::around_viewer(Vec3::new(13.7, 20.0, -4.2), &settings());
        for i in 0..stack.slice_count() - 1 {
            let fine = stack.cascade(i).world_size();
            let coarse = stack.cascade(i + 1).world_size();
            assert_eq!(coarse, 2.0 * fine);
        }
    }

    #[test]
    fn test_duplicate_slice_appended() {
        let stack = CascadeStack::around_viewer(Vec3::ZERO, &settings());
        assert_eq!(stack.slice_count(), 5);
        assert_eq!(stack.cascades_with_duplicate().len(), 6);
        assert_eq!(stack.cascade(5), stack.cascade(4));
        assert_eq!(stack.cascade(99), stack.cascade(4));
    }

    #[test]
    fn test_uv_round_trip() {
        let cascade = Cascade::snapped(Vec2::new(101.3, -57.9), 0.5, 64);
        for y in [0u32, 7, 31, 63] {
            for x in [0u32, 1, 32, 63] {
                let id = UVec2::new(x, y);
                let uv = cascade.world_to_uv(cascade.id_to_world(id));
                let expected = (id.as_vec2() + 0.5) / 64.0;
                assert!((uv - expected).abs().max_element() < 1.0 / 64.0 * 1e-3);
                assert!(cascade.contains(cascade.id_to_world(id)));
            }
        }
    }

    #[test]
    fn test_snapping_moves_by_whole_texels() {
        let texel = 0.25;
        let a = Cascade::snapped(Vec2::new(10.03, 4.51), texel, 32);
        let b = Cascade::snapped(Vec2::new(10.61, 4.97), texel, 32);

        let delta = (b.origin - a.origin) / texel;
        assert!((delta - delta.round()).abs().max_element() < 1e-4);

        // Texel centres of b land on texel centres of a
        let p = b.id_to_world(UVec2::new(5, 9));
        let t = a.world_to_texel(p) - 0.5;
        assert!((t - t.round()).abs().max_element() < 1e-3);
    }

    #[test]
    fn test_altitude_alpha_continuous() {
        let settings = LodSettings::default();
        let below = LodScale::from_altitude(31.999, &settings);
        let above = LodScale::from_altitude(32.001, &settings);
        assert_eq!(below.scale, 16.0);
        assert_eq!(above.scale, 32.0);
        assert!(below.alpha > 0.99);
        assert!(above.alpha < 0.01);

        let mid = LodScale::from_altitude(20.0, &settings);
        assert!(mid.alpha > 0.0 && mid.alpha < 1.0);
    }

    #[test]
    fn test_altitude_clamped_to_scale_range() {
        let settings = LodSettings::default();
        let low = LodScale::from_altitude(0.5, &settings);
        assert_eq!(low.scale, settings.min_scale_m);
        assert_eq!(low.alpha, 0.0);

        let high = LodScale::from_altitude(1.0e6, &settings);
        assert_eq!(Some(high.scale), settings.max_scale_m);
    }

    #[test]
    fn test_total_weight_continuous_across_scale_pop() {
        // Content of the band [m, 2m) in slice 0 fades to zero before the pop,
        // the band [2m, 4m) has weight 1 on both sides.
        let settings = settings();
        let before = CascadeStack::around_viewer(Vec3::new(0.0, 31.999, 0.0), &settings);
        let after = CascadeStack::around_viewer(Vec3::new(0.0, 32.001, 0.0), &settings);
        assert!(before.weight(0) < 1e-3);
        assert_eq!(after.cascade(0).min_wavelength(), before.cascade(1).min_wavelength());
        assert!((after.weight(0) - before.weight(1)).abs() < 1e-3);
        assert_eq!(after.source_slice_shift(&before), 1);
    }

    #[test]
    fn test_bands_partition_without_overlap() {
        let stack = CascadeStack::around_viewer(Vec3::new(0.0, 40.0, 0.0), &settings());
        for i in 0..stack.slice_count() - 1 {
            assert_eq!(stack.band(i).max_wavelength, stack.band(i + 1).min_wavelength);
            assert!(!stack.band(i).overlaps(&stack.band(i + 1)));
        }
        assert!(stack.band(stack.slice_count() - 1).max_wavelength.is_infinite());
    }

    #[test]
    fn test_min_wavelength_is_power_of_two() {
        let stack = CascadeStack::around_viewer(Vec3::new(0.0, 50.0, 0.0), &settings());
        for cascade in stack.cascades() {
            assert_eq!(cascade.min_wavelength().log2().fract(), 0.0);
        }
    }
}

//! Immutable per-tick view of the simulation handed to the host and to
//! queries.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::cascade::texture::SliceArray;
use crate::cascade::CascadeStack;
use crate::sim::{SimKind, Simulation, TextureBinding};

/// Per-cascade sampling parameters (one entry per slice plus the duplicate)
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CascadeParams {
    pub origin: [f32; 2],
    pub texel_size: f32,
    /// World-space side length (meters)
    pub scale: f32,
    /// Own-band wave weight
    pub weight: f32,
    /// Longest wavelength of the slice's own octave (meters)
    pub max_wavelength: f32,
    /// Geometry blend toward double scale
    pub mesh_scale_lerp: f32,
    pub _pad: f32,
}

/// Everything one tick produced
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub tick: u64,
    pub time_s: f32,
    pub sea_level_m: f32,
    pub viewer: Vec3,
    pub stack: CascadeStack,
    pub cascade_params: Vec<CascadeParams>,
    bindings: Vec<(SimKind, TextureBinding)>,
}

impl FrameSnapshot {
    pub fn capture(
        tick: u64,
        time_s: f32,
        sea_level_m: f32,
        viewer: Vec3,
        stack: &CascadeStack,
        simulations: &[Simulation],
    ) -> Self {
        let cascade_params = stack
            .cascades_with_duplicate()
            .iter()
            .enumerate()
            .map(|(slice, cascade)| CascadeParams {
                origin: cascade.origin.to_array(),
                texel_size: cascade.texel_size,
                scale: cascade.world_size(),
                weight: stack.weight(slice),
                max_wavelength: cascade.max_wavelength(),
                mesh_scale_lerp: stack.mesh_scale_lerp(slice),
                _pad: 0.0,
            })
            .collect();
        let bindings = simulations
            .iter()
            .filter_map(|sim| sim.bind().map(|binding| (sim.kind(), binding)))
            .collect();

        Self {
            tick,
            time_s,
            sea_level_m,
            viewer,
            stack: stack.clone(),
            cascade_params,
            bindings,
        }
    }

    /// Parameter array as bound by the host
    pub fn params_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.cascade_params)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&'static str, &TextureBinding)> {
        self.bindings.iter().map(|(kind, binding)| (kind.name(), binding))
    }

    pub fn binding(&self, kind: SimKind) -> Option<&TextureBinding> {
        self.bindings.iter().find(|(k, _)| *k == kind).map(|(_, b)| b)
    }

    pub fn displacement(&self) -> Option<&Arc<SliceArray<Vec3>>> {
        match self.binding(SimKind::AnimatedWaves) {
            Some(TextureBinding::Vector3(a)) => Some(a),
            _ => None,
        }
    }

    pub fn flow(&self) -> Option<&Arc<SliceArray<Vec2>>> {
        match self.binding(SimKind::Flow) {
            Some(TextureBinding::Vector2(a)) => Some(a),
            _ => None,
        }
    }

    pub fn floor(&self) -> Option<&Arc<SliceArray<f32>>> {
        self.scalar(SimKind::Depth)
    }

    pub fn level(&self) -> Option<&Arc<SliceArray<f32>>> {
        self.scalar(SimKind::Level)
    }

    pub fn foam(&self) -> Option<&Arc<SliceArray<f32>>> {
        self.scalar(SimKind::Foam)
    }

    fn scalar(&self, kind: SimKind) -> Option<&Arc<SliceArray<f32>>> {
        match self.binding(kind) {
            Some(TextureBinding::Scalar(a)) => Some(a),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{LodSettings, OceanConfig};

    #[test]
    fn test_params_layout() {
        assert_eq!(std::mem::size_of::<CascadeParams>(), 32);
    }

    #[test]
    fn test_capture_lists_valid_bindings() {
        let lod = LodSettings::default().with_lod_count(3).with_resolution(16);
        let stack = CascadeStack::around_viewer(Vec3::new(0.0, 20.0, 0.0), &lod);
        let config = OceanConfig::default().with_lod(lod);
        let sims: Vec<Simulation> = [SimKind::Depth, SimKind::AnimatedWaves, SimKind::Foam]
            .iter()
            .map(|k| Simulation::new(*k, &stack, &config))
            .collect();

        let snapshot = FrameSnapshot::capture(1, 0.5, 0.0, Vec3::ZERO, &stack, &sims);
        assert_eq!(snapshot.cascade_params.len(), 4);
        assert_eq!(snapshot.params_bytes().len(), 4 * 32);
        assert!(snapshot.displacement().is_some());
        assert!(snapshot.floor().is_some());
        assert!(snapshot.flow().is_none());
        let names: Vec<&str> = snapshot.bindings().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["depth", "animated_waves", "foam"]);
        assert_eq!(snapshot.cascade_params[3], snapshot.cascade_params[2]);
    }
}

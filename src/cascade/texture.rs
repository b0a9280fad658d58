//! Per-cascade texel storage, double buffering and sampling.
//!
//! A [`SliceArray`] is the CPU stand-in for a texture array: one flat vector
//! holding `k` square slices, tagged with the cascade stack it was written
//! for so later ticks can map world positions into it.

use std::ops::{Add, Mul};
use std::sync::Arc;

use glam::{UVec2, Vec2, Vec3, Vec4};
use rayon::prelude::*;

use super::CascadeStack;

/// Value stored in one texel
pub trait Texel:
    Copy + Default + Send + Sync + bytemuck::Pod + Add<Output = Self> + Mul<f32, Output = Self> + 'static
{
    /// Component-wise maximum
    fn max_texel(self, other: Self) -> Self;
    /// Component-wise minimum
    fn min_texel(self, other: Self) -> Self;
    fn is_finite_texel(self) -> bool;
}

macro_rules! impl_texel {
    ($($t:ty),*) => {
        $(
            impl Texel for $t {
                fn max_texel(self, other: Self) -> Self {
                    self.max(other)
                }

                fn min_texel(self, other: Self) -> Self {
                    self.min(other)
                }

                fn is_finite_texel(self) -> bool {
                    self.is_finite()
                }
            }
        )*
    };
}

impl_texel!(f32, Vec2, Vec3, Vec4);

/// What a consumer reads outside the [0, 1) uv range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgePolicy {
    /// Repeat the border texel
    Clamp,
    /// Contribute nothing
    Zero,
}

/// `k` square slices of texels in one allocation
#[derive(Debug, Clone)]
pub struct SliceArray<T> {
    stack: CascadeStack,
    resolution: usize,
    data: Vec<T>,
}

impl<T: Texel> SliceArray<T> {
    pub fn new(stack: CascadeStack, fill: T) -> Self {
        let resolution = stack.resolution() as usize;
        let len = stack.slice_count() * resolution * resolution;
        Self {
            stack,
            resolution,
            data: vec![fill; len],
        }
    }

    /// Cascade placement this data was written for
    pub fn stack(&self) -> &CascadeStack {
        &self.stack
    }

    pub(crate) fn set_stack(&mut self, stack: &CascadeStack) {
        let resolution = stack.resolution() as usize;
        let len = stack.slice_count() * resolution * resolution;
        if len != self.data.len() {
            self.data.resize(len, T::default());
        }
        self.resolution = resolution;
        self.stack = stack.clone();
    }

    pub fn slice_count(&self) -> usize {
        self.stack.slice_count()
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn texels_per_slice(&self) -> usize {
        self.resolution * self.resolution
    }

    pub fn slice(&self, slice: usize) -> &[T] {
        let n = self.texels_per_slice();
        &self.data[slice * n..(slice + 1) * n]
    }

    pub fn slice_mut(&mut self, slice: usize) -> &mut [T] {
        let n = self.texels_per_slice();
        &mut self.data[slice * n..(slice + 1) * n]
    }

    /// Slice `slice` for writing, plus the already written next coarser
    /// slice for reading (`None` for the coarsest)
    pub fn slice_with_coarser_mut(&mut self, slice: usize) -> (&mut [T], Option<&[T]>) {
        let n = self.texels_per_slice();
        let count = self.slice_count();
        let (head, tail) = self.data.split_at_mut((slice + 1) * n);
        let coarser = if slice + 1 < count { Some(&tail[..n]) } else { None };
        (&mut head[slice * n..], coarser)
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn get(&self, slice: usize, x: usize, y: usize) -> T {
        self.slice(slice)[y * self.resolution + x]
    }

    pub fn fill(&mut self, value: T) {
        self.data.par_iter_mut().for_each(|t| *t = value);
    }

    /// Raw bytes for binding as a host texture array
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Run `f(slice, texel id, texel)` over every texel in parallel
    pub fn par_for_each_texel<F>(&mut self, f: F)
    where
        F: Fn(usize, UVec2, &mut T) + Sync,
    {
        let res = self.resolution;
        let per_slice = res * res;
        if per_slice == 0 {
            return;
        }
        self.data
            .par_chunks_mut(res)
            .enumerate()
            .for_each(|(row, texels)| {
                let slice = row / res;
                let y = (row % res) as u32;
                for (x, texel) in texels.iter_mut().enumerate() {
                    f(slice, UVec2::new(x as u32, y), texel);
                }
            });
    }

    /// Bilinear sample of `slice` at a world position
    pub fn sample_world(&self, slice: usize, world: Vec2, edge: EdgePolicy) -> T {
        if slice >= self.slice_count() {
            return T::default();
        }
        let cascade = self.stack.cascade(slice);
        let uv = cascade.world_to_uv(world);
        if edge == EdgePolicy::Zero && !uv_in_range(uv) {
            return T::default();
        }
        bilinear_clamped(self.slice(slice), self.resolution, uv * self.resolution as f32)
    }
}

fn uv_in_range(uv: Vec2) -> bool {
    uv.x >= 0.0 && uv.x < 1.0 && uv.y >= 0.0 && uv.y < 1.0
}

/// Point fetch with coordinates clamped to the border
pub fn fetch_clamped<T: Texel>(data: &[T], resolution: usize, x: i32, y: i32) -> T {
    let max = resolution as i32 - 1;
    let x = x.clamp(0, max) as usize;
    let y = y.clamp(0, max) as usize;
    data[y * resolution + x]
}

/// Point fetch with coordinates wrapped (tileable data)
pub fn fetch_wrapped<T: Texel>(data: &[T], resolution: usize, x: i32, y: i32) -> T {
    let n = resolution as i32;
    let x = x.rem_euclid(n) as usize;
    let y = y.rem_euclid(n) as usize;
    data[y * resolution + x]
}

/// Four point fetches and a manual lerp; `coord` is in texels with texel
/// `i` spanning `[i, i + 1)`.
///
/// Only point fetches are used so the data can be read while other slices of
/// the same array are being written.
pub fn bilinear_clamped<T: Texel>(data: &[T], resolution: usize, coord: Vec2) -> T {
    bilinear_with(data, resolution, coord, fetch_clamped)
}

/// Bilinear sample of periodic data
pub fn bilinear_wrapped<T: Texel>(data: &[T], resolution: usize, coord: Vec2) -> T {
    bilinear_with(data, resolution, coord, fetch_wrapped)
}

fn bilinear_with<T: Texel>(
    data: &[T],
    resolution: usize,
    coord: Vec2,
    fetch: fn(&[T], usize, i32, i32) -> T,
) -> T {
    let p = coord - 0.5;
    if !p.is_finite() {
        return T::default();
    }
    let base = p.floor();
    let f = p - base;
    let (x0, y0) = (base.x as i32, base.y as i32);

    let t00 = fetch(data, resolution, x0, y0);
    let t10 = fetch(data, resolution, x0 + 1, y0);
    let t01 = fetch(data, resolution, x0, y0 + 1);
    let t11 = fetch(data, resolution, x0 + 1, y0 + 1);

    let top = t00 * (1.0 - f.x) + t10 * f.x;
    let bottom = t01 * (1.0 - f.x) + t11 * f.x;
    top * (1.0 - f.y) + bottom * f.y
}

/// Index-parity pair of buffers with copy-on-write targets.
///
/// `advance` swaps read/write roles at the tick boundary. Readers that kept
/// an `Arc` to older data force a copy instead of seeing it overwritten.
#[derive(Debug)]
pub struct FlipBuffer<T> {
    buffers: [Arc<SliceArray<T>>; 2],
    current: usize,
}

impl<T: Texel> FlipBuffer<T> {
    pub fn new(stack: &CascadeStack, fill: T) -> Self {
        let initial = Arc::new(SliceArray::new(stack.clone(), fill));
        Self {
            buffers: [Arc::clone(&initial), initial],
            current: 0,
        }
    }

    /// Most recently written buffer
    pub fn current(&self) -> &Arc<SliceArray<T>> {
        &self.buffers[self.current]
    }

    /// Buffer written the tick before `current`
    pub fn previous(&self) -> &Arc<SliceArray<T>> {
        &self.buffers[self.current ^ 1]
    }

    /// Drop both buffers' storage
    pub fn release(&mut self) {
        let empty = Arc::new(SliceArray::new(CascadeStack::empty(), T::default()));
        self.buffers = [Arc::clone(&empty), empty];
    }

    /// Flip roles and hand out (last tick's data, this tick's write target)
    pub fn advance(&mut self, stack: &CascadeStack) -> (&SliceArray<T>, &mut SliceArray<T>) {
        self.current ^= 1;
        let (first, second) = self.buffers.split_at_mut(1);
        let (target, previous) = if self.current == 0 {
            (&mut first[0], &second[0])
        } else {
            (&mut second[0], &first[0])
        };
        let target = Arc::make_mut(target);
        target.set_stack(stack);
        (previous.as_ref(), target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::LodScale;

    fn stack(res: u32) -> CascadeStack {
        CascadeStack::with_scale(
            Vec2::ZERO,
            LodScale {
                scale: 8.0,
                alpha: 0.0,
            },
            3,
            res,
        )
    }

    #[test]
    fn test_bilinear_on_texel_centre_returns_texel() {
        let data: Vec<f32> = (0..16).map(|i| i as f32).collect();
        let v = bilinear_clamped(&data, 4, Vec2::new(2.5, 1.5));
        assert!((v - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_bilinear_interpolates_between_texels() {
        let data: Vec<f32> = (0..16).map(|i| i as f32).collect();
        let v = bilinear_clamped(&data, 4, Vec2::new(2.0, 1.5));
        assert!((v - 5.5).abs() < 1e-6);
    }

    #[test]
    fn test_wrapped_sampling_is_periodic() {
        let data: Vec<f32> = (0..16).map(|i| (i % 4) as f32).collect();
        let a = bilinear_wrapped(&data, 4, Vec2::new(0.25, 2.5));
        let b = bilinear_wrapped(&data, 4, Vec2::new(4.25, 2.5));
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn test_zero_edge_policy() {
        let mut array = SliceArray::new(stack(8), 0.0f32);
        array.fill(2.0);
        let far = Vec2::new(1.0e4, 0.0);
        assert_eq!(array.sample_world(0, far, EdgePolicy::Zero), 0.0);
        assert_eq!(array.sample_world(0, far, EdgePolicy::Clamp), 2.0);
        assert_eq!(array.sample_world(7, Vec2::ZERO, EdgePolicy::Clamp), 0.0);
    }

    #[test]
    fn test_flip_swaps_roles() {
        let s = stack(8);
        let mut buffer = FlipBuffer::new(&s, 0.0f32);

        let (_, target) = buffer.advance(&s);
        target.fill(1.0);
        assert_eq!(buffer.current().get(0, 0, 0), 1.0);
        assert_eq!(buffer.previous().get(0, 0, 0), 0.0);

        let (previous, target) = buffer.advance(&s);
        assert_eq!(previous.get(0, 0, 0), 1.0);
        target.fill(2.0);
        assert_eq!(buffer.current().get(0, 0, 0), 2.0);
        assert_eq!(buffer.previous().get(0, 0, 0), 1.0);
    }

    #[test]
    fn test_reader_keeps_its_copy() {
        let s = stack(8);
        let mut buffer = FlipBuffer::new(&s, 0.0f32);
        let (_, target) = buffer.advance(&s);
        target.fill(5.0);

        let reader = Arc::clone(buffer.current());
        buffer.advance(&s);
        let (_, target) = buffer.advance(&s);
        target.fill(9.0);

        assert_eq!(reader.get(1, 3, 3), 5.0);
        assert_eq!(buffer.current().get(1, 3, 3), 9.0);
    }

    #[test]
    fn test_coarser_slice_visible_while_writing() {
        let mut array = SliceArray::new(stack(8), 0.0f32);
        array.slice_mut(2).iter_mut().for_each(|t| *t = 4.0);
        let (target, coarser) = array.slice_with_coarser_mut(1);
        assert_eq!(target.len(), 64);
        assert_eq!(coarser.map(|c| c[10]), Some(4.0));
        let (_, coarsest) = array.slice_with_coarser_mut(2);
        assert!(coarsest.is_none());
    }

    #[test]
    fn test_texel_min_max_component_wise() {
        let a = Vec2::new(1.0, 5.0);
        let b = Vec2::new(3.0, 2.0);
        assert_eq!(a.max_texel(b), Vec2::new(3.0, 5.0));
        assert_eq!(a.min_texel(b), Vec2::new(1.0, 2.0));
        assert!(!f32::NAN.is_finite_texel());
    }

    #[test]
    fn test_par_for_each_texel_visits_all() {
        let mut array = SliceArray::new(stack(8), 0.0f32);
        array.par_for_each_texel(|slice, id, t| *t = (slice * 100) as f32 + id.x as f32 + id.y as f32 * 10.0);
        assert_eq!(array.get(2, 3, 4), 243.0);
        assert_eq!(array.as_bytes().len(), 3 * 64 * 4);
    }
}

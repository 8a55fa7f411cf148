//! Ray-projection backends.
//!
//! Every backend implements the same per-ray contract over its own data
//! layout:
//!
//! 1. origin = destination point of the ray (directly or through the index buffer)
//! 2. direction = the ray's current slot value (the provisional smoothed normal)
//! 3. nearest source triangle hit at a non-negative distance, ties to the lowest index
//! 4. on hit, the slot is overwritten with the normalized interpolated source normal;
//!    on miss it is left untouched

mod data_parallel;
mod scalar;
#[cfg(feature = "gpu")]
mod device;

pub use data_parallel::{
    Accelerator, DataParallelBackend, FlattenedTriangles, HostExecutor, KernelExecutor,
};
#[cfg(feature = "gpu")]
pub use device::{GpuContext, WgpuExecutor};
pub use scalar::ScalarBackend;

use geometry::{NormalIndexing, triangle_interpolation};
use glam::{Vec3, Vec4};
use rayon::prelude::*;

use crate::error::Result;
use crate::types::BackendKind;

/// Read-only inputs shared by every ray.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionJob<'a> {
    /// Refined source positions
    pub src_points: &'a [Vec3],
    /// Refined source triangle list
    pub src_indices: &'a [u32],
    /// Refined source normals, one per source vertex
    pub src_normals: &'a [Vec3],
    /// Destination positions (ray origins)
    pub dst_points: &'a [Vec3],
    /// Destination index buffer, used when rays are per corner
    pub dst_indices: &'a [u32],
    /// Layout of the destination normals, and therefore of the rays
    pub ray_indexing: NormalIndexing,
}

impl ProjectionJob<'_> {
    pub fn num_triangles(&self) -> usize {
        self.src_indices.len() / 3
    }

    /// Origin of ray `r`
    #[inline]
    pub fn ray_origin(&self, r: usize) -> Vec3 {
        match self.ray_indexing {
            NormalIndexing::Vertex => self.dst_points[r],
            NormalIndexing::Corner => self.dst_points[self.dst_indices[r] as usize],
        }
    }

    /// Source normals at the three corners of triangle `tri_index`
    #[inline]
    pub fn corner_normals(&self, tri_index: usize) -> [Vec3; 3] {
        let base = tri_index * 3;
        [
            self.src_normals[self.src_indices[base] as usize],
            self.src_normals[self.src_indices[base + 1] as usize],
            self.src_normals[self.src_indices[base + 2] as usize],
        ]
    }
}

/// Per-ray storage: ray directions on entry, projected normals on return.
///
/// Wraps the destination normal array. A ray reads only its own slot and
/// writes only its own slot, so the same storage serves both roles.
#[derive(Debug)]
pub struct RaySlots<'a> {
    slots: &'a mut [Vec3],
}

impl<'a> RaySlots<'a> {
    pub fn new(slots: &'a mut [Vec3]) -> Self {
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Current ray directions
    pub fn directions(&self) -> &[Vec3] {
        &self.slots[..]
    }

    /// Project every ray in parallel.
    ///
    /// `project(r, direction)` returns the new normal for ray `r`, or `None`
    /// to keep the direction. Returns the number of overwritten slots.
    pub fn par_project<F>(&mut self, project: F) -> usize
    where
        F: Fn(usize, Vec3) -> Option<Vec3> + Sync + Send,
    {
        self.slots
            .par_iter_mut()
            .enumerate()
            .map(|(r, slot)| match project(r, *slot) {
                Some(normal) => {
                    *slot = normal;
                    1
                }
                None => 0,
            })
            .sum()
    }

    /// Copy device results back. `w > 0.5` marks a hit; misses keep their slot.
    pub fn write_back(&mut self, results: &[Vec4]) -> usize {
        debug_assert_eq!(results.len(), self.slots.len());
        let mut hits = 0;
        for (slot, result) in self.slots.iter_mut().zip(results) {
            if result.w > 0.5 {
                *slot = result.truncate();
                hits += 1;
            }
        }
        hits
    }
}

/// A strategy for the per-ray search-and-interpolate step.
pub trait ProjectionBackend {
    fn kind(&self) -> BackendKind;

    /// Run every ray of `job`, overwriting hit slots. Returns the hit count.
    fn project(&self, job: &ProjectionJob<'_>, rays: RaySlots<'_>) -> Result<usize>;
}

/// Interpolated, normalized source normal at a ray hit.
///
/// `None` when the corner normals cancel out, which leaves the ray's slot
/// untouched like a miss.
#[inline]
pub(crate) fn interpolate_hit(
    origin: Vec3,
    direction: Vec3,
    distance: f32,
    corners: [Vec3; 3],
    normals: [Vec3; 3],
) -> Option<Vec3> {
    let point = origin + direction * distance;
    let normal = triangle_interpolation(
        point, corners[0], corners[1], corners[2], normals[0], normals[1], normals[2],
    )
    .normalize_or_zero();
    (normal != Vec3::ZERO).then_some(normal)
}

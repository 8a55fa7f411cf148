//! Data-parallel backend: the projection split into two kernels.
//!
//! Kernel 1 flattens the indexed source triangles into three corner buffers
//! (one element per triangle). Kernel 2 runs one work item per ray, scanning
//! the flattened corners for the nearest hit. Executors decide where the
//! kernels run.

use geometry::ray_triangle_intersection;
use glam::Vec3;
use meshsync_config::ProjectionConfig;
use rayon::prelude::*;
use tracing::debug;

use super::{ProjectionBackend, ProjectionJob, RaySlots, interpolate_hit};
use crate::error::Result;
use crate::types::BackendKind;

#[cfg(feature = "gpu")]
use super::device::WgpuExecutor;

/// Runs both kernels of a projection job somewhere.
pub trait KernelExecutor {
    fn kind(&self) -> BackendKind;

    /// Flatten, search and write back. Returns the hit count.
    fn execute(&self, job: &ProjectionJob<'_>, rays: RaySlots<'_>) -> Result<usize>;
}

/// Output of kernel 1: corner `k` of triangle `t` is `corners[k][t]`.
#[derive(Debug, Clone, Default)]
pub struct FlattenedTriangles {
    pub corners: [Vec<Vec3>; 3],
}

impl FlattenedTriangles {
    /// Kernel 1: one work item per triangle.
    pub fn flatten(points: &[Vec3], indices: &[u32]) -> Self {
        let num_triangles = indices.len() / 3;
        let [mut c0, mut c1, mut c2] = std::array::from_fn(|_| vec![Vec3::ZERO; num_triangles]);

        c0.par_iter_mut()
            .zip(c1.par_iter_mut())
            .zip(c2.par_iter_mut())
            .zip(indices.par_chunks_exact(3))
            .for_each(|(((p0, p1), p2), idx)| {
                *p0 = points[idx[0] as usize];
                *p1 = points[idx[1] as usize];
                *p2 = points[idx[2] as usize];
            });

        Self {
            corners: [c0, c1, c2],
        }
    }

    pub fn len(&self) -> usize {
        self.corners[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn triangle(&self, tri_index: usize) -> [Vec3; 3] {
        [
            self.corners[0][tri_index],
            self.corners[1][tri_index],
            self.corners[2][tri_index],
        ]
    }

    /// Nearest non-negative hit, ties to the lowest triangle index.
    pub fn nearest_hit(&self, origin: Vec3, direction: Vec3) -> Option<(usize, f32)> {
        let mut distance = f32::MAX;
        let mut hit = None;
        for tri_index in 0..self.len() {
            let [v0, v1, v2] = self.triangle(tri_index);
            if let Some(h) = ray_triangle_intersection(origin, direction, v0, v1, v2) {
                if h.t < distance {
                    distance = h.t;
                    hit = Some(tri_index);
                }
            }
        }
        hit.map(|tri_index| (tri_index, distance))
    }
}

/// Both kernels as rayon parallel-for passes on host threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostExecutor;

impl KernelExecutor for HostExecutor {
    fn kind(&self) -> BackendKind {
        BackendKind::HostDataParallel
    }

    fn execute(&self, job: &ProjectionJob<'_>, mut rays: RaySlots<'_>) -> Result<usize> {
        let flattened = FlattenedTriangles::flatten(job.src_points, job.src_indices);

        // Kernel 2
        Ok(rays.par_project(|r, direction| {
            let origin = job.ray_origin(r);
            let (tri_index, distance) = flattened.nearest_hit(origin, direction)?;
            interpolate_hit(
                origin,
                direction,
                distance,
                flattened.triangle(tri_index),
                job.corner_normals(tri_index),
            )
        }))
    }
}

/// An available data-parallel executor.
#[derive(Debug)]
pub enum Accelerator {
    Host(HostExecutor),
    #[cfg(feature = "gpu")]
    Wgpu(WgpuExecutor),
}

impl Accelerator {
    /// Query for an accelerator.
    ///
    /// With the `gpu` feature a wgpu device is requested first. The host
    /// executor counts as an accelerator only when `emulate_accelerator` is
    /// set. `None` means the caller should use the scalar backend.
    pub fn detect(config: &ProjectionConfig) -> Option<Self> {
        #[cfg(feature = "gpu")]
        {
            match WgpuExecutor::new() {
                Ok(executor) => return Some(Accelerator::Wgpu(executor)),
                Err(e) => debug!("wgpu accelerator unavailable: {e}"),
            }
        }

        if config.emulate_accelerator {
            debug!("Emulating accelerator with host kernels");
            return Some(Accelerator::Host(HostExecutor));
        }

        debug!("No accelerator available, using CPU");
        None
    }
}

impl KernelExecutor for Accelerator {
    fn kind(&self) -> BackendKind {
        match self {
            Accelerator::Host(executor) => executor.kind(),
            #[cfg(feature = "gpu")]
            Accelerator::Wgpu(executor) => executor.kind(),
        }
    }

    fn execute(&self, job: &ProjectionJob<'_>, rays: RaySlots<'_>) -> Result<usize> {
        match self {
            Accelerator::Host(executor) => executor.execute(job, rays),
            #[cfg(feature = "gpu")]
            Accelerator::Wgpu(executor) => executor.execute(job, rays),
        }
    }
}

/// Two-kernel projection on an executor.
#[derive(Debug)]
pub struct DataParallelBackend<E: KernelExecutor> {
    executor: E,
}

impl<E: KernelExecutor> DataParallelBackend<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }
}

impl<E: KernelExecutor> ProjectionBackend for DataParallelBackend<E> {
    fn kind(&self) -> BackendKind {
        self.executor.kind()
    }

    fn project(&self, job: &ProjectionJob<'_>, rays: RaySlots<'_>) -> Result<usize> {
        if rays.is_empty() {
            return Ok(0);
        }
        self.executor.execute(job, rays)
    }
}

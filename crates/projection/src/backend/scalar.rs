//! Scalar backend: brute-force nearest-hit search over the columnar triangle
//! buffer, one rayon task per ray.

use geometry::ray_triangles_intersection_soa;

use super::{ProjectionBackend, ProjectionJob, RaySlots, interpolate_hit};
use crate::error::Result;
use crate::soa::TriangleSoA;
use crate::types::BackendKind;

/// Per-ray search over a [`TriangleSoA`] built from the refined source.
#[derive(Debug, Clone, Default)]
pub struct ScalarBackend {
    soa: TriangleSoA,
}

impl ScalarBackend {
    pub fn new(soa: TriangleSoA) -> Self {
        Self { soa }
    }
}

impl ProjectionBackend for ScalarBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Scalar
    }

    fn project(&self, job: &ProjectionJob<'_>, mut rays: RaySlots<'_>) -> Result<usize> {
        debug_assert_eq!(self.soa.len(), job.num_triangles());
        let columns = self.soa.columns();

        Ok(rays.par_project(|r, direction| {
            let origin = job.ray_origin(r);
            let hit = ray_triangles_intersection_soa(origin, direction, columns)?;
            interpolate_hit(
                origin,
                direction,
                hit.distance,
                columns.triangle(hit.triangle),
                job.corner_normals(hit.triangle),
            )
        }))
    }
}

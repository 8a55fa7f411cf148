//! Normal projection engine.
//!
//! Transfers normals from a detailed source mesh onto a destination mesh. When
//! both meshes share connectivity the source's regenerated normals are copied
//! straight across; otherwise every destination normal is resampled by casting
//! a ray from the destination point along its own smoothed normal and
//! interpolating the source normals at the nearest hit.

use std::time::Instant;

use geometry::{Mesh, NormalIndexing, RefineFlags, RefineSettings};
use meshsync_config::ProjectionConfig;
use tracing::{debug, info};

use crate::backend::{
    Accelerator, DataParallelBackend, ProjectionBackend, ProjectionJob, RaySlots, ScalarBackend,
};
use crate::error::Result;
use crate::soa::TriangleSoA;
use crate::types::{BackendKind, EditFlags, ProjectionPath, ProjectionStats};

/// Normal projector with its configuration.
#[derive(Debug, Clone, Default)]
pub struct NormalProjector {
    config: ProjectionConfig,
}

impl NormalProjector {
    pub fn new(config: ProjectionConfig) -> Self {
        Self { config }
    }

    /// Project `src`'s normals onto `dst`.
    ///
    /// Both meshes are refined in place. On return `dst.normals` holds one
    /// unit normal per vertex or per corner and `dst.flags.has_normals` is set.
    pub fn project(
        &self,
        dst: &mut Mesh,
        src: &mut Mesh,
        flags: EditFlags,
    ) -> Result<ProjectionStats> {
        let begin = Instant::now();

        dst.flags.has_normals = true;
        dst.refine_settings.flags.gen_normals_with_smooth_angle = false;

        if src.indices == dst.indices {
            return Ok(copy_topology(dst, src, begin));
        }
        self.ray_cast(dst, src, flags, begin)
    }

    fn ray_cast(
        &self,
        dst: &mut Mesh,
        src: &mut Mesh,
        flags: EditFlags,
        begin: Instant,
    ) -> Result<ProjectionStats> {
        let accelerator = if flags.prefer_gpu {
            Accelerator::detect(&self.config)
        } else {
            None
        };
        let build_soa = accelerator.is_none();

        let src_settings = RefineSettings {
            flags: RefineFlags {
                triangulate: true,
                gen_normals_with_smooth_angle: true,
                flip_normals: true,
                ..Default::default()
            },
            smooth_angle: src.refine_settings.smooth_angle,
        };
        let dst_settings = RefineSettings {
            flags: RefineFlags {
                no_reindexing: true,
                gen_normals_with_smooth_angle: true,
                flip_normals: true,
                ..Default::default()
            },
            smooth_angle: dst.refine_settings.smooth_angle,
        };

        let ((src_stats, soa), dst_stats) = rayon::join(
            || {
                let stats = src.refine(&src_settings);
                (stats, build_soa.then(|| TriangleSoA::from_mesh(src)))
            },
            || dst.refine(&dst_settings),
        );
        let setup = begin.elapsed();
        debug!(
            "project_normals: source split {} vertices, destination corner normals: {}",
            src_stats.vertices_split, dst_stats.corner_normals
        );

        debug_assert_eq!(src.indices.len() % 3, 0);
        debug_assert_eq!(src.normals.len(), src.points.len());

        let ray_indexing = dst.normal_indexing();
        let num_rays = dst.normals.len();
        let num_triangles = src.triangle_count();
        debug!(
            "project_normals: {} {:?}-indexed rays against {} triangles",
            num_rays, ray_indexing, num_triangles
        );

        let job = ProjectionJob {
            src_points: &src.points,
            src_indices: &src.indices,
            src_normals: &src.normals,
            dst_points: &dst.points,
            dst_indices: &dst.indices,
            ray_indexing,
        };
        let rays = RaySlots::new(&mut dst.normals);

        let (backend, rays_hit) = match accelerator {
            Some(accelerator) => run(&DataParallelBackend::new(accelerator), &job, rays)?,
            None => run(&ScalarBackend::new(soa.unwrap_or_default()), &job, rays)?,
        };

        let stats = ProjectionStats {
            path: ProjectionPath::RayCast,
            backend: Some(backend),
            num_rays,
            num_triangles,
            rays_hit,
            setup_ms: setup.as_secs_f64() * 1000.0,
            total_ms: begin.elapsed().as_secs_f64() * 1000.0,
        };
        info!(
            "project_normals ({}): {} rays, {} triangles, {:.2}ms ({:.2}ms for setup)",
            backend, stats.num_rays, stats.num_triangles, stats.total_ms, stats.setup_ms
        );
        Ok(stats)
    }
}

fn run(
    backend: &impl ProjectionBackend,
    job: &ProjectionJob<'_>,
    rays: RaySlots<'_>,
) -> Result<(BackendKind, usize)> {
    Ok((backend.kind(), backend.project(job, rays)?))
}

/// Identical connectivity: regenerate the source normals and copy them.
fn copy_topology(dst: &mut Mesh, src: &mut Mesh, begin: Instant) -> ProjectionStats {
    src.refine(&RefineSettings {
        flags: RefineFlags {
            no_reindexing: true,
            gen_normals_with_smooth_angle: true,
            flip_normals: true,
            ..Default::default()
        },
        smooth_angle: src.refine_settings.smooth_angle,
    });

    dst.normals = if src.normal_indexing() == NormalIndexing::Vertex
        && dst.points.len() != src.points.len()
    {
        dst.indices.iter().map(|&i| src.normals[i as usize]).collect()
    } else {
        src.normals.clone()
    };

    let elapsed = begin.elapsed().as_secs_f64() * 1000.0;
    debug!(
        "project_normals: connectivity matches, copied {} normals in {:.2}ms",
        dst.normals.len(),
        elapsed
    );

    ProjectionStats {
        path: ProjectionPath::CopiedTopology,
        backend: None,
        num_rays: dst.normals.len(),
        num_triangles: src.triangle_count(),
        rays_hit: 0,
        setup_ms: elapsed,
        total_ms: elapsed,
    }
}

/// Project with the default configuration.
///
/// Use [`NormalProjector`] with [`ProjectionConfig::from_env`] to honor the
/// environment overrides.
pub fn project_normals(
    dst: &mut Mesh,
    src: &mut Mesh,
    flags: EditFlags,
) -> Result<ProjectionStats> {
    NormalProjector::default().project(dst, src, flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geometry::generators::{quad_grid, uv_sphere};
    use glam::{Quat, Vec3};

    const TOLERANCE: f32 = 1e-4;

    fn translated(mut mesh: Mesh, offset: Vec3) -> Mesh {
        for p in &mut mesh.points {
            *p += offset;
        }
        mesh
    }

    fn rotated(mut mesh: Mesh, rotation: Quat) -> Mesh {
        for p in &mut mesh.points {
            *p = rotation * *p;
        }
        mesh
    }

    /// Coarse sphere tilted so its rays avoid the reference sphere's seams.
    fn coarse_sphere() -> Mesh {
        rotated(
            uv_sphere(0.8, 7, 5),
            Quat::from_rotation_x(0.3) * Quat::from_rotation_z(0.2),
        )
    }

    /// Two-sided roof below z = 0 with a hard ridge along Y.
    fn roof(smooth_angle: f32) -> Mesh {
        Mesh::from_triangles(
            vec![
                Vec3::new(-0.4, -0.4, -0.6),
                Vec3::new(0.0, -0.4, -0.5),
                Vec3::new(0.4, -0.4, -0.6),
                Vec3::new(-0.4, 0.4, -0.6),
                Vec3::new(0.0, 0.4, -0.5),
                Vec3::new(0.4, 0.4, -0.6),
            ],
            vec![0, 3, 1, 1, 3, 4, 1, 4, 2, 2, 4, 5],
        )
        .with_smooth_angle(smooth_angle)
    }

    fn assert_unit(normals: &[Vec3]) {
        for n in normals {
            assert!((n.length() - 1.0).abs() < TOLERANCE, "not unit: {n}");
        }
    }

    #[test]
    fn test_identical_topology_copies_normals() {
        let mut src = uv_sphere(1.0, 12, 6).with_smooth_angle(60.0);
        let mut dst = src.clone();
        dst.refine_settings.flags.gen_normals_with_smooth_angle = true;

        let mut expected = src.clone();
        expected.refine(&RefineSettings {
            flags: RefineFlags {
                no_reindexing: true,
                gen_normals_with_smooth_angle: true,
                flip_normals: true,
                ..Default::default()
            },
            smooth_angle: 60.0,
        });

        let stats = project_normals(&mut dst, &mut src, EditFlags::default()).unwrap();

        assert_eq!(stats.path, ProjectionPath::CopiedTopology);
        assert_eq!(stats.backend, None);
        assert_eq!(dst.normals, expected.normals);
        assert_eq!(dst.points, expected.points);
        assert!(dst.flags.has_normals);
        assert!(!dst.refine_settings.flags.gen_normals_with_smooth_angle);
    }

    #[test]
    fn test_ray_cast_matches_copy_on_identical_topology() {
        // Vertex normals only: with corner normals a ray leaving a shared
        // vertex ties on every adjacent triangle and takes the lowest one.
        let mesh = rotated(
            uv_sphere(1.0, 12, 6),
            Quat::from_rotation_x(0.3) * Quat::from_rotation_z(0.2),
        )
        .with_smooth_angle(180.0);

        let (mut copy_src, mut copy_dst) = (mesh.clone(), mesh.clone());
        let copied = project_normals(&mut copy_dst, &mut copy_src, EditFlags::default()).unwrap();

        let (mut cast_src, mut cast_dst) = (mesh.clone(), mesh);
        let cast = NormalProjector::default()
            .ray_cast(&mut cast_dst, &mut cast_src, EditFlags::default(), Instant::now())
            .unwrap();

        assert_eq!(copied.path, ProjectionPath::CopiedTopology);
        assert_eq!(cast.path, ProjectionPath::RayCast);
        assert_eq!(cast.rays_hit, cast.num_rays);
        assert_eq!(copy_dst.normal_indexing(), NormalIndexing::Vertex);
        assert_eq!(cast_dst.normals.len(), copy_dst.normals.len());
        for (a, b) in cast_dst.normals.iter().zip(&copy_dst.normals) {
            assert!((*a - *b).length() < TOLERANCE, "{a} != {b}");
        }
    }

    #[test]
    fn test_identical_topology_expands_to_corners() {
        let mut src = quad_grid(2, 2, 1.0, 1.0);
        let mut dst = src.clone();
        // Extra unreferenced vertex so the point counts differ
        dst.points.push(Vec3::splat(5.0));

        let stats = project_normals(&mut dst, &mut src, EditFlags::default()).unwrap();

        assert_eq!(stats.path, ProjectionPath::CopiedTopology);
        assert_eq!(dst.normals.len(), dst.indices.len());
        assert_eq!(dst.normal_indexing(), NormalIndexing::Corner);
        for n in &dst.normals {
            assert!((*n - Vec3::Z).length() < TOLERANCE);
        }
    }

    #[test]
    fn test_sphere_projection_is_unit_and_radial() {
        let mut src = uv_sphere(1.0, 32, 16);
        let mut dst = coarse_sphere().with_smooth_angle(180.0);

        let stats = project_normals(&mut dst, &mut src, EditFlags::default()).unwrap();

        assert_eq!(stats.path, ProjectionPath::RayCast);
        assert_eq!(stats.backend, Some(BackendKind::Scalar));
        assert_eq!(stats.num_rays, dst.normals.len());
        assert_eq!(stats.num_triangles, src.triangle_count());
        // Closed source around the destination: every ray lands
        assert_eq!(stats.rays_hit, stats.num_rays);
        assert_eq!(dst.normal_indexing(), NormalIndexing::Vertex);
        assert_unit(&dst.normals);

        for (p, n) in dst.points.iter().zip(&dst.normals) {
            assert!(n.dot(p.normalize()) > 0.99);
        }
    }

    #[test]
    fn test_hard_edged_destination_keeps_corner_layout() {
        let mut src = quad_grid(1, 1, 4.0, 4.0);
        let mut dst = roof(10.0);

        let stats = project_normals(&mut dst, &mut src, EditFlags::default()).unwrap();

        assert_eq!(dst.normal_indexing(), NormalIndexing::Corner);
        assert_eq!(dst.normals.len(), dst.indices.len());
        assert_eq!(dst.points.len(), 6);
        assert_eq!(stats.num_rays, 12);
        assert_eq!(stats.rays_hit, 12);
        for n in &dst.normals {
            assert!((*n - Vec3::Z).length() < TOLERANCE);
        }
    }

    #[test]
    fn test_smooth_destination_keeps_vertex_layout() {
        let mut src = quad_grid(1, 1, 1.0, 1.0);
        let mut dst = translated(quad_grid(3, 3, 2.4, 2.1), Vec3::new(0.0, 0.0, -0.5));

        let stats = project_normals(&mut dst, &mut src, EditFlags::default()).unwrap();

        assert_eq!(dst.normal_indexing(), NormalIndexing::Vertex);
        assert_eq!(dst.normals.len(), 16);
        // Only the four inner vertices lie under the source
        assert_eq!(stats.rays_hit, 4);
        assert_eq!(stats.rays_missed(), 12);
        assert_unit(&dst.normals);
    }

    #[test]
    fn test_nearest_surface_wins() {
        // Far plane first in the buffer and wound the other way, so it faces -Z
        let far = translated(quad_grid(1, 1, 2.0, 2.0), Vec3::new(0.0, 0.0, 1.0));
        let near = quad_grid(1, 1, 2.0, 2.0);

        let mut points = far.points.clone();
        let mut indices: Vec<u32> = far
            .indices
            .chunks_exact(3)
            .flat_map(|t| [t[0], t[2], t[1]])
            .collect();
        let offset = points.len() as u32;
        points.extend_from_slice(&near.points);
        indices.extend(near.indices.iter().map(|i| i + offset));
        let mut src = Mesh::from_triangles(points, indices);

        let mut dst = translated(quad_grid(1, 1, 0.5, 0.3), Vec3::new(0.0, 0.0, -1.0));

        let stats = project_normals(&mut dst, &mut src, EditFlags::default()).unwrap();

        assert_eq!(stats.rays_hit, 4);
        for n in &dst.normals {
            assert!((*n - Vec3::Z).length() < TOLERANCE);
        }
    }

    #[test]
    fn test_misses_keep_smoothed_normals() {
        let mut src = translated(quad_grid(1, 1, 1.0, 1.0), Vec3::new(1000.0, 0.0, 0.0));
        let mut dst = coarse_sphere().with_smooth_angle(30.0);

        let mut expected = dst.clone();
        expected.refine(&RefineSettings {
            flags: RefineFlags {
                no_reindexing: true,
                gen_normals_with_smooth_angle: true,
                flip_normals: true,
                ..Default::default()
            },
            smooth_angle: 30.0,
        });

        let stats = project_normals(&mut dst, &mut src, EditFlags::default()).unwrap();

        assert_eq!(stats.rays_hit, 0);
        assert_eq!(stats.rays_missed(), stats.num_rays);
        assert_eq!(dst.normals, expected.normals);
    }

    #[test]
    fn test_emulated_accelerator_matches_scalar() {
        let src = uv_sphere(1.0, 24, 12);
        let dst = coarse_sphere();

        let (mut scalar_src, mut scalar_dst) = (src.clone(), dst.clone());
        let scalar =
            project_normals(&mut scalar_dst, &mut scalar_src, EditFlags::default()).unwrap();

        let projector = NormalProjector::new(ProjectionConfig {
            emulate_accelerator: true,
            ..Default::default()
        });
        let (mut accel_src, mut accel_dst) = (src, dst);
        let accel = projector
            .project(&mut accel_dst, &mut accel_src, EditFlags { prefer_gpu: true })
            .unwrap();

        assert_eq!(scalar.backend, Some(BackendKind::Scalar));
        assert_ne!(accel.backend, Some(BackendKind::Scalar));
        assert_eq!(scalar.rays_hit, accel.rays_hit);
        for (a, b) in scalar_dst.normals.iter().zip(&accel_dst.normals) {
            assert!((*a - *b).length() < TOLERANCE);
        }
    }

    #[cfg(not(feature = "gpu"))]
    #[test]
    fn test_prefer_gpu_without_accelerator_uses_scalar() {
        let mut src = uv_sphere(1.0, 8, 4);
        let mut dst = coarse_sphere();
        let stats = project_normals(&mut dst, &mut src, EditFlags { prefer_gpu: true }).unwrap();
        assert_eq!(stats.backend, Some(BackendKind::Scalar));
    }

    #[test]
    fn test_polygon_source_is_triangulated() {
        let mut src = Mesh::from_triangles(
            vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
            ],
            vec![0, 1, 2, 3],
        );
        src.counts = vec![4];
        let mut dst = translated(quad_grid(1, 1, 0.5, 0.3), Vec3::new(0.0, 0.0, -1.0));

        let stats = project_normals(&mut dst, &mut src, EditFlags::default()).unwrap();

        assert!(src.counts.is_empty());
        assert_eq!(stats.num_triangles, 2);
        assert_eq!(stats.rays_hit, 4);
    }
}

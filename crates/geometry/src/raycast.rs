//! Ray-triangle intersection and triangle interpolation.
//!
//! This module provides ray-triangle intersection using the Moller-Trumbore
//! algorithm, a brute-force nearest-hit search over a columnar (SoA) triangle
//! batch, and barycentric interpolation of per-corner attributes.

use glam::Vec3;

use crate::constants::EPSILON;
use crate::types::Mesh;

/// Result of a ray-triangle intersection test
#[derive(Debug, Clone, Copy)]
pub struct TriangleHit {
    /// Distance along the ray to the intersection point
    pub t: f32,
    /// Barycentric coordinate u (weight for vertex 1)
    pub u: f32,
    /// Barycentric coordinate v (weight for vertex 2)
    pub v: f32,
}

/// Moller-Trumbore ray-triangle intersection algorithm.
///
/// Returns the hit distance and barycentric coordinates if the ray intersects
/// the triangle. Distances are in units of `ray_dir`'s length. A hit exactly
/// at the origin (`t == 0`) counts; hits behind the origin do not.
///
/// # Arguments
/// * `ray_origin` - Origin point of the ray
/// * `ray_dir` - Direction of the ray
/// * `v0`, `v1`, `v2` - Triangle vertices
///
/// # Returns
/// `Some(TriangleHit)` if ray intersects, `None` otherwise
pub fn ray_triangle_intersection(
    ray_origin: Vec3,
    ray_dir: Vec3,
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
) -> Option<TriangleHit> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let pvec = ray_dir.cross(edge2);
    let det = edge1.dot(pvec);

    // Ray parallel to the triangle plane, or degenerate triangle
    if det.abs() < EPSILON {
        return None;
    }

    let inv_det = 1.0 / det;
    let tvec = ray_origin - v0;

    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(edge1);

    let v = ray_dir.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(qvec) * inv_det;
    if t < 0.0 {
        return None;
    }

    Some(TriangleHit { t, u, v })
}

/// Interpolate a Vec3 attribute using barycentric coordinates.
pub fn interpolate_vec3(v0: Vec3, v1: Vec3, v2: Vec3, u: f32, v: f32) -> Vec3 {
    let w = 1.0 - u - v;
    v0 * w + v1 * u + v2 * v
}

/// Barycentric weights `(w0, w1, w2)` of `p` projected onto the triangle's plane.
///
/// Degenerate triangles put all weight on `v0`.
pub fn barycentric(p: Vec3, v0: Vec3, v1: Vec3, v2: Vec3) -> Vec3 {
    let e1 = v1 - v0;
    let e2 = v2 - v0;
    let ep = p - v0;

    let d00 = e1.dot(e1);
    let d01 = e1.dot(e2);
    let d11 = e2.dot(e2);
    let d20 = ep.dot(e1);
    let d21 = ep.dot(e2);

    let denom = d00 * d11 - d01 * d01;
    if denom.abs() <= f32::EPSILON * d00 * d11 {
        return Vec3::X;
    }

    let w1 = (d11 * d20 - d01 * d21) / denom;
    let w2 = (d00 * d21 - d01 * d20) / denom;
    Vec3::new(1.0 - w1 - w2, w1, w2)
}

/// Interpolate three per-corner attributes at point `p` of a triangle.
///
/// The result is not normalized; callers interpolating directions do that.
pub fn triangle_interpolation(
    p: Vec3,
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    a0: Vec3,
    a1: Vec3,
    a2: Vec3,
) -> Vec3 {
    let w = barycentric(p, v0, v1, v2);
    a0 * w.x + a1 * w.y + a2 * w.z
}

/// Borrowed view of a columnar triangle batch.
///
/// `columns[k * 3 + c]` holds component `c` (x, y, z) of corner `k` for every
/// triangle, all columns the same length.
#[derive(Debug, Clone, Copy)]
pub struct TriangleColumns<'a> {
    pub columns: [&'a [f32]; 9],
}

impl<'a> TriangleColumns<'a> {
    pub fn new(columns: [&'a [f32]; 9]) -> Self {
        debug_assert!(columns.iter().all(|c| c.len() == columns[0].len()));
        Self { columns }
    }

    /// Get the number of triangles in the batch
    pub fn len(&self) -> usize {
        self.columns[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of corner `k` (0..3) of triangle `tri_index`
    #[inline]
    pub fn corner(&self, tri_index: usize, k: usize) -> Vec3 {
        let base = k * 3;
        Vec3::new(
            self.columns[base][tri_index],
            self.columns[base + 1][tri_index],
            self.columns[base + 2][tri_index],
        )
    }

    /// All three corner positions of a triangle
    #[inline]
    pub fn triangle(&self, tri_index: usize) -> [Vec3; 3] {
        [
            self.corner(tri_index, 0),
            self.corner(tri_index, 1),
            self.corner(tri_index, 2),
        ]
    }
}

/// Nearest hit found in a triangle batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoaHit {
    /// Index of the hit triangle within the batch
    pub triangle: usize,
    /// Distance along the ray
    pub distance: f32,
}

/// Cast a ray against every triangle of a columnar batch.
///
/// Returns the hit with the smallest non-negative distance. Equal distances
/// keep the lowest triangle index.
pub fn ray_triangles_intersection_soa(
    ray_origin: Vec3,
    ray_dir: Vec3,
    triangles: TriangleColumns<'_>,
) -> Option<SoaHit> {
    let mut nearest: Option<SoaHit> = None;

    // Brute force; the columnar layout keeps the scan cache-friendly
    for tri_idx in 0..triangles.len() {
        let [v0, v1, v2] = triangles.triangle(tri_idx);
        if let Some(hit) = ray_triangle_intersection(ray_origin, ray_dir, v0, v1, v2) {
            let closer = match nearest {
                Some(prev) => hit.t < prev.distance,
                None => true,
            };
            if closer {
                nearest = Some(SoaHit {
                    triangle: tri_idx,
                    distance: hit.t,
                });
            }
        }
    }

    nearest
}

/// Closest intersection of a ray with an indexed mesh
#[derive(Debug, Clone, Copy)]
pub struct MeshHit {
    /// Hit point
    pub position: Vec3,
    /// Index of the hit triangle
    pub triangle: u32,
    /// Distance along the ray
    pub distance: f32,
    /// Barycentric weights (w, u, v)
    pub barycentric: Vec3,
    /// Interpolated, normalized normal (zero if the mesh has no normals)
    pub normal: Vec3,
}

/// Cast a ray against a triangle-list mesh and return the closest hit.
///
/// Walks the indexed layout directly; the projection backends use the
/// columnar batch instead.
pub fn raycast_mesh(ray_origin: Vec3, ray_dir: Vec3, mesh: &Mesh) -> Option<MeshHit> {
    let mut closest_hit: Option<(TriangleHit, usize)> = None;

    for tri_idx in 0..mesh.triangle_count() {
        let [v0, v1, v2] = mesh.triangle_positions(tri_idx);

        if let Some(hit) = ray_triangle_intersection(ray_origin, ray_dir, v0, v1, v2) {
            let dominated = match &closest_hit {
                Some((prev, _)) => hit.t >= prev.t,
                None => false,
            };
            if !dominated {
                closest_hit = Some((hit, tri_idx));
            }
        }
    }

    closest_hit.map(|(hit, tri_idx)| {
        let normal = if mesh.normals.is_empty() {
            Vec3::ZERO
        } else {
            let base = tri_idx * 3;
            interpolate_vec3(
                mesh.corner_normal(base),
                mesh.corner_normal(base + 1),
                mesh.corner_normal(base + 2),
                hit.u,
                hit.v,
            )
            .normalize_or_zero()
        };

        MeshHit {
            position: ray_origin + ray_dir * hit.t,
            triangle: tri_idx as u32,
            distance: hit.t,
            barycentric: Vec3::new(1.0 - hit.u - hit.v, hit.u, hit.v),
            normal,
        }
    })
}

//! Procedural mesh generators for the CLI driver and tests.
//!
//! Generated meshes follow the content tool's winding convention: front
//! faces wind clockwise seen from outside, so right-hand-rule face normals
//! point inward and a `flip_normals` refinement turns them outward.

use std::f32::consts::{PI, TAU};

use glam::Vec3;

use crate::types::Mesh;

/// Generates a flat quad grid in the XY plane, front side facing +Z.
///
/// The grid spans `[-width/2, width/2]` in X and `[-height/2, height/2]` in Y,
/// centered at the origin at Z=0.
///
/// # Arguments
/// - `cols` - Number of quads along X (vertex count = cols + 1).
/// - `rows` - Number of quads along Y (vertex count = rows + 1).
pub fn quad_grid(cols: usize, rows: usize, width: f32, height: f32) -> Mesh {
    let verts_x = cols + 1;
    let verts_y = rows + 1;

    let mut points = Vec::with_capacity(verts_x * verts_y);
    for j in 0..verts_y {
        for i in 0..verts_x {
            let u = i as f32 / cols as f32;
            let v = j as f32 / rows as f32;
            points.push(Vec3::new(-width / 2.0 + u * width, -height / 2.0 + v * height, 0.0));
        }
    }

    let mut indices = Vec::with_capacity(cols * rows * 6);
    for j in 0..rows {
        for i in 0..cols {
            let a = (j * verts_x + i) as u32;
            let b = a + 1;
            let c = a + verts_x as u32;
            let d = c + 1;
            indices.extend_from_slice(&[a, d, b, a, c, d]);
        }
    }

    Mesh::from_triangles(points, indices)
}

/// Generates a UV sphere centered at the origin with poles on the Y axis.
///
/// # Arguments
/// - `segments` - Subdivisions around the Y axis (minimum 3).
/// - `rings` - Subdivisions from pole to pole (minimum 2).
pub fn uv_sphere(radius: f32, segments: usize, rings: usize) -> Mesh {
    let segments = segments.max(3);
    let rings = rings.max(2);

    let mut points = Vec::with_capacity(2 + (rings - 1) * segments);
    points.push(Vec3::new(0.0, radius, 0.0));
    for k in 1..rings {
        let phi = PI * k as f32 / rings as f32;
        let (ring_radius, y) = (radius * phi.sin(), radius * phi.cos());
        for s in 0..segments {
            let theta = TAU * s as f32 / segments as f32;
            points.push(Vec3::new(ring_radius * theta.cos(), y, ring_radius * theta.sin()));
        }
    }
    let bottom = points.len() as u32;
    points.push(Vec3::new(0.0, -radius, 0.0));

    let ring_vertex = |k: usize, s: usize| (1 + (k - 1) * segments + s % segments) as u32;

    let mut indices = Vec::with_capacity(segments * rings * 6);
    for s in 0..segments {
        indices.extend_from_slice(&[0, ring_vertex(1, s), ring_vertex(1, s + 1)]);
    }
    for k in 1..rings - 1 {
        for s in 0..segments {
            let a = ring_vertex(k, s);
            let b = ring_vertex(k, s + 1);
            let c = ring_vertex(k + 1, s);
            let d = ring_vertex(k + 1, s + 1);
            indices.extend_from_slice(&[b, a, c, b, c, d]);
        }
    }
    for s in 0..segments {
        indices.extend_from_slice(&[
            bottom,
            ring_vertex(rings - 1, s + 1),
            ring_vertex(rings - 1, s),
        ]);
    }

    Mesh::from_triangles(points, indices)
}

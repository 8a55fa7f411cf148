//! Mesh refinement: triangulation, smoothing-angle normals, flipping and
//! re-indexing, applied in place.
//!
//! Steps run in a fixed order: triangulate, generate normals, flip, re-index.
//! Face normals follow the right-hand rule on the stored winding; content
//! tools with the opposite front-face convention request `flip_normals`.

use std::collections::HashMap;

use glam::Vec3;
use tracing::debug;

use crate::constants::{FALLBACK_NORMAL, NORMAL_MERGE_EPSILON};
use crate::types::{Mesh, NormalIndexing, RefineSettings};

/// Statistics from one refinement pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefineStats {
    /// Triangles in the index buffer after refinement
    pub triangles: usize,
    /// Vertices added by splitting at hard edges
    pub vertices_split: usize,
    /// Normals ended up one per corner instead of one per vertex
    pub corner_normals: bool,
}

impl Mesh {
    /// Apply a refinement in place.
    pub fn refine(&mut self, settings: &RefineSettings) -> RefineStats {
        let flags = settings.flags;
        let vertices_before = self.points.len();

        if flags.triangulate {
            self.triangulate();
        }

        if flags.gen_normals_with_smooth_angle {
            self.generate_normals(settings.smooth_angle);
        }

        if flags.flip_normals {
            for normal in &mut self.normals {
                *normal = -*normal;
            }
        }

        if !flags.no_reindexing {
            self.split_vertices_by_normal();
        }

        let stats = RefineStats {
            triangles: self.triangle_count(),
            vertices_split: self.points.len().saturating_sub(vertices_before),
            corner_normals: !self.normals.is_empty()
                && self.normal_indexing() == NormalIndexing::Corner,
        };
        debug!(
            "refine: {:?} angle={} -> {} vertices, {} triangles, corner_normals={}",
            flags,
            settings.smooth_angle,
            self.points.len(),
            stats.triangles,
            stats.corner_normals
        );
        stats
    }

    /// Iterate faces as `(first_corner, corner_count)`.
    fn face_spans(&self) -> Vec<(usize, usize)> {
        if self.counts.is_empty() {
            (0..self.indices.len() / 3).map(|f| (f * 3, 3)).collect()
        } else {
            let mut start = 0;
            self.counts
                .iter()
                .map(|&count| {
                    let span = (start, count as usize);
                    start += count as usize;
                    span
                })
                .collect()
        }
    }

    /// Fan-triangulate every polygon described by `counts`.
    pub fn triangulate(&mut self) {
        if self.counts.is_empty() {
            return;
        }

        let remap_normals = !self.normals.is_empty()
            && self.normal_indexing() == NormalIndexing::Corner;

        let mut indices = Vec::with_capacity(self.indices.len() * 2);
        let mut source_corners = Vec::with_capacity(self.indices.len() * 2);
        for (start, count) in self.face_spans() {
            for i in 1..count.saturating_sub(1) {
                for corner in [start, start + i, start + i + 1] {
                    indices.push(self.indices[corner]);
                    source_corners.push(corner);
                }
            }
        }

        if remap_normals {
            self.normals = source_corners.iter().map(|&c| self.normals[c]).collect();
        }
        self.indices = indices;
        self.counts.clear();
    }

    /// Generate normals, keeping edges sharper than `smooth_angle` (degrees) hard.
    ///
    /// Normals are stored one per vertex when every corner of each vertex
    /// agrees, one per corner otherwise.
    pub fn generate_normals(&mut self, smooth_angle: f32) {
        let spans = self.face_spans();

        // Area-weighted face normals (fan sum, exact cross product for triangles)
        let face_normals: Vec<Vec3> = spans
            .iter()
            .map(|&(start, count)| {
                let p0 = self.points[self.indices[start] as usize];
                (1..count.saturating_sub(1)).fold(Vec3::ZERO, |acc, i| {
                    let p1 = self.points[self.indices[start + i] as usize];
                    let p2 = self.points[self.indices[start + i + 1] as usize];
                    acc + (p1 - p0).cross(p2 - p0)
                })
            })
            .collect();
        let face_units: Vec<Vec3> = face_normals.iter().map(|n| n.normalize_or_zero()).collect();

        let mut vertex_faces: Vec<Vec<u32>> = vec![Vec::new(); self.points.len()];
        for (face, &(start, count)) in spans.iter().enumerate() {
            for &vertex in &self.indices[start..start + count] {
                let faces = &mut vertex_faces[vertex as usize];
                if faces.last() != Some(&(face as u32)) {
                    faces.push(face as u32);
                }
            }
        }

        let smooth_all = smooth_angle >= 180.0;
        let cos_threshold = smooth_angle.to_radians().cos();

        let mut corner_normals = vec![Vec3::ZERO; self.indices.len()];
        for (face, &(start, count)) in spans.iter().enumerate() {
            let unit = face_units[face];
            for corner in start..start + count {
                let vertex = self.indices[corner] as usize;
                let sum = vertex_faces[vertex]
                    .iter()
                    .map(|&g| g as usize)
                    .filter(|&g| {
                        g == face || smooth_all || unit.dot(face_units[g]) >= cos_threshold
                    })
                    .fold(Vec3::ZERO, |acc, g| acc + face_normals[g]);

                let normal = sum.normalize_or_zero();
                corner_normals[corner] = if normal != Vec3::ZERO {
                    normal
                } else if unit != Vec3::ZERO {
                    unit
                } else {
                    FALLBACK_NORMAL
                };
            }
        }

        self.normals = collapse_to_vertices(&self.indices, &corner_normals, self.points.len())
            .unwrap_or(corner_normals);
        self.flags.has_normals = true;
    }

    /// Split vertices so that per-corner normals become vertex-indexed.
    ///
    /// Each distinct (vertex, normal) pair becomes one vertex. Unreferenced
    /// vertices are dropped.
    pub fn split_vertices_by_normal(&mut self) {
        if self.normals.is_empty()
            || self.normal_indexing() != NormalIndexing::Corner
            || self.normals.len() != self.indices.len()
        {
            return;
        }

        let mut lookup: HashMap<(u32, [u32; 3]), u32> = HashMap::new();
        let mut points = Vec::with_capacity(self.points.len());
        let mut normals = Vec::with_capacity(self.points.len());
        let mut indices = Vec::with_capacity(self.indices.len());

        for (corner, &vertex) in self.indices.iter().enumerate() {
            let normal = self.normals[corner];
            let key = (vertex, normal.to_array().map(f32::to_bits));
            let index = *lookup.entry(key).or_insert_with(|| {
                points.push(self.points[vertex as usize]);
                normals.push(normal);
                (points.len() - 1) as u32
            });
            indices.push(index);
        }

        self.points = points;
        self.normals = normals;
        self.indices = indices;
    }
}

/// One normal per vertex if every corner of each vertex agrees.
fn collapse_to_vertices(
    indices: &[u32],
    corner_normals: &[Vec3],
    vertex_count: usize,
) -> Option<Vec<Vec3>> {
    let mut vertex_normals: Vec<Option<Vec3>> = vec![None; vertex_count];
    for (&vertex, &normal) in indices.iter().zip(corner_normals) {
        match vertex_normals[vertex as usize] {
            None => vertex_normals[vertex as usize] = Some(normal),
            Some(existing) if existing.abs_diff_eq(normal, NORMAL_MERGE_EPSILON) => {}
            Some(_) => return None,
        }
    }
    Some(
        vertex_normals
            .into_iter()
            .map(|n| n.unwrap_or(FALLBACK_NORMAL))
            .collect(),
    )
}

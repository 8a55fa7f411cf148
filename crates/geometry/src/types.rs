//! Core mesh types.
//!
//! A [`Mesh`] is the in-memory form of one synchronized mesh: positions,
//! an index buffer, normals in either vertex-indexed or per-corner layout,
//! and the refinement settings the content tool attached to it.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// How a normal array maps onto a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalIndexing {
    /// One normal per vertex (`normals.len() == points.len()`)
    Vertex,
    /// One normal per index-buffer entry (`normals.len() == indices.len()`)
    Corner,
}

/// Per-mesh state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MeshFlags {
    /// Mesh carries a usable normal array
    pub has_normals: bool,
}

/// Switches for [`Mesh::refine`](crate::Mesh::refine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RefineFlags {
    /// Fan-triangulate polygons described by `counts`
    pub triangulate: bool,
    /// Keep `points` and `indices` untouched (normals may stay per corner)
    pub no_reindexing: bool,
    /// Regenerate normals, splitting at edges sharper than the smoothing angle
    pub gen_normals_with_smooth_angle: bool,
    /// Negate every normal
    pub flip_normals: bool,
}

/// Refinement settings record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefineSettings {
    pub flags: RefineFlags,
    /// Smoothing angle in degrees
    pub smooth_angle: f32,
}

impl Default for RefineSettings {
    fn default() -> Self {
        Self {
            flags: RefineFlags::default(),
            smooth_angle: 180.0,
        }
    }
}

impl RefineSettings {
    /// Settings that only regenerate (and flip) normals with the given angle.
    pub fn smooth_normals(smooth_angle: f32) -> Self {
        Self {
            flags: RefineFlags {
                gen_normals_with_smooth_angle: true,
                flip_normals: true,
                ..Default::default()
            },
            smooth_angle,
        }
    }
}

/// A synchronized mesh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mesh {
    /// Vertex positions
    pub points: Vec<Vec3>,
    /// Vertex normals or corner normals, see [`NormalIndexing`]
    pub normals: Vec<Vec3>,
    /// Corner counts per polygon; empty for a plain triangle list
    pub counts: Vec<u32>,
    /// Vertex indices (3 per triangle when `counts` is empty)
    pub indices: Vec<u32>,
    pub flags: MeshFlags,
    pub refine_settings: RefineSettings,
}

impl Mesh {
    /// Create a triangle-list mesh without normals.
    pub fn from_triangles(points: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self {
            points,
            indices,
            ..Default::default()
        }
    }

    /// Attach a smoothing angle (degrees) to the mesh's refine settings.
    pub fn with_smooth_angle(mut self, smooth_angle: f32) -> Self {
        self.refine_settings.smooth_angle = smooth_angle;
        self
    }

    /// Get the number of vertices in the mesh
    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    /// Get the number of triangles in the index buffer.
    ///
    /// Only meaningful for triangle lists.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get the number of faces (polygons or triangles)
    pub fn face_count(&self) -> usize {
        if self.counts.is_empty() {
            self.triangle_count()
        } else {
            self.counts.len()
        }
    }

    /// Determine how `normals` maps onto this mesh.
    ///
    /// A normal array whose length equals the vertex count is vertex-indexed;
    /// any other length is treated as one normal per corner.
    pub fn normal_indexing(&self) -> NormalIndexing {
        if self.normals.len() == self.points.len() {
            NormalIndexing::Vertex
        } else {
            NormalIndexing::Corner
        }
    }

    /// Get the vertex indices for a triangle
    pub fn triangle_indices(&self, tri_index: usize) -> [u32; 3] {
        let base = tri_index * 3;
        [
            self.indices[base],
            self.indices[base + 1],
            self.indices[base + 2],
        ]
    }

    /// Get the vertex positions for a triangle
    pub fn triangle_positions(&self, tri_index: usize) -> [Vec3; 3] {
        self.triangle_indices(tri_index)
            .map(|i| self.points[i as usize])
    }

    /// Normal of the given corner (index-buffer slot), whichever layout is active.
    pub fn corner_normal(&self, corner: usize) -> Vec3 {
        match self.normal_indexing() {
            NormalIndexing::Vertex => self.normals[self.indices[corner] as usize],
            NormalIndexing::Corner => self.normals[corner],
        }
    }

    /// Rewrite vertex-indexed normals as one normal per corner.
    ///
    /// No-op when normals are already per corner.
    pub fn expand_normals_to_corners(&mut self) {
        if self.normal_indexing() == NormalIndexing::Corner {
            return;
        }
        self.normals = self
            .indices
            .iter()
            .map(|&i| self.normals[i as usize])
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Mesh {
        Mesh::from_triangles(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    #[test]
    fn test_normal_indexing() {
        let mut mesh = quad();
        mesh.normals = vec![Vec3::Z; 4];
        assert_eq!(mesh.normal_indexing(), NormalIndexing::Vertex);

        mesh.normals = vec![Vec3::Z; 6];
        assert_eq!(mesh.normal_indexing(), NormalIndexing::Corner);
    }

    #[test]
    fn test_triangle_accessors() {
        let mesh = quad();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.triangle_indices(1), [0, 2, 3]);
        assert_eq!(mesh.triangle_positions(1)[2], Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_expand_normals_to_corners() {
        let mut mesh = quad();
        mesh.normals = vec![Vec3::X, Vec3::Y, Vec3::Z, Vec3::NEG_X];
        mesh.expand_normals_to_corners();

        assert_eq!(mesh.normals.len(), 6);
        assert_eq!(mesh.normals[4], Vec3::Z);
        assert_eq!(mesh.normals[5], Vec3::NEG_X);
        assert_eq!(mesh.corner_normal(5), Vec3::NEG_X);
    }

    #[test]
    fn test_mesh_json_layout() {
        let mut mesh = quad().with_smooth_angle(45.0);
        mesh.flags.has_normals = true;

        let json = serde_json::to_value(&mesh).unwrap();
        assert_eq!(json["refine_settings"]["smooth_angle"], 45.0);
        assert_eq!(json["flags"]["has_normals"], true);
        assert_eq!(json["points"][2], serde_json::json!([1.0, 1.0, 0.0]));

        let back: Mesh = serde_json::from_value(json).unwrap();
        assert_eq!(back, mesh);
    }

    #[test]
    fn test_mesh_json_minimal() {
        let mesh: Mesh = serde_json::from_str(
            r#"{"points": [[0, 0, 0], [1, 0, 0], [0, 1, 0]], "indices": [0, 1, 2]}"#,
        )
        .unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert!(mesh.normals.is_empty());
        assert_eq!(mesh.refine_settings.smooth_angle, 180.0);
    }

    #[test]
    fn test_polygon_face_count() {
        let mut mesh = quad();
        mesh.indices = vec![0, 1, 2, 3];
        mesh.counts = vec![4];
        assert_eq!(mesh.face_count(), 1);
    }
}

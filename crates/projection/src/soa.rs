//! Columnar (structure-of-arrays) triangle buffer for the scalar backend.

use geometry::{Mesh, TriangleColumns};
use glam::Vec3;

/// Flattened triangle corners stored as nine coordinate columns.
///
/// Column `k * 3 + c` holds component `c` of corner `k` for every triangle.
/// Built per projection call and dropped with it.
#[derive(Debug, Clone, Default)]
pub struct TriangleSoA {
    columns: [Vec<f32>; 9],
}

impl TriangleSoA {
    /// Flatten a triangle-list mesh.
    pub fn from_mesh(mesh: &Mesh) -> Self {
        Self::from_parts(&mesh.points, &mesh.indices)
    }

    /// Flatten raw positions and triangle indices.
    pub fn from_parts(points: &[Vec3], indices: &[u32]) -> Self {
        let num_triangles = indices.len() / 3;
        let mut columns: [Vec<f32>; 9] = std::array::from_fn(|_| Vec::with_capacity(num_triangles));

        for triangle in indices.chunks_exact(3) {
            for (k, &vertex) in triangle.iter().enumerate() {
                let p = points[vertex as usize];
                columns[k * 3].push(p.x);
                columns[k * 3 + 1].push(p.y);
                columns[k * 3 + 2].push(p.z);
            }
        }

        Self { columns }
    }

    /// Get the number of triangles in the buffer
    pub fn len(&self) -> usize {
        self.columns[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the columns for the intersection primitive
    pub fn columns(&self) -> TriangleColumns<'_> {
        TriangleColumns::new(std::array::from_fn(|i| self.columns[i].as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_layout() {
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(4.0, 5.0, 6.0),
            Vec3::new(7.0, 8.0, 9.0),
        ];
        let soa = TriangleSoA::from_parts(&points, &[0, 1, 2, 3, 2, 1]);

        assert_eq!(soa.len(), 2);
        let view = soa.columns();
        assert_eq!(view.corner(0, 1), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(view.corner(1, 0), Vec3::new(7.0, 8.0, 9.0));
        assert_eq!(view.triangle(1)[2], Vec3::new(1.0, 2.0, 3.0));
        // Corner 2, y column
        assert_eq!(view.columns[7], &[5.0, 2.0]);
    }

    #[test]
    fn test_empty_mesh() {
        let soa = TriangleSoA::from_mesh(&Mesh::default());
        assert!(soa.is_empty());
        assert!(soa.columns().is_empty());
    }
}

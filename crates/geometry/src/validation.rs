use thiserror::Error;

use crate::types::Mesh;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeshError {
    #[error("Index buffer length {0} is not a multiple of 3")]
    IndexCountNotTriangles(usize),
    #[error("Index {index} at slot {slot} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        slot: usize,
        index: u32,
        vertex_count: usize,
    },
    #[error("Polygon counts sum to {counted} but the index buffer has {indices} entries")]
    CountMismatch { counted: usize, indices: usize },
    #[error("Polygon {face} has {count} corners (minimum is 3)")]
    DegeneratePolygon { face: usize, count: u32 },
    #[error(
        "Normal count {normals} matches neither {points} points nor {indices} indices"
    )]
    NormalCountMismatch {
        normals: usize,
        points: usize,
        indices: usize,
    },
}

impl Mesh {
    /// Check the mesh layout invariants.
    ///
    /// Normal projection does not call this itself; malformed input there
    /// produces undefined numerical results. Use it at ingestion boundaries.
    pub fn validate(&self) -> Result<(), MeshError> {
        if self.counts.is_empty() {
            if self.indices.len() % 3 != 0 {
                return Err(MeshError::IndexCountNotTriangles(self.indices.len()));
            }
        } else {
            if let Some((face, &count)) = self.counts.iter().enumerate().find(|(_, c)| **c < 3) {
                return Err(MeshError::DegeneratePolygon { face, count });
            }
            let counted: usize = self.counts.iter().map(|&c| c as usize).sum();
            if counted != self.indices.len() {
                return Err(MeshError::CountMismatch {
                    counted,
                    indices: self.indices.len(),
                });
            }
        }

        let vertex_count = self.points.len();
        if let Some((slot, &index)) = self
            .indices
            .iter()
            .enumerate()
            .find(|(_, i)| **i as usize >= vertex_count)
        {
            return Err(MeshError::IndexOutOfRange {
                slot,
                index,
                vertex_count,
            });
        }

        let normals = self.normals.len();
        if normals != 0 && normals != vertex_count && normals != self.indices.len() {
            return Err(MeshError::NormalCountMismatch {
                normals,
                points: vertex_count,
                indices: self.indices.len(),
            });
        }

        Ok(())
    }
}

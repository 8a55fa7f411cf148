//! JSON mesh files and post-projection diagnostics

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use geometry::{Mesh, NormalIndexing, raycast_mesh};
use serde::Serialize;

/// Read a mesh and check its layout.
///
/// A file without `refine_settings` gets `default_smooth_angle`.
pub fn load_mesh(path: &Path, default_smooth_angle: f32) -> Result<Mesh> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read mesh {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse mesh {}", path.display()))?;
    let has_settings = value.get("refine_settings").is_some();
    let mut mesh: Mesh = serde_json::from_value(value)
        .with_context(|| format!("Failed to parse mesh {}", path.display()))?;
    if !has_settings {
        mesh.refine_settings.smooth_angle = default_smooth_angle;
    }
    mesh.validate()
        .with_context(|| format!("Invalid mesh {}", path.display()))?;
    Ok(mesh)
}

pub fn save_mesh(path: &Path, mesh: &Mesh) -> Result<()> {
    let text = serde_json::to_string(mesh)?;
    fs::write(path, text).with_context(|| format!("Failed to write mesh {}", path.display()))
}

/// Distance from the destination surface to the reference along the
/// projected normals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SurfaceOffset {
    pub samples: usize,
    pub hits: usize,
    pub mean: f32,
    pub max: f32,
}

/// Measure [`SurfaceOffset`] for a projected `dst` against a refined `src`.
pub fn surface_offset(dst: &Mesh, src: &Mesh) -> SurfaceOffset {
    let indexing = dst.normal_indexing();
    let mut offset = SurfaceOffset {
        samples: dst.normals.len(),
        ..Default::default()
    };
    let mut total = 0.0;

    for (r, &normal) in dst.normals.iter().enumerate() {
        let origin = match indexing {
            NormalIndexing::Vertex => dst.points[r],
            NormalIndexing::Corner => dst.points[dst.indices[r] as usize],
        };
        if let Some(hit) = raycast_mesh(origin, normal, src) {
            offset.hits += 1;
            total += hit.distance;
            offset.max = offset.max.max(hit.distance);
        }
    }

    if offset.hits > 0 {
        offset.mean = total / offset.hits as f32;
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use geometry::generators::quad_grid;
    use glam::Vec3;

    #[test]
    fn test_surface_offset_plane() {
        let mut src = quad_grid(2, 2, 2.0, 2.0);
        for p in &mut src.points {
            p.z = 0.25;
        }
        let mut dst = quad_grid(1, 1, 1.0, 0.6);
        dst.normals = vec![Vec3::Z; dst.points.len()];

        let offset = surface_offset(&dst, &src);
        assert_eq!(offset.samples, 4);
        assert_eq!(offset.hits, 4);
        assert!((offset.mean - 0.25).abs() < 1e-5);
        assert!((offset.max - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_round_trip_file() {
        let path = std::env::temp_dir().join(format!("meshsync-{}.json", std::process::id()));
        let mesh = quad_grid(1, 1, 1.0, 1.0);

        save_mesh(&path, &mesh).unwrap();
        let loaded = load_mesh(&path, 30.0).unwrap();
        let _ = fs::remove_file(&path);

        // Saved settings win over the default
        assert_eq!(loaded, mesh);
    }

    #[test]
    fn test_load_applies_default_smooth_angle() {
        let path = std::env::temp_dir().join(format!("meshsync-bare-{}.json", std::process::id()));
        fs::write(
            &path,
            r#"{"points": [[0, 0, 0], [1, 0, 0], [0, 1, 0]], "indices": [0, 1, 2]}"#,
        )
        .unwrap();
        let loaded = load_mesh(&path, 30.0);
        let _ = fs::remove_file(&path);

        assert_eq!(loaded.unwrap().refine_settings.smooth_angle, 30.0);
    }

    #[test]
    fn test_load_rejects_bad_indices() {
        let path = std::env::temp_dir().join(format!("meshsync-bad-{}.json", std::process::id()));
        fs::write(&path, r#"{"points": [[0, 0, 0]], "indices": [0, 1, 2]}"#).unwrap();
        let result = load_mesh(&path, 180.0);
        let _ = fs::remove_file(&path);

        assert!(result.is_err());
    }
}

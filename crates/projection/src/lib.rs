//! MeshSync normal projection
//!
//! Transfers normals from a detailed reference mesh onto a lower-resolution
//! mesh covering the same shape, so the simplified mesh shades like the
//! original.
//!
//! - [`engine`] - Fast path for identical connectivity, ray-cast path otherwise
//! - [`backend`] - Scalar and data-parallel (host or wgpu) per-ray search
//! - [`soa`] - Columnar triangle buffer used by the scalar backend
//!
//! ```no_run
//! use geometry::generators::uv_sphere;
//! use projection::{EditFlags, project_normals};
//!
//! let mut reference = uv_sphere(1.0, 64, 32);
//! let mut retopo = uv_sphere(0.95, 12, 6);
//! let stats = project_normals(&mut retopo, &mut reference, EditFlags::default())?;
//! println!("{} of {} rays hit", stats.rays_hit, stats.num_rays);
//! # Ok::<(), projection::ProjectionError>(())
//! ```

pub mod backend;
pub mod engine;
pub mod error;
pub mod soa;
pub mod types;

pub use engine::{NormalProjector, project_normals};
pub use error::{ProjectionError, Result};
pub use types::{BackendKind, EditFlags, ProjectionPath, ProjectionStats};

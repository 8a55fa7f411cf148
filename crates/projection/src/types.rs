//! Flags, backend identifiers and per-call statistics.

use std::fmt;

use meshsync_config::ProjectionConfig;
use serde::{Deserialize, Serialize};

/// Caller options for a projection call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EditFlags {
    /// Use the data-parallel backend when an accelerator is available
    pub prefer_gpu: bool,
}

impl EditFlags {
    pub fn from_config(config: &ProjectionConfig) -> Self {
        Self {
            prefer_gpu: config.prefer_gpu,
        }
    }
}

/// Which backend ran the per-ray search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// Scalar search over the columnar triangle buffer
    Scalar,
    /// Flatten-then-search kernels executed on host threads
    HostDataParallel,
    /// Flatten-then-search kernels executed on a wgpu device
    Gpu,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Scalar => write!(f, "CPU"),
            BackendKind::HostDataParallel => write!(f, "CPU kernels"),
            BackendKind::Gpu => write!(f, "GPU"),
        }
    }
}

/// How the destination normals were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionPath {
    /// Connectivity matched, normals copied from the refined source
    CopiedTopology,
    /// Normals resampled by casting rays against the source
    RayCast,
}

/// Result of one projection call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionStats {
    pub path: ProjectionPath,
    /// Backend used by the ray-cast path
    pub backend: Option<BackendKind>,
    /// Number of destination normals written or considered
    pub num_rays: usize,
    /// Number of source triangles searched
    pub num_triangles: usize,
    /// Rays that found a source triangle
    pub rays_hit: usize,
    /// Refinement and buffer building time in milliseconds
    pub setup_ms: f64,
    /// Whole call in milliseconds
    pub total_ms: f64,
}

impl ProjectionStats {
    /// Rays that kept their smoothed normal
    pub fn rays_missed(&self) -> usize {
        self.num_rays.saturating_sub(self.rays_hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_from_config() {
        let config = ProjectionConfig {
            prefer_gpu: true,
            ..Default::default()
        };
        assert!(EditFlags::from_config(&config).prefer_gpu);
        assert!(!EditFlags::default().prefer_gpu);
    }

    #[test]
    fn test_backend_labels() {
        assert_eq!(BackendKind::Scalar.to_string(), "CPU");
        assert_eq!(BackendKind::Gpu.to_string(), "GPU");
    }

    #[test]
    fn test_stats_json() {
        let stats = ProjectionStats {
            path: ProjectionPath::RayCast,
            backend: Some(BackendKind::Scalar),
            num_rays: 10,
            num_triangles: 4,
            rays_hit: 7,
            setup_ms: 0.5,
            total_ms: 1.25,
        };
        assert_eq!(stats.rays_missed(), 3);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["path"], "RayCast");
        assert_eq!(json["backend"], "Scalar");
        assert_eq!(json["rays_hit"], 7);
    }
}

//! Shared configuration for MeshSync
//!
//! This crate provides the single source of truth for settings that control
//! normal projection, shared by the library crates and the CLI driver.

use serde::{Deserialize, Serialize};

/// Default smoothing angle in degrees, used when a mesh carries none
pub const DEFAULT_SMOOTH_ANGLE: f32 = 180.0;

/// Environment variable selecting the accelerated backend
pub const ENV_PREFER_GPU: &str = "MESHSYNC_PREFER_GPU";

/// Environment variable treating the host two-kernel executor as an accelerator
pub const ENV_EMULATE_ACCELERATOR: &str = "MESHSYNC_EMULATE_ACCELERATOR";

/// Environment variable overriding the default smoothing angle
pub const ENV_SMOOTH_ANGLE: &str = "MESHSYNC_SMOOTH_ANGLE";

/// Configuration for normal projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Use the data-parallel backend when an accelerator is available
    pub prefer_gpu: bool,
    /// Count the host executor as an accelerator when no device is present
    pub emulate_accelerator: bool,
    /// Smoothing angle (degrees) for generated meshes and loaded meshes without one
    pub default_smooth_angle: f32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            prefer_gpu: false,
            emulate_accelerator: false,
            default_smooth_angle: DEFAULT_SMOOTH_ANGLE,
        }
    }
}

impl ProjectionConfig {
    /// Build a config from `MESHSYNC_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    ///
    /// Unset or unparsable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_PREFER_GPU) {
            config.prefer_gpu = parse_flag(&value);
        }
        if let Some(value) = lookup(ENV_EMULATE_ACCELERATOR) {
            config.emulate_accelerator = parse_flag(&value);
        }
        if let Some(value) = lookup(ENV_SMOOTH_ANGLE) {
            match value.trim().parse::<f32>() {
                Ok(angle) if angle.is_finite() && angle >= 0.0 => {
                    config.default_smooth_angle = angle;
                }
                _ => tracing::warn!("Ignoring invalid {}={:?}", ENV_SMOOTH_ANGLE, value),
            }
        }

        config
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

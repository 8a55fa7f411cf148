/// Epsilon for determinant and degenerate-area tests in ray intersection.
pub const EPSILON: f32 = 1e-6;

/// Tolerance for deciding that two corner normals of a vertex agree.
pub const NORMAL_MERGE_EPSILON: f32 = 1e-6;

/// Normal used when a face is degenerate and no neighbour provides one.
pub const FALLBACK_NORMAL: glam::Vec3 = glam::Vec3::Z;

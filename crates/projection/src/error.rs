use thiserror::Error;

/// Errors from the accelerated backend.
///
/// A ray that hits nothing is not an error; the destination keeps its
/// smoothed normal. Accelerator absence is not an error either: detection
/// falls back to the scalar backend before any dispatch.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("No GPU adapter available: {0}")]
    NoAdapter(String),
    #[error("GPU device request failed: {0}")]
    DeviceRequest(String),
    #[error("GPU adapter does not support the projection kernels: {0}")]
    Unsupported(String),
    #[error("GPU readback failed: {0}")]
    Readback(String),
}

pub type Result<T> = std::result::Result<T, ProjectionError>;

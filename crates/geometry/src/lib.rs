//! MeshSync geometry - mesh data and the numeric primitives behind normal projection
//!
//! This crate provides:
//! - [`types::Mesh`] - A synchronized mesh with refinement settings
//! - [`refine`] - Triangulation, smoothing-angle normals, flipping, re-indexing
//! - [`raycast`] - Ray/triangle intersection (single and columnar batch) and interpolation
//! - [`validation`] - Layout checks for meshes arriving from the content tool
//! - [`generators`] - Procedural meshes for the CLI driver and tests

pub mod constants;
pub mod generators;
pub mod raycast;
pub mod refine;
pub mod types;
pub mod validation;

pub use constants::*;
pub use raycast::*;
pub use refine::RefineStats;
pub use types::*;
pub use validation::*;

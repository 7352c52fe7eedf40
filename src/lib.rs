//! Sky Projector Library
//!
//! A Rust library for projecting direction vectors on the celestial sphere
//! into 2D viewport pixel coordinates, and back. The projection pipeline
//! chains a pluggable model-view transform with a concrete nonlinear
//! projection family:
//! - Perspective (gnomonic) projection
//! - Stereographic projection
//!
//! Projected window coordinates carry the original vector length in their
//! third component so a depth test downstream works the same for every
//! projection family.

pub mod projector;
pub mod transform;

// Re-export commonly used types
pub use projector::{
    perspective::PerspectiveProjection, stereographic::StereographicProjection, Projection,
    Projector, ProjectorError, ProjectorParams, Viewport,
};

pub use transform::{Mat4Transform, ModelViewTransform, TransformError};

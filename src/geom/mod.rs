//! Geometry shared by the simulation and the renderer

pub mod bbox;
pub mod transform;
pub mod viewport;

pub use bbox::BoundingBox;
pub use transform::ReducedTransform;
pub use viewport::{CLIP_BOX, Viewport};

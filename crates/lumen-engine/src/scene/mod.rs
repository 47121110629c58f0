//! Geometry submitted to the depth and light passes.

mod mesh;
mod model;

pub use mesh::{Mesh, ModelVertex};
pub use model::Model;

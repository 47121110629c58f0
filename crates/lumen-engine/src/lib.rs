//! Lumen engine crate.
//!
//! Forward-plus tiled lighting on wgpu: a depth pre-pass, a compute program that
//! builds one view-space frustum per screen tile, and a light-shading pass that
//! culls lights against those frustums.

pub mod backend;
pub mod config;
pub mod device;
pub mod error;
pub mod lighting;
pub mod logging;
pub mod render;
pub mod resources;
pub mod scene;
pub mod shader;

pub use config::EngineConfig;
pub use error::RenderError;
pub use render::{ForwardPlusRenderer, FrameInputs, FrameReport};

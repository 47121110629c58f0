//! Headless GPU device management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue without a surface
//! - allocating the offscreen color and depth targets frames render into

mod gpu;
mod targets;

pub use gpu::{Gpu, GpuInit};
pub use targets::OffscreenTargets;

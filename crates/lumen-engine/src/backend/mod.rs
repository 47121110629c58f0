//! Device / device-context seam.
//!
//! Components never talk to wgpu directly. They create resources through a
//! [`GpuDevice`] and record commands through a [`DeviceContext`], both generic
//! over a [`Backend`] that names the handle types. Binding is slot based: a
//! component writes a buffer or view into `(stage, slot)`, and the backend turns
//! the slot tables into bind groups when a dispatch or draw is issued.
//!
//! Register-space convention (bind group index per pipeline kind):
//!
//! | kind     | group | contents                            |
//! |----------|-------|-------------------------------------|
//! | compute  | 0     | constant buffers                    |
//! | compute  | 1     | shader-resource views (read-only)   |
//! | compute  | 2     | unordered-access views (read/write) |
//! | graphics | 0     | vertex-stage constant buffers       |
//! | graphics | 1     | vertex-stage shader-resource views  |
//! | graphics | 2     | pixel-stage constant buffers        |
//! | graphics | 3     | pixel-stage shader-resource views   |
//!
//! Within a group, the WGSL `@binding` index is the slot.

mod traits;
mod types;

pub mod wgpu_backend;

#[cfg(test)]
pub(crate) mod recording;

pub use traits::{Backend, DeviceContext, GpuDevice};
pub use types::{
    BufferAccess, BufferDesc, BufferKind, DepthCompare, GraphicsState, PipelineKind,
    RegisterClass, ShaderStage, SlotBinding, ViewDesc, ViewKind, group_count, register_space,
    slot_bindings, validate_buffer_desc, validate_view_desc,
};

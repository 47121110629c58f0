use std::fmt::Debug;

use glam::UVec3;

use crate::error::{CommandError, MapError, ResourceError};
use crate::shader::CompiledShader;

use super::types::{BufferDesc, GraphicsState, ShaderStage, ViewDesc};

/// Associates the handle types a device and its command context share.
///
/// Handles are cheap to clone; a resource is released once the last clone is
/// dropped.
pub trait Backend: 'static {
    type Buffer: Clone + Debug;
    type View: Clone + Debug;
    type ComputeProgram: Clone + Debug;
    type GraphicsProgram: Clone + Debug;
}

/// Creates GPU resources.
pub trait GpuDevice<B: Backend> {
    fn create_buffer(&self, desc: &BufferDesc<'_>) -> Result<B::Buffer, ResourceError>;

    fn create_view(&self, buffer: &B::Buffer, desc: &ViewDesc) -> Result<B::View, ResourceError>;

    fn create_compute_program(
        &self,
        shader: &CompiledShader,
        entry_point: &str,
    ) -> Result<B::ComputeProgram, ResourceError>;

    fn create_graphics_program(
        &self,
        shader: &CompiledShader,
        state: &GraphicsState<'_>,
    ) -> Result<B::GraphicsProgram, ResourceError>;
}

/// Records pipeline state and commands for one frame.
///
/// Slot setters take `None` to clear a slot. State persists across dispatches and
/// draws until it is overwritten or [`reset_state`](Self::reset_state) is called.
pub trait DeviceContext<B: Backend> {
    /// Locks `buffer` for a CPU write and returns its writable size in bytes.
    ///
    /// Every successful call must be paired with exactly one [`unmap`](Self::unmap).
    fn map_write(&mut self, buffer: &B::Buffer) -> Result<u64, MapError>;

    /// Publishes `data` to the start of `buffer` and releases the lock.
    fn unmap(&mut self, buffer: &B::Buffer, data: &[u8]);

    fn set_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: Option<&B::Buffer>);

    fn set_shader_resource(&mut self, stage: ShaderStage, slot: u32, view: Option<&B::View>);

    /// Binds an unordered-access view for the compute stage.
    fn set_unordered_access(&mut self, slot: u32, view: Option<&B::View>);

    fn set_compute_program(&mut self, program: Option<&B::ComputeProgram>);

    fn dispatch(&mut self, groups: UVec3) -> Result<(), CommandError>;

    fn set_graphics_program(&mut self, program: Option<&B::GraphicsProgram>);

    fn set_vertex_buffer(&mut self, buffer: Option<&B::Buffer>, stride: u32);

    fn set_index_buffer(&mut self, buffer: Option<&B::Buffer>);

    /// Enables or disables the color target for subsequent draws.
    fn set_color_output(&mut self, enabled: bool);

    fn draw_indexed(&mut self, index_count: u32) -> Result<(), CommandError>;

    /// Restores output state changed by a depth-only pass.
    ///
    /// Geometry bindings are left in place so the same mesh can be drawn again.
    fn reset_state(&mut self);
}

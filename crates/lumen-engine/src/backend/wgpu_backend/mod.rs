//! wgpu implementation of the device seam.
//!
//! Buffers and views are thin handles around `wgpu::Buffer`. Programs carry an
//! explicit pipeline layout with one bind group per register space (see the
//! parent module), built from the shader's reflected bindings; the context turns
//! its slot tables into bind groups at dispatch and draw time.

mod context;
mod device;

use std::num::NonZeroU64;
use std::sync::Arc;

use super::{Backend, BufferAccess, BufferKind, SlotBinding, ViewDesc};

pub use context::{FrameTargets, WgpuContext};
pub use device::WgpuDevice;

/// Marker type naming the wgpu handle set.
#[derive(Debug)]
pub enum Wgpu {}

impl Backend for Wgpu {
    type Buffer = WgpuBuffer;
    type View = WgpuView;
    type ComputeProgram = WgpuComputeProgram;
    type GraphicsProgram = WgpuGraphicsProgram;
}

#[derive(Debug, Clone)]
pub struct WgpuBuffer {
    id: u64,
    raw: wgpu::Buffer,
    label: Arc<str>,
    kind: BufferKind,
    access: BufferAccess,
    size: u64,
}

impl WgpuBuffer {
    pub fn raw(&self) -> &wgpu::Buffer {
        &self.raw
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

#[derive(Debug, Clone)]
pub struct WgpuView {
    buffer: WgpuBuffer,
    desc: ViewDesc,
}

impl WgpuView {
    pub fn desc(&self) -> &ViewDesc {
        &self.desc
    }

    fn binding(&self) -> wgpu::BindingResource<'_> {
        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: &self.buffer.raw,
            offset: 0,
            size: NonZeroU64::new(self.desc.byte_len()),
        })
    }
}

/// Bind group layouts of one program, one per register space, plus the slots
/// each binding reads from.
#[derive(Debug)]
struct ProgramLayout {
    groups: Vec<wgpu::BindGroupLayout>,
    slots: Vec<SlotBinding>,
}

#[derive(Debug, Clone)]
pub struct WgpuComputeProgram {
    label: Arc<str>,
    pipeline: wgpu::ComputePipeline,
    layout: Arc<ProgramLayout>,
}

#[derive(Debug, Clone)]
pub struct WgpuGraphicsProgram {
    label: Arc<str>,
    pipeline: wgpu::RenderPipeline,
    layout: Arc<ProgramLayout>,
    writes_color: bool,
}

impl WgpuGraphicsProgram {
    pub fn writes_color(&self) -> bool {
        self.writes_color
    }
}

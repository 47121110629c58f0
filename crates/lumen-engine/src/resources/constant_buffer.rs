use std::marker::PhantomData;

use bytemuck::Pod;

use crate::backend::{Backend, BufferAccess, BufferDesc, BufferKind, DeviceContext, GpuDevice, ShaderStage};
use crate::error::{MapError, ResourceError};

use super::MappedWrite;

/// A CPU-writable uniform block holding one `T`, rewritten every frame.
#[derive(Debug)]
pub struct ConstantBuffer<T: Pod, B: Backend> {
    buffer: B::Buffer,
    _marker: PhantomData<T>,
}

impl<T: Pod, B: Backend> ConstantBuffer<T, B> {
    /// Uniform blocks are sized in 16-byte registers.
    pub const SIZE: u64 = (std::mem::size_of::<T>() as u64).next_multiple_of(16);

    pub fn new(device: &impl GpuDevice<B>, label: &str) -> Result<Self, ResourceError> {
        let buffer = device.create_buffer(&BufferDesc {
            label,
            size: Self::SIZE,
            kind: BufferKind::Constant,
            access: BufferAccess { cpu_writable: true, gpu_writable: false },
            initial_data: None,
        })?;
        Ok(Self { buffer, _marker: PhantomData })
    }

    pub fn write<C: DeviceContext<B> + ?Sized>(&self, ctx: &mut C, value: &T) -> Result<(), MapError> {
        let mut map = MappedWrite::<B, C>::map(ctx, &self.buffer)?;
        map.write(0, value)
    }

    pub fn bind<C: DeviceContext<B> + ?Sized>(&self, ctx: &mut C, stage: ShaderStage, slot: u32) {
        ctx.set_constant_buffer(stage, slot, Some(&self.buffer));
    }

    pub fn buffer(&self) -> &B::Buffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{Recording, RecordingContext, RecordingDevice};

    #[test]
    fn size_rounds_to_registers() {
        assert_eq!(ConstantBuffer::<[f32; 3], Recording>::SIZE, 16);
        assert_eq!(ConstantBuffer::<[f32; 4], Recording>::SIZE, 16);
        assert_eq!(ConstantBuffer::<[f32; 20], Recording>::SIZE, 80);
    }

    #[test]
    fn write_then_bind() {
        let device = RecordingDevice::new();
        let mut ctx = RecordingContext::new();
        let cb = ConstantBuffer::<[u32; 4], Recording>::new(&device, "params").unwrap();

        cb.write(&mut ctx, &[1, 2, 3, 4]).unwrap();
        cb.bind(&mut ctx, ShaderStage::Compute, 1);

        assert_eq!(ctx.contents("params").unwrap(), bytemuck::bytes_of(&[1u32, 2, 3, 4]));
        assert_eq!(ctx.constant_buffer(ShaderStage::Compute, 1), Some("params"));
    }
}

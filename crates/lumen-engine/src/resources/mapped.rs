use std::marker::PhantomData;

use bytemuck::Pod;

use crate::backend::{Backend, DeviceContext};
use crate::error::MapError;

/// Scoped CPU write access to a buffer.
///
/// Writes land in a staging copy; dropping the guard publishes what was written
/// and releases the lock, on every exit path. Contents beyond the highest written
/// byte are undefined after the unmap.
pub struct MappedWrite<'a, B: Backend, C: DeviceContext<B> + ?Sized> {
    ctx: &'a mut C,
    buffer: &'a B::Buffer,
    staging: Vec<u8>,
    written: usize,
    _backend: PhantomData<B>,
}

impl<'a, B: Backend, C: DeviceContext<B> + ?Sized> MappedWrite<'a, B, C> {
    pub fn map(ctx: &'a mut C, buffer: &'a B::Buffer) -> Result<Self, MapError> {
        let capacity = ctx.map_write(buffer)?;
        Ok(Self {
            ctx,
            buffer,
            staging: vec![0; capacity as usize],
            written: 0,
            _backend: PhantomData,
        })
    }

    pub fn capacity(&self) -> u64 {
        self.staging.len() as u64
    }

    pub fn write_bytes(&mut self, offset: u64, bytes: &[u8]) -> Result<(), MapError> {
        let end = offset
            .checked_add(bytes.len() as u64)
            .filter(|end| *end <= self.capacity())
            .ok_or(MapError::OutOfRange {
                offset,
                len: bytes.len() as u64,
                capacity: self.capacity(),
            })?;
        self.staging[offset as usize..end as usize].copy_from_slice(bytes);
        self.written = self.written.max(end as usize);
        Ok(())
    }

    pub fn write<T: Pod>(&mut self, offset: u64, value: &T) -> Result<(), MapError> {
        self.write_bytes(offset, bytemuck::bytes_of(value))
    }

    pub fn write_slice<T: Pod>(&mut self, offset: u64, values: &[T]) -> Result<(), MapError> {
        self.write_bytes(offset, bytemuck::cast_slice(values))
    }
}

impl<B: Backend, C: DeviceContext<B> + ?Sized> Drop for MappedWrite<'_, B, C> {
    fn drop(&mut self) {
        // Queue writes must be a multiple of four bytes.
        let len = self.written.next_multiple_of(4).min(self.staging.len());
        self.ctx.unmap(self.buffer, &self.staging[..len]);
    }
}

use std::marker::PhantomData;

use bytemuck::Pod;

use crate::backend::{
    Backend, BufferAccess, BufferDesc, BufferKind, DeviceContext, GpuDevice, ViewDesc, ViewKind,
};
use crate::error::{MapError, ResourceError};

use super::MappedWrite;

/// A typed GPU array of `T` with optional unordered-access and shader-resource
/// views.
///
/// Lifecycle: [`new`](Self::new) → [`initialize`](Self::initialize) → views →
/// use → [`shutdown`](Self::shutdown). Shutdown is idempotent and the buffer may
/// be initialized again afterwards. Dropping the value releases everything.
#[derive(Debug)]
pub struct StructuredBuffer<T: Pod, B: Backend> {
    buffer: Option<B::Buffer>,
    access_view: Option<B::View>,
    resource_view: Option<B::View>,

    label: String,
    element_count: u32,
    access: BufferAccess,

    _marker: PhantomData<T>,
}

impl<T: Pod, B: Backend> Default for StructuredBuffer<T, B> {
    fn default() -> Self {
        Self {
            buffer: None,
            access_view: None,
            resource_view: None,
            label: String::new(),
            element_count: 0,
            access: BufferAccess::default(),
            _marker: PhantomData,
        }
    }
}

impl<T: Pod, B: Backend> StructuredBuffer<T, B> {
    pub const STRIDE: u32 = std::mem::size_of::<T>() as u32;

    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates storage for `element_count` elements.
    ///
    /// Any previous allocation is released first. On failure the buffer is left
    /// uninitialized.
    pub fn initialize(
        &mut self,
        device: &impl GpuDevice<B>,
        label: &str,
        element_count: u32,
        access: BufferAccess,
        initial_data: Option<&[T]>,
    ) -> Result<(), ResourceError> {
        self.shutdown();

        if element_count == 0 {
            return Err(ResourceError::InvalidDescription {
                label: label.to_owned(),
                reason: "element count is zero".into(),
            });
        }
        if let Some(data) = initial_data {
            if data.len() > element_count as usize {
                return Err(ResourceError::InvalidDescription {
                    label: label.to_owned(),
                    reason: format!("{} initial elements for {element_count} slots", data.len()),
                });
            }
        }

        let buffer = device.create_buffer(&BufferDesc {
            label,
            size: u64::from(element_count) * u64::from(Self::STRIDE),
            kind: BufferKind::Structured { stride: Self::STRIDE },
            access,
            initial_data: initial_data.map(|d| bytemuck::cast_slice::<T, u8>(d)),
        })?;

        self.buffer = Some(buffer);
        self.label = label.to_owned();
        self.element_count = element_count;
        self.access = access;
        Ok(())
    }

    /// Creates the read/write view compute programs bind.
    pub fn initialize_access_view(&mut self, device: &impl GpuDevice<B>) -> Result<(), ResourceError> {
        if !self.access.gpu_writable {
            return Err(ResourceError::InvalidDescription {
                label: self.label.clone(),
                reason: "access view requires GPU write access".into(),
            });
        }
        let view = self.create_view(device, ViewKind::UnorderedAccess)?;
        self.access_view = Some(view);
        Ok(())
    }

    /// Creates the read-only view shading programs bind.
    pub fn initialize_resource_view(&mut self, device: &impl GpuDevice<B>) -> Result<(), ResourceError> {
        let view = self.create_view(device, ViewKind::ShaderResource)?;
        self.resource_view = Some(view);
        Ok(())
    }

    fn create_view(&self, device: &impl GpuDevice<B>, kind: ViewKind) -> Result<B::View, ResourceError> {
        let buffer = self.buffer.as_ref().ok_or_else(|| ResourceError::InvalidDescription {
            label: self.label.clone(),
            reason: "view requested before initialize".into(),
        })?;
        device.create_view(
            buffer,
            &ViewDesc {
                kind,
                element_count: self.element_count,
                stride: Self::STRIDE,
            },
        )
    }

    /// Overwrites the first `data.len()` elements from the CPU.
    pub fn write<C: DeviceContext<B> + ?Sized>(&self, ctx: &mut C, data: &[T]) -> Result<(), MapError> {
        let buffer = self.buffer.as_ref().ok_or_else(|| MapError::NotWritable {
            label: self.label.clone(),
        })?;
        let mut map = MappedWrite::<B, C>::map(ctx, buffer)?;
        map.write_slice(0, data)
    }

    pub fn access_view(&self) -> Option<&B::View> {
        self.access_view.as_ref()
    }

    pub fn resource_view(&self) -> Option<&B::View> {
        self.resource_view.as_ref()
    }

    pub fn buffer(&self) -> Option<&B::Buffer> {
        self.buffer.as_ref()
    }

    pub fn element_count(&self) -> u32 {
        self.element_count
    }

    pub fn size_in_bytes(&self) -> u64 {
        u64::from(self.element_count) * u64::from(Self::STRIDE)
    }

    pub fn is_initialized(&self) -> bool {
        self.buffer.is_some()
    }

    /// Releases views, then the buffer. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        self.access_view = None;
        self.resource_view = None;
        self.buffer = None;
        self.element_count = 0;
        self.access = BufferAccess::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{Recording, RecordingContext, RecordingDevice};

    #[derive(Copy, Clone, Pod, bytemuck::Zeroable)]
    #[repr(C)]
    struct Item {
        a: [f32; 4],
        b: [u32; 4],
    }

    type Buf = StructuredBuffer<Item, Recording>;

    const RW: BufferAccess = BufferAccess { cpu_writable: false, gpu_writable: true };

    #[test]
    fn size_is_count_times_stride() {
        let device = RecordingDevice::new();
        let mut buf = Buf::new();
        buf.initialize(&device, "items", 10, RW, None).unwrap();

        assert_eq!(buf.element_count(), 10);
        assert_eq!(buf.size_in_bytes(), 320);
        assert!(buf.access_view().is_none());
        assert!(buf.resource_view().is_none());
    }

    #[test]
    fn shutdown_without_initialize_is_noop() {
        let mut buf = Buf::new();
        buf.shutdown();
        buf.shutdown();
        assert!(!buf.is_initialized());
    }

    #[test]
    fn reinitialize_after_shutdown() {
        let device = RecordingDevice::new();
        let mut buf = Buf::new();
        buf.initialize(&device, "items", 4, RW, None).unwrap();
        buf.initialize_access_view(&device).unwrap();
        buf.shutdown();
        assert_eq!(device.live_resources(), 0);

        buf.initialize(&device, "items", 8, RW, None).unwrap();
        buf.initialize_resource_view(&device).unwrap();
        assert_eq!(buf.element_count(), 8);
        assert_eq!(device.live_resources(), 2);
    }

    #[test]
    fn access_view_needs_gpu_write() {
        let device = RecordingDevice::new();
        let mut buf = Buf::new();
        let access = BufferAccess { cpu_writable: true, gpu_writable: false };
        buf.initialize(&device, "items", 4, access, None).unwrap();

        assert!(buf.initialize_access_view(&device).is_err());
        assert!(buf.initialize_resource_view(&device).is_ok());
    }

    #[test]
    fn allocation_failure_leaves_buffer_empty() {
        let device = RecordingDevice::new();
        device.fail_on_creation(1);
        let mut buf = Buf::new();

        let err = buf.initialize(&device, "items", 4, RW, None).unwrap_err();
        assert!(matches!(err, ResourceError::OutOfMemory { .. }));
        assert!(!buf.is_initialized());
        assert_eq!(buf.element_count(), 0);
    }

    #[test]
    fn too_much_initial_data_is_rejected() {
        let device = RecordingDevice::new();
        let mut buf = Buf::new();
        let data = [Item { a: [0.0; 4], b: [0; 4] }; 3];
        assert!(buf.initialize(&device, "items", 2, RW, Some(&data)).is_err());
    }

    #[test]
    fn write_requires_cpu_access() {
        let device = RecordingDevice::new();
        let mut ctx = RecordingContext::new();
        let mut buf = Buf::new();
        buf.initialize(&device, "items", 2, RW, None).unwrap();

        let item = Item { a: [1.0; 4], b: [2; 4] };
        assert!(matches!(buf.write(&mut ctx, &[item]), Err(MapError::NotWritable { .. })));

        let access = BufferAccess { cpu_writable: true, gpu_writable: false };
        buf.initialize(&device, "items", 2, access, None).unwrap();
        buf.write(&mut ctx, &[item]).unwrap();
        assert_eq!(ctx.contents("items").unwrap(), bytemuck::bytes_of(&item));
    }
}

use glam::Mat4;

use crate::backend::{Backend, BufferAccess, BufferDesc, BufferKind, DeviceContext, GpuDevice};
use crate::error::ResourceError;

use super::{Mesh, ModelVertex};

/// A mesh uploaded to immutable vertex and index buffers.
#[derive(Debug)]
pub struct Model<B: Backend> {
    vertices: B::Buffer,
    indices: B::Buffer,
    index_count: u32,
    pub world: Mat4,
}

impl<B: Backend> Model<B> {
    pub fn new(
        device: &impl GpuDevice<B>,
        label: &str,
        mesh: &Mesh,
        world: Mat4,
    ) -> Result<Self, ResourceError> {
        if mesh.is_empty() {
            return Err(ResourceError::InvalidDescription {
                label: label.to_owned(),
                reason: "mesh has no triangles".into(),
            });
        }

        let vertex_bytes: &[u8] = bytemuck::cast_slice(&mesh.vertices);
        let vertices = device.create_buffer(&BufferDesc {
            label: &format!("{label} vertices"),
            size: vertex_bytes.len() as u64,
            kind: BufferKind::Vertex { stride: ModelVertex::STRIDE },
            access: BufferAccess::default(),
            initial_data: Some(vertex_bytes),
        })?;

        let index_bytes: &[u8] = bytemuck::cast_slice(&mesh.indices);
        let indices = device.create_buffer(&BufferDesc {
            label: &format!("{label} indices"),
            size: index_bytes.len() as u64,
            kind: BufferKind::Index,
            access: BufferAccess::default(),
            initial_data: Some(index_bytes),
        })?;

        log::debug!(
            "model `{label}`: {} vertices, {} triangles",
            mesh.vertices.len(),
            mesh.index_count() / 3
        );

        Ok(Self {
            vertices,
            indices,
            index_count: mesh.index_count(),
            world,
        })
    }

    /// Binds the vertex and index buffers for the next indexed draw.
    pub fn submit<C: DeviceContext<B> + ?Sized>(&self, ctx: &mut C) {
        ctx.set_vertex_buffer(Some(&self.vertices), ModelVertex::STRIDE);
        ctx.set_index_buffer(Some(&self.indices));
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Vertex layout shared by every graphics program.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl ModelVertex {
    pub const STRIDE: u32 = std::mem::size_of::<ModelVertex>() as u32;

    const ATTRS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::STRIDE as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Indexed triangle list on the CPU.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Square in the y = 0 plane, facing +y.
    pub fn plane(half_extent: f32) -> Self {
        let mut mesh = Self::default();
        mesh.push_quad(Vec3::ZERO, Vec3::Y, Vec3::X, half_extent);
        mesh
    }

    /// Axis-aligned cube with flat-shaded faces.
    pub fn cube(centre: Vec3, half_extent: f32) -> Self {
        let mut mesh = Self::default();
        for normal in [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z] {
            let tangent = if normal.y.abs() > 0.5 { Vec3::X } else { Vec3::Y };
            mesh.push_quad(centre + normal * half_extent, normal, tangent, half_extent);
        }
        mesh
    }

    /// Appends `other`, rebasing its indices.
    pub fn merge(&mut self, other: &Mesh) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn push_quad(&mut self, centre: Vec3, normal: Vec3, tangent: Vec3, half_extent: f32) {
        let bitangent = normal.cross(tangent);
        let base = self.vertices.len() as u32;
        for (s, t) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = centre + (tangent * s + bitangent * t) * half_extent;
            self.vertices.push(ModelVertex {
                position: position.to_array(),
                normal: normal.to_array(),
                uv: [(s + 1.0) * 0.5, (t + 1.0) * 0.5],
            });
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::lighting::DispatchParameters;

/// Vertex-stage transform block shared by the depth and light programs.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MatrixUniform {
    pub world: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}

impl MatrixUniform {
    pub fn new(world: &Mat4, view: &Mat4, projection: &Mat4) -> Self {
        Self {
            world: world.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
        }
    }
}

/// Pixel-stage parameters of the light program.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ShadingUniform {
    pub view: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub ambient: [f32; 4],
    /// tiles x, tiles y, block size, light count
    pub tile_grid: [u32; 4],
}

impl ShadingUniform {
    pub fn new(
        view: &Mat4,
        camera_position: Vec3,
        ambient: Vec3,
        dispatch: &DispatchParameters,
        block_size: u32,
        light_count: u32,
    ) -> Self {
        Self {
            view: view.to_cols_array_2d(),
            camera_position: camera_position.extend(1.0).to_array(),
            ambient: ambient.extend(1.0).to_array(),
            tile_grid: [
                dispatch.num_threads.x,
                dispatch.num_threads.y,
                block_size,
                light_count,
            ],
        }
    }
}

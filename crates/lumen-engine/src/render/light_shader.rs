use crate::backend::{
    Backend, BufferAccess, DepthCompare, DeviceContext, GpuDevice, GraphicsState, ShaderStage,
};
use crate::config::ShaderConfig;
use crate::error::RenderError;
use crate::lighting::{GpuLight, LightList, MAX_LIGHTS};
use crate::resources::{ConstantBuffer, StructuredBuffer};
use crate::shader::{self, ShaderRequest};

use super::{MatrixUniform, ShadingUniform};

/// Pixel-stage resource slot the per-tile frustums are read from.
pub const FRUSTUM_SLOT: u32 = 0;
/// Pixel-stage resource slot of the light buffer.
pub const LIGHT_SLOT: u32 = 1;

const MATRIX_SLOT: u32 = 0;
const SHADING_SLOT: u32 = 0;

const COMPONENT: &str = "LightShader";

#[derive(Debug, Copy, Clone)]
pub struct LightShaderParams {
    pub matrices: MatrixUniform,
    pub shading: ShadingUniform,
}

/// Shades the bound geometry with every light that survives the tile frustum
/// test of the fragment's tile.
///
/// The frustum buffer must already be bound at [`FRUSTUM_SLOT`].
pub struct LightShader<B: Backend> {
    program: Option<B::GraphicsProgram>,
    matrices: Option<ConstantBuffer<MatrixUniform, B>>,
    shading: Option<ConstantBuffer<ShadingUniform, B>>,
    lights: StructuredBuffer<GpuLight, B>,
    // LightList version last uploaded.
    uploaded: Option<u64>,
}

impl<B: Backend> Default for LightShader<B> {
    fn default() -> Self {
        Self {
            program: None,
            matrices: None,
            shading: None,
            lights: StructuredBuffer::new(),
            uploaded: None,
        }
    }
}

impl<B: Backend> LightShader<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(
        &mut self,
        device: &impl GpuDevice<B>,
        shaders: &ShaderConfig,
    ) -> Result<(), RenderError> {
        self.shutdown();

        let compiled = shader::compile(&ShaderRequest {
            path: &shaders.light,
            label: "light",
            entry_points: &["vs_main", "fs_main"],
            defines: &[],
            diagnostics: &shaders.diagnostics,
        })?;
        let program = device.create_graphics_program(
            &compiled,
            &GraphicsState {
                vertex_entry: "vs_main",
                fragment_entry: Some("fs_main"),
                depth_write: false,
                depth_compare: DepthCompare::LessEqual,
            },
        )?;

        let mut lights = StructuredBuffer::new();
        lights.initialize(
            device,
            "lights",
            MAX_LIGHTS as u32,
            BufferAccess { cpu_writable: true, gpu_writable: false },
            None,
        )?;
        lights.initialize_resource_view(device)?;

        let matrices = ConstantBuffer::new(device, "light matrices")?;
        let shading = ConstantBuffer::new(device, "light shading")?;

        self.program = Some(program);
        self.matrices = Some(matrices);
        self.shading = Some(shading);
        self.lights = lights;
        Ok(())
    }

    pub fn render<C: DeviceContext<B> + ?Sized>(
        &mut self,
        ctx: &mut C,
        params: &LightShaderParams,
        lights: &LightList,
        index_count: u32,
    ) -> Result<(), RenderError> {
        let (Some(program), Some(matrices), Some(shading), Some(light_view)) = (
            self.program.as_ref(),
            self.matrices.as_ref(),
            self.shading.as_ref(),
            self.lights.resource_view(),
        ) else {
            return Err(RenderError::NotInitialized { component: COMPONENT });
        };

        if self.uploaded != Some(lights.version()) {
            self.lights.write(ctx, &lights.to_gpu())?;
            self.uploaded = Some(lights.version());
            log::debug!("uploaded {} lights (version {})", lights.len(), lights.version());
        }

        matrices.write(ctx, &params.matrices)?;
        matrices.bind(ctx, ShaderStage::Vertex, MATRIX_SLOT);
        shading.write(ctx, &params.shading)?;
        shading.bind(ctx, ShaderStage::Pixel, SHADING_SLOT);
        ctx.set_shader_resource(ShaderStage::Pixel, LIGHT_SLOT, Some(light_view));

        ctx.set_graphics_program(Some(program));
        ctx.draw_indexed(index_count)?;
        Ok(())
    }

    pub fn shutdown(&mut self) {
        self.program = None;
        self.matrices = None;
        self.shading = None;
        self.lights.shutdown();
        self.uploaded = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.program.is_some()
    }
}

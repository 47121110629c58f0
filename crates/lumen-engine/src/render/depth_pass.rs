use crate::backend::{Backend, DepthCompare, DeviceContext, GpuDevice, GraphicsState, ShaderStage};
use crate::config::ShaderConfig;
use crate::error::RenderError;
use crate::resources::ConstantBuffer;
use crate::shader::{self, ShaderRequest};

use super::MatrixUniform;

/// Vertex-stage constant slot of the transform block.
const MATRIX_SLOT: u32 = 0;

const COMPONENT: &str = "DepthPrePass";

/// Writes scene depth with color output disabled so the light pass only
/// shades visible fragments.
pub struct DepthPrePass<B: Backend> {
    program: Option<B::GraphicsProgram>,
    matrices: Option<ConstantBuffer<MatrixUniform, B>>,
}

impl<B: Backend> Default for DepthPrePass<B> {
    fn default() -> Self {
        Self { program: None, matrices: None }
    }
}

impl<B: Backend> DepthPrePass<B> {
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
            path: &shaders.depth,
            label: "depth_vs",
            entry_points: &["vs_main"],
            defines: &[],
            diagnostics: &shaders.diagnostics,
        })?;
        let program = device.create_graphics_program(
            &compiled,
            &GraphicsState {
                vertex_entry: "vs_main",
                fragment_entry: None,
                depth_write: true,
                depth_compare: DepthCompare::Less,
            },
        )?;
        let matrices = ConstantBuffer::new(device, "depth matrices")?;

        self.program = Some(program);
        self.matrices = Some(matrices);
        Ok(())
    }

    /// Draws the bound geometry into the depth target only.
    ///
    /// Leaves color output disabled; the caller resets pipeline state before
    /// the next color pass.
    pub fn render<C: DeviceContext<B> + ?Sized>(
        &self,
        ctx: &mut C,
        matrices: &MatrixUniform,
        index_count: u32,
    ) -> Result<(), RenderError> {
        let (Some(program), Some(buffer)) = (self.program.as_ref(), self.matrices.as_ref()) else {
            return Err(RenderError::NotInitialized { component: COMPONENT });
        };

        buffer.write(ctx, matrices)?;
        buffer.bind(ctx, ShaderStage::Vertex, MATRIX_SLOT);

        ctx.set_graphics_program(Some(program));
        ctx.set_color_output(false);
        ctx.draw_indexed(index_count)?;
        Ok(())
    }

    pub fn shutdown(&mut self) {
        self.program = None;
        self.matrices = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.program.is_some()
    }
}

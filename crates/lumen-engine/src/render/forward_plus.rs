use glam::{Mat4, Vec3};

use crate::EngineConfig;
use crate::backend::{Backend, DeviceContext, GpuDevice};
use crate::config::TileConfig;
use crate::error::RenderError;
use crate::lighting::{
    FrustumComputeShader, FrustumGeneration, LightList, ProjectionTracker, ProjectionVersion,
    VersionedProjection,
};
use crate::scene::Model;

use super::{
    DepthPrePass, FRUSTUM_SLOT, LightShader, LightShaderParams, MatrixUniform, ShadingUniform,
};

const COMPONENT: &str = "ForwardPlusRenderer";

const AMBIENT: Vec3 = Vec3::new(0.03, 0.03, 0.04);

/// Camera state for one frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameInputs {
    pub view: Mat4,
    pub projection: Mat4,
    /// World space.
    pub camera_position: Vec3,
}

/// What a successful [`ForwardPlusRenderer::render`] did.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameReport {
    /// 1-based, counting failed frames too.
    pub frame_index: u64,
    pub projection_version: ProjectionVersion,
    /// Frustum generation the light pass read.
    pub shaded_with: FrustumGeneration,
    /// The light pass read frustums built from an older projection.
    pub stale: bool,
    pub tile_count: u32,
    pub light_count: usize,
}

/// Runs the forward-plus frame: depth pre-pass, state reset, light shading
/// against the current frustum buffer, then frustum recomputation for the
/// next frame.
///
/// Components are initialized light shader, depth pass, frustum compute and
/// released in reverse.
pub struct ForwardPlusRenderer<B: Backend> {
    light_shader: LightShader<B>,
    depth_pass: DepthPrePass<B>,
    frustum_cs: FrustumComputeShader<B>,

    lights: LightList,
    projections: ProjectionTracker,
    tiles: TileConfig,
    frame_index: u64,
}

impl<B: Backend> Default for ForwardPlusRenderer<B> {
    fn default() -> Self {
        Self {
            light_shader: LightShader::new(),
            depth_pass: DepthPrePass::new(),
            frustum_cs: FrustumComputeShader::new(),
            lights: LightList::new(),
            projections: ProjectionTracker::new(),
            tiles: TileConfig::default(),
            frame_index: 0,
        }
    }
}

impl<B: Backend> ForwardPlusRenderer<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every component from `config`.
    ///
    /// On failure nothing stays allocated and the renderer is left
    /// uninitialized.
    pub fn initialize(
        &mut self,
        device: &impl GpuDevice<B>,
        config: &EngineConfig,
    ) -> Result<(), RenderError> {
        self.shutdown();
        config.validate()?;

        let mut light_shader = LightShader::new();
        light_shader.initialize(device, &config.shaders)?;

        let mut depth_pass = DepthPrePass::new();
        depth_pass.initialize(device, &config.shaders)?;

        let mut frustum_cs = FrustumComputeShader::new();
        frustum_cs.initialize(device, &config.shaders, config.screen)?;

        let lights = LightList::random(&config.lights);

        log::info!(
            "forward-plus renderer ready: {}x{}, {} tiles, {} lights",
            config.screen.width,
            config.screen.height,
            frustum_cs.dispatch_parameters().tile_count(),
            lights.len()
        );

        self.light_shader = light_shader;
        self.depth_pass = depth_pass;
        self.frustum_cs = frustum_cs;
        self.lights = lights;
        self.projections = ProjectionTracker::new();
        self.tiles = config.screen;
        self.frame_index = 0;
        Ok(())
    }

    /// Renders `model` once.
    ///
    /// Any failing step aborts the frame; pipeline state set by earlier steps
    /// is left as is. A constant-buffer map failure in the frustum update is
    /// not fatal: the dispatch runs on the previous frame's constants.
    pub fn render<C: DeviceContext<B> + ?Sized>(
        &mut self,
        ctx: &mut C,
        inputs: &FrameInputs,
        model: &Model<B>,
    ) -> Result<FrameReport, RenderError> {
        if !self.is_initialized() {
            return Err(RenderError::NotInitialized { component: COMPONENT });
        }
        self.frame_index += 1;

        let projection = self.projections.observe(inputs.projection);
        let matrices = MatrixUniform::new(&model.world, &inputs.view, &inputs.projection);

        model.submit(ctx);

        self.depth_pass.render(ctx, &matrices, model.index_count())?;

        ctx.reset_state();

        // Nothing has been dispatched yet: build the frustums shading is about
        // to read.
        if self.frustum_cs.generation().is_none() {
            log::debug!("priming frustum buffer for projection {:?}", projection.version);
            self.update_frustums(ctx, &projection)?;
        }
        let shaded_with = self
            .frustum_cs
            .generation()
            .ok_or(RenderError::NotInitialized { component: COMPONENT })?;

        let dispatch = *self.frustum_cs.dispatch_parameters();
        let params = LightShaderParams {
            matrices,
            shading: ShadingUniform::new(
                &inputs.view,
                inputs.camera_position,
                AMBIENT,
                &dispatch,
                self.tiles.block_size,
                self.lights.len() as u32,
            ),
        };

        self.frustum_cs.bind(ctx, FRUSTUM_SLOT)?;
        let shaded = self
            .light_shader
            .render(ctx, &params, &self.lights, model.index_count());
        self.frustum_cs.unbind(ctx, FRUSTUM_SLOT);
        shaded?;

        self.update_frustums(ctx, &projection)?;

        let stale = shaded_with.projection != Some(projection.version);
        if stale {
            log::debug!(
                "frame {}: shaded with frustums of {:?}, projection is now {:?}",
                self.frame_index,
                shaded_with.projection,
                projection.version
            );
        }

        Ok(FrameReport {
            frame_index: self.frame_index,
            projection_version: projection.version,
            shaded_with,
            stale,
            tile_count: dispatch.tile_count(),
            light_count: self.lights.len(),
        })
    }

    /// Uploads the screen-to-view parameters for `projection` and rebuilds the
    /// frustum buffer.
    ///
    /// A failed map still dispatches with the constants of the last successful
    /// upload; the resulting generation keeps that upload's projection version.
    fn update_frustums<C: DeviceContext<B> + ?Sized>(
        &mut self,
        ctx: &mut C,
        projection: &VersionedProjection,
    ) -> Result<(), RenderError> {
        match self.frustum_cs.set_shader_parameters(ctx, projection) {
            Ok(()) | Err(RenderError::Map(_)) => {}
            Err(e) => return Err(e),
        }
        self.frustum_cs.dispatch(ctx)?;
        Ok(())
    }

    /// Releases frustum compute, depth pass, then light shader. Idempotent.
    pub fn shutdown(&mut self) {
        if self.is_initialized() {
            log::debug!("shutting down forward-plus renderer after {} frames", self.frame_index);
        }
        self.frustum_cs.shutdown();
        self.depth_pass.shutdown();
        self.light_shader.shutdown();
    }

    pub fn is_initialized(&self) -> bool {
        self.light_shader.is_initialized()
            && self.depth_pass.is_initialized()
            && self.frustum_cs.is_initialized()
    }

    pub fn lights(&self) -> &LightList {
        &self.lights
    }

    /// Changes are uploaded by the next frame.
    pub fn lights_mut(&mut self) -> &mut LightList {
        &mut self.lights
    }

    pub fn frustum_compute(&self) -> &FrustumComputeShader<B> {
        &self.frustum_cs
    }
}

impl<B: Backend> Drop for ForwardPlusRenderer<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

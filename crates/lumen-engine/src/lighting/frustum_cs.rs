use crate::backend::{Backend, BufferAccess, DeviceContext, GpuDevice, ShaderStage};
use crate::config::{ShaderConfig, TileConfig};
use crate::error::{MapError, RenderError};
use crate::resources::{ConstantBuffer, StructuredBuffer};
use crate::shader::{self, ShaderRequest};

use super::dispatch::{DispatchParameters, DispatchParamsUniform};
use super::frustum::{Frustum, ScreenToView, ScreenToViewUniform};
use super::projection::{ProjectionVersion, VersionedProjection, inverse_perspective};

/// Compute-stage slot of the frustum output view.
pub const FRUSTUM_OUTPUT_SLOT: u32 = 0;
/// Compute-stage constant slot of the dispatch parameters.
pub const DISPATCH_PARAMS_SLOT: u32 = 0;
/// Compute-stage constant slot of the screen-to-view parameters.
pub const SCREEN_TO_VIEW_SLOT: u32 = 1;

const COMPONENT: &str = "FrustumComputeShader";

/// Identifies one dispatch of the frustum program and the projection its
/// constants were derived from.
///
/// `projection` is `None` when the dispatch ran before any parameters were
/// uploaded successfully.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrustumGeneration {
    pub sequence: u64,
    pub projection: Option<ProjectionVersion>,
}

/// Builds one view-space frustum per screen tile on the GPU.
///
/// Owns the compute program, the dispatch and screen-to-view constant buffers,
/// and the frustum buffer downstream shading reads through
/// [`bind`](Self::bind).
pub struct FrustumComputeShader<B: Backend> {
    program: Option<B::ComputeProgram>,
    dispatch_params: Option<ConstantBuffer<DispatchParamsUniform, B>>,
    screen_to_view: Option<ConstantBuffer<ScreenToViewUniform, B>>,
    frustums: StructuredBuffer<Frustum, B>,

    tiles: TileConfig,
    dispatch: DispatchParameters,

    uploaded: Option<ProjectionVersion>,
    generation: Option<FrustumGeneration>,
    sequence: u64,
}

impl<B: Backend> Default for FrustumComputeShader<B> {
    fn default() -> Self {
        let tiles = TileConfig::default();
        Self {
            program: None,
            dispatch_params: None,
            screen_to_view: None,
            frustums: StructuredBuffer::new(),
            dispatch: DispatchParameters::for_screen(&tiles),
            tiles,
            uploaded: None,
            generation: None,
            sequence: 0,
        }
    }
}

impl<B: Backend> FrustumComputeShader<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles the program and allocates every buffer.
    ///
    /// Either everything is created or nothing is: on failure all resources made
    /// so far are released before returning.
    pub fn initialize(
        &mut self,
        device: &impl GpuDevice<B>,
        shaders: &ShaderConfig,
        tiles: TileConfig,
    ) -> Result<(), RenderError> {
        self.shutdown();
        tiles.validate()?;

        let compiled = shader::compile(&ShaderRequest {
            path: &shaders.frustum,
            label: "frustum_cs",
            entry_points: &["main"],
            defines: &[("BLOCK_SIZE", tiles.block_size)],
            diagnostics: &shaders.diagnostics,
        })?;
        let program = device.create_compute_program(&compiled, "main")?;

        let dispatch = DispatchParameters::for_screen(&tiles);

        let mut frustums = StructuredBuffer::new();
        frustums.initialize(
            device,
            "frustums",
            dispatch.tile_count(),
            BufferAccess { cpu_writable: false, gpu_writable: true },
            None,
        )?;
        frustums.initialize_access_view(device)?;
        frustums.initialize_resource_view(device)?;

        let dispatch_params = ConstantBuffer::new(device, "frustum dispatch params")?;
        let screen_to_view = ConstantBuffer::new(device, "frustum screen-to-view")?;

        log::info!(
            "frustum compute: {}x{} px, {}px tiles -> {} threads in {} groups, {} frustums ({} bytes)",
            tiles.width,
            tiles.height,
            tiles.block_size,
            dispatch.num_threads,
            dispatch.num_thread_groups,
            dispatch.tile_count(),
            frustums.size_in_bytes()
        );

        self.program = Some(program);
        self.dispatch_params = Some(dispatch_params);
        self.screen_to_view = Some(screen_to_view);
        self.frustums = frustums;
        self.tiles = tiles;
        self.dispatch = dispatch;
        Ok(())
    }

    /// Uploads dispatch and screen-to-view constants for `projection` and binds
    /// them to compute slots 0 and 1.
    ///
    /// A failed map aborts the call; constants keep their previous contents.
    pub fn set_shader_parameters<C: DeviceContext<B> + ?Sized>(
        &mut self,
        ctx: &mut C,
        projection: &VersionedProjection,
    ) -> Result<(), RenderError> {
        let (Some(dispatch_params), Some(screen_to_view)) =
            (self.dispatch_params.as_ref(), self.screen_to_view.as_ref())
        else {
            return Err(RenderError::NotInitialized { component: COMPONENT });
        };

        let inverse = inverse_perspective(&projection.matrix)?;
        let s2v = ScreenToView::new(inverse, &self.tiles).uniform();

        let stale = |e: MapError| {
            log::warn!("frustum constants not updated, keeping previous contents: {e}");
            e
        };

        dispatch_params.write(ctx, &self.dispatch.uniform()).map_err(stale)?;
        dispatch_params.bind(ctx, ShaderStage::Compute, DISPATCH_PARAMS_SLOT);

        screen_to_view.write(ctx, &s2v).map_err(stale)?;
        screen_to_view.bind(ctx, ShaderStage::Compute, SCREEN_TO_VIEW_SLOT);

        self.uploaded = Some(projection.version);
        Ok(())
    }

    /// Rebuilds the whole frustum buffer using the precomputed thread-group
    /// counts.
    pub fn dispatch<C: DeviceContext<B> + ?Sized>(
        &mut self,
        ctx: &mut C,
    ) -> Result<FrustumGeneration, RenderError> {
        let (Some(program), Some(output)) = (self.program.as_ref(), self.frustums.access_view())
        else {
            return Err(RenderError::NotInitialized { component: COMPONENT });
        };

        ctx.set_compute_program(Some(program));
        ctx.set_unordered_access(FRUSTUM_OUTPUT_SLOT, Some(output));
        let result = ctx.dispatch(self.dispatch.num_thread_groups);
        ctx.set_unordered_access(FRUSTUM_OUTPUT_SLOT, None);
        result?;

        self.sequence += 1;
        let generation = FrustumGeneration {
            sequence: self.sequence,
            projection: self.uploaded,
        };
        self.generation = Some(generation);
        Ok(generation)
    }

    /// Exposes the frustum buffer to the pixel stage at `slot`.
    pub fn bind<C: DeviceContext<B> + ?Sized>(&self, ctx: &mut C, slot: u32) -> Result<(), RenderError> {
        let view = self
            .frustums
            .resource_view()
            .ok_or(RenderError::NotInitialized { component: COMPONENT })?;
        ctx.set_shader_resource(ShaderStage::Pixel, slot, Some(view));
        Ok(())
    }

    pub fn unbind<C: DeviceContext<B> + ?Sized>(&self, ctx: &mut C, slot: u32) {
        ctx.set_shader_resource(ShaderStage::Pixel, slot, None);
    }

    /// Releases the program, both constant buffers, then the frustum buffer.
    pub fn shutdown(&mut self) {
        self.program = None;
        self.dispatch_params = None;
        self.screen_to_view = None;
        self.frustums.shutdown();
        self.uploaded = None;
        self.generation = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.program.is_some()
    }

    pub fn dispatch_parameters(&self) -> &DispatchParameters {
        &self.dispatch
    }

    pub fn tiles(&self) -> &TileConfig {
        &self.tiles
    }

    pub fn frustums(&self) -> &StructuredBuffer<Frustum, B> {
        &self.frustums
    }

    /// The last successful dispatch, if any since initialization.
    pub fn generation(&self) -> Option<FrustumGeneration> {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{Mat4, UVec3};

    use super::*;
    use crate::backend::recording::{Event, Recording, RecordingContext, RecordingDevice};
    use crate::error::ShaderError;

    type Fcs = FrustumComputeShader<Recording>;

    fn svga() -> TileConfig {
        TileConfig { width: 800, height: 600, block_size: 16 }
    }

    fn projection(version: u64) -> VersionedProjection {
        VersionedProjection {
            matrix: Mat4::perspective_lh(1.0, 800.0 / 600.0, 0.1, 100.0),
            version: ProjectionVersion(version),
        }
    }

    fn ready(device: &RecordingDevice) -> Fcs {
        let mut fcs = Fcs::new();
        fcs.initialize(device, &ShaderConfig::default(), svga()).unwrap();
        fcs
    }

    // ── initialize ────────────────────────────────────────────────────────

    #[test]
    fn buffer_holds_one_frustum_per_tile() {
        let device = RecordingDevice::new();
        let fcs = ready(&device);

        assert_eq!(fcs.frustums().element_count(), 1900);
        assert_eq!(fcs.frustums().size_in_bytes(), 1900 * 96);
        assert!(fcs.frustums().access_view().is_some());
        assert!(fcs.frustums().resource_view().is_some());
    }

    #[test]
    fn any_creation_failure_leaks_nothing() {
        // program, buffer, access view, resource view, two constant buffers
        for n in 1..=6 {
            let device = RecordingDevice::new();
            device.fail_on_creation(n);
            let mut fcs = Fcs::new();

            let err = fcs.initialize(&device, &ShaderConfig::default(), svga()).unwrap_err();

            assert!(matches!(err, RenderError::Resource(_)), "step {n}: {err}");
            assert!(!fcs.is_initialized());
            assert_eq!(device.live_resources(), 0, "step {n} leaked");
        }
    }

    #[test]
    fn missing_shader_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let device = RecordingDevice::new();
        let shaders = ShaderConfig {
            frustum: dir.path().join("absent.wgsl"),
            diagnostics: dir.path().join("shader-error.txt"),
            ..ShaderConfig::default()
        };

        let err = Fcs::new().initialize(&device, &shaders, svga()).unwrap_err();

        assert!(matches!(err, RenderError::Shader(ShaderError::FileMissing { .. })));
        assert!(device.created_labels().is_empty());
        assert!(!shaders.diagnostics.exists());
    }

    #[test]
    fn shutdown_is_idempotent_and_reinitializable() {
        let device = RecordingDevice::new();
        let mut fcs = Fcs::new();
        fcs.shutdown();

        fcs.initialize(&device, &ShaderConfig::default(), svga()).unwrap();
        fcs.shutdown();
        fcs.shutdown();
        assert_eq!(device.live_resources(), 0);

        fcs.initialize(&device, &ShaderConfig::default(), svga()).unwrap();
        assert!(fcs.is_initialized());
    }

    // ── parameters ────────────────────────────────────────────────────────

    #[test]
    fn parameters_bind_compute_slots() {
        let device = RecordingDevice::new();
        let mut ctx = RecordingContext::new();
        let mut fcs = ready(&device);

        fcs.set_shader_parameters(&mut ctx, &projection(1)).unwrap();

        assert_eq!(
            ctx.constant_buffer(ShaderStage::Compute, 0),
            Some("frustum dispatch params")
        );
        assert_eq!(
            ctx.constant_buffer(ShaderStage::Compute, 1),
            Some("frustum screen-to-view")
        );

        let dp: DispatchParamsUniform =
            bytemuck::pod_read_unaligned(ctx.contents("frustum dispatch params").unwrap());
        assert_eq!(dp.num_threads, [50, 38, 1, 0]);
        assert_eq!(dp.num_thread_groups, [4, 3, 1, 0]);
    }

    #[test]
    fn uploaded_inverse_has_reciprocal_diagonal() {
        let device = RecordingDevice::new();
        let mut ctx = RecordingContext::new();
        let mut fcs = ready(&device);
        let p = projection(1);

        fcs.set_shader_parameters(&mut ctx, &p).unwrap();

        let s2v: ScreenToViewUniform =
            bytemuck::pod_read_unaligned(ctx.contents("frustum screen-to-view").unwrap());
        assert_relative_eq!(s2v.inverse_projection[0][0], 1.0 / p.matrix.x_axis.x);
        assert_relative_eq!(s2v.inverse_projection[1][1], 1.0 / p.matrix.y_axis.y);
        assert_eq!(s2v.screen_dimensions, [800.0, 600.0]);
    }

    #[test]
    fn map_failure_keeps_maps_paired() {
        let device = RecordingDevice::new();
        let mut ctx = RecordingContext::new();
        let mut fcs = ready(&device);
        fcs.set_shader_parameters(&mut ctx, &projection(1)).unwrap();
        ctx.fail_map_of("frustum screen-to-view");

        let err = fcs.set_shader_parameters(&mut ctx, &projection(2)).unwrap_err();

        assert!(matches!(err, RenderError::Map(MapError::Lost { .. })));
        assert_eq!(ctx.open_maps(), 0);

        // The next dispatch still runs on the constants of the first projection.
        let generation = fcs.dispatch(&mut ctx).unwrap();
        assert_eq!(generation.projection, Some(ProjectionVersion(1)));
    }

    #[test]
    fn bad_projection_fails_before_mapping() {
        let device = RecordingDevice::new();
        let mut ctx = RecordingContext::new();
        let mut fcs = ready(&device);
        let ortho = VersionedProjection {
            matrix: Mat4::orthographic_lh(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0),
            version: ProjectionVersion(1),
        };

        let err = fcs.set_shader_parameters(&mut ctx, &ortho).unwrap_err();

        assert!(matches!(err, RenderError::Projection(_)));
        assert!(ctx.events.is_empty());
    }

    // ── dispatch ──────────────────────────────────────────────────────────

    #[test]
    fn dispatch_uses_initialization_time_groups() {
        let device = RecordingDevice::new();
        let mut ctx = RecordingContext::new();
        let mut fcs = ready(&device);

        fcs.set_shader_parameters(&mut ctx, &projection(7)).unwrap();
        let generation = fcs.dispatch(&mut ctx).unwrap();

        assert_eq!(ctx.dispatches(), vec![("frustum_cs".to_owned(), UVec3::new(4, 3, 1))]);
        assert_eq!(generation, FrustumGeneration { sequence: 1, projection: Some(ProjectionVersion(7)) });
        assert!(ctx.events.contains(&Event::SetUnorderedAccess {
            slot: FRUSTUM_OUTPUT_SLOT,
            view: Some("frustums".to_owned()),
        }));
    }

    #[test]
    fn dispatch_without_parameters_reports_unbound_constants() {
        let device = RecordingDevice::new();
        let mut ctx = RecordingContext::new();
        let mut fcs = ready(&device);

        let err = fcs.dispatch(&mut ctx).unwrap_err();

        assert!(matches!(err, RenderError::Command(_)));
        assert!(fcs.generation().is_none());
    }

    #[test]
    fn dispatch_before_initialize_fails() {
        let mut ctx = RecordingContext::new();
        let err = Fcs::new().dispatch(&mut ctx).unwrap_err();
        assert!(matches!(err, RenderError::NotInitialized { .. }));
    }

    // ── bind / unbind ─────────────────────────────────────────────────────

    #[test]
    fn unbind_leaves_slot_empty() {
        let device = RecordingDevice::new();
        let mut ctx = RecordingContext::new();
        let fcs = ready(&device);

        fcs.bind(&mut ctx, 3).unwrap();
        assert_eq!(ctx.shader_resource(ShaderStage::Pixel, 3), Some("frustums"));

        fcs.unbind(&mut ctx, 3);
        assert_eq!(ctx.shader_resource(ShaderStage::Pixel, 3), None);
        assert_eq!(
            ctx.events.last(),
            Some(&Event::SetShaderResource { stage: ShaderStage::Pixel, slot: 3, view: None })
        );
    }
}

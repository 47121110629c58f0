use std::path::PathBuf;

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};
use lumen_engine::backend::wgpu_backend::{WgpuContext, WgpuDevice};
use lumen_engine::device::{Gpu, GpuInit, OffscreenTargets};
use lumen_engine::logging::init_logging;
use lumen_engine::scene::{Mesh, Model};
use lumen_engine::{EngineConfig, ForwardPlusRenderer, FrameInputs};

/// One full camera orbit.
const FRAMES: u32 = 240;

fn main() -> Result<()> {
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => EngineConfig::load(&path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    init_logging(&config.logging);

    pollster::block_on(run(config))
}

async fn run(config: EngineConfig) -> Result<()> {
    let gpu = Gpu::new(GpuInit::default()).await.context("failed to initialize GPU")?;
    let info = gpu.adapter_info();
    log::info!("adapter: {} ({:?})", info.name, info.backend);

    let device = WgpuDevice::new(&gpu);
    let mut ctx = WgpuContext::new(&device);
    let targets = OffscreenTargets::new(&gpu, config.screen.width, config.screen.height);

    let mut renderer = ForwardPlusRenderer::new();
    renderer
        .initialize(&device, &config)
        .context("failed to initialize forward-plus renderer")?;

    let model = Model::new(&device, "scene", &scene(), Mat4::IDENTITY)
        .context("failed to upload scene geometry")?;

    let projection = config.camera.projection(config.aspect_ratio());
    let mut stale_frames = 0;

    for frame in 0..FRAMES {
        let angle = frame as f32 / FRAMES as f32 * std::f32::consts::TAU;
        let eye = Vec3::new(angle.cos() * 22.0, 9.0, angle.sin() * 22.0);
        let inputs = FrameInputs {
            view: Mat4::look_at_lh(eye, Vec3::ZERO, Vec3::Y),
            projection,
            camera_position: eye,
        };

        ctx.begin_frame(targets.frame_targets(), wgpu::Color::BLACK);
        let report = renderer
            .render(&mut ctx, &inputs, &model)
            .with_context(|| format!("frame {frame} failed"))?;
        ctx.submit();

        if report.stale {
            stale_frames += 1;
        }
        log::debug!("{report:?}");
    }

    let (width, height) = targets.size();
    log::info!("rendered {FRAMES} frames at {width}x{height} ({stale_frames} stale)");

    renderer.shutdown();
    Ok(())
}

/// A floor with a ring of boxes for the lights to fall on.
fn scene() -> Mesh {
    let mut mesh = Mesh::plane(16.0);
    for i in 0..12 {
        let angle = i as f32 / 12.0 * std::f32::consts::TAU;
        let centre = Vec3::new(angle.cos() * 9.0, 1.0, angle.sin() * 9.0);
        mesh.merge(&Mesh::cube(centre, 1.0));
    }
    mesh.merge(&Mesh::cube(Vec3::new(0.0, 2.0, 0.0), 2.0));
    mesh
}

use crate::backend::wgpu_backend::FrameTargets;

use super::Gpu;

/// Color and depth textures a headless frame renders into.
pub struct OffscreenTargets {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl OffscreenTargets {
    pub fn new(gpu: &Gpu, width: u32, height: u32) -> Self {
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };

        let color = gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("lumen offscreen color"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: gpu.color_format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let depth = gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("lumen offscreen depth"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: gpu.depth_format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            color,
            color_view,
            depth_view,
            width: size.width,
            height: size.height,
        }
    }

    pub fn frame_targets(&self) -> FrameTargets {
        FrameTargets {
            color: self.color_view.clone(),
            depth: self.depth_view.clone(),
        }
    }

    pub fn color_texture(&self) -> &wgpu::Texture {
        &self.color
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

use std::collections::{HashMap, HashSet};

use glam::UVec3;

use crate::backend::{DeviceContext, PipelineKind, RegisterClass, ShaderStage};
use crate::error::{CommandError, MapError};

use super::device::WgpuDevice;
use super::{
    ProgramLayout, Wgpu, WgpuBuffer, WgpuComputeProgram, WgpuGraphicsProgram, WgpuView,
};

/// Attachments the draws of one frame render into.
#[derive(Debug, Clone)]
pub struct FrameTargets {
    pub color: wgpu::TextureView,
    pub depth: wgpu::TextureView,
}

/// Command recorder backed by a single `wgpu::CommandEncoder` per frame.
///
/// Every dispatch and draw becomes its own compute or render pass. Attachments
/// are cleared by the first pass that touches them after [`begin_frame`].
///
/// [`begin_frame`]: WgpuContext::begin_frame
pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,

    constants: HashMap<(ShaderStage, u32), WgpuBuffer>,
    resources: HashMap<(ShaderStage, u32), WgpuView>,
    unordered: HashMap<u32, WgpuView>,
    mapped: HashSet<u64>,

    compute: Option<WgpuComputeProgram>,
    graphics: Option<WgpuGraphicsProgram>,
    vertex: Option<WgpuBuffer>,
    index: Option<WgpuBuffer>,
    color_output: bool,

    encoder: Option<wgpu::CommandEncoder>,
    targets: Option<FrameTargets>,
    clear_color: Option<wgpu::Color>,
    clear_depth: bool,
}

impl WgpuContext {
    pub fn new(device: &WgpuDevice) -> Self {
        Self {
            device: device.device().clone(),
            queue: device.queue().clone(),
            constants: HashMap::new(),
            resources: HashMap::new(),
            unordered: HashMap::new(),
            mapped: HashSet::new(),
            compute: None,
            graphics: None,
            vertex: None,
            index: None,
            color_output: true,
            encoder: None,
            targets: None,
            clear_color: None,
            clear_depth: false,
        }
    }

    /// Starts recording a frame into `targets`, clearing color to `clear`.
    pub fn begin_frame(&mut self, targets: FrameTargets, clear: wgpu::Color) {
        if self.encoder.is_some() {
            log::warn!("begin_frame called with unsubmitted commands; submitting them first");
            self.submit();
        }
        self.targets = Some(targets);
        self.clear_color = Some(clear);
        self.clear_depth = true;
    }

    /// Submits everything recorded since the last submit.
    pub fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    fn take_encoder(&mut self) -> wgpu::CommandEncoder {
        self.encoder.take().unwrap_or_else(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("lumen frame encoder"),
                })
        })
    }

    fn bind_groups(
        &self,
        program: &str,
        layout: &ProgramLayout,
    ) -> Result<Vec<wgpu::BindGroup>, CommandError> {
        layout
            .groups
            .iter()
            .enumerate()
            .map(|(group, bgl)| {
                let entries = layout
                    .slots
                    .iter()
                    .filter(|s| s.group == group as u32)
                    .map(|s| {
                        let resource = match s.class {
                            RegisterClass::Constant => self
                                .constants
                                .get(&(s.stage, s.slot))
                                .map(|b| b.raw.as_entire_binding()),
                            RegisterClass::ShaderResource => {
                                self.resources.get(&(s.stage, s.slot)).map(WgpuView::binding)
                            }
                            RegisterClass::UnorderedAccess => {
                                self.unordered.get(&s.slot).map(WgpuView::binding)
                            }
                        };
                        resource
                            .map(|resource| wgpu::BindGroupEntry {
                                binding: s.binding,
                                resource,
                            })
                            .ok_or_else(|| CommandError::UnboundSlot {
                                program: program.to_owned(),
                                stage: s.stage,
                                class: s.class,
                                slot: s.slot,
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(program),
                    layout: bgl,
                    entries: &entries,
                }))
            })
            .collect()
    }
}

impl DeviceContext<Wgpu> for WgpuContext {
    fn map_write(&mut self, buffer: &WgpuBuffer) -> Result<u64, MapError> {
        if !buffer.access.cpu_writable {
            return Err(MapError::NotWritable { label: buffer.label.to_string() });
        }
        if !self.mapped.insert(buffer.id) {
            return Err(MapError::AlreadyMapped { label: buffer.label.to_string() });
        }
        Ok(buffer.size)
    }

    fn unmap(&mut self, buffer: &WgpuBuffer, data: &[u8]) {
        if !self.mapped.remove(&buffer.id) {
            log::warn!("unmap of `{}` without a matching map", buffer.label);
            return;
        }
        if !data.is_empty() {
            self.queue.write_buffer(&buffer.raw, 0, data);
        }
    }

    fn set_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: Option<&WgpuBuffer>) {
        match buffer {
            Some(b) => self.constants.insert((stage, slot), b.clone()),
            None => self.constants.remove(&(stage, slot)),
        };
    }

    fn set_shader_resource(&mut self, stage: ShaderStage, slot: u32, view: Option<&WgpuView>) {
        match view {
            Some(v) => self.resources.insert((stage, slot), v.clone()),
            None => self.resources.remove(&(stage, slot)),
        };
    }

    fn set_unordered_access(&mut self, slot: u32, view: Option<&WgpuView>) {
        match view {
            Some(v) => self.unordered.insert(slot, v.clone()),
            None => self.unordered.remove(&slot),
        };
    }

    fn set_compute_program(&mut self, program: Option<&WgpuComputeProgram>) {
        self.compute = program.cloned();
    }

    fn dispatch(&mut self, groups: UVec3) -> Result<(), CommandError> {
        let program = self
            .compute
            .clone()
            .ok_or(CommandError::NoProgram(PipelineKind::Compute))?;
        let bind_groups = self.bind_groups(&program.label, &program.layout)?;

        let mut encoder = self.take_encoder();
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(&*program.label),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&program.pipeline);
            for (i, bg) in bind_groups.iter().enumerate() {
                cpass.set_bind_group(i as u32, bg, &[]);
            }
            cpass.dispatch_workgroups(groups.x, groups.y, groups.z);
        }
        self.encoder = Some(encoder);
        Ok(())
    }

    fn set_graphics_program(&mut self, program: Option<&WgpuGraphicsProgram>) {
        self.graphics = program.cloned();
    }

    // The vertex layout is baked into every graphics program; `stride` is only
    // meaningful to backends that bind untyped vertex streams.
    fn set_vertex_buffer(&mut self, buffer: Option<&WgpuBuffer>, _stride: u32) {
        self.vertex = buffer.cloned();
    }

    fn set_index_buffer(&mut self, buffer: Option<&WgpuBuffer>) {
        self.index = buffer.cloned();
    }

    fn set_color_output(&mut self, enabled: bool) {
        self.color_output = enabled;
    }

    fn draw_indexed(&mut self, index_count: u32) -> Result<(), CommandError> {
        let program = self
            .graphics
            .clone()
            .ok_or(CommandError::NoProgram(PipelineKind::Graphics))?;
        if program.writes_color && !self.color_output {
            return Err(CommandError::OutputMismatch { program: program.label.to_string() });
        }
        let (Some(vertex), Some(index)) = (self.vertex.clone(), self.index.clone()) else {
            return Err(CommandError::MissingGeometry);
        };
        let targets = self.targets.clone().ok_or(CommandError::NoTarget)?;
        let bind_groups = self.bind_groups(&program.label, &program.layout)?;

        let color_load = match self.clear_color {
            Some(c) if program.writes_color => wgpu::LoadOp::Clear(c),
            _ => wgpu::LoadOp::Load,
        };
        let depth_load = if self.clear_depth {
            wgpu::LoadOp::Clear(1.0)
        } else {
            wgpu::LoadOp::Load
        };

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> =
            if program.writes_color {
                vec![Some(wgpu::RenderPassColorAttachment {
                    view: &targets.color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })]
            } else {
                Vec::new()
            };

        let mut encoder = self.take_encoder();
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&*program.label),
                color_attachments: &color_attachments,
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_pipeline(&program.pipeline);
            for (i, bg) in bind_groups.iter().enumerate() {
                rpass.set_bind_group(i as u32, bg, &[]);
            }
            rpass.set_vertex_buffer(0, vertex.raw.slice(..));
            rpass.set_index_buffer(index.raw.slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(0..index_count, 0, 0..1);
        }
        self.encoder = Some(encoder);

        self.clear_depth = false;
        if program.writes_color {
            self.clear_color = None;
        }
        Ok(())
    }

    fn reset_state(&mut self) {
        self.color_output = true;
    }
}

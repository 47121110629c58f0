use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use wgpu::util::DeviceExt;

use crate::backend::{
    BufferDesc, BufferKind, DepthCompare, GpuDevice, GraphicsState, PipelineKind, RegisterClass,
    ShaderStage, SlotBinding, ViewDesc, group_count, slot_bindings, validate_buffer_desc,
    validate_view_desc,
};
use crate::device::Gpu;
use crate::error::ResourceError;
use crate::scene::ModelVertex;
use crate::shader::{CompiledShader, EntryStage};

use super::{
    ProgramLayout, Wgpu, WgpuBuffer, WgpuComputeProgram, WgpuGraphicsProgram, WgpuView,
};

/// Resource factory backed by a wgpu device.
#[derive(Debug)]
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
    limits: wgpu::Limits,
    next_id: AtomicU64,
}

impl WgpuDevice {
    pub fn new(gpu: &Gpu) -> Self {
        Self {
            device: gpu.device().clone(),
            queue: gpu.queue().clone(),
            color_format: gpu.color_format(),
            depth_format: gpu.depth_format(),
            limits: gpu.device().limits(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn check_limits(&self, desc: &BufferDesc<'_>) -> Result<(), ResourceError> {
        if desc.size > self.limits.max_buffer_size {
            return Err(ResourceError::OutOfMemory {
                label: desc.label.to_owned(),
                size: desc.size,
            });
        }
        let binding_limit = match desc.kind {
            BufferKind::Constant => Some(u64::from(self.limits.max_uniform_buffer_binding_size)),
            BufferKind::Structured { .. } => {
                Some(u64::from(self.limits.max_storage_buffer_binding_size))
            }
            BufferKind::Vertex { .. } | BufferKind::Index => None,
        };
        match binding_limit {
            Some(limit) if desc.size > limit => Err(ResourceError::InvalidDescription {
                label: desc.label.to_owned(),
                reason: format!("{} bytes exceeds the binding limit of {limit}", desc.size),
            }),
            _ => Ok(()),
        }
    }

    fn layout(&self, label: &str, kind: PipelineKind, slots: Vec<SlotBinding>) -> ProgramLayout {
        let groups = (0..group_count(kind))
            .map(|group| {
                let entries: Vec<wgpu::BindGroupLayoutEntry> = slots
                    .iter()
                    .filter(|s| s.group == group)
                    .map(|s| wgpu::BindGroupLayoutEntry {
                        binding: s.binding,
                        visibility: visibility(s.stage),
                        ty: wgpu::BindingType::Buffer {
                            ty: match s.class {
                                RegisterClass::Constant => wgpu::BufferBindingType::Uniform,
                                RegisterClass::ShaderResource => {
                                    wgpu::BufferBindingType::Storage { read_only: true }
                                }
                                RegisterClass::UnorderedAccess => {
                                    wgpu::BufferBindingType::Storage { read_only: false }
                                }
                            },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    })
                    .collect();

                self.device
                    .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some(format!("{label} bgl {group}").as_str()),
                        entries: &entries,
                    })
            })
            .collect();

        ProgramLayout { groups, slots }
    }

    fn module(&self, shader: &CompiledShader) -> wgpu::ShaderModule {
        self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(shader.label.as_str()),
            source: wgpu::ShaderSource::Wgsl(shader.source.as_str().into()),
        })
    }
}

fn visibility(stage: ShaderStage) -> wgpu::ShaderStages {
    match stage {
        ShaderStage::Vertex => wgpu::ShaderStages::VERTEX,
        ShaderStage::Pixel => wgpu::ShaderStages::FRAGMENT,
        ShaderStage::Compute => wgpu::ShaderStages::COMPUTE,
    }
}

fn compare(c: DepthCompare) -> wgpu::CompareFunction {
    match c {
        DepthCompare::Less => wgpu::CompareFunction::Less,
        DepthCompare::LessEqual => wgpu::CompareFunction::LessEqual,
        DepthCompare::Equal => wgpu::CompareFunction::Equal,
        DepthCompare::Always => wgpu::CompareFunction::Always,
    }
}

fn program_error(label: &str, reason: impl Into<String>) -> ResourceError {
    ResourceError::ProgramCreation {
        label: label.to_owned(),
        reason: reason.into(),
    }
}

fn require_stage(shader: &CompiledShader, entry: &str, stage: EntryStage) -> Result<(), ResourceError> {
    shader
        .require_entry(entry, stage)
        .map_err(|reason| program_error(&shader.label, reason))
}

impl GpuDevice<Wgpu> for WgpuDevice {
    fn create_buffer(&self, desc: &BufferDesc<'_>) -> Result<WgpuBuffer, ResourceError> {
        validate_buffer_desc(desc).map_err(|reason| ResourceError::InvalidDescription {
            label: desc.label.to_owned(),
            reason,
        })?;
        self.check_limits(desc)?;

        let mut usage = match desc.kind {
            BufferKind::Constant => wgpu::BufferUsages::UNIFORM,
            BufferKind::Structured { .. } => {
                wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC
            }
            BufferKind::Vertex { .. } => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        };
        if desc.access.cpu_writable {
            usage |= wgpu::BufferUsages::COPY_DST;
        }

        let raw = match desc.initial_data {
            Some(data) => {
                // Pad to the full size so the buffer is exactly as large as requested.
                let mut contents = data.to_vec();
                contents.resize(desc.size as usize, 0);
                self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(desc.label),
                    contents: &contents,
                    usage,
                })
            }
            None => self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(desc.label),
                size: desc.size,
                usage,
                mapped_at_creation: false,
            }),
        };

        Ok(WgpuBuffer {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            raw,
            label: Arc::from(desc.label),
            kind: desc.kind,
            access: desc.access,
            size: desc.size,
        })
    }

    fn create_view(&self, buffer: &WgpuBuffer, desc: &ViewDesc) -> Result<WgpuView, ResourceError> {
        validate_view_desc(buffer.kind, buffer.access, buffer.size, desc).map_err(|reason| {
            ResourceError::InvalidDescription {
                label: buffer.label.to_string(),
                reason,
            }
        })?;
        Ok(WgpuView {
            buffer: buffer.clone(),
            desc: *desc,
        })
    }

    fn create_compute_program(
        &self,
        shader: &CompiledShader,
        entry_point: &str,
    ) -> Result<WgpuComputeProgram, ResourceError> {
        require_stage(shader, entry_point, EntryStage::Compute)?;
        let slots = slot_bindings(PipelineKind::Compute, &shader.bindings)
            .map_err(|reason| program_error(&shader.label, reason))?;

        let layout = self.layout(&shader.label, PipelineKind::Compute, slots);
        let group_refs: Vec<&wgpu::BindGroupLayout> = layout.groups.iter().collect();
        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(shader.label.as_str()),
            bind_group_layouts: &group_refs,
            immediate_size: 0,
        });

        let module = self.module(shader);
        let pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(shader.label.as_str()),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some(entry_point),
            compilation_options: Default::default(),
            cache: None,
        });

        log::debug!("created compute program `{}`", shader.label);

        Ok(WgpuComputeProgram {
            label: Arc::from(shader.label.as_str()),
            pipeline,
            layout: Arc::new(layout),
        })
    }

    fn create_graphics_program(
        &self,
        shader: &CompiledShader,
        state: &GraphicsState<'_>,
    ) -> Result<WgpuGraphicsProgram, ResourceError> {
        require_stage(shader, state.vertex_entry, EntryStage::Vertex)?;
        if let Some(fs) = state.fragment_entry {
            require_stage(shader, fs, EntryStage::Fragment)?;
        }
        let slots = slot_bindings(PipelineKind::Graphics, &shader.bindings)
            .map_err(|reason| program_error(&shader.label, reason))?;

        let layout = self.layout(&shader.label, PipelineKind::Graphics, slots);
        let group_refs: Vec<&wgpu::BindGroupLayout> = layout.groups.iter().collect();
        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(shader.label.as_str()),
            bind_group_layouts: &group_refs,
            immediate_size: 0,
        });

        let module = self.module(shader);
        let color_targets = [Some(wgpu::ColorTargetState {
            format: self.color_format,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        })];

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(shader.label.as_str()),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some(state.vertex_entry),
                compilation_options: Default::default(),
                buffers: &[ModelVertex::layout()],
            },

            // No fragment stage: depth-only.
            fragment: state.fragment_entry.map(|fs| wgpu::FragmentState {
                module: &module,
                entry_point: Some(fs),
                compilation_options: Default::default(),
                targets: &color_targets,
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: Some(wgpu::DepthStencilState {
                format: self.depth_format,
                depth_write_enabled: state.depth_write,
                depth_compare: compare(state.depth_compare),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),

            multiview_mask: None,
            cache: None,
        });

        log::debug!("created graphics program `{}`", shader.label);

        Ok(WgpuGraphicsProgram {
            label: Arc::from(shader.label.as_str()),
            pipeline,
            layout: Arc::new(layout),
            writes_color: state.fragment_entry.is_some(),
        })
    }
}

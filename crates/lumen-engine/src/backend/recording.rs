//! In-memory backend used by component tests.
//!
//! Runs the same description checks and slot validation as the wgpu backend,
//! keeps every command as an [`Event`], tracks live handles so tests can detect
//! leaks, and can be told to fail a given allocation or map.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use glam::UVec3;

use crate::error::{CommandError, MapError, ResourceError};
use crate::shader::{CompiledShader, EntryStage};

use super::{
    Backend, BufferAccess, BufferDesc, BufferKind, DeviceContext, GpuDevice, GraphicsState,
    PipelineKind, RegisterClass, ShaderStage, SlotBinding, ViewDesc, slot_bindings,
    validate_buffer_desc, validate_view_desc,
};

#[derive(Debug)]
pub(crate) enum Recording {}

impl Backend for Recording {
    type Buffer = RecBuffer;
    type View = RecView;
    type ComputeProgram = RecProgram;
    type GraphicsProgram = RecProgram;
}

/// Decrements the device's live count when the last handle clone goes away.
#[derive(Debug)]
struct Live(Rc<Cell<usize>>);

impl Drop for Live {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecBuffer {
    id: u64,
    pub label: Rc<str>,
    pub kind: BufferKind,
    pub access: BufferAccess,
    pub size: u64,
    _live: Rc<Live>,
}

#[derive(Debug, Clone)]
pub(crate) struct RecView {
    pub label: Rc<str>,
    pub desc: ViewDesc,
    _live: Rc<Live>,
}

#[derive(Debug, Clone)]
pub(crate) struct RecProgram {
    pub label: Rc<str>,
    pub kind: PipelineKind,
    pub slots: Vec<SlotBinding>,
    pub writes_color: bool,
    _live: Rc<Live>,
}

// ── device ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct RecordingDevice {
    live: Rc<Cell<usize>>,
    creations: Cell<usize>,
    fail_on: Cell<Option<usize>>,
    labels: RefCell<Vec<String>>,
    next_id: Cell<u64>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the `n`th creation from now (1-based) fail with out-of-memory.
    pub fn fail_on_creation(&self, n: usize) {
        self.fail_on.set(Some(self.creations.get() + n));
    }

    /// Handles created by this device that are still referenced somewhere.
    pub fn live_resources(&self) -> usize {
        self.live.get()
    }

    pub fn created_labels(&self) -> Vec<String> {
        self.labels.borrow().clone()
    }

    fn admit(&self, label: &str, size: u64) -> Result<Rc<Live>, ResourceError> {
        let n = self.creations.get() + 1;
        self.creations.set(n);
        if self.fail_on.get() == Some(n) {
            self.fail_on.set(None);
            return Err(ResourceError::OutOfMemory { label: label.to_owned(), size });
        }
        self.labels.borrow_mut().push(label.to_owned());
        self.live.set(self.live.get() + 1);
        Ok(Rc::new(Live(self.live.clone())))
    }

    fn program(
        &self,
        shader: &CompiledShader,
        kind: PipelineKind,
        entries: &[(&str, EntryStage)],
        writes_color: bool,
    ) -> Result<RecProgram, ResourceError> {
        let program_error = |reason: String| ResourceError::ProgramCreation {
            label: shader.label.clone(),
            reason,
        };
        for (name, stage) in entries {
            shader.require_entry(name, *stage).map_err(program_error)?;
        }
        let slots = slot_bindings(kind, &shader.bindings).map_err(program_error)?;
        let live = self.admit(&shader.label, 0).map_err(|_| {
            program_error("injected program creation failure".to_owned())
        })?;
        Ok(RecProgram {
            label: Rc::from(shader.label.as_str()),
            kind,
            slots,
            writes_color,
            _live: live,
        })
    }
}

impl GpuDevice<Recording> for RecordingDevice {
    fn create_buffer(&self, desc: &BufferDesc<'_>) -> Result<RecBuffer, ResourceError> {
        validate_buffer_desc(desc).map_err(|reason| ResourceError::InvalidDescription {
            label: desc.label.to_owned(),
            reason,
        })?;
        let live = self.admit(desc.label, desc.size)?;
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        Ok(RecBuffer {
            id,
            label: Rc::from(desc.label),
            kind: desc.kind,
            access: desc.access,
            size: desc.size,
            _live: live,
        })
    }

    fn create_view(&self, buffer: &RecBuffer, desc: &ViewDesc) -> Result<RecView, ResourceError> {
        validate_view_desc(buffer.kind, buffer.access, buffer.size, desc).map_err(|reason| {
            ResourceError::InvalidDescription {
                label: buffer.label.to_string(),
                reason,
            }
        })?;
        let live = self.admit(&buffer.label, desc.byte_len())?;
        Ok(RecView {
            label: buffer.label.clone(),
            desc: *desc,
            _live: live,
        })
    }

    fn create_compute_program(
        &self,
        shader: &CompiledShader,
        entry_point: &str,
    ) -> Result<RecProgram, ResourceError> {
        self.program(shader, PipelineKind::Compute, &[(entry_point, EntryStage::Compute)], false)
    }

    fn create_graphics_program(
        &self,
        shader: &CompiledShader,
        state: &GraphicsState<'_>,
    ) -> Result<RecProgram, ResourceError> {
        let mut entries = vec![(state.vertex_entry, EntryStage::Vertex)];
        if let Some(fs) = state.fragment_entry {
            entries.push((fs, EntryStage::Fragment));
        }
        self.program(shader, PipelineKind::Graphics, &entries, state.fragment_entry.is_some())
    }
}

// ── context ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Map(String),
    MapFailed(String),
    Unmap { label: String, bytes: usize },
    SetConstantBuffer { stage: ShaderStage, slot: u32, buffer: Option<String> },
    SetShaderResource { stage: ShaderStage, slot: u32, view: Option<String> },
    SetUnorderedAccess { slot: u32, view: Option<String> },
    SetComputeProgram(Option<String>),
    SetGraphicsProgram(Option<String>),
    SetVertexBuffer(Option<String>),
    SetIndexBuffer(Option<String>),
    SetColorOutput(bool),
    Dispatch { program: String, groups: UVec3 },
    DrawIndexed { program: String, count: u32 },
    ResetState,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingContext {
    pub events: Vec<Event>,

    constants: HashMap<(ShaderStage, u32), RecBuffer>,
    resources: HashMap<(ShaderStage, u32), RecView>,
    unordered: HashMap<u32, RecView>,
    compute: Option<RecProgram>,
    graphics: Option<RecProgram>,
    vertex: Option<RecBuffer>,
    index: Option<RecBuffer>,
    color_output: bool,

    mapped: HashSet<u64>,
    fail_maps: HashSet<String>,
    contents: HashMap<String, Vec<u8>>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self { color_output: true, ..Self::default() }
    }

    /// Every later `map_write` of a buffer labelled `label` fails.
    pub fn fail_map_of(&mut self, label: &str) {
        self.fail_maps.insert(label.to_owned());
    }

    pub fn allow_maps(&mut self) {
        self.fail_maps.clear();
    }

    pub fn open_maps(&self) -> usize {
        self.mapped.len()
    }

    /// Bytes most recently published to the buffer labelled `label`.
    pub fn contents(&self, label: &str) -> Option<&[u8]> {
        self.contents.get(label).map(Vec::as_slice)
    }

    pub fn shader_resource(&self, stage: ShaderStage, slot: u32) -> Option<&str> {
        self.resources.get(&(stage, slot)).map(|v| &*v.label)
    }

    pub fn constant_buffer(&self, stage: ShaderStage, slot: u32) -> Option<&str> {
        self.constants.get(&(stage, slot)).map(|b| &*b.label)
    }

    pub fn color_output(&self) -> bool {
        self.color_output
    }

    pub fn dispatches(&self) -> Vec<(String, UVec3)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Dispatch { program, groups } => Some((program.clone(), *groups)),
                _ => None,
            })
            .collect()
    }

    pub fn draws(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::DrawIndexed { program, .. } => Some(program.clone()),
                _ => None,
            })
            .collect()
    }

    /// Drops every slot binding so the context no longer keeps handles alive.
    pub fn clear_bindings(&mut self) {
        self.constants.clear();
        self.resources.clear();
        self.unordered.clear();
        self.compute = None;
        self.graphics = None;
        self.vertex = None;
        self.index = None;
    }

    fn check_slots(&self, program: &RecProgram) -> Result<(), CommandError> {
        for s in &program.slots {
            let bound = match s.class {
                RegisterClass::Constant => self.constants.contains_key(&(s.stage, s.slot)),
                RegisterClass::ShaderResource => self.resources.contains_key(&(s.stage, s.slot)),
                RegisterClass::UnorderedAccess => self.unordered.contains_key(&s.slot),
            };
            if !bound {
                return Err(CommandError::UnboundSlot {
                    program: program.label.to_string(),
                    stage: s.stage,
                    class: s.class,
                    slot: s.slot,
                });
            }
        }
        Ok(())
    }
}

fn label_of<T>(item: Option<&T>, f: impl Fn(&T) -> &str) -> Option<String> {
    item.map(|i| f(i).to_owned())
}

impl DeviceContext<Recording> for RecordingContext {
    fn map_write(&mut self, buffer: &RecBuffer) -> Result<u64, MapError> {
        let label = buffer.label.to_string();
        if self.fail_maps.contains(&label) {
            self.events.push(Event::MapFailed(label.clone()));
            return Err(MapError::Lost { label });
        }
        if !buffer.access.cpu_writable {
            self.events.push(Event::MapFailed(label.clone()));
            return Err(MapError::NotWritable { label });
        }
        if !self.mapped.insert(buffer.id) {
            self.events.push(Event::MapFailed(label.clone()));
            return Err(MapError::AlreadyMapped { label });
        }
        self.events.push(Event::Map(label));
        Ok(buffer.size)
    }

    fn unmap(&mut self, buffer: &RecBuffer, data: &[u8]) {
        assert!(self.mapped.remove(&buffer.id), "unmap of `{}` without map", buffer.label);
        self.contents.insert(buffer.label.to_string(), data.to_vec());
        self.events.push(Event::Unmap {
            label: buffer.label.to_string(),
            bytes: data.len(),
        });
    }

    fn set_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: Option<&RecBuffer>) {
        self.events.push(Event::SetConstantBuffer {
            stage,
            slot,
            buffer: label_of(buffer, |b| &*b.label),
        });
        match buffer {
            Some(b) => self.constants.insert((stage, slot), b.clone()),
            None => self.constants.remove(&(stage, slot)),
        };
    }

    fn set_shader_resource(&mut self, stage: ShaderStage, slot: u32, view: Option<&RecView>) {
        self.events.push(Event::SetShaderResource {
            stage,
            slot,
            view: label_of(view, |v| &*v.label),
        });
        match view {
            Some(v) => self.resources.insert((stage, slot), v.clone()),
            None => self.resources.remove(&(stage, slot)),
        };
    }

    fn set_unordered_access(&mut self, slot: u32, view: Option<&RecView>) {
        self.events.push(Event::SetUnorderedAccess {
            slot,
            view: label_of(view, |v| &*v.label),
        });
        match view {
            Some(v) => self.unordered.insert(slot, v.clone()),
            None => self.unordered.remove(&slot),
        };
    }

    fn set_compute_program(&mut self, program: Option<&RecProgram>) {
        self.events.push(Event::SetComputeProgram(label_of(program, |p| &*p.label)));
        self.compute = program.cloned();
    }

    fn dispatch(&mut self, groups: UVec3) -> Result<(), CommandError> {
        let program = self
            .compute
            .clone()
            .ok_or(CommandError::NoProgram(PipelineKind::Compute))?;
        self.check_slots(&program)?;
        self.events.push(Event::Dispatch {
            program: program.label.to_string(),
            groups,
        });
        Ok(())
    }

    fn set_graphics_program(&mut self, program: Option<&RecProgram>) {
        self.events.push(Event::SetGraphicsProgram(label_of(program, |p| &*p.label)));
        self.graphics = program.cloned();
    }

    fn set_vertex_buffer(&mut self, buffer: Option<&RecBuffer>, _stride: u32) {
        self.events.push(Event::SetVertexBuffer(label_of(buffer, |b| &*b.label)));
        self.vertex = buffer.cloned();
    }

    fn set_index_buffer(&mut self, buffer: Option<&RecBuffer>) {
        self.events.push(Event::SetIndexBuffer(label_of(buffer, |b| &*b.label)));
        self.index = buffer.cloned();
    }

    fn set_color_output(&mut self, enabled: bool) {
        self.events.push(Event::SetColorOutput(enabled));
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
        if self.vertex.is_none() || self.index.is_none() {
            return Err(CommandError::MissingGeometry);
        }
        self.check_slots(&program)?;
        self.events.push(Event::DrawIndexed {
            program: program.label.to_string(),
            count: index_count,
        });
        Ok(())
    }

    fn reset_state(&mut self) {
        self.events.push(Event::ResetState);
        self.color_output = true;
    }
}

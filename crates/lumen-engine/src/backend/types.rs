use crate::shader::ReflectedBinding;

// ── stages & register classes ─────────────────────────────────────────────

/// Programmable stage a binding is made against.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Compute,
}

/// Kind of resource a slot holds.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RegisterClass {
    /// Uniform buffer (`var<uniform>`).
    Constant,
    /// Read-only structured buffer (`var<storage, read>`).
    ShaderResource,
    /// Read/write structured buffer (`var<storage, read_write>`), compute only.
    UnorderedAccess,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PipelineKind {
    Compute,
    Graphics,
}

/// Number of bind groups a pipeline of `kind` always declares.
pub fn group_count(kind: PipelineKind) -> u32 {
    match kind {
        PipelineKind::Compute => 3,
        PipelineKind::Graphics => 4,
    }
}

/// Stage and register class carried by bind group `group` of a `kind` pipeline.
pub fn register_space(kind: PipelineKind, group: u32) -> Option<(ShaderStage, RegisterClass)> {
    use RegisterClass::*;
    use ShaderStage::*;

    match (kind, group) {
        (PipelineKind::Compute, 0) => Some((Compute, Constant)),
        (PipelineKind::Compute, 1) => Some((Compute, ShaderResource)),
        (PipelineKind::Compute, 2) => Some((Compute, UnorderedAccess)),
        (PipelineKind::Graphics, 0) => Some((Vertex, Constant)),
        (PipelineKind::Graphics, 1) => Some((Vertex, ShaderResource)),
        (PipelineKind::Graphics, 2) => Some((Pixel, Constant)),
        (PipelineKind::Graphics, 3) => Some((Pixel, ShaderResource)),
        _ => None,
    }
}

/// A reflected shader binding resolved to the slot it reads from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SlotBinding {
    pub group: u32,
    pub binding: u32,
    pub stage: ShaderStage,
    pub class: RegisterClass,
    pub slot: u32,
}

/// Resolves reflected bindings against the register-space convention.
///
/// Fails when a binding sits in a group the pipeline kind does not have, or when
/// its address space does not match the class that group carries.
pub fn slot_bindings(
    kind: PipelineKind,
    bindings: &[ReflectedBinding],
) -> Result<Vec<SlotBinding>, String> {
    bindings
        .iter()
        .map(|b| {
            let (stage, class) = register_space(kind, b.group).ok_or_else(|| {
                format!(
                    "`{}` uses @group({}), which a {kind:?} pipeline does not have",
                    b.name, b.group
                )
            })?;
            if class != b.class {
                return Err(format!(
                    "`{}` is a {:?} binding but @group({}) of a {kind:?} pipeline carries {class:?}",
                    b.name, b.class, b.group
                ));
            }
            Ok(SlotBinding {
                group: b.group,
                binding: b.binding,
                stage,
                class,
                slot: b.binding,
            })
        })
        .collect()
}

// ── buffers ───────────────────────────────────────────────────────────────

/// What a buffer is bound as.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferKind {
    Constant,
    Structured { stride: u32 },
    Vertex { stride: u32 },
    Index,
}

/// Access flags a buffer is created with.
///
/// `cpu_writable` buffers can be mapped for writing every frame;
/// `gpu_writable` buffers can carry an unordered-access view.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct BufferAccess {
    pub cpu_writable: bool,
    pub gpu_writable: bool,
}

#[derive(Debug, Clone)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub size: u64,
    pub kind: BufferKind,
    pub access: BufferAccess,
    pub initial_data: Option<&'a [u8]>,
}

/// Backend-independent checks every implementation runs before allocating.
pub fn validate_buffer_desc(desc: &BufferDesc<'_>) -> Result<(), String> {
    if desc.size == 0 {
        return Err("buffer size is zero".into());
    }
    if let Some(data) = desc.initial_data {
        if data.len() as u64 > desc.size {
            return Err(format!(
                "initial data is {} bytes but the buffer holds {}",
                data.len(),
                desc.size
            ));
        }
    }
    match desc.kind {
        BufferKind::Structured { stride } | BufferKind::Vertex { stride } => {
            if stride == 0 {
                return Err("element stride is zero".into());
            }
            if desc.size % u64::from(stride) != 0 {
                return Err(format!("size {} is not a multiple of stride {stride}", desc.size));
            }
        }
        BufferKind::Constant | BufferKind::Index => {}
    }
    if desc.access.gpu_writable && !matches!(desc.kind, BufferKind::Structured { .. }) {
        return Err("only structured buffers can be GPU writable".into());
    }
    if !desc.access.cpu_writable && desc.initial_data.is_none() && desc.kind == BufferKind::Constant {
        return Err("constant buffer has neither CPU write access nor initial data".into());
    }
    Ok(())
}

// ── views ─────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ViewKind {
    UnorderedAccess,
    ShaderResource,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ViewDesc {
    pub kind: ViewKind,
    pub element_count: u32,
    pub stride: u32,
}

impl ViewDesc {
    #[inline]
    pub fn byte_len(&self) -> u64 {
        u64::from(self.element_count) * u64::from(self.stride)
    }
}

/// Checks a view description against the buffer it is created on.
pub fn validate_view_desc(
    kind: BufferKind,
    access: BufferAccess,
    size: u64,
    desc: &ViewDesc,
) -> Result<(), String> {
    let BufferKind::Structured { stride } = kind else {
        return Err(format!("{kind:?} buffers cannot carry views"));
    };
    if desc.stride != stride {
        return Err(format!("view stride {} does not match buffer stride {stride}", desc.stride));
    }
    if desc.element_count == 0 || desc.byte_len() > size {
        return Err(format!(
            "view covers {} elements but the buffer holds {}",
            desc.element_count,
            size / u64::from(stride)
        ));
    }
    if desc.kind == ViewKind::UnorderedAccess && !access.gpu_writable {
        return Err("unordered-access view on a buffer without GPU write access".into());
    }
    Ok(())
}

// ── graphics state ────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DepthCompare {
    Less,
    LessEqual,
    Equal,
    Always,
}

/// Fixed-function state baked into a graphics program.
///
/// A program without a fragment entry point is depth-only and renders with no
/// color attachment.
#[derive(Debug, Clone)]
pub struct GraphicsState<'a> {
    pub vertex_entry: &'a str,
    pub fragment_entry: Option<&'a str>,
    pub depth_write: bool,
    pub depth_compare: DepthCompare,
}

//! Error taxonomy shared by every GPU-facing component.
//!
//! Each concern gets its own enum so callers can tell a missing shader file from
//! an out-of-memory allocation without string matching. `RenderError` is the
//! umbrella returned by component `initialize`/`render` operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::{PipelineKind, RegisterClass, ShaderStage};
use crate::config::ConfigError;

/// A GPU buffer, view or program could not be created.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("out of device memory allocating `{label}` ({size} bytes)")]
    OutOfMemory { label: String, size: u64 },

    #[error("invalid description for `{label}`: {reason}")]
    InvalidDescription { label: String, reason: String },

    #[error("failed to create program `{label}`: {reason}")]
    ProgramCreation { label: String, reason: String },
}

/// A shader program could not be loaded or compiled.
#[derive(Debug, Error)]
pub enum ShaderError {
    /// The source path could not be opened. No diagnostics file is written.
    #[error("missing shader file {}", path.display())]
    FileMissing { path: PathBuf },

    /// Parsing, validation or reflection failed; the full diagnostic text was
    /// written to `diagnostics`.
    #[error("error compiling shader {}; check {} for message", path.display(), diagnostics.display())]
    Compile { path: PathBuf, diagnostics: PathBuf },

    #[error("failed to read shader {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A buffer could not be locked for a CPU write.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MapError {
    #[error("buffer `{label}` was not created with CPU write access")]
    NotWritable { label: String },

    #[error("write of {len} bytes at offset {offset} exceeds the mapped size of {capacity} bytes")]
    OutOfRange { offset: u64, len: u64, capacity: u64 },

    #[error("buffer `{label}` is already mapped")]
    AlreadyMapped { label: String },

    #[error("device lost while mapping `{label}`")]
    Lost { label: String },
}

/// A dispatch or draw was issued with incomplete pipeline state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("no {0:?} program bound")]
    NoProgram(PipelineKind),

    #[error("program `{program}` expects a {class:?} binding at {stage:?} slot {slot}, but the slot is empty")]
    UnboundSlot {
        program: String,
        stage: ShaderStage,
        class: RegisterClass,
        slot: u32,
    },

    #[error("draw issued without vertex and index buffers")]
    MissingGeometry,

    #[error("draw issued without frame targets")]
    NoTarget,

    #[error("program `{program}` writes color but color output is disabled")]
    OutputMismatch { program: String },
}

/// The projection matrix does not have the shape the inverse shortcut needs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("projection element {name} is {value}; a standard perspective projection has 0 there")]
    NotPerspective { name: &'static str, value: f32 },

    #[error("projection element {name} is zero; the inverse is undefined")]
    Singular { name: &'static str },
}

/// Umbrella error for component initialization and per-frame rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error(transparent)]
    Map(#[from] MapError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{component} used before initialization")]
    NotInitialized { component: &'static str },
}

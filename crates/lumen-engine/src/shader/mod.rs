//! WGSL loading, validation and binding reflection.
//!
//! Shaders are read from disk at initialization time so they can be edited
//! without rebuilding. Host constants (the tile block size) are injected as
//! module-scope `const` declarations ahead of the file contents.

mod compile;
mod reflect;

pub use compile::{CompiledShader, DEFAULT_DIAGNOSTICS_FILE, ShaderRequest, compile};
pub use reflect::{EntryPointInfo, EntryStage, ReflectedBinding};

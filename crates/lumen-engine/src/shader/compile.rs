use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use wgpu::naga;
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::error::ShaderError;

use super::reflect::{EntryPointInfo, EntryStage, ReflectedBinding, reflect};

pub const DEFAULT_DIAGNOSTICS_FILE: &str = "shader-error.txt";

/// What to compile and where to report failures.
#[derive(Debug, Clone)]
pub struct ShaderRequest<'a> {
    pub path: &'a Path,
    pub label: &'a str,
    /// Entry points that must exist in the module.
    pub entry_points: &'a [&'a str],
    /// Injected as `const NAME: u32 = VALUE;` ahead of the file contents.
    pub defines: &'a [(&'a str, u32)],
    /// Receives the full diagnostic text when compilation fails.
    pub diagnostics: &'a Path,
}

/// A validated WGSL module together with its reflected interface.
#[derive(Debug, Clone)]
pub struct CompiledShader {
    pub label: String,
    pub path: PathBuf,
    /// Final source, defines included. This is what the backend compiles.
    pub source: String,
    pub bindings: Vec<ReflectedBinding>,
    pub entry_points: Vec<EntryPointInfo>,
}

impl CompiledShader {
    pub fn entry_point(&self, name: &str) -> Option<&EntryPointInfo> {
        self.entry_points.iter().find(|ep| ep.name == name)
    }

    /// Checks that `name` exists and runs at `stage`.
    pub fn require_entry(&self, name: &str, stage: EntryStage) -> Result<(), String> {
        match self.entry_point(name) {
            Some(ep) if ep.stage == stage => Ok(()),
            Some(ep) => Err(format!("entry point `{name}` is {:?}, expected {stage:?}", ep.stage)),
            None => Err(format!("no entry point `{name}`")),
        }
    }
}

/// Reads, validates and reflects a WGSL shader.
pub fn compile(req: &ShaderRequest<'_>) -> Result<CompiledShader, ShaderError> {
    let body = match std::fs::read_to_string(req.path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::error!("missing shader file {}", req.path.display());
            return Err(ShaderError::FileMissing { path: req.path.to_path_buf() });
        }
        Err(source) => {
            return Err(ShaderError::Io { path: req.path.to_path_buf(), source });
        }
    };

    let source = with_defines(req.defines, &body);

    match check(&source, req.entry_points) {
        Ok(reflection) => {
            log::debug!(
                "compiled shader `{}` ({} bindings, {} entry points)",
                req.label,
                reflection.bindings.len(),
                reflection.entry_points.len()
            );
            Ok(CompiledShader {
                label: req.label.to_owned(),
                path: req.path.to_path_buf(),
                source,
                bindings: reflection.bindings,
                entry_points: reflection.entry_points,
            })
        }
        Err(message) => Err(report(req, &message)),
    }
}

fn with_defines(defines: &[(&str, u32)], body: &str) -> String {
    let mut out = String::with_capacity(body.len() + defines.len() * 32);
    for (name, value) in defines {
        let _ = writeln!(out, "const {name}: u32 = {value}u;");
    }
    out.push_str(body);
    out
}

fn check(source: &str, required: &[&str]) -> Result<super::reflect::Reflection, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| e.emit_to_string(source))?;

    let reflection = reflect(&module)?;

    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|name| !reflection.entry_points.iter().any(|ep| ep.name == *name))
        .collect();
    if !missing.is_empty() {
        return Err(format!("missing entry point(s): {}", missing.join(", ")));
    }

    Ok(reflection)
}

fn report(req: &ShaderRequest<'_>, message: &str) -> ShaderError {
    let text = format!("{}\n\n{message}\n", req.path.display());
    if let Err(e) = std::fs::write(req.diagnostics, text) {
        log::warn!("could not write {}: {e}", req.diagnostics.display());
    }
    log::error!(
        "error compiling shader {}; check {} for message",
        req.path.display(),
        req.diagnostics.display()
    );
    ShaderError::Compile {
        path: req.path.to_path_buf(),
        diagnostics: req.diagnostics.to_path_buf(),
    }
}

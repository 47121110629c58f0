use wgpu::naga;
use wgpu::naga::{AddressSpace, StorageAccess};

use crate::backend::RegisterClass;

/// A resource global declared by a shader module.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ReflectedBinding {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub class: RegisterClass,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum EntryStage {
    Vertex,
    Fragment,
    Compute,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct EntryPointInfo {
    pub name: String,
    pub stage: EntryStage,
    /// `[0, 0, 0]` for non-compute stages.
    pub workgroup_size: [u32; 3],
}

pub(super) struct Reflection {
    pub bindings: Vec<ReflectedBinding>,
    pub entry_points: Vec<EntryPointInfo>,
}

pub(super) fn reflect(module: &naga::Module) -> Result<Reflection, String> {
    let mut bindings = Vec::new();

    for (_, var) in module.global_variables.iter() {
        let name = var.name.clone().unwrap_or_else(|| "<unnamed>".to_owned());

        let class = match var.space {
            AddressSpace::Uniform => RegisterClass::Constant,
            AddressSpace::Storage { access } if access.contains(StorageAccess::STORE) => {
                RegisterClass::UnorderedAccess
            }
            AddressSpace::Storage { .. } => RegisterClass::ShaderResource,
            AddressSpace::Handle => {
                return Err(format!("`{name}`: textures and samplers are not supported"));
            }
            // private, workgroup and function-local variables are not resources
            _ => continue,
        };

        let Some(rb) = var.binding.as_ref() else {
            return Err(format!("`{name}` is a resource without @group/@binding"));
        };

        bindings.push(ReflectedBinding {
            name,
            group: rb.group,
            binding: rb.binding,
            class,
        });
    }

    bindings.sort_by_key(|b| (b.group, b.binding));

    let entry_points = module
        .entry_points
        .iter()
        .map(|ep| {
            let stage = match ep.stage {
                naga::ShaderStage::Vertex => EntryStage::Vertex,
                naga::ShaderStage::Fragment => EntryStage::Fragment,
                naga::ShaderStage::Compute => EntryStage::Compute,
                other => return Err(format!("entry point `{}`: unsupported stage {other:?}", ep.name)),
            };
            Ok(EntryPointInfo {
                name: ep.name.clone(),
                stage,
                workgroup_size: ep.workgroup_size,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(Reflection { bindings, entry_points })
}

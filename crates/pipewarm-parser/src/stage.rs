use ash::vk;
use pipewarm_arena::{RootArena, ShaderStageDescriptor};
use pipewarm_codec::Hash64;
use serde_json::Value;

use crate::error::ParseError;
use crate::json_util::{str_field, u32_field, unknown_fields};

const KNOWN_STAGE_FIELDS: &[&str] = &["stage", "module", "entryPoint"];

/// Parses one shader-stage entry, allocating its `entryPoint` string into
/// `arena` and leaving `module` null. The caller registers a fixup against
/// the returned hash once the stage itself has a stable address (i.e. after
/// its owning pipeline descriptor is allocated).
pub fn parse_shader_stage<'a>(
    arena: &'a RootArena,
    value: &Value,
    hash: Hash64,
    warnings: &mut Vec<String>,
) -> Result<(ShaderStageDescriptor<'a>, Hash64), ParseError> {
    if let Some(obj) = value.as_object() {
        for field in unknown_fields(obj, KNOWN_STAGE_FIELDS) {
            warnings.push(format!(
                "pipeline {hash}: ignoring unknown shader stage field `{field}`"
            ));
        }
    }

    let stage_text = str_field(value, "module")?;
    let module_hash =
        Hash64::parse_hex(stage_text).map_err(|_| ParseError::InvalidString("module"))?;
    let entry_point = str_field(value, "entryPoint")?;

    Ok((
        ShaderStageDescriptor {
            stage: vk::ShaderStageFlags::from_raw(u32_field(value, "stage")?),
            module: vk::ShaderModule::null(),
            entry_point: arena.alloc_str(entry_point),
        },
        module_hash,
    ))
}

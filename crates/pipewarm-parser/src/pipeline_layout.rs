use ash::vk;
use pipewarm_arena::{handle_array_slot_ptr, PipelineLayoutDescriptor, RootArena};
use pipewarm_model::{DependencyEdge, EntryTable, EntryTag};
use serde_json::Value;

use crate::document::{parse_envelope, ParseResult};
use crate::error::ParseError;
use crate::json_util::{array_field_or, u32_field, unknown_fields};

const KNOWN_FIELDS: &[&str] = &["flags", "setLayouts", "pushConstantRanges"];
const KNOWN_RANGE_FIELDS: &[&str] = &["stageFlags", "offset", "size"];

pub fn parse_pipeline_layout<'a>(
    arena: &'a RootArena,
    table: &EntryTable,
    bytes: &[u8],
) -> Result<ParseResult<'a, PipelineLayoutDescriptor<'a>>, ParseError> {
    let root: Value = serde_json::from_slice(bytes)?;
    let (version, hash, descriptor_json) = parse_envelope(&root, "pipelineLayouts")?;

    let mut warnings = Vec::new();
    if let Some(obj) = descriptor_json.as_object() {
        for field in unknown_fields(obj, KNOWN_FIELDS) {
            warnings.push(format!(
                "pipeline_layout {hash}: ignoring unknown field `{field}`"
            ));
        }
    }

    let mut fixups = Vec::new();
    let set_layout_hashes = array_field_or(descriptor_json, "setLayouts");
    let set_layouts: &mut [vk::DescriptorSetLayout] = arena.alloc_handle_array(set_layout_hashes.len());
    for (index, hash_value) in set_layout_hashes.iter().enumerate() {
        let text = hash_value
            .as_str()
            .ok_or(ParseError::InvalidString("setLayouts"))?;
        let dep_hash = pipewarm_codec::Hash64::parse_hex(text)
            .map_err(|_| ParseError::InvalidString("setLayouts"))?;
        if dep_hash.is_null() {
            continue;
        }
        table
            .get(EntryTag::DescriptorSetLayout, dep_hash)
            .ok_or_else(|| ParseError::NoHandle(text.to_string()))?;
        let target = unsafe { handle_array_slot_ptr(set_layouts, index) };
        fixups.push(DependencyEdge {
            dep_tag: EntryTag::DescriptorSetLayout,
            dep_hash,
            target: Some(target),
        });
    }

    let range_values = array_field_or(descriptor_json, "pushConstantRanges");
    let mut ranges = Vec::with_capacity(range_values.len());
    for range_json in range_values {
        if let Some(obj) = range_json.as_object() {
            for field in unknown_fields(obj, KNOWN_RANGE_FIELDS) {
                warnings.push(format!(
                    "pipeline_layout {hash}: ignoring unknown push-constant-range field `{field}`"
                ));
            }
        }
        ranges.push(vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::from_raw(u32_field(range_json, "stageFlags")?),
            offset: u32_field(range_json, "offset")?,
            size: u32_field(range_json, "size")?,
        });
    }

    let descriptor = arena.alloc(PipelineLayoutDescriptor {
        flags: vk::PipelineLayoutCreateFlags::from_raw(crate::json_util::u32_field_or(
            descriptor_json,
            "flags",
            0,
        )),
        set_layouts,
        push_constant_ranges: arena.alloc_slice_copy(&ranges),
    });

    Ok(ParseResult {
        version,
        hash,
        descriptor,
        fixups,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_no_set_layouts() {
        let arena = RootArena::new();
        let table = EntryTable::new();
        let json = br#"{"version":1,"pipelineLayouts":{"00000000000000aa":{}}}"#;
        let result = parse_pipeline_layout(&arena, &table, json).unwrap();
        assert!(result.descriptor.set_layouts.is_empty());
        assert!(result.fixups.is_empty());
    }
}

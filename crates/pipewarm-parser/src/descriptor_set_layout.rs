use ash::vk;
use pipewarm_arena::{handle_array_slot_ptr, DescriptorSetLayoutBindingDescriptor, DescriptorSetLayoutDescriptor, RootArena};
use pipewarm_model::{DependencyEdge, EntryTable, EntryTag};
use serde_json::Value;

use crate::document::{parse_envelope, ParseResult};
use crate::error::ParseError;
use crate::json_util::{array_field_or, dependency_hash_field, u32_field, u32_field_or, unknown_fields};

const KNOWN_FIELDS: &[&str] = &["flags", "bindings"];
const KNOWN_BINDING_FIELDS: &[&str] = &[
    "binding",
    "descriptorType",
    "descriptorCount",
    "stageFlags",
    "immutableSamplers",
];

pub fn parse_descriptor_set_layout<'a>(
    arena: &'a RootArena,
    table: &EntryTable,
    bytes: &[u8],
) -> Result<ParseResult<'a, DescriptorSetLayoutDescriptor<'a>>, ParseError> {
    let root: Value = serde_json::from_slice(bytes)?;
    let (version, hash, descriptor_json) = parse_envelope(&root, "descriptorSetLayouts")?;

    let mut warnings = Vec::new();
    if let Some(obj) = descriptor_json.as_object() {
        for field in unknown_fields(obj, KNOWN_FIELDS) {
            warnings.push(format!(
                "descriptor_set_layout {hash}: ignoring unknown field `{field}`"
            ));
        }
    }

    let mut fixups = Vec::new();
    let binding_values = array_field_or(descriptor_json, "bindings");
    let mut bindings = Vec::with_capacity(binding_values.len());
    for binding_json in binding_values {
        if let Some(obj) = binding_json.as_object() {
            for field in unknown_fields(obj, KNOWN_BINDING_FIELDS) {
                warnings.push(format!(
                    "descriptor_set_layout {hash}: ignoring unknown binding field `{field}`"
                ));
            }
        }
        let sampler_hashes = array_field_or(binding_json, "immutableSamplers");
        let samplers: &mut [vk::Sampler] = arena.alloc_handle_array(sampler_hashes.len());
        for (index, sampler_value) in sampler_hashes.iter().enumerate() {
            let text = sampler_value
                .as_str()
                .ok_or(ParseError::InvalidString("immutableSamplers"))?;
            let dep_hash = pipewarm_codec::Hash64::parse_hex(text)
                .map_err(|_| ParseError::InvalidString("immutableSamplers"))?;
            if dep_hash.is_null() {
                continue;
            }
            table
                .get(EntryTag::Sampler, dep_hash)
                .ok_or_else(|| ParseError::NoHandle(text.to_string()))?;
            let target = unsafe { handle_array_slot_ptr(samplers, index) };
            fixups.push(DependencyEdge {
                dep_tag: EntryTag::Sampler,
                dep_hash,
                target: Some(target),
            });
        }

        bindings.push(DescriptorSetLayoutBindingDescriptor {
            binding: u32_field(binding_json, "binding")?,
            descriptor_type: vk::DescriptorType::from_raw(
                u32_field(binding_json, "descriptorType")? as i32,
            ),
            descriptor_count: u32_field_or(binding_json, "descriptorCount", 0),
            stage_flags: vk::ShaderStageFlags::from_raw(u32_field(binding_json, "stageFlags")?),
            immutable_samplers: samplers,
        });
    }

    let descriptor = arena.alloc(DescriptorSetLayoutDescriptor {
        flags: vk::DescriptorSetLayoutCreateFlags::from_raw(u32_field_or(
            descriptor_json,
            "flags",
            0,
        )),
        bindings: arena.alloc_slice_from_iter(bindings),
    });

    Ok(ParseResult {
        version,
        hash,
        descriptor,
        fixups,
        warnings,
    })
}

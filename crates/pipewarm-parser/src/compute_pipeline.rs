use ash::vk;
use pipewarm_arena::{handle_slot_ptr, ComputePipelineDescriptor, RootArena};
use pipewarm_model::{DependencyEdge, EntryTable, EntryTag};
use serde_json::Value;

use crate::document::{parse_envelope, ParseResult};
use crate::error::ParseError;
use crate::json_util::{reject_base_pipeline, str_field, unknown_fields};
use crate::stage::parse_shader_stage;

const KNOWN_FIELDS: &[&str] = &["flags", "stage", "layout", "basePipelineHandle"];

pub fn parse_compute_pipeline<'a>(
    arena: &'a RootArena,
    table: &EntryTable,
    bytes: &[u8],
) -> Result<ParseResult<'a, ComputePipelineDescriptor<'a>>, ParseError> {
    let root: Value = serde_json::from_slice(bytes)?;
    let (version, hash, descriptor_json) = parse_envelope(&root, "computePipelines")?;

    let mut warnings = Vec::new();
    if let Some(obj) = descriptor_json.as_object() {
        for field in unknown_fields(obj, KNOWN_FIELDS) {
            warnings.push(format!(
                "compute_pipeline {hash}: ignoring unknown field `{field}`"
            ));
        }
    }
    reject_base_pipeline(descriptor_json)?;

    let stage_json = descriptor_json
        .get("stage")
        .ok_or(ParseError::InvalidString("stage"))?;
    let (stage, module_hash) = parse_shader_stage(arena, stage_json, hash, &mut warnings)?;

    let layout_text = str_field(descriptor_json, "layout")?;
    let layout_hash = pipewarm_codec::Hash64::parse_hex(layout_text)
        .map_err(|_| ParseError::InvalidString("layout"))?;
    table
        .get(EntryTag::PipelineLayout, layout_hash)
        .ok_or_else(|| ParseError::NoHandle(layout_text.to_string()))?;

    let mut fixups = Vec::new();
    if !module_hash.is_null() {
        table
            .get(EntryTag::ShaderModule, module_hash)
            .ok_or_else(|| ParseError::NoHandle(module_hash.to_string()))?;
    }

    let descriptor = arena.alloc(ComputePipelineDescriptor {
        flags: vk::PipelineCreateFlags::from_raw(crate::json_util::u32_field_or(
            descriptor_json,
            "flags",
            0,
        )),
        stage,
        layout: vk::PipelineLayout::null(),
    });

    if !module_hash.is_null() {
        let target = unsafe { handle_slot_ptr(&mut descriptor.stage.module) };
        fixups.push(DependencyEdge {
            dep_tag: EntryTag::ShaderModule,
            dep_hash: module_hash,
            target: Some(target),
        });
    }
    let target = unsafe { handle_slot_ptr(&mut descriptor.layout) };
    fixups.push(DependencyEdge {
        dep_tag: EntryTag::PipelineLayout,
        dep_hash: layout_hash,
        target: Some(target),
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
    use pipewarm_model::{Entry, PayloadFlag};

    fn table_with(tag: EntryTag, hash: &str) -> EntryTable {
        let mut table = EntryTable::new();
        table.put(Entry::new(
            tag,
            pipewarm_codec::Hash64::parse_hex(hash).unwrap(),
            PayloadFlag::Raw,
            0,
            0,
            0,
            0,
        ));
        table
    }

    #[test]
    fn parses_and_produces_two_fixups() {
        let arena = RootArena::new();
        let mut table = table_with(EntryTag::PipelineLayout, "00000000000000bb");
        table.put(Entry::new(
            EntryTag::ShaderModule,
            pipewarm_codec::Hash64::parse_hex("00000000000000cc").unwrap(),
            PayloadFlag::Raw,
            0,
            0,
            0,
            0,
        ));
        let json = br#"{"version":1,"computePipelines":{"00000000000000aa":{
            "stage":{"stage":32,"module":"00000000000000cc","entryPoint":"main"},
            "layout":"00000000000000bb"
        }}}"#;
        let result = parse_compute_pipeline(&arena, &table, json).unwrap();
        assert_eq!(result.fixups.len(), 2);
    }

    #[test]
    fn non_zero_base_pipeline_handle_is_rejected() {
        let arena = RootArena::new();
        let table = table_with(EntryTag::PipelineLayout, "00000000000000bb");
        let json = br#"{"version":1,"computePipelines":{"00000000000000aa":{
            "stage":{"stage":32,"module":"0000000000000000","entryPoint":"main"},
            "layout":"00000000000000bb",
            "basePipelineHandle":"00000000000000ff"
        }}}"#;
        assert!(matches!(
            parse_compute_pipeline(&arena, &table, json),
            Err(ParseError::BasePipelinesNotSupported)
        ));
    }
}

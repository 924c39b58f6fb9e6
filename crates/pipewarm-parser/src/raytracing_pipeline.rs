use ash::vk;
use pipewarm_arena::{
    handle_array_slot_ptr, handle_slot_ptr, RaytracingGroupDescriptor, RaytracingPipelineDescriptor,
    RootArena,
};
use pipewarm_codec::Hash64;
use pipewarm_model::{DependencyEdge, EntryTable, EntryTag};
use serde_json::Value;

use crate::document::{parse_envelope, ParseResult};
use crate::error::ParseError;
use crate::json_util::{array_field_or, reject_base_pipeline, str_field, u32_field_or, unknown_fields};
use crate::stage::parse_shader_stage;

const KNOWN_FIELDS: &[&str] = &[
    "flags",
    "stages",
    "groups",
    "maxPipelineRayRecursionDepth",
    "layout",
    "libraries",
    "basePipelineHandle",
];
const KNOWN_GROUP_FIELDS: &[&str] = &[
    "groupType",
    "generalShader",
    "closestHitShader",
    "anyHitShader",
    "intersectionShader",
];
const KNOWN_LIBRARY_FIELDS: &[&str] = &["pipeline", "sType"];

pub fn parse_raytracing_pipeline<'a>(
    arena: &'a RootArena,
    table: &EntryTable,
    bytes: &[u8],
) -> Result<ParseResult<'a, RaytracingPipelineDescriptor<'a>>, ParseError> {
    let root: Value = serde_json::from_slice(bytes)?;
    let (version, hash, descriptor_json) = parse_envelope(&root, "raytracingPipelines")?;

    let mut warnings = Vec::new();
    if let Some(obj) = descriptor_json.as_object() {
        for field in unknown_fields(obj, KNOWN_FIELDS) {
            warnings.push(format!(
                "raytracing_pipeline {hash}: ignoring unknown field `{field}`"
            ));
        }
    }
    reject_base_pipeline(descriptor_json)?;

    let mut stage_hashes = Vec::new();
    let mut stages_vec = Vec::new();
    for stage_json in array_field_or(descriptor_json, "stages") {
        let (stage, module_hash) = parse_shader_stage(arena, stage_json, hash, &mut warnings)?;
        if !module_hash.is_null() {
            table
                .get(EntryTag::ShaderModule, module_hash)
                .ok_or_else(|| ParseError::NoHandle(module_hash.to_string()))?;
        }
        stage_hashes.push(module_hash);
        stages_vec.push(stage);
    }

    let mut groups = Vec::new();
    for group_json in array_field_or(descriptor_json, "groups") {
        if let Some(obj) = group_json.as_object() {
            for field in unknown_fields(obj, KNOWN_GROUP_FIELDS) {
                warnings.push(format!(
                    "raytracing_pipeline {hash}: ignoring unknown group field `{field}`"
                ));
            }
        }
        groups.push(RaytracingGroupDescriptor {
            group_type: vk::RayTracingShaderGroupTypeKHR::from_raw(u32_field_or(
                group_json,
                "groupType",
                0,
            ) as i32),
            general_shader: u32_field_or(group_json, "generalShader", vk::SHADER_UNUSED_KHR),
            closest_hit_shader: u32_field_or(group_json, "closestHitShader", vk::SHADER_UNUSED_KHR),
            any_hit_shader: u32_field_or(group_json, "anyHitShader", vk::SHADER_UNUSED_KHR),
            intersection_shader: u32_field_or(
                group_json,
                "intersectionShader",
                vk::SHADER_UNUSED_KHR,
            ),
        });
    }

    let layout_text = str_field(descriptor_json, "layout")?;
    let layout_hash =
        Hash64::parse_hex(layout_text).map_err(|_| ParseError::InvalidString("layout"))?;
    table
        .get(EntryTag::PipelineLayout, layout_hash)
        .ok_or_else(|| ParseError::NoHandle(layout_text.to_string()))?;

    let library_values = array_field_or(descriptor_json, "libraries");
    let mut library_hashes = Vec::with_capacity(library_values.len());
    let mut library_tags = Vec::with_capacity(library_values.len());
    for library_json in library_values {
        if let Some(obj) = library_json.as_object() {
            for field in unknown_fields(obj, KNOWN_LIBRARY_FIELDS) {
                warnings.push(format!(
                    "raytracing_pipeline {hash}: ignoring unknown library field `{field}`"
                ));
            }
        }
        let declared_type = vk::StructureType::from_raw(
            crate::json_util::u32_field(library_json, "sType")? as i32,
        );
        if declared_type != vk::StructureType::PIPELINE_LIBRARY_CREATE_INFO_KHR {
            return Err(ParseError::InvalidSTypeForLibraries);
        }
        let text = str_field(library_json, "pipeline")?;
        let dep_hash =
            Hash64::parse_hex(text).map_err(|_| ParseError::InvalidString("pipeline"))?;
        // A library reference may name either a raytracing or a graphics
        // pipeline; whichever tag the table actually holds it under is the
        // one the fixup must carry, not a hardcoded guess.
        let dep_tag = if dep_hash.is_null() {
            EntryTag::RaytracingPipeline
        } else if table.get(EntryTag::RaytracingPipeline, dep_hash).is_some() {
            EntryTag::RaytracingPipeline
        } else if table.get(EntryTag::GraphicsPipeline, dep_hash).is_some() {
            EntryTag::GraphicsPipeline
        } else {
            return Err(ParseError::NoHandle(text.to_string()));
        };
        library_hashes.push(dep_hash);
        library_tags.push(dep_tag);
    }

    let descriptor = arena.alloc(RaytracingPipelineDescriptor {
        flags: vk::PipelineCreateFlags::from_raw(u32_field_or(descriptor_json, "flags", 0)),
        stages: arena.alloc_slice_from_iter(stages_vec),
        groups: arena.alloc_slice_copy(&groups),
        max_pipeline_ray_recursion_depth: u32_field_or(
            descriptor_json,
            "maxPipelineRayRecursionDepth",
            0,
        ),
        layout: vk::PipelineLayout::null(),
        libraries: arena.alloc_handle_array(library_hashes.len()),
    });

    let mut fixups = Vec::new();
    for (index, module_hash) in stage_hashes.iter().enumerate() {
        if module_hash.is_null() {
            continue;
        }
        let target = unsafe { handle_slot_ptr(&mut descriptor.stages[index].module) };
        fixups.push(DependencyEdge {
            dep_tag: EntryTag::ShaderModule,
            dep_hash: *module_hash,
            target: Some(target),
        });
    }
    let layout_target = unsafe { handle_slot_ptr(&mut descriptor.layout) };
    fixups.push(DependencyEdge {
        dep_tag: EntryTag::PipelineLayout,
        dep_hash: layout_hash,
        target: Some(layout_target),
    });
    for (index, (dep_hash, dep_tag)) in library_hashes.iter().zip(library_tags.iter()).enumerate() {
        if dep_hash.is_null() {
            continue;
        }
        let target = unsafe { handle_array_slot_ptr(descriptor.libraries, index) };
        fixups.push(DependencyEdge {
            dep_tag: *dep_tag,
            dep_hash: *dep_hash,
            target: Some(target),
        });
    }

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

    fn table_with_layout() -> EntryTable {
        let mut table = EntryTable::new();
        table.put(Entry::new(
            EntryTag::PipelineLayout,
            Hash64::parse_hex("00000000000000bb").unwrap(),
            PayloadFlag::Raw,
            0,
            0,
            0,
            0,
        ));
        table
    }

    #[test]
    fn parses_with_no_libraries() {
        let arena = RootArena::new();
        let table = table_with_layout();
        let json = br#"{"version":1,"raytracingPipelines":{"00000000000000aa":{
            "stages":[{"stage":256,"module":"0000000000000000","entryPoint":"main"}],
            "groups":[{"groupType":0,"generalShader":0}],
            "layout":"00000000000000bb"
        }}}"#;
        let result = parse_raytracing_pipeline(&arena, &table, json).unwrap();
        assert_eq!(result.descriptor.groups.len(), 1);
        assert!(result.descriptor.libraries.is_empty());
    }

    #[test]
    fn library_referencing_a_graphics_pipeline_carries_the_matching_tag() {
        let arena = RootArena::new();
        let mut table = table_with_layout();
        table.put(Entry::new(
            EntryTag::GraphicsPipeline,
            Hash64::parse_hex("00000000000000ee").unwrap(),
            PayloadFlag::Raw,
            0,
            0,
            0,
            0,
        ));
        let library_stype = vk::StructureType::PIPELINE_LIBRARY_CREATE_INFO_KHR.as_raw();
        let json = format!(
            r#"{{"version":1,"raytracingPipelines":{{"00000000000000aa":{{
            "stages":[],
            "layout":"00000000000000bb",
            "libraries":[{{"pipeline":"00000000000000ee","sType":{library_stype}}}]
        }}}}}}"#
        );
        let result = parse_raytracing_pipeline(&arena, &table, json.as_bytes()).unwrap();
        assert_eq!(result.fixups.len(), 2);
        let library_fixup = result
            .fixups
            .iter()
            .find(|edge| edge.dep_hash == Hash64::parse_hex("00000000000000ee").unwrap())
            .unwrap();
        assert_eq!(library_fixup.dep_tag, EntryTag::GraphicsPipeline);
    }

    #[test]
    fn wrong_library_stype_fails() {
        let arena = RootArena::new();
        let table = table_with_layout();
        let json = br#"{"version":1,"raytracingPipelines":{"00000000000000aa":{
            "stages":[],
            "layout":"00000000000000bb",
            "libraries":[{"pipeline":"0000000000000000","sType":999}]
        }}}"#;
        assert!(matches!(
            parse_raytracing_pipeline(&arena, &table, json),
            Err(ParseError::InvalidSTypeForLibraries)
        ));
    }
}

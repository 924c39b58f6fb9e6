use ash::vk;
use pipewarm_arena::{handle_array_slot_ptr, handle_slot_ptr, GraphicsPipelineDescriptor, RootArena};
use pipewarm_codec::Hash64;
use pipewarm_model::{DependencyEdge, EntryTable, EntryTag};
use serde_json::Value;

use crate::document::{parse_envelope, ParseResult};
use crate::error::ParseError;
use crate::json_util::{
    array_field_or, bool_field_or, reject_base_pipeline, str_field, u32_field, u32_field_or,
    unknown_fields,
};
use crate::stage::parse_shader_stage;

const KNOWN_FIELDS: &[&str] = &[
    "flags",
    "stages",
    "vertexBindings",
    "vertexAttributes",
    "topology",
    "primitiveRestartEnable",
    "viewportCount",
    "scissorCount",
    "polygonMode",
    "cullMode",
    "frontFace",
    "rasterizationSamples",
    "depthTestEnable",
    "depthWriteEnable",
    "depthCompareOp",
    "colorBlendAttachments",
    "dynamicStates",
    "layout",
    "renderPass",
    "subpass",
    "libraries",
    "basePipelineHandle",
];
const KNOWN_BINDING_FIELDS: &[&str] = &["binding", "stride", "inputRate"];
const KNOWN_ATTRIBUTE_FIELDS: &[&str] = &["location", "binding", "format", "offset"];
const KNOWN_BLEND_FIELDS: &[&str] = &[
    "blendEnable",
    "srcColorBlendFactor",
    "dstColorBlendFactor",
    "colorBlendOp",
    "srcAlphaBlendFactor",
    "dstAlphaBlendFactor",
    "alphaBlendOp",
    "colorWriteMask",
];
const KNOWN_LIBRARY_FIELDS: &[&str] = &["pipeline", "sType"];

pub fn parse_graphics_pipeline<'a>(
    arena: &'a RootArena,
    table: &EntryTable,
    bytes: &[u8],
) -> Result<ParseResult<'a, GraphicsPipelineDescriptor<'a>>, ParseError> {
    let root: Value = serde_json::from_slice(bytes)?;
    let (version, hash, descriptor_json) = parse_envelope(&root, "graphicsPipelines")?;

    let mut warnings = Vec::new();
    if let Some(obj) = descriptor_json.as_object() {
        for field in unknown_fields(obj, KNOWN_FIELDS) {
            warnings.push(format!(
                "graphics_pipeline {hash}: ignoring unknown field `{field}`"
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

    let mut vertex_bindings = Vec::new();
    for binding_json in array_field_or(descriptor_json, "vertexBindings") {
        if let Some(obj) = binding_json.as_object() {
            for field in unknown_fields(obj, KNOWN_BINDING_FIELDS) {
                warnings.push(format!(
                    "graphics_pipeline {hash}: ignoring unknown vertex binding field `{field}`"
                ));
            }
        }
        vertex_bindings.push(
            vk::VertexInputBindingDescription::default()
                .binding(u32_field(binding_json, "binding")?)
                .stride(u32_field(binding_json, "stride")?)
                .input_rate(vk::VertexInputRate::from_raw(u32_field_or(
                    binding_json,
                    "inputRate",
                    0,
                ) as i32)),
        );
    }

    let mut vertex_attributes = Vec::new();
    for attribute_json in array_field_or(descriptor_json, "vertexAttributes") {
        if let Some(obj) = attribute_json.as_object() {
            for field in unknown_fields(obj, KNOWN_ATTRIBUTE_FIELDS) {
                warnings.push(format!(
                    "graphics_pipeline {hash}: ignoring unknown vertex attribute field `{field}`"
                ));
            }
        }
        vertex_attributes.push(
            vk::VertexInputAttributeDescription::default()
                .location(u32_field(attribute_json, "location")?)
                .binding(u32_field(attribute_json, "binding")?)
                .format(vk::Format::from_raw(
                    u32_field(attribute_json, "format")? as i32,
                ))
                .offset(u32_field(attribute_json, "offset")?),
        );
    }

    let mut color_blend_attachments = Vec::new();
    for blend_json in array_field_or(descriptor_json, "colorBlendAttachments") {
        if let Some(obj) = blend_json.as_object() {
            for field in unknown_fields(obj, KNOWN_BLEND_FIELDS) {
                warnings.push(format!(
                    "graphics_pipeline {hash}: ignoring unknown color blend field `{field}`"
                ));
            }
        }
        color_blend_attachments.push(
            vk::PipelineColorBlendAttachmentState::default()
                .blend_enable(bool_field_or(blend_json, "blendEnable", false))
                .src_color_blend_factor(vk::BlendFactor::from_raw(u32_field_or(
                    blend_json,
                    "srcColorBlendFactor",
                    0,
                ) as i32))
                .dst_color_blend_factor(vk::BlendFactor::from_raw(u32_field_or(
                    blend_json,
                    "dstColorBlendFactor",
                    0,
                ) as i32))
                .color_blend_op(vk::BlendOp::from_raw(u32_field_or(
                    blend_json,
                    "colorBlendOp",
                    0,
                ) as i32))
                .src_alpha_blend_factor(vk::BlendFactor::from_raw(u32_field_or(
                    blend_json,
                    "srcAlphaBlendFactor",
                    0,
                ) as i32))
                .dst_alpha_blend_factor(vk::BlendFactor::from_raw(u32_field_or(
                    blend_json,
                    "dstAlphaBlendFactor",
                    0,
                ) as i32))
                .alpha_blend_op(vk::BlendOp::from_raw(u32_field_or(
                    blend_json,
                    "alphaBlendOp",
                    0,
                ) as i32))
                .color_write_mask(vk::ColorComponentFlags::from_raw(u32_field_or(
                    blend_json,
                    "colorWriteMask",
                    0xf,
                ))),
        );
    }

    let dynamic_states: Vec<vk::DynamicState> = array_field_or(descriptor_json, "dynamicStates")
        .iter()
        .map(|value| {
            value
                .as_u64()
                .map(|n| vk::DynamicState::from_raw(n as i32))
                .ok_or(ParseError::InvalidNumber("dynamicStates"))
        })
        .collect::<Result<_, _>>()?;

    let layout_text = str_field(descriptor_json, "layout")?;
    let layout_hash =
        Hash64::parse_hex(layout_text).map_err(|_| ParseError::InvalidString("layout"))?;
    table
        .get(EntryTag::PipelineLayout, layout_hash)
        .ok_or_else(|| ParseError::NoHandle(layout_text.to_string()))?;

    let render_pass_hash = match descriptor_json.get("renderPass").and_then(Value::as_str) {
        Some(text) => {
            let dep_hash =
                Hash64::parse_hex(text).map_err(|_| ParseError::InvalidString("renderPass"))?;
            if dep_hash.is_null() {
                None
            } else {
                table
                    .get(EntryTag::RenderPass, dep_hash)
                    .ok_or_else(|| ParseError::NoHandle(text.to_string()))?;
                Some(dep_hash)
            }
        }
        None => None,
    };

    let library_values = array_field_or(descriptor_json, "libraries");
    let mut library_hashes = Vec::with_capacity(library_values.len());
    for library_json in library_values {
        if let Some(obj) = library_json.as_object() {
            for field in unknown_fields(obj, KNOWN_LIBRARY_FIELDS) {
                warnings.push(format!(
                    "graphics_pipeline {hash}: ignoring unknown library field `{field}`"
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
        if !dep_hash.is_null() {
            table
                .get(EntryTag::GraphicsPipeline, dep_hash)
                .ok_or_else(|| ParseError::NoHandle(text.to_string()))?;
        }
        library_hashes.push(dep_hash);
    }

    let descriptor = arena.alloc(GraphicsPipelineDescriptor {
        flags: vk::PipelineCreateFlags::from_raw(u32_field_or(descriptor_json, "flags", 0)),
        stages: arena.alloc_slice_from_iter(stages_vec),
        vertex_bindings: arena.alloc_slice_copy(&vertex_bindings),
        vertex_attributes: arena.alloc_slice_copy(&vertex_attributes),
        topology: vk::PrimitiveTopology::from_raw(u32_field_or(descriptor_json, "topology", 0) as i32),
        primitive_restart_enable: bool_field_or(descriptor_json, "primitiveRestartEnable", false),
        viewport_count: u32_field_or(descriptor_json, "viewportCount", 1),
        scissor_count: u32_field_or(descriptor_json, "scissorCount", 1),
        polygon_mode: vk::PolygonMode::from_raw(u32_field_or(descriptor_json, "polygonMode", 0) as i32),
        cull_mode: vk::CullModeFlags::from_raw(u32_field_or(descriptor_json, "cullMode", 0)),
        front_face: vk::FrontFace::from_raw(u32_field_or(descriptor_json, "frontFace", 0) as i32),
        rasterization_samples: vk::SampleCountFlags::from_raw(u32_field_or(
            descriptor_json,
            "rasterizationSamples",
            1,
        )),
        depth_test_enable: bool_field_or(descriptor_json, "depthTestEnable", false),
        depth_write_enable: bool_field_or(descriptor_json, "depthWriteEnable", false),
        depth_compare_op: vk::CompareOp::from_raw(u32_field_or(descriptor_json, "depthCompareOp", 0) as i32),
        color_blend_attachments: arena.alloc_slice_copy(&color_blend_attachments),
        dynamic_states: arena.alloc_slice_copy(&dynamic_states),
        layout: vk::PipelineLayout::null(),
        render_pass: vk::RenderPass::null(),
        subpass: u32_field_or(descriptor_json, "subpass", 0),
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
    if let Some(dep_hash) = render_pass_hash {
        let target = unsafe { handle_slot_ptr(&mut descriptor.render_pass) };
        fixups.push(DependencyEdge {
            dep_tag: EntryTag::RenderPass,
            dep_hash,
            target: Some(target),
        });
    }
    for (index, dep_hash) in library_hashes.iter().enumerate() {
        if dep_hash.is_null() {
            continue;
        }
        let target = unsafe { handle_array_slot_ptr(descriptor.libraries, index) };
        fixups.push(DependencyEdge {
            dep_tag: EntryTag::GraphicsPipeline,
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
    use ash::vk::Handle;
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
    fn parses_minimal_pipeline_without_render_pass() {
        let arena = RootArena::new();
        let table = table_with_layout();
        let json = br#"{"version":1,"graphicsPipelines":{"00000000000000aa":{
            "stages":[{"stage":1,"module":"0000000000000000","entryPoint":"main"}],
            "layout":"00000000000000bb"
        }}}"#;
        let result = parse_graphics_pipeline(&arena, &table, json).unwrap();
        assert_eq!(result.descriptor.stages.len(), 1);
        assert_eq!(result.fixups.len(), 1);
        assert_eq!(result.descriptor.render_pass.as_raw(), 0);
    }

    #[test]
    fn missing_layout_dependency_fails() {
        let arena = RootArena::new();
        let table = EntryTable::new();
        let json = br#"{"version":1,"graphicsPipelines":{"00000000000000aa":{
            "stages":[],
            "layout":"00000000000000bb"
        }}}"#;
        assert!(matches!(
            parse_graphics_pipeline(&arena, &table, json),
            Err(ParseError::NoHandle(_))
        ));
    }

    #[test]
    fn library_reference_produces_a_dependency_edge() {
        let arena = RootArena::new();
        let mut table = table_with_layout();
        table.put(Entry::new(
            EntryTag::GraphicsPipeline,
            Hash64::parse_hex("00000000000000ff").unwrap(),
            PayloadFlag::Raw,
            0,
            0,
            0,
            0,
        ));
        let library_stype = vk::StructureType::PIPELINE_LIBRARY_CREATE_INFO_KHR.as_raw();
        let json = format!(
            r#"{{"version":1,"graphicsPipelines":{{"00000000000000aa":{{
            "stages":[],
            "layout":"00000000000000bb",
            "libraries":[{{"pipeline":"00000000000000ff","sType":{library_stype}}}]
        }}}}}}"#
        );
        let result = parse_graphics_pipeline(&arena, &table, json.as_bytes()).unwrap();
        assert_eq!(result.descriptor.libraries.len(), 1);
        let library_fixup = result
            .fixups
            .iter()
            .find(|edge| edge.dep_hash == Hash64::parse_hex("00000000000000ff").unwrap())
            .unwrap();
        assert_eq!(library_fixup.dep_tag, EntryTag::GraphicsPipeline);
    }

    #[test]
    fn wrong_library_stype_fails() {
        let arena = RootArena::new();
        let table = table_with_layout();
        let json = br#"{"version":1,"graphicsPipelines":{"00000000000000aa":{
            "stages":[],
            "layout":"00000000000000bb",
            "libraries":[{"pipeline":"0000000000000000","sType":999}]
        }}}"#;
        assert!(matches!(
            parse_graphics_pipeline(&arena, &table, json),
            Err(ParseError::InvalidSTypeForLibraries)
        ));
    }
}

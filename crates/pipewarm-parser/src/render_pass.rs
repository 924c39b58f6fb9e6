use ash::vk;
use pipewarm_arena::{RenderPassDescriptor, RootArena, SubpassDescriptor};
use serde_json::Value;

use crate::document::{parse_envelope, ParseResult};
use crate::error::ParseError;
use crate::json_util::{array_field_or, u32_field, u32_field_or, unknown_fields};

const KNOWN_FIELDS: &[&str] = &["flags", "attachments", "subpasses", "dependencies"];
const KNOWN_ATTACHMENT_FIELDS: &[&str] = &[
    "format",
    "samples",
    "loadOp",
    "storeOp",
    "stencilLoadOp",
    "stencilStoreOp",
    "initialLayout",
    "finalLayout",
];
const KNOWN_SUBPASS_FIELDS: &[&str] = &[
    "pipelineBindPoint",
    "inputAttachments",
    "colorAttachments",
    "resolveAttachments",
    "depthStencilAttachment",
    "preserveAttachments",
];
const KNOWN_DEPENDENCY_FIELDS: &[&str] = &[
    "srcSubpass",
    "dstSubpass",
    "srcStageMask",
    "dstStageMask",
    "srcAccessMask",
    "dstAccessMask",
    "dependencyFlags",
];

fn attachment_reference(value: &Value) -> Result<vk::AttachmentReference, ParseError> {
    Ok(vk::AttachmentReference::default()
        .attachment(u32_field(value, "attachment")?)
        .layout(vk::ImageLayout::from_raw(u32_field(value, "layout")? as i32)))
}

fn attachment_references(values: &[Value]) -> Result<Vec<vk::AttachmentReference>, ParseError> {
    values.iter().map(attachment_reference).collect()
}

pub fn parse_render_pass<'a>(
    arena: &'a RootArena,
    bytes: &[u8],
) -> Result<ParseResult<'a, RenderPassDescriptor<'a>>, ParseError> {
    let root: Value = serde_json::from_slice(bytes)?;
    let (version, hash, descriptor_json) = parse_envelope(&root, "renderPasses")?;

    let mut warnings = Vec::new();
    if let Some(obj) = descriptor_json.as_object() {
        for field in unknown_fields(obj, KNOWN_FIELDS) {
            warnings.push(format!(
                "render_pass {hash}: ignoring unknown field `{field}`"
            ));
        }
    }

    let mut attachments = Vec::new();
    for attachment_json in array_field_or(descriptor_json, "attachments") {
        if let Some(obj) = attachment_json.as_object() {
            for field in unknown_fields(obj, KNOWN_ATTACHMENT_FIELDS) {
                warnings.push(format!(
                    "render_pass {hash}: ignoring unknown attachment field `{field}`"
                ));
            }
        }
        attachments.push(
            vk::AttachmentDescription::default()
                .format(vk::Format::from_raw(u32_field(attachment_json, "format")? as i32))
                .samples(vk::SampleCountFlags::from_raw(u32_field_or(
                    attachment_json,
                    "samples",
                    1,
                )))
                .load_op(vk::AttachmentLoadOp::from_raw(
                    u32_field(attachment_json, "loadOp")? as i32,
                ))
                .store_op(vk::AttachmentStoreOp::from_raw(
                    u32_field(attachment_json, "storeOp")? as i32,
                ))
                .stencil_load_op(vk::AttachmentLoadOp::from_raw(u32_field_or(
                    attachment_json,
                    "stencilLoadOp",
                    0,
                ) as i32))
                .stencil_store_op(vk::AttachmentStoreOp::from_raw(u32_field_or(
                    attachment_json,
                    "stencilStoreOp",
                    0,
                ) as i32))
                .initial_layout(vk::ImageLayout::from_raw(
                    u32_field(attachment_json, "initialLayout")? as i32,
                ))
                .final_layout(vk::ImageLayout::from_raw(
                    u32_field(attachment_json, "finalLayout")? as i32,
                )),
        );
    }

    let mut subpasses = Vec::new();
    for subpass_json in array_field_or(descriptor_json, "subpasses") {
        if let Some(obj) = subpass_json.as_object() {
            for field in unknown_fields(obj, KNOWN_SUBPASS_FIELDS) {
                warnings.push(format!(
                    "render_pass {hash}: ignoring unknown subpass field `{field}`"
                ));
            }
        }
        let input = attachment_references(array_field_or(subpass_json, "inputAttachments"))?;
        let color = attachment_references(array_field_or(subpass_json, "colorAttachments"))?;
        let resolve = attachment_references(array_field_or(subpass_json, "resolveAttachments"))?;
        let depth_stencil = subpass_json
            .get("depthStencilAttachment")
            .map(attachment_reference)
            .transpose()?;
        let preserve: Vec<u32> = array_field_or(subpass_json, "preserveAttachments")
            .iter()
            .map(|value| value.as_u64().map(|n| n as u32).ok_or(ParseError::InvalidNumber("preserveAttachments")))
            .collect::<Result<_, _>>()?;

        subpasses.push(SubpassDescriptor {
            pipeline_bind_point: vk::PipelineBindPoint::from_raw(
                u32_field_or(subpass_json, "pipelineBindPoint", 0) as i32,
            ),
            input_attachments: arena.alloc_slice_copy(&input),
            color_attachments: arena.alloc_slice_copy(&color),
            resolve_attachments: arena.alloc_slice_copy(&resolve),
            depth_stencil_attachment: depth_stencil,
            preserve_attachments: arena.alloc_slice_copy(&preserve),
        });
    }

    let mut dependencies = Vec::new();
    for dependency_json in array_field_or(descriptor_json, "dependencies") {
        if let Some(obj) = dependency_json.as_object() {
            for field in unknown_fields(obj, KNOWN_DEPENDENCY_FIELDS) {
                warnings.push(format!(
                    "render_pass {hash}: ignoring unknown dependency field `{field}`"
                ));
            }
        }
        dependencies.push(
            vk::SubpassDependency::default()
                .src_subpass(u32_field_or(dependency_json, "srcSubpass", vk::SUBPASS_EXTERNAL))
                .dst_subpass(u32_field_or(dependency_json, "dstSubpass", vk::SUBPASS_EXTERNAL))
                .src_stage_mask(vk::PipelineStageFlags::from_raw(u32_field_or(
                    dependency_json,
                    "srcStageMask",
                    0,
                )))
                .dst_stage_mask(vk::PipelineStageFlags::from_raw(u32_field_or(
                    dependency_json,
                    "dstStageMask",
                    0,
                )))
                .src_access_mask(vk::AccessFlags::from_raw(u32_field_or(
                    dependency_json,
                    "srcAccessMask",
                    0,
                )))
                .dst_access_mask(vk::AccessFlags::from_raw(u32_field_or(
                    dependency_json,
                    "dstAccessMask",
                    0,
                )))
                .dependency_flags(vk::DependencyFlags::from_raw(u32_field_or(
                    dependency_json,
                    "dependencyFlags",
                    0,
                ))),
        );
    }

    let descriptor = arena.alloc(RenderPassDescriptor {
        flags: vk::RenderPassCreateFlags::from_raw(u32_field_or(descriptor_json, "flags", 0)),
        attachments: arena.alloc_slice_copy(&attachments),
        subpasses: arena.alloc_slice_from_iter(subpasses),
        dependencies: arena.alloc_slice_copy(&dependencies),
    });

    Ok(ParseResult {
        version,
        hash,
        descriptor,
        fixups: Vec::new(),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_subpass_render_pass() {
        let arena = RootArena::new();
        let json = br#"{"version":1,"renderPasses":{"00000000000000aa":{
            "attachments":[{"format":37,"loadOp":0,"storeOp":0,"initialLayout":0,"finalLayout":2}],
            "subpasses":[{"pipelineBindPoint":0,"colorAttachments":[{"attachment":0,"layout":2}]}]
        }}}"#;
        let result = parse_render_pass(&arena, json).unwrap();
        assert_eq!(result.descriptor.attachments.len(), 1);
        assert_eq!(result.descriptor.subpasses.len(), 1);
        assert_eq!(result.descriptor.subpasses[0].color_attachments.len(), 1);
    }
}

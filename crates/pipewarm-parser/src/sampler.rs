use ash::vk;
use pipewarm_arena::{RootArena, SamplerDescriptor};
use serde_json::Value;

use crate::document::{parse_envelope, ParseResult};
use crate::error::ParseError;
use crate::json_util::{bool_field_or, f32_field_or, u32_field_or, unknown_fields};

const KNOWN_FIELDS: &[&str] = &[
    "flags",
    "magFilter",
    "minFilter",
    "mipmapMode",
    "addressModeU",
    "addressModeV",
    "addressModeW",
    "mipLodBias",
    "anisotropyEnable",
    "maxAnisotropy",
    "compareEnable",
    "compareOp",
    "minLod",
    "maxLod",
    "borderColor",
    "unnormalizedCoordinates",
];

pub fn parse_sampler<'a>(
    arena: &'a RootArena,
    bytes: &[u8],
) -> Result<ParseResult<'a, SamplerDescriptor>, ParseError> {
    let root: Value = serde_json::from_slice(bytes)?;
    let (version, hash, descriptor_json) = parse_envelope(&root, "samplers")?;

    let mut warnings = Vec::new();
    if let Some(obj) = descriptor_json.as_object() {
        for field in unknown_fields(obj, KNOWN_FIELDS) {
            warnings.push(format!("sampler {hash}: ignoring unknown field `{field}`"));
        }
    }

    let descriptor = arena.alloc(SamplerDescriptor {
        flags: vk::SamplerCreateFlags::from_raw(u32_field_or(descriptor_json, "flags", 0)),
        mag_filter: vk::Filter::from_raw(u32_field_or(descriptor_json, "magFilter", 0) as i32),
        min_filter: vk::Filter::from_raw(u32_field_or(descriptor_json, "minFilter", 0) as i32),
        mipmap_mode: vk::SamplerMipmapMode::from_raw(
            u32_field_or(descriptor_json, "mipmapMode", 0) as i32,
        ),
        address_mode_u: vk::SamplerAddressMode::from_raw(
            u32_field_or(descriptor_json, "addressModeU", 0) as i32,
        ),
        address_mode_v: vk::SamplerAddressMode::from_raw(
            u32_field_or(descriptor_json, "addressModeV", 0) as i32,
        ),
        address_mode_w: vk::SamplerAddressMode::from_raw(
            u32_field_or(descriptor_json, "addressModeW", 0) as i32,
        ),
        mip_lod_bias: f32_field_or(descriptor_json, "mipLodBias", 0.0),
        anisotropy_enable: bool_field_or(descriptor_json, "anisotropyEnable", false),
        max_anisotropy: f32_field_or(descriptor_json, "maxAnisotropy", 1.0),
        compare_enable: bool_field_or(descriptor_json, "compareEnable", false),
        compare_op: vk::CompareOp::from_raw(u32_field_or(descriptor_json, "compareOp", 0) as i32),
        min_lod: f32_field_or(descriptor_json, "minLod", 0.0),
        max_lod: f32_field_or(descriptor_json, "maxLod", 0.0),
        border_color: vk::BorderColor::from_raw(
            u32_field_or(descriptor_json, "borderColor", 0) as i32,
        ),
        unnormalized_coordinates: bool_field_or(descriptor_json, "unnormalizedCoordinates", false),
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
    fn parses_minimal_sampler() {
        let arena = RootArena::new();
        let json = br#"{"version":1,"samplers":{"00000000000000aa":{"magFilter":1}}}"#;
        let result = parse_sampler(&arena, json).unwrap();
        assert_eq!(result.version, 1);
        assert_eq!(result.descriptor.mag_filter, vk::Filter::LINEAR);
        assert!(result.fixups.is_empty());
    }

    #[test]
    fn unknown_field_is_a_warning_not_an_error() {
        let arena = RootArena::new();
        let json = br#"{"version":1,"samplers":{"00000000000000aa":{"totallyUnknown":5}}}"#;
        let result = parse_sampler(&arena, json).unwrap();
        assert_eq!(result.warnings.len(), 1);
    }
}

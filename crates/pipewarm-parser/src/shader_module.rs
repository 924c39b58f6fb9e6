use ash::vk;
use pipewarm_arena::{RootArena, ShaderModuleDescriptor};
use pipewarm_codec::decode_shader_words;
use serde_json::Value;

use crate::document::{parse_envelope, ParseResult};
use crate::error::ParseError;
use crate::json_util::{u32_field, u32_field_or, unknown_fields};

const KNOWN_FIELDS: &[&str] = &["flags", "varintOffset", "varintSize", "codeSize"];
const SPIRV_ALIGNMENT: usize = 64;

/// Shader module payloads are UTF-8 JSON, then a single `0x00` byte, then
/// a varint-encoded SPIR-V word stream (spec.md §6). `bytes` is the whole
/// payload; this function locates the JSON prefix itself rather than
/// requiring the caller to split it.
pub fn parse_shader_module<'a>(
    arena: &'a RootArena,
    bytes: &[u8],
) -> Result<ParseResult<'a, ShaderModuleDescriptor<'a>>, ParseError> {
    let nul_index = bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or(ParseError::InvalidShaderPayload)?;
    let json_bytes = &bytes[..nul_index];
    let varint_region = &bytes[nul_index + 1..];

    let root: Value = serde_json::from_slice(json_bytes)?;
    let (version, hash, descriptor_json) = parse_envelope(&root, "shaderModules")?;

    let mut warnings = Vec::new();
    if let Some(obj) = descriptor_json.as_object() {
        for field in unknown_fields(obj, KNOWN_FIELDS) {
            warnings.push(format!(
                "shader_module {hash}: ignoring unknown field `{field}`"
            ));
        }
    }

    let varint_offset = u32_field(descriptor_json, "varintOffset")? as usize;
    let varint_size = u32_field(descriptor_json, "varintSize")? as usize;
    let code_size = u32_field(descriptor_json, "codeSize")? as usize;
    if code_size % 4 != 0 {
        return Err(ParseError::InvalidShaderPayload);
    }
    let word_count = code_size / 4;

    let region = varint_region
        .get(varint_offset..varint_offset + varint_size)
        .ok_or(ParseError::NoShaderCodePayload)?;
    let words = decode_shader_words(region, word_count)
        .map_err(|_| ParseError::InvalidShaderPayloadEncoding)?;

    let descriptor = arena.alloc(ShaderModuleDescriptor {
        flags: vk::ShaderModuleCreateFlags::from_raw(u32_field_or(descriptor_json, "flags", 0)),
        code: arena.alloc_aligned_u32_slice(&words, SPIRV_ALIGNMENT),
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

    fn encode_word(word: u32) -> Vec<u8> {
        let mut out = Vec::new();
        let mut value = word;
        loop {
            let mut byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            out.push(byte);
            if value == 0 {
                break;
            }
        }
        out
    }

    #[test]
    fn parses_shader_module_with_one_word() {
        let arena = RootArena::new();
        let json = br#"{"version":1,"shaderModules":{"00000000000000aa":{
            "varintOffset":0,"varintSize":2,"codeSize":4}}}"#;
        let mut payload = json.to_vec();
        payload.push(0);
        payload.extend(encode_word(300));

        let result = parse_shader_module(&arena, &payload).unwrap();
        assert_eq!(result.descriptor.code, &[300]);
        assert_eq!(
            result.descriptor.code.as_ptr() as usize % SPIRV_ALIGNMENT,
            0
        );
    }

    #[test]
    fn missing_nul_separator_fails() {
        let arena = RootArena::new();
        let json = br#"{"version":1,"shaderModules":{}}"#.to_vec();
        assert!(matches!(
            parse_shader_module(&arena, &json),
            Err(ParseError::InvalidShaderPayload)
        ));
    }

    #[test]
    fn undersized_region_is_truncated() {
        let arena = RootArena::new();
        let json = br#"{"version":1,"shaderModules":{"00000000000000aa":{
            "varintOffset":0,"varintSize":1,"codeSize":4}}}"#;
        let mut payload = json.to_vec();
        payload.push(0);
        payload.push(0x81);
        assert!(matches!(
            parse_shader_module(&arena, &payload),
            Err(ParseError::InvalidShaderPayloadEncoding)
        ));
    }
}

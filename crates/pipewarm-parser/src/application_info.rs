use pipewarm_arena::{ApplicationInfoDescriptor, RootArena};
use serde_json::Value;

use crate::document::{parse_envelope, ParseResult};
use crate::error::ParseError;
use crate::json_util::{str_field_or, u32_field_or, unknown_fields};

const KNOWN_FIELDS: &[&str] = &[
    "applicationName",
    "applicationVersion",
    "engineName",
    "engineVersion",
    "apiVersion",
];

/// `application_info` entries are never fixup targets: nothing in a
/// descriptor tree references one by hash. The engine reads the parsed
/// record directly for `engineName`/`apiVersion` during driver setup.
pub fn parse_application_info<'a>(
    arena: &'a RootArena,
    bytes: &[u8],
) -> Result<ParseResult<'a, ApplicationInfoDescriptor<'a>>, ParseError> {
    let root: Value = serde_json::from_slice(bytes)?;
    let (version, hash, descriptor_json) = parse_envelope(&root, "applicationInfo")?;

    let mut warnings = Vec::new();
    if let Some(obj) = descriptor_json.as_object() {
        for field in unknown_fields(obj, KNOWN_FIELDS) {
            warnings.push(format!(
                "application_info {hash}: ignoring unknown field `{field}`"
            ));
        }
    }

    let descriptor = arena.alloc(ApplicationInfoDescriptor {
        application_name: arena.alloc_str(str_field_or(descriptor_json, "applicationName", "")),
        application_version: u32_field_or(descriptor_json, "applicationVersion", 0),
        engine_name: arena.alloc_str(str_field_or(descriptor_json, "engineName", "")),
        engine_version: u32_field_or(descriptor_json, "engineVersion", 0),
        api_version: u32_field_or(descriptor_json, "apiVersion", 0),
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
    fn parses_engine_name() {
        let arena = RootArena::new();
        let json = br#"{"version":1,"applicationInfo":{"0000000000000001":{
            "engineName":"pipewarm-capture","apiVersion":4210688
        }}}"#;
        let result = parse_application_info(&arena, json).unwrap();
        assert_eq!(result.descriptor.engine_name, "pipewarm-capture");
        assert_eq!(result.descriptor.api_version, 4210688);
    }
}

use base64::Engine;
use pipewarm_codec::Hash64;
use pipewarm_model::{EntryTable, EntryTag};
use serde_json::{Map, Value};

use crate::error::ParseError;

pub fn object<'a>(value: &'a Value, field: &'static str) -> Result<&'a Map<String, Value>, ParseError> {
    value
        .get(field)
        .and_then(Value::as_object)
        .ok_or(ParseError::InvalidString(field))
}

pub fn u32_field(value: &Value, field: &'static str) -> Result<u32, ParseError> {
    value
        .get(field)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or(ParseError::InvalidNumber(field))
}

pub fn u32_field_or(value: &Value, field: &'static str, default: u32) -> u32 {
    value
        .get(field)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(default)
}

pub fn f32_field(value: &Value, field: &'static str) -> Result<f32, ParseError> {
    value
        .get(field)
        .and_then(Value::as_f64)
        .map(|n| n as f32)
        .ok_or(ParseError::InvalidFloat(field))
}

pub fn f32_field_or(value: &Value, field: &'static str, default: f32) -> f32 {
    value
        .get(field)
        .and_then(Value::as_f64)
        .map(|n| n as f32)
        .unwrap_or(default)
}

pub fn bool_field_or(value: &Value, field: &'static str, default: bool) -> bool {
    value.get(field).and_then(Value::as_bool).unwrap_or(default)
}

pub fn str_field<'a>(value: &'a Value, field: &'static str) -> Result<&'a str, ParseError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .ok_or(ParseError::InvalidString(field))
}

pub fn str_field_or<'a>(value: &'a Value, field: &'static str, default: &'a str) -> &'a str {
    value.get(field).and_then(Value::as_str).unwrap_or(default)
}

pub fn array_field<'a>(value: &'a Value, field: &'static str) -> Result<&'a Vec<Value>, ParseError> {
    value
        .get(field)
        .and_then(Value::as_array)
        .ok_or(ParseError::InvalidString(field))
}

pub fn array_field_or<'a>(value: &'a Value, field: &'static str) -> &'a [Value] {
    value
        .get(field)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn base64_field(value: &Value, field: &'static str) -> Result<Vec<u8>, ParseError> {
    let text = str_field(value, field)?;
    base64::engine::general_purpose::STANDARD
        .decode(text)
        .map_err(|_| ParseError::InvalidBase64(field))
}

/// Parses a 16-char hex dependency hash field. `"0000000000000000"` means
/// "no dependency"; present otherwise, it is looked up in `table` under
/// `dep_tag` and must exist (`NoHandle` otherwise, per spec.md §4.2).
pub fn dependency_hash_field(
    value: &Value,
    field: &'static str,
    dep_tag: EntryTag,
    table: &EntryTable,
) -> Result<Option<Hash64>, ParseError> {
    let text = str_field(value, field)?;
    let hash = Hash64::parse_hex(text).map_err(|_| ParseError::InvalidString(field))?;
    if hash.is_null() {
        return Ok(None);
    }
    table
        .get(dep_tag, hash)
        .ok_or_else(|| ParseError::NoHandle(text.to_string()))?;
    Ok(Some(hash))
}

/// Rejects a non-null `basePipelineHandle`. Derivative pipelines are not
/// supported (spec.md §4.2).
pub fn reject_base_pipeline(value: &Value) -> Result<(), ParseError> {
    let text = str_field_or(value, "basePipelineHandle", "0000000000000000");
    let hash =
        Hash64::parse_hex(text).map_err(|_| ParseError::InvalidString("basePipelineHandle"))?;
    if !hash.is_null() {
        return Err(ParseError::BasePipelinesNotSupported);
    }
    Ok(())
}

/// Collects the keys of `obj` not present in `known`, for the caller to
/// turn into "ignored unknown field" warnings. Unknown top-level fields
/// are tolerated everywhere (spec.md §9 resolves the source's
/// kind-dependent inconsistency in favor of uniform leniency).
pub fn unknown_fields(obj: &Map<String, Value>, known: &[&str]) -> Vec<String> {
    obj.keys()
        .filter(|key| !known.contains(&key.as_str()))
        .cloned()
        .collect()
}

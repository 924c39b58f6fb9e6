use pipewarm_codec::Hash64;
use pipewarm_model::DependencyEdge;
use serde_json::Value;

use crate::error::ParseError;

/// What every `parse_<kind>` returns: the resolved descriptor tree root
/// (allocated out of the caller's `RootArena`) plus the fixup list the
/// engine resolves against the entry table, and any unknown-field
/// warnings collected along the way.
pub struct ParseResult<'a, D> {
    pub version: u32,
    pub hash: Hash64,
    pub descriptor: &'a D,
    pub fixups: Vec<DependencyEdge>,
    pub warnings: Vec<String>,
}

/// Parses the document envelope common to every capture JSON payload:
/// `{ "version": u32, "<section>": { "<16-hex-hash>": { ... } } }`.
/// Returns the document's `version`, the single hash key, and the
/// descriptor value under it.
pub fn parse_envelope<'a>(
    root: &'a Value,
    section_name: &'static str,
) -> Result<(u32, Hash64, &'a Value), ParseError> {
    let version = crate::json_util::u32_field(root, "version")?;
    let section = crate::json_util::object(root, section_name)?;
    let (hash_str, descriptor) = section
        .iter()
        .next()
        .ok_or(ParseError::InvalidString(section_name))?;
    let hash = Hash64::parse_hex(hash_str).map_err(|_| ParseError::InvalidString(section_name))?;
    Ok((version, hash, descriptor))
}

use pipewarm_archive::Archive;
use pipewarm_model::Entry;

/// Where the parse phase reads an entry's raw payload bytes from.
///
/// The real implementation is a memory-mapped [`Archive`]; tests substitute
/// an in-memory map so they can exercise the engine without building an
/// archive file on disk.
pub trait PayloadSource: Send + Sync {
    fn fetch(&self, entry: &Entry, out: &mut Vec<u8>) -> Result<(), String>;
}

impl PayloadSource for Archive {
    fn fetch(&self, entry: &Entry, out: &mut Vec<u8>) -> Result<(), String> {
        Archive::payload(self, entry, out).map_err(|err| err.to_string())
    }
}

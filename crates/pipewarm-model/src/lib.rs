//! The persistent per-archive data model: entry tags, the replay-state
//! machine, and the entry table. This crate owns no descriptor or handle
//! *shape* — those belong to `pipewarm-arena` and `pipewarm-driver` — it
//! only owns the bookkeeping that the work engine drives.

mod entry;
mod outcome;
mod status;
mod tag;
mod table;

pub use entry::{DependencyEdge, Entry, PayloadFlag};
pub use outcome::Outcome;
pub use pipewarm_codec::Hash64;
pub use status::{EntryStatus, Status};
pub use tag::EntryTag;
pub use table::EntryTable;

//! The two-phase replay engine: walks every root's dependency DAG to parse
//! payloads into descriptors, then walks it again to issue driver create
//! calls in dependency order, cascading invalidation through a subgraph
//! when a parse or create fails partway through.

mod arena_table;
mod dispatch;
mod payload_source;
mod report;
mod worker;

pub use arena_table::ArenaTable;
pub use payload_source::PayloadSource;
pub use report::EngineReport;
pub use worker::Engine;

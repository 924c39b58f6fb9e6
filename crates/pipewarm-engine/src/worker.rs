#![allow(unsafe_code)]

use std::sync::Barrier;
use std::thread;

use crossbeam_deque::{Injector, Steal};
use pipewarm_codec::Hash64;
use pipewarm_driver::Driver;
use pipewarm_model::{Entry, EntryTable, EntryTag, Outcome, Status};
use pipewarm_progress::ProgressSink;

use crate::arena_table::ArenaTable;
use crate::dispatch;
use crate::payload_source::PayloadSource;
use crate::report::{Counters, EngineReport};

/// One stack frame in a worker's depth-first walk of a root's dependency
/// subgraph. `next_dep` is the index of the next not-yet-pushed dependency
/// in the entry's (already-published) dependency list — the single piece
/// of state that lets a worker resume a partially-walked entry without
/// re-deriving where it left off.
struct Frame {
    tag: EntryTag,
    hash: Hash64,
    next_dep: usize,
}

impl Frame {
    fn new(tag: EntryTag, hash: Hash64) -> Self {
        Self { tag, hash, next_dep: 0 }
    }
}

fn steal_root(queue: &Injector<(EntryTag, Hash64)>) -> Option<(EntryTag, Hash64)> {
    loop {
        match queue.steal() {
            Steal::Success(item) => return Some(item),
            Steal::Empty => return None,
            Steal::Retry => continue,
        }
    }
}

fn lookup<'t>(table: &'t EntryTable, tag: EntryTag, hash: Hash64) -> &'t Entry {
    table
        .get(tag, hash)
        .expect("a stack frame's (tag, hash) always names a live table entry")
}

/// Marks every frame still on `stack` (the path from the current root down
/// to whatever was just discovered invalid) as `Invalid`, releasing each
/// newly-invalidated entry's own dependencies' fan-in exactly once.
///
/// A shared entry can be reached by more than one root's stack; the
/// CAS in [`pipewarm_model::EntryStatus::try_mark_invalid_from`] makes
/// sure only the thread that actually flips an entry to `Invalid`
/// performs that entry's release, so concurrent cascades through the
/// same shared entry never double-release it.
fn invalidate_chain(
    stack: &[Frame],
    table: &EntryTable,
    driver: &dyn Driver,
    progress: &dyn ProgressSink,
    counters: &Counters,
) {
    for frame in stack.iter().rev() {
        let entry = lookup(table, frame.tag, frame.hash);
        let current = entry.status.acquire();
        if current == Status::Invalid {
            continue;
        }
        if entry.status.try_mark_invalid_from(current) {
            counters.record_invalid(frame.tag);
            progress.record(frame.tag, frame.hash, Outcome::Failed);
            if matches!(current, Status::Parsed | Status::Creating | Status::Created) {
                release_dependencies(entry, table, driver);
            }
        }
    }
}

/// Drops `entry`'s fan-in claim on each of its own dependencies. Whichever
/// caller's decrement lands the count on exactly zero is the one
/// responsible for destroying that dependency, if it was ever actually
/// created (an entry that ends up `Invalid` instead never has a handle).
/// A dependency that is itself a root (a pipeline referenced as another
/// pipeline's library) is a top-level replay target in its own right and
/// is never destroyed here even at zero fan-in.
fn release_dependencies(entry: &Entry, table: &EntryTable, driver: &dyn Driver) {
    for dep in entry.dependencies() {
        let Some(dep_entry) = table.get(dep.dep_tag, dep.dep_hash) else {
            continue;
        };
        if dep_entry.drop_dependent() == 0 && !dep.dep_tag.is_root() {
            if let Some(handle) = dep_entry.handle() {
                dispatch::destroy_entry(dep.dep_tag, handle, driver);
            }
        }
    }
}

fn parse_phase(
    table: &EntryTable,
    arenas: &ArenaTable,
    payloads: &dyn PayloadSource,
    driver: &dyn Driver,
    progress: &dyn ProgressSink,
    queue: &Injector<(EntryTag, Hash64)>,
    counters: &Counters,
) {
    let mut stack: Vec<Frame> = Vec::new();
    loop {
        if stack.is_empty() {
            match steal_root(queue) {
                Some((tag, hash)) => stack.push(Frame::new(tag, hash)),
                None => return,
            }
        }

        let top = stack.len() - 1;
        let (tag, hash) = (stack[top].tag, stack[top].hash);
        let entry = lookup(table, tag, hash);

        match entry.status.acquire() {
            Status::Invalid => {
                invalidate_chain(&stack, table, driver, progress, counters);
                stack.clear();
            }
            Status::NotParsed => match entry.status.try_begin_parsing() {
                Ok(()) => {
                    let mut bytes = Vec::new();
                    let parsed = payloads
                        .fetch(entry, &mut bytes)
                        .map_err(|_| ())
                        .and_then(|()| {
                            let arena = arenas.get_or_create(tag, hash);
                            dispatch::parse_entry(tag, &arena, table, &bytes).map_err(|_| ())
                        });
                    match parsed {
                        Ok((descriptor_ptr, fixups, _warnings)) => {
                            for dep in &fixups {
                                if let Some(dep_entry) = table.get(dep.dep_tag, dep.dep_hash) {
                                    dep_entry.bump_dependent_count();
                                }
                            }
                            entry.publish_parsed(descriptor_ptr, fixups);
                            progress.record(tag, hash, Outcome::Parsed);
                        }
                        Err(()) => {
                            invalidate_chain(&stack, table, driver, progress, counters);
                            stack.clear();
                        }
                    }
                }
                Err(_) => thread::yield_now(),
            },
            Status::Parsed => {
                let deps = entry.dependencies();
                let next_dep = stack[top].next_dep;
                if next_dep < deps.len() {
                    let dep = &deps[next_dep];
                    stack[top].next_dep += 1;
                    stack.push(Frame::new(dep.dep_tag, dep.dep_hash));
                } else {
                    stack.pop();
                }
            }
            Status::Parsing => thread::yield_now(),
            Status::Creating | Status::Created => {
                unreachable!("create-phase status observed before the parse/create barrier")
            }
        }
    }
}

fn create_phase(
    table: &EntryTable,
    arenas: &ArenaTable,
    driver: &dyn Driver,
    progress: &dyn ProgressSink,
    queue: &Injector<(EntryTag, Hash64)>,
    counters: &Counters,
) {
    let mut stack: Vec<Frame> = Vec::new();
    loop {
        if stack.is_empty() {
            match steal_root(queue) {
                Some((tag, hash)) => stack.push(Frame::new(tag, hash)),
                None => return,
            }
        }

        let top = stack.len() - 1;
        let (tag, hash) = (stack[top].tag, stack[top].hash);
        let entry = lookup(table, tag, hash);

        match entry.status.acquire() {
            Status::Invalid => {
                invalidate_chain(&stack, table, driver, progress, counters);
                stack.clear();
            }
            Status::Created => {
                stack.pop();
            }
            Status::Parsed => {
                let deps = entry.dependencies();
                let next_dep = stack[top].next_dep;
                if next_dep < deps.len() {
                    let dep = &deps[next_dep];
                    stack[top].next_dep += 1;
                    let dep_status = table.get(dep.dep_tag, dep.dep_hash).map(|e| e.status.acquire());
                    if !matches!(dep_status, Some(Status::Created) | Some(Status::Invalid) | None) {
                        stack.push(Frame::new(dep.dep_tag, dep.dep_hash));
                    }
                    continue;
                }

                let any_dep_invalid = deps.iter().any(|dep| {
                    table
                        .get(dep.dep_tag, dep.dep_hash)
                        .map(|e| e.status.acquire() == Status::Invalid)
                        .unwrap_or(true)
                });
                if any_dep_invalid {
                    invalidate_chain(&stack, table, driver, progress, counters);
                    stack.clear();
                    continue;
                }

                match entry.status.try_begin_creating() {
                    Ok(()) => {
                        let arena = arenas.get_or_create(tag, hash);
                        for dep in deps {
                            let Some(target) = dep.target else { continue };
                            let dep_entry = lookup(table, dep.dep_tag, dep.dep_hash);
                            let handle = dep_entry
                                .handle()
                                .expect("every dependency was just confirmed Created");
                            // SAFETY: `target` was produced by this same entry's
                            // parse step, into this same arena; every dependency
                            // is Created (and therefore no longer mutated) before
                            // this point, and nothing reads the target field
                            // before this entry's own create call below.
                            unsafe { arena.patch(target, handle) };
                        }
                        // SAFETY: descriptor_ptr came from this entry's own
                        // publish_parsed call for this tag, and every fixup
                        // target inside it was just patched above.
                        match unsafe { dispatch::create_entry(tag, entry.descriptor_ptr(), driver) } {
                            Ok(handle) => {
                                entry.publish_created(handle);
                                progress.record(tag, hash, Outcome::Created);
                                counters.record_created(tag);
                                release_dependencies(entry, table, driver);
                                stack.pop();
                            }
                            Err(_) => {
                                invalidate_chain(&stack, table, driver, progress, counters);
                                stack.clear();
                            }
                        }
                    }
                    Err(_) => thread::yield_now(),
                }
            }
            Status::Creating => thread::yield_now(),
            Status::NotParsed | Status::Parsing => {
                unreachable!("every entry reached Parsed or Invalid before the barrier")
            }
        }
    }
}

/// Drives the full replay of one opened archive: a parse phase and a
/// create phase, separated by a barrier, run across `thread_count` worker
/// threads (spec.md §4.4/§5/§8).
pub struct Engine<'a> {
    table: &'a EntryTable,
    payloads: &'a dyn PayloadSource,
    driver: &'a dyn Driver,
    progress: &'a dyn ProgressSink,
    thread_count: usize,
}

impl<'a> Engine<'a> {
    pub fn new(
        table: &'a EntryTable,
        payloads: &'a dyn PayloadSource,
        driver: &'a dyn Driver,
        progress: &'a dyn ProgressSink,
        thread_count: usize,
    ) -> Self {
        assert!(thread_count > 0, "engine needs at least one worker thread");
        Self { table, payloads, driver, progress, thread_count }
    }

    pub fn run(&self) -> EngineReport {
        let arenas = ArenaTable::build(self.table);
        let parse_queue = Injector::new();
        let create_queue = Injector::new();
        for entry in self.table.roots() {
            parse_queue.push((entry.tag, entry.hash));
            create_queue.push((entry.tag, entry.hash));
        }

        let barrier = Barrier::new(self.thread_count);
        let counters = Counters::default();

        thread::scope(|scope| {
            for _ in 0..self.thread_count {
                scope.spawn(|| {
                    parse_phase(
                        self.table,
                        &arenas,
                        self.payloads,
                        self.driver,
                        self.progress,
                        &parse_queue,
                        &counters,
                    );
                    barrier.wait();
                    create_phase(
                        self.table,
                        &arenas,
                        self.driver,
                        self.progress,
                        &create_queue,
                        &counters,
                    );
                });
            }
        });

        counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pipewarm_driver::{MockDriver, MockEvent};
    use pipewarm_model::{Entry, PayloadFlag};
    use pipewarm_progress::NoopProgressSink;

    use super::*;

    /// An in-memory stand-in for an opened archive: maps `(tag, hash)`
    /// straight to the payload bytes a real archive would hand back from
    /// `Archive::payload`.
    struct FixturePayloads(HashMap<(EntryTag, Hash64), Vec<u8>>);

    impl PayloadSource for FixturePayloads {
        fn fetch(&self, entry: &Entry, out: &mut Vec<u8>) -> Result<(), String> {
            match self.0.get(&(entry.tag, entry.hash)) {
                Some(bytes) => {
                    out.clear();
                    out.extend_from_slice(bytes);
                    Ok(())
                }
                None => Err(format!("no fixture payload for {:?}/{}", entry.tag, entry.hash)),
            }
        }
    }

    fn hash(text: &str) -> Hash64 {
        Hash64::parse_hex(text).unwrap()
    }

    fn put_entry(table: &mut EntryTable, tag: EntryTag, hash: Hash64) {
        table.put(Entry::new(tag, hash, PayloadFlag::Raw, 0, 0, 0, 0));
    }

    fn shader_module_payload(word: u32) -> Vec<u8> {
        let json = br#"{"version":1,"shaderModules":{"00000000000000cc":{
            "varintOffset":0,"varintSize":2,"codeSize":4}}}"#;
        let mut payload = json.to_vec();
        payload.push(0);
        let mut value = word;
        loop {
            let mut byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            payload.push(byte);
            if value == 0 {
                break;
            }
        }
        payload
    }

    /// One compute pipeline depending on one shader module and one (empty)
    /// pipeline layout, every payload well-formed.
    fn happy_path_fixture() -> (EntryTable, FixturePayloads) {
        let mut table = EntryTable::new();
        put_entry(&mut table, EntryTag::ComputePipeline, hash("00000000000000aa"));
        put_entry(&mut table, EntryTag::ShaderModule, hash("00000000000000cc"));
        put_entry(&mut table, EntryTag::PipelineLayout, hash("00000000000000bb"));

        let mut payloads = HashMap::new();
        payloads.insert(
            (EntryTag::ComputePipeline, hash("00000000000000aa")),
            br#"{"version":1,"computePipelines":{"00000000000000aa":{
                "stage":{"stage":32,"module":"00000000000000cc","entryPoint":"main"},
                "layout":"00000000000000bb"
            }}}"#
                .to_vec(),
        );
        payloads.insert(
            (EntryTag::ShaderModule, hash("00000000000000cc")),
            shader_module_payload(300),
        );
        payloads.insert(
            (EntryTag::PipelineLayout, hash("00000000000000bb")),
            br#"{"version":1,"pipelineLayouts":{"00000000000000bb":{}}}"#.to_vec(),
        );
        (table, FixturePayloads(payloads))
    }

    #[test]
    fn creates_a_pipeline_and_its_dependencies_in_order() {
        let (table, payloads) = happy_path_fixture();
        let driver = MockDriver::new();
        let progress = NoopProgressSink;
        let report = Engine::new(&table, &payloads, &driver, &progress, 1).run();

        assert_eq!(
            report,
            EngineReport {
                roots_created: 1,
                roots_invalid: 0,
                entries_created: 3,
                entries_invalid: 0,
            }
        );
        assert_eq!(
            driver.events(),
            vec![
                MockEvent::CreatedShaderModule(1),
                MockEvent::CreatedPipelineLayout(2),
                MockEvent::CreatedComputePipeline(3),
                MockEvent::DestroyedShaderModule(1),
                MockEvent::DestroyedPipelineLayout(2),
            ]
        );
        assert_eq!(
            table
                .get(EntryTag::ComputePipeline, hash("00000000000000aa"))
                .unwrap()
                .handle(),
            Some(3)
        );
    }

    #[test]
    fn malformed_dependency_payload_cascades_to_root_invalid() {
        let (table, mut payloads) = happy_path_fixture();
        // Drop the NUL separator the shader-module parser requires, so its
        // parse fails partway through the root's walk instead of at create
        // time.
        payloads
            .0
            .insert((EntryTag::ShaderModule, hash("00000000000000cc")), br#"{"version":1,"shaderModules":{}}"#.to_vec());
        let driver = MockDriver::new();
        let progress = NoopProgressSink;
        let report = Engine::new(&table, &payloads, &driver, &progress, 1).run();

        assert_eq!(
            report,
            EngineReport {
                roots_created: 0,
                roots_invalid: 1,
                entries_created: 0,
                entries_invalid: 2,
            }
        );
        assert!(driver.events().is_empty());
        assert_eq!(
            table
                .get(EntryTag::ComputePipeline, hash("00000000000000aa"))
                .unwrap()
                .status
                .acquire(),
            Status::Invalid
        );
    }

    #[test]
    fn create_failure_destroys_already_created_siblings_and_cascades() {
        let (table, payloads) = happy_path_fixture();
        let driver = MockDriver::new();
        // The pipeline layout is the second create call; handle 1 goes to
        // the shader module created just before it.
        driver.fail_next_handles(&[2]);
        let progress = NoopProgressSink;
        let report = Engine::new(&table, &payloads, &driver, &progress, 1).run();

        assert_eq!(
            report,
            EngineReport {
                roots_created: 0,
                roots_invalid: 1,
                entries_created: 1,
                entries_invalid: 2,
            }
        );
        assert_eq!(
            driver.events(),
            vec![
                MockEvent::CreatedShaderModule(1),
                MockEvent::DestroyedShaderModule(1),
            ]
        );
    }

    #[test]
    fn shared_dependency_is_created_once_and_destroyed_after_the_last_dependent() {
        let mut table = EntryTable::new();
        put_entry(&mut table, EntryTag::ComputePipeline, hash("00000000000000aa"));
        put_entry(&mut table, EntryTag::ComputePipeline, hash("00000000000000dd"));
        put_entry(&mut table, EntryTag::ShaderModule, hash("00000000000000cc"));
        put_entry(&mut table, EntryTag::ShaderModule, hash("00000000000000ee"));
        put_entry(&mut table, EntryTag::PipelineLayout, hash("00000000000000bb"));

        let mut raw = HashMap::new();
        raw.insert(
            (EntryTag::ComputePipeline, hash("00000000000000aa")),
            br#"{"version":1,"computePipelines":{"00000000000000aa":{
                "stage":{"stage":32,"module":"00000000000000cc","entryPoint":"main"},
                "layout":"00000000000000bb"
            }}}"#
                .to_vec(),
        );
        raw.insert(
            (EntryTag::ComputePipeline, hash("00000000000000dd")),
            br#"{"version":1,"computePipelines":{"00000000000000dd":{
                "stage":{"stage":32,"module":"00000000000000ee","entryPoint":"main"},
                "layout":"00000000000000bb"
            }}}"#
                .to_vec(),
        );
        raw.insert(
            (EntryTag::PipelineLayout, hash("00000000000000bb")),
            br#"{"version":1,"pipelineLayouts":{"00000000000000bb":{}}}"#.to_vec(),
        );

        let mut cc_payload = br#"{"version":1,"shaderModules":{"00000000000000cc":{
            "varintOffset":0,"varintSize":2,"codeSize":4}}}"#
            .to_vec();
        cc_payload.push(0);
        cc_payload.extend_from_slice(&[0xac, 0x02]);
        raw.insert((EntryTag::ShaderModule, hash("00000000000000cc")), cc_payload);

        let mut ee_payload = br#"{"version":1,"shaderModules":{"00000000000000ee":{
            "varintOffset":0,"varintSize":2,"codeSize":4}}}"#
            .to_vec();
        ee_payload.push(0);
        ee_payload.extend_from_slice(&[0xac, 0x02]);
        raw.insert((EntryTag::ShaderModule, hash("00000000000000ee")), ee_payload);

        let payloads = FixturePayloads(raw);
        let driver = MockDriver::new();
        let progress = NoopProgressSink;
        let report = Engine::new(&table, &payloads, &driver, &progress, 1).run();

        assert_eq!(
            report,
            EngineReport {
                roots_created: 2,
                roots_invalid: 0,
                entries_created: 5,
                entries_invalid: 0,
            }
        );
        let events = driver.events();
        // The shared pipeline layout is created once, keyed to whichever
        // pipeline reaches it first, and only destroyed after the second
        // (and final) dependent finishes with it.
        assert_eq!(
            events.iter().filter(|e| matches!(e, MockEvent::CreatedPipelineLayout(_))).count(),
            1
        );
        assert_eq!(
            events.iter().filter(|e| matches!(e, MockEvent::DestroyedPipelineLayout(_))).count(),
            1
        );
        let created_index = events
            .iter()
            .position(|e| matches!(e, MockEvent::CreatedPipelineLayout(_)))
            .unwrap();
        let destroyed_index = events
            .iter()
            .position(|e| matches!(e, MockEvent::DestroyedPipelineLayout(_)))
            .unwrap();
        assert!(destroyed_index > created_index);
        // Both pipelines' own creates must have happened before the shared
        // layout's destroy, since the layout can't hit zero fan-in until
        // the last one releases it.
        let last_pipeline_create = events
            .iter()
            .rposition(|e| matches!(e, MockEvent::CreatedComputePipeline(_)))
            .unwrap();
        assert!(destroyed_index > last_pipeline_create);
    }

    #[test]
    fn a_root_referenced_as_a_pipeline_library_survives_its_last_dependent() {
        // "aa" is a graphics pipeline that references "bb" as a pipeline
        // library. "bb" is also independently enqueued as its own root
        // (every pipeline tag is a root, regardless of in-degree), so it
        // must still be reported Created even after "aa" finishes creating
        // and drops "bb"'s dependent count to zero.
        let mut table = EntryTable::new();
        put_entry(&mut table, EntryTag::GraphicsPipeline, hash("00000000000000aa"));
        put_entry(&mut table, EntryTag::GraphicsPipeline, hash("00000000000000bb"));
        put_entry(&mut table, EntryTag::PipelineLayout, hash("00000000000000cc"));

        let library_stype = ash::vk::StructureType::PIPELINE_LIBRARY_CREATE_INFO_KHR.as_raw();
        let mut raw = HashMap::new();
        raw.insert(
            (EntryTag::GraphicsPipeline, hash("00000000000000aa")),
            format!(
                r#"{{"version":1,"graphicsPipelines":{{"00000000000000aa":{{
                "stages":[],
                "layout":"00000000000000cc",
                "libraries":[{{"pipeline":"00000000000000bb","sType":{library_stype}}}]
            }}}}}}"#
            )
            .into_bytes(),
        );
        raw.insert(
            (EntryTag::GraphicsPipeline, hash("00000000000000bb")),
            br#"{"version":1,"graphicsPipelines":{"00000000000000bb":{
                "stages":[],
                "layout":"00000000000000cc"
            }}}"#
                .to_vec(),
        );
        raw.insert(
            (EntryTag::PipelineLayout, hash("00000000000000cc")),
            br#"{"version":1,"pipelineLayouts":{"00000000000000cc":{}}}"#.to_vec(),
        );

        let payloads = FixturePayloads(raw);
        let driver = MockDriver::new();
        let progress = NoopProgressSink;
        let report = Engine::new(&table, &payloads, &driver, &progress, 1).run();

        assert_eq!(
            report,
            EngineReport {
                roots_created: 2,
                roots_invalid: 0,
                entries_created: 3,
                entries_invalid: 0,
            }
        );
        assert!(driver
            .events()
            .iter()
            .all(|e| !matches!(e, MockEvent::DestroyedGraphicsPipeline(_))));
        assert_eq!(
            table
                .get(EntryTag::GraphicsPipeline, hash("00000000000000bb"))
                .unwrap()
                .status
                .acquire(),
            Status::Created
        );
        assert!(table
            .get(EntryTag::GraphicsPipeline, hash("00000000000000bb"))
            .unwrap()
            .handle()
            .is_some());
    }
}

//! Wires the configuration, archive, driver, engine, and logging crates
//! together into one replay run. Kept separate from `main.rs` so the
//! wiring itself is unit-testable against a [`pipewarm_driver::MockDriver`]
//! without touching a real Vulkan loader.

use pipewarm_archive::{Archive, ArchiveError};
use pipewarm_arena::RootArena;
use pipewarm_config::{ConfigError, ReplayConfig};
use pipewarm_driver::{Driver, DriverError};
use pipewarm_engine::{Engine, EngineReport};
use pipewarm_filter::{ChainEntry, ChainEntryKind, FeatureChain, Features10};
use pipewarm_log::{LogEmitter, LogLevel, RunSummary};
use pipewarm_model::EntryTag;
use pipewarm_progress::{NoopProgressSink, ProgressSink, SharedMemoryProgressSink};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("loading configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("opening archive: {0}")]
    Archive(#[from] ArchiveError),
    #[error("reading application_info: {0}")]
    ApplicationInfo(#[from] pipewarm_parser::ParseError),
    #[error("driver setup failed: {0}")]
    Driver(#[from] DriverError),
    #[error("opening progress file: {0}")]
    Progress(#[source] std::io::Error),
    #[error("opening log output: {0}")]
    Log(#[source] std::io::Error),
}

/// A replay run that completed setup, whatever the engine's internal tally
/// of created vs. invalid entries turned out to be. Invalid roots are not
/// a [`CliError`] — per spec, only setup failures are fatal.
pub struct RunOutcome {
    pub report: EngineReport,
}

/// Requests every known chain-entry type with every bit set, and the
/// core-1.0 `robust_buffer_access` bit on. Pipewarm replays capture data
/// for an application it does not otherwise know the original feature
/// request of, so it asks for everything the driver supports and lets
/// [`pipewarm_filter::filter_features`] mask it down to what's actually
/// available, rather than risk rejecting an extension the original
/// capture relied on.
fn maximal_feature_request() -> FeatureChain {
    FeatureChain {
        core: Features10 { robust_buffer_access: true },
        entries: ChainEntryKind::ALL
            .into_iter()
            .map(|kind| match kind {
                ChainEntryKind::FragmentShadingRate => {
                    ChainEntry::FragmentShadingRate(pipewarm_filter::FragmentShadingRateBits {
                        pipeline_fragment_shading_rate: true,
                        primitive_fragment_shading_rate: true,
                        attachment_fragment_shading_rate: true,
                    })
                }
                ChainEntryKind::ShadingRateImage => {
                    ChainEntry::ShadingRateImage(pipewarm_filter::ShadingRateImageBits {
                        shading_rate_image: true,
                        shading_rate_coarse_sample_order: true,
                    })
                }
                ChainEntryKind::FragmentDensityMap => {
                    ChainEntry::FragmentDensityMap(pipewarm_filter::FragmentDensityMapBits {
                        fragment_density_map: true,
                    })
                }
                ChainEntryKind::Robustness2 => {
                    ChainEntry::Robustness2(pipewarm_filter::Robustness2Bits {
                        robust_buffer_access2: true,
                        robust_image_access2: true,
                        null_descriptor: true,
                    })
                }
            })
            .collect(),
    }
}

/// Reads the archive's single `application_info` entry, if present, for
/// the engine name `device_create` needs to apply per-launcher filter
/// workarounds. Archives captured without one (spec.md allows it to be
/// absent) fall back to an empty engine name, which simply disables those
/// workarounds.
fn read_engine_name(archive: &Archive) -> Result<String, CliError> {
    let Some(entry) = archive.table().values(EntryTag::ApplicationInfo).next() else {
        return Ok(String::new());
    };
    let mut bytes = Vec::new();
    archive.payload(entry, &mut bytes)?;
    let arena = RootArena::new();
    let result = pipewarm_parser::parse_application_info(&arena, &bytes)?;
    Ok(result.descriptor.engine_name.to_string())
}

fn build_progress_sink(config: &ReplayConfig) -> Result<Box<dyn ProgressSink>, CliError> {
    match &config.progress_file {
        Some(path) => {
            let sink = SharedMemoryProgressSink::create(path, 4096).map_err(CliError::Progress)?;
            Ok(Box::new(sink))
        }
        None => Ok(Box::new(NoopProgressSink)),
    }
}

/// Runs a full replay against a real Vulkan driver: opens the archive,
/// brings up the driver through its setup sequence, then drives the work
/// engine to completion.
pub fn run(config: ReplayConfig) -> Result<RunOutcome, CliError> {
    let archive = Archive::open(&config.archive)?;
    let engine_name = read_engine_name(&archive)?;

    // SAFETY: this is the only Vulkan entry point reached before
    // `instance_create`, as `AshDriver::new` requires.
    let driver = unsafe { pipewarm_driver::AshDriver::new() }?;
    driver.instance_create(config.enable_validation)?;
    driver.debug_sink_init(config.enable_validation)?;
    driver.pick_physical_device(config.device_index)?;
    driver.device_create(&maximal_feature_request(), &engine_name)?;
    driver.pipeline_cache_init(config.on_disk_pipeline_cache.as_deref())?;

    let progress = build_progress_sink(&config)?;
    let report = run_with_driver(&archive, &driver, progress.as_ref(), config.num_threads);
    driver.pipeline_cache_save(config.on_disk_pipeline_cache.as_deref())?;
    Ok(RunOutcome { report })
}

/// The part of [`run`] that only needs a [`Driver`] and [`ProgressSink`]
/// trait object, split out so tests can substitute a
/// [`pipewarm_driver::MockDriver`] without a Vulkan loader.
pub fn run_with_driver(
    archive: &Archive,
    driver: &dyn Driver,
    progress: &dyn ProgressSink,
    num_threads: usize,
) -> EngineReport {
    Engine::new(archive.table(), archive, driver, progress, num_threads).run()
}

/// Emits the run's final tallies as one structured JSONL summary line.
pub fn log_summary(emitter: &mut LogEmitter, report: EngineReport) -> std::io::Result<()> {
    emitter.emit_summary(RunSummary {
        roots_created: report.roots_created,
        roots_invalid: report.roots_invalid,
        entries_created: report.entries_created,
        entries_invalid: report.entries_invalid,
    })
}

pub fn new_log_emitter(run_id: impl Into<String>) -> Result<LogEmitter, CliError> {
    LogEmitter::from_env(run_id).map_err(CliError::Log)
}

pub fn log_level_from_str(level: &str) -> LogLevel {
    match level {
        "debug" => LogLevel::Debug,
        "warn" => LogLevel::Warn,
        "error" => LogLevel::Error,
        _ => LogLevel::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipewarm_driver::{MockDriver, MockEvent};

    #[test]
    fn run_with_driver_replays_a_root_with_one_dependency() {
        let mut builder = pipewarm_fixture::ArchiveBuilder::new();
        let pipeline_hash = pipewarm_model::Hash64::parse_hex("00000000000000aa").unwrap();
        let layout_hash = pipewarm_model::Hash64::parse_hex("00000000000000bb").unwrap();
        builder.add_raw(
            EntryTag::ComputePipeline,
            pipeline_hash,
            br#"{"version":1,"computePipelines":{"00000000000000aa":{
                "stage":{"stage":32,"module":"0000000000000000","entryPoint":"main"},
                "layout":"00000000000000bb"
            }}}"#,
        );
        builder.add_raw(
            EntryTag::PipelineLayout,
            layout_hash,
            br#"{"version":1,"pipelineLayouts":{"00000000000000bb":{}}}"#,
        );
        let (_dir, archive) = builder.open();

        let driver = MockDriver::new();
        let progress = NoopProgressSink;
        let report = run_with_driver(&archive, &driver, &progress, 1);

        assert_eq!(report.roots_created, 1);
        assert_eq!(report.roots_invalid, 0);
        assert_eq!(
            driver.events(),
            vec![MockEvent::CreatedPipelineLayout(1), MockEvent::CreatedComputePipeline(2), MockEvent::DestroyedPipelineLayout(1)]
        );
    }

    #[test]
    fn maximal_feature_request_enables_every_known_chain_entry() {
        let requested = maximal_feature_request();
        assert!(requested.core.robust_buffer_access);
        assert_eq!(requested.entries.len(), ChainEntryKind::ALL.len());
        for kind in ChainEntryKind::ALL {
            assert!(requested.find(kind).unwrap().any_bit_set());
        }
    }
}

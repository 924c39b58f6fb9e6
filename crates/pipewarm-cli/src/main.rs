//! `pipewarm <archive> [flags]`: pre-warms a Vulkan driver's pipeline
//! cache by replaying a capture archive's pipelines against a real
//! driver, then exits 0 whether or not every pipeline replayed cleanly —
//! only a setup failure (bad archive, no suitable device, ...) is fatal.

use std::process::ExitCode;

use clap::Parser;
use pipewarm_config::{Cli, ReplayConfig};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match ReplayConfig::from_cli(cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("pipewarm: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut emitter = match pipewarm_cli::new_log_emitter("run") {
        Ok(emitter) => emitter,
        Err(err) => {
            eprintln!("pipewarm: {err}");
            return ExitCode::FAILURE;
        }
    };

    let start_level = pipewarm_cli::log_level_from_str(&config.log_level);
    let _ = emitter.emit(start_level, "run_start");

    let outcome = match pipewarm_cli::run(config) {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("pipewarm: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = pipewarm_cli::log_summary(&mut emitter, outcome.report) {
        eprintln!("pipewarm: failed to write summary log: {err}");
        return ExitCode::FAILURE;
    }
    let _ = emitter.flush();

    ExitCode::SUCCESS
}

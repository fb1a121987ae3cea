//! dmgee - Visual layout and build orchestration for macOS disk image installers
//!
//! Main entry point for the command line front end.
//!
//! # Overview
//!
//! This binary initializes:
//! - Application settings ([`ConfigManager`], `dmgee Settings.yaml` + `DMGEE__*` env)
//! - Logging infrastructure (daily rotating file, console in debug mode)
//! - Tokio async runtime (for the build engine subprocess and progress relay)
//! - The [`CliController`] which runs the requested command
//!
//! # Execution Flow
//!
//! 1. Parse the command line
//! 2. Load settings from the config directory
//! 3. Initialize logging → `<config dir>/logs/dmgee.<date>`
//! 4. Create tokio runtime with 2 worker threads
//! 5. Run the command (builds block until the engine exits)
//! 6. Log metrics and shut the runtime down with a 5s timeout

use anyhow::{Context, Result};
use clap::Parser;
use dmgee::services::ProcessEngine;
use dmgee::ui::{Cli, CliController};
use dmgee::{APP_NAME, ConfigManager, Metrics, VERSION};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = match cli.config_dir.clone() {
        Some(dir) => dir,
        None => ConfigManager::default_dir()?,
    };
    let config_manager = ConfigManager::new(&config_dir)?;
    let settings = config_manager.load_settings()?;

    let debug_mode = cli.debug || settings.debug_mode;
    let log_dir = dmgee::logging::resolve_log_dir(&settings, config_manager.config_dir());
    let _guard = dmgee::logging::setup_logging_with_console(
        log_dir.as_str(),
        dmgee::logging::LOG_PREFIX,
        debug_mode,
        debug_mode,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("dmgee-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    tracing::info!("Tokio runtime initialized with {} worker threads", 2);

    let metrics = Arc::new(Metrics::new());
    let engine = Arc::new(ProcessEngine::new(&settings.engine));
    tracing::info!("Build engine: {}", engine.program());

    let controller = CliController::new(
        config_manager,
        settings,
        engine,
        Arc::clone(&metrics),
        runtime.handle().clone(),
    );

    let result = {
        let mut stdout = std::io::stdout().lock();
        controller.run(cli.command, &mut stdout)
    };

    if let Err(e) = &result {
        tracing::error!("Command failed: {:#}", e);
    }

    metrics.log_summary();
    runtime.shutdown_timeout(Duration::from_secs(5));

    tracing::info!("Shutdown complete");
    result
}

//! Topo CLI entrypoint.
//!
//! This is the main entrypoint for the topo command-line tool.

use std::path::Path;
use std::process::ExitCode;

use topo::cli::{Cli, Commands, OutputFormatter};
use topo::config::{load_dotenv, manifest_dir, RunConfig};
use topo::error::Result;
use topo::executor::FailurePolicy;
use topo::manifest::{FileManifestStore, ManifestStore, ManifestValidator};
use topo::planner::ProvisionPlan;
use topo::reconciler::Reconciler;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_json);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over the verbosity flag when set.
fn init_logging(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point.
///
/// Returns whether the command succeeded.
async fn run(cli: Cli) -> Result<bool> {
    let formatter = OutputFormatter::new(cli.output);

    // Load .env next to the manifest before resolving settings
    load_dotenv(manifest_dir(cli.command.manifest()))?;

    match &cli.command {
        Commands::Run {
            manifest,
            update,
            on_failure,
            ..
        } => {
            let config = RunConfig::resolve(manifest, cli.command.overrides())?
                .with_refresh_template(*update)
                .with_failure_policy(*on_failure);
            cmd_run(&config, &formatter).await
        }
        Commands::Plan { manifest } => cmd_plan(manifest, &formatter).await,
        Commands::Validate { manifest } => cmd_validate(manifest, &formatter).await,
        Commands::Unlock { manifest } => cmd_unlock(manifest, &formatter).await,
    }
}

/// Execute a provisioning run.
async fn cmd_run(config: &RunConfig, formatter: &OutputFormatter) -> Result<bool> {
    info!("Running manifest: {}", config.manifest_path.display());
    debug!("Run configuration: {config:?}");

    let store = config.store();
    let workspace = config.workspace();

    let report = Reconciler::new(&store, &workspace, config.tool())
        .with_policy(config.failure_policy)
        .with_holder(&config.lock_holder)
        .run()
        .await?;

    eprintln!("{}", formatter.format_report(&report));

    if config.failure_policy == FailurePolicy::Hold && !report.success {
        warn!("{} provision(s) held back after failure", report.held.len());
    }

    Ok(report.success)
}

/// Show what a run would do.
async fn cmd_plan(manifest: &Path, formatter: &OutputFormatter) -> Result<bool> {
    let store = FileManifestStore::new(manifest);
    let loaded = store.load().await?;
    ManifestValidator::new().validate(&loaded).into_result()?;

    let plan = ProvisionPlan::from_manifest(&loaded);
    eprintln!("{}", formatter.format_plan(&plan));

    Ok(true)
}

/// Validate a manifest.
async fn cmd_validate(manifest: &Path, formatter: &OutputFormatter) -> Result<bool> {
    info!("Validating manifest: {}", manifest.display());

    let store = FileManifestStore::new(manifest);
    let loaded = store.load().await?;
    let result = ManifestValidator::new().validate(&loaded);

    eprintln!("{}", formatter.format_validation(&loaded, &result));

    Ok(result.is_valid())
}

/// Remove a stale manifest lock.
async fn cmd_unlock(manifest: &Path, formatter: &OutputFormatter) -> Result<bool> {
    let store = FileManifestStore::new(manifest);
    let removed = store.force_unlock().await?;

    if let Some(lock) = &removed {
        warn!("Force-removed lock held by {}", lock.holder);
    }
    eprintln!("{}", formatter.format_unlock(removed.as_ref()));

    Ok(true)
}

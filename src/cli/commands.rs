//! Command implementations for the CLI

use crate::{
    cli::Command,
    config::Config,
    core::{resolve_targets, run_package, run_publish},
    utils::process::ProcessRunner,
};
use anyhow::Context;
use tracing::{info, instrument};

/// Execute the appropriate command based on CLI arguments
#[instrument(skip(config))]
pub fn execute_command(config: &Config, command: &Command) -> anyhow::Result<()> {
    match command {
        Command::Package { .. } => execute_package_command(config),
        Command::Publish { .. } => execute_publish_command(config),
        Command::Targets => execute_targets_command(config),
    }
}

/// Execute the package command
#[instrument(skip(config))]
fn execute_package_command(config: &Config) -> anyhow::Result<()> {
    let runner = ProcessRunner::new(config.debug);
    let report = run_package(config, &runner).context("Failed to package")?;

    for buildpackage in &report.outcome.buildpackages {
        info!("Buildpackage: {}", buildpackage.output_path.display());
    }
    info!(
        "Packaging completed successfully. Primary output: {}",
        report.outcome.primary.display()
    );
    Ok(())
}

/// Execute the publish command
#[instrument(skip(config))]
fn execute_publish_command(config: &Config) -> anyhow::Result<()> {
    let runner = ProcessRunner::new(config.debug);
    let outcome = run_publish(config, &runner)
        .with_context(|| format!("Failed to publish {}", config.publish.image_ref))?;

    for image in &outcome.images {
        info!("Pushed: {}", image.reference);
    }
    if let Some(manifest) = &outcome.manifest {
        info!(
            "Pushed manifest list {} ({})",
            manifest.reference,
            manifest.members.join(", ")
        );
    }
    Ok(())
}

/// Execute the targets command
#[instrument(skip(config))]
fn execute_targets_command(config: &Config) -> anyhow::Result<()> {
    let targets = resolve_targets(config).context("Failed to resolve targets")?;

    if targets.is_empty() {
        info!("No targets declared; a single untargeted artifact will be built");
    }
    for target in &targets {
        println!("{target}");
    }
    Ok(())
}

//! Package and publish pipelines
//!
//! Two independent invocations that share target resolution and the archive
//! naming convention in the build directory.

use crate::{
    config::Config,
    core::{
        archive::{Archive, ArchiveBuilder},
        buildpackage::{BuildpackageAssembler, PackagingOutcome},
        definition::{BUILDPACK_TOML, Definition},
        publisher::{PublishOutcome, Publisher},
        targets::{Target, TargetResolver},
    },
    error::{PackagerError, Result},
    utils::process::ToolRunner,
};
use tracing::{info, instrument};

/// Result of a packaging run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReport {
    pub definition: Definition,
    pub targets: Vec<Target>,
    pub archives: Vec<Archive>,
    pub outcome: PackagingOutcome,
}

/// Targets for the project: from its definition when one exists, else from `buildpack.toml`
pub fn resolve_targets(config: &Config) -> Result<Vec<Target>> {
    let path = match Definition::detect(&config.root_dir) {
        Ok(definition) => definition.path,
        Err(PackagerError::Validation { .. }) => config.root_dir.join(BUILDPACK_TOML),
        Err(e) => return Err(e),
    };
    TargetResolver::new().resolve(path)
}

/// Build archives for every target and wrap them into buildpackages
#[instrument(skip_all, fields(root = %config.root_dir.display()))]
pub fn run_package(config: &Config, runner: &dyn ToolRunner) -> Result<PackageReport> {
    let definition = Definition::detect(&config.root_dir)?;
    let targets = TargetResolver::new().resolve(&definition.path)?;
    info!(
        "Packaging {} {} for {} target(s)",
        definition.kind,
        config.package.version,
        targets.len()
    );
    for target in &targets {
        info!("  target: {}", target);
    }

    let archives = ArchiveBuilder::new(config, &definition, runner).build_all(&targets)?;
    let outcome = BuildpackageAssembler::new(config, &definition, runner).assemble_all(&targets)?;

    Ok(PackageReport {
        definition,
        targets,
        archives,
        outcome,
    })
}

/// Publish previously packaged archives under the configured image reference
#[instrument(skip_all, fields(image_ref = %config.publish.image_ref))]
pub fn run_publish(config: &Config, runner: &dyn ToolRunner) -> Result<PublishOutcome> {
    let targets = TargetResolver::new().resolve(config.root_dir.join(BUILDPACK_TOML))?;
    info!(
        "Publishing {} for {} target(s)",
        config.publish.image_ref,
        targets.len()
    );
    Publisher::new(config, runner).publish(&config.publish.image_ref, &targets)
}

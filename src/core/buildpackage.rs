//! Buildpackage assembly
//!
//! Wraps archives into `.cnb` buildpackage files with `pack`. Buildpacks are
//! packaged straight from their archive; extensions are unpacked into a
//! staging directory first because `pack extension package` wants a directory.

use crate::{
    config::Config,
    core::{
        archive::archive_path,
        definition::{ArtifactKind, Definition},
        targets::Target,
    },
    error::{PackagerError, Result},
    utils::{
        fs::FileSystemUtils,
        process::{ToolInvocation, ToolRunner},
        tarball::extract_tgz,
    },
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Name of the directory extensions are unpacked into, inside the build directory
const EXTENSION_STAGING_DIR: &str = "extension-staging";

/// A packaged buildpack or extension file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buildpackage {
    pub output_path: PathBuf,
    pub kind: ArtifactKind,
    /// Targets embedded as metadata, in order
    pub targets: Vec<Target>,
}

/// Everything a packaging run leaves behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagingOutcome {
    /// The well-known output location
    pub primary: PathBuf,
    /// One entry per target for multi-target runs, otherwise the single primary package
    pub buildpackages: Vec<Buildpackage>,
}

/// `<stem>-<arch>.<ext>` next to `output`
pub fn per_target_output(output: &Path, arch: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{stem}-{arch}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{arch}"),
    };
    output.with_file_name(name)
}

/// Produces buildpackage files from archives
pub struct BuildpackageAssembler<'a> {
    config: &'a Config,
    definition: &'a Definition,
    runner: &'a dyn ToolRunner,
    fs_utils: FileSystemUtils,
}

impl<'a> BuildpackageAssembler<'a> {
    /// Assembler writing to the configured output
    pub fn new(config: &'a Config, definition: &'a Definition, runner: &'a dyn ToolRunner) -> Self {
        Self {
            config,
            definition,
            runner,
            fs_utils: FileSystemUtils::new(),
        }
    }

    /// Package every target.
    ///
    /// Zero or one target yields a single file at the configured output. More
    /// targets yield one file per target and a copy of the first at the output.
    #[instrument(skip(self, targets), fields(kind = %self.definition.kind, targets = targets.len()))]
    pub fn assemble_all(&self, targets: &[Target]) -> Result<PackagingOutcome> {
        let output = &self.config.package.output;

        if targets.len() <= 1 {
            let buildpackage = self.assemble(output, targets)?;
            return Ok(PackagingOutcome {
                primary: output.clone(),
                buildpackages: vec![buildpackage],
            });
        }

        let mut buildpackages = Vec::with_capacity(targets.len());
        for target in targets {
            let target_output = per_target_output(output, &target.arch);
            info!("Packaging {} into {}", target, target_output.display());
            buildpackages.push(self.assemble(&target_output, std::slice::from_ref(target))?);
        }

        let first = &buildpackages[0].output_path;
        self.fs_utils.copy_file(first, output).map_err(|e| {
            PackagerError::file_system(format!("copy from {}", first.display()), output, e)
        })?;
        info!("Primary output {} copied from {}", output.display(), first.display());

        Ok(PackagingOutcome {
            primary: output.clone(),
            buildpackages,
        })
    }

    /// Package one buildpackage at `output` embedding `targets`
    pub fn assemble(&self, output: &Path, targets: &[Target]) -> Result<Buildpackage> {
        let kind = self.definition.kind;
        let archive = self.resolve_archive(targets)?;

        let source = match kind {
            ArtifactKind::Buildpack => archive,
            ArtifactKind::Extension => self.stage_extension(&archive)?,
        };

        let invocation = ToolInvocation::new(self.config.toolchain.pack())
            .args([kind.as_str(), "package"])
            .path_arg(output)
            .arg("--path")
            .path_arg(&source)
            .args(["--format", "file"])
            .args(targets.iter().flat_map(|t| ["--target".to_string(), t.to_string()]));
        self.runner.run(&invocation)?;

        if !self.fs_utils.is_file(output) {
            return Err(PackagerError::artifact_not_found(
                format!("pack did not produce a {kind} package"),
                output,
                "Check the pack output above",
            ));
        }

        debug!("Packaged {} at {}", kind, output.display());
        Ok(Buildpackage {
            output_path: output.to_path_buf(),
            kind,
            targets: targets.to_vec(),
        })
    }

    /// Archive to package for `targets`.
    ///
    /// A single target prefers its architecture-specific archive and falls
    /// back to the generic one; any other count uses the generic archive.
    pub fn resolve_archive(&self, targets: &[Target]) -> Result<PathBuf> {
        let build_dir = &self.config.build_dir;
        let kind = self.definition.kind;
        let generic = archive_path(build_dir, kind, None);

        let archive = match targets {
            [target] => {
                let specific = archive_path(build_dir, kind, Some(&target.arch));
                if self.fs_utils.is_file(&specific) {
                    specific
                } else {
                    debug!(
                        "No {} archive for {}, using {}",
                        kind,
                        target,
                        generic.display()
                    );
                    generic
                }
            }
            _ => generic,
        };

        if !self.fs_utils.is_file(&archive) {
            return Err(PackagerError::artifact_not_found(
                format!("{kind} archive missing"),
                &archive,
                "The archive is built earlier in the same packaging run",
            ));
        }
        Ok(archive)
    }

    /// Unpack an extension archive into a freshly created staging directory
    fn stage_extension(&self, archive: &Path) -> Result<PathBuf> {
        let staging = self.config.build_dir.join(EXTENSION_STAGING_DIR);
        self.fs_utils
            .reset_dir(&staging)
            .map_err(|e| PackagerError::file_system("reset", &staging, e))?;

        let entries = extract_tgz(archive, &staging)?;
        debug!(
            "Staged {} entries from {} in {}",
            entries,
            archive.display(),
            staging.display()
        );
        Ok(staging)
    }
}

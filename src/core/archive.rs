//! Archive building
//!
//! Compiles the binaries and packs the project into one compressed archive
//! per target, strictly one target at a time.

use crate::{
    config::Config,
    core::{
        definition::{ArtifactKind, Definition, PackagerVariant},
        targets::Target,
    },
    error::{PackagerError, Result},
    utils::{
        env::build_environment,
        fs::FileSystemUtils,
        process::{ToolInvocation, ToolRunner},
    },
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// A compressed archive of the project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub path: PathBuf,
    /// `None` for the single untargeted archive
    pub target: Option<Target>,
}

/// Archive path for `kind`, architecture-specific when `arch` is given.
///
/// Targets that share an architecture but differ in OS map to the same path.
pub fn archive_path(build_dir: &Path, kind: ArtifactKind, arch: Option<&str>) -> PathBuf {
    match arch {
        Some(arch) => build_dir.join(format!("{}-{arch}.tgz", kind.as_str())),
        None => build_dir.join(format!("{}.tgz", kind.as_str())),
    }
}

/// Builds archives by driving the build script and the archive packager
pub struct ArchiveBuilder<'a> {
    config: &'a Config,
    definition: &'a Definition,
    runner: &'a dyn ToolRunner,
    fs_utils: FileSystemUtils,
}

impl<'a> ArchiveBuilder<'a> {
    /// Builder writing archives into the configured build directory
    pub fn new(config: &'a Config, definition: &'a Definition, runner: &'a dyn ToolRunner) -> Self {
        Self {
            config,
            definition,
            runner,
            fs_utils: FileSystemUtils::new(),
        }
    }

    /// Wipe the build directory and build every archive.
    ///
    /// Returns one archive per target, or a single untargeted archive when
    /// `targets` is empty. The first failing target aborts the run.
    #[instrument(skip(self, targets), fields(kind = %self.definition.kind, targets = targets.len()))]
    pub fn build_all(&self, targets: &[Target]) -> Result<Vec<Archive>> {
        self.config.validate_build_dir()?;
        self.fs_utils
            .reset_dir(&self.config.build_dir)
            .map_err(|e| PackagerError::file_system("reset", &self.config.build_dir, e))?;

        if targets.is_empty() {
            info!("No targets declared, building a single untargeted archive");
            return Ok(vec![self.build(None)?]);
        }

        let mut archives = Vec::with_capacity(targets.len());
        for (i, target) in targets.iter().enumerate() {
            info!("Building archive {} of {} for {}", i + 1, targets.len(), target);
            archives.push(self.build(Some(target))?);
        }
        Ok(archives)
    }

    /// Build one archive, for `target` or untargeted
    pub fn build(&self, target: Option<&Target>) -> Result<Archive> {
        let kind = self.definition.kind;
        let path = archive_path(
            &self.config.build_dir,
            kind,
            target.map(|t| t.arch.as_str()),
        );
        let env = build_environment(kind, target);

        // Binaries from the previous target must not leak into this archive.
        self.fs_utils
            .remove_dir_all_if_exists(&self.config.toolchain.bin_dir)
            .map_err(|e| PackagerError::file_system("reset", &self.config.toolchain.bin_dir, e))?;

        self.compile(&env)?;
        self.runner.run(&self.pack_invocation(&path, &env))?;

        if !self.fs_utils.is_file(&path) {
            return Err(PackagerError::artifact_not_found(
                format!("{} did not produce an archive", self.packager_name()),
                &path,
                "Check the packager output above",
            ));
        }

        debug!("Built archive {}", path.display());
        Ok(Archive {
            path,
            target: target.cloned(),
        })
    }

    fn compile(&self, env: &[(String, String)]) -> Result<()> {
        let script = &self.config.toolchain.build_script;
        if !self.fs_utils.is_file(script) {
            debug!("No build script at {}, skipping compilation", script.display());
            return Ok(());
        }

        let invocation = ToolInvocation::new(script)
            .envs(env)
            .current_dir(&self.definition.root);
        self.runner.run(&invocation)
    }

    fn packager_name(&self) -> &'static str {
        match self.definition.variant {
            PackagerVariant::Jam => "jam",
            PackagerVariant::Legacy => "packager",
        }
    }

    fn pack_invocation(&self, archive: &Path, env: &[(String, String)]) -> ToolInvocation {
        let tools = &self.config.toolchain;
        let version = self.config.package.version.as_str();

        let invocation = match self.definition.variant {
            PackagerVariant::Jam => ToolInvocation::new(tools.jam())
                .arg("pack")
                .arg(format!("--{}", self.definition.kind.as_str()))
                .path_arg(&self.definition.path)
                .args(["--version", version, "--output"])
                .path_arg(archive),
            // The legacy packager appends `.tgz` to its destination itself.
            PackagerVariant::Legacy => ToolInvocation::new(tools.packager())
                .args(["--archive", "--uncached", "--version", version])
                .path_arg(&archive.with_extension("")),
        };

        invocation.envs(env).current_dir(&self.definition.root)
    }
}

//! Registry publishing
//!
//! Pushes the packaged buildpack with `pack buildpack package --publish`.
//! With more than one target each architecture is pushed under
//! `<base>-<arch>` and a `docker manifest` list is assembled at `<base>`.
//! Nothing is rolled back when a later step fails.

use crate::{
    config::Config,
    core::{archive::archive_path, definition::ArtifactKind, targets::Target},
    error::{PackagerError, Result},
    utils::{
        fs::FileSystemUtils,
        process::{ToolInvocation, ToolRunner},
    },
};
use std::{
    cell::Cell,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// An image pushed to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedImage {
    pub reference: String,
    /// `None` when published without a target
    pub target: Option<Target>,
}

/// A multi-architecture manifest list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestList {
    pub reference: String,
    /// Per-architecture references in target order
    pub members: Vec<String>,
}

/// What a successful publish pushed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub images: Vec<PublishedImage>,
    /// Present only when more than one target was published
    pub manifest: Option<ManifestList>,
}

/// Progress of a publish run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    Idle,
    /// Pushing the image for the target at this index
    PerArchPublishing(usize),
    ManifestCreate,
    ManifestPush,
    Done,
    /// Terminal; a tool exited non-zero
    Failed,
}

/// Publishes packaged buildpacks
pub struct Publisher<'a> {
    config: &'a Config,
    runner: &'a dyn ToolRunner,
    fs_utils: FileSystemUtils,
    state: Cell<PublishState>,
}

impl<'a> Publisher<'a> {
    /// Idle publisher reading archives from the configured build directory
    pub fn new(config: &'a Config, runner: &'a dyn ToolRunner) -> Self {
        Self {
            config,
            runner,
            fs_utils: FileSystemUtils::new(),
            state: Cell::new(PublishState::Idle),
        }
    }

    /// Current state of the run
    pub fn state(&self) -> PublishState {
        self.state.get()
    }

    fn transition(&self, next: PublishState) {
        debug!("Publish state: {:?} -> {:?}", self.state.get(), next);
        self.state.set(next);
    }

    /// Publish under `base_ref` for the resolved `targets`
    #[instrument(skip(self, targets), fields(targets = targets.len()))]
    pub fn publish(&self, base_ref: &str, targets: &[Target]) -> Result<PublishOutcome> {
        let result = self.run(base_ref, targets);
        match &result {
            Ok(_) => self.transition(PublishState::Done),
            Err(e) => {
                warn!("Publishing stopped in state {:?}: {}", self.state.get(), e);
                self.transition(PublishState::Failed);
            }
        }
        result
    }

    fn run(&self, base_ref: &str, targets: &[Target]) -> Result<PublishOutcome> {
        let fallback = self.resolve_archive(targets)?;

        if targets.len() <= 1 {
            self.transition(PublishState::PerArchPublishing(0));
            self.push_image(base_ref, &fallback, targets)?;
            return Ok(PublishOutcome {
                images: vec![PublishedImage {
                    reference: base_ref.to_string(),
                    target: targets.first().cloned(),
                }],
                manifest: None,
            });
        }

        let mut images = Vec::with_capacity(targets.len());
        for (i, target) in targets.iter().enumerate() {
            self.transition(PublishState::PerArchPublishing(i));
            let reference = format!("{base_ref}-{}", target.arch);
            let archive = self.archive_for(target, &fallback);
            info!("Publishing {} as {}", target, reference);
            self.push_image(&reference, &archive, std::slice::from_ref(target))?;
            images.push(PublishedImage {
                reference,
                target: Some(target.clone()),
            });
        }

        let members: Vec<String> = images.iter().map(|i| i.reference.clone()).collect();
        let docker = self.config.toolchain.docker();

        self.transition(PublishState::ManifestCreate);
        self.runner.run(
            &ToolInvocation::new(&docker)
                .args(["manifest", "create", base_ref])
                .args(members.iter().cloned())
                .captured(),
        )?;

        self.transition(PublishState::ManifestPush);
        self.runner.run(
            &ToolInvocation::new(&docker)
                .args(["manifest", "push", base_ref])
                .captured(),
        )?;

        info!(
            "Published manifest list {} with {} members",
            base_ref,
            members.len()
        );
        Ok(PublishOutcome {
            images,
            manifest: Some(ManifestList {
                reference: base_ref.to_string(),
                members,
            }),
        })
    }

    /// Archive to publish when a target has none of its own: the first
    /// target's architecture-specific archive, else the generic one
    pub fn resolve_archive(&self, targets: &[Target]) -> Result<PathBuf> {
        let build_dir = &self.config.build_dir;

        if let Some(first) = targets.first() {
            let specific = archive_path(build_dir, ArtifactKind::Buildpack, Some(&first.arch));
            if self.fs_utils.is_file(&specific) {
                return Ok(specific);
            }
        }

        let generic = archive_path(build_dir, ArtifactKind::Buildpack, None);
        if self.fs_utils.is_file(&generic) {
            return Ok(generic);
        }

        let found: Vec<String> = self
            .fs_utils
            .find_files(build_dir, "*.tgz")
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        Err(PackagerError::artifact_not_found(
            "no buildpack archive to publish",
            generic,
            format!(
                "Run `packager package` before publishing (archives present: {})",
                if found.is_empty() {
                    "none".to_string()
                } else {
                    found.join(", ")
                }
            ),
        ))
    }

    /// The target's own archive, or `fallback` when it has none.
    ///
    /// The fallback may hold binaries for a different architecture; it is
    /// pushed anyway under this target's tag.
    fn archive_for(&self, target: &Target, fallback: &Path) -> PathBuf {
        let specific = archive_path(
            &self.config.build_dir,
            ArtifactKind::Buildpack,
            Some(&target.arch),
        );
        if self.fs_utils.is_file(&specific) {
            specific
        } else {
            warn!(
                "No archive for {}, publishing {} under its tag",
                target,
                fallback.display()
            );
            fallback.to_path_buf()
        }
    }

    fn push_image(&self, reference: &str, archive: &Path, targets: &[Target]) -> Result<()> {
        let invocation = ToolInvocation::new(self.config.toolchain.pack())
            .args(["buildpack", "package", reference, "--path"])
            .path_arg(archive)
            .arg("--publish")
            .args(targets.iter().flat_map(|t| ["--target".to_string(), t.to_string()]));
        self.runner.run(&invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::process::testing::RecordingRunner;
    use std::fs;
    use tempfile::TempDir;

    const BASE: &str = "gcr.io/paketo-buildpacks/go-dist:1.2.3";

    fn setup(archives: &[&str]) -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        let config = Config::for_root(dir.path());
        fs::create_dir_all(&config.build_dir).unwrap();
        for name in archives {
            fs::write(config.build_dir.join(name), *name).unwrap();
        }
        (dir, config)
    }

    fn two_targets() -> Vec<Target> {
        vec![Target::new("linux", "amd64"), Target::new("linux", "arm64")]
    }

    #[test]
    fn test_untargeted_publishes_once_without_manifest() {
        let (_dir, config) = setup(&["buildpack.tgz"]);
        let runner = RecordingRunner::new();
        let publisher = Publisher::new(&config, &runner);

        let outcome = publisher.publish(BASE, &[]).unwrap();

        assert_eq!(
            outcome.images,
            vec![PublishedImage {
                reference: BASE.to_string(),
                target: None,
            }]
        );
        assert!(outcome.manifest.is_none());
        assert_eq!(publisher.state(), PublishState::Done);

        let calls = runner.invocations();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program_name(), "pack");
        assert_eq!(&calls[0].args[..3], &["buildpack", "package", BASE]);
        assert!(calls[0].args.contains(&"--publish".to_string()));
        assert_eq!(
            calls[0].flag_value("--path"),
            config.build_dir.join("buildpack.tgz").to_str()
        );
        assert!(runner.invocations_of("docker").is_empty());
    }

    #[test]
    fn test_single_target_publishes_under_base_reference() {
        let (_dir, config) = setup(&["buildpack-arm64.tgz"]);
        let runner = RecordingRunner::new();

        let outcome = Publisher::new(&config, &runner)
            .publish(BASE, &[Target::new("linux", "arm64")])
            .unwrap();

        assert_eq!(outcome.images[0].reference, BASE);
        assert!(outcome.manifest.is_none());
        let calls = runner.invocations();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].flag_values("--target"), vec!["linux/arm64"]);
    }

    #[test]
    fn test_multi_target_pushes_each_arch_then_manifest() {
        let (_dir, config) = setup(&["buildpack-amd64.tgz", "buildpack-arm64.tgz"]);
        let runner = RecordingRunner::new();

        let outcome = Publisher::new(&config, &runner)
            .publish(BASE, &two_targets())
            .unwrap();

        let amd64_ref = format!("{BASE}-amd64");
        let arm64_ref = format!("{BASE}-arm64");
        let manifest = outcome.manifest.unwrap();
        assert_eq!(manifest.reference, BASE);
        assert_eq!(manifest.members, vec![amd64_ref.clone(), arm64_ref.clone()]);
        assert!(!manifest.members.contains(&BASE.to_string()));

        let pushes = runner.invocations_of("pack");
        assert_eq!(pushes.len(), 2);
        assert_eq!(pushes[0].args[2], amd64_ref);
        assert_eq!(
            pushes[0].flag_value("--path"),
            config.build_dir.join("buildpack-amd64.tgz").to_str()
        );
        assert_eq!(pushes[1].flag_values("--target"), vec!["linux/arm64"]);
        assert_eq!(
            pushes[1].flag_value("--path"),
            config.build_dir.join("buildpack-arm64.tgz").to_str()
        );

        let docker = runner.invocations_of("docker");
        assert_eq!(docker.len(), 2);
        assert_eq!(
            docker[0].args,
            vec!["manifest", "create", BASE, amd64_ref.as_str(), arm64_ref.as_str()]
        );
        assert_eq!(docker[1].args, vec!["manifest", "push", BASE]);
        assert!(docker.iter().all(|inv| inv.capture_output));
        assert!(pushes.iter().all(|inv| !inv.capture_output));
    }

    #[test]
    fn test_missing_arch_archive_falls_back_to_first_target_archive() {
        let (_dir, config) = setup(&["buildpack-amd64.tgz"]);
        let runner = RecordingRunner::new();

        let outcome = Publisher::new(&config, &runner)
            .publish(BASE, &two_targets())
            .unwrap();

        assert_eq!(outcome.images.len(), 2);
        let pushes = runner.invocations_of("pack");
        let amd64_archive = config.build_dir.join("buildpack-amd64.tgz");
        assert_eq!(pushes[0].flag_value("--path"), amd64_archive.to_str());
        assert_eq!(pushes[1].flag_value("--path"), amd64_archive.to_str());
        assert_eq!(pushes[1].args[2], format!("{BASE}-arm64"));
    }

    #[test]
    fn test_generic_archive_serves_every_target() {
        let (_dir, config) = setup(&["buildpack.tgz"]);
        let runner = RecordingRunner::new();

        Publisher::new(&config, &runner)
            .publish(BASE, &two_targets())
            .unwrap();

        let generic = config.build_dir.join("buildpack.tgz");
        for push in runner.invocations_of("pack") {
            assert_eq!(push.flag_value("--path"), generic.to_str());
        }
    }

    #[test]
    fn test_no_archive_is_artifact_not_found() {
        let (_dir, config) = setup(&["extension.tgz"]);
        let runner = RecordingRunner::new();
        let publisher = Publisher::new(&config, &runner);

        let err = publisher.publish(BASE, &two_targets()).unwrap_err();
        match &err {
            PackagerError::ArtifactNotFound { hint, .. } => {
                assert!(hint.contains("packager package"));
                assert!(hint.contains("extension.tgz"));
            }
            other => panic!("Expected ArtifactNotFound, got {other:?}"),
        }
        assert!(runner.invocations().is_empty());
        assert_eq!(publisher.state(), PublishState::Failed);
    }

    #[test]
    fn test_failed_arch_push_aborts_before_manifest() {
        let (_dir, config) = setup(&["buildpack-amd64.tgz", "buildpack-arm64.tgz"]);
        let targets = vec![
            Target::new("linux", "amd64"),
            Target::new("linux", "arm64"),
            Target::new("linux", "ppc64le"),
        ];
        let runner = RecordingRunner::new()
            .failing_when(|inv| inv.flag_values("--target") == vec!["linux/arm64"]);
        let publisher = Publisher::new(&config, &runner);

        let result = publisher.publish(BASE, &targets);

        assert!(matches!(result, Err(PackagerError::ExternalTool { .. })));
        assert_eq!(runner.invocations_of("pack").len(), 2);
        assert!(runner.invocations_of("docker").is_empty());
        assert_eq!(publisher.state(), PublishState::Failed);
    }

    #[test]
    fn test_failed_manifest_push_is_fatal() {
        let (_dir, config) = setup(&["buildpack.tgz"]);
        let runner = RecordingRunner::new()
            .failing_when(|inv| inv.program_name() == "docker" && inv.args[1] == "push");
        let publisher = Publisher::new(&config, &runner);

        let result = publisher.publish(BASE, &two_targets());

        assert!(result.is_err());
        assert_eq!(runner.invocations_of("docker").len(), 2);
        assert_eq!(publisher.state(), PublishState::Failed);
    }
}

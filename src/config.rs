//! Configuration management for the packager
//!
//! Centralizes directory layout, tool locations and per-command options,
//! and validates them before any side effect happens.

use crate::{
    cli::{Args, Command},
    error::{PackagerError, Result},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Enable debug logging
    pub debug: bool,
    /// Project root containing `buildpack.toml` or `extension.toml`
    pub root_dir: PathBuf,
    /// Directory holding archives; wiped at the start of each packaging run
    pub build_dir: PathBuf,
    /// Where external tools are found
    pub toolchain: ToolchainLocations,
    /// Packaging options
    pub package: PackageConfig,
    /// Publishing options
    pub publish: PublishConfig,
}

/// Locations of the external tools the pipeline drives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainLocations {
    /// Directory searched first for tool binaries
    pub tools_dir: PathBuf,
    /// Script compiling the buildpack binaries for one target
    pub build_script: PathBuf,
    /// Directory the build script writes binaries into
    pub bin_dir: PathBuf,
}

/// Packaging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Version stamped into the archive
    pub version: String,
    /// Primary buildpackage output path
    pub output: PathBuf,
}

/// Publishing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Base image reference; per-architecture images are suffixed `-<arch>`
    pub image_ref: String,
}

impl ToolchainLocations {
    /// Tool locations for a project rooted at `root`
    pub fn for_root(root: &Path) -> Self {
        Self {
            tools_dir: root.join(".bin"),
            build_script: root.join("scripts").join("build.sh"),
            bin_dir: root.join("bin"),
        }
    }

    /// `<tools_dir>/<name>` when present, otherwise the bare name for a PATH lookup
    pub fn resolve(&self, name: &str) -> PathBuf {
        let candidate = self.tools_dir.join(name);
        if candidate.is_file() {
            candidate
        } else {
            PathBuf::from(name)
        }
    }

    /// `jam`, the packit archive packager
    pub fn jam(&self) -> PathBuf {
        self.resolve("jam")
    }

    /// Legacy `packager` for non-packit projects
    pub fn packager(&self) -> PathBuf {
        self.resolve("packager")
    }

    /// `pack`, which assembles and publishes buildpackages
    pub fn pack(&self) -> PathBuf {
        self.resolve("pack")
    }

    /// `docker`, used for manifest lists
    pub fn docker(&self) -> PathBuf {
        self.resolve("docker")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::for_root(Path::new("."))
    }
}

impl Config {
    /// Default layout for a project rooted at `root`
    pub fn for_root(root: &Path) -> Self {
        let build_dir = root.join("build");
        Self {
            debug: false,
            root_dir: root.to_path_buf(),
            toolchain: ToolchainLocations::for_root(root),
            package: PackageConfig {
                version: String::new(),
                output: build_dir.join("buildpackage.cnb"),
            },
            publish: PublishConfig::default(),
            build_dir,
        }
    }

    /// Create configuration from command line arguments
    pub fn from_args(args: &Args) -> Result<Self> {
        let root = std::path::absolute(&args.root)
            .map_err(|e| PackagerError::file_system("resolve", &args.root, e))?;

        let mut config = Self {
            debug: args.debug,
            ..Self::for_root(&root)
        };

        if let Some(build_dir) = &args.build_dir {
            config.build_dir = absolute(build_dir)?;
            config.package.output = config.build_dir.join("buildpackage.cnb");
        }
        if let Some(tools_dir) = &args.tools_dir {
            config.toolchain.tools_dir = absolute(tools_dir)?;
        }

        match &args.command {
            Command::Package {
                buildpack_version,
                output,
            } => {
                config.package.version = buildpack_version.clone();
                if let Some(output) = output {
                    config.package.output = absolute(output)?;
                }
            }
            Command::Publish { image_ref } => {
                config.publish.image_ref = image_ref.clone();
            }
            Command::Targets => {}
        }

        config.validate(&args.command)?;
        Ok(config)
    }

    /// Validate configuration for the command about to run
    pub fn validate(&self, command: &Command) -> Result<()> {
        if !self.root_dir.is_dir() {
            return Err(PackagerError::validation(format!(
                "Project directory not found: {}",
                self.root_dir.display()
            )));
        }

        self.validate_build_dir()?;

        match command {
            Command::Package { .. } if self.package.version.trim().is_empty() => Err(
                PackagerError::validation("A non-empty --version is required to package"),
            ),
            Command::Publish { .. } if self.publish.image_ref.trim().is_empty() => Err(
                PackagerError::validation("A non-empty --image-ref is required to publish"),
            ),
            _ => Ok(()),
        }
    }

    /// Reject a build directory that is the project root or one of its ancestors.
    ///
    /// Packaging wipes the build directory, which would take the project with it.
    pub fn validate_build_dir(&self) -> Result<()> {
        // A build directory that does not exist yet cannot contain the root.
        let Ok(build_dir) = self.build_dir.canonicalize() else {
            return Ok(());
        };
        let root_dir = self
            .root_dir
            .canonicalize()
            .map_err(|e| PackagerError::file_system("resolve", &self.root_dir, e))?;

        if root_dir.starts_with(&build_dir) {
            return Err(PackagerError::validation(format!(
                "Build directory {} contains the project root {}",
                self.build_dir.display(),
                self.root_dir.display()
            )));
        }
        Ok(())
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| PackagerError::file_system("resolve", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::try_parse_args_from;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_layout() {
        let config = Config::for_root(Path::new("/work/go-dist"));
        assert_eq!(config.build_dir, Path::new("/work/go-dist/build"));
        assert_eq!(
            config.package.output,
            Path::new("/work/go-dist/build/buildpackage.cnb")
        );
        assert_eq!(
            config.toolchain.build_script,
            Path::new("/work/go-dist/scripts/build.sh")
        );
        assert_eq!(config.toolchain.tools_dir, Path::new("/work/go-dist/.bin"));
    }

    #[test]
    fn test_tool_resolution_prefers_tools_dir() {
        let dir = TempDir::new().unwrap();
        let tools = ToolchainLocations::for_root(dir.path());
        fs::create_dir_all(&tools.tools_dir).unwrap();
        fs::write(tools.tools_dir.join("pack"), "").unwrap();

        assert_eq!(tools.pack(), tools.tools_dir.join("pack"));
        assert_eq!(tools.jam(), PathBuf::from("jam"));
        assert_eq!(tools.docker(), PathBuf::from("docker"));
    }

    #[test]
    fn test_from_args_package() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let args = try_parse_args_from([
            "packager", "--root", root.as_str(), "package", "--version", "1.2.3",
        ])
        .unwrap();

        let config = Config::from_args(&args).unwrap();
        assert_eq!(config.package.version, "1.2.3");
        assert_eq!(config.build_dir, dir.path().join("build"));
        assert_eq!(
            config.package.output,
            dir.path().join("build").join("buildpackage.cnb")
        );
    }

    #[test]
    fn test_from_args_overrides_directories() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let build = dir.path().join("out").to_string_lossy().to_string();
        let args = try_parse_args_from([
            "packager",
            "--root",
            root.as_str(),
            "--build-dir",
            build.as_str(),
            "publish",
            "--image-ref",
            "gcr.io/paketo-buildpacks/go-dist:1.2.3",
        ])
        .unwrap();

        let config = Config::from_args(&args).unwrap();
        assert_eq!(config.build_dir, dir.path().join("out"));
        assert_eq!(
            config.publish.image_ref,
            "gcr.io/paketo-buildpacks/go-dist:1.2.3"
        );
    }

    #[test]
    fn test_validate_rejects_missing_root() {
        let args = try_parse_args_from([
            "packager",
            "--root",
            "/nonexistent/project/12345",
            "targets",
        ])
        .unwrap();
        assert!(matches!(
            Config::from_args(&args),
            Err(PackagerError::Validation { .. })
        ));
    }

    #[test]
    fn test_build_dir_may_not_contain_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("go-dist");
        fs::create_dir_all(&root).unwrap();

        let mut config = Config::for_root(&root);
        config.build_dir = root.clone();
        assert!(matches!(
            config.validate_build_dir(),
            Err(PackagerError::Validation { .. })
        ));

        config.build_dir = dir.path().to_path_buf();
        assert!(matches!(
            config.validate_build_dir(),
            Err(PackagerError::Validation { .. })
        ));

        config.build_dir = root.join("sub").join("..");
        fs::create_dir_all(root.join("sub")).unwrap();
        assert!(config.validate_build_dir().is_err());
    }

    #[test]
    fn test_build_dir_inside_or_beside_root_is_accepted() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("go-dist");
        fs::create_dir_all(root.join("build")).unwrap();

        let mut config = Config::for_root(&root);
        assert!(config.validate_build_dir().is_ok());

        config.build_dir = dir.path().join("go-dist-build");
        assert!(config.validate_build_dir().is_ok());
        fs::create_dir_all(&config.build_dir).unwrap();
        assert!(config.validate_build_dir().is_ok());
    }

    #[test]
    fn test_from_args_rejects_root_as_build_dir() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let args = try_parse_args_from([
            "packager",
            "--root",
            root.as_str(),
            "--build-dir",
            root.as_str(),
            "package",
            "--version",
            "1.0.0",
        ])
        .unwrap();
        assert!(matches!(
            Config::from_args(&args),
            Err(PackagerError::Validation { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_blank_version() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let args =
            try_parse_args_from(["packager", "--root", root.as_str(), "package", "--version", " "])
                .unwrap();
        assert!(matches!(
            Config::from_args(&args),
            Err(PackagerError::Validation { .. })
        ));
    }
}

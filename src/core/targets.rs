//! Target platform resolution
//!
//! Reads the `[[targets]]` records of a buildpack or extension definition.
//! Declaration order is kept and duplicates are passed through untouched.

use crate::{
    error::{PackagerError, Result},
    utils::fs::FileSystemUtils,
};
use serde::{Deserialize, Serialize};
use std::{fmt, io, path::Path};
use tracing::{debug, instrument};

/// A platform an archive is built for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Operating system, e.g. `linux`
    pub os: String,
    /// CPU architecture, e.g. `amd64` or `arm64`
    pub arch: String,
}

impl Target {
    /// Target for `os`/`arch`
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// The part of a definition document this crate reads; everything else is ignored
#[derive(Debug, Deserialize)]
struct TargetsDocument {
    #[serde(default)]
    targets: Vec<Target>,
}

/// Resolves the ordered target list from a definition document
#[derive(Debug, Default)]
pub struct TargetResolver {
    fs_utils: FileSystemUtils,
}

impl TargetResolver {
    /// Create a resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve targets from the document at `path`.
    ///
    /// A missing document or an absent/empty `targets` list yields an empty
    /// list, which callers treat as a single untargeted build.
    #[instrument(skip(self))]
    pub fn resolve<P: AsRef<Path> + fmt::Debug>(&self, path: P) -> Result<Vec<Target>> {
        let path = path.as_ref();

        let content = match self.fs_utils.read_file_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No definition at {}, building untargeted", path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(PackagerError::file_system("read", path, e)),
        };

        let targets = Self::parse(&content, path)?;
        debug!(
            "Resolved {} target(s) from {}: {:?}",
            targets.len(),
            path.display(),
            targets
        );
        Ok(targets)
    }

    /// Parse the targets out of document content read from `path`
    pub fn parse(content: &str, path: &Path) -> Result<Vec<Target>> {
        let document: TargetsDocument = toml::from_str(content).map_err(|e| {
            PackagerError::config_with_source(
                format!("failed to parse targets: {}", e.message()),
                path,
                e,
            )
        })?;
        Ok(document.targets)
    }
}

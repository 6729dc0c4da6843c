//! Buildpack/extension definition detection
//!
//! The artifact kind and the archive packager are decided once, from the
//! files in the project root, and threaded through the pipeline.

use crate::error::{PackagerError, Result};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Definition document of a buildpack
pub const BUILDPACK_TOML: &str = "buildpack.toml";
/// Definition document of an extension
pub const EXTENSION_TOML: &str = "extension.toml";
/// Marker selecting `jam` over the legacy `packager`
pub const PACKIT_MARKER: &str = ".packit";

/// What is being packaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Buildpack,
    Extension,
}

impl ArtifactKind {
    /// Lowercase name used in archive names and `pack` subcommands
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buildpack => "buildpack",
            Self::Extension => "extension",
        }
    }

    /// File name of the definition document for this kind
    pub const fn definition_file(self) -> &'static str {
        match self {
            Self::Buildpack => BUILDPACK_TOML,
            Self::Extension => EXTENSION_TOML,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which tool turns the project into a compressed archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackagerVariant {
    /// `jam pack`, for packit-based projects
    Jam,
    /// the older `packager` tool
    Legacy,
}

/// A detected project definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    /// Project root directory
    pub root: PathBuf,
    /// Path of the definition document
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub variant: PackagerVariant,
}

impl Definition {
    /// Inspect `root` and select the artifact kind and packager variant.
    ///
    /// `extension.toml` wins over `buildpack.toml` when both exist.
    #[instrument]
    pub fn detect(root: &Path) -> Result<Self> {
        let kind = if root.join(EXTENSION_TOML).is_file() {
            ArtifactKind::Extension
        } else if root.join(BUILDPACK_TOML).is_file() {
            ArtifactKind::Buildpack
        } else {
            return Err(PackagerError::validation(format!(
                "No {BUILDPACK_TOML} or {EXTENSION_TOML} found in {}",
                root.display()
            )));
        };

        let variant = if root.join(PACKIT_MARKER).exists() {
            PackagerVariant::Jam
        } else {
            PackagerVariant::Legacy
        };

        debug!("Detected {} definition, {:?} packager", kind, variant);

        Ok(Self {
            root: root.to_path_buf(),
            path: root.join(kind.definition_file()),
            kind,
            variant,
        })
    }
}

//! Command-line argument parsing and validation

use crate::error::{PackagerError, Result};
use clap::{Parser, Subcommand, error::ErrorKind};
use std::{ffi::OsString, path::PathBuf};

/// Packages and publishes multi-architecture buildpacks and extensions
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "packager")]
pub struct Args {
    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Project directory containing buildpack.toml or extension.toml
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Directory for archives (defaults to <root>/build)
    #[arg(long = "build-dir", global = true)]
    pub build_dir: Option<PathBuf>,

    /// Directory searched for jam, packager, pack and docker before PATH (defaults to <root>/.bin)
    #[arg(long = "tools-dir", global = true)]
    pub tools_dir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build one archive per target and wrap each into a buildpackage
    Package {
        /// Version of the buildpack or extension
        #[arg(long = "version", value_name = "VERSION")]
        buildpack_version: String,

        /// Primary buildpackage output (defaults to <build-dir>/buildpackage.cnb)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Push the packaged buildpack, one image per target plus a manifest list
    Publish {
        /// Base image reference
        #[arg(long = "image-ref")]
        image_ref: String,
    },

    /// Print the resolved targets in build order
    Targets,
}

/// Parse the process arguments
pub fn parse_args() -> Result<Args> {
    try_parse_args_from(std::env::args_os())
}

/// Parse arguments, turning usage errors into [`PackagerError::UnknownArgument`].
///
/// Help and version requests print and exit the process.
pub fn try_parse_args_from<I, T>(iter: I) -> Result<Args>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Args::try_parse_from(iter) {
        Ok(args) => Ok(args),
        Err(e)
            if matches!(
                e.kind(),
                ErrorKind::DisplayHelp
                    | ErrorKind::DisplayVersion
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) =>
        {
            e.exit()
        }
        Err(e) => Err(PackagerError::unknown_argument(e.to_string().trim())),
    }
}

//! # CNB Packager
//!
//! Packages Cloud Native Buildpacks and extensions into one archive and one
//! buildpackage per declared target platform, and publishes them to a
//! registry as per-architecture images joined by a manifest list.
//!
//! ## Features
//!
//! - Target resolution from `[[targets]]` in `buildpack.toml`/`extension.toml`
//! - Per-target archives via `jam` or the legacy `packager`
//! - Buildpackage assembly with `pack`, unpacking extensions first
//! - Multi-architecture publishing with `docker manifest`
//!
//! ## Example
//!
//! ```no_run
//! use cnb_packager::core::TargetResolver;
//!
//! let targets = TargetResolver::new().resolve("buildpack.toml")?;
//! for target in &targets {
//!     println!("{target}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod utils;

use anyhow::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging with appropriate verbosity
pub fn setup_logging(debug: bool) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true)
                .compact(),
        )
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

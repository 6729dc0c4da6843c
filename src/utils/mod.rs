//! Utility modules for common functionality
//!
//! Provides reusable utilities for file operations, archive extraction,
//! process execution and build environments.

pub mod env;
pub mod fs;
pub mod process;
pub mod tarball;

pub use fs::FileSystemUtils;
pub use process::{ProcessRunner, ToolInvocation, ToolRunner};

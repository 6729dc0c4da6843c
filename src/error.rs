//! Error types for the packager
//!
//! Every variant is fatal to the current pipeline invocation.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for packaging and publishing
#[derive(Error, Debug)]
pub enum PackagerError {
    /// A definition document exists but could not be parsed
    #[error("Configuration error in {}: {message}", .path.display())]
    Config {
        message: String,
        path: PathBuf,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An archive or packaged output is missing at the point of use
    #[error("Artifact not found: {message} ({}). {hint}", .path.display())]
    ArtifactNotFound {
        message: String,
        path: PathBuf,
        hint: String,
    },

    /// An external tool exited non-zero or could not be started
    #[error("External tool failed: {command} (exit code: {exit_code:?}){}", format_output(.stderr))]
    ExternalTool {
        command: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// Unrecognized command-line option
    #[error("Unknown argument: {message}")]
    UnknownArgument { message: String },

    /// File system operation errors
    #[error("File system error: {operation} failed on {path}")]
    FileSystem {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Archive decompression errors
    #[error("Extraction error for {}: {message}", .path.display())]
    Extraction { message: String, path: PathBuf },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },
}

fn format_output(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

impl PackagerError {
    /// Create a new configuration error
    pub fn config<P: Into<PathBuf>>(message: impl Into<String>, path: P) -> Self {
        Self::Config {
            message: message.into(),
            path: path.into(),
            source: None,
        }
    }

    /// Create a configuration error that keeps the underlying parse error
    pub fn config_with_source<P, E>(message: impl Into<String>, path: P, source: E) -> Self
    where
        P: Into<PathBuf>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Config {
            message: message.into(),
            path: path.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new missing-artifact error
    pub fn artifact_not_found<P: Into<PathBuf>>(
        message: impl Into<String>,
        path: P,
        hint: impl Into<String>,
    ) -> Self {
        Self::ArtifactNotFound {
            message: message.into(),
            path: path.into(),
            hint: hint.into(),
        }
    }

    /// Create a new external tool error
    pub fn external_tool(
        command: impl Into<String>,
        exit_code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::ExternalTool {
            command: command.into(),
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a new unknown-argument error
    pub fn unknown_argument(message: impl Into<String>) -> Self {
        Self::UnknownArgument {
            message: message.into(),
        }
    }

    /// Create a new file system error
    pub fn file_system<P: Into<PathBuf>>(
        operation: impl Into<String>,
        path: P,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystem {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a new extraction error
    pub fn extraction<P: Into<PathBuf>>(message: impl Into<String>, path: P) -> Self {
        Self::Extraction {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PackagerError>;

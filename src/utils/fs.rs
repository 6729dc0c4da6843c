//! File system utility functions
//!
//! Directory resets and file copies used between pipeline steps.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Utility struct for file system operations
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystemUtils;

impl FileSystemUtils {
    /// Create a new file system utilities instance
    pub const fn new() -> Self {
        Self
    }

    /// Copy a file from source to destination, preserving permissions
    #[instrument(skip(self))]
    pub fn copy_file<P: AsRef<Path> + std::fmt::Debug, Q: AsRef<Path> + std::fmt::Debug>(
        &self,
        src: P,
        dst: Q,
    ) -> io::Result<u64> {
        let src = src.as_ref();
        let dst = dst.as_ref();

        debug!("Copying file: {} -> {}", src.display(), dst.display());

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }

        let bytes_copied = fs::copy(src, dst)?;

        let metadata = fs::metadata(src)?;
        fs::set_permissions(dst, metadata.permissions())?;

        debug!("Successfully copied {} bytes", bytes_copied);
        Ok(bytes_copied)
    }

    /// Create directories recursively
    #[instrument(skip(self))]
    pub fn create_dir_all<P: AsRef<Path> + std::fmt::Debug>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();
        debug!("Creating directory: {}", path.display());
        fs::create_dir_all(path)
    }

    /// Remove a directory and all its contents if it exists
    #[instrument(skip(self))]
    pub fn remove_dir_all_if_exists<P: AsRef<Path> + std::fmt::Debug>(
        &self,
        path: P,
    ) -> io::Result<bool> {
        let path = path.as_ref();

        match fs::remove_dir_all(path) {
            Ok(()) => {
                debug!("Removed directory: {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Directory does not exist: {}", path.display());
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Wipe a directory and recreate it empty
    #[instrument(skip(self))]
    pub fn reset_dir<P: AsRef<Path> + std::fmt::Debug>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();
        self.remove_dir_all_if_exists(path)?;
        self.create_dir_all(path)
    }

    /// Check if a path exists and is a file
    pub fn is_file<P: AsRef<Path>>(&self, path: P) -> bool {
        path.as_ref().is_file()
    }

    /// Files in `dir` whose names match `pattern`, sorted
    pub fn find_files(&self, dir: &Path, pattern: &str) -> Vec<PathBuf> {
        let full_pattern = dir.join(pattern);
        let mut files = Vec::new();

        match glob::glob(&full_pattern.to_string_lossy()) {
            Ok(paths) => {
                for path_result in paths {
                    match path_result {
                        Ok(path) if path.is_file() => files.push(path),
                        Ok(_) => {}
                        Err(e) => warn!("Error reading path for pattern {}: {}", pattern, e),
                    }
                }
            }
            Err(e) => warn!("Invalid glob pattern {}: {}", pattern, e),
        }

        files.sort();
        files
    }

    /// Read file contents as string
    #[instrument(skip(self))]
    pub fn read_file_to_string<P: AsRef<Path> + std::fmt::Debug>(
        &self,
        path: P,
    ) -> io::Result<String> {
        let path = path.as_ref();
        debug!("Reading file: {}", path.display());
        fs::read_to_string(path)
    }
}

//! Gzip-compressed tarball extraction
//!
//! Unpacks a `.tgz` archive into a staging directory, rejecting entries that
//! would land outside it.

use crate::error::{PackagerError, Result};
use flate2::read::GzDecoder;
use std::{
    fs::File,
    path::{Component, Path},
};
use tracing::{debug, instrument};

/// Extract `archive` into `dest_dir`, returning the number of entries unpacked
#[instrument]
pub fn extract_tgz(archive: &Path, dest_dir: &Path) -> Result<usize> {
    let file = File::open(archive).map_err(|e| PackagerError::file_system("open", archive, e))?;
    let mut tarball = tar::Archive::new(GzDecoder::new(file));
    tarball.set_preserve_permissions(true);

    let entries = tarball
        .entries()
        .map_err(|e| PackagerError::extraction(format!("unreadable archive: {e}"), archive))?;

    let mut count = 0;
    for entry in entries {
        let mut entry = entry
            .map_err(|e| PackagerError::extraction(format!("corrupt entry: {e}"), archive))?;
        let entry_path = entry
            .path()
            .map_err(|e| PackagerError::extraction(format!("invalid entry path: {e}"), archive))?
            .into_owned();

        validate_entry_path(&entry_path, archive)?;

        let unpacked = entry.unpack_in(dest_dir).map_err(|e| {
            PackagerError::extraction(
                format!("failed to unpack {}: {e}", entry_path.display()),
                archive,
            )
        })?;
        if unpacked {
            count += 1;
        }
    }

    debug!(
        "Extracted {} entries from {} into {}",
        count,
        archive.display(),
        dest_dir.display()
    );
    Ok(count)
}

fn validate_entry_path(path: &Path, archive: &Path) -> Result<()> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(PackagerError::extraction(
            format!("entry escapes the staging directory: {}", path.display()),
            archive,
        ));
    }
    Ok(())
}

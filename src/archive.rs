//! Zip extraction for release artifacts.

use anyhow::{Context, Result};
use log::debug;
use std::io::Cursor;
use std::path::Path;
use zip::ZipArchive;

use crate::runtime::Runtime;

/// Extraction errors callers classify by variant.
#[derive(Debug)]
pub enum ExtractError {
    /// The archive cannot be parsed or is missing expected content.
    CorruptArchive(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::CorruptArchive(msg) => write!(f, "corrupt archive: {}", msg),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract a zip archive held in memory into `dest`.
///
/// `dest` is created if missing. Entries with unsafe paths (absolute or
/// escaping the destination) are skipped.
#[tracing::instrument(skip(runtime, bytes))]
pub fn extract_zip<R: Runtime>(runtime: &R, bytes: &[u8], dest: &Path) -> Result<()> {
    debug!("Extracting zip archive to {:?}...", dest);

    let cursor = Cursor::new(bytes);
    let mut archive = ZipArchive::new(cursor)
        .map_err(|e| ExtractError::CorruptArchive(format!("failed to parse zip: {}", e)))?;

    runtime.create_dir_all(dest)?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ExtractError::CorruptArchive(format!("failed to read entry {}: {}", i, e)))?;

        let entry_path = match entry.enclosed_name() {
            Some(path) => path,
            None => {
                debug!("Skipping entry with unsafe path: {}", entry.name());
                continue;
            }
        };

        let full_path = dest.join(&entry_path);

        if entry.is_dir() {
            runtime.create_dir_all(&full_path)?;
        } else {
            if let Some(parent) = full_path.parent() {
                runtime.create_dir_all(parent)?;
            }
            let mut dest_file = runtime.create_file(&full_path)?;
            std::io::copy(&mut entry, &mut dest_file)
                .with_context(|| format!("Failed to extract file {:?}", full_path))?;

            // Set file permissions from archive metadata (Unix only)
            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode()
                && let Err(e) = runtime.set_permissions(&full_path, mode)
            {
                debug!("Failed to set permissions on {:?}: {}", full_path, e);
            }
        }
    }

    Ok(())
}

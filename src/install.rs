//! Version installation: fetch, verify, extract, rename into place.
//!
//! Each version is installed independently and all-or-nothing: the archive
//! is extracted into a hidden staging directory under the store root, and
//! only after verification and full extraction succeed is the staging
//! directory renamed to its final path. A failure at any step discards the
//! staging directory, so a partial install is never visible where the store
//! would pick it up.

use anyhow::Result;
use log::{debug, info};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::archive::{ExtractError, extract_zip};
use crate::platform::Platform;
use crate::release::Fetcher;
use crate::runtime::Runtime;
use crate::store::{EXECUTABLE_NAME, VersionStore};
use crate::version::Version;

/// Checksum mismatch between the downloaded artifact and the release's
/// SHA256SUMS entry.
#[derive(Debug)]
pub struct IntegrityError {
    pub version: Version,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "checksum mismatch for terraform {}: expected {}, got {}",
            self.version, self.expected, self.actual
        )
    }
}

impl std::error::Error for IntegrityError {}

/// How a single version install concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    AlreadyInstalled,
}

/// Per-version result of a multi-version install.
#[derive(Debug)]
pub struct InstallReport {
    pub version: Version,
    pub result: Result<InstallOutcome>,
}

/// Install each version independently; one failure never aborts or rolls
/// back the others.
pub async fn install_all<R, F>(
    store: &VersionStore<'_, R>,
    fetcher: &F,
    platform: &Platform,
    versions: &[Version],
) -> Vec<InstallReport>
where
    R: Runtime,
    F: Fetcher + ?Sized,
{
    let mut reports = Vec::with_capacity(versions.len());
    for version in versions {
        let result = install_one(store, fetcher, platform, version).await;
        reports.push(InstallReport {
            version: version.clone(),
            result,
        });
    }
    reports
}

/// Install a single version. Idempotent: an already-installed version
/// short-circuits without any network access.
#[tracing::instrument(skip(store, fetcher, platform))]
pub async fn install_one<R, F>(
    store: &VersionStore<'_, R>,
    fetcher: &F,
    platform: &Platform,
    version: &Version,
) -> Result<InstallOutcome>
where
    R: Runtime,
    F: Fetcher + ?Sized,
{
    if store.exists(version) {
        info!("terraform {} is already installed", version);
        return Ok(InstallOutcome::AlreadyInstalled);
    }

    store.ensure_root()?;

    let download = fetcher.fetch(version, platform).await?;

    let actual = sha256_hex(&download.bytes);
    if !actual.eq_ignore_ascii_case(&download.sha256) {
        return Err(IntegrityError {
            version: version.clone(),
            expected: download.sha256,
            actual,
        }
        .into());
    }
    debug!("Checksum verified for terraform {}", version);

    let runtime = store.runtime();
    let staging = store
        .root()
        .join(format!(".{}-{}.partial", version, std::process::id()));
    if runtime.exists(&staging) {
        runtime.remove_dir_all(&staging)?;
    }

    let staged = stage(store, &download.bytes, &staging);
    if let Err(e) = staged {
        if runtime.exists(&staging) {
            let _ = runtime.remove_dir_all(&staging);
        }
        return Err(e);
    }

    // The rename is the only step that makes the install visible
    if let Err(e) = runtime.rename(&staging, &store.version_dir(version)) {
        let _ = runtime.remove_dir_all(&staging);
        return Err(e);
    }

    info!("Installed terraform {}", version);
    Ok(InstallOutcome::Installed)
}

/// Extract the artifact into the staging directory and make the binary
/// executable.
fn stage<R: Runtime>(
    store: &VersionStore<'_, R>,
    bytes: &[u8],
    staging: &std::path::Path,
) -> Result<()> {
    let runtime = store.runtime();
    extract_zip(runtime, bytes, staging)?;

    let executable = staging.join(EXECUTABLE_NAME);
    if !runtime.exists(&executable) {
        return Err(ExtractError::CorruptArchive(format!(
            "archive does not contain a {} binary",
            EXECUTABLE_NAME
        ))
        .into());
    }

    // The zip entry does not reliably carry the exec bit
    runtime.set_permissions(&executable, 0o755)?;
    Ok(())
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

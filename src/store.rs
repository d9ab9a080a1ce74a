//! On-disk version store.
//!
//! The store root holds one directory per installed version, named by the
//! version identifier and containing the `terraform` executable, plus the
//! `active` symlink pointing at the executable of the currently selected
//! version:
//!
//! ```text
//! <root>/
//!   1.5.2/terraform
//!   1.6.4/terraform
//!   active -> <root>/1.6.4/terraform
//! ```
//!
//! The store is the single source of truth for installed state; every other
//! component goes through it.

use anyhow::Result;
use log::{debug, info};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;
use crate::version::Version;

/// Name of the active-version symlink inside the store root.
pub const ACTIVE_LINK_NAME: &str = "active";

/// Name of the unpacked binary inside each version directory.
pub const EXECUTABLE_NAME: &str = "terraform";

/// Store-level errors callers classify by variant.
#[derive(Debug)]
pub enum StoreError {
    /// The requested version has no directory in the store.
    NotInstalled(Version),
    /// Refusing to remove the active version without an override.
    VersionInUse(Version),
    /// Refusing a removal that would leave the active link dangling.
    WouldOrphanActiveLink,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotInstalled(version) => {
                write!(f, "terraform {} is not installed", version)
            }
            StoreError::VersionInUse(version) => {
                write!(f, "terraform {} is the active version", version)
            }
            StoreError::WouldOrphanActiveLink => {
                write!(
                    f,
                    "a version is still active; removing all versions would leave the active link dangling (pass --force to remove it as well)"
                )
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Handle to the on-disk store. All filesystem access goes through the
/// runtime so the store can be exercised against a mock.
pub struct VersionStore<'a, R: Runtime> {
    runtime: &'a R,
    root: PathBuf,
}

impl<'a, R: Runtime> VersionStore<'a, R> {
    pub fn new(runtime: &'a R, root: PathBuf) -> Self {
        Self { runtime, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn runtime(&self) -> &R {
        self.runtime
    }

    /// Create the store root if it does not exist yet.
    pub fn ensure_root(&self) -> Result<()> {
        if !self.runtime.is_dir(&self.root) {
            info!("Creating store root {:?}", self.root);
            self.runtime.create_dir_all(&self.root)?;
        }
        Ok(())
    }

    pub fn version_dir(&self, version: &Version) -> PathBuf {
        self.root.join(version.to_string())
    }

    pub fn executable_path(&self, version: &Version) -> PathBuf {
        self.version_dir(version).join(EXECUTABLE_NAME)
    }

    pub fn active_link_path(&self) -> PathBuf {
        self.root.join(ACTIVE_LINK_NAME)
    }

    /// True iff the version directory exists and contains the executable.
    pub fn exists(&self, version: &Version) -> bool {
        self.runtime.is_dir(&self.version_dir(version))
            && self.runtime.exists(&self.executable_path(version))
    }

    /// All installed versions, ascending by numeric version order.
    ///
    /// Entries that are not directories, do not parse as versions (e.g.
    /// staging directories or the active link), or are missing the
    /// executable are skipped.
    pub fn list(&self) -> Result<Vec<Version>> {
        if !self.runtime.is_dir(&self.root) {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in self.runtime.read_dir(&self.root)? {
            if !self.runtime.is_dir(&entry) {
                continue;
            }
            let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Ok(version) = name.parse::<Version>() else {
                debug!("Skipping non-version entry {:?}", entry);
                continue;
            };
            if !self.runtime.exists(&entry.join(EXECUTABLE_NAME)) {
                debug!("Skipping {:?}: no {} executable", entry, EXECUTABLE_NAME);
                continue;
            }
            versions.push(version);
        }

        versions.sort();
        Ok(versions)
    }

    /// The version the active link currently points at, or `None` if the
    /// link is absent, unreadable, or dangling. Never fails the command.
    pub fn active_version(&self) -> Option<Version> {
        let link = self.active_link_path();
        if !self.runtime.is_symlink(&link) {
            return None;
        }
        let target = self.runtime.resolve_link(&link).ok()?;
        let version = target
            .parent()?
            .file_name()?
            .to_str()?
            .parse::<Version>()
            .ok()?;
        if self.exists(&version) {
            Some(version)
        } else {
            debug!("Active link {:?} is dangling", link);
            None
        }
    }

    /// Atomically repoint the active link at the given version's executable.
    ///
    /// The new link is created under a temporary name and renamed over the
    /// old one, so a concurrent reader never observes an absent or
    /// half-written link. The link target is relative to the link's own
    /// directory (`<version>/terraform`), so it resolves correctly no
    /// matter what form of root path the store was opened with.
    pub fn activate(&self, version: &Version) -> Result<()> {
        if !self.exists(version) {
            return Err(StoreError::NotInstalled(version.clone()).into());
        }

        let link = self.active_link_path();
        let staged = self.root.join(format!(".{}.tmp", ACTIVE_LINK_NAME));
        if self.runtime.is_symlink(&staged) {
            // Leftover from an interrupted activation
            self.runtime.remove_symlink(&staged)?;
        }
        let target = PathBuf::from(version.to_string()).join(EXECUTABLE_NAME);
        self.runtime.symlink(&target, &staged)?;
        self.runtime.rename(&staged, &link)?;
        info!("Activated terraform {}", version);
        Ok(())
    }

    /// Delete a version directory.
    ///
    /// Refuses to remove the active version unless `force` is set; with
    /// `force`, the active link is removed first so it never outlives its
    /// target.
    pub fn remove(&self, version: &Version, force: bool) -> Result<()> {
        if !self.exists(version) {
            return Err(StoreError::NotInstalled(version.clone()).into());
        }

        if self.active_version().as_ref() == Some(version) {
            if !force {
                return Err(StoreError::VersionInUse(version.clone()).into());
            }
            let link = self.active_link_path();
            if self.runtime.is_symlink(&link) {
                self.runtime.remove_symlink(&link)?;
            }
        }

        self.runtime.remove_dir_all(&self.version_dir(version))?;
        info!("Removed terraform {}", version);
        Ok(())
    }
}

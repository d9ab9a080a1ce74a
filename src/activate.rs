//! Activation of an installed version (the `use` command).

use anyhow::Result;
use log::debug;

use crate::runtime::Runtime;
use crate::store::VersionStore;
use crate::version::Version;

/// Make `version` the active one.
///
/// The store enforces the precondition that the version is installed; this
/// surfaces `StoreError::NotInstalled` when `use` is invoked without a
/// prior `install`.
pub fn use_version<R: Runtime>(store: &VersionStore<'_, R>, version: &Version) -> Result<()> {
    debug!("Selecting terraform {}", version);
    store.activate(version)
}

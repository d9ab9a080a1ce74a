//! Ordered, active-annotated view of installed versions.

use anyhow::Result;

use crate::runtime::Runtime;
use crate::store::VersionStore;
use crate::version::Version;

/// One installed version and whether it is the active one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub version: Version,
    pub is_active: bool,
}

/// List installed versions ascending, marking exactly the active entry (if
/// any). No side effects.
pub fn list<R: Runtime>(store: &VersionStore<'_, R>) -> Result<Vec<VersionEntry>> {
    let active = store.active_version();
    Ok(store
        .list()?
        .into_iter()
        .map(|version| {
            let is_active = Some(&version) == active.as_ref();
            VersionEntry { version, is_active }
        })
        .collect())
}

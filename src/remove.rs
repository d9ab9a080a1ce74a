//! Version removal: unused versions, or everything.

use anyhow::Result;
use log::debug;

use crate::runtime::Runtime;
use crate::store::{StoreError, VersionStore};
use crate::version::Version;

/// What to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveScope {
    /// Every installed version except the active one.
    Unused,
    /// Every installed version. Refused while a version is active unless
    /// `force` is set, in which case the active link is removed as well.
    All { force: bool },
}

/// Per-version result of a removal.
#[derive(Debug)]
pub struct RemoveReport {
    pub version: Version,
    pub result: Result<()>,
}

/// Compute the deletion set for the scope and delete each directory,
/// continuing past per-version failures.
///
/// `remove all` without force aborts before any deletion when a version is
/// active; that is the only whole-command failure.
pub fn remove<R: Runtime>(
    store: &VersionStore<'_, R>,
    scope: RemoveScope,
) -> Result<Vec<RemoveReport>> {
    let installed = store.list()?;
    let active = store.active_version();

    let (targets, force): (Vec<Version>, bool) = match scope {
        RemoveScope::Unused => {
            let targets = installed
                .into_iter()
                .filter(|v| Some(v) != active.as_ref())
                .collect();
            (targets, false)
        }
        RemoveScope::All { force } => {
            if active.is_some() && !force {
                return Err(StoreError::WouldOrphanActiveLink.into());
            }
            (installed, force)
        }
    };

    debug!("Removing {} version(s)", targets.len());

    let reports = targets
        .into_iter()
        .map(|version| {
            let result = store.remove(&version, force);
            RemoveReport { version, result }
        })
        .collect();

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use crate::store::EXECUTABLE_NAME;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    fn version(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn seeded_store(versions: &[&str]) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        for v in versions {
            let version_dir = root.join(v);
            std::fs::create_dir_all(&version_dir).unwrap();
            std::fs::write(version_dir.join(EXECUTABLE_NAME), b"bin").unwrap();
        }
        (dir, root)
    }

    #[test]
    fn test_remove_unused_preserves_active() {
        let (_dir, root) = seeded_store(&["1.5.2", "1.6.4", "1.9.0"]);
        let runtime = RealRuntime;
        let store = VersionStore::new(&runtime, root);
        store.activate(&version("1.6.4")).unwrap();

        let reports = remove(&store, RemoveScope::Unused).unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.result.is_ok()));
        assert_eq!(store.list().unwrap(), vec![version("1.6.4")]);
        assert_eq!(store.active_version(), Some(version("1.6.4")));
    }

    #[test]
    fn test_remove_unused_without_active_removes_everything() {
        let (_dir, root) = seeded_store(&["1.5.2", "1.6.4"]);
        let runtime = RealRuntime;
        let store = VersionStore::new(&runtime, root);

        let reports = remove(&store, RemoveScope::Unused).unwrap();

        assert_eq!(reports.len(), 2);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_remove_all_refused_while_active() {
        let (_dir, root) = seeded_store(&["1.5.2", "1.6.4"]);
        let runtime = RealRuntime;
        let store = VersionStore::new(&runtime, root);
        store.activate(&version("1.6.4")).unwrap();

        let err = remove(&store, RemoveScope::All { force: false }).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::WouldOrphanActiveLink)
        ));
        // Aborted before any deletion
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn test_remove_all_forced_empties_store_and_link() {
        let (_dir, root) = seeded_store(&["1.5.2", "1.6.4"]);
        let runtime = RealRuntime;
        let store = VersionStore::new(&runtime, root);
        store.activate(&version("1.6.4")).unwrap();

        let reports = remove(&store, RemoveScope::All { force: true }).unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.result.is_ok()));
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.active_version(), None);
        assert!(!runtime.is_symlink(&store.active_link_path()));
    }

    #[test]
    fn test_remove_all_without_active_needs_no_force() {
        let (_dir, root) = seeded_store(&["1.5.2"]);
        let runtime = RealRuntime;
        let store = VersionStore::new(&runtime, root);

        let reports = remove(&store, RemoveScope::All { force: false }).unwrap();

        assert_eq!(reports.len(), 1);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_remove_empty_store() {
        let (_dir, root) = seeded_store(&[]);
        let runtime = RealRuntime;
        let store = VersionStore::new(&runtime, root);

        assert!(remove(&store, RemoveScope::Unused).unwrap().is_empty());
        assert!(
            remove(&store, RemoveScope::All { force: false })
                .unwrap()
                .is_empty()
        );
    }
}

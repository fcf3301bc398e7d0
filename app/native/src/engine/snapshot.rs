//! Snapshot engine: remember the layout after a deliberate edit.

use serde::Serialize;

use super::EngineSettings;
use crate::ipc::{TransportError, WindowManager};
use crate::layout::{Fingerprint, Scope, capture, equals_structurally, fingerprint};
use crate::store::{FingerprintStore, StoreError, StoreKey};

/// What a snapshot did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum SnapshotOutcome {
    /// The scope has no tiled windows.
    Empty,
    /// Same as the newest layout stored for the scope; nothing written.
    Unchanged,
    /// Written to the store.
    Stored { fingerprint: Fingerprint, replaced: bool },
}

/// Snapshot failures. Transport errors are fatal, store errors are not.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Captures `scope` and stores it unless it matches the newest stored layout.
///
/// # Errors
///
/// Returns `SnapshotError::Transport` if the tree cannot be read and
/// `SnapshotError::Store` if the write fails. A failed write still keeps
/// the snapshot in memory.
pub fn take_snapshot<W: WindowManager + ?Sized>(
    wm: &mut W,
    store: &mut FingerprintStore,
    scope: &Scope,
    settings: &EngineSettings,
) -> Result<SnapshotOutcome, SnapshotError> {
    let Some(tree) = capture(wm, scope)? else {
        tracing::debug!(%scope, "nothing to snapshot");
        return Ok(SnapshotOutcome::Empty);
    };

    if let Some((_, latest)) = store.latest_for_scope(scope)
        && equals_structurally(&latest.tree, &tree, settings.tolerance)
    {
        tracing::debug!(%scope, "layout unchanged, skipping snapshot");
        return Ok(SnapshotOutcome::Unchanged);
    }

    let fingerprint = fingerprint(&tree);
    let key = StoreKey::new(scope.clone(), fingerprint.clone());
    let replaced = store.get(&key).is_some();
    let leaves = tree.leaf_count();
    store.put(key, tree)?;

    tracing::info!(%scope, fingerprint = %fingerprint.short(), leaves, replaced, "stored snapshot");
    Ok(SnapshotOutcome::Stored { fingerprint, replaced })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::ipc::fake::{FakeWm, root, window, workspace};

    fn scope() -> Scope { Scope::new("DP-1", "1") }

    fn wm(left: f64, right: f64) -> FakeWm {
        FakeWm::new(root("DP-1", vec![workspace(10, "1", "splith", vec![
            window(11, "foot", left),
            window(12, "firefox", right),
        ])]))
    }

    #[test]
    fn test_snapshot_stores_new_layout() {
        let dir = TempDir::new().unwrap();
        let mut store = FingerprintStore::load(&dir.path().join("layouts.json")).unwrap();
        let outcome = take_snapshot(&mut wm(0.7, 0.3), &mut store, &scope(), &EngineSettings::default()).unwrap();

        assert!(matches!(outcome, SnapshotOutcome::Stored { replaced: false, .. }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("layouts.json");
        let mut store = FingerprintStore::load(&path).unwrap();
        let mut wm = wm(0.7, 0.3);
        let settings = EngineSettings::default();

        take_snapshot(&mut wm, &mut store, &scope(), &settings).unwrap();
        let written = fs::metadata(&path).unwrap().modified().unwrap();
        let second = take_snapshot(&mut wm, &mut store, &scope(), &settings).unwrap();

        assert_eq!(second, SnapshotOutcome::Unchanged);
        assert_eq!(store.len(), 1);
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), written);
    }

    #[test]
    fn test_resize_overwrites_same_fingerprint() {
        let dir = TempDir::new().unwrap();
        let mut store = FingerprintStore::load(&dir.path().join("layouts.json")).unwrap();
        let settings = EngineSettings::default();

        take_snapshot(&mut wm(0.5, 0.5), &mut store, &scope(), &settings).unwrap();
        let outcome = take_snapshot(&mut wm(0.7, 0.3), &mut store, &scope(), &settings).unwrap();

        assert!(matches!(outcome, SnapshotOutcome::Stored { replaced: true, .. }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_empty_workspace_is_not_stored() {
        let dir = TempDir::new().unwrap();
        let mut store = FingerprintStore::load(&dir.path().join("layouts.json")).unwrap();
        let mut wm = FakeWm::new(root("DP-1", vec![workspace(10, "1", "splith", Vec::new())]));

        let outcome = take_snapshot(&mut wm, &mut store, &scope(), &EngineSettings::default()).unwrap();
        assert_eq!(outcome, SnapshotOutcome::Empty);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_failure_is_reported_not_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("layouts.json");
        let mut store = FingerprintStore::load(&path).unwrap();
        fs::create_dir(&path).unwrap();

        let err = take_snapshot(&mut wm(0.7, 0.3), &mut store, &scope(), &EngineSettings::default()).unwrap_err();
        assert!(matches!(err, SnapshotError::Store(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_transport_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let mut store = FingerprintStore::load(&dir.path().join("layouts.json")).unwrap();
        let mut wm = wm(0.5, 0.5);
        wm.transport_failures.push_back(TransportError::ConnectionClosed);

        let err = take_snapshot(&mut wm, &mut store, &scope(), &EngineSettings::default()).unwrap_err();
        assert!(matches!(err, SnapshotError::Transport(TransportError::ConnectionClosed)));
    }
}

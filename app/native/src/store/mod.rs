//! Fingerprint store.
//!
//! Maps (output, workspace, fingerprint) to the layout last seen with that
//! shape. Inserts and removals are written through to disk before they
//! return. Last-seen updates only mark the store dirty and ride along with
//! the next save or [`FingerprintStore::flush`]. A failed write keeps the
//! in-memory change and leaves the store dirty the same way.

pub mod file;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::layout::{Fingerprint, LayoutNode, LayoutTree, Scope, arity_fingerprint};

/// Errors reading or writing the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} has format version {found}, this build supports up to {supported}", path.display())]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        supported: u32,
    },

    #[error("invalid layout in {}: {reason}", path.display())]
    InvalidLayout { path: PathBuf, reason: String },

    #[error("failed to encode store: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey {
    pub scope: Scope,
    pub fingerprint: Fingerprint,
}

impl StoreKey {
    #[must_use]
    pub const fn new(scope: Scope, fingerprint: Fingerprint) -> Self { Self { scope, fingerprint } }
}

/// A remembered layout.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredLayout {
    pub tree: LayoutTree,
    /// Unix time in milliseconds.
    pub last_seen: u64,
}

/// Serialized form of one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreEntry {
    pub output: String,
    pub workspace: String,
    pub fingerprint: Fingerprint,
    pub last_seen: u64,
    pub tree: LayoutNode,
}

/// Persistent fingerprint store. Owned by the engine thread.
#[derive(Debug)]
pub struct FingerprintStore {
    path: PathBuf,
    entries: BTreeMap<StoreKey, StoredLayout>,
    /// Highest timestamp handed out, so `last_seen` is strictly increasing.
    clock: u64,
    dirty: bool,
}

impl FingerprintStore {
    /// Loads the store at `path`, or starts empty if there is none.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the file exists but cannot be used.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let loaded = file::read_entries(path)?;
        let mut entries = BTreeMap::new();
        let mut clock = 0;

        for entry in loaded {
            let scope = Scope::new(entry.output, entry.workspace);
            let key = StoreKey::new(scope.clone(), entry.fingerprint);
            clock = clock.max(entry.last_seen);
            entries.insert(key, StoredLayout {
                tree: LayoutTree { scope, root: entry.tree },
                last_seen: entry.last_seen,
            });
        }

        tracing::info!(path = %path.display(), entries = entries.len(), "loaded fingerprint store");
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            clock,
            dirty: false,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path { &self.path }

    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// True when memory holds changes the last save failed to write.
    #[must_use]
    pub const fn is_dirty(&self) -> bool { self.dirty }

    #[must_use]
    pub fn get(&self, key: &StoreKey) -> Option<&StoredLayout> { self.entries.get(key) }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&StoreKey, &StoredLayout)> { self.entries.iter() }

    /// Inserts or overwrites `key` and writes the store.
    ///
    /// # Errors
    ///
    /// Returns the write error. The entry stays in memory.
    pub fn put(&mut self, key: StoreKey, tree: LayoutTree) -> Result<(), StoreError> {
        let last_seen = self.tick();
        self.entries.insert(key, StoredLayout { tree, last_seen });
        self.save()
    }

    /// Marks `key` as seen now. Not written until the next save or flush.
    pub fn touch(&mut self, key: &StoreKey) {
        let last_seen = self.tick();
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_seen = last_seen;
            self.dirty = true;
        }
    }

    /// The most recently seen entry for `scope`.
    #[must_use]
    pub fn latest_for_scope(&self, scope: &Scope) -> Option<(&StoreKey, &StoredLayout)> {
        self.entries
            .iter()
            .filter(|(key, _)| key.scope == *scope)
            .max_by_key(|(_, stored)| stored.last_seen)
    }

    /// The most recently seen entry for `scope` whose shape differs from
    /// `arity` only in container kinds.
    #[must_use]
    pub fn find_compatible(
        &self,
        scope: &Scope,
        arity: &Fingerprint,
    ) -> Option<(&StoreKey, &StoredLayout)> {
        self.entries
            .iter()
            .filter(|(key, stored)| {
                key.scope == *scope && arity_fingerprint(&stored.tree) == *arity
            })
            .max_by_key(|(_, stored)| stored.last_seen)
    }

    /// Deletes entries matching the filters (`None` matches everything).
    ///
    /// # Errors
    ///
    /// Returns the write error. The deletion stays in memory.
    pub fn remove_matching(
        &mut self,
        output: Option<&str>,
        workspace: Option<&str>,
    ) -> Result<usize, StoreError> {
        let before = self.entries.len();
        self.entries.retain(|key, _| {
            let output_matches = output.is_none_or(|output| key.scope.output == output);
            let workspace_matches = workspace.is_none_or(|ws| key.scope.workspace == ws);
            !(output_matches && workspace_matches)
        });
        let removed = before - self.entries.len();
        if removed > 0 {
            self.save()?;
        }
        Ok(removed)
    }

    /// Writes the whole store.
    ///
    /// # Errors
    ///
    /// Returns the write error and leaves the store dirty.
    pub fn save(&mut self) -> Result<(), StoreError> {
        let entries = self
            .entries
            .iter()
            .map(|(key, stored)| StoreEntry {
                output: key.scope.output.clone(),
                workspace: key.scope.workspace.clone(),
                fingerprint: key.fingerprint.clone(),
                last_seen: stored.last_seen,
                tree: stored.tree.root.clone(),
            })
            .collect();

        match file::write_entries(&self.path, entries) {
            Ok(()) => {
                self.dirty = false;
                tracing::debug!(path = %self.path.display(), entries = self.entries.len(), "saved store");
                Ok(())
            }
            Err(err) => {
                self.dirty = true;
                Err(err)
            }
        }
    }

    /// Saves only if there are unwritten changes.
    ///
    /// # Errors
    ///
    /// Returns the write error.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if self.dirty { self.save() } else { Ok(()) }
    }

    fn tick(&mut self) -> u64 {
        self.clock = now_millis().max(self.clock + 1);
        self.clock
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

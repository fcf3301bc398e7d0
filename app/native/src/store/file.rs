//! On-disk format of the store and of saved layout files.
//!
//! ```json
//! {
//!   "version": 1,
//!   "entries": [
//!     { "output": "DP-1", "workspace": "1", "fingerprint": "…",
//!       "lastSeen": 1767225600000, "tree": { "kind": "splitHorizontal", … } }
//!   ]
//! }
//! ```
//!
//! Writes go to a temp file in the same directory that is synced and then
//! renamed over the target, so a crash leaves either the old or the new file.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::{StoreEntry, StoreError};
use crate::constants::STORE_FORMAT_VERSION;
use crate::layout::{LayoutNode, LayoutTree, Scope};

/// Whole store as written to disk.
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    entries: Vec<StoreEntry>,
}

/// A single saved layout (`muscle save`).
#[derive(Debug, Serialize, Deserialize)]
struct LayoutFile {
    version: u32,
    scope: Scope,
    tree: LayoutNode,
}

/// Only the version, read before the full document.
#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

/// Reads the store file.
///
/// A missing file is an empty store. A file that is not a store at all is
/// renamed to `<path>.corrupt` and treated as empty. Entries whose tree
/// violates the layout invariants are dropped.
///
/// # Errors
///
/// Returns `StoreError::UnsupportedVersion` for files written by a newer
/// version, or `StoreError::Read` if the file cannot be read or moved aside.
pub fn read_entries(path: &Path) -> Result<Vec<StoreEntry>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let contents = fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let Ok(probe) = serde_json::from_str::<VersionProbe>(&contents) else {
        move_aside(path)?;
        return Ok(Vec::new());
    };
    if probe.version > STORE_FORMAT_VERSION {
        return Err(StoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: probe.version,
            supported: STORE_FORMAT_VERSION,
        });
    }

    let file: StoreFile = match serde_json::from_str(&contents) {
        Ok(file) => file,
        Err(err) => {
            tracing::warn!(error = %err, "store file does not parse");
            move_aside(path)?;
            return Ok(Vec::new());
        }
    };

    let entries = file
        .entries
        .into_iter()
        .filter(|entry| match entry.tree.validate() {
            Ok(()) => true,
            Err(reason) => {
                tracing::warn!(
                    output = %entry.output,
                    workspace = %entry.workspace,
                    %reason,
                    "dropping invalid store entry"
                );
                false
            }
        })
        .collect();
    Ok(entries)
}

/// Writes the whole store atomically.
///
/// # Errors
///
/// Returns `StoreError::Write` if the directory, temp file or rename fails.
pub fn write_entries(path: &Path, entries: Vec<StoreEntry>) -> Result<(), StoreError> {
    let file = StoreFile {
        version: STORE_FORMAT_VERSION,
        entries,
    };
    write_atomic(path, &file)
}

/// Writes a single layout to `path`.
///
/// # Errors
///
/// Returns `StoreError::Write` if writing fails.
pub fn write_layout_file(path: &Path, tree: &LayoutTree) -> Result<(), StoreError> {
    let file = LayoutFile {
        version: STORE_FORMAT_VERSION,
        scope: tree.scope.clone(),
        tree: tree.root.clone(),
    };
    write_atomic(path, &file)
}

/// Reads a layout written by [`write_layout_file`].
///
/// # Errors
///
/// Returns `StoreError::Read` if the file cannot be read, or
/// `StoreError::InvalidLayout` if it is not a valid layout of a supported version.
pub fn read_layout_file(path: &Path) -> Result<LayoutTree, StoreError> {
    let contents = fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let invalid = |reason: String| StoreError::InvalidLayout {
        path: path.to_path_buf(),
        reason,
    };

    let file: LayoutFile = serde_json::from_str(&contents).map_err(|err| invalid(err.to_string()))?;
    if file.version > STORE_FORMAT_VERSION {
        return Err(StoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: file.version,
            supported: STORE_FORMAT_VERSION,
        });
    }
    file.tree.validate().map_err(|err| invalid(err.to_string()))?;

    Ok(LayoutTree {
        scope: file.scope,
        root: file.tree,
    })
}

fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let write_err = |source: std::io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(write_err)?;

    let temp = NamedTempFile::new_in(dir).map_err(write_err)?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n").map_err(write_err)?;
        writer.flush().map_err(write_err)?;
    }
    temp.as_file().sync_all().map_err(write_err)?;
    temp.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}

fn move_aside(path: &Path) -> Result<PathBuf, StoreError> {
    let mut target = path.as_os_str().to_owned();
    target.push(".corrupt");
    let target = PathBuf::from(target);

    fs::rename(path, &target).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::warn!(
        path = %path.display(),
        moved_to = %target.display(),
        "store file is unreadable, starting with an empty store"
    );
    Ok(target)
}

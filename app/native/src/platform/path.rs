//! Path utilities.
//!
//! Shell-like path expansion plus the user-scoped locations Muscle reads and
//! writes: the config directory (store, config file) and the runtime
//! directory (control socket).

use std::path::{Path, PathBuf};

use crate::constants::{APP_NAME, STORE_FILENAME};

/// Expands shell-like paths (tilde) to absolute paths.
///
/// The path can be:
/// - Absolute (starts with `/`): returned as-is
/// - Home-relative (starts with `~`): expanded to the user's home directory
/// - Relative: returned as-is (use `expand_and_resolve` for base directory resolution)
///
/// # Examples
///
/// ```ignore
/// use muscle_lib::platform::expand;
///
/// let store = expand("~/.config/muscle/layouts.json");
/// assert!(!store.to_string_lossy().starts_with("~"));
/// ```
#[must_use]
pub fn expand(path: &str) -> PathBuf {
    let path = path.trim();

    if path.is_empty() {
        return PathBuf::new();
    }

    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}

/// Expands shell-like paths and resolves relative paths against a base directory.
///
/// Tilde and absolute paths ignore `base_dir`.
#[must_use]
pub fn expand_and_resolve(path: &str, base_dir: &Path) -> PathBuf {
    let path = path.trim();

    if path.is_empty() {
        return PathBuf::new();
    }

    let expanded = expand(path);

    if expanded.is_absolute() {
        return expanded;
    }

    base_dir.join(expanded)
}

/// Returns the user-scoped config directory for Muscle.
///
/// `$XDG_CONFIG_HOME/muscle` when set, otherwise the platform config dir,
/// otherwise `~/.config/muscle`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.trim().is_empty()
    {
        return PathBuf::from(xdg_config).join(APP_NAME);
    }

    dirs::config_dir().map_or_else(|| expand("~/.config").join(APP_NAME), |dir| dir.join(APP_NAME))
}

/// Returns the default fingerprint store location.
#[must_use]
pub fn default_store_path() -> PathBuf { config_dir().join(STORE_FILENAME) }

/// Returns the directory for runtime files such as the control socket.
///
/// Uses `$XDG_RUNTIME_DIR`, falling back to the cache dir, then `/tmp/muscle`.
#[must_use]
pub fn runtime_dir() -> PathBuf {
    dirs::runtime_dir()
        .or_else(|| dirs::cache_dir().map(|cache| cache.join(APP_NAME)))
        .unwrap_or_else(|| PathBuf::from(format!("/tmp/{APP_NAME}")))
}

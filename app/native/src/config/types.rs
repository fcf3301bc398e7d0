//! Configuration types for Muscle.
//!
//! The configuration file supports JSONC format (JSON with comments).
//! Both single-line (`//`) and multi-line (`/* */`) comments are allowed.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constants::APP_NAME;
use crate::platform::path::{config_dir, default_store_path, expand_and_resolve};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct MuscleConfig {
    /// Whether snapshotting and restoring start enabled.
    /// Can be flipped at runtime with `muscle enable` / `muscle disable`.
    /// Default: true
    pub enabled: bool,

    /// Fingerprint store settings.
    pub store: StoreConfig,

    /// Layout matching tolerances.
    pub matching: MatchingConfig,

    /// Replay behaviour.
    pub replay: ReplayConfig,

    /// Window manager connection settings.
    pub ipc: IpcConfig,
}

impl Default for MuscleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            store: StoreConfig::default(),
            matching: MatchingConfig::default(),
            replay: ReplayConfig::default(),
            ipc: IpcConfig::default(),
        }
    }
}

/// Fingerprint store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    /// Path to the store file. Supports `~`; relative paths are taken from
    /// the config directory.
    /// Default: `~/.config/muscle/layouts.json`
    pub path: String,
}

impl StoreConfig {
    /// Returns the configured store path, or the default location.
    #[must_use]
    pub fn resolved_path(&self) -> PathBuf {
        if self.path.trim().is_empty() {
            default_store_path()
        } else {
            expand_and_resolve(&self.path, &config_dir())
        }
    }
}

/// Layout matching tolerances.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchingConfig {
    /// Number of buckets a sibling share is rounded into before comparing.
    /// 20 buckets means two splits are equal when they agree within 5%.
    /// Default: 20
    pub ratio_buckets: u32,

    /// When no layout was remembered for the exact shape, fall back to the
    /// newest layout with the same number of containers and windows and
    /// replay its split orientations too.
    /// Default: false
    pub match_compatible: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            ratio_buckets: 20,
            match_compatible: false,
        }
    }
}

/// Replay behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ReplayConfig {
    /// Abort a replay that runs longer than this many milliseconds.
    /// Default: 2000
    pub timeout_ms: u64,

    /// Refuse replay plans longer than this many commands.
    /// Default: 50
    pub command_limit: usize,

    /// Delay before reading the tree after an event, in milliseconds.
    /// Gives the window manager time to finish applying the change.
    /// Default: 5
    pub settle_delay_ms: u64,

    /// Events that arrive up to this many milliseconds after a replay
    /// finished are still treated as the replay's own echo.
    /// Default: 50
    pub grace_ms: u64,

    /// Focus the previously focused window again after a replay.
    /// Default: true
    pub restore_focus: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            command_limit: 50,
            settle_delay_ms: 5,
            grace_ms: 50,
            restore_focus: true,
        }
    }
}

impl ReplayConfig {
    /// Replay timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }

    /// Settle delay as a `Duration`.
    #[must_use]
    pub const fn settle_delay(&self) -> Duration { Duration::from_millis(self.settle_delay_ms) }

    /// Grace period as a `Duration`.
    #[must_use]
    pub const fn grace(&self) -> Duration { Duration::from_millis(self.grace_ms) }
}

/// Window manager connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct IpcConfig {
    /// Explicit IPC socket path. When empty, `SWAYSOCK` then `I3SOCK` are used.
    pub socket_path: String,
}

/// Errors that can occur while loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No configuration file was found in any of the expected locations.
    #[error("No configuration file found. Expected at ~/.config/muscle/config.jsonc or config.json")]
    NotFound,
    /// The configuration file exists but could not be read.
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
    /// The configuration file contains invalid JSON.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Configuration file names to search for (in priority order).
const CONFIG_FILE_NAMES: &[&str] = &["config.jsonc", "config.json"];

/// Returns the possible configuration file paths in priority order.
///
/// Checks `$XDG_CONFIG_HOME/muscle/`, `~/.config/muscle/` and the platform
/// config directory, `.jsonc` before `.json` in each.
#[must_use]
pub fn config_paths() -> Vec<PathBuf> {
    let mut dirs_to_check = vec![config_dir()];

    if let Some(home) = dirs::home_dir() {
        dirs_to_check.push(home.join(".config").join(APP_NAME));
    }
    if let Some(platform_dir) = dirs::config_dir() {
        dirs_to_check.push(platform_dir.join(APP_NAME));
    }

    let mut paths = Vec::new();
    for dir in dirs_to_check {
        for filename in CONFIG_FILE_NAMES {
            let path = dir.join(filename);
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }
    paths
}

/// Loads the configuration from the first existing default location.
///
/// # Errors
///
/// Returns `ConfigError::NotFound` if no configuration file exists,
/// or an I/O / parse error for an unreadable file.
pub fn load_config() -> Result<(MuscleConfig, PathBuf), ConfigError> {
    for path in config_paths() {
        if path.exists() {
            return load_config_from_path(&path);
        }
    }

    Err(ConfigError::NotFound)
}

/// Loads the configuration from a specific file.
///
/// # Errors
///
/// Returns `ConfigError::NotFound` if the file does not exist,
/// or an I/O / parse error for an unreadable file.
pub fn load_config_from_path(path: &Path) -> Result<(MuscleConfig, PathBuf), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound);
    }

    let file = fs::File::open(path)?;
    // Strip comments from JSONC before parsing
    let reader = json_comments::StripComments::new(file);
    let config: MuscleConfig = serde_json::from_reader(reader)?;
    Ok((config, path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = MuscleConfig::default();
        assert!(config.enabled);
        assert_eq!(config.matching.ratio_buckets, 20);
        assert!(!config.matching.match_compatible);
        assert_eq!(config.replay.timeout(), Duration::from_secs(2));
        assert_eq!(config.replay.command_limit, 50);
        assert!(config.replay.restore_focus);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let json = r#"{ "replay": { "timeoutMs": 500 } }"#;
        let config: MuscleConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.replay.timeout_ms, 500);
        assert_eq!(config.replay.command_limit, 50);
        assert!(config.enabled);
    }

    #[test]
    fn test_load_config_from_path_strips_comments() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.jsonc");
        fs::write(
            &path,
            r#"{
                // learn but never replay
                "enabled": false,
                /* coarser buckets */
                "matching": { "ratioBuckets": 10, "matchCompatible": true }
            }"#,
        )
        .unwrap();

        let (config, loaded_from) = load_config_from_path(&path).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.matching.ratio_buckets, 10);
        assert!(config.matching.match_compatible);
        assert_eq!(loaded_from, path);
    }

    #[test]
    fn test_load_config_from_missing_path() {
        let dir = TempDir::new().unwrap();
        let result = load_config_from_path(&dir.path().join("nope.json"));
        assert!(matches!(result, Err(ConfigError::NotFound)));
    }

    #[test]
    fn test_load_config_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_config_from_path(&path), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_store_path_defaults_when_empty() {
        let store = StoreConfig::default();
        assert_eq!(store.resolved_path(), default_store_path());

        let store = StoreConfig { path: "/tmp/x.json".to_string() };
        assert_eq!(store.resolved_path(), PathBuf::from("/tmp/x.json"));

        let store = StoreConfig { path: "layouts/work.json".to_string() };
        assert_eq!(store.resolved_path(), config_dir().join("layouts/work.json"));
    }

    #[test]
    fn test_config_paths_prefer_jsonc() {
        let paths = config_paths();
        assert!(!paths.is_empty());
        assert!(paths[0].to_string_lossy().ends_with("config.jsonc"));
    }
}

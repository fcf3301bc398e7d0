//! Configuration module for Muscle.
//!
//! The configuration file supports JSONC format (JSON with comments).
//! Both single-line (`//`) and multi-line (`/* */`) comments are allowed.
//! A missing file is not an error: every key has a default.

pub mod types;

use std::path::PathBuf;
use std::sync::OnceLock;

pub use types::{
    ConfigError, IpcConfig, MatchingConfig, MuscleConfig, ReplayConfig, StoreConfig, config_paths,
    load_config as load_config_default, load_config_from_path,
};

/// Global configuration instance, loaded once at startup.
static CONFIG: OnceLock<MuscleConfig> = OnceLock::new();

/// Custom config path override (set via CLI --config flag).
static CUSTOM_CONFIG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Sets a custom configuration file path to use instead of the default search paths.
///
/// This must be called before `get_config()` to take effect.
///
/// Returns `false` if a path was already set.
pub fn set_custom_config_path(path: PathBuf) -> bool { CUSTOM_CONFIG_PATH.set(path).is_ok() }

/// Loads the configuration from disk, falling back to defaults.
fn load_or_default() -> MuscleConfig {
    let result = CUSTOM_CONFIG_PATH.get().map_or_else(load_config_default, |path| load_config_from_path(path));

    match result {
        Ok((config, path)) => {
            tracing::debug!(path = %path.display(), "loaded configuration");
            config
        }
        Err(ConfigError::NotFound) => {
            if let Some(path) = CUSTOM_CONFIG_PATH.get() {
                tracing::warn!(path = %path.display(), "configuration file not found, using defaults");
            } else {
                tracing::debug!("no configuration file, using defaults");
            }
            MuscleConfig::default()
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to load configuration, using defaults");
            MuscleConfig::default()
        }
    }
}

/// Returns the global configuration instance, initializing it if necessary.
///
/// If no configuration file is found, returns the default configuration.
pub fn get_config() -> &'static MuscleConfig { CONFIG.get_or_init(load_or_default) }

/// Resolves the store path: an explicit override wins over the config file.
#[must_use]
pub fn resolve_store_path(cli_override: Option<&PathBuf>) -> PathBuf {
    cli_override.map_or_else(
        || get_config().store.resolved_path(),
        |path| crate::platform::expand(&path.to_string_lossy()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_store_path_prefers_override() {
        let path = PathBuf::from("/tmp/muscle-test/layouts.json");
        assert_eq!(resolve_store_path(Some(&path)), path);
    }

    #[test]
    fn test_get_config_is_stable() {
        let first = get_config() as *const MuscleConfig;
        let second = get_config() as *const MuscleConfig;
        assert_eq!(first, second);
    }
}

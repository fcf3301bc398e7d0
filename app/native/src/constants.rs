//! Application-wide constants.

/// Application name, used for config/runtime directory names.
pub const APP_NAME: &str = "muscle";

/// Store file name inside the config directory.
pub const STORE_FILENAME: &str = "layouts.json";

/// Control socket file name inside the runtime directory.
pub const SOCKET_FILENAME: &str = "muscle.sock";

/// Environment variables consulted for the window manager socket, in order.
pub const WM_SOCKET_ENV_VARS: &[&str] = &["SWAYSOCK", "I3SOCK"];

/// Version tag written into every persisted store and layout file.
pub const STORE_FORMAT_VERSION: u32 = 1;

/// Default log filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "muscle=info,muscle_lib=info";

//! Platform helpers for Muscle.
//!
//! - [`path`] - Tilde expansion and the default config/runtime locations
//! - [`thread`] - Named background threads

pub mod path;
pub mod thread;

pub use path::{config_dir, default_store_path, expand, expand_and_resolve, runtime_dir};
pub use thread::spawn_named_thread;

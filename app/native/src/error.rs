//! Error types for Muscle.
//!
//! Each layer has its own error enum (`TransportError`, `StoreError`,
//! `ControlError`, ...). `MuscleError` is the crate-level error reported by
//! the CLI and by the engine loop when it stops.

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::control::ControlError;
use crate::engine::replay::PlanError;
use crate::ipc::TransportError;
use crate::store::StoreError;

/// Errors that can stop a command or the engine.
///
/// Serializes as `{"kind": ..., "message": ...}` so the control socket can
/// hand it to the CLI unchanged.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum MuscleError {
    /// Invalid command arguments.
    #[error("{0}")]
    InvalidArguments(String),
    /// Window manager IPC failed. Fatal for the engine.
    #[error("Transport error: {0}")]
    Transport(String),
    /// Fingerprint store could not be read or written.
    #[error("Store error: {0}")]
    Store(String),
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
    /// Control socket communication error.
    #[error("Control error: {0}")]
    Control(String),
    /// A layout could not be replayed.
    #[error("Replay error: {0}")]
    Replay(String),
    /// IO error.
    #[error("IO error: {0}")]
    Io(String),
    /// Generic command error.
    #[error("{0}")]
    Command(String),
}

impl MuscleError {
    /// Returns true for faults the engine must not try to survive.
    #[must_use]
    pub const fn is_fatal(&self) -> bool { matches!(self, Self::Transport(_)) }
}

impl From<TransportError> for MuscleError {
    fn from(err: TransportError) -> Self { Self::Transport(err.to_string()) }
}

impl From<StoreError> for MuscleError {
    fn from(err: StoreError) -> Self { Self::Store(err.to_string()) }
}

impl From<ConfigError> for MuscleError {
    fn from(err: ConfigError) -> Self { Self::Config(err.to_string()) }
}

impl From<ControlError> for MuscleError {
    fn from(err: ControlError) -> Self { Self::Control(err.to_string()) }
}

impl From<PlanError> for MuscleError {
    fn from(err: PlanError) -> Self { Self::Replay(err.to_string()) }
}

impl From<std::io::Error> for MuscleError {
    fn from(err: std::io::Error) -> Self { Self::Io(err.to_string()) }
}

impl From<serde_json::Error> for MuscleError {
    fn from(err: serde_json::Error) -> Self { Self::Command(err.to_string()) }
}

impl From<String> for MuscleError {
    fn from(msg: String) -> Self { Self::Command(msg) }
}

impl From<&str> for MuscleError {
    fn from(msg: &str) -> Self { Self::Command(msg.to_string()) }
}

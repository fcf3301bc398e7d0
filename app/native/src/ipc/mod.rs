//! Window manager IPC transport.
//!
//! The engine only sees the [`WindowManager`] trait: read the whole tree, run
//! one command. [`I3Connection`] implements it over the i3/sway socket, and
//! [`Subscription`] is the separate connection that yields [`WmEvent`]s.

mod connection;
pub mod events;
#[cfg(test)]
pub mod fake;
pub mod protocol;
pub mod types;

use std::path::PathBuf;

pub use connection::{I3Connection, Subscription, resolve_socket_path};
pub use events::{WindowChange, WmEvent, WorkspaceChange};
pub use types::{CommandReply, RawNode};

/// Errors talking to the window manager. All of them are fatal to the engine.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The manager closed the socket.
    #[error("window manager closed the connection")]
    ConnectionClosed,

    /// No socket path was configured or found in the environment.
    #[error("no window manager socket found (set SWAYSOCK or I3SOCK, or ipc.socketPath)")]
    NoSocket,

    /// Connecting to the socket failed.
    #[error("failed to connect to {}: {source}", path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Read or write on an open socket failed.
    #[error("IPC I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A payload could not be decoded.
    #[error("malformed IPC payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The byte stream violated the framing.
    #[error("IPC protocol error: {0}")]
    Protocol(String),

    /// The manager refused the event subscription.
    #[error("window manager refused the event subscription")]
    SubscribeRefused,

    /// The manager announced that it is exiting or restarting.
    #[error("window manager is shutting down ({0})")]
    Shutdown(String),
}

/// Result of running one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    /// The manager parsed or ran the command and reported failure.
    Rejected(String),
}

impl CommandOutcome {
    /// Folds the per-command replies of one `RUN_COMMAND` into one outcome.
    #[must_use]
    pub fn from_replies(replies: &[CommandReply]) -> Self {
        replies.iter().find(|reply| !reply.success).map_or(Self::Success, |reply| {
            let reason = reply.error.clone().unwrap_or_else(|| {
                if reply.parse_error { "parse error" } else { "command failed" }.to_string()
            });
            Self::Rejected(reason)
        })
    }

    #[must_use]
    pub const fn is_success(&self) -> bool { matches!(self, Self::Success) }
}

/// The synchronous query/command half of the window manager.
pub trait WindowManager {
    /// Reads the complete container tree.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` if the connection fails.
    fn tree(&mut self) -> Result<RawNode, TransportError>;

    /// Runs one command and reports whether the manager accepted it.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` if the connection fails. A rejected command
    /// is not an error.
    fn run_command(&mut self, command: &str) -> Result<CommandOutcome, TransportError>;
}

impl<W: WindowManager + ?Sized> WindowManager for &mut W {
    fn tree(&mut self) -> Result<RawNode, TransportError> { (**self).tree() }

    fn run_command(&mut self, command: &str) -> Result<CommandOutcome, TransportError> {
        (**self).run_command(command)
    }
}

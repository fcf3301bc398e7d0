//! Message types for the engine actor.
//!
//! - `EngineMessage` - events and commands sent to the actor
//! - `EngineQuery` - requests answered through a oneshot channel
//! - `QueryResult` - answers to queries

use tokio::sync::oneshot;

use crate::engine::{EngineStatus, EventEnvelope};

// ============================================================================
// Engine Messages
// ============================================================================

/// Messages sent to the engine actor.
#[derive(Debug)]
pub enum EngineMessage {
    /// An event from the window manager subscription.
    Event(EventEnvelope),

    /// A request that expects an answer.
    Query {
        query: EngineQuery,
        respond_to: oneshot::Sender<QueryResult>,
    },

    /// The subscription connection is gone. Fatal.
    StreamEnded { reason: String },

    /// Flush the store and stop.
    Shutdown,
}

impl EngineMessage {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Event(_) => "Event",
            Self::Query { query, .. } => query.name(),
            Self::StreamEnded { .. } => "StreamEnded",
            Self::Shutdown => "Shutdown",
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Requests answered by the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineQuery {
    Status,
    SetEnabled { enabled: bool },
}

impl EngineQuery {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Status => "Status",
            Self::SetEnabled { .. } => "SetEnabled",
        }
    }
}

/// Answers to [`EngineQuery`].
#[derive(Debug, Clone)]
pub enum QueryResult {
    Status(Box<EngineStatus>),
    /// Whether the engine is enabled after the change.
    Enabled(bool),
}

//! Handle for talking to the engine actor.
//!
//! The handle is cheap to clone. The event reader thread pushes events with
//! [`EngineHandle::send_blocking`]; the control socket asks questions with
//! [`EngineHandle::query_blocking`].

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::messages::{EngineMessage, EngineQuery, QueryResult};
use crate::engine::{EngineStatus, EventEnvelope};

/// Error types for actor communication.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    /// Failed to send message to actor.
    #[error("Failed to send message to engine: channel closed")]
    SendFailed,

    /// Failed to receive response from actor.
    #[error("Failed to receive response from engine: channel closed")]
    ReceiveFailed,

    /// Query timed out.
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    /// The answer did not match the query.
    #[error("Unexpected answer from engine")]
    UnexpectedResult,

    /// A runtime for a blocking query could not be built.
    #[error("Failed to start query runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Handle for communicating with the engine actor.
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineMessage>,
}

impl EngineHandle {
    pub(crate) const fn new(sender: mpsc::Sender<EngineMessage>) -> Self { Self { sender } }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Queues a message without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::SendFailed`] if the channel is full or closed.
    pub fn send(&self, msg: EngineMessage) -> Result<(), ActorError> {
        self.sender.try_send(msg).map_err(|_| ActorError::SendFailed)
    }

    /// Queues a message, blocking while the channel is full.
    ///
    /// Must not be called from inside an async runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::SendFailed`] if the actor has stopped.
    pub fn send_blocking(&self, msg: EngineMessage) -> Result<(), ActorError> {
        self.sender.blocking_send(msg).map_err(|_| ActorError::SendFailed)
    }

    /// Forwards a window manager event.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::SendFailed`] if the actor has stopped.
    pub fn event(&self, envelope: EventEnvelope) -> Result<(), ActorError> {
        self.send_blocking(EngineMessage::Event(envelope))
    }

    /// Asks the actor to flush and stop.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::SendFailed`] if the actor has already stopped.
    pub async fn shutdown(&self) -> Result<(), ActorError> {
        self.sender.send(EngineMessage::Shutdown).await.map_err(|_| ActorError::SendFailed)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Executes a query and waits for the result.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::SendFailed`] if the channel is closed, or
    /// [`ActorError::ReceiveFailed`] if the response channel is closed.
    pub async fn query(&self, query: EngineQuery) -> Result<QueryResult, ActorError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(EngineMessage::Query { query, respond_to: tx })
            .await
            .map_err(|_| ActorError::SendFailed)?;

        rx.await.map_err(|_| ActorError::ReceiveFailed)
    }

    /// Executes a query with a timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Timeout`] if the query doesn't complete in time,
    /// or any error from [`Self::query`].
    pub async fn query_timeout(
        &self,
        query: EngineQuery,
        timeout: Duration,
    ) -> Result<QueryResult, ActorError> {
        tokio::time::timeout(timeout, self.query(query))
            .await
            .map_err(|_| ActorError::Timeout(timeout))?
    }

    /// Runs [`Self::query_timeout`] from a thread that has no runtime.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Self::query_timeout`].
    pub fn query_blocking(
        &self,
        query: EngineQuery,
        timeout: Duration,
    ) -> Result<QueryResult, ActorError> {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build()?;
        runtime.block_on(self.query_timeout(query, timeout))
    }

    // ========================================================================
    // Convenience queries
    // ========================================================================

    /// Current engine status.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the actor fails.
    pub fn status(&self, timeout: Duration) -> Result<EngineStatus, ActorError> {
        match self.query_blocking(EngineQuery::Status, timeout)? {
            QueryResult::Status(status) => Ok(*status),
            QueryResult::Enabled(_) => Err(ActorError::UnexpectedResult),
        }
    }

    /// Enables or disables snapshotting and restoring.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the actor fails.
    pub fn set_enabled(&self, enabled: bool, timeout: Duration) -> Result<bool, ActorError> {
        match self.query_blocking(EngineQuery::SetEnabled { enabled }, timeout)? {
            QueryResult::Enabled(enabled) => Ok(enabled),
            QueryResult::Status(_) => Err(ActorError::UnexpectedResult),
        }
    }
}

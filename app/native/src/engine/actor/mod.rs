//! Engine actor.
//!
//! The actor owns the [`Engine`] and processes messages one at a time on a
//! dedicated thread, so an event and the replay it triggers finish before
//! the next event is looked at.
//!
//! # Panic Recovery
//!
//! If a message handler panics:
//! 1. The panic is caught and logged
//! 2. Every scope is reset to `Idle`, so no replay marker is left behind
//! 3. The actor continues with the next message
//!
//! Fatal errors (transport failures, end of the event stream) stop the
//! actor. The store is flushed on every exit path.

mod handle;
mod messages;

use std::panic::{AssertUnwindSafe, catch_unwind};

pub use handle::{ActorError, EngineHandle};
pub use messages::{EngineMessage, EngineQuery, QueryResult};
use tokio::sync::{mpsc, oneshot};

use super::{Engine, EngineOutcome};
use crate::error::MuscleError;
use crate::ipc::WindowManager;
use crate::platform::spawn_named_thread;

/// Channel buffer size for the engine actor.
const CHANNEL_BUFFER_SIZE: usize = 256;

/// How the actor ended. `Ok` after a requested shutdown.
pub type ActorExit = Result<(), MuscleError>;

/// The actor that owns the engine.
pub struct EngineActor<W: WindowManager> {
    engine: Engine<W>,
    receiver: mpsc::Receiver<EngineMessage>,
}

impl<W: WindowManager + Send + 'static> EngineActor<W> {
    /// Spawns the actor on its own thread.
    ///
    /// The returned receiver resolves once the actor has stopped and flushed
    /// the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(engine: Engine<W>) -> std::io::Result<(EngineHandle, oneshot::Receiver<ActorExit>)> {
        tracing::debug!("spawning engine actor");
        let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let (exit_tx, exit_rx) = oneshot::channel();

        let actor = Self { engine, receiver };
        spawn_named_thread("engine", move || {
            let exit = actor.run();
            let _ = exit_tx.send(exit);
        })?;

        Ok((EngineHandle::new(sender), exit_rx))
    }

    /// Runs the message loop until shutdown or a fatal error.
    fn run(mut self) -> ActorExit {
        tracing::trace!("engine actor message loop starting");

        let result = loop {
            let Some(msg) = self.receiver.blocking_recv() else {
                tracing::debug!("engine actor channel closed, exiting");
                break Ok(());
            };

            match msg {
                EngineMessage::Shutdown => {
                    tracing::debug!("engine actor received shutdown message");
                    break Ok(());
                }
                EngineMessage::StreamEnded { reason } => {
                    break Err(MuscleError::Transport(format!("event stream ended: {reason}")));
                }
                msg => {
                    let msg_name = msg.name();
                    let result = catch_unwind(AssertUnwindSafe(|| self.handle_message(msg)));

                    match result {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => break Err(err),
                        Err(panic_info) => {
                            let panic_msg = panic_info
                                .downcast_ref::<&str>()
                                .map(|s| (*s).to_string())
                                .or_else(|| panic_info.downcast_ref::<String>().cloned())
                                .unwrap_or_else(|| "unknown panic".to_string());

                            tracing::error!(message = msg_name, panic = %panic_msg, "engine panicked, resetting replay state");
                            self.engine.reset_scopes();
                        }
                    }
                }
            }
        };

        let flushed = self.engine.shutdown();
        result.and(flushed.map_err(MuscleError::from))
    }

    /// Handles one message. Only fatal errors are returned.
    fn handle_message(&mut self, msg: EngineMessage) -> Result<(), MuscleError> {
        match msg {
            EngineMessage::Event(envelope) => match self.engine.handle(&envelope) {
                Ok(outcome) => {
                    log_outcome(&outcome);
                    Ok(())
                }
                Err(err) if err.is_fatal() => Err(err),
                Err(err) => {
                    tracing::error!(error = %err, "event handling failed");
                    Ok(())
                }
            },
            EngineMessage::Query { query, respond_to } => {
                let result = match query {
                    EngineQuery::Status => QueryResult::Status(Box::new(self.engine.status())),
                    EngineQuery::SetEnabled { enabled } => {
                        if enabled {
                            self.engine.enable();
                        } else {
                            self.engine.disable();
                        }
                        QueryResult::Enabled(self.engine.is_enabled())
                    }
                };
                let _ = respond_to.send(result);
                Ok(())
            }
            EngineMessage::StreamEnded { .. } | EngineMessage::Shutdown => Ok(()),
        }
    }
}

fn log_outcome(outcome: &EngineOutcome) {
    match outcome {
        EngineOutcome::Noise(_) => {}
        EngineOutcome::Disabled(classification) => {
            tracing::debug!(?classification, "engine disabled, not acting");
        }
        EngineOutcome::Snapshot { .. } | EngineOutcome::SnapshotNotSaved { .. } => {}
        EngineOutcome::Restore(results) => {
            for (scope, result) in results {
                tracing::debug!(%scope, ?result, "restore finished");
            }
        }
    }
}

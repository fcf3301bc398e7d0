//! `muscle run`: wires the engine to the window manager and the control
//! socket, then waits for a signal or a fatal error.
//!
//! Threads:
//! - `muscle-events` reads the subscription and forwards stamped events
//! - `muscle-engine` runs the engine actor
//! - `muscle-control` serves the control socket
//! - the main thread waits on a current-thread tokio runtime
//!
//! `SIGINT`/`SIGTERM` flush the store and return `Ok`. Losing the event
//! stream or the command connection returns an error so the process exits
//! with status 1 and a supervisor can restart it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::oneshot;

use crate::config::{get_config, resolve_store_path};
use crate::control::{self, ControlRequest, ControlResponse};
use crate::engine::actor::ActorExit;
use crate::engine::{Engine, EngineActor, EngineHandle, EngineMessage, EngineSettings, EventEnvelope};
use crate::error::MuscleError;
use crate::ipc::protocol::EventType;
use crate::ipc::{I3Connection, Subscription, resolve_socket_path};
use crate::platform::spawn_named_thread;
use crate::store::FingerprintStore;

/// How long a control request waits for the engine.
const QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Events the engine subscribes to.
const SUBSCRIBED_EVENTS: &[EventType] =
    &[EventType::Window, EventType::Workspace, EventType::Binding, EventType::Shutdown];

/// Runs the engine until a signal or a fatal error.
///
/// # Errors
///
/// Returns an error if startup fails, if another engine already serves the
/// control socket, or if the window manager connection is lost.
pub fn run(store_override: Option<&PathBuf>) -> Result<(), MuscleError> {
    let config = get_config();
    let control_path = control::socket_path();

    if is_running(&control_path) {
        return Err(MuscleError::Command(format!(
            "muscle is already running (control socket {})",
            control_path.display()
        )));
    }

    let store_path = resolve_store_path(store_override);
    let store = FingerprintStore::load(&store_path)?;

    let wm_socket = resolve_socket_path(explicit_socket(&config.ipc.socket_path))?;
    let connection = I3Connection::connect(&wm_socket)?;
    let subscription = Subscription::subscribe(&wm_socket, SUBSCRIBED_EVENTS)?;

    tracing::info!(
        store = %store_path.display(),
        socket = %wm_socket.display(),
        layouts = store.len(),
        enabled = config.enabled,
        "muscle started"
    );

    let engine = Engine::new(connection, store, EngineSettings::from_config(config), config.enabled);
    let (handle, exit) = EngineActor::spawn(engine)?;
    spawn_reader(subscription, handle.clone())?;
    control::start_server(&control_path, control_handler(handle.clone()))?;

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let result = runtime.block_on(wait_for_exit(&handle, exit));

    control::stop_server(&control_path);
    match &result {
        Ok(()) => tracing::info!("muscle stopped"),
        Err(err) => tracing::error!(error = %err, "muscle stopped"),
    }
    result
}

/// The configured manager socket, unless left blank.
pub(crate) fn explicit_socket(configured: &str) -> Option<&str> {
    let trimmed = configured.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Forwards subscription events to the actor until the stream ends.
fn spawn_reader(subscription: Subscription, handle: EngineHandle) -> std::io::Result<()> {
    spawn_named_thread("events", move || {
        let mut subscription = subscription;
        let reason = loop {
            match subscription.next_event() {
                Ok(event) => {
                    if handle.event(EventEnvelope::now(event)).is_err() {
                        tracing::debug!("engine stopped, event reader exiting");
                        return;
                    }
                }
                Err(err) => break err.to_string(),
            }
        };

        tracing::error!(%reason, "window manager event stream ended");
        let _ = handle.send_blocking(EngineMessage::StreamEnded { reason });
    })?;
    Ok(())
}

/// Answers control socket requests through the actor.
fn control_handler(
    handle: EngineHandle,
) -> impl Fn(ControlRequest) -> ControlResponse + Send + Sync + 'static {
    move |request| {
        let result = match request {
            ControlRequest::Ping => return ControlResponse::success("pong"),
            ControlRequest::Status => handle.status(QUERY_TIMEOUT).map(ControlResponse::success),
            ControlRequest::Enable | ControlRequest::Disable => handle
                .set_enabled(request == ControlRequest::Enable, QUERY_TIMEOUT)
                .map(|enabled| ControlResponse::success(serde_json::json!({ "enabled": enabled }))),
        };
        result.unwrap_or_else(|err| ControlResponse::error(err.to_string()))
    }
}

/// Waits for a termination signal or for the actor to stop on its own.
async fn wait_for_exit(
    handle: &EngineHandle,
    mut exit: oneshot::Receiver<ActorExit>,
) -> Result<(), MuscleError> {
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        result = &mut exit => return actor_result(result),
        _ = tokio::signal::ctrl_c() => tracing::info!("received SIGINT, shutting down"),
        _ = terminate.recv() => tracing::info!("received SIGTERM, shutting down"),
    }

    if handle.shutdown().await.is_err() {
        tracing::debug!("engine already stopped");
    }
    actor_result(exit.await)
}

fn actor_result(result: Result<ActorExit, oneshot::error::RecvError>) -> Result<(), MuscleError> {
    result.unwrap_or_else(|_| Err(MuscleError::Command("engine thread exited unexpectedly".to_string())))
}

/// Whether an engine answers on the control socket at `path`.
#[must_use]
pub fn is_running(path: &Path) -> bool {
    matches!(control::send_request(path, ControlRequest::Ping), Ok(ControlResponse::Success { .. }))
}

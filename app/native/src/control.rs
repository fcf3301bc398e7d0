//! Control socket between the CLI and a running engine.
//!
//! The engine listens on a Unix domain socket in the runtime directory.
//! `muscle enable`, `muscle disable` and `muscle status` connect, write one
//! JSON request line and read one JSON response line. If the socket is
//! missing or refuses the connection, no engine is running.
//!
//! # Request Format
//!
//! ```json
//! {"type": "ping"}
//! {"type": "status"}
//! {"type": "enable"}
//! ```
//!
//! # Response Format
//!
//! ```json
//! {"data": {...}}
//! {"error": "engine is not responding"}
//! ```

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::SOCKET_FILENAME;
use crate::platform::{runtime_dir, spawn_named_thread};

/// Default timeout for socket operations in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Number of retry attempts for transient connection failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retry attempts in milliseconds.
const RETRY_DELAY_MS: u64 = 100;

/// Whether the server is running.
static SERVER_RUNNING: AtomicBool = AtomicBool::new(false);

// ============================================================================
// Request Types
// ============================================================================

/// Requests the CLI can send to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlRequest {
    /// Check that an engine is listening.
    Ping,
    Status,
    Enable,
    Disable,
}

/// Response from the engine to the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlResponse {
    /// Successful response with data.
    Success { data: serde_json::Value },
    /// Error response.
    Error { error: String },
}

impl ControlResponse {
    /// Creates a success response.
    pub fn success(data: impl Serialize) -> Self {
        Self::Success {
            data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self { Self::Error { error: message.into() } }
}

// ============================================================================
// Socket Path
// ============================================================================

/// Path of the control socket.
#[must_use]
pub fn socket_path() -> PathBuf { runtime_dir().join(SOCKET_FILENAME) }

fn remove_socket(path: &Path) {
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
}

// ============================================================================
// Server (engine side)
// ============================================================================

/// Starts the control server on `path` in a background thread.
///
/// A stale socket file from a previous run is replaced.
///
/// # Errors
///
/// Returns `ControlError::AlreadyRunning` if this process already serves a
/// socket, or an I/O error if binding fails.
pub fn start_server<F>(path: &Path, handler: F) -> Result<(), ControlError>
where F: Fn(ControlRequest) -> ControlResponse + Send + Sync + 'static {
    if SERVER_RUNNING.swap(true, Ordering::SeqCst) {
        return Err(ControlError::AlreadyRunning);
    }

    let listener = match bind_listener(path) {
        Ok(listener) => listener,
        Err(err) => {
            SERVER_RUNNING.store(false, Ordering::SeqCst);
            return Err(ControlError::Io(err));
        }
    };

    let handler = Arc::new(handler);
    if let Err(err) = spawn_named_thread("control", move || server_loop(&listener, &handler)) {
        SERVER_RUNNING.store(false, Ordering::SeqCst);
        remove_socket(path);
        return Err(ControlError::Io(err));
    }

    tracing::info!(path = %path.display(), "control socket listening");
    Ok(())
}

/// Replaces any stale socket file and binds a fresh listener.
fn bind_listener(path: &Path) -> std::io::Result<UnixListener> {
    remove_socket(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    UnixListener::bind(path)
}

/// Accepts connections until the server is stopped.
fn server_loop<F>(listener: &UnixListener, handler: &Arc<F>)
where F: Fn(ControlRequest) -> ControlResponse + Send + Sync + 'static {
    for stream in listener.incoming() {
        if !SERVER_RUNNING.load(Ordering::SeqCst) {
            break;
        }

        match stream {
            Ok(stream) => {
                let handler = Arc::clone(handler);
                // Slow clients must not hold up the accept loop.
                let spawned = spawn_named_thread("control-conn", move || {
                    handle_connection(stream, handler.as_ref());
                });
                if spawned.is_err() {
                    tracing::warn!("dropping control connection");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "control connection error");
            }
        }
    }
    tracing::debug!("control server stopped");
}

/// Handles a single client connection.
#[allow(clippy::needless_pass_by_value)] // the stream is consumed
fn handle_connection<F>(stream: UnixStream, handler: &F)
where F: Fn(ControlRequest) -> ControlResponse {
    let _ = stream.set_read_timeout(Some(Duration::from_millis(DEFAULT_TIMEOUT_MS)));

    let Ok(read_half) = stream.try_clone() else {
        return;
    };
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    if reader.read_line(&mut line).is_err() {
        return;
    }

    let response = match serde_json::from_str::<ControlRequest>(line.trim()) {
        Ok(request) => {
            tracing::debug!(?request, "control request");
            handler(request)
        }
        Err(err) => ControlResponse::error(format!("Invalid request: {err}")),
    };

    let response_json = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"error":"Failed to serialize response"}"#.to_string());

    let mut stream = stream;
    if let Err(err) = writeln!(stream, "{response_json}") {
        tracing::debug!(error = %err, "failed to write control response");
    }
}

/// Stops the control server and removes its socket.
pub fn stop_server(path: &Path) {
    if !SERVER_RUNNING.swap(false, Ordering::SeqCst) {
        return;
    }
    // Wake the accept loop so it sees the flag.
    let _ = UnixStream::connect(path);
    remove_socket(path);
}

/// Returns whether the server is running.
#[must_use]
pub fn is_server_running() -> bool { SERVER_RUNNING.load(Ordering::SeqCst) }

// ============================================================================
// Client (CLI side)
// ============================================================================

/// Errors talking to a running engine.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// No engine is listening on the socket.
    #[error("muscle is not running (no control socket)")]
    NotRunning,

    /// The engine did not answer in time.
    #[error("connection timed out")]
    Timeout,

    /// This process already serves a control socket.
    #[error("control server already running")]
    AlreadyRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The response could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The engine answered with an error.
    #[error("{0}")]
    Engine(String),
}

/// Sends a request to the running engine and returns the response.
///
/// Retries up to three times while the socket refuses connections.
///
/// # Errors
///
/// Returns `ControlError::NotRunning` if no engine is listening, or a
/// timeout, I/O or parse error.
pub fn send_request(path: &Path, request: ControlRequest) -> Result<ControlResponse, ControlError> {
    let mut last_error = ControlError::NotRunning;

    for attempt in 0..MAX_RETRIES {
        match send_request_once(path, request) {
            Ok(response) => return Ok(response),
            Err(err) => {
                last_error = err;

                // Only connection failures are transient.
                if !matches!(last_error, ControlError::NotRunning) {
                    break;
                }

                if attempt < MAX_RETRIES - 1 {
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
                }
            }
        }
    }

    Err(last_error)
}

/// Sends a request and unwraps the `data` of a successful response.
///
/// # Errors
///
/// Returns `ControlError::Engine` for an error response, or any error from
/// [`send_request`].
pub fn request_data(path: &Path, request: ControlRequest) -> Result<serde_json::Value, ControlError> {
    match send_request(path, request)? {
        ControlResponse::Success { data } => Ok(data),
        ControlResponse::Error { error } => Err(ControlError::Engine(error)),
    }
}

fn send_request_once(path: &Path, request: ControlRequest) -> Result<ControlResponse, ControlError> {
    if !path.exists() {
        return Err(ControlError::NotRunning);
    }

    let mut stream = UnixStream::connect(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::ConnectionRefused
        | std::io::ErrorKind::NotFound
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::ConnectionReset => ControlError::NotRunning,
        _ => ControlError::Io(err),
    })?;

    let timeout = Duration::from_millis(DEFAULT_TIMEOUT_MS);
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    let request_json = serde_json::to_string(&request)
        .map_err(|err| ControlError::InvalidResponse(format!("Failed to serialize request: {err}")))?;

    writeln!(stream, "{request_json}").map_err(|err| {
        if err.kind() == std::io::ErrorKind::BrokenPipe {
            ControlError::NotRunning
        } else {
            ControlError::Io(err)
        }
    })?;

    let mut reader = BufReader::new(stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line).map_err(|err| match err.kind() {
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => ControlError::Timeout,
        std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset => ControlError::NotRunning,
        _ => ControlError::Io(err),
    })?;

    serde_json::from_str(response_line.trim())
        .map_err(|err| ControlError::InvalidResponse(format!("Failed to parse response: {err}")))
}

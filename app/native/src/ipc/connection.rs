//! Unix socket connections to the window manager.

use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use super::protocol::{EventType, FrameKind, MessageType, read_frame, write_frame};
use super::types::{CommandReply, RawNode, SubscribeReply};
use super::{CommandOutcome, TransportError, WindowManager, WmEvent};
use crate::constants::WM_SOCKET_ENV_VARS;
use crate::platform::expand;

/// Resolves the window manager socket.
///
/// An explicit path wins; otherwise `SWAYSOCK` then `I3SOCK` are consulted.
///
/// # Errors
///
/// Returns `TransportError::NoSocket` when nothing is configured.
pub fn resolve_socket_path(explicit: Option<&str>) -> Result<PathBuf, TransportError> {
    if let Some(path) = explicit.map(str::trim).filter(|path| !path.is_empty()) {
        return Ok(expand(path));
    }

    WM_SOCKET_ENV_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .ok_or(TransportError::NoSocket)
}

fn open(path: &Path) -> Result<UnixStream, TransportError> {
    UnixStream::connect(path).map_err(|source| TransportError::Connect {
        path: path.to_path_buf(),
        source,
    })
}

/// Query/command connection.
pub struct I3Connection {
    stream: UnixStream,
}

impl I3Connection {
    /// Connects to the socket at `path`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Connect` if the socket cannot be opened.
    pub fn connect(path: &Path) -> Result<Self, TransportError> {
        let stream = open(path)?;
        tracing::debug!(path = %path.display(), "connected to window manager");
        Ok(Self { stream })
    }

    fn request<T: DeserializeOwned>(
        &mut self,
        message: MessageType,
        payload: &str,
    ) -> Result<T, TransportError> {
        write_frame(&mut self.stream, message, payload.as_bytes())?;

        loop {
            let frame = read_frame(&mut self.stream)?;
            match frame.kind {
                FrameKind::Reply(kind) if kind == message as u32 => {
                    return Ok(serde_json::from_slice(&frame.payload)?);
                }
                FrameKind::Reply(kind) => {
                    return Err(TransportError::Protocol(format!(
                        "expected reply type {}, got {kind}",
                        message as u32
                    )));
                }
                // Not subscribed on this connection; skip anything stray.
                FrameKind::Event(kind) => tracing::trace!(event_type = kind, "skipping event"),
            }
        }
    }
}

impl WindowManager for I3Connection {
    fn tree(&mut self) -> Result<RawNode, TransportError> { self.request(MessageType::GetTree, "") }

    fn run_command(&mut self, command: &str) -> Result<CommandOutcome, TransportError> {
        let replies: Vec<CommandReply> = self.request(MessageType::RunCommand, command)?;
        let outcome = CommandOutcome::from_replies(&replies);
        tracing::debug!(command, ?outcome, "ran command");
        Ok(outcome)
    }
}

/// Event subscription connection.
///
/// Iterating yields events in arrival order and ends when the manager
/// closes the socket.
pub struct Subscription {
    stream: UnixStream,
}

impl Subscription {
    /// Connects and subscribes to `events`.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` if connecting fails or the manager refuses
    /// the subscription.
    pub fn subscribe(path: &Path, events: &[EventType]) -> Result<Self, TransportError> {
        let mut stream = open(path)?;
        let names: Vec<&str> = events.iter().map(|event| event.as_str()).collect();
        let payload = serde_json::to_vec(&names)?;
        write_frame(&mut stream, MessageType::Subscribe, &payload)?;

        loop {
            let frame = read_frame(&mut stream)?;
            if frame.kind == FrameKind::Reply(MessageType::Subscribe as u32) {
                let reply: SubscribeReply = serde_json::from_slice(&frame.payload)?;
                if !reply.success {
                    return Err(TransportError::SubscribeRefused);
                }
                break;
            }
        }

        tracing::debug!(events = ?names, "subscribed to window manager events");
        Ok(Self { stream })
    }

    /// Blocks until the next event arrives.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ConnectionClosed` at end of stream, or any
    /// other transport failure.
    pub fn next_event(&mut self) -> Result<WmEvent, TransportError> {
        loop {
            let frame = read_frame(&mut self.stream)?;
            if let FrameKind::Event(kind) = frame.kind {
                return WmEvent::decode(kind, &frame.payload);
            }
        }
    }
}

impl Iterator for Subscription {
    type Item = Result<WmEvent, TransportError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_event() {
            Err(TransportError::ConnectionClosed) => None,
            other => Some(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::os::unix::net::UnixListener;

    use tempfile::TempDir;

    use super::*;

    fn reply(kind: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"i3-ipc");
        buf.extend_from_slice(&u32::try_from(payload.len()).unwrap().to_ne_bytes());
        buf.extend_from_slice(&kind.to_ne_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn test_resolve_socket_path_explicit_wins() {
        let path = resolve_socket_path(Some("/tmp/wm.sock")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/wm.sock"));
    }

    #[test]
    fn test_run_command_over_socket() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wm.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_frame(&mut stream).unwrap();
            assert_eq!(request.kind, FrameKind::Reply(0));
            assert_eq!(request.payload, b"[con_id=5] focus");
            stream.write_all(&reply(0, br#"[{"success":true}]"#)).unwrap();
        });

        let mut conn = I3Connection::connect(&path).unwrap();
        let outcome = conn.run_command("[con_id=5] focus").unwrap();
        assert!(outcome.is_success());
        server.join().unwrap();
    }

    #[test]
    fn test_subscription_ends_on_close() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wm.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_frame(&mut stream).unwrap();
            assert_eq!(request.payload, br#"["window"]"#);
            stream.write_all(&reply(2, br#"{"success":true}"#)).unwrap();
            stream
                .write_all(&reply(3 | (1 << 31), br#"{"change":"new","container":{"id":9}}"#))
                .unwrap();
        });

        let subscription = Subscription::subscribe(&path, &[EventType::Window]).unwrap();
        server.join().unwrap();

        let events: Vec<_> = subscription.collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Ok(WmEvent::Window { .. })));
    }
}

//! i3/sway IPC framing.
//!
//! Every message is `"i3-ipc"`, a native-endian `u32` payload length, a
//! native-endian `u32` message type, then the JSON payload. Replies carry the
//! request's type; events set the high bit of the type.

use std::io::{Read, Write};

use super::TransportError;

/// Magic string that starts every frame.
pub const MAGIC: &[u8; 6] = b"i3-ipc";

/// Bytes before the payload: magic, length, type.
pub const HEADER_LEN: usize = MAGIC.len() + 8;

/// Upper bound for a single payload. Trees of very busy sessions stay far below.
const MAX_PAYLOAD_LEN: u32 = 64 * 1024 * 1024;

/// High bit set on the type of event frames.
const EVENT_FLAG: u32 = 1 << 31;

/// Request message types used by Muscle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageType {
    RunCommand = 0,
    Subscribe = 2,
    GetTree = 4,
}

/// Event types Muscle subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EventType {
    Workspace = 0,
    Window = 3,
    Binding = 5,
    Shutdown = 6,
}

impl EventType {
    /// Name used in the `SUBSCRIBE` payload.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::Window => "window",
            Self::Binding => "binding",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Whether a frame answers a request or announces an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Reply(u32),
    Event(u32),
}

/// One decoded frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: FrameKind,
    pub payload: Vec<u8>,
}

/// Writes one request frame.
///
/// # Errors
///
/// Returns `TransportError::Io` if the socket write fails, or
/// `TransportError::Protocol` if the payload does not fit the length field.
pub fn write_frame<W: Write>(
    writer: &mut W,
    message: MessageType,
    payload: &[u8],
) -> Result<(), TransportError> {
    let len = u32::try_from(payload.len())
        .map_err(|_| TransportError::Protocol(format!("payload too large: {}", payload.len())))?;

    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&len.to_ne_bytes());
    buf.extend_from_slice(&(message as u32).to_ne_bytes());
    buf.extend_from_slice(payload);

    writer.write_all(&buf)?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame, blocking until it is complete.
///
/// # Errors
///
/// Returns `TransportError::ConnectionClosed` on a clean EOF before the header,
/// `TransportError::Protocol` for a bad magic or oversized payload, and
/// `TransportError::Io` for any other read failure.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Frame, TransportError> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            TransportError::ConnectionClosed
        } else {
            TransportError::Io(err)
        }
    })?;

    if &header[..MAGIC.len()] != MAGIC {
        return Err(TransportError::Protocol("bad magic in frame header".to_string()));
    }

    let len = u32::from_ne_bytes([header[6], header[7], header[8], header[9]]);
    let raw_type = u32::from_ne_bytes([header[10], header[11], header[12], header[13]]);

    if len > MAX_PAYLOAD_LEN {
        return Err(TransportError::Protocol(format!("payload length {len} exceeds limit")));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;

    let kind = if raw_type & EVENT_FLAG == 0 {
        FrameKind::Reply(raw_type)
    } else {
        FrameKind::Event(raw_type & !EVENT_FLAG)
    };

    Ok(Frame { kind, payload })
}

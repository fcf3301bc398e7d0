//! Closed event type decoded from subscription frames.

use super::TransportError;
use super::protocol::EventType;
use super::types::{
    BindingEventPayload, RawNode, ShutdownEventPayload, WindowEventPayload, WorkspaceEventPayload,
};

/// `change` field of a window event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowChange {
    New,
    Close,
    Focus,
    Title,
    FullscreenMode,
    Move,
    Floating,
    Urgent,
    Mark,
    Other(String),
}

impl WindowChange {
    fn parse(change: &str) -> Self {
        match change {
            "new" => Self::New,
            "close" => Self::Close,
            "focus" => Self::Focus,
            "title" => Self::Title,
            "fullscreen_mode" => Self::FullscreenMode,
            "move" => Self::Move,
            "floating" => Self::Floating,
            "urgent" => Self::Urgent,
            "mark" => Self::Mark,
            other => Self::Other(other.to_string()),
        }
    }
}

/// `change` field of a workspace event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceChange {
    Focus,
    Init,
    Empty,
    Rename,
    Move,
    Other(String),
}

impl WorkspaceChange {
    fn parse(change: &str) -> Self {
        match change {
            "focus" => Self::Focus,
            "init" => Self::Init,
            "empty" => Self::Empty,
            "rename" => Self::Rename,
            "move" => Self::Move,
            other => Self::Other(other.to_string()),
        }
    }
}

/// An event from the window manager's subscription stream.
#[derive(Debug, Clone)]
pub enum WmEvent {
    Window {
        change: WindowChange,
        container: Box<RawNode>,
    },
    Workspace {
        change: WorkspaceChange,
        current: Option<Box<RawNode>>,
    },
    Binding {
        command: String,
    },
    Shutdown {
        change: String,
    },
    /// An event type Muscle did not subscribe to or does not model.
    Unknown {
        event_type: u32,
    },
}

impl WmEvent {
    /// Decodes the payload of an event frame.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Json` if a known event carries malformed JSON.
    pub fn decode(event_type: u32, payload: &[u8]) -> Result<Self, TransportError> {
        let event = match event_type {
            t if t == EventType::Window as u32 => {
                let raw: WindowEventPayload = serde_json::from_slice(payload)?;
                Self::Window {
                    change: WindowChange::parse(&raw.change),
                    container: Box::new(raw.container),
                }
            }
            t if t == EventType::Workspace as u32 => {
                let raw: WorkspaceEventPayload = serde_json::from_slice(payload)?;
                Self::Workspace {
                    change: WorkspaceChange::parse(&raw.change),
                    current: raw.current.map(Box::new),
                }
            }
            t if t == EventType::Binding as u32 => {
                let raw: BindingEventPayload = serde_json::from_slice(payload)?;
                tracing::trace!(change = %raw.change, "binding event");
                Self::Binding { command: raw.binding.command }
            }
            t if t == EventType::Shutdown as u32 => {
                let raw: ShutdownEventPayload = serde_json::from_slice(payload)?;
                Self::Shutdown { change: raw.change }
            }
            other => Self::Unknown { event_type: other },
        };
        Ok(event)
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Window { .. } => "window",
            Self::Workspace { .. } => "workspace",
            Self::Binding { .. } => "binding",
            Self::Shutdown { .. } => "shutdown",
            Self::Unknown { .. } => "unknown",
        }
    }
}

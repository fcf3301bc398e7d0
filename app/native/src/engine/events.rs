//! Events as the engine receives them.

use std::time::Instant;

use crate::ipc::WmEvent;

/// An event stamped with the moment the reader thread received it.
///
/// The arrival time, not the processing time, decides whether an event is
/// the echo of a replay: events queue up while a replay runs.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub event: WmEvent,
    pub received_at: Instant,
}

impl EventEnvelope {
    #[must_use]
    pub fn now(event: WmEvent) -> Self {
        Self {
            event,
            received_at: Instant::now(),
        }
    }

    #[must_use]
    pub const fn at(event: WmEvent, received_at: Instant) -> Self { Self { event, received_at } }
}

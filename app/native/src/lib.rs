//! Muscle - layout muscle memory for i3 and sway.
//!
//! The engine watches the window manager's event stream, remembers the
//! layout of each workspace under a fingerprint of its shape, and replays
//! a remembered layout when the same shape shows up again.
//!
//! - [`ipc`] speaks the i3/sway IPC protocol
//! - [`layout`] canonical trees, fingerprints and structural equality
//! - [`store`] the persistent fingerprint store
//! - [`engine`] event classification, snapshots, replays and the actor
//! - [`daemon`] and [`control`] run the engine and expose it on a socket

pub mod cli;
pub mod config;
pub mod constants;
pub mod control;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod layout;
pub mod platform;
pub mod schema;
pub mod store;

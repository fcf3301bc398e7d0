//! The layout engine.
//!
//! [`Engine`] owns the window manager connection, the fingerprint store and
//! the per-scope replay state. It handles one event at a time: classify,
//! then snapshot or restore. The [`actor`] module runs it on its own thread.
//!
//! # Error policy
//!
//! Transport errors end [`Engine::handle`] with a fatal `MuscleError`.
//! Replay aborts and store write failures are logged and the engine keeps
//! going.

pub mod actor;
pub mod classifier;
pub mod events;
pub mod replay;
pub mod restore;
pub mod scope_state;
pub mod snapshot;

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

pub use actor::{ActorError, EngineActor, EngineHandle, EngineMessage};
pub use classifier::{Classification, Classifier, NoiseReason, Triage};
pub use events::EventEnvelope;
pub use restore::{ReplayAbort, RestoreOutcome};
pub use scope_state::{ScopePhase, ScopeStates};
pub use snapshot::{SnapshotError, SnapshotOutcome};

use crate::config::MuscleConfig;
use crate::error::MuscleError;
use crate::ipc::{TransportError, WindowManager};
use crate::layout::{Scope, Tolerance};
use crate::store::FingerprintStore;

/// Tunables the engine reads on every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub tolerance: Tolerance,
    pub match_compatible: bool,
    pub timeout: Duration,
    pub command_limit: usize,
    pub settle_delay: Duration,
    pub grace: Duration,
    pub restore_focus: bool,
}

impl Default for EngineSettings {
    fn default() -> Self { Self::from_config(&MuscleConfig::default()) }
}

impl EngineSettings {
    #[must_use]
    pub fn from_config(config: &MuscleConfig) -> Self {
        Self {
            tolerance: Tolerance::new(config.matching.ratio_buckets),
            match_compatible: config.matching.match_compatible,
            timeout: config.replay.timeout(),
            command_limit: config.replay.command_limit,
            settle_delay: config.replay.settle_delay(),
            grace: config.replay.grace(),
            restore_focus: config.replay.restore_focus,
        }
    }
}

/// What handling one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutcome {
    Noise(NoiseReason),
    /// Classified, but snapshotting and restoring are switched off.
    Disabled(Classification),
    Snapshot { scope: Scope, outcome: SnapshotOutcome },
    /// The snapshot is kept in memory but could not be written.
    SnapshotNotSaved { scope: Scope, error: String },
    Restore(Vec<(Scope, RestoreOutcome)>),
}

/// A scope that is not idle, as reported by `status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusyScope {
    pub scope: Scope,
    #[serde(flatten)]
    pub phase: ScopePhase,
}

/// Snapshot of the engine for `muscle status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub enabled: bool,
    pub store_path: PathBuf,
    pub stored_layouts: usize,
    /// The in-memory store has changes the last save did not write.
    pub unsaved_changes: bool,
    pub events_handled: u64,
    pub snapshots_taken: u64,
    pub replays_run: u64,
    pub busy_scopes: Vec<BusyScope>,
}

/// Layout engine over a window manager `W`.
pub struct Engine<W: WindowManager> {
    wm: W,
    store: FingerprintStore,
    settings: EngineSettings,
    scopes: ScopeStates,
    classifier: Classifier,
    enabled: bool,
    events_handled: u64,
    snapshots_taken: u64,
    replays_run: u64,
}

impl<W: WindowManager> Engine<W> {
    /// Every scope starts `Idle`.
    #[must_use]
    pub fn new(wm: W, store: FingerprintStore, settings: EngineSettings, enabled: bool) -> Self {
        Self {
            wm,
            store,
            settings,
            scopes: ScopeStates::new(),
            classifier: Classifier::new(settings.grace),
            enabled,
            events_handled: 0,
            snapshots_taken: 0,
            replays_run: 0,
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool { self.enabled }

    pub fn enable(&mut self) {
        if !self.enabled {
            tracing::info!("layout engine enabled");
        }
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        if self.enabled {
            tracing::info!("layout engine disabled");
        }
        self.enabled = false;
    }

    #[must_use]
    pub const fn store(&self) -> &FingerprintStore { &self.store }

    #[must_use]
    pub const fn scopes(&self) -> &ScopeStates { &self.scopes }

    /// Handles one event to completion, including any replay it starts.
    ///
    /// # Errors
    ///
    /// Returns a fatal `MuscleError::Transport` if the window manager
    /// connection fails or the manager announces its shutdown.
    pub fn handle(&mut self, envelope: &EventEnvelope) -> Result<EngineOutcome, MuscleError> {
        self.events_handled += 1;

        let triage = match classifier::triage(&envelope.event) {
            Triage::Shutdown { change } => return Err(TransportError::Shutdown(change).into()),
            Triage::Noise(reason) => {
                tracing::trace!(event = envelope.event.name(), ?reason, "ignoring event");
                return Ok(EngineOutcome::Noise(reason));
            }
            candidate => candidate,
        };

        if !self.settings.settle_delay.is_zero() {
            std::thread::sleep(self.settings.settle_delay);
        }
        let tree = self.wm.tree()?;
        let classification = self
            .classifier
            .resolve(triage, envelope.received_at, &tree, &self.scopes);

        tracing::debug!(event = envelope.event.name(), ?classification, "classified event");

        match classification {
            Classification::Noise(reason) => Ok(EngineOutcome::Noise(reason)),
            Classification::Shutdown { change } => Err(TransportError::Shutdown(change).into()),
            _ if !self.enabled => Ok(EngineOutcome::Disabled(classification)),
            Classification::StructuralIntent { scope } => self.on_structural_intent(scope),
            Classification::TopologyChange { scopes } => self.on_topology_change(scopes),
        }
    }

    /// Snapshots `scope`.
    ///
    /// # Errors
    ///
    /// Returns a fatal `MuscleError::Transport` if the tree cannot be read.
    pub fn on_structural_intent(&mut self, scope: Scope) -> Result<EngineOutcome, MuscleError> {
        match snapshot::take_snapshot(&mut self.wm, &mut self.store, &scope, &self.settings) {
            Ok(outcome) => {
                if matches!(outcome, SnapshotOutcome::Stored { .. }) {
                    self.snapshots_taken += 1;
                }
                Ok(EngineOutcome::Snapshot { scope, outcome })
            }
            Err(SnapshotError::Store(err)) => {
                self.snapshots_taken += 1;
                tracing::error!(%scope, error = %err, "snapshot kept in memory, store write failed");
                Ok(EngineOutcome::SnapshotNotSaved {
                    scope,
                    error: err.to_string(),
                })
            }
            Err(SnapshotError::Transport(err)) => Err(err.into()),
        }
    }

    /// Tries to restore each scope in turn.
    ///
    /// # Errors
    ///
    /// Returns a fatal `MuscleError::Transport` on a connection failure.
    pub fn on_topology_change(&mut self, scopes: Vec<Scope>) -> Result<EngineOutcome, MuscleError> {
        let mut outcomes = Vec::with_capacity(scopes.len());
        for scope in scopes {
            let outcome = restore::on_topology_change(
                &mut self.wm,
                &mut self.store,
                &mut self.scopes,
                &scope,
                &self.settings,
            )?;
            if matches!(outcome, RestoreOutcome::Replayed { .. } | RestoreOutcome::Aborted { .. }) {
                self.replays_run += 1;
            }
            outcomes.push((scope, outcome));
        }
        Ok(EngineOutcome::Restore(outcomes))
    }

    /// Forgets any replay marker. Used after a handler panicked.
    pub fn reset_scopes(&mut self) { self.scopes.reset_all(); }

    #[must_use]
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            enabled: self.enabled,
            store_path: self.store.path().to_path_buf(),
            stored_layouts: self.store.len(),
            unsaved_changes: self.store.is_dirty(),
            events_handled: self.events_handled,
            snapshots_taken: self.snapshots_taken,
            replays_run: self.replays_run,
            busy_scopes: self
                .scopes
                .busy()
                .into_iter()
                .map(|(scope, phase)| BusyScope { scope, phase })
                .collect(),
        }
    }

    /// Writes pending store changes and drops the connection.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the final save fails.
    pub fn shutdown(mut self) -> Result<(), crate::store::StoreError> {
        self.scopes.reset_all();
        let result = self.store.flush();
        match &result {
            Ok(()) => tracing::info!(layouts = self.store.len(), "store flushed"),
            Err(err) => tracing::error!(error = %err, "failed to flush store on shutdown"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use tempfile::TempDir;

    use super::*;
    use crate::ipc::fake::{FakeWm, root, window, workspace};
    use crate::ipc::{RawNode, WindowChange, WmEvent};

    fn scope() -> Scope { Scope::new("DP-1", "1") }

    fn settings() -> EngineSettings {
        EngineSettings {
            settle_delay: Duration::ZERO,
            ..EngineSettings::default()
        }
    }

    fn two_pane(left_id: i64, right_id: i64, left: f64, right: f64) -> RawNode {
        let mut tree = root("DP-1", vec![workspace(10, "1", "splith", vec![
            window(left_id, "foot", left),
            window(right_id, "firefox", right),
        ])]);
        tree.nodes[0].nodes[0].nodes[0].focused = true;
        tree
    }

    fn engine(dir: &TempDir, tree: RawNode) -> Engine<FakeWm> {
        let store = FingerprintStore::load(&dir.path().join("layouts.json")).unwrap();
        Engine::new(FakeWm::new(tree), store, settings(), true)
    }

    fn binding(command: &str) -> EventEnvelope {
        EventEnvelope::now(WmEvent::Binding {
            command: command.to_string(),
        })
    }

    fn new_window(id: i64) -> WmEvent {
        WmEvent::Window {
            change: WindowChange::New,
            container: Box::new(window(id, "foot", 0.5)),
        }
    }

    /// Simulates the user resizing, then the manager reporting the binding.
    fn user_resize(engine: &mut Engine<FakeWm>, con_id: i64, percent: u32) -> EngineOutcome {
        let command = format!("resize set width {percent} ppt");
        engine.wm.run_command(&format!("[con_id={con_id}] {command}")).unwrap();
        engine.wm.commands.clear();
        engine.handle(&binding(&command)).unwrap()
    }

    #[test]
    fn test_learn_then_restore_after_reopen() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir, two_pane(11, 12, 0.5, 0.5));

        let outcome = user_resize(&mut engine, 11, 70);
        assert!(matches!(outcome, EngineOutcome::Snapshot {
            outcome: SnapshotOutcome::Stored { replaced: false, .. },
            ..
        }));
        assert_eq!(engine.store().len(), 1);

        // Both windows closed and reopened with fresh ids.
        engine.wm.tree = two_pane(31, 32, 0.5, 0.5);
        let outcome = engine.handle(&EventEnvelope::now(new_window(32))).unwrap();

        let EngineOutcome::Restore(results) = outcome else {
            panic!("expected a restore, got {outcome:?}");
        };
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].1, RestoreOutcome::Replayed { commands: 1, .. }));
        assert_eq!(engine.wm.commands[0], "[con_id=31] resize set width 70 ppt");
        assert_eq!(engine.status().replays_run, 1);
    }

    #[test]
    fn test_unchanged_layout_is_not_written_twice() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir, two_pane(11, 12, 0.5, 0.5));

        user_resize(&mut engine, 11, 70);
        let modified = std::fs::metadata(engine.store().path()).unwrap().modified().unwrap();

        let outcome = engine.handle(&binding("resize set width 70 ppt")).unwrap();
        assert!(matches!(outcome, EngineOutcome::Snapshot {
            outcome: SnapshotOutcome::Unchanged,
            ..
        }));
        assert_eq!(engine.store().len(), 1);
        assert_eq!(std::fs::metadata(engine.store().path()).unwrap().modified().unwrap(), modified);
    }

    #[test]
    fn test_no_snapshot_means_no_commands() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir, two_pane(11, 12, 0.5, 0.5));

        let outcome = engine.handle(&EventEnvelope::now(new_window(12))).unwrap();
        assert_eq!(outcome, EngineOutcome::Restore(vec![(scope(), RestoreOutcome::NoMatch)]));
        assert!(engine.wm.commands.is_empty());
    }

    #[test]
    fn test_events_right_after_replay_are_suppressed() {
        let dir = TempDir::new().unwrap();
        let store = FingerprintStore::load(&dir.path().join("layouts.json")).unwrap();
        let settings = EngineSettings {
            grace: Duration::from_secs(5),
            ..settings()
        };
        let mut engine = Engine::new(FakeWm::new(two_pane(11, 12, 0.5, 0.5)), store, settings, true);
        user_resize(&mut engine, 11, 70);
        engine.wm.tree = two_pane(31, 32, 0.5, 0.5);
        engine.handle(&EventEnvelope::now(new_window(32))).unwrap();

        // The replay's own echo.
        let echo = engine.handle(&binding("resize set width 70 ppt")).unwrap();
        assert_eq!(echo, EngineOutcome::Noise(NoiseReason::SuppressedByReplay));

        // A real edit well after the grace period.
        let later = EventEnvelope::at(
            WmEvent::Binding {
                command: "resize set width 60 ppt".to_string(),
            },
            Instant::now() + Duration::from_secs(10),
        );
        assert!(matches!(engine.handle(&later).unwrap(), EngineOutcome::Snapshot { .. }));
    }

    #[test]
    fn test_other_scopes_are_not_suppressed() {
        let dir = TempDir::new().unwrap();
        let mut tree = root("DP-1", vec![
            workspace(10, "1", "splith", vec![window(11, "foot", 0.5), window(12, "firefox", 0.5)]),
            workspace(20, "2", "splith", vec![window(21, "mpv", 0.5), window(22, "foot", 0.5)]),
        ]);
        tree.nodes[0].nodes[1].nodes[0].focused = true;
        let mut engine = engine(&dir, tree);

        let busy = crate::layout::capture(&mut engine.wm, &scope()).unwrap().unwrap();
        engine.scopes.match_found(&scope(), crate::layout::fingerprint(&busy));
        engine.scopes.start_replay(&scope());

        let outcome = engine.handle(&binding("resize set width 60 ppt")).unwrap();
        assert!(matches!(outcome, EngineOutcome::Snapshot { scope, .. } if scope == Scope::new("DP-1", "2")));
    }

    #[test]
    fn test_disabled_engine_observes_but_does_nothing() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir, two_pane(11, 12, 0.5, 0.5));
        engine.disable();

        let outcome = engine.handle(&binding("resize set width 70 ppt")).unwrap();
        assert!(matches!(outcome, EngineOutcome::Disabled(Classification::StructuralIntent { .. })));
        assert!(engine.store().is_empty());

        engine.enable();
        assert!(matches!(engine.handle(&binding("layout tabbed")).unwrap(), EngineOutcome::Snapshot { .. }));
    }

    #[test]
    fn test_focus_events_never_read_the_tree() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir, two_pane(11, 12, 0.5, 0.5));
        engine.wm.transport_failures.push_back(TransportError::ConnectionClosed);

        let focus = EventEnvelope::now(WmEvent::Window {
            change: WindowChange::Focus,
            container: Box::new(window(12, "firefox", 0.5)),
        });
        assert_eq!(engine.handle(&focus).unwrap(), EngineOutcome::Noise(NoiseReason::Irrelevant));
        assert_eq!(engine.wm.transport_failures.len(), 1);
    }

    #[test]
    fn test_transport_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir, two_pane(11, 12, 0.5, 0.5));
        engine.wm.transport_failures.push_back(TransportError::ConnectionClosed);

        let err = engine.handle(&binding("resize set width 70 ppt")).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_manager_shutdown_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir, two_pane(11, 12, 0.5, 0.5));
        let event = EventEnvelope::now(WmEvent::Shutdown {
            change: "restart".to_string(),
        });
        assert!(engine.handle(&event).unwrap_err().is_fatal());
    }

    #[test]
    fn test_status_and_shutdown_flush() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir, two_pane(11, 12, 0.5, 0.5));
        user_resize(&mut engine, 11, 70);

        let status = engine.status();
        assert!(status.enabled);
        assert_eq!(status.stored_layouts, 1);
        assert_eq!(status.snapshots_taken, 1);
        assert!(status.busy_scopes.is_empty());

        let path = engine.store().path().to_path_buf();
        engine.shutdown().unwrap();
        assert_eq!(FingerprintStore::load(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_settings_follow_config() {
        let mut config = MuscleConfig::default();
        config.matching.ratio_buckets = 0;
        config.replay.timeout_ms = 250;
        let settings = EngineSettings::from_config(&config);
        assert_eq!(settings.tolerance.buckets(), 1);
        assert_eq!(settings.timeout, Duration::from_millis(250));
    }
}

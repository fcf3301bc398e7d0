//! Per-scope replay state machine.
//!
//! `Idle -> MatchFound -> Replaying -> Idle`. Only the engine thread touches
//! it, and a fresh engine starts with every scope `Idle`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::layout::{Fingerprint, Scope};

/// Where a scope is in the replay cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum ScopePhase {
    Idle,
    MatchFound { fingerprint: Fingerprint },
    Replaying { fingerprint: Fingerprint },
}

/// State of one scope.
#[derive(Debug, Clone)]
pub struct ScopeState {
    pub phase: ScopePhase,
    /// When the last replay for this scope ended, successfully or not.
    pub last_replay_finished: Option<Instant>,
}

impl Default for ScopeState {
    fn default() -> Self {
        Self {
            phase: ScopePhase::Idle,
            last_replay_finished: None,
        }
    }
}

impl ScopeState {
    /// Whether an event that arrived at `received_at` belongs to a replay.
    #[must_use]
    pub fn suppresses(&self, received_at: Instant, grace: Duration) -> bool {
        if self.phase != ScopePhase::Idle {
            return true;
        }
        self.last_replay_finished
            .is_some_and(|finished| received_at <= finished + grace)
    }
}

/// Replay state of every scope the engine has touched.
#[derive(Debug, Default)]
pub struct ScopeStates {
    states: HashMap<Scope, ScopeState>,
}

impl ScopeStates {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn phase(&self, scope: &Scope) -> ScopePhase {
        self.states
            .get(scope)
            .map_or(ScopePhase::Idle, |state| state.phase.clone())
    }

    #[must_use]
    pub fn is_idle(&self, scope: &Scope) -> bool { self.phase(scope) == ScopePhase::Idle }

    /// Whether an event for `scope` arriving at `received_at` must be ignored.
    #[must_use]
    pub fn suppresses(&self, scope: &Scope, received_at: Instant, grace: Duration) -> bool {
        self.states
            .get(scope)
            .is_some_and(|state| state.suppresses(received_at, grace))
    }

    /// `Idle -> MatchFound`.
    pub fn match_found(&mut self, scope: &Scope, fingerprint: Fingerprint) {
        self.states.entry(scope.clone()).or_default().phase = ScopePhase::MatchFound { fingerprint };
    }

    /// `MatchFound -> Replaying`.
    pub fn start_replay(&mut self, scope: &Scope) {
        let state = self.states.entry(scope.clone()).or_default();
        if let ScopePhase::MatchFound { fingerprint } = &state.phase {
            state.phase = ScopePhase::Replaying {
                fingerprint: fingerprint.clone(),
            };
        }
    }

    /// Back to `Idle` after a replay ran (or was aborted) at `finished`.
    pub fn finish_replay(&mut self, scope: &Scope, finished: Instant) {
        let state = self.states.entry(scope.clone()).or_default();
        state.phase = ScopePhase::Idle;
        state.last_replay_finished = Some(finished);
    }

    /// Back to `Idle` without a replay having touched the manager.
    pub fn abandon(&mut self, scope: &Scope) {
        if let Some(state) = self.states.get_mut(scope) {
            state.phase = ScopePhase::Idle;
        }
    }

    /// Forces every scope to `Idle`, keeping the replay timestamps.
    pub fn reset_all(&mut self) {
        for state in self.states.values_mut() {
            state.phase = ScopePhase::Idle;
        }
    }

    /// Scopes that are not `Idle`.
    #[must_use]
    pub fn busy(&self) -> Vec<(Scope, ScopePhase)> {
        let mut busy: Vec<_> = self
            .states
            .iter()
            .filter(|(_, state)| state.phase != ScopePhase::Idle)
            .map(|(scope, state)| (scope.clone(), state.phase.clone()))
            .collect();
        busy.sort_by(|a, b| a.0.cmp(&b.0));
        busy
    }
}

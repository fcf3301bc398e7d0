//! Restoration engine: replay a remembered layout onto a live scope.
//!
//! A replay runs to completion or aborts at a checkpoint between commands.
//! Before each command the scope is re-read: a referenced container that has
//! disappeared, an elapsed deadline or a rejected command ends the replay.
//! Aborts are local; transport errors propagate.

use std::time::{Duration, Instant};

use serde::Serialize;

use super::EngineSettings;
use super::replay::{PlanError, ReplayCommand, plan};
use super::scope_state::ScopeStates;
use crate::ipc::{CommandOutcome, RawNode, TransportError, WindowManager};
use crate::layout::{
    Fingerprint, LayoutTree, Scope, arity_fingerprint, equals_structurally, fingerprint,
};
use crate::store::{FingerprintStore, StoreKey};

/// Non-fatal reasons a replay stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum ReplayAbort {
    #[error("container {con_id} vanished during replay")]
    WindowVanished { con_id: i64 },

    #[error("replay did not finish within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("window manager rejected `{command}`: {reason}")]
    CommandRejected { command: String, reason: String },
}

/// How far an executed plan got.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    pub sent: usize,
    pub abort: Option<ReplayAbort>,
}

/// What a topology change led to for one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum RestoreOutcome {
    /// The scope has no tiled windows.
    Empty,
    /// A replay for the scope is already running.
    Busy,
    /// Nothing stored for this shape.
    NoMatch,
    /// The live layout already matches.
    AlreadyMatching { fingerprint: Fingerprint },
    /// The stored layout cannot be planned onto the live one.
    Refused {
        fingerprint: Fingerprint,
        #[serde(serialize_with = "display")]
        error: PlanError,
    },
    Replayed { fingerprint: Fingerprint, commands: usize },
    Aborted {
        fingerprint: Fingerprint,
        sent: usize,
        error: ReplayAbort,
    },
}

fn display<T: std::fmt::Display, S: serde::Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Looks up the live shape of `scope` and replays the stored layout.
///
/// # Errors
///
/// Returns a `TransportError` if the manager connection fails.
pub fn on_topology_change<W: WindowManager + ?Sized>(
    wm: &mut W,
    store: &mut FingerprintStore,
    states: &mut ScopeStates,
    scope: &Scope,
    settings: &EngineSettings,
) -> Result<RestoreOutcome, TransportError> {
    if !states.is_idle(scope) {
        return Ok(RestoreOutcome::Busy);
    }

    let raw = wm.tree()?;
    let Some(live) = LayoutTree::from_raw(&raw, scope) else {
        return Ok(RestoreOutcome::Empty);
    };

    let Some((key, stored)) = lookup(store, &live, settings) else {
        tracing::debug!(%scope, fingerprint = %fingerprint(&live).short(), "no stored layout for shape");
        return Ok(RestoreOutcome::NoMatch);
    };
    let matched = key.fingerprint.clone();

    if equals_structurally(&live, &stored, settings.tolerance) {
        store.touch(&key);
        return Ok(RestoreOutcome::AlreadyMatching { fingerprint: matched });
    }

    states.match_found(scope, matched.clone());
    let commands = match plan(&live, &stored, settings.tolerance, settings.command_limit) {
        Ok(commands) if commands.is_empty() => {
            states.abandon(scope);
            store.touch(&key);
            return Ok(RestoreOutcome::AlreadyMatching { fingerprint: matched });
        }
        Ok(commands) => commands,
        Err(error) => {
            states.abandon(scope);
            tracing::warn!(%scope, %error, "not replaying stored layout");
            return Ok(RestoreOutcome::Refused {
                fingerprint: matched,
                error,
            });
        }
    };

    states.start_replay(scope);
    tracing::info!(%scope, fingerprint = %matched.short(), commands = commands.len(), "replaying layout");

    let result = run_replay(wm, scope, &commands, raw.focused_id(), settings);
    states.finish_replay(scope, Instant::now());
    let report = result?;

    if let Some(error) = report.abort {
        tracing::warn!(%scope, %error, sent = report.sent, "replay aborted");
        return Ok(RestoreOutcome::Aborted {
            fingerprint: matched,
            sent: report.sent,
            error,
        });
    }

    store.touch(&key);
    Ok(RestoreOutcome::Replayed {
        fingerprint: matched,
        commands: report.sent,
    })
}

/// Replays `target` onto `scope` without consulting the store.
///
/// Used for layouts saved to a file. The same planner, limits and abort
/// rules apply; the result is never stored.
///
/// # Errors
///
/// Returns a `TransportError` if the manager connection fails.
pub fn apply_layout<W: WindowManager + ?Sized>(
    wm: &mut W,
    scope: &Scope,
    target: &LayoutTree,
    settings: &EngineSettings,
) -> Result<RestoreOutcome, TransportError> {
    let raw = wm.tree()?;
    let Some(live) = LayoutTree::from_raw(&raw, scope) else {
        return Ok(RestoreOutcome::Empty);
    };
    let wanted = fingerprint(target);

    if equals_structurally(&live, target, settings.tolerance) {
        return Ok(RestoreOutcome::AlreadyMatching { fingerprint: wanted });
    }
    let commands = match plan(&live, target, settings.tolerance, settings.command_limit) {
        Ok(commands) if commands.is_empty() => {
            return Ok(RestoreOutcome::AlreadyMatching { fingerprint: wanted });
        }
        Ok(commands) => commands,
        Err(error) => {
            return Ok(RestoreOutcome::Refused {
                fingerprint: wanted,
                error,
            });
        }
    };

    let report = run_replay(wm, scope, &commands, raw.focused_id(), settings)?;
    Ok(match report.abort {
        Some(error) => RestoreOutcome::Aborted {
            fingerprint: wanted,
            sent: report.sent,
            error,
        },
        None => RestoreOutcome::Replayed {
            fingerprint: wanted,
            commands: report.sent,
        },
    })
}

/// Executes `commands` and, if they all ran, focuses `focused` again.
///
/// # Errors
///
/// Returns a `TransportError` if the manager connection fails.
pub fn run_replay<W: WindowManager + ?Sized>(
    wm: &mut W,
    scope: &Scope,
    commands: &[ReplayCommand],
    focused: Option<i64>,
    settings: &EngineSettings,
) -> Result<ReplayReport, TransportError> {
    let report = execute(wm, scope, commands, settings.timeout)?;

    if report.abort.is_none()
        && settings.restore_focus
        && let Some(con_id) = focused
    {
        let command = ReplayCommand::Focus { con_id }.to_ipc();
        if let CommandOutcome::Rejected(reason) = wm.run_command(&command)? {
            tracing::debug!(con_id, %reason, "could not restore focus");
        }
    }
    Ok(report)
}

/// Runs commands one at a time with a checkpoint before each.
///
/// # Errors
///
/// Returns a `TransportError` if the manager connection fails.
pub fn execute<W: WindowManager + ?Sized>(
    wm: &mut W,
    scope: &Scope,
    commands: &[ReplayCommand],
    timeout: Duration,
) -> Result<ReplayReport, TransportError> {
    let started = Instant::now();

    for (sent, command) in commands.iter().enumerate() {
        let abort = |abort| Ok(ReplayReport { sent, abort: Some(abort) });

        if started.elapsed() >= timeout {
            return abort(ReplayAbort::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }

        let raw = wm.tree()?;
        if let Some(con_id) = first_missing(&raw, scope, command) {
            return abort(ReplayAbort::WindowVanished { con_id });
        }

        let text = command.to_ipc();
        if let CommandOutcome::Rejected(reason) = wm.run_command(&text)? {
            return abort(ReplayAbort::CommandRejected {
                command: text,
                reason,
            });
        }
    }

    Ok(ReplayReport {
        sent: commands.len(),
        abort: None,
    })
}

fn first_missing(raw: &RawNode, scope: &Scope, command: &ReplayCommand) -> Option<i64> {
    let workspace = raw
        .workspaces()
        .into_iter()
        .find(|(output, ws)| *output == scope.output && ws.name() == scope.workspace)
        .map(|(_, ws)| ws);

    command
        .references()
        .into_iter()
        .find(|id| workspace.is_none_or(|ws| ws.find(*id).is_none()))
}

fn lookup(
    store: &FingerprintStore,
    live: &LayoutTree,
    settings: &EngineSettings,
) -> Option<(StoreKey, LayoutTree)> {
    let key = StoreKey::new(live.scope.clone(), fingerprint(live));
    if let Some(stored) = store.get(&key) {
        return Some((key, stored.tree.clone()));
    }
    if !settings.match_compatible {
        return None;
    }
    store
        .find_compatible(&live.scope, &arity_fingerprint(live))
        .map(|(key, stored)| (key.clone(), stored.tree.clone()))
}

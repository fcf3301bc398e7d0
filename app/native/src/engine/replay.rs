//! Replay planning: the commands that turn a live layout into a stored one.
//!
//! Plans need both trees to have the same shape once container kinds are
//! ignored. Commands are ordered container first: `layout` changes, then
//! leaf placement with `swap`, then `resize` for splits whose shares differ.

use std::fmt;

use crate::layout::fingerprint::shares_equal;
use crate::layout::{LayoutNode, LayoutTree, NodeKind, Tolerance, arity_fingerprint};

/// Smallest and largest share a `resize set` is allowed to request.
const MIN_PERCENT: u32 = 5;
const MAX_PERCENT: u32 = 95;

/// Errors building a plan. No command has been sent when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("live layout does not have the shape of the stored layout")]
    ShapeMismatch,

    #[error("replay needs {needed} commands, the limit is {limit}")]
    TooLong { needed: usize, limit: usize },

    #[error("live layout is missing a container id")]
    MissingConId,
}

/// One command of a replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayCommand {
    /// Sets the kind of the parent of `con_id`, the way i3 and sway apply
    /// `layout` to the enclosing container of the match.
    Layout { con_id: i64, kind: NodeKind },
    Swap { con_id: i64, with: i64 },
    Resize {
        con_id: i64,
        dimension: &'static str,
        percent: u32,
    },
    Focus { con_id: i64 },
}

impl ReplayCommand {
    /// Command text for `RUN_COMMAND`.
    #[must_use]
    pub fn to_ipc(&self) -> String {
        match self {
            Self::Layout { con_id, kind } => {
                format!("[con_id={con_id}] layout {}", kind.layout_arg().unwrap_or("default"))
            }
            Self::Swap { con_id, with } => format!("[con_id={con_id}] swap container with con_id {with}"),
            Self::Resize {
                con_id,
                dimension,
                percent,
            } => format!("[con_id={con_id}] resize set {dimension} {percent} ppt"),
            Self::Focus { con_id } => format!("[con_id={con_id}] focus"),
        }
    }

    /// Live containers this command needs to exist.
    #[must_use]
    pub fn references(&self) -> Vec<i64> {
        match self {
            Self::Layout { con_id, .. } | Self::Resize { con_id, .. } | Self::Focus { con_id } => {
                vec![*con_id]
            }
            Self::Swap { con_id, with } => vec![*con_id, *with],
        }
    }
}

impl fmt::Display for ReplayCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.to_ipc()) }
}

/// Builds the command sequence that moves `live` toward `target`.
///
/// # Errors
///
/// Returns `PlanError::ShapeMismatch` if the shapes differ,
/// `PlanError::TooLong` if more than `limit` commands would be needed, and
/// `PlanError::MissingConId` if `live` was not captured from the manager.
pub fn plan(
    live: &LayoutTree,
    target: &LayoutTree,
    tolerance: Tolerance,
    limit: usize,
) -> Result<Vec<ReplayCommand>, PlanError> {
    if arity_fingerprint(live) != arity_fingerprint(target) {
        return Err(PlanError::ShapeMismatch);
    }

    let mut commands = Vec::new();
    plan_layouts(&live.root, &target.root, &mut commands)?;

    let occupants = plan_placement(&live.root, &target.root, &mut commands)?;

    let mut leaf_slot = 0;
    plan_resizes(&live.root, &target.root, tolerance, &occupants, &mut leaf_slot, &mut commands)?;

    if commands.len() > limit {
        return Err(PlanError::TooLong {
            needed: commands.len(),
            limit,
        });
    }
    Ok(commands)
}

fn con_id(node: &LayoutNode) -> Result<i64, PlanError> { node.con_id.ok_or(PlanError::MissingConId) }

fn plan_layouts(
    live: &LayoutNode,
    target: &LayoutNode,
    commands: &mut Vec<ReplayCommand>,
) -> Result<(), PlanError> {
    if live.is_leaf() {
        return Ok(());
    }
    if live.kind != target.kind {
        commands.push(ReplayCommand::Layout {
            con_id: live.layout_con_id.ok_or(PlanError::MissingConId)?,
            kind: target.kind,
        });
    }
    for (live_child, target_child) in live.children.iter().zip(&target.children) {
        plan_layouts(live_child, target_child, commands)?;
    }
    Ok(())
}

/// Assigns live windows to the stored leaf slots by hint and emits the
/// swaps that realise it. Returns the window in each slot afterwards.
fn plan_placement(
    live: &LayoutNode,
    target: &LayoutNode,
    commands: &mut Vec<ReplayCommand>,
) -> Result<Vec<i64>, PlanError> {
    let live_leaves = live.leaves();
    let target_leaves = target.leaves();
    let mut current: Vec<i64> = live_leaves.iter().map(|leaf| con_id(leaf)).collect::<Result<_, _>>()?;

    let slots = target_leaves.len();
    let mut assigned: Vec<Option<usize>> = vec![None; slots];
    let mut taken = vec![false; live_leaves.len()];

    // Same slot, same hint.
    for slot in 0..slots {
        if target_leaves[slot].hint.is_some() && live_leaves[slot].hint == target_leaves[slot].hint {
            assigned[slot] = Some(slot);
            taken[slot] = true;
        }
    }
    // First free window with the slot's hint.
    for slot in 0..slots {
        if assigned[slot].is_some() || target_leaves[slot].hint.is_none() {
            continue;
        }
        if let Some(window) = (0..live_leaves.len())
            .find(|&window| !taken[window] && live_leaves[window].hint == target_leaves[slot].hint)
        {
            assigned[slot] = Some(window);
            taken[window] = true;
        }
    }
    // Leftovers in order.
    for slot in 0..slots {
        if assigned[slot].is_none()
            && let Some(window) = (0..live_leaves.len()).find(|&window| !taken[window])
        {
            assigned[slot] = Some(window);
            taken[window] = true;
        }
    }

    for (slot, window) in assigned.iter().enumerate() {
        let Some(window) = window else { continue };
        let desired = con_id(live_leaves[*window])?;
        if current[slot] == desired {
            continue;
        }
        let Some(from) = current.iter().position(|&id| id == desired) else {
            continue;
        };
        commands.push(ReplayCommand::Swap {
            con_id: current[slot],
            with: desired,
        });
        current.swap(slot, from);
    }

    Ok(current)
}

fn plan_resizes(
    live: &LayoutNode,
    target: &LayoutNode,
    tolerance: Tolerance,
    occupants: &[i64],
    leaf_slot: &mut usize,
    commands: &mut Vec<ReplayCommand>,
) -> Result<(), PlanError> {
    if live.is_leaf() {
        *leaf_slot += 1;
        return Ok(());
    }

    if let Some(dimension) = target.kind.resize_dimension()
        && (live.kind != target.kind || !shares_equal(live, target, tolerance))
    {
        let shares = target.child_shares();
        let mut slot = *leaf_slot;
        for (index, child) in live.children.iter().enumerate() {
            let id = if child.is_leaf() {
                occupants.get(slot).copied().ok_or(PlanError::ShapeMismatch)?
            } else {
                con_id(child)?
            };
            slot += child.leaves().len();

            if index + 1 == live.children.len() {
                break;
            }
            commands.push(ReplayCommand::Resize {
                con_id: id,
                dimension,
                percent: to_percent(shares[index]),
            });
        }
    }

    for (live_child, target_child) in live.children.iter().zip(&target.children) {
        plan_resizes(live_child, target_child, tolerance, occupants, leaf_slot, commands)?;
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_percent(share: f64) -> u32 { ((share * 100.0).round() as u32).clamp(MIN_PERCENT, MAX_PERCENT) }

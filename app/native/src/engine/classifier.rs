//! Event classification.
//!
//! Classification runs in two steps. [`triage`] looks only at the event and
//! decides whether it could matter and which scopes it would touch.
//! [`Classifier::resolve`] turns those targets into concrete scopes against
//! the live tree, checks replay suppression for them, and only then assigns
//! the intent.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;

use super::events::EventEnvelope;
use super::scope_state::ScopeStates;
use crate::ipc::{RawNode, WindowChange, WmEvent, WorkspaceChange};
use crate::layout::Scope;

/// `move [window|container] [to] workspace [number] NAME`
static MOVE_TO_WORKSPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^move\s+(?:--\S+\s+)*(?:(?:window|container)\s+)?(?:to\s+)?workspace\s+(?:--\S+\s+)*(?:number\s+)?(.+)$",
    )
    .expect("move-to-workspace pattern is valid")
});

/// `move [window|container] [to] output NAME`
static MOVE_TO_OUTPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^move\s+(?:--\S+\s+)*(?:(?:window|container)\s+)?(?:to\s+)?output\s+(\S+)")
        .expect("move-to-output pattern is valid")
});

/// `move workspace to [output] NAME`
static MOVE_WORKSPACE_TO_OUTPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^move\s+workspace\s+to\s+(?:output\s+)?\S+").expect("move-workspace pattern is valid")
});

/// `move [window|container] [to] scratchpad`
static MOVE_TO_SCRATCHPAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^move\s+(?:(?:window|container)\s+)?(?:to\s+)?scratchpad\b")
        .expect("move-to-scratchpad pattern is valid")
});

/// `move [window|container] [to] mark NAME` or `move [N px] left|right|up|down`
static MOVE_STRUCTURAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^move\s+(?:(?:window|container)\s+)?(?:(?:to\s+)?mark\s+\S+|(?:left|right|up|down)\b)")
        .expect("structural move pattern is valid")
});

/// Leading `[criteria]` blocks.
static CRITERIA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\[[^\]]*\]\s*)*").expect("criteria pattern is valid"));

/// Workspace names that cannot be resolved from the command text.
const RELATIVE_WORKSPACES: &[&str] =
    &["next", "prev", "next_on_output", "prev_on_output", "back_and_forth", "current"];

/// Why an event was ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoiseReason {
    /// The event kind never affects layouts (focus, title, ...).
    Irrelevant,
    /// The event touches a scope that is replaying or just finished.
    SuppressedByReplay,
    /// None of the scopes the event names exist in the live tree.
    UnresolvedScope,
    /// An event type outside the modelled set.
    Unknown,
}

/// What the engine should do with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A deliberate layout edit: snapshot this scope.
    StructuralIntent { scope: Scope },
    /// Window/workspace membership changed: try to restore these scopes.
    TopologyChange { scopes: Vec<Scope> },
    Noise(NoiseReason),
    /// The manager is going away.
    Shutdown { change: String },
}

/// Kind of a candidate event before suppression is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Structural,
    Topology,
}

/// A scope named by an event, not yet resolved against the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Focused,
    Container(i64),
    Workspace(String),
    VisibleOn(String),
}

/// Result of looking at an event alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Triage {
    Noise(NoiseReason),
    Candidate { intent: Intent, targets: Vec<Target> },
    Shutdown { change: String },
}

impl Triage {
    /// Only candidates need the live tree.
    #[must_use]
    pub const fn needs_tree(&self) -> bool { matches!(self, Self::Candidate { .. }) }
}

/// Decides from the event alone whether it can matter.
#[must_use]
pub fn triage(event: &WmEvent) -> Triage {
    match event {
        WmEvent::Window { change, container } => match change {
            WindowChange::New | WindowChange::Floating => Triage::Candidate {
                intent: Intent::Topology,
                targets: vec![Target::Container(container.id)],
            },
            // The container is gone from the tree; it was on the focused workspace.
            WindowChange::Close => Triage::Candidate {
                intent: Intent::Topology,
                targets: vec![Target::Focused],
            },
            _ => Triage::Noise(NoiseReason::Irrelevant),
        },
        WmEvent::Workspace { change: WorkspaceChange::Move, current } => Triage::Candidate {
            intent: Intent::Topology,
            targets: vec![current.as_ref().map_or(Target::Focused, |ws| Target::Container(ws.id))],
        },
        WmEvent::Workspace { .. } => Triage::Noise(NoiseReason::Irrelevant),
        WmEvent::Binding { command } => triage_binding(command),
        WmEvent::Shutdown { change } => Triage::Shutdown { change: change.clone() },
        WmEvent::Unknown { .. } => Triage::Noise(NoiseReason::Unknown),
    }
}

/// Classifies the command of a key binding.
///
/// Commands are split on `;` and `,`. Any topology sub-command makes the
/// whole binding a topology change.
#[must_use]
pub fn triage_binding(command: &str) -> Triage {
    let mut structural = false;
    let mut targets = Vec::new();

    for part in command.split([';', ',']) {
        match sub_command(strip_criteria(part)) {
            Some(SubCommand::Topology(mut found)) => targets.append(&mut found),
            Some(SubCommand::Structural) => structural = true,
            None => {}
        }
    }

    if !targets.is_empty() {
        dedup(&mut targets);
        return Triage::Candidate {
            intent: Intent::Topology,
            targets,
        };
    }
    if structural {
        return Triage::Candidate {
            intent: Intent::Structural,
            targets: vec![Target::Focused],
        };
    }
    Triage::Noise(NoiseReason::Irrelevant)
}

enum SubCommand {
    Topology(Vec<Target>),
    Structural,
}

fn sub_command(part: &str) -> Option<SubCommand> {
    let verb = part.split_whitespace().next()?;
    match verb {
        "resize" | "layout" | "swap" | "split" | "splith" | "splitv" | "splitt" => {
            Some(SubCommand::Structural)
        }
        "move" => move_command(part),
        _ => None,
    }
}

fn move_command(part: &str) -> Option<SubCommand> {
    if MOVE_WORKSPACE_TO_OUTPUT.is_match(part) {
        return Some(SubCommand::Topology(vec![Target::Focused]));
    }
    if let Some(caps) = MOVE_TO_WORKSPACE.captures(part) {
        let mut targets = vec![Target::Focused];
        let name = caps.get(1).map_or("", |m| m.as_str()).trim();
        if !name.is_empty() && !RELATIVE_WORKSPACES.contains(&name) {
            targets.push(Target::Workspace(name.to_string()));
        }
        return Some(SubCommand::Topology(targets));
    }
    if let Some(caps) = MOVE_TO_OUTPUT.captures(part) {
        let mut targets = vec![Target::Focused];
        if let Some(output) = caps.get(1) {
            targets.push(Target::VisibleOn(output.as_str().to_string()));
        }
        return Some(SubCommand::Topology(targets));
    }
    if MOVE_TO_SCRATCHPAD.is_match(part) {
        return Some(SubCommand::Topology(vec![Target::Focused]));
    }
    if MOVE_STRUCTURAL.is_match(part) {
        return Some(SubCommand::Structural);
    }
    None
}

fn strip_criteria(part: &str) -> &str {
    let start = CRITERIA.find(part).map_or(0, |m| m.end());
    part[start..].trim()
}

fn dedup<T: PartialEq>(items: &mut Vec<T>) {
    let mut unique: Vec<T> = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    *items = unique;
}

/// Resolves targets and applies replay suppression.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    grace: Duration,
}

impl Classifier {
    #[must_use]
    pub const fn new(grace: Duration) -> Self { Self { grace } }

    /// Classifies an event in one go. `tree` is only read for candidates.
    #[must_use]
    pub fn classify(
        &self,
        envelope: &EventEnvelope,
        tree: &RawNode,
        states: &ScopeStates,
    ) -> Classification {
        self.resolve(triage(&envelope.event), envelope.received_at, tree, states)
    }

    /// Turns a triage result into a classification.
    ///
    /// Suppression is decided before the intent is looked at.
    #[must_use]
    pub fn resolve(
        &self,
        triage: Triage,
        received_at: Instant,
        tree: &RawNode,
        states: &ScopeStates,
    ) -> Classification {
        let (intent, targets) = match triage {
            Triage::Noise(reason) => return Classification::Noise(reason),
            Triage::Shutdown { change } => return Classification::Shutdown { change },
            Triage::Candidate { intent, targets } => (intent, targets),
        };

        let mut scopes: Vec<Scope> = targets
            .iter()
            .filter_map(|target| resolve_target(target, tree))
            .collect();
        dedup(&mut scopes);

        if scopes
            .iter()
            .any(|scope| states.suppresses(scope, received_at, self.grace))
        {
            return Classification::Noise(NoiseReason::SuppressedByReplay);
        }

        match intent {
            _ if scopes.is_empty() => Classification::Noise(NoiseReason::UnresolvedScope),
            Intent::Structural => Classification::StructuralIntent {
                scope: scopes.swap_remove(0),
            },
            Intent::Topology => Classification::TopologyChange { scopes },
        }
    }
}

fn resolve_target(target: &Target, tree: &RawNode) -> Option<Scope> {
    match target {
        Target::Focused => Scope::focused(tree),
        Target::Container(id) => Scope::containing(tree, *id),
        Target::Workspace(name) => Scope::named(tree, name),
        Target::VisibleOn(output) => Scope::visible_on(tree, output),
    }
}

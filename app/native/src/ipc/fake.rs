//! Scripted in-memory window manager for unit tests.

use std::collections::VecDeque;

use super::types::RawNode;
use super::{CommandOutcome, TransportError, WindowManager};

/// A client window.
pub fn window(id: i64, app_id: &str, percent: f64) -> RawNode {
    RawNode {
        id,
        node_type: "con".to_string(),
        layout: "splith".to_string(),
        percent: Some(percent),
        app_id: Some(app_id.to_string()),
        ..RawNode::default()
    }
}

/// A split/tabbed/stacked container.
pub fn container(id: i64, layout: &str, percent: f64, nodes: Vec<RawNode>) -> RawNode {
    RawNode {
        id,
        node_type: "con".to_string(),
        layout: layout.to_string(),
        percent: Some(percent),
        nodes,
        ..RawNode::default()
    }
}

/// A workspace.
pub fn workspace(id: i64, name: &str, layout: &str, nodes: Vec<RawNode>) -> RawNode {
    RawNode {
        id,
        name: Some(name.to_string()),
        node_type: "workspace".to_string(),
        layout: layout.to_string(),
        nodes,
        ..RawNode::default()
    }
}

/// A root with one output holding `workspaces`; the first one is visible.
pub fn root(output: &str, workspaces: Vec<RawNode>) -> RawNode {
    let focus = workspaces.first().map(|ws| vec![ws.id]).unwrap_or_default();
    RawNode {
        id: 1,
        node_type: "root".to_string(),
        name: Some("root".to_string()),
        nodes: vec![RawNode {
            id: 2,
            node_type: "output".to_string(),
            name: Some(output.to_string()),
            focus,
            nodes: workspaces,
            ..RawNode::default()
        }],
        ..RawNode::default()
    }
}

/// In-memory window manager that understands the commands the replay
/// planner emits and records everything it runs.
#[derive(Default)]
pub struct FakeWm {
    pub tree: RawNode,
    pub commands: Vec<String>,
    /// Commands containing this text are rejected.
    pub reject_containing: Option<String>,
    /// After this many commands, remove the given container.
    pub vanish: Option<(usize, i64)>,
    /// Queued transport failures, one per call.
    pub transport_failures: VecDeque<TransportError>,
}

impl FakeWm {
    pub fn new(tree: RawNode) -> Self {
        Self {
            tree,
            ..Self::default()
        }
    }

    pub fn set_focus(&mut self, id: i64) { set_focus(&mut self.tree, id); }

    fn apply(&mut self, command: &str) -> CommandOutcome {
        let (con_id, action) = split_criteria(command);
        let Some(con_id) = con_id else {
            return CommandOutcome::Rejected(format!("unsupported command: {command}"));
        };
        match self.tree.find(con_id) {
            Some(node) if node.node_type != "workspace" => {}
            _ => return CommandOutcome::Rejected("No window matches given criteria".to_string()),
        }

        let words: Vec<&str> = action.split_whitespace().collect();
        match words.as_slice() {
            ["swap", "container", "with", "con_id", other] => match other.parse::<i64>() {
                Ok(other) if self.tree.find(other).is_some() => {
                    swap(&mut self.tree, con_id, other);
                    CommandOutcome::Success
                }
                _ => CommandOutcome::Rejected("swap target not found".to_string()),
            },
            ["resize", "set", dimension, amount, "ppt"] => {
                let Ok(amount) = amount.parse::<f64>() else {
                    return CommandOutcome::Rejected("bad amount".to_string());
                };
                let orientation = if *dimension == "width" { "splith" } else { "splitv" };
                resize(&mut self.tree, con_id, orientation, amount / 100.0);
                CommandOutcome::Success
            }
            ["layout", layout] => {
                let layout = if *layout == "stacking" { "stacked" } else { layout };
                if let Some(parent) = parent_mut(&mut self.tree, con_id) {
                    parent.layout = layout.to_string();
                }
                CommandOutcome::Success
            }
            ["focus"] => {
                set_focus(&mut self.tree, con_id);
                CommandOutcome::Success
            }
            _ => CommandOutcome::Rejected(format!("unsupported command: {command}")),
        }
    }
}

impl WindowManager for FakeWm {
    fn tree(&mut self) -> Result<RawNode, TransportError> {
        if let Some(err) = self.transport_failures.pop_front() {
            return Err(err);
        }
        Ok(self.tree.clone())
    }

    fn run_command(&mut self, command: &str) -> Result<CommandOutcome, TransportError> {
        if let Some(err) = self.transport_failures.pop_front() {
            return Err(err);
        }
        self.commands.push(command.to_string());

        let outcome = match &self.reject_containing {
            Some(needle) if command.contains(needle.as_str()) => {
                CommandOutcome::Rejected("rejected by test".to_string())
            }
            _ => self.apply(command),
        };

        if let Some((after, id)) = self.vanish
            && self.commands.len() >= after
        {
            remove(&mut self.tree, id);
            self.vanish = None;
        }
        Ok(outcome)
    }
}

fn split_criteria(command: &str) -> (Option<i64>, &str) {
    let Some(rest) = command.strip_prefix("[con_id=") else {
        return (None, command);
    };
    let Some((id, action)) = rest.split_once(']') else {
        return (None, command);
    };
    (id.parse().ok(), action.trim())
}

/// The container holding `id`; `layout` changes this one, never `id` itself.
fn parent_mut(node: &mut RawNode, id: i64) -> Option<&mut RawNode> {
    if node.nodes.iter().any(|child| child.id == id) {
        return Some(node);
    }
    node.nodes.iter_mut().find_map(|child| parent_mut(child, id))
}

fn set_focus(node: &mut RawNode, id: i64) {
    node.focused = node.id == id;
    for child in &mut node.nodes {
        set_focus(child, id);
    }
}

fn remove(node: &mut RawNode, id: i64) -> bool {
    if let Some(pos) = node.nodes.iter().position(|child| child.id == id) {
        node.nodes.remove(pos);
        let share = 1.0 / node.nodes.len().max(1) as f64;
        for child in &mut node.nodes {
            child.percent = Some(share);
        }
        return true;
    }
    node.nodes.iter_mut().any(|child| remove(child, id))
}

/// Exchanges two nodes; each position keeps its size.
fn swap(tree: &mut RawNode, a: i64, b: i64) {
    let (Some(path_a), Some(path_b)) = (path_to(tree, a), path_to(tree, b)) else {
        return;
    };
    if path_a.starts_with(&path_b) || path_b.starts_with(&path_a) {
        return;
    }
    let node_a = node_at(tree, &path_a).clone();
    let node_b = node_at(tree, &path_b).clone();

    let slot_a = node_at(tree, &path_a);
    *slot_a = RawNode { percent: slot_a.percent, ..node_b };
    let slot_b = node_at(tree, &path_b);
    *slot_b = RawNode { percent: slot_b.percent, ..node_a };
}

fn path_to(node: &RawNode, id: i64) -> Option<Vec<usize>> {
    if node.id == id {
        return Some(Vec::new());
    }
    node.nodes.iter().enumerate().find_map(|(i, child)| {
        path_to(child, id).map(|mut path| {
            path.insert(0, i);
            path
        })
    })
}

fn node_at<'a>(node: &'a mut RawNode, path: &[usize]) -> &'a mut RawNode {
    path.iter().fold(node, |current, &i| &mut current.nodes[i])
}

/// Sets the share of the nearest ancestor-or-self of `id` inside a parent
/// with `orientation`, scaling the siblings into the remainder.
fn resize(node: &mut RawNode, id: i64, orientation: &str, share: f64) -> bool {
    let index = node.nodes.iter().position(|child| child.find(id).is_some());
    let Some(index) = index else {
        return false;
    };

    if resize(&mut node.nodes[index], id, orientation, share) {
        return true;
    }
    if node.layout != orientation || node.nodes.len() < 2 {
        return false;
    }

    let others: f64 = node
        .nodes
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, child)| child.percent.unwrap_or(0.0))
        .sum();
    let remainder = (1.0 - share).max(0.0);
    for (i, child) in node.nodes.iter_mut().enumerate() {
        if i == index {
            child.percent = Some(share);
        } else if others > 0.0 {
            child.percent = Some(child.percent.unwrap_or(0.0) / others * remainder);
        }
    }
    true
}

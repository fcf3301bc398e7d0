//! Wire types for i3/sway IPC replies and events.
//!
//! Only the fields Muscle reads are modelled; everything else in the
//! manager's JSON is ignored.

use serde::{Deserialize, Serialize};

/// Node types that hold a real output or workspace.
const OUTPUT_TYPE: &str = "output";
const WORKSPACE_TYPE: &str = "workspace";

/// Names of the internal scratchpad output and workspace.
const INTERNAL_OUTPUT: &str = "__i3";
const SCRATCH_WORKSPACE: &str = "__i3_scratch";

/// X11 window properties (i3, Xwayland).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowProperties {
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub instance: Option<String>,
}

/// A node of the `GET_TREE` reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawNode {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub layout: String,
    #[serde(default)]
    pub percent: Option<f64>,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub focus: Vec<i64>,
    /// Workspace number, when the name starts with one.
    #[serde(default)]
    pub num: Option<i32>,
    /// Wayland application id (sway).
    #[serde(default)]
    pub app_id: Option<String>,
    /// X11 window id.
    #[serde(default)]
    pub window: Option<i64>,
    #[serde(default)]
    pub window_properties: Option<WindowProperties>,
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default)]
    pub floating_nodes: Vec<RawNode>,
}

impl RawNode {
    /// Returns true for nodes that hold a client window.
    #[must_use]
    pub fn is_window(&self) -> bool {
        self.nodes.is_empty()
            && (self.node_type == "con" || self.node_type == "floating_con")
            && (self.app_id.is_some() || self.window.is_some() || self.window_properties.is_some())
    }

    #[must_use]
    pub fn is_workspace(&self) -> bool { self.node_type == WORKSPACE_TYPE }

    #[must_use]
    pub fn is_output(&self) -> bool { self.node_type == OUTPUT_TYPE }

    #[must_use]
    pub fn name(&self) -> &str { self.name.as_deref().unwrap_or_default() }

    /// Application id, falling back to the X11 class.
    #[must_use]
    pub fn identity_hint(&self) -> Option<String> {
        self.app_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| self.window_properties.as_ref().and_then(|props| props.class.clone()))
    }

    /// Finds a node by container id anywhere below (and including) `self`.
    #[must_use]
    pub fn find(&self, id: i64) -> Option<&Self> {
        if self.id == id {
            return Some(self);
        }
        self.nodes
            .iter()
            .chain(&self.floating_nodes)
            .find_map(|child| child.find(id))
    }

    /// Returns the id of the focused node, if any.
    #[must_use]
    pub fn focused_id(&self) -> Option<i64> {
        if self.focused {
            return Some(self.id);
        }
        self.nodes
            .iter()
            .chain(&self.floating_nodes)
            .find_map(Self::focused_id)
    }

    /// Visits every real workspace with the name of the output it is on.
    ///
    /// The scratchpad output and workspace are skipped.
    #[must_use]
    pub fn workspaces(&self) -> Vec<(&str, &Self)> {
        let mut found = Vec::new();
        collect_workspaces(self, None, &mut found);
        found
    }

    /// Returns the output name and workspace containing container `id`.
    #[must_use]
    pub fn workspace_of(&self, id: i64) -> Option<(&str, &Self)> {
        self.workspaces()
            .into_iter()
            .find(|(_, workspace)| workspace.find(id).is_some())
    }

    /// Returns the visible workspace of the named output.
    ///
    /// Follows the output's focus stack down to the first workspace.
    #[must_use]
    pub fn visible_workspace_on(&self, output: &str) -> Option<&Self> {
        let output_node = self
            .nodes
            .iter()
            .find(|node| node.is_output() && node.name() == output)?;

        let mut current = output_node;
        loop {
            if current.is_workspace() {
                return Some(current);
            }
            let next_id = *current.focus.first()?;
            current = current.nodes.iter().find(|node| node.id == next_id)?;
        }
    }

    /// Counts client windows below this node, tiled and floating.
    #[must_use]
    pub fn window_count(&self) -> usize {
        if self.is_window() {
            return 1;
        }
        self.nodes
            .iter()
            .chain(&self.floating_nodes)
            .map(Self::window_count)
            .sum()
    }
}

fn collect_workspaces<'a>(
    node: &'a RawNode,
    output: Option<&'a str>,
    found: &mut Vec<(&'a str, &'a RawNode)>,
) {
    if node.is_output() && node.name() == INTERNAL_OUTPUT {
        return;
    }
    let output = if node.is_output() { Some(node.name()) } else { output };

    if node.is_workspace() {
        if let Some(output) = output
            && node.name() != SCRATCH_WORKSPACE
        {
            found.push((output, node));
        }
        return;
    }

    for child in &node.nodes {
        collect_workspaces(child, output, found);
    }
}

/// One entry of a `RUN_COMMAND` reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandReply {
    pub success: bool,
    #[serde(default)]
    pub parse_error: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Reply to `SUBSCRIBE`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeReply {
    pub success: bool,
}

/// Payload of a `window` event.
#[derive(Debug, Clone, Deserialize)]
pub struct WindowEventPayload {
    pub change: String,
    pub container: RawNode,
}

/// Payload of a `workspace` event.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceEventPayload {
    pub change: String,
    #[serde(default)]
    pub current: Option<RawNode>,
}

/// The `binding` object inside a binding event.
#[derive(Debug, Clone, Deserialize)]
pub struct BindingInfo {
    #[serde(default)]
    pub command: String,
}

/// Payload of a `binding` event.
#[derive(Debug, Clone, Deserialize)]
pub struct BindingEventPayload {
    #[serde(default)]
    pub change: String,
    pub binding: BindingInfo,
}

/// Payload of a `shutdown` event.
#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownEventPayload {
    pub change: String,
}

//! Layout trees captured from the live manager state.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::node::{LayoutNode, NodeKind};
use crate::ipc::{RawNode, TransportError, WindowManager};

/// An (output, workspace) pair layouts are tracked per.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct Scope {
    pub output: String,
    pub workspace: String,
}

impl Scope {
    #[must_use]
    pub fn new(output: impl Into<String>, workspace: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            workspace: workspace.into(),
        }
    }

    fn from_pair((output, workspace): (&str, &RawNode)) -> Self {
        Self::new(output, workspace.name())
    }

    /// Scope of the focused workspace.
    #[must_use]
    pub fn focused(tree: &RawNode) -> Option<Self> {
        let focused = tree.focused_id()?;
        Self::containing(tree, focused)
    }

    /// Scope of the workspace holding container `con_id`.
    #[must_use]
    pub fn containing(tree: &RawNode, con_id: i64) -> Option<Self> {
        tree.workspace_of(con_id).map(Self::from_pair)
    }

    /// Scope of the workspace called `name`, or numbered `name` when it is a number.
    #[must_use]
    pub fn named(tree: &RawNode, name: &str) -> Option<Self> {
        let workspaces = tree.workspaces();
        workspaces
            .iter()
            .find(|(_, ws)| ws.name() == name)
            .or_else(|| {
                let num = name.parse::<i32>().ok()?;
                workspaces.iter().find(|(_, ws)| ws.num == Some(num))
            })
            .map(|pair| Self::from_pair(*pair))
    }

    /// Scope of the visible workspace on `output`.
    #[must_use]
    pub fn visible_on(tree: &RawNode, output: &str) -> Option<Self> {
        tree.visible_workspace_on(output)
            .map(|workspace| Self::new(output, workspace.name()))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.output, self.workspace)
    }
}

/// A normalized layout plus the scope it was captured from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LayoutTree {
    pub scope: Scope,
    pub root: LayoutNode,
}

impl LayoutTree {
    /// Builds the normalized tree of `scope` from a full manager tree.
    ///
    /// Returns `None` when the workspace does not exist or holds no tiled
    /// windows.
    #[must_use]
    pub fn from_raw(tree: &RawNode, scope: &Scope) -> Option<Self> {
        let (_, workspace) = tree
            .workspaces()
            .into_iter()
            .find(|(output, ws)| *output == scope.output && ws.name() == scope.workspace)?;

        let root = normalize_root(build_container(workspace, 1.0)?);
        Some(Self {
            scope: scope.clone(),
            root,
        })
    }

    #[must_use]
    pub fn leaf_count(&self) -> usize { self.root.leaves().len() }

    /// Every live container id referenced by this tree.
    #[must_use]
    pub fn con_ids(&self) -> Vec<i64> { self.root.con_ids() }
}

/// Reads the manager tree and captures `scope` from it.
///
/// # Errors
///
/// Returns a `TransportError` if the tree cannot be read.
pub fn capture<W: WindowManager + ?Sized>(
    wm: &mut W,
    scope: &Scope,
) -> Result<Option<LayoutTree>, TransportError> {
    let raw = wm.tree()?;
    Ok(LayoutTree::from_raw(&raw, scope))
}

fn build(node: &RawNode) -> Option<LayoutNode> {
    let ratio = node.percent.unwrap_or(0.0);
    if node.is_window() {
        return Some(LayoutNode::leaf(ratio, node.identity_hint()).with_con_id(node.id));
    }
    let container = build_container(node, ratio)?;
    Some(collapse(container))
}

fn build_container(node: &RawNode, ratio: f64) -> Option<LayoutNode> {
    let kind = NodeKind::from_layout(&node.layout).unwrap_or(NodeKind::SplitHorizontal);
    let mut children = Vec::new();
    let mut layout_con_id = None;
    for raw_child in &node.nodes {
        if let Some(child) = build(raw_child) {
            layout_con_id.get_or_insert(raw_child.id);
            children.push(child);
        }
    }
    let layout_con_id = layout_con_id?;

    #[allow(clippy::cast_precision_loss)]
    let even = 1.0 / children.len() as f64;
    for child in &mut children {
        if !(child.ratio.is_finite() && child.ratio > 0.0) {
            child.ratio = even;
        }
    }

    Some(
        LayoutNode::container(kind, ratio, children)
            .with_con_id(node.id)
            .with_layout_con_id(layout_con_id),
    )
}

/// Replaces a container by its only child. A lone container child takes
/// the wrapper's place; a lone leaf absorbs the wrapper.
fn collapse(mut node: LayoutNode) -> LayoutNode {
    while node.children.len() == 1 {
        let ratio = node.ratio;
        let Some(mut child) = node.children.pop() else {
            break;
        };
        child.ratio = ratio;
        node = child;
    }
    node
}

/// At the root a lone leaf stays wrapped so the root is always a container.
fn normalize_root(mut root: LayoutNode) -> LayoutNode {
    while root.children.len() == 1 && !root.children[0].is_leaf() {
        let Some(mut child) = root.children.pop() else {
            break;
        };
        child.ratio = root.ratio;
        root = child;
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::fake::{FakeWm, container, root, window, workspace};

    fn scope() -> Scope { Scope::new("DP-1", "1") }

    #[test]
    fn test_capture_two_pane_split() {
        let raw = root("DP-1", vec![workspace(10, "1", "splith", vec![
            window(11, "foot", 0.7),
            window(12, "firefox", 0.3),
        ])]);
        let tree = LayoutTree::from_raw(&raw, &scope()).unwrap();

        assert_eq!(tree.root.kind, NodeKind::SplitHorizontal);
        assert_eq!(tree.root.con_id, Some(10));
        assert_eq!(tree.leaf_count(), 2);
        assert!((tree.root.children[0].ratio - 0.7).abs() < 1e-9);
        assert_eq!(tree.root.children[1].hint.as_deref(), Some("firefox"));
    }

    #[test]
    fn test_empty_workspace_has_no_tree() {
        let raw = root("DP-1", vec![workspace(10, "1", "splith", Vec::new())]);
        assert!(LayoutTree::from_raw(&raw, &scope()).is_none());
    }

    #[test]
    fn test_unknown_scope_has_no_tree() {
        let raw = root("DP-1", vec![workspace(10, "1", "splith", vec![window(11, "foot", 1.0)])]);
        assert!(LayoutTree::from_raw(&raw, &Scope::new("HDMI-1", "1")).is_none());
    }

    #[test]
    fn test_single_child_wrapper_collapses() {
        let raw = root("DP-1", vec![workspace(10, "1", "splith", vec![container(
            20,
            "splitv",
            1.0,
            vec![window(11, "foot", 0.5), window(12, "foot", 0.5)],
        )])]);
        let tree = LayoutTree::from_raw(&raw, &scope()).unwrap();

        assert_eq!(tree.root.kind, NodeKind::SplitVertical);
        assert_eq!(tree.root.con_id, Some(20));
        assert_eq!(tree.root.children.len(), 2);
    }

    #[test]
    fn test_single_leaf_container_becomes_leaf_with_its_ratio() {
        let raw = root("DP-1", vec![workspace(10, "1", "splith", vec![
            container(20, "tabbed", 0.6, vec![window(11, "foot", 1.0)]),
            window(12, "firefox", 0.4),
        ])]);
        let tree = LayoutTree::from_raw(&raw, &scope()).unwrap();

        let first = &tree.root.children[0];
        assert!(first.is_leaf());
        assert_eq!(first.con_id, Some(11));
        assert!((first.ratio - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_layout_target_is_a_direct_child_in_the_manager_tree() {
        let raw = root("DP-1", vec![workspace(10, "1", "splith", vec![
            container(20, "tabbed", 0.6, vec![window(11, "foot", 1.0)]),
            container(30, "splith", 0.4, vec![container(40, "splitv", 1.0, vec![
                window(41, "firefox", 0.5),
                window(42, "mpv", 0.5),
            ])]),
        ])]);
        let tree = LayoutTree::from_raw(&raw, &scope()).unwrap();

        // The collapsed wrapper 20 is the child of the workspace, not window 11.
        assert_eq!(tree.root.layout_con_id, Some(20));
        let inner = &tree.root.children[1];
        assert_eq!(inner.kind, NodeKind::SplitVertical);
        assert_eq!(inner.layout_con_id, Some(41));
    }

    #[test]
    fn test_root_with_single_window_stays_container() {
        let raw = root("DP-1", vec![workspace(10, "1", "splith", vec![window(11, "foot", 1.0)])]);
        let tree = LayoutTree::from_raw(&raw, &scope()).unwrap();
        assert_eq!(tree.root.kind, NodeKind::SplitHorizontal);
        assert_eq!(tree.root.children.len(), 1);
    }

    #[test]
    fn test_floating_windows_ignored() {
        let mut ws = workspace(10, "1", "splith", vec![window(11, "foot", 1.0)]);
        ws.floating_nodes.push(window(13, "pavucontrol", 1.0));
        let raw = root("DP-1", vec![ws]);
        assert_eq!(LayoutTree::from_raw(&raw, &scope()).unwrap().leaf_count(), 1);
    }

    #[test]
    fn test_missing_percent_defaults_to_even_share() {
        let mut first = window(11, "foot", 0.0);
        first.percent = None;
        let mut second = window(12, "foot", 0.0);
        second.percent = None;
        let raw = root("DP-1", vec![workspace(10, "1", "splitv", vec![first, second])]);
        let tree = LayoutTree::from_raw(&raw, &scope()).unwrap();
        assert!((tree.root.children[0].ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_scope_resolution() {
        let mut raw = root("DP-1", vec![
            workspace(10, "1", "splith", vec![window(11, "foot", 1.0)]),
            workspace(20, "3: www", "splith", vec![window(21, "firefox", 1.0)]),
        ]);
        raw.nodes[0].nodes[1].num = Some(3);
        raw.nodes[0].nodes[1].nodes[0].focused = true;

        assert_eq!(Scope::focused(&raw), Some(Scope::new("DP-1", "3: www")));
        assert_eq!(Scope::containing(&raw, 11), Some(scope()));
        assert_eq!(Scope::named(&raw, "3"), Some(Scope::new("DP-1", "3: www")));
        assert_eq!(Scope::visible_on(&raw, "DP-1"), Some(scope()));
        assert_eq!(scope().to_string(), "DP-1/1");
    }

    #[test]
    fn test_capture_reads_through_window_manager() {
        let mut wm = FakeWm::new(root("DP-1", vec![workspace(10, "1", "splith", vec![window(
            11, "foot", 1.0,
        )])]));
        let tree = capture(&mut wm, &scope()).unwrap().unwrap();
        assert_eq!(tree.leaf_count(), 1);
    }
}

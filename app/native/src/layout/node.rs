//! Canonical layout nodes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// What a node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Leaf,
    SplitHorizontal,
    SplitVertical,
    Tabbed,
    Stacked,
}

impl NodeKind {
    /// Maps a manager `layout` string to a container kind.
    #[must_use]
    pub fn from_layout(layout: &str) -> Option<Self> {
        match layout {
            "splith" => Some(Self::SplitHorizontal),
            "splitv" => Some(Self::SplitVertical),
            "tabbed" => Some(Self::Tabbed),
            "stacked" | "stacking" => Some(Self::Stacked),
            _ => None,
        }
    }

    /// Argument of the `layout` command that produces this kind.
    #[must_use]
    pub const fn layout_arg(self) -> Option<&'static str> {
        match self {
            Self::Leaf => None,
            Self::SplitHorizontal => Some("splith"),
            Self::SplitVertical => Some("splitv"),
            Self::Tabbed => Some("tabbed"),
            Self::Stacked => Some("stacking"),
        }
    }

    /// Dimension `resize set` changes for children of this kind.
    /// Only split containers distribute space among their children.
    #[must_use]
    pub const fn resize_dimension(self) -> Option<&'static str> {
        match self {
            Self::SplitHorizontal => Some("width"),
            Self::SplitVertical => Some("height"),
            _ => None,
        }
    }

    /// Token used in the fingerprint skeleton.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Leaf => "L",
            Self::SplitHorizontal => "H",
            Self::SplitVertical => "V",
            Self::Tabbed => "T",
            Self::Stacked => "S",
        }
    }

    #[must_use]
    pub const fn is_leaf(self) -> bool { matches!(self, Self::Leaf) }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Leaf => "window",
            Self::SplitHorizontal => "split horizontal",
            Self::SplitVertical => "split vertical",
            Self::Tabbed => "tabbed",
            Self::Stacked => "stacked",
        }
    }
}

/// One container of a layout tree.
///
/// Leaves have no children; containers have at least one. `ratio` is the
/// node's share among its siblings as reported by the manager and is only
/// normalized when compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LayoutNode {
    pub kind: NodeKind,
    pub ratio: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<LayoutNode>,
    /// Application id or class of a leaf. A weak label, never an identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Live container id. Only set on trees captured from the manager.
    #[serde(skip)]
    pub con_id: Option<i64>,
    /// Live id of a direct child of this container in the manager tree.
    /// `layout` acts on the parent of the matched container, so this is the
    /// id a kind change is aimed at. Survives wrapper collapsing.
    #[serde(skip)]
    pub layout_con_id: Option<i64>,
}

/// Reasons a deserialized node is not a valid layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidLayout {
    #[error("root must be a container")]
    LeafRoot,
    #[error("window node has children")]
    LeafWithChildren,
    #[error("{0} container has no children")]
    EmptyContainer(&'static str),
    #[error("ratio must be positive and finite")]
    BadRatio,
}

impl LayoutNode {
    #[must_use]
    pub fn leaf(ratio: f64, hint: Option<String>) -> Self {
        Self {
            kind: NodeKind::Leaf,
            ratio,
            children: Vec::new(),
            hint,
            con_id: None,
            layout_con_id: None,
        }
    }

    /// Builds a container. `kind` must not be `Leaf`.
    #[must_use]
    pub fn container(kind: NodeKind, ratio: f64, children: Vec<Self>) -> Self {
        debug_assert!(!kind.is_leaf());
        Self {
            kind,
            ratio,
            children,
            hint: None,
            con_id: None,
            layout_con_id: None,
        }
    }

    #[must_use]
    pub const fn with_con_id(mut self, con_id: i64) -> Self {
        self.con_id = Some(con_id);
        self
    }

    #[must_use]
    pub const fn with_layout_con_id(mut self, con_id: i64) -> Self {
        self.layout_con_id = Some(con_id);
        self
    }

    #[must_use]
    pub const fn is_leaf(&self) -> bool { self.kind.is_leaf() }

    /// Children's ratios scaled to sum to 1.
    #[must_use]
    pub fn child_shares(&self) -> Vec<f64> {
        let total: f64 = self.children.iter().map(|child| child.ratio).sum();
        if total <= 0.0 {
            #[allow(clippy::cast_precision_loss)]
            let even = 1.0 / self.children.len().max(1) as f64;
            return vec![even; self.children.len()];
        }
        self.children.iter().map(|child| child.ratio / total).collect()
    }

    /// Leaves in depth-first order.
    #[must_use]
    pub fn leaves(&self) -> Vec<&Self> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Self>) {
        if self.is_leaf() {
            out.push(self);
        } else {
            for child in &self.children {
                child.collect_leaves(out);
            }
        }
    }

    /// Every live container id in this subtree, containers and leaves.
    #[must_use]
    pub fn con_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.con_id.into_iter().collect();
        for child in &self.children {
            ids.extend(child.con_ids());
        }
        ids
    }

    /// Checks a root loaded from disk: the root is a container and every
    /// node below it is well formed.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), InvalidLayout> {
        if self.is_leaf() {
            return Err(InvalidLayout::LeafRoot);
        }
        self.validate_subtree()
    }

    fn validate_subtree(&self) -> Result<(), InvalidLayout> {
        if !(self.ratio.is_finite() && self.ratio > 0.0) {
            return Err(InvalidLayout::BadRatio);
        }
        match (self.is_leaf(), self.children.is_empty()) {
            (true, false) => Err(InvalidLayout::LeafWithChildren),
            (false, true) => Err(InvalidLayout::EmptyContainer(self.kind.label())),
            _ => self.children.iter().try_for_each(Self::validate_subtree),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_pane(left: f64, right: f64) -> LayoutNode {
        LayoutNode::container(
            NodeKind::SplitHorizontal,
            1.0,
            vec![
                LayoutNode::leaf(left, Some("foot".to_string())),
                LayoutNode::leaf(right, Some("firefox".to_string())),
            ],
        )
    }

    #[test]
    fn test_layout_mapping() {
        assert_eq!(NodeKind::from_layout("splitv"), Some(NodeKind::SplitVertical));
        assert_eq!(NodeKind::from_layout("stacked"), Some(NodeKind::Stacked));
        assert_eq!(NodeKind::from_layout("output"), None);
        assert_eq!(NodeKind::Stacked.layout_arg(), Some("stacking"));
        assert_eq!(NodeKind::Tabbed.resize_dimension(), None);
    }

    #[test]
    fn test_child_shares_normalize() {
        let node = two_pane(0.35, 0.15);
        let shares = node.child_shares();
        assert!((shares[0] - 0.7).abs() < 1e-9);
        assert!((shares[1] - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_leaves_depth_first() {
        let node = LayoutNode::container(
            NodeKind::SplitHorizontal,
            1.0,
            vec![
                LayoutNode::leaf(0.5, Some("a".to_string())),
                LayoutNode::container(
                    NodeKind::SplitVertical,
                    0.5,
                    vec![
                        LayoutNode::leaf(0.5, Some("b".to_string())),
                        LayoutNode::leaf(0.5, Some("c".to_string())),
                    ],
                ),
            ],
        );
        let hints: Vec<_> = node.leaves().iter().map(|leaf| leaf.hint.clone().unwrap()).collect();
        assert_eq!(hints, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_validate_rejects_empty_container() {
        let node = LayoutNode::container(NodeKind::Tabbed, 1.0, Vec::new());
        assert_eq!(node.validate(), Err(InvalidLayout::EmptyContainer("tabbed")));
    }

    #[test]
    fn test_validate_rejects_leaf_root() {
        let node = LayoutNode::leaf(1.0, Some("foot".to_string()));
        assert_eq!(node.validate(), Err(InvalidLayout::LeafRoot));
        assert_eq!(two_pane(0.5, 0.5).validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_nested_leaf_with_children() {
        let mut node = two_pane(0.5, 0.5);
        node.children[0].children.push(LayoutNode::leaf(1.0, None));
        assert_eq!(node.validate(), Err(InvalidLayout::LeafWithChildren));
    }

    #[test]
    fn test_validate_rejects_bad_ratio() {
        let node = two_pane(0.5, -1.0);
        assert_eq!(node.validate(), Err(InvalidLayout::BadRatio));
    }

    #[test]
    fn test_con_id_not_serialized() {
        let node = LayoutNode::leaf(1.0, None).with_con_id(99);
        let json = serde_json::to_string(&node).unwrap();
        assert!(!json.contains("99"));
        let back: LayoutNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back.con_id, None);
    }
}

//! Fingerprints and structural equality.
//!
//! The fingerprint hashes the tree skeleton only: container kinds, child
//! order and leaf positions. Ratios are compared by
//! [`equals_structurally`] after bucketing, so a remembered 70/30 split and
//! a fresh 50/50 split of the same shape share a fingerprint.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::node::LayoutNode;
use super::tree::LayoutTree;

/// Hex SHA-256 of a layout skeleton.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }

    /// First 12 hex digits, for tables and logs.
    #[must_use]
    pub fn short(&self) -> &str { self.0.get(..12).unwrap_or(&self.0) }

    fn of_skeleton(skeleton: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(skeleton.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Ratio tolerance: shares are rounded to `1 / buckets`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tolerance {
    buckets: u32,
}

impl Default for Tolerance {
    fn default() -> Self { Self { buckets: 20 } }
}

impl Tolerance {
    /// At least one bucket is always used.
    #[must_use]
    pub fn new(buckets: u32) -> Self { Self { buckets: buckets.max(1) } }

    #[must_use]
    pub const fn buckets(self) -> u32 { self.buckets }

    /// Bucket index of a normalized share.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn bucket(self, share: f64) -> u32 {
        (share.clamp(0.0, 1.0) * f64::from(self.buckets)).round() as u32
    }
}

/// Fingerprint of the full skeleton: kinds, order, leaf slots.
#[must_use]
pub fn fingerprint(tree: &LayoutTree) -> Fingerprint {
    let mut skeleton = String::new();
    write_skeleton(&tree.root, true, &mut skeleton);
    Fingerprint::of_skeleton(&skeleton)
}

/// Fingerprint of the skeleton with container kinds erased.
///
/// Two trees with equal arity fingerprints can be turned into each other by
/// `layout` commands alone.
#[must_use]
pub fn arity_fingerprint(tree: &LayoutTree) -> Fingerprint {
    let mut skeleton = String::new();
    write_skeleton(&tree.root, false, &mut skeleton);
    Fingerprint::of_skeleton(&skeleton)
}

fn write_skeleton(node: &LayoutNode, with_kinds: bool, out: &mut String) {
    if node.is_leaf() {
        out.push('L');
        return;
    }
    out.push_str(if with_kinds { node.kind.token() } else { "C" });
    out.push_str(&node.children.len().to_string());
    out.push('(');
    for child in &node.children {
        write_skeleton(child, with_kinds, out);
        out.push(',');
    }
    out.push(')');
}

/// Compares two trees under `tolerance`. Scopes and hints are ignored.
#[must_use]
pub fn equals_structurally(a: &LayoutTree, b: &LayoutTree, tolerance: Tolerance) -> bool {
    nodes_equal(&a.root, &b.root, tolerance)
}

/// Node-level structural comparison.
#[must_use]
pub fn nodes_equal(a: &LayoutNode, b: &LayoutNode, tolerance: Tolerance) -> bool {
    if a.kind != b.kind || a.children.len() != b.children.len() {
        return false;
    }
    if a.kind.resize_dimension().is_some() && !shares_equal(a, b, tolerance) {
        return false;
    }
    a.children
        .iter()
        .zip(&b.children)
        .all(|(left, right)| nodes_equal(left, right, tolerance))
}

/// Whether the children of two split containers have the same bucketed shares.
#[must_use]
pub fn shares_equal(a: &LayoutNode, b: &LayoutNode, tolerance: Tolerance) -> bool {
    a.child_shares()
        .into_iter()
        .zip(b.child_shares())
        .all(|(left, right)| tolerance.bucket(left) == tolerance.bucket(right))
}

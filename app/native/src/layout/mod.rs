//! Layout model: canonical trees, fingerprints, structural equality.

pub mod fingerprint;
pub mod node;
pub mod tree;

pub use fingerprint::{Fingerprint, Tolerance, arity_fingerprint, equals_structurally, fingerprint};
pub use node::{InvalidLayout, LayoutNode, NodeKind};
pub use tree::{LayoutTree, Scope, capture};

//! stitch DOM
//!
//! Arena-based element tree used by every build pass.
//!
//! Nodes live in a single `Vec` and link to each other through [`NodeId`]
//! indices. Detached nodes stay in the arena until the tree is dropped,
//! which is fine for the per-file, per-pass lifetime of a build tree.

mod node;
mod tree;
mod document;
mod selector;

pub use node::{Attribute, ElementData, Node, NodeData, NodeType};
pub use tree::{Children, DomTree};
pub use document::Document;
pub use selector::Selector;

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Document root node ID
    pub const ROOT: NodeId = NodeId(0);
    /// Sentinel for "no node"
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Check whether this ID points at a node
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }

    /// Raw arena index, used to hand node handles across the script boundary
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }

    /// Rebuild an ID from a raw index
    #[inline]
    pub fn from_index(index: u32) -> Self {
        Self(index)
    }
}

/// Result type for tree operations
pub type DomResult<T> = Result<T, DomError>;

/// Tree operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// Node not found
    #[error("Node not found")]
    NotFound,
    /// Hierarchy error (e.g., inserting an ancestor into its descendant)
    #[error("Hierarchy request error")]
    HierarchyRequest,
    /// The operation needs a different node type
    #[error("Invalid node type")]
    InvalidNodeType,
    /// Reference node is not a child of the given parent
    #[error("Node is not a child")]
    NotAChild,
}

//! Node identifiers and node payloads for the tree arena.
//!
//! Nodes live in a flat `Vec<Node>` in pre-order: a node's descendants are
//! exactly the ids `id + 1 .. node.subtree_end`. Children are stored as a
//! range into a shared child list, never as boxed pointers.

use std::fmt;

use smallvec::SmallVec;

use crate::{Marker, Span};

/// Index into a tree's node arena.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Sentinel used for the root's parent.
    pub const INVALID: NodeId = NodeId(u32::MAX);

    /// The root is always the first node in pre-order.
    pub const ROOT: NodeId = NodeId(0);

    #[inline]
    pub const fn new(index: u32) -> Self {
        NodeId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "NodeId({})", self.0)
        } else {
            write!(f, "NodeId::INVALID")
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Range of child ids in a tree's flattened child list.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct NodeRange {
    pub start: u32,
    pub len: u32,
}

impl NodeRange {
    pub const EMPTY: NodeRange = NodeRange { start: 0, len: 0 };

    #[inline]
    pub const fn new(start: u32, len: u32) -> Self {
        NodeRange { start, len }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn to_range(self) -> std::ops::Range<usize> {
        self.start as usize..(self.start + self.len) as usize
    }
}

/// Which accessor of a property or event a node is.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum AccessorKind {
    Get,
    Set,
    Init,
    Add,
    Remove,
}

impl AccessorKind {
    /// Property get/set accessors are the only accessors eligible for
    /// body-only patching.
    #[inline]
    pub fn is_property_get_set(self) -> bool {
        matches!(self, AccessorKind::Get | AccessorKind::Set)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessorKind::Get => "Get",
            AccessorKind::Set => "Set",
            AccessorKind::Init => "Init",
            AccessorKind::Add => "Add",
            AccessorKind::Remove => "Remove",
        }
    }
}

impl fmt::Display for AccessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural kind of a node.
///
/// Only the distinctions the classifier and annotator need are modeled;
/// front ends map everything else to `Statement`, `Expression` or `Other`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    CompilationUnit,
    Namespace,
    TypeDecl,
    Method,
    Constructor,
    Operator,
    Property,
    Accessor(AccessorKind),
    Field,
    Event,
    AttributeList,
    Attribute,
    AttributeArguments,
    ParameterList,
    /// Brace-delimited statement block.
    Block,
    /// `=> expr` body.
    ArrowClause,
    Statement,
    Expression,
    Other,
}

impl NodeKind {
    /// Member-level declarations. A body edit that contains one of these
    /// is adding or removing a member, not changing statements.
    pub fn is_declaration(self) -> bool {
        matches!(
            self,
            NodeKind::TypeDecl
                | NodeKind::Method
                | NodeKind::Constructor
                | NodeKind::Operator
                | NodeKind::Property
                | NodeKind::Accessor(_)
                | NodeKind::Field
                | NodeKind::Event
        )
    }

    /// Kinds that can hold executable statements.
    #[inline]
    pub fn is_body(self) -> bool {
        matches!(self, NodeKind::Block | NodeKind::ArrowClause)
    }

    /// Kinds that contribute a segment to a dotted declaration path.
    pub fn is_path_segment(self) -> bool {
        matches!(
            self,
            NodeKind::Namespace
                | NodeKind::TypeDecl
                | NodeKind::Method
                | NodeKind::Constructor
                | NodeKind::Operator
                | NodeKind::Property
                | NodeKind::Accessor(_)
                | NodeKind::Field
                | NodeKind::Event
        )
    }
}

/// One node in a tree arena.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Node {
    pub kind: NodeKind,
    /// Significant text, no surrounding trivia.
    pub span: Span,
    /// Significant text plus the trivia written while the node was open.
    pub full_span: Span,
    pub parent: NodeId,
    /// One past the last descendant in pre-order.
    pub subtree_end: NodeId,
    pub children: NodeRange,
    /// Declared name for declarations and attributes.
    pub name: Option<String>,
    /// Markers added by rewriting; empty on trees straight from a front end.
    pub markers: SmallVec<[Marker; 2]>,
}

impl Node {
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn has_markers(&self) -> bool {
        !self.markers.is_empty()
    }
}

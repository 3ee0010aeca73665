//! Immutable source trees.
//!
//! A `SourceTree` is one version of one file: its text, its active
//! conditional-compilation symbols and a pre-order node arena. Two trees
//! with the same path are two versions of the same file. Trees are never
//! mutated after construction; rewriting produces a new tree.

use std::collections::BTreeSet;

use crate::{Node, NodeId, NodeKind, Span};

/// Active preprocessor/compilation symbols for one tree.
///
/// Ordered so that equality and rendering are deterministic.
pub type SymbolSet = BTreeSet<String>;

/// The tree has no root node.
///
/// Callers treat the file as fully unsafe for body-only patching.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("root node of `{path}` could not be resolved")]
pub struct UnresolvedRootError {
    pub path: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourceTree {
    path: String,
    text: String,
    symbols: SymbolSet,
    nodes: Vec<Node>,
    child_list: Vec<NodeId>,
}

impl SourceTree {
    pub(crate) fn from_parts(
        path: String,
        text: String,
        symbols: SymbolSet,
        nodes: Vec<Node>,
        child_list: Vec<NodeId>,
    ) -> Self {
        SourceTree {
            path,
            text,
            symbols,
            nodes,
            child_list,
        }
    }

    /// Stable file identity.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn symbols(&self) -> &SymbolSet {
        &self.symbols
    }

    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn child_list(&self) -> &[NodeId] {
        &self.child_list
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Root node id, or an error when the tree carries no nodes.
    pub fn root(&self) -> Result<NodeId, UnresolvedRootError> {
        if self.nodes.is_empty() {
            Err(UnresolvedRootError {
                path: self.path.clone(),
            })
        } else {
            Ok(NodeId::ROOT)
        }
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.child_list[self.node(id).children.to_range()]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id).parent;
        parent.is_valid().then_some(parent)
    }

    /// `id`, then each ancestor up to the root.
    pub fn ancestors_or_self(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), move |&current| self.parent(current))
    }

    /// `id` and every node below it, in pre-order.
    pub fn descendants_or_self(&self, id: NodeId) -> impl Iterator<Item = NodeId> {
        (id.raw()..self.node(id).subtree_end.raw()).map(NodeId::new)
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    #[inline]
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        ancestor <= id && id < self.node(ancestor).subtree_end
    }

    /// Text covered by a span. Out-of-range spans yield an empty string.
    pub fn slice(&self, span: Span) -> &str {
        self.text.get(span.to_range()).unwrap_or("")
    }

    /// Significant text of a node, without surrounding trivia.
    pub fn node_text(&self, id: NodeId) -> &str {
        self.slice(self.node(id).span)
    }

    /// Innermost node whose full span contains `span`.
    ///
    /// Falls back to the root when no node contains it. Ties between
    /// adjacent siblings resolve to the sibling starting at `span.start`.
    pub fn enclosing_node(&self, span: Span) -> Result<NodeId, UnresolvedRootError> {
        let mut current = self.root()?;
        loop {
            let children = self.children(current);
            let idx = children.partition_point(|&c| self.node(c).full_span.start <= span.start);
            let Some(&candidate) = idx.checked_sub(1).and_then(|i| children.get(i)) else {
                return Ok(current);
            };
            if self.node(candidate).full_span.contains_span(span) {
                current = candidate;
            } else {
                return Ok(current);
            }
        }
    }

    /// Dotted path of the declarations enclosing `id`, e.g. `Game.Player.Update`.
    pub fn declaration_path(&self, id: NodeId) -> String {
        let mut segments: Vec<&str> = self
            .ancestors_or_self(id)
            .filter(|&n| self.kind(n).is_path_segment())
            .filter_map(|n| match (self.node(n).name(), self.kind(n)) {
                (Some(name), _) => Some(name),
                (None, NodeKind::Accessor(kind)) => Some(kind.as_str()),
                (None, _) => None,
            })
            .collect();
        segments.reverse();
        segments.join(".")
    }

    /// Same text and same symbols.
    pub fn is_text_identical(&self, other: &SourceTree) -> bool {
        self.text == other.text && self.symbols == other.symbols
    }
}

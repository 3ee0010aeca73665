//! Event-style construction of source trees.
//!
//! Front ends (and test fixtures) describe a tree as a sequence of
//! `start`/`token`/`trivia`/`finish_node` calls. The builder writes the
//! text, computes both spans of every node and lays the arena out in
//! pre-order.
//!
//! ```
//! use hotpatch_ir::{NodeKind, TreeBuilder};
//!
//! let mut b = TreeBuilder::new("A.cs");
//! b.start(NodeKind::CompilationUnit);
//! b.start_named(NodeKind::TypeDecl, "A");
//! b.token("class A {");
//! b.trivia(" ");
//! b.token("}");
//! b.finish_node();
//! b.finish_node();
//! let tree = b.finish().unwrap();
//! assert_eq!(tree.text(), "class A { }");
//! assert_eq!(tree.declaration_path(hotpatch_ir::NodeId::new(1)), "A");
//! ```

use smallvec::SmallVec;

use crate::{Node, NodeId, NodeKind, NodeRange, SourceTree, Span, SymbolSet};

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("`{path}`: {open} node(s) still open at finish")]
    UnclosedNodes { path: String, open: usize },
    #[error("`{path}`: finish_node called with no open node")]
    UnbalancedFinish { path: String },
    #[error("`{path}`: a second root node was started")]
    MultipleRoots { path: String },
    #[error("`{path}`: text exceeds u32::MAX bytes")]
    TextTooLarge { path: String },
}

struct OpenNode {
    id: usize,
    full_start: u32,
    first_token: Option<u32>,
    last_token_end: u32,
    children: Vec<NodeId>,
}

pub struct TreeBuilder {
    path: String,
    text: String,
    symbols: SymbolSet,
    nodes: Vec<Node>,
    child_list: Vec<NodeId>,
    stack: Vec<OpenNode>,
    error: Option<BuildError>,
}

impl TreeBuilder {
    pub fn new(path: impl Into<String>) -> Self {
        TreeBuilder {
            path: path.into(),
            text: String::new(),
            symbols: SymbolSet::new(),
            nodes: Vec::new(),
            child_list: Vec::new(),
            stack: Vec::new(),
            error: None,
        }
    }

    /// Set the active conditional-compilation symbols.
    pub fn symbols<I, S>(&mut self, symbols: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    pub fn start(&mut self, kind: NodeKind) -> &mut Self {
        self.open(kind, None)
    }

    pub fn start_named(&mut self, kind: NodeKind, name: impl Into<String>) -> &mut Self {
        self.open(kind, Some(name.into()))
    }

    /// Append significant text to every open node.
    pub fn token(&mut self, text: &str) -> &mut Self {
        let start = self.offset();
        self.text.push_str(text);
        let end = self.offset();
        for open in &mut self.stack {
            open.first_token.get_or_insert(start);
            open.last_token_end = end;
        }
        self
    }

    /// Append whitespace or comments.
    pub fn trivia(&mut self, text: &str) -> &mut Self {
        self.text.push_str(text);
        self
    }

    pub fn finish_node(&mut self) -> &mut Self {
        let Some(open) = self.stack.pop() else {
            self.fail(BuildError::UnbalancedFinish {
                path: self.path.clone(),
            });
            return self;
        };
        let end = self.offset();
        let span = match open.first_token {
            Some(first) => Span::new(first, open.last_token_end),
            None => Span::point(end),
        };
        let children_start = u32::try_from(self.child_list.len()).unwrap_or(u32::MAX);
        let children_len = u32::try_from(open.children.len()).unwrap_or(u32::MAX);
        self.child_list.extend(open.children);

        let subtree_end = NodeId::new(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        let node = &mut self.nodes[open.id];
        node.span = span;
        node.full_span = Span::new(open.full_start, end);
        node.children = NodeRange::new(children_start, children_len);
        node.subtree_end = subtree_end;
        self
    }

    pub fn finish(mut self) -> Result<SourceTree, BuildError> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        if !self.stack.is_empty() {
            return Err(BuildError::UnclosedNodes {
                path: self.path,
                open: self.stack.len(),
            });
        }
        if u32::try_from(self.text.len()).is_err() {
            return Err(BuildError::TextTooLarge { path: self.path });
        }
        // Leading and trailing file trivia belong to the root.
        let text_end = self.offset();
        if let Some(root) = self.nodes.first_mut() {
            root.full_span = Span::new(0, text_end);
        }
        Ok(SourceTree::from_parts(
            self.path,
            self.text,
            self.symbols,
            self.nodes,
            self.child_list,
        ))
    }

    fn open(&mut self, kind: NodeKind, name: Option<String>) -> &mut Self {
        if self.stack.is_empty() && !self.nodes.is_empty() {
            self.fail(BuildError::MultipleRoots {
                path: self.path.clone(),
            });
            return self;
        }
        let id = NodeId::new(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        let parent = self.stack.last().map_or(NodeId::INVALID, |p| {
            NodeId::new(u32::try_from(p.id).unwrap_or(u32::MAX))
        });
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(id);
        }
        let offset = self.offset();
        self.nodes.push(Node {
            kind,
            span: Span::point(offset),
            full_span: Span::point(offset),
            parent,
            subtree_end: id,
            children: NodeRange::EMPTY,
            name,
            markers: SmallVec::new(),
        });
        self.stack.push(OpenNode {
            id: id.index(),
            full_start: offset,
            first_token: None,
            last_token_end: offset,
            children: Vec::new(),
        });
        self
    }

    fn offset(&self) -> u32 {
        u32::try_from(self.text.len()).unwrap_or(u32::MAX)
    }

    fn fail(&mut self, error: BuildError) {
        self.error.get_or_insert(error);
    }
}

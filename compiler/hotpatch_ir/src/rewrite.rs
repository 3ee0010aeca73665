//! Batch node substitution.
//!
//! Replacements are recorded against node ids of an existing tree and
//! applied all at once in `finish`, so ids captured while walking the
//! original stay valid for the whole batch. The result is a new tree: node
//! payloads are swapped, markers that were added are rendered into the
//! text, and every span is shifted to match the rebuilt text.

use rustc_hash::FxHashMap;

use crate::{EditBatch, EditConflict, Marker, Node, NodeId, PositionShift, SourceTree, Span};

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum RewriteError {
    #[error("`{path}`: no node {id:?} to replace")]
    InvalidNode { path: String, id: NodeId },
    #[error(transparent)]
    Conflict(#[from] EditConflict),
}

/// Where an added marker's text goes relative to its node.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Placement {
    /// In front of the node's significant text.
    Before,
    /// After the end of the file (assembly-level markers on the root).
    After,
}

struct Insertion {
    owner: NodeId,
    at: u32,
    text: String,
    placement: Placement,
}

pub struct TreeRewriter<'t> {
    tree: &'t SourceTree,
    replacements: FxHashMap<NodeId, Node>,
    invalid: Option<NodeId>,
}

impl<'t> TreeRewriter<'t> {
    pub fn new(tree: &'t SourceTree) -> Self {
        TreeRewriter {
            tree,
            replacements: FxHashMap::default(),
            invalid: None,
        }
    }

    /// Add a marker to `id`, building on any replacement already recorded.
    /// Adding the same marker twice is a no-op.
    pub fn add_marker(&mut self, id: NodeId, marker: Marker) {
        let Some(original) = self.tree.get(id) else {
            self.invalid.get_or_insert(id);
            return;
        };
        let node = self
            .replacements
            .entry(id)
            .or_insert_with(|| original.clone());
        if !node.markers.contains(&marker) {
            node.markers.push(marker);
        }
    }

    pub fn finish(self) -> Result<SourceTree, RewriteError> {
        let tree = self.tree;
        if let Some(id) = self.invalid {
            return Err(RewriteError::InvalidNode {
                path: tree.path().to_string(),
                id,
            });
        }
        let mut nodes = tree.nodes().to_vec();
        let mut insertions = Vec::new();

        let mut ids: Vec<NodeId> = self.replacements.keys().copied().collect();
        ids.sort_unstable();
        let mut replacements = self.replacements;

        for id in ids {
            let Some(mut replacement) = replacements.remove(&id) else {
                continue;
            };
            let Some(original) = tree.get(id) else {
                return Err(RewriteError::InvalidNode {
                    path: tree.path().to_string(),
                    id,
                });
            };

            let added: Vec<&Marker> = replacement
                .markers
                .iter()
                .filter(|m| !original.markers.contains(m))
                .collect();
            let (assembly, member): (Vec<&Marker>, Vec<&Marker>) =
                added.into_iter().partition(|m| m.is_assembly_level());

            if !member.is_empty() {
                let mut text: String = member.iter().map(|m| m.render()).collect();
                text.push(' ');
                insertions.push(Insertion {
                    owner: id,
                    at: original.span.start,
                    text,
                    placement: Placement::Before,
                });
            }
            if !assembly.is_empty() {
                let at = u32::try_from(tree.text().len()).unwrap_or(u32::MAX);
                let mut text = String::new();
                if !tree.text().is_empty() && !tree.text().ends_with('\n') {
                    text.push('\n');
                }
                for marker in assembly {
                    text.push_str(&marker.render());
                    text.push('\n');
                }
                insertions.push(Insertion {
                    owner: id,
                    at,
                    text,
                    placement: Placement::After,
                });
            }

            replacement.span = original.span;
            replacement.full_span = original.full_span;
            replacement.parent = original.parent;
            replacement.subtree_end = original.subtree_end;
            replacement.children = original.children;
            nodes[id.index()] = replacement;
        }

        if insertions.is_empty() {
            return Ok(SourceTree::from_parts(
                tree.path().to_string(),
                tree.text().to_string(),
                tree.symbols().clone(),
                nodes,
                tree.child_list().to_vec(),
            ));
        }

        // Text: ascending, outer owners first at equal positions.
        insertions.sort_by_key(|ins| (ins.at, ins.owner));
        let mut batch = EditBatch::new();
        for ins in &insertions {
            batch.insert(ins.at, ins.text.clone());
        }
        let text = batch.apply(tree.text())?;

        // Spans: descending, inner owners first, so each shift sees
        // positions that are still in original coordinates.
        for ins in insertions.iter().rev() {
            shift_spans(tree, &mut nodes, ins);
        }

        Ok(SourceTree::from_parts(
            tree.path().to_string(),
            text,
            tree.symbols().clone(),
            nodes,
            tree.child_list().to_vec(),
        ))
    }
}

fn shift_spans(tree: &SourceTree, nodes: &mut [Node], ins: &Insertion) {
    let len = u32::try_from(ins.text.len()).unwrap_or(u32::MAX);
    let shift = PositionShift::insertion(ins.at, len);
    let owner = ins.owner;

    for (index, node) in nodes.iter_mut().enumerate() {
        let id = NodeId::new(u32::try_from(index).unwrap_or(u32::MAX));
        let inside_owner = tree.is_ancestor_or_self(owner, id) && id != owner;
        let encloses_owner = tree.is_ancestor_or_self(id, owner);

        let (start_stays, end_stays) = match ins.placement {
            Placement::Before => (!inside_owner, !(inside_owner || encloses_owner)),
            Placement::After => (true, !encloses_owner),
        };
        node.span = Span::new(
            shift.adjust(node.span.start, start_stays),
            shift.adjust(node.span.end, end_stays),
        );
        node.full_span = Span::new(
            shift.adjust(node.full_span.start, start_stays),
            shift.adjust(node.full_span.end, end_stays),
        );
    }

    if ins.placement == Placement::After {
        let end = ins.at.saturating_add(len);
        let node = &mut nodes[owner.index()];
        node.span.end = node.span.end.max(end);
        node.full_span.end = node.full_span.end.max(end);
    }
}

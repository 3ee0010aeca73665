//! Marker annotation for body-only edits.
//!
//! Method edits mark the method; accessor edits mark the owning property,
//! parameterized with the accessor kind. All markers for one file go into
//! one `TreeRewriter` batch.

use std::collections::BTreeSet;

use hotpatch_ir::{
    BuildError, Marker, NodeKind, RewriteError, SourceTree, TreeBuilder, TreeRewriter,
    UnresolvedRootError,
};

use crate::{ChangeTarget, RewriteIntent};

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum AnnotateError {
    #[error(transparent)]
    Rewrite(#[from] RewriteError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Root(#[from] UnresolvedRootError),
}

/// The marker an intent puts on its declaration.
pub fn marker_for(target: ChangeTarget) -> Marker {
    match target {
        ChangeTarget::Method => Marker::MethodBodyChanged,
        ChangeTarget::Accessor(kind) => Marker::AccessorBodyChanged(kind),
    }
}

/// Rewrite `tree` with one marker per intent.
///
/// Intent ids refer to `tree`. No intents returns an identical tree.
#[tracing::instrument(level = "debug", skip_all, fields(path = tree.path(), intents = intents.len()))]
pub fn annotate(
    tree: &SourceTree,
    intents: &BTreeSet<RewriteIntent>,
) -> Result<SourceTree, AnnotateError> {
    let mut rewriter = TreeRewriter::new(tree);
    for intent in intents {
        rewriter.add_marker(intent.declaration, marker_for(intent.target));
    }
    Ok(rewriter.finish()?)
}

/// Add the whole-program hot-patch marker to the extra unit.
///
/// When the compilation has no extra unit yet, an empty one is created at
/// `path`.
pub fn assembly_marker(
    extra: Option<&SourceTree>,
    path: &str,
    previous_version: &str,
) -> Result<SourceTree, AnnotateError> {
    let empty;
    let unit = match extra {
        Some(unit) => unit,
        None => {
            let mut builder = TreeBuilder::new(path);
            builder.start(NodeKind::CompilationUnit).finish_node();
            empty = builder.finish()?;
            &empty
        }
    };

    let root = unit.root()?;
    let mut rewriter = TreeRewriter::new(unit);
    rewriter.add_marker(
        root,
        Marker::SupportsHotload {
            previous_version: previous_version.to_string(),
        },
    );
    Ok(rewriter.finish()?)
}

#[cfg(test)]
mod tests;

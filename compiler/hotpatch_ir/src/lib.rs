//! Hotpatch IR - source trees and rewrite primitives
//!
//! This crate contains the data structures shared by the hot-reload and
//! code-generation passes:
//! - Spans for source locations
//! - `SourceTree`: an immutable, pre-order node arena over one file version
//! - `TreeBuilder` for front ends to construct trees
//! - Change regions, text edits and batched node rewriting
//! - Worker fan-out with failure capture
//!
//! # Design Philosophy
//!
//! - **Flatten Everything**: nodes are `NodeId(u32)` indices into one arena,
//!   parents and children are indices too, so there are no cyclic object graphs
//! - **Never Mutate**: rewriting a tree produces a new tree; old versions stay
//!   valid as diff baselines
//! - **Parse Elsewhere**: trees come from an external front end through
//!   `TreeBuilder` or `SourceParser`

/// Compile-time assertion that a type has a specific size.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: [(); $size] = [(); ::std::mem::size_of::<$ty>()];
    };
}

mod builder;
mod change;
mod edit;
mod marker;
mod node;
pub mod parallel;
mod parser;
mod rewrite;
mod span;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod tree;

pub use builder::{BuildError, TreeBuilder};
pub use change::{ChangeRegion, PositionShift};
pub use edit::{apply_regions, EditBatch, EditConflict, TextEdit};
pub use marker::{Marker, ACCESSOR_BODY_MARKER, METHOD_BODY_MARKER, SUPPORTS_HOTLOAD_MARKER};
pub use node::{AccessorKind, Node, NodeId, NodeKind, NodeRange};
pub use parallel::{BoxError, FanOutError, ParallelConfig, WorkerError};
pub use parser::SourceParser;
pub use rewrite::{RewriteError, TreeRewriter};
pub use span::Span;
pub use tree::{SourceTree, SymbolSet, UnresolvedRootError};

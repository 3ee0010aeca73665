//! Change classification: does a file pair differ only inside method and
//! property-accessor bodies?
//!
//! Each change region is located in both trees and classified as trivia
//! (skipped), a body edit (recorded as a rewrite intent for the annotator)
//! or structural (the whole file is `Unsafe`). Any doubt resolves to
//! `Unsafe`.

use std::collections::BTreeSet;
use std::fmt;

use crossbeam::queue::SegQueue;

use hotpatch_ir::parallel::{catch_worker, for_each};
use hotpatch_ir::{
    AccessorKind, ChangeRegion, FanOutError, NodeId, NodeKind, ParallelConfig, SourceTree, Span,
    UnresolvedRootError, WorkerError,
};

use crate::diff::{diff, format_regions};
use crate::EXTRA_UNIT_PATH;

/// Settings for the hot-reload classification pass.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HotloadConfig {
    pub parallel: ParallelConfig,
    /// Attributes whose argument lists carry source positions only. Edits
    /// confined to such an argument list are ignored.
    pub source_location_attributes: Vec<String>,
    /// Synthetic unit that receives the whole-program marker. Excluded
    /// from file-set comparison.
    pub extra_unit_path: String,
}

impl Default for HotloadConfig {
    fn default() -> Self {
        HotloadConfig {
            parallel: ParallelConfig::default(),
            source_location_attributes: vec!["SourceLocation".to_string()],
            extra_unit_path: EXTRA_UNIT_PATH.to_string(),
        }
    }
}

impl HotloadConfig {
    /// Exact simple name, or the name with an `Attribute` suffix.
    pub fn is_source_location_attribute(&self, name: &str) -> bool {
        let simple = name.rsplit('.').next().unwrap_or(name);
        self.source_location_attributes.iter().any(|allowed| {
            simple == allowed
                || simple
                    .strip_suffix("Attribute")
                    .is_some_and(|stem| stem == allowed)
        })
    }
}

/// Which member a body edit belongs to.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub enum ChangeTarget {
    Method,
    /// A get or set accessor of a property.
    Accessor(AccessorKind),
}

/// A body edit to be marked on the new tree.
///
/// `declaration` is the method, or for accessor edits the property, in
/// the new tree.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub struct RewriteIntent {
    pub declaration: NodeId,
    pub target: ChangeTarget,
}

/// Why a file cannot take the body-only path.
///
/// Region variants carry the offending change's span in the new tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UnsafeReason {
    UnresolvedRoot,
    SymbolsChanged,
    /// Change outside every method and accessor body.
    OutsideBody { path: String, span: Span },
    /// Change whose enclosing node contains a declaration.
    NestedDeclaration { path: String, span: Span },
    /// Old and new sides of the change sit in different members.
    TargetMismatch {
        old: String,
        new: String,
        span: Span,
    },
}

impl UnsafeReason {
    pub fn span(&self) -> Option<Span> {
        match self {
            UnsafeReason::UnresolvedRoot | UnsafeReason::SymbolsChanged => None,
            UnsafeReason::OutsideBody { span, .. }
            | UnsafeReason::NestedDeclaration { span, .. }
            | UnsafeReason::TargetMismatch { span, .. } => Some(*span),
        }
    }
}

impl fmt::Display for UnsafeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsafeReason::UnresolvedRoot => write!(f, "root node could not be resolved"),
            UnsafeReason::SymbolsChanged => {
                write!(f, "conditional compilation symbols changed")
            }
            UnsafeReason::OutsideBody { path, .. } => {
                write!(f, "change outside a method or accessor body in `{path}`")
            }
            UnsafeReason::NestedDeclaration { path, .. } => {
                write!(f, "change adds or removes a declaration in `{path}`")
            }
            UnsafeReason::TargetMismatch { old, new, .. } => {
                write!(f, "change moves between `{old}` and `{new}`")
            }
        }
    }
}

impl From<UnresolvedRootError> for UnsafeReason {
    fn from(_: UnresolvedRootError) -> Self {
        UnsafeReason::UnresolvedRoot
    }
}

/// Verdict for one file pair.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FileVerdict {
    Unchanged,
    TriviaOnly,
    SafeBodyEdits(BTreeSet<RewriteIntent>),
    Unsafe(UnsafeReason),
}

impl FileVerdict {
    #[inline]
    pub fn is_unsafe(&self) -> bool {
        matches!(self, FileVerdict::Unsafe(_))
    }

    /// Rewrite intents, empty unless `SafeBodyEdits`.
    pub fn intents(&self) -> impl Iterator<Item = &RewriteIntent> {
        let intents = match self {
            FileVerdict::SafeBodyEdits(intents) => Some(intents),
            _ => None,
        };
        intents.into_iter().flatten()
    }
}

/// Verdict for one file in a batch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileClassification {
    pub path: String,
    pub verdict: FileVerdict,
}

/// Diff and classify one file pair.
#[tracing::instrument(level = "debug", skip_all, fields(path = new.path()))]
pub fn classify(old: &SourceTree, new: &SourceTree, config: &HotloadConfig) -> FileVerdict {
    if old.symbols() != new.symbols() {
        tracing::debug!("symbols changed");
        return FileVerdict::Unsafe(UnsafeReason::SymbolsChanged);
    }
    let regions = match diff(old, new) {
        Ok(regions) => regions,
        Err(e) => {
            tracing::debug!("{e}");
            return FileVerdict::Unsafe(UnsafeReason::UnresolvedRoot);
        }
    };
    let verdict = classify_file(old, new, &regions, config);
    if verdict.is_unsafe() {
        tracing::debug!("unsafe change:\n{}", format_regions(old, new, &regions));
    }
    verdict
}

/// Classify precomputed regions for one file pair.
pub fn classify_file(
    old: &SourceTree,
    new: &SourceTree,
    regions: &[ChangeRegion],
    config: &HotloadConfig,
) -> FileVerdict {
    if old.symbols() != new.symbols() {
        return FileVerdict::Unsafe(UnsafeReason::SymbolsChanged);
    }
    if old.root().is_err() || new.root().is_err() {
        return FileVerdict::Unsafe(UnsafeReason::UnresolvedRoot);
    }
    if regions.is_empty() {
        return FileVerdict::Unchanged;
    }

    let cx = RegionContext { old, new, config };
    let mut intents = BTreeSet::new();
    let mut skipped = 0usize;
    for region in regions {
        match cx.classify_region(region) {
            Ok(RegionClass::Ignorable) => skipped += 1,
            Ok(RegionClass::Body(intent)) => {
                intents.insert(intent);
            }
            Err(reason) => {
                tracing::debug!(%reason, "unsafe region");
                return FileVerdict::Unsafe(reason);
            }
        }
    }

    if skipped == regions.len() {
        FileVerdict::TriviaOnly
    } else {
        FileVerdict::SafeBodyEdits(intents)
    }
}

enum RegionClass {
    /// Trivia or source-location metadata.
    Ignorable,
    Body(RewriteIntent),
}

struct RegionContext<'a> {
    old: &'a SourceTree,
    new: &'a SourceTree,
    config: &'a HotloadConfig,
}

impl RegionContext<'_> {
    fn classify_region(&self, region: &ChangeRegion) -> Result<RegionClass, UnsafeReason> {
        let (old, new) = (self.old, self.new);
        let old_span = region.span;
        let new_span = region.new_span();
        let old_enc = old.enclosing_node(old_span)?;
        let new_enc = new.enclosing_node(new_span)?;

        // Outside the significant span on both sides means the region only
        // touches trivia. Nodes are matched by kind and declaration path, so
        // edits elsewhere inside the same node are classified on their own.
        let trivia = !old.node(old_enc).span.overlaps(old_span)
            && !new.node(new_enc).span.overlaps(new_span)
            && old.kind(old_enc) == new.kind(new_enc)
            && old.declaration_path(old_enc) == new.declaration_path(new_enc);
        if trivia {
            tracing::trace!(path = new.path(), span = ?old_span, "trivia change");
            return Ok(RegionClass::Ignorable);
        }

        let (Some(old_body), Some(new_body)) =
            (body_target(old, old_enc), body_target(new, new_enc))
        else {
            if self.in_source_location_args(old_enc, new_enc) {
                tracing::trace!(path = new.path(), span = ?old_span, "source location change");
                return Ok(RegionClass::Ignorable);
            }
            return Err(UnsafeReason::OutsideBody {
                path: new.declaration_path(new_enc),
                span: new_span,
            });
        };

        if contains_declaration(old, old_enc) || contains_declaration(new, new_enc) {
            return Err(UnsafeReason::NestedDeclaration {
                path: new.declaration_path(new_enc),
                span: new_span,
            });
        }

        let old_path = old.declaration_path(old_body.declaration);
        let new_path = new.declaration_path(new_body.declaration);
        if old_body.target != new_body.target || old_path != new_path {
            return Err(UnsafeReason::TargetMismatch {
                old: old.declaration_path(old_enc),
                new: new.declaration_path(new_enc),
                span: new_span,
            });
        }

        tracing::trace!(path = %new_path, target = ?new_body.target, "body change");
        Ok(RegionClass::Body(new_body))
    }

    /// Both sides confined to the argument list of the same allowlisted
    /// attribute.
    fn in_source_location_args(&self, old_enc: NodeId, new_enc: NodeId) -> bool {
        let old_attr = source_location_attribute(self.old, old_enc, self.config);
        let new_attr = source_location_attribute(self.new, new_enc, self.config);
        match (old_attr, new_attr) {
            (Some(o), Some(n)) => self.old.node(o).name() == self.new.node(n).name(),
            _ => false,
        }
    }
}

/// Nearest body block above `id` that belongs to a member method or to a
/// get/set accessor of a member property.
fn body_target(tree: &SourceTree, id: NodeId) -> Option<RewriteIntent> {
    tree.ancestors_or_self(id)
        .filter(|&n| tree.kind(n).is_body())
        .find_map(|body| {
            let owner = tree.parent(body)?;
            match tree.kind(owner) {
                NodeKind::Method if is_member(tree, owner) => Some(RewriteIntent {
                    declaration: owner,
                    target: ChangeTarget::Method,
                }),
                NodeKind::Accessor(kind) if kind.is_property_get_set() => {
                    let property = tree.parent(owner)?;
                    (tree.kind(property) == NodeKind::Property && is_member(tree, property))
                        .then_some(RewriteIntent {
                            declaration: property,
                            target: ChangeTarget::Accessor(kind),
                        })
                }
                _ => None,
            }
        })
}

/// Declared directly in a type, not a local function inside a body.
fn is_member(tree: &SourceTree, decl: NodeId) -> bool {
    tree.parent(decl)
        .is_some_and(|p| tree.kind(p) == NodeKind::TypeDecl)
}

fn contains_declaration(tree: &SourceTree, id: NodeId) -> bool {
    tree.descendants_or_self(id)
        .any(|n| tree.kind(n).is_declaration())
}

/// The allowlisted attribute whose argument list holds `id`.
fn source_location_attribute(
    tree: &SourceTree,
    id: NodeId,
    config: &HotloadConfig,
) -> Option<NodeId> {
    let args = tree
        .ancestors_or_self(id)
        .find(|&n| tree.kind(n) == NodeKind::AttributeArguments)?;
    let attr = tree.parent(args)?;
    let name = tree.node(attr).name()?;
    (tree.kind(attr) == NodeKind::Attribute && config.is_source_location_attribute(name))
        .then_some(attr)
}

/// One old/new pair in a batch.
#[derive(Copy, Clone, Debug)]
pub struct FilePair<'a> {
    pub old: &'a SourceTree,
    pub new: &'a SourceTree,
}

/// Classify every pair in parallel.
///
/// Every file is classified even when some workers fail; afterwards one
/// failure is returned as `Single`, several as `Aggregate`. Results are
/// ordered by path.
#[tracing::instrument(level = "debug", skip_all, fields(files = pairs.len()))]
pub fn classify_all(
    pairs: &[FilePair<'_>],
    config: &HotloadConfig,
) -> Result<Vec<FileClassification>, FanOutError> {
    classify_with(pairs, &config.parallel, |pair| Ok(classify(pair.old, pair.new, config)))
}

pub(crate) fn classify_with<F>(
    pairs: &[FilePair<'_>],
    parallel: &ParallelConfig,
    worker: F,
) -> Result<Vec<FileClassification>, FanOutError>
where
    F: Fn(&FilePair<'_>) -> Result<FileVerdict, hotpatch_ir::BoxError> + Sync + Send,
{
    let verdicts: SegQueue<FileClassification> = SegQueue::new();
    let failures: SegQueue<WorkerError> = SegQueue::new();

    for_each(parallel, pairs, |_, pair| {
        let path = pair.new.path();
        match catch_worker(path, || worker(pair)) {
            Ok(verdict) => verdicts.push(FileClassification {
                path: path.to_string(),
                verdict,
            }),
            Err(failure) => {
                tracing::warn!("{failure}");
                failures.push(failure);
            }
        }
    });

    if let Some(error) = FanOutError::from_failures(drain(failures)) {
        return Err(error);
    }
    let mut verdicts = drain(verdicts);
    verdicts.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(verdicts)
}

fn drain<T>(queue: SegQueue<T>) -> Vec<T> {
    let mut items = Vec::with_capacity(queue.len());
    while let Some(item) = queue.pop() {
        items.push(item);
    }
    items
}

//! Hot reload gate: decides whether a compile can be applied as a
//! body-only patch and, if so, performs the tree swaps.
//!
//! ```text
//! Idle -> Comparing -> Aborted
//!                   -> Annotating -> Committed
//!                                 -> Aborted
//! ```
//!
//! Every run starts from `Idle` and ends in a terminal state. The live
//! compilation set is only touched on commit, so an aborted run leaves it
//! exactly as it was passed in (apart from clearing the hotload flag).

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use hotpatch_diagnostic::{Diagnostic, ErrorCode, HOTLOAD_DECLINED};
use hotpatch_ir::{FanOutError, SourceTree};

use crate::{
    annotate, assembly_marker, classify_all, AnnotateError, FilePair, FileVerdict,
    HotloadConfig, RewriteIntent, UnsafeReason,
};

/// Path of the synthetic unit that carries the whole-program marker.
pub const EXTRA_UNIT_PATH: &str = "__hotpatch_extra.cs";

/// Last known good compilation, the baseline for the next attempt.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    /// Version identifier of the build that is currently running.
    pub version: String,
    /// Trees as they were before any processing (generation, annotation)
    /// of that build.
    pub before_processing: Option<Vec<Arc<SourceTree>>>,
}

impl Snapshot {
    pub fn new(version: impl Into<String>, trees: Vec<Arc<SourceTree>>) -> Self {
        Snapshot {
            version: version.into(),
            before_processing: Some(trees),
        }
    }
}

/// The trees of the compile in progress plus the hotload flag read by the
/// backend.
#[derive(Clone, Debug, Default)]
pub struct CompilationSet {
    trees: Vec<Arc<SourceTree>>,
    hotload_supported: bool,
}

impl CompilationSet {
    pub fn new(trees: Vec<Arc<SourceTree>>) -> Self {
        CompilationSet {
            trees,
            hotload_supported: false,
        }
    }

    #[inline]
    pub fn trees(&self) -> &[Arc<SourceTree>] {
        &self.trees
    }

    /// Whether this compile may be applied as a body-only hot patch.
    #[inline]
    pub fn hotload_supported(&self) -> bool {
        self.hotload_supported
    }

    pub fn get(&self, path: &str) -> Option<&Arc<SourceTree>> {
        self.trees.iter().find(|t| t.path() == path)
    }

    /// Swap the tree with the same path for `tree`. Returns `false` when no
    /// tree has that path.
    pub fn replace(&mut self, tree: Arc<SourceTree>) -> bool {
        match self.trees.iter_mut().find(|t| t.path() == tree.path()) {
            Some(slot) => {
                *slot = tree;
                true
            }
            None => false,
        }
    }

    pub fn push(&mut self, tree: Arc<SourceTree>) {
        self.trees.push(tree);
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum GateState {
    Idle,
    Comparing,
    Annotating,
    Committed,
    Aborted,
}

impl GateState {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, GateState::Committed | GateState::Aborted)
    }
}

/// Why the body-only path was not taken.
#[derive(Clone, Debug)]
pub enum AbortReason {
    NoPreviousCompilation,
    NoBaseline,
    FileSetChanged {
        added: Vec<String>,
        removed: Vec<String>,
    },
    UnsafeFile {
        path: String,
        reason: UnsafeReason,
    },
    WorkerFailed(FanOutError),
    AnnotationFailed {
        path: String,
        error: AnnotateError,
    },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::NoPreviousCompilation => write!(f, "no previous compilation"),
            AbortReason::NoBaseline => write!(f, "no baseline trees for the previous compilation"),
            AbortReason::FileSetChanged { added, removed } => {
                write!(f, "file set changed")?;
                if !added.is_empty() {
                    write!(f, ", added {}", added.join(", "))?;
                }
                if !removed.is_empty() {
                    write!(f, ", removed {}", removed.join(", "))?;
                }
                Ok(())
            }
            AbortReason::UnsafeFile { path, reason } => write!(f, "`{path}`: {reason}"),
            AbortReason::WorkerFailed(error) => write!(f, "{error}"),
            AbortReason::AnnotationFailed { path, error } => {
                write!(f, "annotating `{path}` failed: {error}")
            }
        }
    }
}

impl AbortReason {
    /// Diagnostic for the invoking tool.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            AbortReason::WorkerFailed(error) => error.failures().iter().fold(
                Diagnostic::note(ErrorCode::E1002)
                    .with_message(format!("hot reload classification failed: {error}")),
                |diag, failure| diag.with_note(failure.trace_text()),
            ),
            AbortReason::UnsafeFile { path, reason } => {
                let diag = HOTLOAD_DECLINED
                    .create(&[&self.to_string()])
                    .in_file(path.as_str());
                match reason.span() {
                    Some(span) => diag.with_label(span, "needs a full reload"),
                    None => diag,
                }
            }
            AbortReason::AnnotationFailed { path, .. } => HOTLOAD_DECLINED
                .create(&[&self.to_string()])
                .in_file(path.as_str()),
            _ => HOTLOAD_DECLINED.create(&[&self.to_string()]),
        }
    }
}

#[derive(Clone, Debug)]
pub enum GateOutcome {
    /// Paths of the trees that were swapped for annotated versions, sorted.
    /// The extra unit is not listed.
    Committed { rewritten: Vec<String> },
    Aborted(AbortReason),
}

impl GateOutcome {
    #[inline]
    pub fn is_committed(&self) -> bool {
        matches!(self, GateOutcome::Committed { .. })
    }
}

pub struct HotloadGate {
    config: HotloadConfig,
    state: GateState,
}

impl HotloadGate {
    pub fn new(config: HotloadConfig) -> Self {
        HotloadGate {
            config,
            state: GateState::Idle,
        }
    }

    #[inline]
    pub fn config(&self) -> &HotloadConfig {
        &self.config
    }

    /// State reached by the last run.
    #[inline]
    pub fn state(&self) -> GateState {
        self.state
    }

    /// Run one attempt against the live compilation set.
    #[tracing::instrument(level = "debug", skip_all, fields(trees = current.trees.len()))]
    pub fn run(
        &mut self,
        previous: Option<&Snapshot>,
        current: &mut CompilationSet,
    ) -> GateOutcome {
        self.state = GateState::Idle;
        current.hotload_supported = false;
        self.enter(GateState::Comparing);

        let outcome = match self.attempt(previous, current) {
            Ok(commit) => {
                let rewritten = commit.apply(current);
                self.enter(GateState::Committed);
                GateOutcome::Committed { rewritten }
            }
            Err(reason) => {
                tracing::debug!(%reason, "hot reload aborted");
                self.enter(GateState::Aborted);
                GateOutcome::Aborted(reason)
            }
        };
        debug_assert!(self.state.is_terminal());
        outcome
    }

    fn enter(&mut self, state: GateState) {
        tracing::debug!(from = ?self.state, to = ?state, "gate transition");
        self.state = state;
    }

    /// Compare and annotate without touching `current`.
    fn attempt(
        &mut self,
        previous: Option<&Snapshot>,
        current: &CompilationSet,
    ) -> Result<Commit, AbortReason> {
        let previous = previous.ok_or(AbortReason::NoPreviousCompilation)?;
        let baseline = previous
            .before_processing
            .as_deref()
            .ok_or(AbortReason::NoBaseline)?;

        // Owned so `enter` can borrow the gate mutably below.
        let extra_path = self.config.extra_unit_path.clone();
        let extra = extra_path.as_str();
        let old_by_path: FxHashMap<&str, &SourceTree> = baseline
            .iter()
            .filter(|t| t.path() != extra)
            .map(|t| (t.path(), &**t))
            .collect();
        let new_trees: Vec<&SourceTree> = current
            .trees
            .iter()
            .filter(|t| t.path() != extra)
            .map(Arc::as_ref)
            .collect();
        check_file_set(&old_by_path, &new_trees)?;

        let pairs: Vec<FilePair<'_>> = new_trees
            .iter()
            .filter_map(|&new| {
                old_by_path
                    .get(new.path())
                    .map(|&old| FilePair { old, new })
            })
            .collect();
        let classifications =
            classify_all(&pairs, &self.config).map_err(AbortReason::WorkerFailed)?;
        let first_unsafe = classifications.iter().find_map(|c| match &c.verdict {
            FileVerdict::Unsafe(reason) => Some((c.path.as_str(), reason)),
            _ => None,
        });
        if let Some((path, reason)) = first_unsafe {
            return Err(AbortReason::UnsafeFile {
                path: path.to_string(),
                reason: reason.clone(),
            });
        }

        self.enter(GateState::Annotating);
        let mut replacements = Vec::new();
        for classification in &classifications {
            let FileVerdict::SafeBodyEdits(intents) = &classification.verdict else {
                continue;
            };
            let Some(&new) = new_trees.iter().find(|t| t.path() == classification.path) else {
                continue;
            };
            let annotated = annotate_file(new, intents)?;
            replacements.push(Arc::new(annotated));
        }

        let extra_unit = assembly_marker(
            current.get(extra).map(Arc::as_ref),
            extra,
            &previous.version,
        )
        .map_err(|error| AbortReason::AnnotationFailed {
            path: extra.to_string(),
            error,
        })?;

        Ok(Commit {
            replacements,
            extra_unit: Arc::new(extra_unit),
        })
    }
}

fn annotate_file(
    tree: &SourceTree,
    intents: &BTreeSet<RewriteIntent>,
) -> Result<SourceTree, AbortReason> {
    annotate(tree, intents).map_err(|error| AbortReason::AnnotationFailed {
        path: tree.path().to_string(),
        error,
    })
}

fn check_file_set(
    old_by_path: &FxHashMap<&str, &SourceTree>,
    new_trees: &[&SourceTree],
) -> Result<(), AbortReason> {
    let new_paths: BTreeSet<&str> = new_trees.iter().map(|t| t.path()).collect();
    let old_paths: BTreeSet<&str> = old_by_path.keys().copied().collect();
    if new_paths == old_paths {
        return Ok(());
    }
    Err(AbortReason::FileSetChanged {
        added: new_paths
            .difference(&old_paths)
            .map(|p| (*p).to_string())
            .collect(),
        removed: old_paths
            .difference(&new_paths)
            .map(|p| (*p).to_string())
            .collect(),
    })
}

/// Tree swaps computed by a successful attempt.
struct Commit {
    replacements: Vec<Arc<SourceTree>>,
    extra_unit: Arc<SourceTree>,
}

impl Commit {
    fn apply(self, current: &mut CompilationSet) -> Vec<String> {
        let mut rewritten: Vec<String> = Vec::with_capacity(self.replacements.len());
        for tree in self.replacements {
            rewritten.push(tree.path().to_string());
            current.replace(tree);
        }
        if !current.replace(Arc::clone(&self.extra_unit)) {
            current.push(self.extra_unit);
        }
        current.hotload_supported = true;
        rewritten.sort();
        rewritten
    }
}

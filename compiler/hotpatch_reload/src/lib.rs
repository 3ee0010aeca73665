//! Body-only hot reload.
//!
//! Given the previous build's trees and the trees of the compile in
//! progress, decide whether every change sits inside method or accessor
//! bodies. If so, mark the changed members and the extra unit so the
//! backend emits a hot patch instead of a full reload.
//!
//! - `diff`: change regions per file pair
//! - `classify`: per-file verdicts, fanned out over all files
//! - `annotate`: marker rewriting
//! - `gate`: the state machine that ties them together

mod annotate;
mod classify;
mod diff;
mod gate;

pub use annotate::{annotate, assembly_marker, marker_for, AnnotateError};
pub use classify::{
    classify, classify_all, classify_file, ChangeTarget, FileClassification, FilePair,
    FileVerdict, HotloadConfig, RewriteIntent, UnsafeReason,
};
pub use diff::{diff, format_regions, MAX_LISTED_LINES};
pub use gate::{
    AbortReason, CompilationSet, GateOutcome, GateState, HotloadGate, Snapshot, EXTRA_UNIT_PATH,
};

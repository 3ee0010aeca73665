//! Hot reload and source generation for a background compiler.
//!
//! The host parses source files into `SourceTree`s and hands them to a
//! `HotpatchSession` once per compile. The session decides whether the
//! compile can be applied as a body-only hot patch, runs source generators
//! over the trees, and keeps the baseline for the next decision.
//!
//! Enable logging with `RUST_LOG=hotpatch_reload=debug` (or `trace` for
//! per-region decisions) after calling [`init_tracing`].

mod session;

use std::sync::Once;

pub use hotpatch_diagnostic::{
    generator_crash, Diagnostic, DiagnosticDescriptor, ErrorCode, Severity, GENERATOR_CRASH,
    HOTLOAD_DECLINED,
};
pub use hotpatch_gen::{
    GenerationConfig, GenerationContext, GenerationOutput, GenerationResult, Generator,
    OutputPaths, ParallelGenerationDriver, TagSet, LOOSE_CODE_PATH,
};
pub use hotpatch_ir::{
    AccessorKind, BoxError, ChangeRegion, FanOutError, Marker, NodeId, NodeKind, ParallelConfig,
    SourceParser, SourceTree, Span, SymbolSet, TreeBuilder, UnresolvedRootError, WorkerError,
};
pub use hotpatch_reload::{
    annotate, classify, classify_all, diff, format_regions, AbortReason, ChangeTarget,
    CompilationSet, FilePair, FileVerdict, GateOutcome, GateState, HotloadConfig, HotloadGate,
    RewriteIntent, Snapshot, UnsafeReason, EXTRA_UNIT_PATH,
};
pub use session::{CycleOutput, HotpatchSession, SessionConfig};

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Does nothing unless `RUST_LOG` is set. Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

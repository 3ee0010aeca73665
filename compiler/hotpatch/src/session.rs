//! One background compile cycle: hot reload gate, then generation.
//!
//! The session owns the last known good snapshot. `compile` never changes
//! it; the host calls `commit` once the backend has produced a build from
//! the cycle's output, and the trees that went *into* that cycle become
//! the baseline for the next one.

use std::sync::Arc;

use hotpatch_diagnostic::Diagnostic;
use hotpatch_gen::{GenerationConfig, Generator, OutputPaths, ParallelGenerationDriver};
use hotpatch_ir::{FanOutError, SourceParser, SourceTree};
use hotpatch_reload::{
    AbortReason, CompilationSet, GateOutcome, HotloadConfig, HotloadGate, Snapshot,
};

#[derive(Clone, Debug, Default)]
pub struct SessionConfig {
    pub hotload: HotloadConfig,
    pub generation: GenerationConfig,
}

/// Everything the backend needs from one cycle.
#[derive(Clone, Debug)]
pub struct CycleOutput {
    pub hotload: GateOutcome,
    /// Emit a body-only hot patch instead of a full build.
    pub hotload_supported: bool,
    pub trees: Vec<Arc<SourceTree>>,
    pub diagnostics: Vec<Diagnostic>,
    /// Set when generation was skipped for this cycle.
    pub generation_failure: Option<FanOutError>,
}

pub struct HotpatchSession<P> {
    gate: HotloadGate,
    driver: ParallelGenerationDriver<P>,
    paths: OutputPaths,
    last_good: Option<Snapshot>,
    pending: Option<Vec<Arc<SourceTree>>>,
}

impl<P: SourceParser> HotpatchSession<P> {
    pub fn new(config: SessionConfig, parser: P) -> Self {
        HotpatchSession {
            gate: HotloadGate::new(config.hotload),
            driver: ParallelGenerationDriver::new(config.generation, parser),
            paths: OutputPaths::new(),
            last_good: None,
            pending: None,
        }
    }

    #[must_use]
    pub fn with_output_paths(mut self, paths: OutputPaths) -> Self {
        self.paths = paths;
        self
    }

    pub fn last_good(&self) -> Option<&Snapshot> {
        self.last_good.as_ref()
    }

    /// Run the gate over `trees`, then generation over the gate's output.
    #[tracing::instrument(level = "debug", skip_all, fields(trees = trees.len()))]
    pub fn compile<H, G>(
        &mut self,
        trees: Vec<Arc<SourceTree>>,
        generator: &G,
        handle: &H,
    ) -> CycleOutput
    where
        H: Sync,
        G: Generator<H>,
    {
        self.pending = Some(trees.clone());
        let mut set = CompilationSet::new(trees);
        let hotload = self.gate.run(self.last_good.as_ref(), &mut set);

        let mut diagnostics = Vec::new();
        if let GateOutcome::Aborted(reason) = &hotload {
            // First build: nothing to patch.
            if !matches!(reason, AbortReason::NoPreviousCompilation) {
                diagnostics.push(reason.to_diagnostic());
            }
        }

        let hotload_supported = set.hotload_supported();
        let generation = self.driver.run(set.trees(), generator, handle, &self.paths);
        diagnostics.extend(generation.diagnostics);
        tracing::debug!(
            hotload_supported,
            diagnostics = diagnostics.len(),
            "compile cycle finished"
        );

        CycleOutput {
            hotload,
            hotload_supported,
            trees: generation.trees,
            diagnostics,
            generation_failure: generation.failure,
        }
    }

    /// Record the last cycle's inputs as the baseline for `version`.
    /// Returns `false` when no cycle is pending.
    pub fn commit(&mut self, version: impl Into<String>) -> bool {
        match self.pending.take() {
            Some(trees) => {
                let version = version.into();
                tracing::debug!(%version, trees = trees.len(), "baseline committed");
                self.last_good = Some(Snapshot::new(version, trees));
                true
            }
            None => false,
        }
    }

    /// Drop the last cycle's inputs after a failed build.
    pub fn discard(&mut self) {
        self.pending = None;
    }
}

//! Parallel generation driver.
//!
//! Every input tree goes to one worker. Workers run in any order; after
//! the join their outputs are sorted by the originating file's path (then
//! by input position) before anything is merged, so the same inputs always
//! produce the same trees, loose-code text and diagnostics.
//!
//! A pass either applies completely or not at all: if any worker fails the
//! input trees are returned unchanged with a single crash diagnostic.

use std::sync::Arc;

use crossbeam::queue::SegQueue;
use rustc_hash::FxHashMap;

use hotpatch_diagnostic::{generator_crash, Diagnostic};
use hotpatch_ir::parallel::{catch_worker, for_each};
use hotpatch_ir::{
    BoxError, FanOutError, ParallelConfig, SourceParser, SourceTree, SymbolSet, WorkerError,
};

use crate::TagSet;

/// Path of the synthetic tree holding all loose code of a pass.
pub const LOOSE_CODE_PATH: &str = "__hotpatch_loose.cs";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GenerationConfig {
    pub parallel: ParallelConfig,
    pub loose_code_path: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            parallel: ParallelConfig::default(),
            loose_code_path: LOOSE_CODE_PATH.to_string(),
        }
    }
}

/// Where generated trees for a source file should be written.
#[derive(Clone, Debug, Default)]
pub struct OutputPaths {
    remap: FxHashMap<String, String>,
}

impl OutputPaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: impl Into<String>, output: impl Into<String>) {
        self.remap.insert(source.into(), output.into());
    }

    /// Output path for `source`; unmapped paths resolve to themselves.
    pub fn resolve<'a>(&'a self, source: &'a str) -> &'a str {
        self.remap.get(source).map_or(source, String::as_str)
    }
}

/// Shared state handed to every worker of a pass.
pub struct GenerationContext<'a, H> {
    /// Opaque symbol/type resolution handle owned by the host.
    pub handle: &'a H,
    pub tags: &'a TagSet,
    pub paths: &'a OutputPaths,
}

/// What one worker asks for.
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct GenerationOutput {
    /// Replaces the input tree.
    pub replacement: Option<SourceTree>,
    pub added: Vec<SourceTree>,
    pub diagnostics: Vec<Diagnostic>,
    /// Text merged with every other worker's loose code into one tree.
    pub loose_code: Option<String>,
}

impl GenerationOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replacement(mut self, tree: SourceTree) -> Self {
        self.replacement = Some(tree);
        self
    }

    pub fn with_added(mut self, tree: SourceTree) -> Self {
        self.added.push(tree);
        self
    }

    pub fn with_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostics.push(diagnostic);
        self
    }

    pub fn with_loose_code(mut self, text: impl Into<String>) -> Self {
        self.loose_code = Some(text.into());
        self
    }
}

/// A source generator, run once per input tree.
pub trait Generator<H>: Sync {
    fn generate(
        &self,
        tree: &SourceTree,
        cx: &GenerationContext<'_, H>,
    ) -> Result<GenerationOutput, BoxError>;
}

impl<H, F> Generator<H> for F
where
    F: Fn(&SourceTree, &GenerationContext<'_, H>) -> Result<GenerationOutput, BoxError> + Sync,
{
    fn generate(
        &self,
        tree: &SourceTree,
        cx: &GenerationContext<'_, H>,
    ) -> Result<GenerationOutput, BoxError> {
        self(tree, cx)
    }
}

/// One worker's output with the input it came from.
#[derive(Clone, Debug)]
pub struct WorkerOutput {
    pub path: String,
    /// Position of the input tree.
    pub index: usize,
    pub output: GenerationOutput,
}

/// Outcome of a pass.
#[derive(Clone, Debug)]
pub struct GenerationResult {
    pub trees: Vec<Arc<SourceTree>>,
    pub diagnostics: Vec<Diagnostic>,
    /// Set when generation was skipped because a worker failed.
    pub failure: Option<FanOutError>,
}

impl GenerationResult {
    #[inline]
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

pub struct ParallelGenerationDriver<P> {
    config: GenerationConfig,
    parser: P,
}

impl<P: SourceParser> ParallelGenerationDriver<P> {
    pub fn new(config: GenerationConfig, parser: P) -> Self {
        ParallelGenerationDriver { config, parser }
    }

    #[inline]
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Run `generator` over `trees` and merge the results.
    ///
    /// Final order: the inputs in their original order (replaced where a
    /// worker asked), then the loose-code tree if any worker emitted loose
    /// code, then added trees in sorted worker order.
    #[tracing::instrument(level = "debug", skip_all, fields(trees = trees.len()))]
    pub fn run<H, G>(
        &self,
        trees: &[Arc<SourceTree>],
        generator: &G,
        handle: &H,
        paths: &OutputPaths,
    ) -> GenerationResult
    where
        H: Sync,
        G: Generator<H>,
    {
        let tags = TagSet::new();
        let cx = GenerationContext {
            handle,
            tags: &tags,
            paths,
        };
        let merged = self
            .run_workers(trees, generator, &cx)
            .and_then(|outputs| self.merge(trees, outputs));

        match merged {
            Ok(result) => {
                tracing::debug!(
                    trees = result.trees.len(),
                    diagnostics = result.diagnostics.len(),
                    "generation complete"
                );
                result
            }
            Err(failure) => {
                tracing::warn!("generation skipped: {failure}");
                GenerationResult {
                    trees: trees.to_vec(),
                    diagnostics: vec![crash_diagnostic(&failure)],
                    failure: Some(failure),
                }
            }
        }
    }

    /// Run every worker and return their outputs sorted by `(path, index)`.
    ///
    /// One failed worker is returned as `Single`, several as `Aggregate`;
    /// either way every worker has run to completion first.
    pub fn run_workers<H, G>(
        &self,
        trees: &[Arc<SourceTree>],
        generator: &G,
        cx: &GenerationContext<'_, H>,
    ) -> Result<Vec<WorkerOutput>, FanOutError>
    where
        H: Sync,
        G: Generator<H>,
    {
        let outputs: SegQueue<WorkerOutput> = SegQueue::new();
        let failures: SegQueue<WorkerError> = SegQueue::new();

        for_each(&self.config.parallel, trees, |index, tree| {
            match catch_worker(tree.path(), || generator.generate(tree, cx)) {
                Ok(output) => outputs.push(WorkerOutput {
                    path: tree.path().to_string(),
                    index,
                    output,
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
        let mut outputs = drain(outputs);
        outputs.sort_by(|a, b| a.path.cmp(&b.path).then(a.index.cmp(&b.index)));
        Ok(outputs)
    }

    fn merge(
        &self,
        inputs: &[Arc<SourceTree>],
        outputs: Vec<WorkerOutput>,
    ) -> Result<GenerationResult, FanOutError> {
        let mut trees = inputs.to_vec();
        let mut diagnostics = Vec::new();
        let mut fragments: Vec<String> = Vec::new();
        let mut added = Vec::new();

        for worker in outputs {
            let output = worker.output;
            if let Some(replacement) = output.replacement {
                trees[worker.index] = Arc::new(replacement);
            }
            diagnostics.extend(output.diagnostics);
            fragments.extend(output.loose_code);
            added.extend(output.added.into_iter().map(Arc::new));
        }

        if !fragments.is_empty() {
            let path = self.config.loose_code_path.as_str();
            let symbols = inputs
                .first()
                .map(|t| t.symbols().clone())
                .unwrap_or_default();
            let loose = self.parse_loose(path, &fragments.join("\n"), &symbols)?;
            trees.push(Arc::new(loose));
        }
        trees.extend(added);

        Ok(GenerationResult {
            trees,
            diagnostics,
            failure: None,
        })
    }

    /// Loose code is parsed like any worker's output; a parse failure
    /// fails the pass.
    fn parse_loose(
        &self,
        path: &str,
        text: &str,
        symbols: &SymbolSet,
    ) -> Result<SourceTree, FanOutError> {
        catch_worker(path, || self.parser.parse(path, text, symbols)).map_err(FanOutError::Single)
    }
}

/// The single diagnostic reported for a failed pass.
fn crash_diagnostic(failure: &FanOutError) -> Diagnostic {
    match failure {
        FanOutError::Single(one) => {
            generator_crash(Some(one.path.as_str()), &one.to_string(), &one.trace_text())
        }
        FanOutError::Aggregate(all) => {
            let trace: Vec<String> = all.iter().map(WorkerError::trace_text).collect();
            generator_crash(None, &failure.to_string(), &trace.join("\n"))
        }
    }
}

fn drain<T>(queue: SegQueue<T>) -> Vec<T> {
    let mut items = Vec::with_capacity(queue.len());
    while let Some(item) = queue.pop() {
        items.push(item);
    }
    items
}

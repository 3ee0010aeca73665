//! Fixtures shared by the scenarios.

use std::sync::Arc;

use hotpatch::{
    BoxError, CompilationSet, GateOutcome, GenerationContext, GenerationOutput, HotloadConfig,
    HotloadGate, Snapshot, SourceTree,
};
use hotpatch_ir::testing::{method, ClassFixture, FileFixture};

/// `class <name>` with one method per `(name, statements)` entry.
pub fn class(name: &str, methods: &[(&str, &[&str])]) -> ClassFixture {
    methods
        .iter()
        .fold(ClassFixture::new(name), |acc, (m, body)| {
            acc.method(method(m, body.iter().copied()))
        })
}

/// `<path>` holding `class` inside `namespace Game`.
pub fn file(path: &str, class: ClassFixture) -> Arc<SourceTree> {
    Arc::new(
        FileFixture::new(path)
            .namespace("Game")
            .class(class)
            .build()
            .unwrap(),
    )
}

/// Run a fresh gate with `old` as the previous build's baseline.
pub fn gate(old: &[Arc<SourceTree>], new: &[Arc<SourceTree>]) -> (GateOutcome, CompilationSet) {
    let previous = Snapshot::new("build-1", old.to_vec());
    let mut current = CompilationSet::new(new.to_vec());
    let outcome = HotloadGate::new(HotloadConfig::default()).run(Some(&previous), &mut current);
    (outcome, current)
}

/// Generator that changes nothing.
pub fn no_generation(
    _: &SourceTree,
    _: &GenerationContext<'_, ()>,
) -> Result<GenerationOutput, BoxError> {
    Ok(GenerationOutput::new())
}

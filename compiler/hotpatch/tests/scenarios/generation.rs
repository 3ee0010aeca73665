//! Parallel generation through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hotpatch::{
    BoxError, ErrorCode, FanOutError, GenerationConfig, GenerationContext, GenerationOutput,
    OutputPaths, ParallelConfig, ParallelGenerationDriver, SourceParser, SourceTree, SymbolSet,
    LOOSE_CODE_PATH,
};
use hotpatch_ir::testing::PlainTextParser;
use pretty_assertions::assert_eq;

use crate::common::{class, file};

type Cx<'a> = GenerationContext<'a, ()>;

fn driver() -> ParallelGenerationDriver<PlainTextParser> {
    ParallelGenerationDriver::new(
        GenerationConfig {
            parallel: ParallelConfig::with_threads(8),
            ..GenerationConfig::default()
        },
        PlainTextParser,
    )
}

fn partial_files() -> Vec<Arc<SourceTree>> {
    ["Player.Move.cs", "Player.Input.cs", "Enemy.cs", "Player.Draw.cs"]
        .into_iter()
        .map(|path| {
            let name = path.split('.').next().unwrap_or(path);
            file(path, class(name, &[("Tick", &["t = 0;"])]))
        })
        .collect()
}

/// Emits one `Generated` member per class, however many files the class
/// is split across.
fn partial_members(tree: &SourceTree, cx: &Cx<'_>) -> Result<GenerationOutput, BoxError> {
    let class = tree.path().split('.').next().unwrap_or("");
    let out = GenerationOutput::new();
    if !cx.tags.claim(class) {
        return Ok(out);
    }
    Ok(out.with_loose_code(format!("partial class {class} {{ void Generated() {{ }} }}")))
}

#[test]
fn repeated_runs_are_byte_identical() {
    let trees = partial_files();
    let paths = OutputPaths::new();
    let runs: Vec<(Vec<String>, String)> = (0..8)
        .map(|_| {
            let result = driver().run(&trees, &partial_members, &(), &paths);
            assert!(result.is_success());
            let order = result.trees.iter().map(|t| t.path().to_string()).collect();
            let loose = result
                .trees
                .iter()
                .find(|t| t.path() == LOOSE_CODE_PATH)
                .map(|t| t.text().to_string())
                .unwrap();
            (order, loose)
        })
        .collect();

    assert!(runs.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(
        runs[0].1,
        "partial class Enemy { void Generated() { } }\n\
         partial class Player { void Generated() { } }"
    );
}

#[test]
fn tag_race_lets_exactly_one_worker_generate() {
    let trees: Vec<Arc<SourceTree>> = (0..32)
        .map(|i| file(&format!("Player.{i}.cs"), class("Player", &[("Tick", &["t = 0;"])])))
        .collect();
    let generated = AtomicUsize::new(0);
    let generator = |_: &SourceTree, cx: &Cx<'_>| -> Result<GenerationOutput, BoxError> {
        if cx.tags.claim("Player") {
            generated.fetch_add(1, Ordering::SeqCst);
        }
        Ok(GenerationOutput::new())
    };

    let result = driver().run(&trees, &generator, &(), &OutputPaths::new());
    assert!(result.is_success());
    assert_eq!(generated.load(Ordering::SeqCst), 1);
}

#[test]
fn one_failure_is_surfaced_as_that_failure() {
    let trees = partial_files();
    let generator = |t: &SourceTree, _: &Cx<'_>| -> Result<GenerationOutput, BoxError> {
        if t.path() == "Enemy.cs" {
            return Err("enemy table missing".into());
        }
        Ok(GenerationOutput::new().with_loose_code("// ok"))
    };
    let result = driver().run(&trees, &generator, &(), &OutputPaths::new());

    let Some(FanOutError::Single(failure)) = &result.failure else {
        panic!("expected a single failure, got {:?}", result.failure);
    };
    assert_eq!(failure.path, "Enemy.cs");
    assert_eq!(failure.message, "enemy table missing");
    assert_eq!(result.trees.len(), trees.len());
    assert!(result
        .trees
        .iter()
        .zip(&trees)
        .all(|(after, before)| Arc::ptr_eq(after, before)));

    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, ErrorCode::E9001);
    assert!(result.diagnostics[0].is_error());
}

#[test]
fn several_failures_are_surfaced_together() {
    let trees = partial_files();
    let generator = |t: &SourceTree, _: &Cx<'_>| -> Result<GenerationOutput, BoxError> {
        if t.path().starts_with("Player") {
            return Err(format!("cannot generate {}", t.path()).into());
        }
        Ok(GenerationOutput::new())
    };
    let result = driver().run(&trees, &generator, &(), &OutputPaths::new());

    let Some(FanOutError::Aggregate(failures)) = &result.failure else {
        panic!("expected an aggregate failure, got {:?}", result.failure);
    };
    let paths: Vec<&str> = failures.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, ["Player.Draw.cs", "Player.Input.cs", "Player.Move.cs"]);
    assert_eq!(result.diagnostics.len(), 1);
}

#[test]
fn loose_code_is_parsed_with_the_input_symbols() {
    let trees = vec![Arc::new(
        PlainTextParser
            .parse("A.cs", "class A", &SymbolSet::from(["DEBUG".to_string()]))
            .unwrap(),
    )];
    let generator = |_: &SourceTree, _: &Cx<'_>| -> Result<GenerationOutput, BoxError> {
        Ok(GenerationOutput::new().with_loose_code("class Loose"))
    };
    let result = driver().run(&trees, &generator, &(), &OutputPaths::new());
    let loose = result.trees.last().unwrap();
    assert_eq!(loose.path(), LOOSE_CODE_PATH);
    assert!(loose.symbols().contains("DEBUG"));
}

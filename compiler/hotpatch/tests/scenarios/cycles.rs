//! Several compile cycles through one session.

use std::sync::Arc;

use hotpatch::{
    AbortReason, BoxError, ErrorCode, GateOutcome, GenerationContext, GenerationOutput,
    HotpatchSession, SessionConfig, SourceTree, EXTRA_UNIT_PATH, LOOSE_CODE_PATH,
};
use hotpatch_ir::testing::PlainTextParser;
use pretty_assertions::assert_eq;

use crate::common::{class, file, no_generation};

fn session() -> HotpatchSession<PlainTextParser> {
    hotpatch::init_tracing();
    HotpatchSession::new(SessionConfig::default(), PlainTextParser)
}

fn game(tick: &str) -> Vec<Arc<SourceTree>> {
    vec![
        file("Player.cs", class("Player", &[("Tick", &[tick])])),
        file("World.cs", class("World", &[("Step", &["w = 0;"])])),
    ]
}

#[test]
fn edit_commit_edit_cycle() {
    let mut session = session();

    let cold = session.compile(game("x = 1;"), &no_generation, &());
    assert!(!cold.hotload_supported);
    assert!(session.commit("build-1"));

    let warm = session.compile(game("x = 2;"), &no_generation, &());
    assert!(warm.hotload_supported);
    let GateOutcome::Committed { rewritten } = &warm.hotload else {
        panic!("expected commit, got {:?}", warm.hotload);
    };
    assert_eq!(rewritten, &["Player.cs"]);
    let extra = warm
        .trees
        .iter()
        .find(|t| t.path() == EXTRA_UNIT_PATH)
        .unwrap();
    assert!(extra.text().contains("SupportsHotload(\"build-1\")"));
    assert!(session.commit("build-2"));

    // Baseline is the un-annotated input of build-2, so reverting the
    // statement is again a body-only change.
    let revert = session.compile(game("x = 1;"), &no_generation, &());
    assert!(revert.hotload_supported);
    let extra = revert
        .trees
        .iter()
        .find(|t| t.path() == EXTRA_UNIT_PATH)
        .unwrap();
    assert!(extra.text().contains("SupportsHotload(\"build-2\")"));
}

#[test]
fn structural_edit_needs_full_reload() {
    let mut session = session();
    session.compile(game("x = 1;"), &no_generation, &());
    session.commit("build-1");

    let mut trees = game("x = 1;");
    trees[1] = file(
        "World.cs",
        class("World", &[("Step", &["w = 0;"]), ("Reset", &["w = 1;"])]),
    );
    let out = session.compile(trees, &no_generation, &());

    assert!(!out.hotload_supported);
    assert!(matches!(
        out.hotload,
        GateOutcome::Aborted(AbortReason::UnsafeFile { ref path, .. }) if path == "World.cs"
    ));
    assert_eq!(out.diagnostics.len(), 1);
    assert_eq!(out.diagnostics[0].code, ErrorCode::E1001);
    assert_eq!(out.diagnostics[0].file.as_deref(), Some("World.cs"));
    assert!(out.trees.iter().all(|t| t.path() != EXTRA_UNIT_PATH));
}

#[test]
fn generation_runs_over_annotated_trees() {
    let marker_aware = |t: &SourceTree,
                        _: &GenerationContext<'_, ()>|
     -> Result<GenerationOutput, BoxError> {
        let out = GenerationOutput::new();
        if t.text().contains("[MethodBodyChange]") {
            return Ok(out.with_loose_code(format!("// patched {}", t.path())));
        }
        Ok(out)
    };

    let mut session = session();
    session.compile(game("x = 1;"), &marker_aware, &());
    session.commit("build-1");
    let out = session.compile(game("x = 2;"), &marker_aware, &());

    let paths: Vec<&str> = out.trees.iter().map(|t| t.path()).collect();
    assert_eq!(paths, ["Player.cs", "World.cs", EXTRA_UNIT_PATH, LOOSE_CODE_PATH]);
    assert_eq!(out.trees[3].text(), "// patched Player.cs");
}

#[test]
fn generator_crash_keeps_the_cycle_going() {
    let crashing = |t: &SourceTree,
                    _: &GenerationContext<'_, ()>|
     -> Result<GenerationOutput, BoxError> {
        if t.path() == "World.cs" {
            return Err("world generator is broken".into());
        }
        Ok(GenerationOutput::new().with_loose_code("// never applied"))
    };

    let mut session = session();
    let inputs = game("x = 1;");
    let out = session.compile(inputs.clone(), &crashing, &());

    assert!(out.generation_failure.is_some());
    assert_eq!(out.trees.len(), inputs.len());
    assert!(out.trees.iter().zip(&inputs).all(|(a, b)| Arc::ptr_eq(a, b)));
    assert_eq!(out.diagnostics.len(), 1);
    assert_eq!(out.diagnostics[0].code, ErrorCode::E9001);
    assert!(out.diagnostics[0]
        .message
        .contains("world generator is broken"));
    assert!(session.commit("build-1"));
}

//! Gate decisions over whole compilation sets.

use std::sync::Arc;

use hotpatch::{
    classify, diff, AbortReason, AccessorKind, ChangeTarget, FileVerdict, GateOutcome,
    HotloadConfig, Marker, NodeKind, SourceTree, EXTRA_UNIT_PATH,
};
use hotpatch_ir::testing::{method, ClassFixture, FileFixture, PropertyFixture};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use crate::common::{class, file, gate};

fn marked(tree: &SourceTree) -> Vec<(&str, Marker)> {
    tree.nodes()
        .iter()
        .flat_map(|n| {
            let name = n.name().unwrap_or("");
            n.markers.iter().map(move |m| (name, m.clone()))
        })
        .collect()
}

#[test]
fn unchanged_tree_commits_with_no_rewrites() {
    let a = file("A.cs", class("A", &[("Tick", &["a = 1;"])]));
    assert!(diff(&a, &a).unwrap().is_empty());
    assert_eq!(
        classify(&a, &a, &HotloadConfig::default()),
        FileVerdict::Unchanged
    );

    let (outcome, current) = gate(&[Arc::clone(&a)], &[Arc::clone(&a)]);
    let GateOutcome::Committed { rewritten } = outcome else {
        panic!("expected commit, got {outcome:?}");
    };
    assert!(rewritten.is_empty());
    assert!(current.hotload_supported());
}

#[test]
fn statement_edit_marks_its_method_once() {
    let old = file("A.cs", class("A", &[("Foo", &["x = 1;"]), ("Bar", &["y = 1;"])]));
    let new = file("A.cs", class("A", &[("Foo", &["x = 2;"]), ("Bar", &["y = 1;"])]));

    let FileVerdict::SafeBodyEdits(intents) = classify(&old, &new, &HotloadConfig::default())
    else {
        panic!("expected body edits");
    };
    assert_eq!(intents.len(), 1);

    let (outcome, current) = gate(&[old], &[new]);
    assert!(outcome.is_committed());
    let annotated = current.get("A.cs").unwrap();
    assert_eq!(marked(annotated), [("Foo", Marker::MethodBodyChanged)]);
    assert_eq!(annotated.text().matches("[MethodBodyChange]").count(), 1);
}

#[test]
fn getter_edit_marks_the_property_only_for_get() {
    let health = |get: &str| {
        file(
            "Stats.cs",
            ClassFixture::new("Stats").property(
                PropertyFixture::new("Health")
                    .getter([get])
                    .setter(["hp = value;"]),
            ),
        )
    };
    let old = health("return hp;");
    let new = health("return hp * 2;");

    let verdict = classify(&old, &new, &HotloadConfig::default());
    let targets: Vec<ChangeTarget> = verdict.intents().map(|i| i.target).collect();
    assert_eq!(targets, [ChangeTarget::Accessor(AccessorKind::Get)]);

    let (outcome, current) = gate(&[old], &[new]);
    assert!(outcome.is_committed());
    let annotated = current.get("Stats.cs").unwrap();
    assert_eq!(
        marked(annotated),
        [("Health", Marker::AccessorBodyChanged(AccessorKind::Get))]
    );
    let accessor_marked = annotated
        .nodes()
        .iter()
        .any(|n| matches!(n.kind, NodeKind::Accessor(_)) && n.has_markers());
    assert!(!accessor_marked);
}

#[test]
fn file_set_change_aborts_despite_unchanged_files() {
    let a = file("A.cs", class("A", &[("Tick", &["a = 1;"])]));
    let b = file("B.cs", class("B", &[("Tick", &["b = 1;"])]));

    let (added, _) = gate(&[Arc::clone(&a)], &[Arc::clone(&a), Arc::clone(&b)]);
    assert!(matches!(
        added,
        GateOutcome::Aborted(AbortReason::FileSetChanged { .. })
    ));

    let (removed, current) = gate(&[Arc::clone(&a), b], &[a]);
    assert!(matches!(
        removed,
        GateOutcome::Aborted(AbortReason::FileSetChanged { .. })
    ));
    assert!(!current.hotload_supported());
}

#[test]
fn two_files_one_body_edit() {
    let a = file("A.cs", class("A", &[("Tick", &["a = 1;"])]));
    let b_old = file("B.cs", class("B", &[("Tick", &["b = 1;"])]));
    let b_new = file("B.cs", class("B", &[("Tick", &["b = 2;"])]));

    let config = HotloadConfig::default();
    assert_eq!(classify(&a, &a, &config), FileVerdict::Unchanged);
    assert!(matches!(
        classify(&b_old, &b_new, &config),
        FileVerdict::SafeBodyEdits(_)
    ));

    let (outcome, current) = gate(&[Arc::clone(&a), b_old], &[Arc::clone(&a), Arc::clone(&b_new)]);
    let GateOutcome::Committed { rewritten } = outcome else {
        panic!("expected commit, got {outcome:?}");
    };
    assert_eq!(rewritten, ["B.cs"]);
    assert!(current.hotload_supported());
    assert!(Arc::ptr_eq(current.get("A.cs").unwrap(), &a));
    assert!(!Arc::ptr_eq(current.get("B.cs").unwrap(), &b_new));

    let extra = current.get(EXTRA_UNIT_PATH).unwrap();
    assert!(extra
        .text()
        .contains("[assembly: SupportsHotload(\"build-1\")]"));
}

/// Where a generated declaration is inserted.
#[derive(Clone, Debug)]
enum Insertion {
    /// New method among the members, before member `n`.
    Method(usize),
    /// New field among the members, before member `n`.
    Field(usize),
    /// Local function at the end of method `n`'s body.
    InBody(usize),
    /// Second class at file scope.
    FileScope,
}

fn insertion() -> impl Strategy<Value = Insertion> {
    prop_oneof![
        (0usize..4).prop_map(Insertion::Method),
        (0usize..4).prop_map(Insertion::Field),
        (0usize..3).prop_map(Insertion::InBody),
        Just(Insertion::FileScope),
    ]
}

fn methods_file(count: usize, insertion: Option<&Insertion>) -> Arc<SourceTree> {
    let mut player = ClassFixture::new("Player");
    for i in 0..count {
        match insertion {
            Some(Insertion::Method(n)) if *n == i => {
                player = player.method(method("Added", ["added = 0;"]));
            }
            Some(Insertion::Field(n)) if *n == i => {
                player = player.field("added", "int added;");
            }
            _ => {}
        }
        let mut m = method(&format!("M{i}"), [format!("x = {i};")]);
        if matches!(insertion, Some(Insertion::InBody(n)) if *n == i) {
            m = m.declare_in_body(method("Local", ["z = 0;"]));
        }
        player = player.method(m);
    }
    match insertion {
        Some(Insertion::Method(n)) if *n >= count => {
            player = player.method(method("Added", ["added = 0;"]));
        }
        Some(Insertion::Field(n)) if *n >= count => {
            player = player.field("added", "int added;");
        }
        _ => {}
    }

    let mut fixture = FileFixture::new("Player.cs").class(player);
    if matches!(insertion, Some(Insertion::FileScope)) {
        fixture = fixture.class(ClassFixture::new("Added"));
    }
    Arc::new(fixture.build().unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn inserted_declaration_is_never_hot_loadable(
        count in 1usize..4,
        insertion in insertion(),
    ) {
        let old = methods_file(count, None);
        let new = methods_file(count, Some(&insertion));
        prop_assume!(old.text() != new.text());

        prop_assert!(classify(&old, &new, &HotloadConfig::default()).is_unsafe());
        let (outcome, current) = gate(&[old], &[Arc::clone(&new)]);
        prop_assert!(!outcome.is_committed());
        prop_assert!(!current.hotload_supported());
        prop_assert!(Arc::ptr_eq(current.get("Player.cs").unwrap(), &new));
    }

    #[test]
    fn comments_never_block_hot_reload(
        before_member in prop::collection::vec(any::<bool>(), 3),
        before_statement in prop::collection::vec(any::<bool>(), 3),
    ) {
        let build = |with_comments: bool| {
            let mut player = ClassFixture::new("Player");
            for i in 0..3 {
                if with_comments && before_member[i] {
                    player = player.comment(format!("// member {i}"));
                }
                let mut body = Vec::new();
                if with_comments && before_statement[i] {
                    body.push(format!("// statement {i}"));
                }
                body.push(format!("x = {i};"));
                player = player.method(method(&format!("M{i}"), body));
            }
            file("Player.cs", player)
        };
        let old = build(false);
        let new = build(true);

        let verdict = classify(&old, &new, &HotloadConfig::default());
        prop_assert!(
            matches!(verdict, FileVerdict::TriviaOnly | FileVerdict::Unchanged),
            "got {:?}",
            verdict
        );
        let (outcome, _) = gate(&[old], &[new]);
        let GateOutcome::Committed { rewritten } = outcome else {
            return Err(TestCaseError::fail("gate aborted on a comment-only change"));
        };
        prop_assert!(rewritten.is_empty());
    }
}

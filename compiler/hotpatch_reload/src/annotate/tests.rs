#![allow(
    clippy::unwrap_used,
    reason = "test code uses unwrap for concise assertions"
)]

use hotpatch_ir::testing::{method, ClassFixture, FileFixture, PropertyFixture};
use hotpatch_ir::{AccessorKind, NodeId};
use pretty_assertions::assert_eq;

use super::*;
use crate::{classify, HotloadConfig, EXTRA_UNIT_PATH};

fn named(tree: &SourceTree, name: &str) -> NodeId {
    let index = tree
        .nodes()
        .iter()
        .position(|n| n.name() == Some(name))
        .unwrap();
    NodeId::new(u32::try_from(index).unwrap())
}

fn player(foo: &[&str], bar: &[&str]) -> SourceTree {
    FileFixture::new("Player.cs")
        .namespace("Game")
        .class(
            ClassFixture::new("Player")
                .method(method("Foo", foo.iter().copied()))
                .method(method("Bar", bar.iter().copied())),
        )
        .build()
        .unwrap()
}

fn health(get: &str, set: &str) -> SourceTree {
    FileFixture::new("Player.cs")
        .class(
            ClassFixture::new("Player").property(
                PropertyFixture::new("Health")
                    .getter([get.to_string()])
                    .setter([set.to_string()]),
            ),
        )
        .build()
        .unwrap()
}

fn intents_of(old: &SourceTree, new: &SourceTree) -> BTreeSet<RewriteIntent> {
    classify(old, new, &HotloadConfig::default())
        .intents()
        .copied()
        .collect()
}

#[test]
fn method_edit_marks_only_that_method() {
    let old = player(&["x = 1;"], &["y = 1;"]);
    let new = player(&["x = 2;"], &["y = 1;"]);
    let annotated = annotate(&new, &intents_of(&old, &new)).unwrap();

    assert_eq!(annotated.text().matches("[MethodBodyChange]").count(), 1);
    let foo = named(&annotated, "Foo");
    assert!(annotated
        .node_text(foo)
        .starts_with("[MethodBodyChange] void Foo()"));
    assert_eq!(
        annotated.node(foo).markers.as_slice(),
        &[Marker::MethodBodyChanged]
    );
    assert!(!annotated.node(named(&annotated, "Bar")).has_markers());
}

#[test]
fn getter_edit_marks_the_property() {
    let old = health("return hp;", "hp = value;");
    let new = health("return hp + 1;", "hp = value;");
    let annotated = annotate(&new, &intents_of(&old, &new)).unwrap();

    let property = named(&annotated, "Health");
    assert!(annotated
        .node_text(property)
        .starts_with("[PropertyAccessorBodyChange(Get)] int Health"));
    assert!(!annotated.text().contains("(Set)"));
    let accessors_marked = annotated
        .nodes()
        .iter()
        .filter(|n| matches!(n.kind, NodeKind::Accessor(_)))
        .any(|n| n.has_markers());
    assert!(!accessors_marked);
}

#[test]
fn both_accessors_give_two_property_markers() {
    let old = health("return hp;", "hp = value;");
    let new = health("return hp + 1;", "hp = value - 1;");
    let annotated = annotate(&new, &intents_of(&old, &new)).unwrap();

    let property = named(&annotated, "Health");
    assert_eq!(
        annotated.node(property).markers.as_slice(),
        &[
            Marker::AccessorBodyChanged(AccessorKind::Get),
            Marker::AccessorBodyChanged(AccessorKind::Set),
        ]
    );
    assert!(annotated.node_text(property).starts_with(
        "[PropertyAccessorBodyChange(Get)][PropertyAccessorBodyChange(Set)] int Health"
    ));
}

#[test]
fn no_intents_is_identity() {
    let tree = player(&["x = 1;"], &["y = 1;"]);
    let annotated = annotate(&tree, &BTreeSet::new()).unwrap();
    assert_eq!(annotated, tree);
}

#[test]
fn stale_intent_is_rejected() {
    let tree = player(&["x = 1;"], &["y = 1;"]);
    let stale = BTreeSet::from([RewriteIntent {
        declaration: NodeId::new(999),
        target: ChangeTarget::Method,
    }]);
    assert!(matches!(
        annotate(&tree, &stale),
        Err(AnnotateError::Rewrite(RewriteError::InvalidNode { .. }))
    ));
}

#[test]
fn assembly_marker_creates_missing_unit() {
    let unit = assembly_marker(None, EXTRA_UNIT_PATH, "build-6").unwrap();
    assert_eq!(unit.path(), EXTRA_UNIT_PATH);
    assert_eq!(unit.text(), "[assembly: SupportsHotload(\"build-6\")]\n");
    assert_eq!(
        unit.node(unit.root().unwrap()).markers.as_slice(),
        &[Marker::SupportsHotload {
            previous_version: "build-6".to_string()
        }]
    );
}

#[test]
fn assembly_marker_appends_to_existing_unit() {
    let existing = player(&["x = 1;"], &["y = 1;"]);
    let unit = assembly_marker(Some(&existing), EXTRA_UNIT_PATH, "build-6").unwrap();
    assert_eq!(unit.path(), "Player.cs");
    assert!(unit.text().starts_with(existing.text()));
    assert!(unit
        .text()
        .ends_with("}\n[assembly: SupportsHotload(\"build-6\")]\n"));
}

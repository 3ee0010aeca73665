#![allow(
    clippy::unwrap_used,
    reason = "test code uses unwrap for concise assertions"
)]

use pretty_assertions::assert_eq;

use super::*;

#[test]
fn applies_replacements_in_position_order() {
    let mut batch = EditBatch::new();
    batch.push(TextEdit::replace(Span::new(0, 3), "let"));
    batch.push(TextEdit::replace(Span::new(8, 9), "42"));
    assert_eq!(batch.apply("var x = 1;").unwrap(), "let x = 42;");
}

#[test]
fn same_position_inserts_keep_push_order() {
    let mut batch = EditBatch::new();
    batch.insert(4, "[A] ");
    batch.insert(4, "[B] ");
    assert_eq!(batch.apply("    void M()").unwrap(), "    [A] [B] void M()");
}

#[test]
fn overlapping_edits_conflict() {
    let mut batch = EditBatch::new();
    batch.push(TextEdit::replace(Span::new(0, 5), "a"));
    batch.push(TextEdit::replace(Span::new(3, 8), "b"));
    assert_eq!(
        batch.apply("0123456789"),
        Err(EditConflict {
            first: Span::new(0, 5),
            second: Span::new(3, 8),
        })
    );
}

#[test]
fn adjacent_edits_do_not_conflict() {
    let mut batch = EditBatch::new();
    batch.push(TextEdit::replace(Span::new(0, 2), "x"));
    batch.push(TextEdit::replace(Span::new(2, 4), "y"));
    assert_eq!(batch.apply("abcd").unwrap(), "xy");
}

#[test]
fn regions_rebuild_new_text() {
    let old = "int F() { return 1; }";
    let regions = [
        ChangeRegion::new(Span::new(0, 3), 0, "long"),
        ChangeRegion::new(Span::new(17, 18), 18, "2"),
    ];
    assert_eq!(
        apply_regions(old, &regions).unwrap(),
        "long F() { return 2; }"
    );
}

#[test]
fn empty_batch_is_identity() {
    let batch = EditBatch::new();
    assert_eq!(batch.apply("unchanged").unwrap(), "unchanged");
}

//! Text diff between two versions of one file.
//!
//! Lines are diffed first; each run of changed lines becomes one region,
//! then the common prefix and suffix inside the run are trimmed so a
//! region covers only the characters that actually changed. Regions are
//! disjoint, ordered by old-text position, and applying them to the old
//! text yields the new text.

use std::fmt::Write as _;
use std::ops::Range;

use similar::{DiffOp, DiffTag, TextDiff};

use hotpatch_ir::{ChangeRegion, SourceTree, Span, UnresolvedRootError};

/// Regions spanning more combined old/new lines than this are summarized
/// as a line count in `format_regions`.
pub const MAX_LISTED_LINES: usize = 5;

/// Change regions turning `old` into `new`, in old-text coordinates.
///
/// Both roots must resolve. Identical text yields no regions.
#[tracing::instrument(level = "debug", skip_all, fields(path = new.path()))]
pub fn diff(old: &SourceTree, new: &SourceTree) -> Result<Vec<ChangeRegion>, UnresolvedRootError> {
    old.root()?;
    new.root()?;
    if old.text() == new.text() {
        return Ok(Vec::new());
    }

    let text_diff = TextDiff::from_lines(old.text(), new.text());
    let old_starts = line_starts(text_diff.old_slices());
    let new_starts = line_starts(text_diff.new_slices());

    let hunks = change_hunks(
        text_diff.ops(),
        text_diff.old_slices(),
        text_diff.new_slices(),
    );
    let regions: Vec<ChangeRegion> = hunks
        .into_iter()
        .filter_map(|hunk| {
            trimmed_region(
                old.text(),
                new.text(),
                old_starts[hunk.old.start]..old_starts[hunk.old.end],
                new_starts[hunk.new.start]..new_starts[hunk.new.end],
            )
        })
        .collect();

    tracing::debug!(regions = regions.len(), "diffed file versions");
    Ok(regions)
}

/// Run of adjacent changed lines, in line indices.
#[derive(Debug, PartialEq, Eq)]
struct Hunk {
    old: Range<usize>,
    new: Range<usize>,
}

/// Groups the ops into hunks, tracking line positions with running
/// cursors. Only each op's tag and lengths are read; the positions an op
/// reports for the opposite side are not. A line pair inside an `Equal`
/// op is kept only when the two lines really match, so copying every gap
/// between hunks reproduces the new text exactly.
fn change_hunks(ops: &[DiffOp], old_lines: &[&str], new_lines: &[&str]) -> Vec<Hunk> {
    let mut cursor = LineCursor::default();
    for op in ops {
        let (old_len, new_len) = (op.old_range().len(), op.new_range().len());
        if op.tag() != DiffTag::Equal {
            cursor.change(old_len, new_len, old_lines.len(), new_lines.len());
            continue;
        }
        for _ in 0..old_len.min(new_len) {
            match (old_lines.get(cursor.old), new_lines.get(cursor.new)) {
                (Some(a), Some(b)) if a == b => cursor.keep(),
                _ => cursor.change(1, 1, old_lines.len(), new_lines.len()),
            }
        }
    }
    cursor.finish(old_lines.len(), new_lines.len())
}

#[derive(Default)]
struct LineCursor {
    old: usize,
    new: usize,
    open: Option<(usize, usize)>,
    hunks: Vec<Hunk>,
}

impl LineCursor {
    fn change(&mut self, old_len: usize, new_len: usize, old_total: usize, new_total: usize) {
        self.open.get_or_insert((self.old, self.new));
        self.old = (self.old + old_len).min(old_total);
        self.new = (self.new + new_len).min(new_total);
    }

    fn keep(&mut self) {
        self.close();
        self.old += 1;
        self.new += 1;
    }

    fn close(&mut self) {
        if let Some((old, new)) = self.open.take() {
            self.hunks.push(Hunk {
                old: old..self.old,
                new: new..self.new,
            });
        }
    }

    fn finish(mut self, old_total: usize, new_total: usize) -> Vec<Hunk> {
        if self.old < old_total || self.new < new_total {
            self.change(old_total, new_total, old_total, new_total);
        }
        self.close();
        self.hunks
    }
}

/// Byte offset of every line start, plus the end of the text.
fn line_starts(lines: &[&str]) -> Vec<usize> {
    let mut starts = Vec::with_capacity(lines.len() + 1);
    let mut offset = 0;
    starts.push(offset);
    for line in lines {
        offset += line.len();
        starts.push(offset);
    }
    starts
}

fn trimmed_region(
    old: &str,
    new: &str,
    old_range: Range<usize>,
    new_range: Range<usize>,
) -> Option<ChangeRegion> {
    let before = &old[old_range.clone()];
    let after = &new[new_range.clone()];
    let prefix = common_prefix(before, after);
    let suffix = common_suffix(&before[prefix..], &after[prefix..]);

    let span = Span::new(
        offset(old_range.start + prefix),
        offset(old_range.end - suffix),
    );
    let new_text = &after[prefix..after.len() - suffix];
    if span.is_empty() && new_text.is_empty() {
        return None;
    }
    Some(ChangeRegion::new(
        span,
        offset(new_range.start + prefix),
        new_text,
    ))
}

fn common_prefix(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .map(|(c, _)| c.len_utf8())
        .sum()
}

fn common_suffix(a: &str, b: &str) -> usize {
    a.chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(x, y)| x == y)
        .map(|(c, _)| c.len_utf8())
        .sum()
}

/// Tree text never exceeds `u32::MAX` bytes.
fn offset(pos: usize) -> u32 {
    u32::try_from(pos).unwrap_or(u32::MAX)
}

/// Human-readable listing of `regions`, one entry per region headed by the
/// dotted path of the declaration it sits in.
///
/// ```text
/// Player.cs @ Game.Player.Update
/// -         x = 1;
/// +         x = 2;
/// ```
///
/// Only for logs; never consulted by classification.
pub fn format_regions(old: &SourceTree, new: &SourceTree, regions: &[ChangeRegion]) -> String {
    let mut out = String::new();
    for region in regions {
        let path = region_path(old, new, region);
        let _ = writeln!(
            out,
            "{} @ {}",
            new.path(),
            if path.is_empty() { "<file>" } else { path.as_str() }
        );

        let before = line_context(old.text(), region.span);
        let after = line_context(new.text(), region.new_span());
        let (old_lines, new_lines) = (before.lines().count(), after.lines().count());
        if old_lines + new_lines <= MAX_LISTED_LINES {
            for line in before.lines() {
                let _ = writeln!(out, "- {line}");
            }
            for line in after.lines() {
                let _ = writeln!(out, "+ {line}");
            }
        } else {
            let _ = writeln!(out, "~ {old_lines} lines -> {new_lines} lines");
        }
    }
    out
}

fn region_path(old: &SourceTree, new: &SourceTree, region: &ChangeRegion) -> String {
    let in_new = new
        .enclosing_node(region.new_span())
        .map(|id| new.declaration_path(id))
        .unwrap_or_default();
    if !in_new.is_empty() {
        return in_new;
    }
    old.enclosing_node(region.span)
        .map(|id| old.declaration_path(id))
        .unwrap_or_default()
}

/// The full lines touched by a non-empty span.
fn line_context(text: &str, span: Span) -> &str {
    if span.is_empty() {
        return "";
    }
    let start = span.start as usize;
    let mut end = span.end as usize;
    if end > start && text.get(..end).is_some_and(|t| t.ends_with('\n')) {
        end -= 1;
    }
    let line_start = text
        .get(..start)
        .and_then(|t| t.rfind('\n'))
        .map_or(0, |i| i + 1);
    let line_end = text
        .get(end..)
        .and_then(|t| t.find('\n'))
        .map_or(text.len(), |i| end + i);
    text.get(line_start..line_end).unwrap_or("")
}

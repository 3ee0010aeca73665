//! Text splicing for marker insertion and region replay.
//!
//! A batch holds edits against one original text. `apply` orders them by
//! position (stable, so insertions at one offset keep their push order) and
//! copies the text forward once, substituting each edited span.

use crate::{ChangeRegion, Span};

/// Replace `span` of the original text with `new_text`.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct TextEdit {
    pub span: Span,
    pub new_text: String,
}

impl TextEdit {
    pub fn replace(span: Span, new_text: impl Into<String>) -> Self {
        TextEdit {
            span,
            new_text: new_text.into(),
        }
    }

    pub fn insert(at: u32, text: impl Into<String>) -> Self {
        Self::replace(Span::point(at), text)
    }
}

impl From<&ChangeRegion> for TextEdit {
    fn from(region: &ChangeRegion) -> Self {
        TextEdit::replace(region.span, region.new_text.clone())
    }
}

/// Two edits in one batch remove the same bytes.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("edits overlap: {first:?} and {second:?}")]
pub struct EditConflict {
    pub first: Span,
    pub second: Span,
}

#[derive(Clone, Debug, Default)]
pub struct EditBatch {
    edits: Vec<TextEdit>,
}

impl EditBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, edit: TextEdit) {
        self.edits.push(edit);
    }

    pub fn insert(&mut self, at: u32, text: impl Into<String>) {
        self.push(TextEdit::insert(at, text));
    }

    fn ordered(&self) -> Vec<&TextEdit> {
        let mut ordered: Vec<&TextEdit> = self.edits.iter().collect();
        ordered.sort_by_key(|e| (e.span.start, e.span.end));
        ordered
    }

    /// Splice every edit into `source`. Fails on the first pair of
    /// overlapping edits in position order; touching spans and insertions
    /// at a shared offset do not conflict.
    pub fn apply(&self, source: &str) -> Result<String, EditConflict> {
        let ordered = self.ordered();
        if let Some(conflict) = first_conflict(&ordered) {
            return Err(conflict);
        }

        let growth: usize = ordered.iter().map(|e| e.new_text.len()).sum();
        let mut out = String::with_capacity(source.len() + growth);
        let mut copied = 0;
        for edit in ordered {
            let start = (edit.span.start as usize).clamp(copied, source.len());
            let end = (edit.span.end as usize).clamp(start, source.len());
            out.push_str(&source[copied..start]);
            out.push_str(&edit.new_text);
            copied = end;
        }
        out.push_str(&source[copied..]);
        Ok(out)
    }
}

fn first_conflict(ordered: &[&TextEdit]) -> Option<EditConflict> {
    ordered.windows(2).find_map(|pair| {
        let (a, b) = (pair[0], pair[1]);
        (a.span.end > b.span.start).then_some(EditConflict {
            first: a.span,
            second: b.span,
        })
    })
}

/// Rebuild the new text of a file from its old text and change regions.
pub fn apply_regions(old_text: &str, regions: &[ChangeRegion]) -> Result<String, EditConflict> {
    let mut batch = EditBatch::new();
    for region in regions {
        batch.push(TextEdit::from(region));
    }
    batch.apply(old_text)
}

#[cfg(test)]
mod tests;

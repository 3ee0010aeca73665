//! Text change regions between two versions of a file.
//!
//! A `ChangeRegion` is a contiguous span of the old text plus the text that
//! replaces it in the new version. Regions for one file pair are disjoint
//! and ordered by old-text position.
//!
//! ```
//! use hotpatch_ir::{ChangeRegion, Span};
//!
//! // "foo" at 10..13 became "hello", which lands at 12 in the new text
//! let region = ChangeRegion::new(Span::new(10, 13), 12, "hello");
//! assert_eq!(region.delta(), 2);
//! assert_eq!(region.new_span(), Span::new(12, 17));
//! ```

use crate::Span;

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ChangeRegion {
    /// Replaced range, in old-text coordinates.
    pub span: Span,
    /// Where the replacement starts in new-text coordinates.
    pub new_start: u32,
    /// Replacement text.
    pub new_text: String,
}

impl ChangeRegion {
    pub fn new(span: Span, new_start: u32, new_text: impl Into<String>) -> Self {
        ChangeRegion {
            span,
            new_start,
            new_text: new_text.into(),
        }
    }

    /// Length of the replacement text in bytes.
    #[inline]
    pub fn new_len(&self) -> u32 {
        u32::try_from(self.new_text.len()).unwrap_or(u32::MAX)
    }

    /// Replacement range, in new-text coordinates.
    #[inline]
    pub fn new_span(&self) -> Span {
        Span::new(self.new_start, self.new_start.saturating_add(self.new_len()))
    }

    /// Net change in document length (positive = grew, negative = shrank).
    #[inline]
    pub fn delta(&self) -> i64 {
        i64::from(self.new_len()) - i64::from(self.span.len())
    }

    #[inline]
    pub fn is_insertion(&self) -> bool {
        self.span.is_empty() && !self.new_text.is_empty()
    }

    #[inline]
    pub fn is_deletion(&self) -> bool {
        self.new_text.is_empty() && !self.span.is_empty()
    }
}

/// Maps positions across a single insertion or replacement.
///
/// Positions strictly before `at` are unchanged; positions at or after
/// `at + removed` move by `delta`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PositionShift {
    pub at: u32,
    pub removed: u32,
    pub delta: i64,
}

impl PositionShift {
    /// Shift for inserting `len` bytes at `at`.
    #[inline]
    pub fn insertion(at: u32, len: u32) -> Self {
        PositionShift {
            at,
            removed: 0,
            delta: i64::from(len),
        }
    }

    /// Adjust a position; `stay_at_boundary` keeps a position equal to
    /// `at` in place (start of a node that absorbs the insertion).
    #[inline]
    pub fn adjust(&self, pos: u32, stay_at_boundary: bool) -> u32 {
        let end = self.at.saturating_add(self.removed);
        if pos < self.at || (pos == self.at && stay_at_boundary) {
            return pos;
        }
        if pos < end {
            return pos;
        }
        #[allow(
            clippy::cast_sign_loss,
            clippy::cast_possible_truncation,
            reason = "delta is derived from u32 lengths and pos >= end"
        )]
        {
            (i64::from(pos) + self.delta).max(0) as u32
        }
    }
}

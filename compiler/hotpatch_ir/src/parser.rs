//! Seam to the external front end.

use crate::{BoxError, SourceTree, SymbolSet};

/// Parses source text into a tree.
///
/// Implemented by the host's front end. Nothing in the pipeline parses
/// user files; the only text parsed here is generated loose code.
pub trait SourceParser: Sync {
    fn parse(&self, path: &str, text: &str, symbols: &SymbolSet) -> Result<SourceTree, BoxError>;
}

impl<F> SourceParser for F
where
    F: Fn(&str, &str, &SymbolSet) -> Result<SourceTree, BoxError> + Sync,
{
    fn parse(&self, path: &str, text: &str, symbols: &SymbolSet) -> Result<SourceTree, BoxError> {
        self(path, text, symbols)
    }
}

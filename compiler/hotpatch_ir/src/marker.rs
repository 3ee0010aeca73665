//! Marker attributes carried to the compiler backend.
//!
//! A marker is stored on the node it annotates and rendered into the
//! tree's text as an attribute, so both structural consumers and
//! text-based backends see the same thing.

use std::fmt;

use crate::AccessorKind;

/// Attribute name for a method whose body changed.
pub const METHOD_BODY_MARKER: &str = "MethodBodyChange";
/// Attribute name for a property whose accessor body changed.
pub const ACCESSOR_BODY_MARKER: &str = "PropertyAccessorBodyChange";
/// Assembly-level attribute name requesting a hot patch.
pub const SUPPORTS_HOTLOAD_MARKER: &str = "SupportsHotload";

#[derive(Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Marker {
    /// Only the statements of this method changed.
    MethodBodyChanged,
    /// Only the statements of one accessor of this property changed.
    AccessorBodyChanged(AccessorKind),
    /// Whole-program marker: this build patches `previous_version`.
    SupportsHotload { previous_version: String },
}

impl Marker {
    /// Source text for the marker, without trailing separator.
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Assembly markers go at the end of a compilation unit, not in front
    /// of a declaration.
    #[inline]
    pub fn is_assembly_level(&self) -> bool {
        matches!(self, Marker::SupportsHotload { .. })
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::MethodBodyChanged => write!(f, "[{METHOD_BODY_MARKER}]"),
            Marker::AccessorBodyChanged(kind) => {
                write!(f, "[{ACCESSOR_BODY_MARKER}({kind})]")
            }
            Marker::SupportsHotload { previous_version } => {
                write!(
                    f,
                    "[assembly: {SUPPORTS_HOTLOAD_MARKER}({previous_version:?})]"
                )
            }
        }
    }
}

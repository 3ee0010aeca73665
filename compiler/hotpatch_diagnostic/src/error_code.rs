//! Error codes for pipeline diagnostics.
//!
//! Format: E#### / W#### where the first digit indicates the stage:
//! - E1xxx: hot-reload gate
//! - E2xxx / W2xxx: reported by source generators
//! - E9xxx: internal failures

use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub enum ErrorCode {
    // Hot-reload gate (E1xxx)
    /// Body-only hot reload declined, full reload required
    E1001,
    /// A classification worker failed
    E1002,

    // Source generation (E2xxx)
    /// Error reported by a source generator
    E2001,
    /// Warning reported by a source generator
    W2001,

    // Internal (E9xxx)
    /// A source generator crashed
    E9001,
}

impl ErrorCode {
    /// All error codes, in declaration order.
    pub const ALL: &'static [ErrorCode] = &[
        ErrorCode::E1001,
        ErrorCode::E1002,
        ErrorCode::E2001,
        ErrorCode::W2001,
        ErrorCode::E9001,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E1001 => "E1001",
            ErrorCode::E1002 => "E1002",
            ErrorCode::E2001 => "E2001",
            ErrorCode::W2001 => "W2001",
            ErrorCode::E9001 => "E9001",
        }
    }

    pub fn is_gate_error(&self) -> bool {
        matches!(self, ErrorCode::E1001 | ErrorCode::E1002)
    }

    pub fn is_generator_error(&self) -> bool {
        matches!(self, ErrorCode::E2001 | ErrorCode::W2001)
    }

    pub fn is_internal_error(&self) -> bool {
        matches!(self, ErrorCode::E9001)
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, ErrorCode::W2001)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parse a code string like `"E9001"`. Case-insensitive.
impl std::str::FromStr for ErrorCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_uppercase();
        Self::ALL
            .iter()
            .find(|code| code.as_str() == upper)
            .copied()
            .ok_or(())
    }
}

//! Diagnostics for the hotpatch pipeline.
//!
//! - Error codes for searchability
//! - Clear messages (what went wrong)
//! - Primary span and file (where it went wrong)
//! - Descriptors: stable id + message template + severity, for conditions
//!   the pipeline itself reports (generator crashes, declined hot reloads)

mod descriptor;
mod diagnostic;
mod error_code;

pub use descriptor::{
    generator_crash, trimmed_trace, DiagnosticDescriptor, GENERATOR_CRASH, HOTLOAD_DECLINED,
    MAX_TRACE_LINES,
};
pub use diagnostic::{Diagnostic, Label, Severity};
pub use error_code::ErrorCode;

//! Diagnostic descriptors: stable id, title, message template, severity.
//!
//! Templates use positional placeholders `{0}`, `{1}`, ... A placeholder
//! with no matching argument is left in place.

use crate::{Diagnostic, ErrorCode, Severity};

/// Maximum number of stack/cause lines carried by a crash diagnostic.
pub const MAX_TRACE_LINES: usize = 8;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct DiagnosticDescriptor {
    pub id: ErrorCode,
    pub title: &'static str,
    pub message_template: &'static str,
    pub severity: Severity,
}

/// Emitted once per generation pass when any generator worker failed.
pub const GENERATOR_CRASH: DiagnosticDescriptor = DiagnosticDescriptor {
    id: ErrorCode::E9001,
    title: "Source generator crashed",
    message_template: "source generator failed and generation was skipped for this compile: {0}\n{1}",
    severity: Severity::Error,
};

/// Reported when a compile could not take the body-only hot reload path.
pub const HOTLOAD_DECLINED: DiagnosticDescriptor = DiagnosticDescriptor {
    id: ErrorCode::E1001,
    title: "Hot reload declined",
    message_template: "body-only hot reload not possible, a full reload is required: {0}",
    severity: Severity::Note,
};

impl DiagnosticDescriptor {
    /// Substitute `{n}` placeholders with `args[n]`.
    pub fn format(&self, args: &[&str]) -> String {
        let template = self.message_template;
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let arg = after.find('}').and_then(|close| {
                let index: usize = after[..close].parse().ok()?;
                Some((close, args.get(index)?))
            });
            match arg {
                Some((close, value)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Build a diagnostic from this descriptor.
    pub fn create(&self, args: &[&str]) -> Diagnostic {
        Diagnostic::new(self.id, self.severity).with_message(self.format(args))
    }
}

/// First `MAX_TRACE_LINES` non-blank lines of `trace`, with a count of
/// what was dropped.
pub fn trimmed_trace(trace: &str) -> String {
    let lines: Vec<&str> = trace.lines().filter(|l| !l.trim().is_empty()).collect();
    let mut out = lines
        .iter()
        .take(MAX_TRACE_LINES)
        .copied()
        .collect::<Vec<_>>()
        .join("\n");
    if lines.len() > MAX_TRACE_LINES {
        out.push_str(&format!(
            "\n... {} more line(s)",
            lines.len() - MAX_TRACE_LINES
        ));
    }
    out
}

/// The single crash diagnostic for a failed generation pass.
pub fn generator_crash(path: Option<&str>, message: &str, trace: &str) -> Diagnostic {
    let diag = GENERATOR_CRASH.create(&[message, &trimmed_trace(trace)]);
    match path {
        Some(path) => diag.in_file(path),
        None => diag,
    }
}

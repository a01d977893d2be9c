//! Warning reports
//!
//! The engine emits warnings for conditions that are tolerated but worth
//! surfacing: deprecated rule-name aliases and key collisions during
//! rename normalization. Records are single structured lines with
//! deterministic field ordering, written synchronously.

use std::io::{self, Write};

/// Report severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Tolerated condition, behavior unchanged.
    Warn,
    /// Operation failure.
    Error,
}

impl Severity {
    /// The string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

/// Emits a warning record to stderr.
pub fn warn(event: &str, fields: &[(&str, &str)]) {
    emit_to_writer(Severity::Warn, event, fields, &mut io::stderr());
}

/// Writes one record to the given writer. Fields are sorted by key so the
/// output is deterministic.
pub fn emit_to_writer<W: Write>(
    severity: Severity,
    event: &str,
    fields: &[(&str, &str)],
    writer: &mut W,
) {
    let mut sorted: Vec<_> = fields.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut line = String::with_capacity(64);
    line.push_str(severity.as_str());
    line.push(' ');
    line.push_str(event);
    for (key, value) in sorted {
        line.push(' ');
        line.push_str(key);
        line.push('=');
        line.push_str(value);
    }
    line.push('\n');

    // A failed write on a diagnostics channel must not fail validation.
    let _ = writer.write_all(line.as_bytes());
}

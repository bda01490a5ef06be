//! Shared diagnostic vocabulary emitted by [`crate::schema`], [`crate::validator`],
//! and [`crate::generator`]. A `Diagnostic` never aborts processing on its
//! own — see [`crate::errors::CoreError`] for the small set of kinds that do.

use crate::pointer::Pointer;
use std::fmt;

/// Stable, matchable identifiers for diagnostic kinds. New codes should be
/// added here rather than constructed ad hoc so collaborators can match on
/// them reliably across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagnosticCode(pub &'static str);

impl DiagnosticCode {
    pub const UNKNOWN_KEYWORD: DiagnosticCode = DiagnosticCode("unknown-keyword");
    pub const CONFLICTING_KEYWORDS: DiagnosticCode = DiagnosticCode("conflicting-keywords");
    pub const REF_NOT_FOUND: DiagnosticCode = DiagnosticCode("ref-not-found");
    pub const INVALID_EXCLUSIVE_BOUND: DiagnosticCode = DiagnosticCode("invalid-exclusive-bound");
    pub const UNSATISFIABLE_CONSTRAINT: DiagnosticCode = DiagnosticCode("unsatisfiable-constraint");
    pub const DEPTH_LIMIT_REACHED: DiagnosticCode = DiagnosticCode("depth-limit-reached");
    pub const METASCHEMA_VIOLATION: DiagnosticCode = DiagnosticCode("metaschema-violation");
    pub const CANCELLED: DiagnosticCode = DiagnosticCode("cancelled");
    pub const EMPTY_ENUM: DiagnosticCode = DiagnosticCode("empty-enum");
    pub const GENERATION_BEST_EFFORT: DiagnosticCode = DiagnosticCode("generation-best-effort");
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Hint,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Hint => "hint",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Attribution of a diagnostic or validation failure to the likely
/// responsible party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribution {
    Sdk,
    Spec,
    Ambiguous,
}

impl fmt::Display for Attribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Attribution::Sdk => "sdk",
            Attribution::Spec => "spec",
            Attribution::Ambiguous => "ambiguous",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub pointer: Pointer,
    pub message: String,
    pub attribution: Attribution,
}

impl Diagnostic {
    pub fn new(
        code: DiagnosticCode,
        severity: Severity,
        pointer: Pointer,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic { code, severity, pointer, message: message.into(), attribution: Attribution::Ambiguous }
    }

    pub fn with_attribution(mut self, attribution: Attribution) -> Self {
        self.attribution = attribution;
        self
    }

    /// Human-readable single-line rendering, e.g. for test assertions or a
    /// collaborator-supplied log sink. This crate never writes to
    /// stdout/stderr itself.
    pub fn to_line(&self) -> String {
        format!("[{}] {} at {}: {}", self.severity, self.code, self.pointer, self.message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_line())
    }
}

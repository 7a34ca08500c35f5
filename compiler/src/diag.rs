// diag.rs — Unified diagnostics model
//
// Shared diagnostic types used across all generator phases. Decoded YAML
// carries no byte offsets, so diagnostics point at a `Locus`: the dotted
// key path of the offending node within the schema document.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0001`, `W0002`).
///
/// Codes are `&'static str` constants defined in the `codes` module. Once
/// assigned, a code must never be reassigned to a different semantic
/// meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    /// A node's shape fits none of the recognized schema constructs.
    pub const E0001: DiagCode = DiagCode("E0001");
    /// A scalar reference with malformed `~`/`?` decorators.
    pub const E0002: DiagCode = DiagCode("E0002");
    /// Two top-level declarations share a name.
    pub const E0003: DiagCode = DiagCode("E0003");
    /// Two cases of one sum share a name.
    pub const E0004: DiagCode = DiagCode("E0004");
    /// A multi-element sequence where a single type reference is required.
    pub const E0005: DiagCode = DiagCode("E0005");
    /// A reference cycle with no operand slot left to box.
    pub const E0100: DiagCode = DiagCode("E0100");

    /// Unknown top-level document key.
    pub const W0001: DiagCode = DiagCode("W0001");
    /// A leaf reference naming neither a declaration nor a primitive.
    pub const W0002: DiagCode = DiagCode("W0002");
    /// A declared type no slot ever references.
    pub const W0003: DiagCode = DiagCode("W0003");
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Locus ────────────────────────────────────────────────────────────────

/// A dotted key path into the schema document, e.g. `models.Datum.Quotation`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Locus(String);

impl Locus {
    pub fn root() -> Self {
        Locus(String::new())
    }

    pub fn key(&self, segment: &str) -> Self {
        if self.0.is_empty() {
            Locus(segment.to_string())
        } else {
            Locus(format!("{}.{}", self.0, segment))
        }
    }

    pub fn index(&self, i: usize) -> Self {
        Locus(format!("{}[{}]", self.0, i))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A generator diagnostic emitted by any phase.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub locus: Locus,
    pub message: String,
    pub hint: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code or hint.
    pub fn new(level: DiagLevel, locus: Locus, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            locus,
            message: message.into(),
            hint: None,
        }
    }

    pub fn error(locus: Locus, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, locus, message)
    }

    pub fn warning(locus: Locus, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Warning, locus, message)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Whether any diagnostic in the slice is error-level.
pub fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(|d| d.level == DiagLevel::Error)
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: ", level, code)?;
        } else {
            write!(f, "{}: ", level)?;
        }
        if !self.locus.is_root() {
            write!(f, "{}: ", self.locus)?;
        }
        write!(f, "{}", self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

//! Compile-time diagnostics.
//!
//! Every configuration problem found while reading a behaviour description or
//! generating its integration routines is reported as a [`CompileError`]. They
//! are fatal for the behaviour being compiled: the first one stops it.
//!
//! - `CompileError` - one diagnostic with a primary span and optional labels/notes
//! - `ErrorKind` - what went wrong
//! - `Severity` - error, warning, or note
//! - `DiagnosticFormatter` - renders diagnostics with source snippets
//!
//! # Examples
//!
//! ```
//! # use tensile_model::error::*;
//! # use tensile_model::foundation::Span;
//! let error = CompileError::new(
//!     ErrorKind::DuplicateAttribute,
//!     Span::new(0, 0, 8, 1),
//!     "the algorithm has already been specified",
//! );
//! assert_eq!(error.kind.name(), "duplicate attribute");
//! ```

use crate::foundation::{SourceMap, Span};
use std::fmt;

/// Compilation diagnostic with source location and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// Category of this error
    pub kind: ErrorKind,
    /// Severity level
    pub severity: Severity,
    /// Primary source location
    pub span: Span,
    /// Primary error message
    pub message: String,
    /// Additional labeled spans
    pub labels: Vec<Label>,
    /// Additional notes or hints
    pub notes: Vec<String>,
}

/// Category of compilation error.
///
/// # Invariant
///
/// The discriminant values must match the `ERROR_KIND_NAMES` indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    // Reading
    /// Invalid token, unexpected token or unexpected end of file
    Syntax = 0,
    /// `@Keyword` with no registered handler
    UnknownKeyword = 1,
    /// Keyword that exists but is meaningless for explicit schemes
    DisabledKeyword = 2,

    // Names
    /// Reference to an undeclared variable
    UndefinedName = 3,
    /// Variable declared twice
    DuplicateName = 4,
    /// Variable name clashing with a generated name
    ReservedName = 5,
    /// Unknown variable type name
    UnknownType = 6,

    // Integration attributes
    /// Algorithm, tolerance or minimal time step specified twice
    DuplicateAttribute = 7,
    /// Algorithm name outside the catalogue
    UnknownAlgorithm = 8,
    /// Negative or unreadable numeric value
    InvalidValue = 9,
    /// Algorithm incompatible with the behaviour type
    AlgorithmMismatch = 10,

    // Code blocks
    /// A mandatory code block is missing
    MissingCodeBlock = 11,
    /// A code block is defined twice
    DuplicateCodeBlock = 12,

    // Variables
    /// Member access nested deeper than one level
    UnsupportedNesting = 13,
    /// Error normalization factor on the wrong target or with a non-scalar value
    InvalidNormalizationFactor = 14,
    /// Gradient and thermodynamic force lists do not pair up
    GradientForceMismatch = 15,
    /// Modelling hypothesis unknown or not supported by explicit schemes
    UnsupportedHypothesis = 16,

    // Generic
    /// Internal compiler error (bug in the compiler)
    Internal = 17,
}

/// Human-readable names for error kinds, indexed by discriminant.
const ERROR_KIND_NAMES: &[&str] = &[
    "syntax error",                 // 0: Syntax
    "unknown keyword",              // 1: UnknownKeyword
    "disabled keyword",             // 2: DisabledKeyword
    "undefined name",               // 3: UndefinedName
    "duplicate name",               // 4: DuplicateName
    "reserved name",                // 5: ReservedName
    "unknown type",                 // 6: UnknownType
    "duplicate attribute",          // 7: DuplicateAttribute
    "unknown algorithm",            // 8: UnknownAlgorithm
    "invalid value",                // 9: InvalidValue
    "algorithm mismatch",           // 10: AlgorithmMismatch
    "missing code block",           // 11: MissingCodeBlock
    "duplicate code block",         // 12: DuplicateCodeBlock
    "unsupported nesting",          // 13: UnsupportedNesting
    "invalid normalization factor", // 14: InvalidNormalizationFactor
    "gradient/force mismatch",      // 15: GradientForceMismatch
    "unsupported hypothesis",       // 16: UnsupportedHypothesis
    "internal compiler error",      // 17: Internal
];

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational note (not an error)
    Note,
    /// Warning (the behaviour still compiles)
    Warning,
    /// Error (compilation of the behaviour stops)
    Error,
}

/// Secondary labeled span in a diagnostic ("first defined here").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    /// Source location
    pub span: Span,
    /// Label text
    pub message: String,
}

impl CompileError {
    /// Creates a new error diagnostic.
    pub fn new(kind: ErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self::with_severity(kind, Severity::Error, span, message.into())
    }

    /// Creates a new warning diagnostic.
    pub fn warning(kind: ErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self::with_severity(kind, Severity::Warning, span, message.into())
    }

    /// Creates an internal error, for invariants the compiler itself broke.
    pub fn internal(span: Span, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, span, message)
    }

    fn with_severity(kind: ErrorKind, severity: Severity, span: Span, message: String) -> Self {
        Self {
            kind,
            severity,
            span,
            message,
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Adds a secondary labeled span.
    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label {
            span,
            message: message.into(),
        });
        self
    }

    /// Adds a note or hint.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// True for diagnostics that stop compilation.
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl ErrorKind {
    /// Human-readable name of this error kind.
    pub fn name(self) -> &'static str {
        ERROR_KIND_NAMES[self as usize]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.kind.name(), self.message)
    }
}

impl std::error::Error for CompileError {}

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;

/// Formats diagnostics with source code context.
///
/// Produces the location header, the offending source line with a `^^^`
/// underline, secondary labels and `help:` notes.
pub struct DiagnosticFormatter<'a> {
    sources: &'a SourceMap,
}

impl<'a> DiagnosticFormatter<'a> {
    /// Creates a new diagnostic formatter over `sources`.
    pub fn new(sources: &'a SourceMap) -> Self {
        Self { sources }
    }

    /// Formats a diagnostic as a string with source context.
    pub fn format(&self, error: &CompileError) -> String {
        let mut output = format!(
            "{}: {}: {}\n",
            error.severity,
            error.kind.name(),
            error.message
        );

        // Spans pointing at files this map does not know are rendered bare.
        let Some(file) = self.sources.file_by_id(error.span.file_id) else {
            for note in &error.notes {
                output.push_str(&format!("   = help: {}\n", note));
            }
            return output;
        };

        let (line, col) = file.line_col(error.span.start);
        output.push_str(&format!("  --> {}:{}:{}\n", file.path.display(), line, col));

        if let Some(source_line) = file.line_text(line) {
            let source_line = source_line.trim_end_matches(['\n', '\r']);
            output.push_str("   |\n");
            output.push_str(&format!("{:3} | {}\n", line, source_line));

            let start_col = col as usize;
            let end_col = (start_col + error.span.len() as usize).min(source_line.len() + 1);
            let underline = " ".repeat(start_col.saturating_sub(1))
                + &"^".repeat(end_col.saturating_sub(start_col).max(1));
            output.push_str(&format!("   | {}\n", underline));
        }

        for label in &error.labels {
            output.push_str(&format!("   = note: {}\n", label.message));
            if let Some(label_file) = self.sources.file_by_id(label.span.file_id) {
                let (label_line, label_col) = label_file.line_col(label.span.start);
                output.push_str(&format!(
                    "     at {}:{}:{}\n",
                    label_file.path.display(),
                    label_line,
                    label_col
                ));
            }
        }

        for note in &error.notes {
            output.push_str(&format!("   = help: {}\n", note));
        }

        output
    }

    /// Formats multiple diagnostics separated by blank lines.
    pub fn format_all(&self, errors: &[CompileError]) -> String {
        errors
            .iter()
            .map(|e| self.format(e))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn dummy_span() -> Span {
        Span::new(0, 0, 5, 1)
    }

    fn test_sources() -> SourceMap {
        let mut sources = SourceMap::new();
        sources.add_file(
            PathBuf::from("norton.mfront"),
            "@Algorithm rk7;\n@Epsilon -1;".to_string(),
        );
        sources
    }

    #[test]
    fn test_error_creation() {
        let err = CompileError::new(
            ErrorKind::DuplicateAttribute,
            dummy_span(),
            "epsilon already set",
        );
        assert_eq!(err.kind, ErrorKind::DuplicateAttribute);
        assert_eq!(err.severity, Severity::Error);
        assert!(err.is_fatal());
        assert!(err.labels.is_empty());
        assert!(err.notes.is_empty());
    }

    #[test]
    fn test_warning_is_not_fatal() {
        let warn = CompileError::warning(ErrorKind::MissingCodeBlock, dummy_span(), "unused");
        assert_eq!(warn.severity, Severity::Warning);
        assert!(!warn.is_fatal());
    }

    #[test]
    fn test_error_chaining() {
        let err = CompileError::new(ErrorKind::DuplicateName, dummy_span(), "duplicate 'p'")
            .with_label(dummy_span(), "first declared here")
            .with_note("rename one of the variables");
        assert_eq!(err.labels.len(), 1);
        assert_eq!(err.notes, vec!["rename one of the variables".to_string()]);
    }

    #[test]
    fn test_all_error_kinds_have_names() {
        let kinds = [
            ErrorKind::Syntax,
            ErrorKind::UnknownKeyword,
            ErrorKind::DisabledKeyword,
            ErrorKind::UndefinedName,
            ErrorKind::DuplicateName,
            ErrorKind::ReservedName,
            ErrorKind::UnknownType,
            ErrorKind::DuplicateAttribute,
            ErrorKind::UnknownAlgorithm,
            ErrorKind::InvalidValue,
            ErrorKind::AlgorithmMismatch,
            ErrorKind::MissingCodeBlock,
            ErrorKind::DuplicateCodeBlock,
            ErrorKind::UnsupportedNesting,
            ErrorKind::InvalidNormalizationFactor,
            ErrorKind::GradientForceMismatch,
            ErrorKind::UnsupportedHypothesis,
            ErrorKind::Internal,
        ];
        assert_eq!(kinds.len(), ERROR_KIND_NAMES.len());
        for kind in kinds {
            assert!(!kind.name().is_empty());
        }
        assert_eq!(ErrorKind::Internal.name(), "internal compiler error");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Note < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn test_error_display() {
        let err = CompileError::new(
            ErrorKind::InvalidValue,
            dummy_span(),
            "epsilon value must be positive",
        );
        assert_eq!(
            err.to_string(),
            "error: invalid value: epsilon value must be positive"
        );
    }

    #[test]
    fn test_formatter_underlines_span() {
        let sources = test_sources();
        let error = CompileError::new(
            ErrorKind::UnknownAlgorithm,
            Span::new(0, 11, 14, 1),
            "unknown algorithm 'rk7'",
        );
        let formatted = DiagnosticFormatter::new(&sources).format(&error);
        assert!(formatted.contains("norton.mfront:1:12"));
        assert!(formatted.contains("  1 | @Algorithm rk7;"));
        assert!(formatted.contains("   |            ^^^"));
    }

    #[test]
    fn test_formatter_labels_and_notes() {
        let sources = test_sources();
        let error = CompileError::new(
            ErrorKind::InvalidValue,
            Span::new(0, 25, 27, 2),
            "epsilon value must be positive",
        )
        .with_label(Span::new(0, 0, 10, 1), "algorithm selected here")
        .with_note("use a value such as 1e-8");
        let formatted = DiagnosticFormatter::new(&sources).format(&error);
        assert!(formatted.contains("norton.mfront:2:10"));
        assert!(formatted.contains("note: algorithm selected here"));
        assert!(formatted.contains("at norton.mfront:1:1"));
        assert!(formatted.contains("help: use a value such as 1e-8"));
    }

    #[test]
    fn test_formatter_unknown_file() {
        let sources = SourceMap::new();
        let error = CompileError::new(ErrorKind::Internal, Span::zero(3), "lost")
            .with_note("report this");
        let formatted = DiagnosticFormatter::new(&sources).format(&error);
        assert!(formatted.starts_with("error: internal compiler error: lost"));
        assert!(formatted.contains("help: report this"));
    }

    #[test]
    fn test_format_all() {
        let sources = test_sources();
        let errors = vec![
            CompileError::new(ErrorKind::Syntax, Span::new(0, 0, 1, 1), "first"),
            CompileError::new(ErrorKind::Syntax, Span::new(0, 16, 17, 2), "second"),
        ];
        let formatted = DiagnosticFormatter::new(&sources).format_all(&errors);
        assert!(formatted.contains("first"));
        assert!(formatted.contains("second"));
    }
}

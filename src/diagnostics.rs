use std::fmt;

use thiserror::Error;

/// Represents a byte span within a source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn to(self, other: SourceSpan) -> Self {
        Self {
            start: self.start,
            end: other.end,
        }
    }
}

/// 1-based line and column of a byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn locate(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let mut line = 1;
        let mut column = 1;
        for (idx, ch) in source.char_indices() {
            if idx >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Classification of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexer,
    Parser,
    UnresolvedName,
    Arity,
    TypeMismatch,
    VoidMisuse,
    Arithmetic,
    Conversion,
    Registration,
    Resource,
    ControlFlow,
}

/// Rich diagnostic information surfaced to hosts.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Option<SourceSpan>,
    pub position: Option<Position>,
    pub expected: Vec<String>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
            position: None,
            expected: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Records the token kinds that would have been accepted at the error site.
    pub fn with_expected<I, S>(mut self, expected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected.extend(expected.into_iter().map(Into::into));
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Fills in the line/column from the span, if one is known.
    pub fn located_in(mut self, source: &str) -> Self {
        if self.position.is_none() {
            if let Some(span) = self.span {
                self.position = Some(Position::locate(source, span.start));
            }
        }
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(position) = self.position {
            write!(f, " at {position}")?;
        } else if let Some(span) = self.span {
            write!(f, " ({}..{})", span.start, span.end)?;
        }
        if !self.expected.is_empty() {
            write!(f, "; expected {}", self.expected.join(", "))?;
        }
        if !self.notes.is_empty() {
            writeln!(f)?;
            for note in &self.notes {
                writeln!(f, "  note: {note}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Unified error type for the sprig runtime and tooling.
#[derive(Debug, Error)]
pub enum SprigError {
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SprigError {
    /// The diagnostic kind, or `None` for I/O failures.
    pub fn kind(&self) -> Option<DiagnosticKind> {
        match self {
            SprigError::Diagnostic(diag) => Some(diag.kind),
            SprigError::Io(_) => None,
        }
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            SprigError::Diagnostic(diag) => Some(diag),
            SprigError::Io(_) => None,
        }
    }

    /// Attaches `span` to a diagnostic raised without one (host callbacks).
    pub fn or_span(self, span: SourceSpan) -> Self {
        match self {
            SprigError::Diagnostic(diag) if diag.span.is_none() => {
                SprigError::Diagnostic(diag.with_span(span))
            }
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, SprigError>;

pub(crate) fn error(kind: DiagnosticKind, message: impl Into<String>) -> SprigError {
    SprigError::from(Diagnostic::new(kind, message))
}

pub(crate) fn error_at(
    kind: DiagnosticKind,
    message: impl Into<String>,
    span: SourceSpan,
) -> SprigError {
    SprigError::from(Diagnostic::new(kind, message).with_span(span))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_line_and_column() {
        let source = "var a = 1\nvar b = @";
        let position = Position::locate(source, 18);
        assert_eq!(position, Position { line: 2, column: 9 });
    }

    #[test]
    fn display_includes_expected_set() {
        let diag = Diagnostic::new(DiagnosticKind::Parser, "unexpected token")
            .with_position(Position { line: 1, column: 4 })
            .with_expected(["`)`", "`,`"]);
        assert_eq!(
            diag.to_string(),
            "Parser: unexpected token at line 1, column 4; expected `)`, `,`"
        );
    }
}

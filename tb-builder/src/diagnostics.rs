use std::fmt;

use crate::logging;

/// Why a compiled module could not be included.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IncludeFailure {
    NotFound,
    LoadFailure,
    BadFormat,
    BadName,
    PathTooLong,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    InvalidToken,
    InvalidHeader,
    InvalidOperator,
    NeedEnd,
    VarNotFound,
    TypeNotFound,
    DirectiveNotFound,
    InvalidOutType,
    Include(IncludeFailure),
    TokensLibrary,
}

impl DiagnosticKind {
    pub fn label(self) -> &'static str {
        match self {
            DiagnosticKind::InvalidToken => "invalid token",
            DiagnosticKind::InvalidHeader => "invalid header",
            DiagnosticKind::InvalidOperator => "invalid operator",
            DiagnosticKind::NeedEnd => "need end",
            DiagnosticKind::VarNotFound => "variable not found",
            DiagnosticKind::TypeNotFound => "type not found",
            DiagnosticKind::DirectiveNotFound => "directive not found",
            DiagnosticKind::InvalidOutType => "invalid output type",
            DiagnosticKind::Include(_) => "include error",
            DiagnosticKind::TokensLibrary => "tokens library error",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Failure reported by a collaborator that does not know the current line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildError {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl BuildError {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn at(self, line: u32) -> Diagnostic {
        Diagnostic {
            line,
            kind: self.kind,
            message: self.message,
        }
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for BuildError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: u32,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    /// Same text as `Display`, with the category coloured when the terminal allows it.
    pub fn render(&self) -> String {
        format!(
            "line {}: {}: {}",
            self.line,
            logging::kind_label(self.kind),
            self.message
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}: {}", self.line, self.kind, self.message)
    }
}

impl std::error::Error for Diagnostic {}

/// Ordered diagnostic list. Nothing is ever reordered, only appended or cut back.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(line = diagnostic.line, kind = %diagnostic.kind, "{}", diagnostic.message);
        self.entries.push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|diag| diag.kind == kind).count()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        for diagnostic in iter {
            self.push(diagnostic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_drops_only_later_entries() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(BuildError::new(DiagnosticKind::NeedEnd, "first").at(1));
        let mark = diagnostics.len();
        diagnostics.push(BuildError::new(DiagnosticKind::InvalidOperator, "second").at(2));
        diagnostics.truncate(mark);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics.count(DiagnosticKind::NeedEnd), 1);
    }

    #[test]
    fn display_includes_line_and_category() {
        let diagnostic =
            BuildError::new(DiagnosticKind::Include(IncludeFailure::NotFound), "gone").at(7);
        assert_eq!(diagnostic.to_string(), "line 7: include error: gone");
    }
}

//! Diagnostics emitted while merging and diffing SDK databases.
//!
//! Conflicts, missing methods and API regressions are not errors: they are
//! collected into a [`Diagnostics`] sink and only turned into a pass/fail
//! verdict at the end of an operation.

use std::fmt;

use tracing::{error, info, warn};

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational.
    Note,
    /// Suspicious but not fatal.
    Warning,
    /// Fails the operation.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Note => "note",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// A message argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagParam {
    /// Integer, printed as-is.
    Int(i64),
    /// Plain string, printed as-is.
    Str(String),
    /// Declaration name, printed in double quotes.
    Name(String),
    /// Type encoding or type name, printed in single quotes.
    Type(String),
}

impl DiagParam {
    /// Wraps a declaration name.
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Wraps a plain string.
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }
}

impl fmt::Display for DiagParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{}", value),
            Self::Str(value) => f.write_str(value),
            Self::Name(name) => write!(f, "\"{}\"", name),
            Self::Type(ty) => write!(f, "'{}'", ty),
        }
    }
}

/// Message templates. `%N` is replaced by the N-th parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Two equally ranked definitions of one key.
    DuplicateDefinition,
    /// A lookup hit a poisoned key.
    ConflictingDefinition,
    /// A header declaration has no binary counterpart.
    MissingFromBinary,
    /// A public API disappeared or became less accessible.
    AccessRegression,
    /// A new public API appeared.
    NewApi,
    /// Linkage differs between baseline and candidate.
    LinkageChanged,
    /// Availability differs between baseline and candidate.
    AvailabilityChanged,
    /// Superclass differs between baseline and candidate.
    SuperclassChanged,
}

impl DiagnosticKind {
    /// Returns the message template.
    pub fn template(self) -> &'static str {
        match self {
            Self::DuplicateDefinition => "duplicate definition of %0 in %1 and %2",
            Self::ConflictingDefinition => "%0 has conflicting definitions and is ignored",
            Self::MissingFromBinary => "%0 is declared in headers but missing from binary",
            Self::AccessRegression => "api access regression: %0 was %1 and is now %2",
            Self::NewApi => "new api: %0 is %1",
            Self::LinkageChanged => "linkage type is not equal for %0: %1 and %2",
            Self::AvailabilityChanged => "availability changed for %0: %1 and %2",
            Self::SuperclassChanged => "superclass of %0 changed from %1 to %2",
        }
    }

    /// Returns the severity this kind is reported with.
    pub fn severity(self) -> Severity {
        match self {
            Self::DuplicateDefinition
            | Self::ConflictingDefinition
            | Self::MissingFromBinary
            | Self::NewApi => Severity::Warning,
            Self::AccessRegression
            | Self::LinkageChanged
            | Self::AvailabilityChanged
            | Self::SuperclassChanged => Severity::Error,
        }
    }
}

/// One diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Message template
    pub kind: DiagnosticKind,
    /// Template arguments
    pub params: Vec<DiagParam>,
    /// Target triple the diagnostic applies to
    pub target: String,
    /// Install name of the binary involved, if any
    pub install_name: String,
}

impl Diagnostic {
    /// Creates a diagnostic with the kind's default severity.
    pub fn new(
        kind: DiagnosticKind,
        target: impl Into<String>,
        install_name: impl Into<String>,
        params: Vec<DiagParam>,
    ) -> Self {
        Self {
            severity: kind.severity(),
            kind,
            params,
            target: target.into(),
            install_name: install_name.into(),
        }
    }

    /// Overrides the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Expands the template.
    pub fn message(&self) -> String {
        let template = self.kind.template();
        let mut out = String::with_capacity(template.len() + 32);
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            match chars.peek().and_then(|d| d.to_digit(10)) {
                Some(index) => {
                    chars.next();
                    match self.params.get(index as usize) {
                        Some(param) => out.push_str(&param.to_string()),
                        None => out.push_str("<missing>"),
                    }
                }
                None => out.push('%'),
            }
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.target, self.install_name, self.message())
    }
}

/// Accumulating diagnostic sink.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    errors: usize,
    warnings: usize,
}

impl Diagnostics {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic and logs it.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => {
                self.errors += 1;
                error!("{}", diagnostic);
            }
            Severity::Warning => {
                self.warnings += 1;
                warn!("{}", diagnostic);
            }
            Severity::Note => info!("{}", diagnostic),
        }
        self.entries.push(diagnostic);
    }

    /// Returns every recorded diagnostic in emission order.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Returns the number of errors.
    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// Returns the number of warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    /// Returns true if any error was recorded.
    pub fn has_errors(&self) -> bool {
        self.errors != 0
    }

    /// Returns the recorded diagnostics of one kind.
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_rendering() {
        assert_eq!(DiagParam::Int(-3).to_string(), "-3");
        assert_eq!(DiagParam::str("plain").to_string(), "plain");
        assert_eq!(DiagParam::name("Foo").to_string(), "\"Foo\"");
        assert_eq!(DiagParam::Type("v16@0:8".into()).to_string(), "'v16@0:8'");
    }

    #[test]
    fn test_message_expansion() {
        let diag = Diagnostic::new(
            DiagnosticKind::DuplicateDefinition,
            "arm64-apple-macos14.0",
            "/usr/lib/libFoo.dylib",
            vec![
                DiagParam::name("_foo"),
                DiagParam::str("/a"),
                DiagParam::str("/b"),
            ],
        );
        assert_eq!(
            diag.to_string(),
            "arm64-apple-macos14.0: /usr/lib/libFoo.dylib: duplicate definition of \"_foo\" in /a and /b"
        );
    }

    #[test]
    fn test_missing_param_placeholder() {
        let diag = Diagnostic::new(DiagnosticKind::MissingFromBinary, "t", "lib", vec![]);
        assert_eq!(
            diag.message(),
            "<missing> is declared in headers but missing from binary"
        );
    }

    #[test]
    fn test_counts() {
        let mut diags = Diagnostics::new();
        diags.report(Diagnostic::new(DiagnosticKind::NewApi, "t", "", vec![]));
        diags.report(Diagnostic::new(DiagnosticKind::AccessRegression, "t", "", vec![]));
        diags.report(
            Diagnostic::new(DiagnosticKind::NewApi, "t", "", vec![]).with_severity(Severity::Note),
        );
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.warning_count(), 1);
        assert!(diags.has_errors());
        assert_eq!(diags.of_kind(DiagnosticKind::NewApi).count(), 2);
        assert_eq!(diags.entries().len(), 3);
    }
}

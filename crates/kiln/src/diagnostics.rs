use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

use crate::value::Path;

/// Diagnostic severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Aborts the run.
    Error,
    /// Reported without aborting the run.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
        })
    }
}

/// Kinds of diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A value fails its validator.
    Schema,
    /// An identifier reference is unresolved or has a mismatched type.
    Reference,
    /// A required component is missing, or dependencies form a cycle.
    Dependency,
    /// A component is not available on the selected target.
    Platform,
    /// A job is suspended indefinitely, or emitted inconsistent output.
    Emission,
    /// The configuration document cannot be read.
    Document,
    /// An invariant of the core itself is broken.
    Internal,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Schema => "schema",
            Self::Reference => "reference",
            Self::Dependency => "dependency",
            Self::Platform => "platform",
            Self::Emission => "emission",
            Self::Document => "document",
            Self::Internal => "internal",
        })
    }
}

/// A positioned finding reported to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Diagnostic severity.
    pub severity: Severity,
    /// Diagnostic kind.
    pub kind: DiagnosticKind,
    /// Position inside the configuration document.
    pub path: Path,
    /// Diagnostic message.
    pub message: String,
    /// A suggestion to fix the problem.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Diagnostic {
    /// Creates an error [`Diagnostic`].
    #[must_use]
    pub fn error(kind: DiagnosticKind, path: Path, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            path,
            message: message.into(),
            hint: None,
        }
    }

    /// Creates a warning [`Diagnostic`].
    #[must_use]
    pub fn warning(kind: DiagnosticKind, path: Path, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, path, message)
        }
    }

    /// Adds a hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Whether the diagnostic aborts the run.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}: {}",
            self.severity, self.kind, self.path, self.message
        )?;
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {hint}")?;
        }
        Ok(())
    }
}

/// All possible error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The document fails schema, reference, dependency, or platform checks.
    Validation,
    /// Emission failed.
    Emission,
    /// The configuration document cannot be read or parsed.
    Document,
    /// The selected target profile does not exist.
    UnsupportedTarget,
    /// Output artifacts cannot be written.
    Output,
    /// An invariant of the core is broken.
    Internal,
}

impl ErrorKind {
    pub(crate) const fn description(self) -> &'static str {
        match self {
            Self::Validation => "Validation",
            Self::Emission => "Emission",
            Self::Document => "Document",
            Self::UnsupportedTarget => "Unsupported Target",
            Self::Output => "Output",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.description().fmt(f)
    }
}

/// A compilation error.
///
/// Carries the [`ErrorKind`], a general description, the diagnostics
/// collected before aborting, and for internal errors a trail of the
/// operations which were running.
#[derive(Debug, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    description: Cow<'static, str>,
    diagnostics: Vec<Diagnostic>,
    trail: Vec<String>,
}

impl Error {
    /// Creates an [`Error`].
    #[must_use]
    pub fn new(kind: ErrorKind, description: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            description: description.into(),
            diagnostics: Vec::new(),
            trail: Vec::new(),
        }
    }

    /// Creates an [`Error`] carrying diagnostics.
    #[must_use]
    pub fn with_diagnostics(
        kind: ErrorKind,
        description: impl Into<Cow<'static, str>>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        Self {
            diagnostics,
            ..Self::new(kind, description)
        }
    }

    /// Creates an internal [`Error`].
    #[must_use]
    pub fn internal(description: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Internal, description)
    }

    /// Appends an operation to the trail.
    #[must_use]
    pub fn context(mut self, frame: impl Into<String>) -> Self {
        self.trail.push(frame.into());
        self
    }

    /// Returns the [`ErrorKind`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the general description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the collected diagnostics.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Returns the trail of operations, innermost first.
    #[must_use]
    pub fn trail(&self) -> &[String] {
        &self.trail
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.description)?;
        for frame in &self.trail {
            write!(f, "\n    while {frame}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::serialize;
    use crate::value::Path;

    use super::{Diagnostic, DiagnosticKind, Error, ErrorKind};

    #[test]
    fn diagnostic_display() {
        let diagnostic = Diagnostic::error(
            DiagnosticKind::Schema,
            Path::root().key("i2c").index(0).key("frequency"),
            "Unknown unit 'kHzz'",
        )
        .with_hint("did you mean kHz?");

        assert_eq!(
            diagnostic.to_string(),
            "error[schema] i2c[0].frequency: Unknown unit 'kHzz'\n  hint: did you mean kHz?"
        );
    }

    #[test]
    fn diagnostic_serialization() {
        let diagnostic = Diagnostic::warning(
            DiagnosticKind::Schema,
            Path::root().key("switch").index(1).key("pin"),
            "GPIO0 is a strapping pin",
        );

        assert_eq!(
            serialize(diagnostic),
            json!({
                "severity": "warning",
                "kind": "schema",
                "path": "switch[1].pin",
                "message": "GPIO0 is a strapping pin",
            })
        );
    }

    #[test]
    fn error_trail() {
        let error = Error::internal("identifier changed during final validation")
            .context("running final validation of `ade7880`");

        assert_eq!(error.kind(), ErrorKind::Internal);
        assert_eq!(
            error.to_string(),
            "Internal error: identifier changed during final validation\n    while running final validation of `ade7880`"
        );
    }
}

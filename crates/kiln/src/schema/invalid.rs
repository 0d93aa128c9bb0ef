use std::fmt;

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::value::{Path, PathSegment};

/// A single validation failure, positioned relative to the validated value.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    /// Diagnostic kind.
    pub kind: DiagnosticKind,
    /// Relative position.
    pub path: Path,
    /// Failure message.
    pub message: String,
    /// A suggestion to fix the failure.
    pub hint: Option<String>,
}

/// The failures accumulated while validating a value.
///
/// Record validators keep validating after a failing key, so a single
/// [`Invalid`] may carry many issues. Nested validators report their issues
/// relative to the value they received, and every enclosing record or list
/// prepends its key or index.
#[derive(Debug, Clone, PartialEq)]
pub struct Invalid {
    issues: Vec<Issue>,
}

impl Invalid {
    /// Creates an [`Invalid`] with a schema issue at the validated value.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self::of_kind(DiagnosticKind::Schema, message)
    }

    /// Creates an [`Invalid`] with an issue of the given kind.
    #[must_use]
    pub fn of_kind(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            issues: vec![Issue {
                kind,
                path: Path::root(),
                message: message.into(),
                hint: None,
            }],
        }
    }

    /// Attaches a hint to the most recent issue.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        if let Some(issue) = self.issues.last_mut() {
            issue.hint = Some(hint.into());
        }
        self
    }

    /// Positions every issue under a mapping key.
    #[must_use]
    pub fn key(mut self, key: &str) -> Self {
        for issue in &mut self.issues {
            issue.path.prepend(PathSegment::Key(key.to_string()));
        }
        self
    }

    /// Positions every issue under a list index.
    #[must_use]
    pub fn index(mut self, index: usize) -> Self {
        for issue in &mut self.issues {
            issue.path.prepend(PathSegment::Index(index));
        }
        self
    }

    /// Positions every issue under an absolute path.
    #[must_use]
    pub fn at(mut self, prefix: &Path) -> Self {
        for issue in &mut self.issues {
            issue.path.prepend_path(prefix);
        }
        self
    }

    /// Appends the issues of another [`Invalid`].
    pub fn merge(&mut self, other: Invalid) {
        self.issues.extend(other.issues);
    }

    /// Merges an optional accumulator with a new failure.
    pub(crate) fn accumulate(errors: &mut Option<Invalid>, other: Invalid) {
        match errors {
            Some(errors) => errors.merge(other),
            None => *errors = Some(other),
        }
    }

    /// Returns the issues.
    #[must_use]
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Returns the first issue message.
    #[must_use]
    pub fn message(&self) -> &str {
        self.issues.first().map_or("", |issue| issue.message.as_str())
    }

    /// Converts the issues into error diagnostics positioned under `prefix`.
    #[must_use]
    pub fn into_diagnostics(self, prefix: &Path) -> Vec<Diagnostic> {
        self.issues
            .into_iter()
            .map(|mut issue| {
                issue.path.prepend_path(prefix);
                let diagnostic = Diagnostic::error(issue.kind, issue.path, issue.message);
                match issue.hint {
                    Some(hint) => diagnostic.with_hint(hint),
                    None => diagnostic,
                }
            })
            .collect()
    }
}

impl fmt::Display for Invalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            if issue.path.is_root() {
                f.write_str(&issue.message)?;
            } else {
                write!(f, "{}: {}", issue.path, issue.message)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Invalid {}

/// Returns the candidate closest to `value`, if any is close enough to be
/// a plausible typo.
pub(crate) fn close_match<'a>(
    value: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Option<&'a str> {
    let value = value.to_lowercase();
    candidates
        .into_iter()
        .map(|candidate| (levenshtein(&value, &candidate.to_lowercase()), candidate))
        .filter(|(distance, candidate)| *distance <= allowed_edits(candidate))
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate)
}

// Transposing two letters costs two edits.
fn allowed_edits(candidate: &str) -> usize {
    match candidate.chars().count() {
        0..=3 => 1,
        length => (length / 3).max(2),
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use crate::diagnostics::DiagnosticKind;
    use crate::value::Path;

    use super::{Invalid, close_match};

    #[test]
    fn positions() {
        let mut errors = Invalid::new("Unknown unit").key("frequency");
        errors.merge(Invalid::new("Invalid pin number: GPIOX").with_hint("use GPIO21").key("sda"));

        let errors = errors.index(1);
        let diagnostics = errors.into_diagnostics(&Path::root().key("i2c"));

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].path.to_string(), "i2c[1].frequency");
        assert_eq!(diagnostics[1].path.to_string(), "i2c[1].sda");
        assert_eq!(diagnostics[1].hint.as_deref(), Some("use GPIO21"));
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Schema);
    }

    #[test]
    fn close_matches() {
        let keys = ["frequency", "sda", "scl", "scan"];
        assert_eq!(close_match("frequncy", keys), Some("frequency"));
        assert_eq!(close_match("sca", keys), Some("sda"));
        assert_eq!(close_match("temperature", keys), None);
        assert_eq!(close_match("dealy", ["delay", "lambda", "if"]), Some("delay"));
        assert_eq!(close_match("swtich", ["switch", "sensor"]), Some("switch"));
        assert_eq!(close_match("cs", ["sda", "scl"]), None);
    }

    #[test]
    fn display() {
        let errors = Invalid::new("Expected integer").key("address");
        assert_eq!(errors.to_string(), "address: Expected integer");
        assert_eq!(errors.message(), "Expected integer");
    }
}

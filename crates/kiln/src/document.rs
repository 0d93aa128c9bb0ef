//! Configuration documents.
//!
//! Documents are YAML. Scalars stay untyped strings, numbers, and booleans
//! until the schema of their component interprets them; the only custom tag
//! is `!lambda`, marking a lambda body. A top-level `substitutions:` mapping
//! is applied to every string and lambda body before validation and then
//! removed from the document.

use crate::diagnostics::{Diagnostic, DiagnosticKind, Error, ErrorKind};
use crate::value::{ConfigMap, LambdaSource, Path, Value, config_map};

const SUBSTITUTIONS: &str = "substitutions";

/// A parsed configuration document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: ConfigMap,
}

impl Document {
    /// Parses a YAML document.
    ///
    /// # Errors
    ///
    /// Fails on YAML syntax errors, unsupported tags, non-string keys, a
    /// non-mapping root, and unknown substitutions.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let yaml: serde_yaml::Value = serde_yaml::from_str(text).map_err(|error| {
            document_error(vec![Diagnostic::error(
                DiagnosticKind::Document,
                Path::root(),
                error.to_string(),
            )])
        })?;

        let mut diagnostics = Vec::new();
        let root = convert(yaml, &Path::root(), &mut diagnostics);
        if !diagnostics.is_empty() {
            return Err(document_error(diagnostics));
        }

        let mut root = match root {
            Value::Map(map) => map,
            Value::Null => config_map(),
            value => {
                return Err(document_error(vec![Diagnostic::error(
                    DiagnosticKind::Document,
                    Path::root(),
                    format!("The document must be a mapping, got {}", value.kind_name()),
                )]));
            }
        };

        let substitutions = root.shift_remove(SUBSTITUTIONS).unwrap_or(Value::Null);
        substitute(&mut root, substitutions)?;
        Ok(Self { root })
    }

    /// Reads and parses a YAML document.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, or like [`Document::parse`].
    pub fn load(path: &std::path::Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|error| {
            Error::new(
                ErrorKind::Document,
                format!("Couldn't read {}: {error}", path.display()),
            )
        })?;
        tracing::info!("Loaded document {}", path.display());
        Self::parse(&text)
    }

    /// Returns the top-level mapping.
    #[must_use]
    pub const fn root(&self) -> &ConfigMap {
        &self.root
    }

    /// Consumes the document into its top-level mapping.
    #[must_use]
    pub fn into_root(self) -> ConfigMap {
        self.root
    }
}

impl From<ConfigMap> for Document {
    fn from(root: ConfigMap) -> Self {
        Self { root }
    }
}

fn document_error(diagnostics: Vec<Diagnostic>) -> Error {
    Error::with_diagnostics(ErrorKind::Document, "Invalid document", diagnostics)
}

fn convert(yaml: serde_yaml::Value, path: &Path, diagnostics: &mut Vec<Diagnostic>) -> Value {
    match yaml {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(value) => Value::Bool(value),
        serde_yaml::Value::Number(number) => match number.as_i64() {
            Some(value) => Value::Int(value),
            None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
        },
        serde_yaml::Value::String(text) => Value::String(text),
        serde_yaml::Value::Sequence(items) => Value::List(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| convert(item, &path.index(i), diagnostics))
                .collect(),
        ),
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = config_map();
            for (key, value) in mapping {
                let key = match key {
                    serde_yaml::Value::String(key) => key,
                    key => {
                        diagnostics.push(Diagnostic::error(
                            DiagnosticKind::Document,
                            path.clone(),
                            format!("Mapping keys must be strings, got {}", describe(&key)),
                        ));
                        continue;
                    }
                };
                let value = convert(value, &path.key(key.as_str()), diagnostics);
                if map.insert(key.clone(), value).is_some() {
                    diagnostics.push(Diagnostic::error(
                        DiagnosticKind::Document,
                        path.key(key),
                        "Duplicate key",
                    ));
                }
            }
            Value::Map(map)
        }
        serde_yaml::Value::Tagged(tagged) => {
            if tagged.tag == "lambda" {
                match tagged.value {
                    serde_yaml::Value::String(body) => Value::Lambda(LambdaSource::new(body)),
                    value => {
                        diagnostics.push(Diagnostic::error(
                            DiagnosticKind::Document,
                            path.clone(),
                            format!("!lambda must tag a string, got {}", describe(&value)),
                        ));
                        Value::Null
                    }
                }
            } else {
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::Document,
                    path.clone(),
                    format!("Unsupported tag {}", tagged.tag),
                ));
                Value::Null
            }
        }
    }
}

fn describe(yaml: &serde_yaml::Value) -> &'static str {
    match yaml {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a list",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}

fn substitute(root: &mut ConfigMap, substitutions: Value) -> Result<(), Error> {
    let base = Path::root().key(SUBSTITUTIONS);
    let mut diagnostics = Vec::new();

    let mut variables = Vec::new();
    match substitutions {
        Value::Map(map) => {
            for (name, value) in map {
                let text = match value {
                    Value::String(text) => text,
                    Value::Int(_) | Value::Float(_) | Value::Bool(_) => value.to_string(),
                    value => {
                        diagnostics.push(Diagnostic::error(
                            DiagnosticKind::Schema,
                            base.key(name.as_str()),
                            format!("Substitution values must be scalars, got {}", value.kind_name()),
                        ));
                        continue;
                    }
                };
                variables.push((name, text));
            }
        }
        Value::Null => {}
        value => diagnostics.push(Diagnostic::error(
            DiagnosticKind::Schema,
            base.clone(),
            format!("Substitutions must be a mapping, got {}", value.kind_name()),
        )),
    }

    for (key, value) in root.iter_mut() {
        value.walk_mut(&Path::root().key(key.as_str()), &mut |path, value| {
            let text = match value {
                Value::String(text) => text,
                Value::Lambda(lambda) => &mut lambda.body,
                _ => return,
            };
            if !text.contains('$') {
                return;
            }
            match expand(text, &variables) {
                Ok(expanded) => *text = expanded,
                Err(name) => diagnostics.push(
                    Diagnostic::error(
                        DiagnosticKind::Schema,
                        path.clone(),
                        format!("Unknown substitution '{name}'"),
                    )
                    .with_hint("declare it in the substitutions block"),
                ),
            }
        });
    }

    if diagnostics.is_empty() {
        tracing::debug!("Applied {} substitutions", variables.len());
        Ok(())
    } else {
        Err(Error::with_diagnostics(
            ErrorKind::Validation,
            "Invalid substitutions",
            diagnostics,
        ))
    }
}

// Expands `${name}` and `$name`. Returns the first unknown name.
fn expand(text: &str, variables: &[(String, String)]) -> Result<String, String> {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('$') {
        output.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        if name.is_empty() {
            output.push('$');
            rest = after;
            continue;
        }
        let Some((_, value)) = variables.iter().find(|(variable, _)| variable == name) else {
            return Err(name.to_string());
        };
        output.push_str(value);
        rest = &after[consumed..];
    }
    output.push_str(rest);
    Ok(output)
}

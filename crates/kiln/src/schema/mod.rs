//! A composable validator algebra.
//!
//! Every validator receives a raw [`Value`] and returns either its
//! normalized form or an [`Invalid`] value carrying positioned issues.
//! Validators compose through [`Schema`] records, [`Validator::All`],
//! [`Validator::Any`], [`ensure_list`], and [`maybe_simple_value`].

use std::fmt;
use std::sync::Arc;

use crate::value::{ConfigMap, Value, config_map};

mod base;
mod context;
mod domain;
pub(crate) mod invalid;
mod primitives;

pub use base::*;
pub use context::ValidationContext;
pub use domain::*;
pub use invalid::{Invalid, Issue};
pub use primitives::*;

pub(crate) use invalid::close_match;

/// The function type behind [`Validator::Func`].
pub type ValidatorFn =
    Arc<dyn Fn(Value, &mut ValidationContext<'_>) -> Result<Value, Invalid> + Send + Sync>;

/// A validator.
#[derive(Clone)]
pub enum Validator {
    /// A record with known keys.
    Record(Schema),
    /// Validates left to right, each validator seeing the previous output.
    All(Vec<Validator>),
    /// The first validator accepting the value wins. When every validator
    /// fails, the issues of all of them are reported.
    Any(Vec<Validator>),
    /// A validation function.
    Func(ValidatorFn),
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record(schema) => f.debug_tuple("Record").field(schema).finish(),
            Self::All(validators) => f.debug_tuple("All").field(validators).finish(),
            Self::Any(validators) => f.debug_tuple("Any").field(validators).finish(),
            Self::Func(_) => f.write_str("Func"),
        }
    }
}

impl Validator {
    /// Wraps a function into a [`Validator`].
    #[must_use]
    pub fn from_fn<F>(function: F) -> Self
    where
        F: Fn(Value, &mut ValidationContext<'_>) -> Result<Value, Invalid> + Send + Sync + 'static,
    {
        Self::Func(Arc::new(function))
    }

    /// A validator accepting every value unchanged.
    #[must_use]
    pub fn any_value() -> Self {
        Self::from_fn(|value, _cx| Ok(value))
    }

    /// Chains a further validator after this one.
    #[must_use]
    pub fn then(self, next: Validator) -> Self {
        match self {
            Self::All(mut validators) => {
                validators.push(next);
                Self::All(validators)
            }
            validator => Self::All(vec![validator, next]),
        }
    }

    /// Merges the keys of `other` into the record behind this validator.
    ///
    /// The record of an [`Validator::All`] chain is its first record, while
    /// every alternative of an [`Validator::Any`] is extended.
    ///
    /// # Panics
    ///
    /// Extending a plain function is a programming error and panics,
    /// reporting the caller location.
    #[must_use]
    #[track_caller]
    pub fn extend(self, other: Schema) -> Self {
        match self {
            Self::Record(schema) => Self::Record(schema.extend(other)),
            Self::All(mut validators) => {
                match validators.iter().position(|v| matches!(v, Self::Record(_))) {
                    Some(index) => {
                        let record = validators.remove(index);
                        validators.insert(index, record.extend(other));
                    }
                    None => validators.insert(0, Self::Record(other)),
                }
                Self::All(validators)
            }
            Self::Any(validators) => Self::Any(
                validators
                    .into_iter()
                    .map(|validator| validator.extend(other.clone()))
                    .collect(),
            ),
            Self::Func(_) => {
                let location = std::panic::Location::caller();
                panic!("cannot extend a validation function with a record (extended at {location})")
            }
        }
    }

    /// Validates a value.
    ///
    /// # Errors
    ///
    /// Returns every issue found.
    pub fn validate(&self, value: Value, cx: &mut ValidationContext<'_>) -> Result<Value, Invalid> {
        match self {
            Self::Record(schema) => schema.validate(value, cx),
            Self::All(validators) => {
                let mut value = value;
                for validator in validators {
                    value = validator.validate(value, cx)?;
                }
                Ok(value)
            }
            Self::Any(validators) => {
                let mut errors: Option<Invalid> = None;
                for validator in validators {
                    match validator.validate(value.clone(), cx) {
                        Ok(value) => return Ok(value),
                        Err(error) => Invalid::accumulate(&mut errors, error),
                    }
                }
                Err(errors.unwrap_or_else(|| Invalid::new("no alternative accepts the value")))
            }
            Self::Func(function) => function(value, cx),
        }
    }
}

impl From<Schema> for Validator {
    fn from(schema: Schema) -> Self {
        Self::Record(schema)
    }
}

/// Builds a [`Validator::All`].
#[must_use]
pub fn all(validators: Vec<Validator>) -> Validator {
    Validator::All(validators)
}

/// Builds a [`Validator::Any`].
#[must_use]
pub fn any(validators: Vec<Validator>) -> Validator {
    Validator::Any(validators)
}

#[derive(Debug, Clone)]
enum Presence {
    Required,
    Optional,
    Default(Value),
    Generated,
}

#[derive(Debug, Clone)]
struct Field {
    key: String,
    presence: Presence,
    validator: Validator,
}

/// A record of known keys.
///
/// Schemas are immutable values: every builder method returns a new record.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<Field>,
    allow_extra: bool,
}

impl Schema {
    /// Creates an empty [`Schema`].
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn field(mut self, key: &str, presence: Presence, validator: Validator) -> Self {
        let field = Field {
            key: key.to_string(),
            presence,
            validator,
        };
        match self.fields.iter_mut().find(|field| field.key == key) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    /// Adds a key which must be present.
    #[must_use]
    pub fn required(self, key: &str, validator: Validator) -> Self {
        self.field(key, Presence::Required, validator)
    }

    /// Adds a key which may be absent.
    #[must_use]
    pub fn optional(self, key: &str, validator: Validator) -> Self {
        self.field(key, Presence::Optional, validator)
    }

    /// Adds a key replaced by a default value when absent.
    ///
    /// The default is validated like a configured value.
    #[must_use]
    pub fn optional_default(self, key: &str, default: impl Into<Value>, validator: Validator) -> Self {
        self.field(key, Presence::Default(default.into()), validator)
    }

    /// Adds an identifier key which is generated when absent.
    #[must_use]
    pub fn generated(self, key: &str, validator: Validator) -> Self {
        self.field(key, Presence::Generated, validator)
    }

    /// Accepts keys which are not declared.
    #[must_use]
    pub fn allow_extra(mut self) -> Self {
        self.allow_extra = true;
        self
    }

    /// Merges two records. Keys of `other` replace keys with the same name.
    #[must_use]
    pub fn extend(mut self, other: Schema) -> Self {
        for field in other.fields {
            self = self.field(&field.key, field.presence, field.validator);
        }
        self.allow_extra |= other.allow_extra;
        self
    }

    /// Returns the declared keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.key.as_str())
    }

    /// Validates a mapping against the record.
    ///
    /// # Errors
    ///
    /// Returns the issues of every failing key.
    pub fn validate(&self, value: Value, cx: &mut ValidationContext<'_>) -> Result<Value, Invalid> {
        let mut input = match value {
            Value::Map(map) => map,
            Value::Null => config_map(),
            value => {
                return Err(Invalid::new(format!(
                    "expected a dictionary, got {}",
                    value.kind_name()
                )));
            }
        };

        let mut output = config_map();
        let mut errors: Option<Invalid> = None;

        for field in &self.fields {
            let result = match (input.shift_remove(&field.key), &field.presence) {
                (Some(value), _) => field.validator.validate(value, cx),
                (None, Presence::Required) => Err(Invalid::new("required key not provided")),
                (None, Presence::Optional) => continue,
                (None, Presence::Default(default)) => field.validator.validate(default.clone(), cx),
                (None, Presence::Generated) => field.validator.validate(Value::Null, cx),
            };
            match result {
                Ok(value) => {
                    let _ = output.insert(field.key.clone(), value);
                }
                Err(error) => Invalid::accumulate(&mut errors, error.key(&field.key)),
            }
        }

        for (key, value) in input {
            if self.allow_extra {
                let _ = output.insert(key, value);
                continue;
            }
            let error = Invalid::new(format!("[{key}] is an invalid option"));
            let error = match close_match(&key, self.keys()) {
                Some(candidate) => error.with_hint(format!("did you mean '{candidate}'?")),
                None => error,
            };
            Invalid::accumulate(&mut errors, error.key(&key));
        }

        match errors {
            Some(errors) => Err(errors),
            None => Ok(Value::Map(output)),
        }
    }
}

/// Accepts a single item or a list of items, normalizing to a list.
///
/// Absent values and empty mappings become an empty list.
#[must_use]
pub fn ensure_list(item: Validator) -> Validator {
    Validator::from_fn(move |value, cx| {
        let items = match value {
            Value::Null => return Ok(Value::List(Vec::new())),
            Value::Map(map) if map.is_empty() => return Ok(Value::List(Vec::new())),
            Value::List(items) => items,
            value => return Ok(Value::List(vec![item.validate(value, cx)?])),
        };

        let mut output = Vec::with_capacity(items.len());
        let mut errors: Option<Invalid> = None;
        for (i, value) in items.into_iter().enumerate() {
            match item.validate(value, cx) {
                Ok(value) => output.push(value),
                Err(error) => Invalid::accumulate(&mut errors, error.index(i)),
            }
        }
        match errors {
            Some(errors) => Err(errors),
            None => Ok(Value::List(output)),
        }
    })
}

/// Treats a scalar input as a mapping of `key` to the scalar.
#[must_use]
pub fn maybe_simple_value(schema: Validator, key: &'static str) -> Validator {
    Validator::from_fn(move |value, cx| match value {
        Value::Map(map) if map.contains_key(key) => schema.validate(Value::Map(map), cx),
        value => {
            let mut map = config_map();
            let _ = map.insert(key.to_string(), value);
            schema.validate(Value::Map(map), cx)
        }
    })
}

/// Returns a mapping value or an internal error for validators running after
/// a record.
pub(crate) fn expect_map(value: Value) -> Result<ConfigMap, Invalid> {
    match value {
        Value::Map(map) => Ok(map),
        value => Err(Invalid::new(format!(
            "expected a dictionary, got {}",
            value.kind_name()
        ))),
    }
}

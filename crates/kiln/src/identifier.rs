use std::fmt;

use crate::types::TypeRef;

// Names colliding with keywords and symbols of the generated runtime.
const RESERVED_IDS: &[&str] = &[
    "alarm", "alignas", "alignof", "and", "and_eq", "asm", "auto", "bitand", "bitor", "bool",
    "break", "case", "catch", "char", "char16_t", "char32_t", "class", "clock", "compl", "concept",
    "const", "constexpr", "const_cast", "continue", "decltype", "default", "delete", "do",
    "double", "dynamic_cast", "else", "enum", "explicit", "export", "extern", "false", "float",
    "for", "friend", "goto", "if", "inline", "int", "long", "mutable", "namespace", "new",
    "noexcept", "not", "not_eq", "nullptr", "operator", "or", "or_eq", "private", "protected",
    "public", "register", "reinterpret_cast", "requires", "return", "short", "signed", "sizeof",
    "static", "static_assert", "static_cast", "struct", "switch", "template", "text", "this",
    "thread_local", "throw", "true", "try", "typedef", "typeid", "typename", "union", "unsigned",
    "using", "virtual", "void", "volatile", "wchar_t", "while", "xor", "xor_eq", "App", "pinMode",
    "delay", "delayMicroseconds", "digitalRead", "digitalWrite", "INPUT", "OUTPUT", "uint8_t",
    "uint16_t", "uint32_t", "uint64_t", "int8_t", "int16_t", "int32_t", "int64_t", "close",
    "pause", "sleep", "open", "setup", "loop", "uart0", "uart1", "uart2",
];

/// How an identifier obtained its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdOrigin {
    /// Written in the configuration document.
    Manual,
    /// Synthesized from its component and type.
    Generated,
    /// Awaiting a synthesized name.
    Pending,
}

/// A typed handle for an object declared in the generated program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    name: String,
    declared_type: TypeRef,
    origin: IdOrigin,
}

impl Identifier {
    /// Creates an [`Identifier`] named by the user.
    #[must_use]
    pub fn manual(name: impl Into<String>, declared_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            declared_type,
            origin: IdOrigin::Manual,
        }
    }

    /// Creates an [`Identifier`] whose name is synthesized later from the
    /// given base.
    #[must_use]
    pub fn pending(base: impl Into<String>, declared_type: TypeRef) -> Self {
        Self {
            name: base.into(),
            declared_type,
            origin: IdOrigin::Pending,
        }
    }

    /// Returns the identifier name, or the name base while pending.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared type.
    #[must_use]
    pub const fn declared_type(&self) -> &TypeRef {
        &self.declared_type
    }

    /// Returns the identifier origin.
    #[must_use]
    pub const fn origin(&self) -> IdOrigin {
        self.origin
    }

    /// Whether the identifier still waits for a synthesized name.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.origin, IdOrigin::Pending)
    }

    /// Whether the identifier name was synthesized.
    #[must_use]
    pub const fn is_generated(&self) -> bool {
        matches!(self.origin, IdOrigin::Generated | IdOrigin::Pending)
    }

    /// Assigns a synthesized name.
    pub fn assign(&mut self, name: String) {
        self.name = name;
        self.origin = IdOrigin::Generated;
    }

    /// Returns a reference to this identifier requiring its own type.
    #[must_use]
    pub fn to_ref(&self) -> IdRef {
        IdRef::new(self.name.clone(), self.declared_type.clone())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.declared_type)
    }
}

/// A reference to an identifier declared elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdRef {
    /// Referenced name.
    pub name: String,
    /// Type the referenced identifier must be or inherit from.
    pub required_type: TypeRef,
}

impl IdRef {
    /// Creates an [`IdRef`].
    #[must_use]
    pub fn new(name: impl Into<String>, required_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            required_type,
        }
    }

    /// Creates an [`IdRef`] bound to the only declaration of the required
    /// type in the document.
    #[must_use]
    pub fn auto(required_type: TypeRef) -> Self {
        Self {
            name: String::new(),
            required_type,
        }
    }

    /// Whether the reference still waits for the only declaration of its
    /// type.
    #[must_use]
    pub fn is_auto(&self) -> bool {
        self.name.is_empty()
    }
}

impl fmt::Display for IdRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_auto() {
            write!(f, "<any {}>", self.required_type)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// Checks whether a name can be used as an identifier in the generated
/// program.
///
/// # Errors
///
/// Returns a message describing the offending part of the name.
pub fn validate_id_name(name: &str) -> Result<(), String> {
    let Some(first) = name.chars().next() else {
        return Err("ID must not be empty".into());
    };
    if first.is_ascii_digit() {
        return Err("First character in ID cannot be a digit.".into());
    }
    if name.contains('-') {
        return Err("Dashes are not supported in IDs, please use underscores instead.".into());
    }
    if let Some(c) = name.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(format!(
            "IDs must only consist of upper/lowercase characters, the underscore character and numbers. The character '{c}' cannot be used"
        ));
    }
    if RESERVED_IDS.contains(&name) {
        return Err(format!("ID '{name}' is reserved internally and cannot be used"));
    }
    Ok(())
}

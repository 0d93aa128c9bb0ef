use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use hashbrown::DefaultHashBuilder;

use indexmap::IndexMap;

use serde::{Serialize, Serializer};

use crate::ir::Expression;

/// Kinds of named types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// A class, possibly templated.
    Class,
    /// A plain structure.
    Struct,
    /// An enumeration.
    Enum,
    /// A builtin or standard library type.
    Primitive,
}

/// Pointer, reference, and qualification operators applicable to a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `T *`
    Ptr,
    /// `T &`
    Ref,
    /// `const T`
    Const,
}

impl Operator {
    /// Parses an operator name, either `ptr`, `ref`, or `const`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ptr" => Some(Self::Ptr),
            "ref" => Some(Self::Ref),
            "const" => Some(Self::Const),
            _ => None,
        }
    }
}

/// A type declared inside a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedType {
    namespace: Arc<str>,
    name: Arc<str>,
    kind: TypeKind,
    template: bool,
    bases: Vec<TypeRef>,
}

impl NamedType {
    /// Returns the type name without its namespace.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the fully qualified type name.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.to_string()
        } else {
            format!("{}::{}", self.namespace, self.name)
        }
    }

    /// Returns the type kind.
    #[must_use]
    pub const fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Returns the direct base types.
    #[must_use]
    pub fn bases(&self) -> &[TypeRef] {
        &self.bases
    }
}

/// A reference to a generated-program type.
///
/// Two references are equal when their structure is equal, so a type can be
/// rebuilt anywhere without consulting the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// A named type.
    Named(Arc<NamedType>),
    /// A templated instantiation of a named type.
    Template {
        /// Template class.
        base: Arc<NamedType>,
        /// Template arguments.
        args: Vec<TypeRef>,
    },
    /// A pointer to a type.
    Pointer(Box<TypeRef>),
    /// A reference to a type.
    Reference(Box<TypeRef>),
    /// A const-qualified type.
    Const(Box<TypeRef>),
}

impl TypeRef {
    /// Instantiates a template class with the given arguments.
    ///
    /// # Panics
    ///
    /// Templating a type which was not declared as a template is a
    /// programming error and panics, reporting the caller location.
    #[must_use]
    #[track_caller]
    pub fn template(&self, args: &[TypeRef]) -> TypeRef {
        match self {
            Self::Named(named) if named.template => Self::Template {
                base: Arc::clone(named),
                args: args.to_vec(),
            },
            _ => {
                let location = std::panic::Location::caller();
                panic!("`{self}` is not a template type (templated at {location})")
            }
        }
    }

    /// Applies an [`Operator`] to the type.
    #[must_use]
    pub fn operator(&self, operator: Operator) -> TypeRef {
        match operator {
            Operator::Ptr => Self::Pointer(Box::new(self.clone())),
            Operator::Ref => Self::Reference(Box::new(self.clone())),
            Operator::Const => Self::Const(Box::new(self.clone())),
        }
    }

    /// Returns a pointer to the type.
    #[must_use]
    #[inline]
    pub fn ptr(&self) -> TypeRef {
        self.operator(Operator::Ptr)
    }

    /// Returns the named type behind any template, pointer, reference,
    /// or qualifier.
    #[must_use]
    pub fn named(&self) -> &NamedType {
        match self {
            Self::Named(named) | Self::Template { base: named, .. } => &**named,
            Self::Pointer(inner) | Self::Reference(inner) | Self::Const(inner) => inner.named(),
        }
    }

    /// Whether this type is a pointer.
    #[must_use]
    pub const fn is_pointer(&self) -> bool {
        matches!(self, Self::Pointer(_))
    }

    /// Returns the template arguments of a templated instantiation.
    #[must_use]
    pub fn template_args(&self) -> &[TypeRef] {
        match self {
            Self::Template { args, .. } => args,
            _ => &[],
        }
    }

    /// Checks whether this type is `other` or inherits from it.
    #[must_use]
    pub fn is_subtype_of(&self, other: &TypeRef) -> bool {
        if self == other {
            return true;
        }
        match self {
            Self::Named(named) | Self::Template { base: named, .. } => {
                named.bases.iter().any(|base| base.is_subtype_of(other))
            }
            Self::Pointer(inner) => match other {
                Self::Pointer(other) => inner.is_subtype_of(other),
                _ => false,
            },
            Self::Reference(inner) => match other {
                Self::Reference(other) => inner.is_subtype_of(other),
                _ => false,
            },
            Self::Const(inner) => inner.is_subtype_of(other),
        }
    }

    /// Converts a type name into a snake case identifier fragment.
    #[must_use]
    pub fn snake_name(&self) -> String {
        snake_case(self.named().name())
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(named) => f.write_str(&named.full_name()),
            Self::Template { base, args } => {
                f.write_str(&base.full_name())?;
                f.write_str("<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    arg.fmt(f)?;
                }
                f.write_str(">")
            }
            Self::Pointer(inner) => write!(f, "{inner} *"),
            Self::Reference(inner) => write!(f, "{inner} &"),
            Self::Const(inner) => write!(f, "const {inner}"),
        }
    }
}

impl Serialize for TypeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub(crate) fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let previous = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(char::is_ascii_lowercase);
            if previous.is_ascii_lowercase()
                || (previous.is_ascii_uppercase() && next_lower)
                || (previous.is_ascii_digit() && next_lower)
            {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

#[derive(Debug, Default)]
struct TypeIndex {
    types: Mutex<IndexMap<String, TypeRef, DefaultHashBuilder>>,
}

impl TypeIndex {
    fn intern(&self, named: NamedType) -> TypeRef {
        let full_name = named.full_name();
        let mut types = self.types.lock().unwrap_or_else(PoisonError::into_inner);
        types
            .entry(full_name)
            .or_insert_with(|| TypeRef::Named(Arc::new(named)))
            .clone()
    }
}

/// A stable token for a generated-program namespace.
#[derive(Debug, Clone)]
pub struct NamespaceRef {
    path: Arc<str>,
    index: Arc<TypeIndex>,
}

impl PartialEq for NamespaceRef {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl NamespaceRef {
    /// Returns the fully qualified namespace path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns a namespace nested into this one.
    #[must_use]
    pub fn namespace(&self, name: &str) -> NamespaceRef {
        let path = if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}::{name}", self.path)
        };
        NamespaceRef {
            path: path.into(),
            index: Arc::clone(&self.index),
        }
    }

    /// Declares a class with the given base types.
    #[must_use]
    pub fn class_(&self, name: &str, bases: &[&TypeRef]) -> TypeRef {
        self.declare(name, TypeKind::Class, false, bases)
    }

    /// Declares a template class with the given base types.
    #[must_use]
    pub fn template_class(&self, name: &str, bases: &[&TypeRef]) -> TypeRef {
        self.declare(name, TypeKind::Class, true, bases)
    }

    /// Declares an enumeration.
    #[must_use]
    pub fn enum_(&self, name: &str) -> TypeRef {
        self.declare(name, TypeKind::Enum, false, &[])
    }

    /// Declares a structure.
    #[must_use]
    pub fn struct_(&self, name: &str) -> TypeRef {
        self.declare(name, TypeKind::Struct, false, &[])
    }

    /// Declares a primitive type living in this namespace.
    #[must_use]
    pub fn primitive(&self, name: &str) -> TypeRef {
        self.declare(name, TypeKind::Primitive, false, &[])
    }

    /// Refers to a symbol, such as a function or an enumerator, declared
    /// in this namespace.
    #[must_use]
    pub fn symbol(&self, name: &str) -> Expression {
        Expression::Symbol {
            namespace: self.path.to_string(),
            name: name.to_string(),
        }
    }

    fn declare(&self, name: &str, kind: TypeKind, template: bool, bases: &[&TypeRef]) -> TypeRef {
        self.index.intern(NamedType {
            namespace: Arc::clone(&self.path),
            name: name.into(),
            kind,
            template,
            bases: bases.iter().map(|base| (*base).clone()).collect(),
        })
    }
}

/// A process-wide directory of generated-program types.
///
/// The registry is passed explicitly to every component when it registers.
/// It can be queried by name for diagnostic purposes.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    index: Arc<TypeIndex>,
}

impl TypeRegistry {
    /// Creates an empty [`TypeRegistry`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the global namespace.
    #[must_use]
    pub fn global(&self) -> NamespaceRef {
        NamespaceRef {
            path: "".into(),
            index: Arc::clone(&self.index),
        }
    }

    /// Returns a top-level namespace.
    #[must_use]
    pub fn namespace(&self, name: &str) -> NamespaceRef {
        self.global().namespace(name)
    }

    /// Looks a type up by its fully qualified name.
    #[must_use]
    pub fn lookup(&self, full_name: &str) -> Option<TypeRef> {
        let types = self
            .index
            .types
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        types.get(full_name).cloned()
    }

    /// Returns the number of declared types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index
            .types
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no types are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Types shared by every component.
#[derive(Debug, Clone)]
pub struct CoreTypes {
    /// The `esphome` namespace of the generated runtime.
    pub esphome_ns: NamespaceRef,
    /// The global namespace.
    pub global_ns: NamespaceRef,
    /// The application root.
    pub application: TypeRef,
    /// Base class of every component.
    pub component: TypeRef,
    /// A component updated on an interval.
    pub polling_component: TypeRef,
    /// Base class of named entities.
    pub entity_base: TypeRef,
    /// `Trigger<Args...>`
    pub trigger: TypeRef,
    /// `Action<Args...>`
    pub action: TypeRef,
    /// `Condition<Args...>`
    pub condition: TypeRef,
    /// `Automation<Args...>`
    pub automation: TypeRef,
    /// A GPIO pin.
    pub gpio_pin: TypeRef,
    /// A GPIO pin wired to the microcontroller itself.
    pub internal_gpio_pin: TypeRef,
    /// `Parented<T>`
    pub parented: TypeRef,
    /// `void`
    pub void: TypeRef,
    /// `bool`
    pub bool_: TypeRef,
    /// `float`
    pub float_: TypeRef,
    /// `int32_t`
    pub int32: TypeRef,
    /// `uint8_t`
    pub uint8: TypeRef,
    /// `uint16_t`
    pub uint16: TypeRef,
    /// `uint32_t`
    pub uint32: TypeRef,
    /// `std::string`
    pub std_string: TypeRef,
}

impl CoreTypes {
    /// Declares the shared types into the given registry.
    #[must_use]
    pub fn new(types: &TypeRegistry) -> Self {
        let global_ns = types.global();
        let std_ns = types.namespace("std");
        let esphome_ns = types.namespace("esphome");

        let component = esphome_ns.class_("Component", &[]);
        let polling_component = esphome_ns.class_("PollingComponent", &[&component]);
        let gpio_pin = esphome_ns.class_("GPIOPin", &[]);
        let internal_gpio_pin = esphome_ns.class_("InternalGPIOPin", &[&gpio_pin]);

        Self {
            application: esphome_ns.class_("Application", &[]),
            entity_base: esphome_ns.class_("EntityBase", &[]),
            trigger: esphome_ns.template_class("Trigger", &[]),
            action: esphome_ns.template_class("Action", &[]),
            condition: esphome_ns.template_class("Condition", &[]),
            automation: esphome_ns.template_class("Automation", &[]),
            parented: esphome_ns.template_class("Parented", &[]),
            void: global_ns.primitive("void"),
            bool_: global_ns.primitive("bool"),
            float_: global_ns.primitive("float"),
            int32: global_ns.primitive("int32_t"),
            uint8: global_ns.primitive("uint8_t"),
            uint16: global_ns.primitive("uint16_t"),
            uint32: global_ns.primitive("uint32_t"),
            std_string: std_ns.primitive("string"),
            component,
            polling_component,
            gpio_pin,
            internal_gpio_pin,
            esphome_ns,
            global_ns,
        }
    }

    /// The global `App` variable.
    #[must_use]
    pub fn app(&self) -> Expression {
        Expression::variable("App", self.application.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreTypes, Operator, TypeRegistry, snake_case};

    #[test]
    fn structural_equality() {
        let registry = TypeRegistry::new();
        let ns = registry.namespace("bmp280");

        let first = ns.class_("BMP280Component", &[]);
        let second = registry.namespace("bmp280").class_("BMP280Component", &[]);

        assert_eq!(first, second);
        assert_eq!(first.to_string(), "bmp280::BMP280Component");
        assert_eq!(first.ptr().to_string(), "bmp280::BMP280Component *");
        assert_eq!(
            first.operator(Operator::Const).to_string(),
            "const bmp280::BMP280Component"
        );
        assert_eq!(registry.lookup("bmp280::BMP280Component"), Some(first));
        assert_eq!(Operator::from_name("ref"), Some(Operator::Ref));
        assert_eq!(Operator::from_name("volatile"), None);
    }

    #[test]
    fn inheritance() {
        let registry = TypeRegistry::new();
        let core = CoreTypes::new(&registry);

        let sensor_ns = core.esphome_ns.namespace("sensor");
        let sensor = sensor_ns.class_("Sensor", &[&core.entity_base]);
        let bmp280 = registry
            .namespace("bmp280")
            .class_("BMP280Component", &[&core.polling_component]);
        let trigger = sensor_ns.class_(
            "SensorStateTrigger",
            &[&core.trigger.template(&[core.float_.clone()])],
        );

        assert!(bmp280.is_subtype_of(&core.component));
        assert!(!bmp280.is_subtype_of(&sensor));
        assert!(sensor.is_subtype_of(&core.entity_base));
        assert!(trigger.is_subtype_of(&core.trigger.template(&[core.float_.clone()])));
        assert!(!trigger.is_subtype_of(&core.trigger.template(&[core.bool_.clone()])));
        assert_eq!(
            core.automation.template(&[core.float_.clone()]).to_string(),
            "esphome::Automation<float>"
        );
    }

    #[test]
    #[should_panic(expected = "is not a template type")]
    fn template_on_plain_class() {
        let registry = TypeRegistry::new();
        let plain = registry.namespace("i2c").class_("I2CBus", &[]);
        let _ = plain.template(&[]);
    }

    #[test]
    fn snake_names() {
        assert_eq!(snake_case("I2CBus"), "i2c_bus");
        assert_eq!(snake_case("BMP280Component"), "bmp280_component");
        assert_eq!(snake_case("SensorStateTrigger"), "sensor_state_trigger");
        assert_eq!(snake_case("GPIOSwitch"), "gpio_switch");
    }
}

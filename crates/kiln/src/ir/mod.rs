use std::panic::Location;

use serde::Serialize;

use crate::types::TypeRef;

mod display;

/// Where a piece of raw source text was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    /// Source file.
    pub file: String,
    /// Line number, starting from 1.
    pub line: u32,
    /// Column number, starting from 1.
    pub column: u32,
}

impl SourceLocation {
    /// Captures the location of the caller.
    #[must_use]
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self {
            file: location.file().to_string(),
            line: location.line(),
            column: location.column(),
        }
    }
}

/// A constant value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Literal {
    /// `nullptr`
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// An unsigned integer rendered in hexadecimal notation.
    Hex(u64),
    /// A floating point number.
    Float(f64),
    /// A string.
    String(String),
}

/// A lambda parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    /// Parameter type.
    pub ty: TypeRef,
    /// Parameter name.
    pub name: String,
}

impl Parameter {
    /// Creates a [`Parameter`].
    #[must_use]
    pub fn new(ty: TypeRef, name: impl Into<String>) -> Self {
        Self {
            ty,
            name: name.into(),
        }
    }
}

/// An opaque lambda whose body is compiled by the downstream toolchain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lambda {
    /// Declared parameters.
    pub parameters: Vec<Parameter>,
    /// Identifiers captured by the body through `id(...)`.
    pub captures: Vec<String>,
    /// Declared return type, if any.
    pub return_type: Option<TypeRef>,
    /// Body source text.
    pub body: String,
    /// Configuration path the body was read from.
    pub origin: String,
}

/// Raw source text, always tagged with the location which produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawExpression {
    /// Source text.
    pub text: String,
    /// Location which produced the text.
    pub location: SourceLocation,
}

/// Operators of [`Expression::Binary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    /// `|`
    BitOr,
    /// `&&`
    And,
    /// `||`
    Or,
}

impl BinaryOperator {
    /// Returns the operator token.
    #[must_use]
    pub const fn token(&self) -> &'static str {
        match self {
            Self::BitOr => "|",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

/// A pure expression of the generated program.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Expression {
    /// A constant.
    Literal {
        /// Constant value.
        value: Literal,
    },
    /// A named variable.
    Variable {
        /// Variable name.
        name: String,
        /// Variable type.
        ty: TypeRef,
    },
    /// A symbol declared in a namespace.
    Symbol {
        /// Namespace path, empty for the global namespace.
        namespace: String,
        /// Symbol name.
        name: String,
    },
    /// A member of an object, accessed through `.` or `->`.
    MemberAccess {
        /// The object.
        object: Box<Expression>,
        /// Member name.
        member: String,
        /// Whether the object is a pointer.
        arrow: bool,
    },
    /// A function call.
    Call {
        /// Called function.
        callee: Box<Expression>,
        /// Explicit template arguments.
        template_args: Vec<TypeRef>,
        /// Call arguments.
        args: Vec<Expression>,
    },
    /// A heap allocation of an object.
    New {
        /// Allocated type.
        ty: TypeRef,
        /// Constructor arguments.
        args: Vec<Expression>,
    },
    /// A type used in expression position.
    TemplateInstantiation {
        /// The instantiated type.
        ty: TypeRef,
    },
    /// An initializer list.
    Array {
        /// List elements.
        items: Vec<Expression>,
    },
    /// A binary operation.
    Binary {
        /// Operator.
        operator: BinaryOperator,
        /// Left operand.
        lhs: Box<Expression>,
        /// Right operand.
        rhs: Box<Expression>,
    },
    /// A lambda.
    Lambda(Lambda),
    /// Raw source text.
    Raw(RawExpression),
}

impl Expression {
    /// Builds a variable reference.
    #[must_use]
    pub fn variable(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::Variable {
            name: name.into(),
            ty,
        }
    }

    /// Builds a literal.
    #[must_use]
    pub fn literal(value: impl Into<Literal>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }

    /// Builds an integer rendered in hexadecimal notation.
    #[must_use]
    pub const fn hex(value: u64) -> Self {
        Self::Literal {
            value: Literal::Hex(value),
        }
    }

    /// Builds a heap allocation.
    #[must_use]
    pub fn new_object(ty: TypeRef, args: Vec<Expression>) -> Self {
        Self::New { ty, args }
    }

    /// Uses a type in expression position.
    #[must_use]
    pub fn type_(ty: TypeRef) -> Self {
        Self::TemplateInstantiation { ty }
    }

    /// Builds an initializer list.
    #[must_use]
    pub fn array(items: Vec<Expression>) -> Self {
        Self::Array { items }
    }

    /// Builds raw source text tagged with the caller location.
    #[must_use]
    #[track_caller]
    pub fn raw(text: impl Into<String>) -> Self {
        Self::Raw(RawExpression {
            text: text.into(),
            location: SourceLocation::caller(),
        })
    }

    /// Whether the expression evaluates to a pointer.
    #[must_use]
    pub fn is_pointer(&self) -> bool {
        match self {
            Self::Variable { ty, .. } => ty.is_pointer(),
            Self::New { .. } => true,
            _ => false,
        }
    }

    /// Accesses a member of this expression.
    #[must_use]
    pub fn member(&self, member: impl Into<String>) -> Self {
        Self::MemberAccess {
            arrow: self.is_pointer(),
            object: Box::new(self.clone()),
            member: member.into(),
        }
    }

    /// Calls a method on this expression.
    #[must_use]
    pub fn call(&self, method: impl Into<String>, args: Vec<Expression>) -> Self {
        self.member(method).invoke(args)
    }

    /// Calls a templated method on this expression.
    #[must_use]
    pub fn call_templated(
        &self,
        method: impl Into<String>,
        template_args: Vec<TypeRef>,
        args: Vec<Expression>,
    ) -> Self {
        Self::Call {
            callee: Box::new(self.member(method)),
            template_args,
            args,
        }
    }

    /// Combines this expression with another through a binary operator.
    #[must_use]
    pub fn binary(self, operator: BinaryOperator, rhs: Expression) -> Self {
        Self::Binary {
            operator,
            lhs: Box::new(self),
            rhs: Box::new(rhs),
        }
    }

    /// Invokes this expression as a function.
    #[must_use]
    pub fn invoke(self, args: Vec<Expression>) -> Self {
        Self::Call {
            callee: Box::new(self),
            template_args: Vec::new(),
            args,
        }
    }

    /// Returns the names of all variables referenced by the expression.
    #[must_use]
    pub fn referenced_variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Self::Variable { name, .. } => names.push(name),
            Self::MemberAccess { object, .. } => object.collect_variables(names),
            Self::Call { callee, args, .. } => {
                callee.collect_variables(names);
                for arg in args {
                    arg.collect_variables(names);
                }
            }
            Self::New { args, .. } | Self::Array { items: args } => {
                for arg in args {
                    arg.collect_variables(names);
                }
            }
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(names);
                rhs.collect_variables(names);
            }
            Self::Lambda(lambda) => names.extend(lambda.captures.iter().map(String::as_str)),
            Self::Literal { .. }
            | Self::Symbol { .. }
            | Self::TemplateInstantiation { .. }
            | Self::Raw(_) => {}
        }
    }
}

macro_rules! literal_from {
    ($($ty:ty => $variant:ident as $target:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Literal {
                fn from(value: $ty) -> Self {
                    Self::$variant(<$target>::from(value))
                }
            }

            impl From<$ty> for Expression {
                fn from(value: $ty) -> Self {
                    Self::literal(value)
                }
            }
        )+
    };
}

literal_from! {
    bool => Bool as bool,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => Int as i64,
    u16 => Int as i64,
    u32 => Int as i64,
    f32 => Float as f64,
    f64 => Float as f64,
    String => String as String,
    &str => String as String,
}

/// A statement of the generated program.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Statement {
    /// Declares a pointer variable bound to an identifier and
    /// initializes it with a freshly allocated object.
    #[serde(rename = "pvariable")]
    PVariable {
        /// Identifier name.
        id: String,
        /// Allocated type.
        ty: TypeRef,
        /// Constructor arguments.
        args: Vec<Expression>,
    },
    /// Declares a global variable with an initial value.
    Variable {
        /// Identifier name.
        id: String,
        /// Variable type.
        ty: TypeRef,
        /// Initial value.
        value: Expression,
    },
    /// Evaluates an expression for its side effects.
    Expression {
        /// The evaluated expression.
        expression: Expression,
    },
    /// A comment.
    Comment {
        /// Comment text.
        text: String,
    },
}

impl Statement {
    /// Wraps an expression into a statement.
    #[must_use]
    pub fn expression(expression: Expression) -> Self {
        Self::Expression { expression }
    }

    /// Builds a comment.
    #[must_use]
    pub fn comment(text: impl Into<String>) -> Self {
        Self::Comment { text: text.into() }
    }
}

/// An element of the ordered emission stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrNode {
    /// Priority of the job which emitted the statement.
    pub priority: f64,
    /// Label of the instance which emitted the statement.
    pub origin: String,
    /// Emitted statement.
    pub statement: Statement,
}

#[cfg(test)]
mod tests {
    use crate::types::TypeRegistry;

    use super::{Expression, Literal, Statement};

    #[test]
    fn member_calls() {
        let registry = TypeRegistry::new();
        let bmp280 = registry.namespace("bmp280").class_("BMP280Component", &[]);
        let bus = registry.namespace("i2c").class_("I2CBus", &[]);

        let var = Expression::variable("bmp", bmp280.ptr());
        let bus = Expression::variable("bus", bus.ptr());

        let call = var.call("set_i2c_bus", vec![bus]);
        assert_eq!(call.to_string(), "bmp->set_i2c_bus(bus)");
        assert_eq!(
            var.call("set_range", vec![Expression::from(5i32), Expression::from(2.5f64)])
                .to_string(),
            "bmp->set_range(5, 2.5f)"
        );
        assert_eq!(call.referenced_variables(), vec!["bmp", "bus"]);

        let app = Expression::variable("App", registry.namespace("esphome").class_("Application", &[]));
        assert_eq!(
            app.call("register_component", vec![var]).to_string(),
            "App.register_component(bmp)"
        );
    }

    #[test]
    fn literals() {
        assert_eq!(Expression::hex(0x77).to_string(), "0x77");
        assert_eq!(Expression::from(60000u32).to_string(), "60000");
        assert_eq!(Expression::from(400000.0).to_string(), "400000.0f");
        assert_eq!(Expression::from("a \"b\"").to_string(), "\"a \\\"b\\\"\"");
        assert_eq!(Literal::from(true), Literal::Bool(true));
    }

    #[test]
    fn raw_expression_location() {
        let raw = Expression::raw("millis()");
        let Expression::Raw(raw) = raw else {
            panic!("expected a raw expression");
        };
        assert!(raw.location.file.ends_with("mod.rs"));
        assert!(raw.location.line > 0);
    }

    #[test]
    fn statements() {
        let registry = TypeRegistry::new();
        let ty = registry.namespace("i2c").class_("I2CBus", &[]);

        let statement = Statement::PVariable {
            id: "bus".into(),
            ty,
            args: Vec::new(),
        };
        assert_eq!(statement.to_string(), "i2c::I2CBus *bus = new i2c::I2CBus();");
        assert_eq!(Statement::comment("setup").to_string(), "// setup");
    }
}

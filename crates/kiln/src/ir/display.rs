use std::fmt;

use super::{Expression, Lambda, Literal, Statement};

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expression]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        fmt::Display::fmt(item, f)?;
    }
    Ok(())
}

fn write_escaped(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in text.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("nullptr"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Hex(value) => write!(f, "0x{value:02X}"),
            Self::Float(value) if value.fract() == 0.0 && value.is_finite() => {
                write!(f, "{value:.1}f")
            }
            Self::Float(value) => write!(f, "{value}f"),
            Self::String(value) => write_escaped(f, value),
        }
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[=](")?;
        for (i, parameter) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", parameter.ty, parameter.name)?;
        }
        f.write_str(")")?;
        if let Some(return_type) = &self.return_type {
            write!(f, " -> {return_type}")?;
        }
        write!(f, " {{\n  {}\n}}", self.body.trim())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal { value } => value.fmt(f),
            Self::Variable { name, .. } => f.write_str(name),
            Self::Symbol { namespace, name } if namespace.is_empty() => f.write_str(name),
            Self::Symbol { namespace, name } => write!(f, "{namespace}::{name}"),
            Self::MemberAccess {
                object,
                member,
                arrow,
            } => write!(f, "{object}{}{member}", if *arrow { "->" } else { "." }),
            Self::Call {
                callee,
                template_args,
                args,
            } => {
                callee.fmt(f)?;
                if !template_args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in template_args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        arg.fmt(f)?;
                    }
                    f.write_str(">")?;
                }
                f.write_str("(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Self::New { ty, args } => {
                write!(f, "new {ty}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Self::TemplateInstantiation { ty } => ty.fmt(f),
            Self::Array { items } => {
                f.write_str("{")?;
                write_list(f, items)?;
                f.write_str("}")
            }
            Self::Binary { operator, lhs, rhs } => write!(f, "{lhs} {} {rhs}", operator.token()),
            Self::Lambda(lambda) => lambda.fmt(f),
            Self::Raw(raw) => f.write_str(&raw.text),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PVariable { id, ty, args } => {
                write!(f, "{ty} *{id} = new {ty}(")?;
                write_list(f, args)?;
                f.write_str(");")
            }
            Self::Variable { id, ty, value } => write!(f, "{ty} {id} = {value};"),
            Self::Expression { expression } => write!(f, "{expression};"),
            Self::Comment { text } => write!(f, "// {text}"),
        }
    }
}

use std::fmt;
use std::net::Ipv4Addr;

use hashbrown::DefaultHashBuilder;

use indexmap::IndexMap;

use serde::{Serialize, Serializer};

use crate::address::{MacAddress, Uuid};
use crate::identifier::{IdRef, Identifier};
use crate::ir::Expression;
use crate::pins::Pin;

/// An ordered configuration mapping.
pub type ConfigMap = IndexMap<String, Value, DefaultHashBuilder>;

/// A normalized configuration mapping, produced by validation.
pub type ConfigNode = ConfigMap;

/// Creates an empty [`ConfigMap`].
#[must_use]
pub fn config_map() -> ConfigMap {
    IndexMap::with_hasher(DefaultHashBuilder::default())
}

/// A segment of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A mapping key.
    Key(String),
    /// A list index.
    Index(usize),
}

/// The position of a value inside a configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<PathSegment>);

impl Path {
    /// The document root.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns a new path extended with a key.
    #[must_use]
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut path = self.clone();
        path.0.push(PathSegment::Key(key.into()));
        path
    }

    /// Returns a new path extended with an index.
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let mut path = self.clone();
        path.0.push(PathSegment::Index(index));
        path
    }

    /// Prepends a segment.
    pub fn prepend(&mut self, segment: PathSegment) {
        self.0.insert(0, segment);
    }

    /// Prepends all segments of a prefix.
    pub fn prepend_path(&mut self, prefix: &Path) {
        let _ = self.0.splice(0..0, prefix.0.iter().cloned());
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Whether this is the document root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => f.write_str(key)?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SECOND: u64 = 1_000_000_000;
const NANOS_PER_MINUTE: u64 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: u64 = 60 * NANOS_PER_MINUTE;
const NANOS_PER_DAY: u64 = 24 * NANOS_PER_HOUR;

/// A time period, canonicalized to nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimePeriod {
    nanos: u64,
}

impl TimePeriod {
    /// Creates a [`TimePeriod`] from nanoseconds.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// Creates a [`TimePeriod`] from milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self::from_nanos(millis * NANOS_PER_MILLI)
    }

    /// Creates a [`TimePeriod`] from seconds.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self::from_nanos(secs * NANOS_PER_SECOND)
    }

    /// Returns the period in nanoseconds.
    #[must_use]
    pub const fn as_nanos(&self) -> u64 {
        self.nanos
    }

    /// Returns the period in whole microseconds.
    #[must_use]
    pub const fn as_micros(&self) -> u64 {
        self.nanos / NANOS_PER_MICRO
    }

    /// Returns the period in whole milliseconds.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.nanos / NANOS_PER_MILLI
    }

    /// Returns the period in whole seconds.
    #[must_use]
    pub const fn as_secs(&self) -> u64 {
        self.nanos / NANOS_PER_SECOND
    }

    /// Returns the period in whole minutes.
    #[must_use]
    pub const fn as_minutes(&self) -> u64 {
        self.nanos / NANOS_PER_MINUTE
    }

    pub(crate) const fn nanos_per(unit: &str) -> Option<u64> {
        match unit.as_bytes() {
            b"ns" | b"nanoseconds" => Some(1),
            b"us" | b"\xc2\xb5s" | b"microseconds" => Some(NANOS_PER_MICRO),
            b"ms" | b"milliseconds" => Some(NANOS_PER_MILLI),
            b"s" | b"sec" | b"seconds" => Some(NANOS_PER_SECOND),
            b"min" | b"minutes" => Some(NANOS_PER_MINUTE),
            b"h" | b"hours" => Some(NANOS_PER_HOUR),
            b"d" | b"days" => Some(NANOS_PER_DAY),
            _ => None,
        }
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: &[(u64, &str)] = &[
            (NANOS_PER_DAY, "d"),
            (NANOS_PER_HOUR, "h"),
            (NANOS_PER_MINUTE, "min"),
            (NANOS_PER_SECOND, "s"),
            (NANOS_PER_MILLI, "ms"),
            (NANOS_PER_MICRO, "us"),
        ];
        if self.nanos == 0 {
            return f.write_str("0s");
        }
        for (factor, suffix) in UNITS {
            if self.nanos % factor == 0 {
                return write!(f, "{}{suffix}", self.nanos / factor);
            }
        }
        write!(f, "{}ns", self.nanos)
    }
}

/// Canonical units of unit-bearing scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    /// Frequency in hertz.
    Hertz,
    /// Resistance in ohms.
    Ohm,
    /// Voltage in volts.
    Volt,
    /// Current in amperes.
    Ampere,
    /// Pressure in pascals.
    Pascal,
    /// Temperature in degrees Celsius.
    Celsius,
    /// Length in meters.
    Meter,
    /// A ratio in the range 0 to 1.
    Ratio,
}

impl Unit {
    /// Returns the unit symbol.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Hertz => "Hz",
            Self::Ohm => "Ω",
            Self::Volt => "V",
            Self::Ampere => "A",
            Self::Pascal => "Pa",
            Self::Celsius => "°C",
            Self::Meter => "m",
            Self::Ratio => "",
        }
    }
}

/// A numeric value in its canonical [`Unit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    /// Canonical value.
    pub value: f64,
    /// Canonical unit.
    pub unit: Unit,
}

impl Quantity {
    /// Creates a [`Quantity`].
    #[must_use]
    pub const fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.symbol())
    }
}

/// A lambda body written in the configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaSource {
    /// Body source text.
    pub body: String,
}

impl LambdaSource {
    /// Creates a [`LambdaSource`].
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// Returns the identifier names referenced through `id(...)`.
    #[must_use]
    pub fn referenced_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        let bytes = self.body.as_bytes();
        let mut start = 0;
        while let Some(offset) = self.body[start..].find("id(") {
            let at = start + offset;
            start = at + 3;
            let preceded_by_word = at > 0 && {
                let previous = bytes[at - 1];
                previous.is_ascii_alphanumeric() || previous == b'_'
            };
            if preceded_by_word {
                continue;
            }
            let rest = &self.body[start..];
            let Some(close) = rest.find(')') else {
                break;
            };
            let name = rest[..close].trim();
            if !name.is_empty() && !ids.contains(&name) {
                ids.push(name);
            }
        }
        ids
    }
}

/// A value selected from an enumeration and its generated-program form.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    /// The configured option name.
    pub name: String,
    /// The expression emitted for the option.
    pub expression: Expression,
}

/// A configuration value, either raw or normalized by validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// An absent value.
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    String(String),
    /// A list.
    List(Vec<Value>),
    /// A mapping.
    Map(ConfigMap),
    /// A lambda body.
    Lambda(LambdaSource),
    /// A time period.
    TimePeriod(TimePeriod),
    /// A unit-bearing scalar.
    Quantity(Quantity),
    /// An integer emitted in hexadecimal notation.
    HexInt(u64),
    /// A MAC address.
    Mac(MacAddress),
    /// An IPv4 address.
    Ipv4(Ipv4Addr),
    /// A UUID.
    Uuid(Uuid),
    /// An enumeration option.
    Enum(EnumValue),
    /// An identifier declaration.
    Id(Identifier),
    /// An identifier reference.
    IdRef(IdRef),
    /// A pin.
    Pin(Pin),
}

impl Value {
    /// Returns a short description of the value kind.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "mapping",
            Self::Lambda(_) => "lambda",
            Self::TimePeriod(_) => "time period",
            Self::Quantity(_) => "quantity",
            Self::HexInt(_) => "integer",
            Self::Mac(_) => "MAC address",
            Self::Ipv4(_) => "IPv4 address",
            Self::Uuid(_) => "UUID",
            Self::Enum(_) => "enum",
            Self::Id(_) => "ID",
            Self::IdRef(_) => "ID reference",
            Self::Pin(_) => "pin",
        }
    }

    /// Returns the mapping, if any.
    #[must_use]
    pub fn as_map(&self) -> Option<&ConfigMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the mutable mapping, if any.
    pub fn as_map_mut(&mut self) -> Option<&mut ConfigMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the list, if any.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    /// Returns the string, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            Self::Enum(value) => Some(&value.name),
            _ => None,
        }
    }

    /// Returns the boolean, if any.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the integer, if any.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::HexInt(value) => i64::try_from(*value).ok(),
            _ => None,
        }
    }

    /// Returns the number as a float, if any.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(value) => Some(*value as f64),
            Self::Quantity(quantity) => Some(quantity.value),
            _ => None,
        }
    }

    /// Returns the time period, if any.
    #[must_use]
    pub const fn as_time_period(&self) -> Option<TimePeriod> {
        match self {
            Self::TimePeriod(period) => Some(*period),
            _ => None,
        }
    }

    /// Returns the declared identifier, if any.
    #[must_use]
    pub const fn as_id(&self) -> Option<&Identifier> {
        match self {
            Self::Id(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the identifier reference, if any.
    #[must_use]
    pub const fn as_id_ref(&self) -> Option<&IdRef> {
        match self {
            Self::IdRef(id) => Some(id),
            _ => None,
        }
    }

    /// Converts a scalar into the expression emitted for it.
    ///
    /// Time periods become milliseconds and unit-bearing scalars their
    /// canonical value. Values which need the emission context, such as
    /// references, lambdas, and pins, return [`None`].
    #[must_use]
    pub fn to_expression(&self) -> Option<Expression> {
        Some(match self {
            Self::Null => Expression::literal(crate::ir::Literal::Null),
            Self::Bool(value) => Expression::from(*value),
            Self::Int(value) => Expression::from(*value),
            Self::Float(value) => Expression::from(*value),
            Self::String(value) => Expression::from(value.as_str()),
            Self::HexInt(value) => Expression::hex(*value),
            Self::TimePeriod(period) => {
                let millis = i64::try_from(period.as_millis()).unwrap_or(i64::MAX);
                Expression::from(millis)
            }
            Self::Quantity(quantity) => Expression::from(quantity.value),
            Self::Enum(value) => value.expression.clone(),
            Self::Mac(mac) => Expression::hex(mac.as_u64()),
            Self::Uuid(uuid) => Expression::from(uuid.to_string()),
            Self::Ipv4(ip) => Expression::array(
                ip.octets().into_iter().map(Expression::from).collect(),
            ),
            Self::List(_)
            | Self::Map(_)
            | Self::Lambda(_)
            | Self::Id(_)
            | Self::IdRef(_)
            | Self::Pin(_) => return None,
        })
    }

    /// Visits every nested value together with its path.
    pub fn walk<'a>(&'a self, path: &Path, visit: &mut dyn FnMut(&Path, &'a Value)) {
        visit(path, self);
        match self {
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    item.walk(&path.index(i), visit);
                }
            }
            Self::Map(map) => {
                for (key, item) in map {
                    item.walk(&path.key(key), visit);
                }
            }
            _ => {}
        }
    }

    /// Visits every nested value mutably together with its path.
    pub fn walk_mut(&mut self, path: &Path, visit: &mut dyn FnMut(&Path, &mut Value)) {
        visit(path, self);
        match self {
            Self::List(items) => {
                for (i, item) in items.iter_mut().enumerate() {
                    item.walk_mut(&path.index(i), visit);
                }
            }
            Self::Map(map) => {
                for (key, item) in map.iter_mut() {
                    item.walk_mut(&path.key(key.as_str()), visit);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
            Self::List(items) => write!(f, "[{} items]", items.len()),
            Self::Map(map) => write!(f, "{{{} keys}}", map.len()),
            Self::Lambda(lambda) => write!(f, "!lambda {}", lambda.body),
            Self::TimePeriod(period) => period.fmt(f),
            Self::Quantity(quantity) => quantity.fmt(f),
            Self::HexInt(value) => write!(f, "0x{value:02X}"),
            Self::Mac(mac) => mac.fmt(f),
            Self::Ipv4(ip) => ip.fmt(f),
            Self::Uuid(uuid) => uuid.fmt(f),
            Self::Enum(value) => f.write_str(&value.name),
            Self::Id(id) => f.write_str(id.name()),
            Self::IdRef(id) => id.fmt(f),
            Self::Pin(pin) => pin.fmt(f),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<ConfigMap> for Value {
    fn from(value: ConfigMap) -> Self {
        Self::Map(value)
    }
}

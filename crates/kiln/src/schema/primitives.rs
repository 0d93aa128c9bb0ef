use crate::diagnostics::DiagnosticKind;
use crate::ir::Expression;
use crate::macros::unit_validator;
use crate::target::{Framework, Platform};
use crate::units::{
    parse_percentage, parse_temperature, parse_time_period, require_precision,
};
use crate::value::{EnumValue, Quantity, TimePeriod, Unit, Value};

use super::{Invalid, Validator, close_match, expect_map};

fn unknown_value(value: &str, options: &[&str]) -> Invalid {
    let error = Invalid::new(format!("Unknown value '{value}'"));
    match close_match(value, options.iter().copied()) {
        Some(candidate) => error.with_hint(format!("did you mean '{candidate}'?")),
        None => error.with_hint(format!("valid options are {}", options.join(", "))),
    }
}

/// A boolean, also accepting `yes/no`, `on/off`, and `enable/disable`.
#[must_use]
pub fn boolean() -> Validator {
    Validator::from_fn(|value, _cx| match &value {
        Value::Bool(_) => Ok(value),
        Value::String(text) => match text.to_lowercase().as_str() {
            "true" | "yes" | "on" | "enable" => Ok(Value::Bool(true)),
            "false" | "no" | "off" | "disable" => Ok(Value::Bool(false)),
            _ => Err(Invalid::new(format!(
                "Expected boolean value, but cannot convert {text} to a boolean. Please use 'true' or 'false'"
            ))),
        },
        value => Err(Invalid::new(format!(
            "Expected boolean value, but cannot convert {value} to a boolean. Please use 'true' or 'false'"
        ))),
    })
}

fn parse_int(value: &Value) -> Result<i64, Invalid> {
    match value {
        Value::Int(number) => Ok(*number),
        Value::HexInt(number) => i64::try_from(*number)
            .map_err(|_| Invalid::new(format!("Integer {number} is out of range"))),
        #[allow(clippy::cast_possible_truncation)]
        Value::Float(number) if number.fract() == 0.0 && number.abs() < 9.0e15 => {
            Ok(*number as i64)
        }
        Value::Float(number) => Err(Invalid::new(format!(
            "This option only accepts integers with no fractional part. Please remove the fractional part from {number}"
        ))),
        Value::String(text) => {
            let text = text.trim();
            let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                Some(hex) => i64::from_str_radix(hex, 16).ok(),
                None => text.parse::<i64>().ok(),
            };
            parsed.ok_or_else(|| {
                Invalid::new(format!(
                    "Expected integer, but cannot parse {text} as an integer"
                ))
            })
        }
        value => Err(Invalid::new(format!(
            "Expected integer, but cannot parse {value} as an integer"
        ))),
    }
}

/// An integer, also accepting `0x` hexadecimal strings.
#[must_use]
pub fn int_() -> Validator {
    Validator::from_fn(|value, _cx| parse_int(&value).map(Value::Int))
}

/// An integer emitted in hexadecimal notation.
#[must_use]
pub fn hex_int() -> Validator {
    Validator::from_fn(|value, _cx| {
        let number = parse_int(&value)?;
        u64::try_from(number)
            .map(Value::HexInt)
            .map_err(|_| Invalid::new("Expected a non-negative integer"))
    })
}

fn range_check(number: f64, min: Option<f64>, max: Option<f64>) -> Result<(), Invalid> {
    if let Some(min) = min
        && number < min
    {
        return Err(Invalid::new(format!("value must be at least {min}")));
    }
    if let Some(max) = max
        && number > max
    {
        return Err(Invalid::new(format!("value must be at most {max}")));
    }
    Ok(())
}

/// An integer within an inclusive range.
#[must_use]
pub fn int_range(min: i64, max: i64) -> Validator {
    Validator::from_fn(move |value, _cx| {
        let number = parse_int(&value)?;
        if number < min {
            return Err(Invalid::new(format!("value must be at least {min}")));
        }
        if number > max {
            return Err(Invalid::new(format!("value must be at most {max}")));
        }
        Ok(match value {
            Value::HexInt(_) => value,
            _ => Value::Int(number),
        })
    })
}

/// A non-negative integer.
#[must_use]
pub fn positive_int() -> Validator {
    int_range(0, i64::MAX)
}

/// A strictly positive integer.
#[must_use]
pub fn positive_not_null_int() -> Validator {
    int_range(1, i64::MAX)
}

fn parse_float(value: &Value) -> Result<f64, Invalid> {
    match value {
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| Invalid::new(format!("Expected float, got {text}"))),
        value => value
            .as_f64()
            .ok_or_else(|| Invalid::new(format!("Expected float, got {}", value.kind_name()))),
    }
}

/// A floating point number.
#[must_use]
pub fn float_() -> Validator {
    Validator::from_fn(|value, _cx| parse_float(&value).map(Value::Float))
}

/// A floating point number within an inclusive range.
#[must_use]
pub fn float_range(min: Option<f64>, max: Option<f64>) -> Validator {
    Validator::from_fn(move |value, _cx| {
        let number = parse_float(&value)?;
        range_check(number, min, max)?;
        Ok(Value::Float(number))
    })
}

/// A floating point number between 0 and 1.
#[must_use]
pub fn zero_to_one_float() -> Validator {
    float_range(Some(0.0), Some(1.0))
}

/// A string, converting scalars to their textual form.
#[must_use]
pub fn string() -> Validator {
    Validator::from_fn(|value, _cx| match value {
        Value::String(_) => Ok(value),
        Value::Bool(_) | Value::Int(_) | Value::Float(_) => Ok(Value::String(value.to_string())),
        Value::Map(_) | Value::List(_) => Err(Invalid::new(
            "string value cannot be dictionary or list.",
        )),
        Value::Null => Err(Invalid::new("string value is None")),
        value => Ok(Value::String(value.to_string())),
    })
}

/// A string written as a string in the document.
#[must_use]
pub fn string_strict() -> Validator {
    Validator::from_fn(|value, _cx| match value {
        Value::String(_) => Ok(value),
        value => Err(Invalid::new(format!(
            "Must be string, got {}. did you forget putting quotes around the value?",
            value.kind_name()
        ))),
    })
}

/// One of a fixed set of strings, compared case-insensitively.
#[must_use]
pub fn one_of(options: &'static [&'static str]) -> Validator {
    Validator::from_fn(move |value, _cx| {
        let Value::String(text) = &value else {
            return Err(unknown_value(&value.to_string(), options));
        };
        options
            .iter()
            .find(|option| option.eq_ignore_ascii_case(text))
            .map(|option| Value::String((*option).to_string()))
            .ok_or_else(|| unknown_value(text, options))
    })
}

/// An option of an enumeration, normalized to its generated-program form.
#[must_use]
pub fn enum_(options: Vec<(&'static str, Expression)>) -> Validator {
    Validator::from_fn(move |value, _cx| {
        let names: Vec<&str> = options.iter().map(|(name, _)| *name).collect();
        let text = match &value {
            Value::String(text) => text.clone(),
            Value::Enum(value) => value.name.clone(),
            Value::Bool(_) | Value::Int(_) => value.to_string(),
            value => return Err(unknown_value(&value.to_string(), &names)),
        };
        options
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&text))
            .map(|(name, expression)| {
                Value::Enum(EnumValue {
                    name: (*name).to_string(),
                    expression: expression.clone(),
                })
            })
            .ok_or_else(|| unknown_value(&text, &names))
    })
}

fn time_period_with_precision(unit: &'static str) -> Validator {
    Validator::from_fn(move |value, _cx| {
        let period = parse_time_period(&value)?;
        require_precision(period, unit).map(Value::TimePeriod)
    })
}

/// A non-negative time period.
#[must_use]
pub fn time_period() -> Validator {
    time_period_with_precision("ns")
}

/// A time period with at most millisecond precision.
#[must_use]
pub fn positive_time_period_milliseconds() -> Validator {
    time_period_with_precision("ms")
}

/// A time period with at most microsecond precision.
#[must_use]
pub fn positive_time_period_microseconds() -> Validator {
    time_period_with_precision("us")
}

/// A time period with at most second precision.
#[must_use]
pub fn positive_time_period_seconds() -> Validator {
    time_period_with_precision("s")
}

/// A time period with at most minute precision.
#[must_use]
pub fn positive_time_period_minutes() -> Validator {
    time_period_with_precision("min")
}

/// A strictly positive time period.
#[must_use]
pub fn positive_not_null_time_period() -> Validator {
    Validator::from_fn(|value, _cx| {
        let period = parse_time_period(&value)?;
        if period == TimePeriod::default() {
            return Err(Invalid::new("Time period must be greater than zero"));
        }
        Ok(Value::TimePeriod(period))
    })
}

/// An update interval, also accepting `never`.
#[must_use]
pub fn update_interval() -> Validator {
    Validator::from_fn(|value, cx| {
        if matches!(&value, Value::String(text) if text.eq_ignore_ascii_case("never")) {
            return Ok(Value::TimePeriod(TimePeriod::from_millis(u64::from(
                u32::MAX,
            ))));
        }
        positive_time_period_milliseconds().validate(value, cx)
    })
}

unit_validator! {
    /// A frequency, canonicalized to hertz.
    frequency, "frequency", Unit::Hertz, [("Hz", 1.0), ("HZ", 1.0), ("hz", 1.0)]
}

unit_validator! {
    /// A resistance, canonicalized to ohms.
    resistance, "resistance", Unit::Ohm, [("Ω", 1.0), ("Ohm", 1.0), ("ohm", 1.0), ("OHM", 1.0)]
}

unit_validator! {
    /// A voltage, canonicalized to volts.
    voltage, "voltage", Unit::Volt, [("V", 1.0), ("v", 1.0), ("volt", 1.0), ("Volts", 1.0)]
}

unit_validator! {
    /// A current, canonicalized to amperes.
    current, "current", Unit::Ampere, [("A", 1.0), ("a", 1.0), ("amp", 1.0), ("amps", 1.0), ("ampere", 1.0)]
}

unit_validator! {
    /// A pressure, canonicalized to pascals.
    pressure, "pressure", Unit::Pascal, [("Pa", 1.0), ("bar", 100_000.0), ("Bar", 100_000.0)]
}

unit_validator! {
    /// A length, canonicalized to meters.
    length, "length", Unit::Meter, [("m", 1.0)]
}

/// A temperature, canonicalized to degrees Celsius.
#[must_use]
pub fn temperature() -> Validator {
    Validator::from_fn(|value, _cx| {
        if let Value::Quantity(quantity) = &value
            && quantity.unit == Unit::Celsius
        {
            return Ok(value);
        }
        parse_temperature(&value).map(|celsius| Value::Quantity(Quantity::new(celsius, Unit::Celsius)))
    })
}

/// A percentage, canonicalized to a ratio between 0 and 1.
#[must_use]
pub fn percentage() -> Validator {
    Validator::from_fn(|value, _cx| {
        if let Value::Quantity(quantity) = &value
            && quantity.unit == Unit::Ratio
        {
            return Ok(value);
        }
        parse_percentage(&value).map(|ratio| Value::Quantity(Quantity::new(ratio, Unit::Ratio)))
    })
}

fn key_list(keys: &[&str]) -> String {
    keys.join(", ")
}

/// Requires at least one of the given keys.
#[must_use]
pub fn has_at_least_one_key(keys: &'static [&'static str]) -> Validator {
    Validator::from_fn(move |value, _cx| {
        let map = expect_map(value)?;
        if !keys.iter().any(|key| map.contains_key(*key)) {
            return Err(Invalid::new(format!(
                "Must contain at least one of {}.",
                key_list(keys)
            )));
        }
        Ok(Value::Map(map))
    })
}

/// Requires exactly one of the given keys.
#[must_use]
pub fn has_exactly_one_key(keys: &'static [&'static str]) -> Validator {
    Validator::from_fn(move |value, _cx| {
        let map = expect_map(value)?;
        match keys.iter().filter(|key| map.contains_key(**key)).count() {
            0 => Err(Invalid::new(format!(
                "Must contain exactly one of {}.",
                key_list(keys)
            ))),
            1 => Ok(Value::Map(map)),
            _ => Err(Invalid::new(format!(
                "Cannot specify more than one of {}.",
                key_list(keys)
            ))),
        }
    })
}

/// Allows at most one of the given keys.
#[must_use]
pub fn has_at_most_one_key(keys: &'static [&'static str]) -> Validator {
    Validator::from_fn(move |value, _cx| {
        let map = expect_map(value)?;
        if keys.iter().filter(|key| map.contains_key(**key)).count() > 1 {
            return Err(Invalid::new(format!(
                "Cannot specify more than one of {}.",
                key_list(keys)
            )));
        }
        Ok(Value::Map(map))
    })
}

/// Accepts the value only on the given platforms.
#[must_use]
pub fn only_on(platforms: &'static [Platform]) -> Validator {
    Validator::from_fn(move |value, cx| {
        if platforms.contains(&cx.target().platform) {
            return Ok(value);
        }
        let names: Vec<&str> = platforms.iter().map(Platform::name).collect();
        Err(Invalid::of_kind(
            DiagnosticKind::Platform,
            format!("This feature is only available on {names:?}"),
        ))
    })
}

/// Accepts the value only with the given frameworks.
#[must_use]
pub fn only_with_framework(frameworks: &'static [Framework]) -> Validator {
    Validator::from_fn(move |value, cx| {
        if frameworks.contains(&cx.target().framework) {
            return Ok(value);
        }
        let names: Vec<&str> = frameworks.iter().map(Framework::name).collect();
        Err(Invalid::of_kind(
            DiagnosticKind::Platform,
            format!("This feature is only available with frameworks {names:?}"),
        ))
    })
}

/// Accepts the value only with the Arduino framework.
#[must_use]
pub fn only_with_arduino() -> Validator {
    only_with_framework(&[Framework::Arduino])
}

/// Accepts the value only with the ESP-IDF framework.
#[must_use]
pub fn only_with_esp_idf() -> Validator {
    only_with_framework(&[Framework::EspIdf])
}

/// Accepts the value only when another component is part of the document.
#[must_use]
pub fn requires_component(name: &'static str) -> Validator {
    Validator::from_fn(move |value, cx| {
        if cx.is_loaded(name) {
            return Ok(value);
        }
        Err(Invalid::of_kind(
            DiagnosticKind::Dependency,
            format!("This option requires component {name}"),
        ))
    })
}

/// An icon written as `pack:name`.
#[must_use]
pub fn icon() -> Validator {
    Validator::from_fn(|value, cx| {
        let value = string().validate(value, cx)?;
        let valid = value.as_str().is_some_and(|text| {
            text.split_once(':').is_some_and(|(pack, name)| {
                !pack.is_empty()
                    && !name.is_empty()
                    && text
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '-' | '_'))
            })
        });
        if !valid {
            return Err(Invalid::new(
                "Icons must match the format \"[icon pack]:[icon]\", e.g. \"mdi:home-assistant\"",
            ));
        }
        Ok(value)
    })
}

/// A Wi-Fi network name.
#[must_use]
pub fn ssid() -> Validator {
    Validator::from_fn(|value, _cx| {
        let Value::String(text) = &value else {
            return Err(Invalid::new("SSID must be a string. Did you wrap it in quotes?"));
        };
        if text.is_empty() {
            return Err(Invalid::new("SSID can't be empty."));
        }
        if text.len() > 32 {
            return Err(Invalid::new("SSID can't be longer than 32 characters"));
        }
        Ok(value)
    })
}

/// Rejects every value.
#[must_use]
pub fn invalid(message: &'static str) -> Validator {
    Validator::from_fn(move |_value, _cx| Err(Invalid::new(message)))
}

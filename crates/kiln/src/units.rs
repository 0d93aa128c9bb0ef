use crate::schema::Invalid;
use crate::value::{TimePeriod, Value};

const METRIC_PREFIXES: &[(&str, f64)] = &[
    ("", 1.0),
    ("p", 1e-12),
    ("n", 1e-9),
    ("u", 1e-6),
    ("µ", 1e-6),
    ("m", 1e-3),
    ("c", 1e-2),
    ("d", 1e-1),
    ("da", 10.0),
    ("h", 1e2),
    ("k", 1e3),
    ("M", 1e6),
    ("G", 1e9),
];

const TIME_UNITS: &[&str] = &[
    "ns",
    "nanoseconds",
    "us",
    "µs",
    "microseconds",
    "ms",
    "milliseconds",
    "s",
    "sec",
    "seconds",
    "min",
    "minutes",
    "h",
    "hours",
    "d",
    "days",
];

fn metric_prefix(prefix: &str) -> Option<f64> {
    METRIC_PREFIXES
        .iter()
        .find(|(name, _)| *name == prefix)
        .map(|(_, factor)| *factor)
}

// Splits `"400 kHz"` into `(400.0, "kHz")`.
fn split_number(text: &str) -> Option<(f64, &str)> {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && matches!(c, '+' | '-'))))
        .map_or(text.len(), |(i, _)| i);
    let number = text[..end].parse::<f64>().ok()?;
    Some((number, text[end..].trim()))
}

fn plain_number(value: &Value) -> Option<f64> {
    match value {
        Value::Int(_) | Value::Float(_) => value.as_f64(),
        _ => None,
    }
}

/// Parses a scalar with an optional metric prefix and unit suffix, returning
/// the value in the canonical unit.
///
/// Each suffix carries the factor converting it to the canonical unit.
///
/// # Errors
///
/// Fails when the value is not a number followed by a known suffix.
pub fn parse_with_suffixes(
    quantity: &str,
    value: &Value,
    suffixes: &[(&str, f64)],
) -> Result<f64, Invalid> {
    if let Some(number) = plain_number(value) {
        return Ok(number);
    }
    let Value::String(text) = value else {
        return Err(Invalid::new(format!(
            "Expected {quantity} with unit, got {value}"
        )));
    };
    let Some((mantissa, rest)) = split_number(text) else {
        return Err(Invalid::new(format!(
            "Expected {quantity} with unit, got {text}"
        )));
    };

    let mut candidates: Vec<&(&str, f64)> = suffixes.iter().collect();
    candidates.sort_by_key(|(suffix, _)| std::cmp::Reverse(suffix.len()));
    for (suffix, factor) in candidates {
        if let Some(prefix) = rest.strip_suffix(suffix)
            && let Some(multiplier) = metric_prefix(prefix.trim())
        {
            return Ok(mantissa * multiplier * factor);
        }
    }

    // The unit itself may be omitted, as in `400k`.
    if let Some(multiplier) = metric_prefix(rest) {
        return Ok(mantissa * multiplier);
    }

    let hint = suffixes
        .iter()
        .map(|(suffix, _)| *suffix)
        .collect::<Vec<_>>()
        .join(", ");
    Err(Invalid::new(format!("Invalid {quantity} suffix {rest}"))
        .with_hint(format!("valid units are {hint}, with an optional metric prefix")))
}

/// Parses a temperature in Celsius, Kelvin, or Fahrenheit, returning
/// degrees Celsius.
///
/// # Errors
///
/// Fails when the value is not a temperature.
pub fn parse_temperature(value: &Value) -> Result<f64, Invalid> {
    let error = match parse_with_suffixes(
        "temperature",
        value,
        &[("°C", 1.0), ("° C", 1.0), ("C", 1.0), ("°", 1.0)],
    ) {
        Ok(celsius) => return Ok(celsius),
        Err(error) => error,
    };
    if let Ok(kelvin) = parse_with_suffixes("temperature", value, &[("K", 1.0), ("° K", 1.0)]) {
        return Ok(kelvin - 273.15);
    }
    if let Ok(fahrenheit) =
        parse_with_suffixes("temperature", value, &[("°F", 1.0), ("° F", 1.0), ("F", 1.0)])
    {
        return Ok((fahrenheit - 32.0) * 5.0 / 9.0);
    }
    Err(error)
}

/// Parses a percentage written as `"50%"` or as a ratio, returning a ratio
/// between 0 and 1.
///
/// # Errors
///
/// Fails when the value is not a number or lies outside 0% to 100%.
pub fn parse_percentage(value: &Value) -> Result<f64, Invalid> {
    let (ratio, has_percent_sign) = match value {
        Value::String(text) => match text.trim().strip_suffix('%') {
            Some(number) => (
                number
                    .trim_end()
                    .parse::<f64>()
                    .map_err(|_| Invalid::new("invalid number"))?
                    / 100.0,
                true,
            ),
            None => (
                text.trim()
                    .parse::<f64>()
                    .map_err(|_| Invalid::new("invalid number"))?,
                false,
            ),
        },
        value => (
            plain_number(value).ok_or_else(|| Invalid::new("invalid number"))?,
            false,
        ),
    };

    let suffix = if has_percent_sign {
        ""
    } else {
        " Please put a percent sign after the number!"
    };
    if ratio > 1.0 {
        return Err(Invalid::new(format!(
            "Percentage must not be higher than 100%.{suffix}"
        )));
    }
    if ratio < 0.0 {
        return Err(Invalid::new(format!(
            "Percentage must not be smaller than 0%.{suffix}"
        )));
    }
    Ok(ratio)
}

fn period_from(amount: f64, nanos_per_unit: u64, text: &str) -> Result<TimePeriod, Invalid> {
    if amount < 0.0 {
        return Err(Invalid::new(format!(
            "Time period {text} must not be negative"
        )));
    }
    #[allow(clippy::cast_precision_loss)]
    let nanos = (amount * nanos_per_unit as f64).round();
    if nanos > u64::MAX as f64 {
        return Err(Invalid::new(format!("Time period {text} is too long")));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(TimePeriod::from_nanos(nanos as u64))
}

fn time_period_unit(text: &str) -> Result<TimePeriod, Invalid> {
    let Some((amount, unit)) = split_number(text) else {
        return Err(Invalid::new(format!(
            "Expected time period with unit, got {text}"
        )));
    };
    let Some(nanos_per_unit) = TimePeriod::nanos_per(unit) else {
        let error = Invalid::new(format!("Unknown value '{unit}'"));
        return Err(match crate::schema::close_match(unit, TIME_UNITS.iter().copied()) {
            Some(candidate) => error.with_hint(format!("did you mean '{candidate}'?")),
            None => error.with_hint(format!("valid options are {}", TIME_UNITS.join(", "))),
        });
    };
    period_from(amount, nanos_per_unit, text)
}

fn time_period_colon(text: &str) -> Option<TimePeriod> {
    let parts = text
        .split(':')
        .map(|part| part.trim().parse::<u64>().ok())
        .collect::<Option<Vec<u64>>>()?;
    let (hours, minutes, seconds) = match parts.as_slice() {
        [hours, minutes] => (*hours, *minutes, 0),
        [hours, minutes, seconds] => (*hours, *minutes, *seconds),
        _ => return None,
    };
    Some(TimePeriod::from_secs(hours * 3600 + minutes * 60 + seconds))
}

fn time_period_map(map: &crate::value::ConfigMap) -> Result<TimePeriod, Invalid> {
    const KEYS: &[(&str, &str)] = &[
        ("days", "d"),
        ("hours", "h"),
        ("minutes", "min"),
        ("seconds", "s"),
        ("milliseconds", "ms"),
        ("microseconds", "us"),
    ];

    let mut nanos: u64 = 0;
    for (key, value) in map {
        let Some((_, unit)) = KEYS.iter().find(|(name, _)| *name == key.as_str()) else {
            let options: Vec<&str> = KEYS.iter().map(|(name, _)| *name).collect();
            return Err(Invalid::new("extra keys not allowed")
                .with_hint(format!("valid options are {}", options.join(", ")))
                .key(key));
        };
        let amount = plain_number(value)
            .ok_or_else(|| Invalid::new("Expected a number").key(key))?;
        let per_unit = TimePeriod::nanos_per(unit).unwrap_or(1);
        let part = period_from(amount, per_unit, &value.to_string()).map_err(|e| e.key(key))?;
        nanos = nanos.saturating_add(part.as_nanos());
    }
    Ok(TimePeriod::from_nanos(nanos))
}

/// Parses a time period written with a unit (`"5min"`), in the `HH:MM[:SS]`
/// form, or as a mapping of units.
///
/// # Errors
///
/// Fails on bare numbers, unknown units, and negative periods.
pub fn parse_time_period(value: &Value) -> Result<TimePeriod, Invalid> {
    match value {
        Value::TimePeriod(period) => Ok(*period),
        Value::Int(number) => Err(Invalid::new(format!(
            "Don't know what '{number}' means as it has no time *unit*! Did you mean '{number}s'?"
        ))),
        Value::String(text) if text.contains(':') => time_period_colon(text).ok_or_else(|| {
            Invalid::new(format!(
                "Invalid time period {text}, expected the HH:MM or HH:MM:SS form"
            ))
        }),
        Value::String(text) => time_period_unit(text),
        Value::Map(map) => time_period_map(map),
        _ => Err(Invalid::new("Expected string for time period with unit.")),
    }
}

/// Checks that a period has no precision below the given unit.
///
/// # Errors
///
/// Fails when the period is not a whole multiple of the unit.
pub fn require_precision(period: TimePeriod, unit: &str) -> Result<TimePeriod, Invalid> {
    let (per_unit, name) = match unit {
        "us" => (1_000, "microseconds"),
        "ms" => (1_000_000, "milliseconds"),
        "s" => (1_000_000_000, "seconds"),
        "min" => (60_000_000_000, "minutes"),
        _ => (1, "nanoseconds"),
    };
    if period.as_nanos() % per_unit != 0 {
        return Err(Invalid::new(format!("Maximum precision is {name}")));
    }
    Ok(period)
}

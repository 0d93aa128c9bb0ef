use std::net::Ipv4Addr;

use crate::address::{MacAddress, Uuid, parse_bind_key};
use crate::diagnostics::DiagnosticKind;
use crate::identifier::{IdRef, Identifier, validate_id_name};
use crate::pins::{Pin, PinFlag, PinFlags, parse_pin_number};
use crate::types::TypeRef;
use crate::value::{LambdaSource, Unit, Value};

use super::{Invalid, Schema, ValidationContext, Validator, boolean, current, hex_int, int_range};

/// Declares an identifier of the given type.
///
/// An absent value declares an identifier whose name is synthesized once
/// the whole document is known.
#[must_use]
pub fn declare_id(ty: TypeRef) -> Validator {
    Validator::from_fn(move |value, cx| match value {
        Value::Null => Ok(Value::Id(Identifier::pending(cx.id_base(&ty), ty.clone()))),
        Value::Id(id) => Ok(Value::Id(id)),
        Value::String(name) => {
            validate_id_name(&name).map_err(Invalid::new)?;
            Ok(Value::Id(Identifier::manual(name, ty.clone())))
        }
        value => Err(Invalid::new(format!(
            "Expected an ID, got {}",
            value.kind_name()
        ))),
    })
}

/// References an identifier declared elsewhere, of the given type or one
/// of its subtypes.
///
/// An absent value references the only declaration of the type.
#[must_use]
pub fn use_id(ty: TypeRef) -> Validator {
    Validator::from_fn(move |value, _cx| match value {
        Value::Null => Ok(Value::IdRef(IdRef::auto(ty.clone()))),
        Value::IdRef(reference) => Ok(Value::IdRef(reference)),
        Value::String(name) => {
            validate_id_name(&name).map_err(Invalid::new)?;
            Ok(Value::IdRef(IdRef::new(name, ty.clone())))
        }
        value => Err(Invalid::of_kind(
            DiagnosticKind::Reference,
            format!("Expected an ID reference, got {}", value.kind_name()),
        )),
    })
}

/// A MAC address.
#[must_use]
pub fn mac_address() -> Validator {
    Validator::from_fn(|value, _cx| match &value {
        Value::Mac(_) => Ok(value),
        Value::String(text) => MacAddress::parse(text)
            .map(Value::Mac)
            .ok_or_else(|| Invalid::new("MAC Address must be format XX:XX:XX:XX:XX:XX")),
        _ => Err(Invalid::new("MAC Address must be format XX:XX:XX:XX:XX:XX")),
    })
}

/// An IPv4 address.
#[must_use]
pub fn ipv4() -> Validator {
    Validator::from_fn(|value, _cx| match &value {
        Value::Ipv4(_) => Ok(value),
        Value::String(text) => text
            .trim()
            .parse::<Ipv4Addr>()
            .map(Value::Ipv4)
            .map_err(|_| Invalid::new(format!("{text} is not a valid IPv4 address"))),
        value => Err(Invalid::new(format!("{value} is not a valid IPv4 address"))),
    })
}

/// A 7-bit I²C address.
#[must_use]
pub fn i2c_address() -> Validator {
    hex_int().then(int_range(0, 0x7F))
}

/// A 16 byte encryption key written as 32 hexadecimal digits.
#[must_use]
pub fn bind_key() -> Validator {
    Validator::from_fn(|value, _cx| {
        let Value::String(text) = &value else {
            return Err(Invalid::new("Bind key must be a string"));
        };
        let key = parse_bind_key(text)
            .ok_or_else(|| Invalid::new("Bind key must consist of 16 hexadecimal numbers"))?;
        let digits: String = key.iter().map(|byte| format!("{byte:02x}")).collect();
        Ok(Value::String(digits))
    })
}

/// A Bluetooth UUID.
#[must_use]
pub fn uuid() -> Validator {
    Validator::from_fn(|value, _cx| match &value {
        Value::Uuid(_) => Ok(value),
        Value::Int(number) => u16::try_from(*number)
            .map(|short| Value::Uuid(Uuid::Uuid16(short)))
            .map_err(|_| Invalid::new(format!("Invalid UUID {number}"))),
        Value::String(text) => Uuid::parse(text).map(Value::Uuid).ok_or_else(|| {
            Invalid::new(format!(
                "Invalid UUID {text}, expected a 16-bit, 32-bit, or 128-bit UUID"
            ))
        }),
        value => Err(Invalid::new(format!("Invalid UUID {value}"))),
    })
}

fn lambda_source(value: Value) -> Result<LambdaSource, Invalid> {
    let lambda = match value {
        Value::Lambda(lambda) => lambda,
        Value::String(body) => LambdaSource::new(body),
        value => {
            return Err(Invalid::new(format!(
                "Expected a lambda, got {}",
                value.kind_name()
            )));
        }
    };
    if let Some(entity) = lambda.referenced_ids().into_iter().find(|id| id.contains('.')) {
        return Err(Invalid::new(format!(
            "Lambda contains reference to entity-id-style ID '{entity}'. The id() wrapper only works for IDs declared in this document."
        )));
    }
    Ok(lambda)
}

/// A lambda body.
#[must_use]
pub fn lambda_() -> Validator {
    Validator::from_fn(|value, _cx| lambda_source(value).map(Value::Lambda))
}

/// A lambda body returning a value.
#[must_use]
pub fn returning_lambda() -> Validator {
    Validator::from_fn(|value, _cx| {
        let lambda = lambda_source(value)?;
        if !lambda.body.contains("return") {
            return Err(Invalid::new(
                "Lambda doesn't contain a 'return' statement, but the lambda is expected to return a value.",
            )
            .with_hint("make sure the lambda contains at least one return statement"));
        }
        Ok(Value::Lambda(lambda))
    })
}

/// Accepts either a value of `inner` or a lambda returning it at runtime.
#[must_use]
pub fn templatable(inner: Validator) -> Validator {
    Validator::from_fn(move |value, cx| match value {
        Value::Lambda(_) => returning_lambda().validate(value, cx),
        value => inner.validate(value, cx),
    })
}

// Modes written as single strings.
const PIN_MODES: &[(&str, &[PinFlag])] = &[
    ("INPUT", &[PinFlag::Input]),
    ("OUTPUT", &[PinFlag::Output]),
    ("INPUT_PULLUP", &[PinFlag::Input, PinFlag::Pullup]),
    ("INPUT_PULLDOWN", &[PinFlag::Input, PinFlag::Pulldown]),
    ("OUTPUT_OPEN_DRAIN", &[PinFlag::Output, PinFlag::OpenDrain]),
    ("ANALOG", &[PinFlag::Analog]),
];

const DRIVE_STRENGTHS: &[u32] = &[5, 10, 20, 40];

fn pin_mode(value: &Value) -> Result<PinFlags, Invalid> {
    match value {
        Value::String(text) => {
            let Some((_, flags)) = PIN_MODES
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(text))
            else {
                let names: Vec<&str> = PIN_MODES.iter().map(|(name, _)| *name).collect();
                let error = Invalid::new(format!("Unknown value '{text}'"));
                return Err(match super::close_match(text, names.iter().copied()) {
                    Some(candidate) => error.with_hint(format!("did you mean '{candidate}'?")),
                    None => error.with_hint(format!("valid options are {}", names.join(", "))),
                });
            };
            let mut mode = PinFlags::new();
            for flag in *flags {
                mode.add(*flag);
            }
            Ok(mode)
        }
        Value::Map(map) => {
            let mut mode = PinFlags::new();
            for (key, enabled) in map {
                let Some(flag) = PinFlag::from_name(key) else {
                    return Err(Invalid::new(format!("[{key}] is an invalid option")).key(key));
                };
                match enabled {
                    Value::Bool(true) => mode.add(flag),
                    Value::Bool(false) => {}
                    _ => return Err(Invalid::new("Expected boolean value").key(key)),
                }
            }
            Ok(mode)
        }
        value => Err(Invalid::new(format!(
            "Expected a pin mode, got {}",
            value.kind_name()
        ))),
    }
}

fn native_pin(value: &Value, flags: &PinFlags, cx: &ValidationContext<'_>) -> Result<u32, Invalid> {
    let pins = cx.target().pins;
    let number = match value {
        Value::Int(number) => {
            u32::try_from(*number).map_err(|_| Invalid::new(format!("Invalid pin number: {number}")))?
        }
        Value::String(text) => parse_pin_number(text, pins).map_err(Invalid::new)?,
        value => {
            return Err(Invalid::new(format!(
                "Expected a pin number, got {}",
                value.kind_name()
            )));
        }
    };
    pins.check(number)
        .map_err(|message| Invalid::of_kind(DiagnosticKind::Platform, message))?;
    if flags.contains(&PinFlag::Output) && pins.is_input_only(number) {
        return Err(Invalid::of_kind(
            DiagnosticKind::Platform,
            format!("GPIO{number} is input only and does not support output pin mode."),
        ));
    }
    Ok(number)
}

fn pin_schema(cx: &ValidationContext<'_>) -> Schema {
    let mut schema = Schema::new()
        .required("number", Validator::any_value())
        .optional("mode", Validator::any_value())
        .optional_default("inverted", false, boolean())
        .optional("drive_strength", current());
    for provider in cx.registry().pin_providers() {
        schema = schema.optional(&provider.key, use_id(provider.hub_type.clone()));
    }
    schema
}

fn expander_pin(
    map: &crate::value::ConfigMap,
    flags: &PinFlags,
    cx: &ValidationContext<'_>,
) -> Result<Option<(IdRef, u32)>, Invalid> {
    let mut found = cx
        .registry()
        .pin_providers()
        .filter_map(|provider| map.get(&provider.key).map(|value| (provider, value)));
    let Some((provider, value)) = found.next() else {
        return Ok(None);
    };
    if let Some((other, _)) = found.next() {
        return Err(Invalid::new(format!(
            "Cannot specify more than one of {}, {}.",
            provider.key, other.key
        )));
    }

    let Some(reference) = value.as_id_ref() else {
        return Err(Invalid::new("Expected an ID reference").key(&provider.key));
    };
    let number = match map.get("number").and_then(Value::as_int) {
        Some(number) if (0..=i64::from(provider.max_number)).contains(&number) => {
            u32::try_from(number).unwrap_or_default()
        }
        Some(_) => {
            return Err(Invalid::new(format!(
                "value must be at most {}",
                provider.max_number
            ))
            .key("number"));
        }
        None => return Err(Invalid::new("Expected integer pin number").key("number")),
    };

    let unsupported = provider.capabilities.missing(flags);
    if !unsupported.is_empty() {
        return Err(Invalid::of_kind(
            DiagnosticKind::Platform,
            format!(
                "Mode {unsupported} is not supported by {} pins, which support {}",
                provider.key, provider.capabilities
            ),
        )
        .key("mode"));
    }
    Ok(Some((reference.clone(), number)))
}

/// A pin of the target or of a GPIO expander, with `default` as its mode
/// unless one is configured.
#[must_use]
pub fn gpio_pin(default: PinFlags) -> Validator {
    Validator::from_fn(move |value, cx| {
        let map = match value {
            Value::Pin(pin) => return Ok(Value::Pin(pin)),
            Value::Map(map) => map,
            value => {
                let number = native_pin(&value, &default, cx)?;
                return Ok(Value::Pin(Pin::native(number, default.clone())));
            }
        };

        let map = pin_schema(cx).validate(Value::Map(map), cx)?;
        let Some(map) = map.as_map() else {
            return Err(Invalid::new("expected a dictionary"));
        };

        let flags = match map.get("mode") {
            Some(mode) => pin_mode(mode).map_err(|error| error.key("mode"))?,
            None => default.clone(),
        };
        let inverted = map.get("inverted").and_then(Value::as_bool).unwrap_or(false);

        let drive_strength = match map.get("drive_strength") {
            Some(Value::Quantity(quantity)) if quantity.unit == Unit::Ampere => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let milliamps = (quantity.value * 1000.0).round() as u32;
                if !DRIVE_STRENGTHS.contains(&milliamps) {
                    return Err(Invalid::new(format!("Unknown value '{milliamps}mA'"))
                        .with_hint("valid options are 5mA, 10mA, 20mA, 40mA")
                        .key("drive_strength"));
                }
                Some(milliamps)
            }
            _ => None,
        };

        let (number, provider) = match expander_pin(map, &flags, cx)? {
            Some((provider, number)) => (number, Some(provider)),
            None => {
                let number = map.get("number").unwrap_or(&Value::Null);
                let number = native_pin(number, &flags, cx).map_err(|error| error.key("number"))?;
                (number, None)
            }
        };

        Ok(Value::Pin(Pin {
            number,
            flags,
            inverted,
            drive_strength,
            provider,
        }))
    })
}

/// An output pin.
#[must_use]
pub fn gpio_output_pin() -> Validator {
    gpio_pin(PinFlags::init_from_flags([PinFlag::Output]))
}

/// An input pin.
#[must_use]
pub fn gpio_input_pin() -> Validator {
    gpio_pin(PinFlags::init_from_flags([PinFlag::Input]))
}

#[cfg(test)]
mod tests {
    use crate::address::Uuid;
    use crate::component::Component;
    use crate::diagnostics::DiagnosticKind;
    use crate::identifier::IdOrigin;
    use crate::pins::{PinFlag, PinFlags};
    use crate::registry::ComponentRegistry;
    use crate::schema::{ValidationContext, Validator};
    use crate::target::TargetProfile;
    use crate::types::TypeRegistry;
    use crate::value::{LambdaSource, Value, config_map};

    use super::{
        bind_key, declare_id, gpio_input_pin, gpio_output_pin, i2c_address, ipv4, lambda_,
        mac_address, returning_lambda, templatable, use_id, uuid,
    };
    use crate::schema::float_;

    fn registry() -> ComponentRegistry {
        let types = TypeRegistry::new();
        let ns = types.namespace("pcf8574");
        let hub = ns.class_("PCF8574Component", &[]);
        let pin = ns.class_("PCF8574GPIOPin", &[]);
        let mut registry = ComponentRegistry::new(types);
        registry.register(Component::new("pcf8574").pin_provider(
            "pcf8574",
            hub,
            pin,
            PinFlags::init_from_flags([PinFlag::Input, PinFlag::Output, PinFlag::Pullup]),
            15,
        ));
        registry
    }

    fn run_on(target: &str, validator: &Validator, value: Value) -> Result<Value, crate::schema::Invalid> {
        let registry = registry();
        let target = TargetProfile::lookup(target).unwrap();
        let loaded = Default::default();
        let mut cx = ValidationContext::new(&target, &registry, &loaded);
        cx.enter_component("bmp280");
        validator.validate(value, &mut cx)
    }

    fn run(validator: &Validator, value: Value) -> Result<Value, crate::schema::Invalid> {
        run_on("esp32-arduino", validator, value)
    }

    fn map(entries: &[(&str, Value)]) -> Value {
        let mut map = config_map();
        for (key, value) in entries {
            let _ = map.insert((*key).to_string(), value.clone());
        }
        Value::Map(map)
    }

    #[test]
    fn identifiers() {
        let types = TypeRegistry::new();
        let ty = types.namespace("bmp280").class_("BMP280Component", &[]);

        let Ok(Value::Id(generated)) = run(&declare_id(ty.clone()), Value::Null) else {
            panic!("expected an identifier");
        };
        assert_eq!(generated.origin(), IdOrigin::Pending);
        assert_eq!(generated.name(), "bmp280_component");

        let Ok(Value::Id(manual)) = run(&declare_id(ty.clone()), "outdoor".into()) else {
            panic!("expected an identifier");
        };
        assert_eq!(manual.name(), "outdoor");
        assert!(run(&declare_id(ty.clone()), "out-door".into()).is_err());

        let Ok(Value::IdRef(reference)) = run(&use_id(ty.clone()), Value::Null) else {
            panic!("expected a reference");
        };
        assert!(reference.is_auto());
        assert_eq!(reference.required_type, ty);
    }

    #[test]
    fn addresses() {
        assert_eq!(
            run(&i2c_address(), Value::Int(0x77)),
            Ok(Value::HexInt(0x77))
        );
        assert_eq!(
            run(&i2c_address(), Value::Int(0x80)).unwrap_err().message(),
            "value must be at most 127"
        );
        assert!(matches!(
            run(&mac_address(), "AA-BB-CC-DD-EE-FF".into()),
            Ok(Value::Mac(_))
        ));
        assert!(run(&mac_address(), "AA:BB".into()).is_err());
        assert!(matches!(run(&ipv4(), "192.168.1.10".into()), Ok(Value::Ipv4(_))));
        assert_eq!(
            run(&uuid(), "0xFEAA".into()),
            Ok(Value::Uuid(Uuid::Uuid16(0xFEAA)))
        );
        assert_eq!(
            run(&bind_key(), "00112233-44556677-8899AABB-CCDDEEFF".into()),
            Ok(Value::String("00112233445566778899aabbccddeeff".into()))
        );
    }

    #[test]
    fn lambdas() {
        let entity = Value::Lambda(LambdaSource::new("return id(sensor.kitchen).state;"));
        assert!(run(&lambda_(), entity).is_err());

        let no_return = Value::Lambda(LambdaSource::new("id(led).turn_on();"));
        assert!(run(&lambda_(), no_return.clone()).is_ok());
        assert!(run(&returning_lambda(), no_return).is_err());

        let validator = templatable(float_());
        assert_eq!(run(&validator, "1.5".into()), Ok(Value::Float(1.5)));
        assert!(matches!(
            run(&validator, Value::Lambda(LambdaSource::new("return 1.5;"))),
            Ok(Value::Lambda(_))
        ));
    }

    #[test]
    fn native_pins() {
        let Ok(Value::Pin(pin)) = run(&gpio_output_pin(), "GPIO21".into()) else {
            panic!("expected a pin");
        };
        assert_eq!(pin.number, 21);
        assert!(pin.flags.contains(&PinFlag::Output));

        let Ok(Value::Pin(pin)) = run_on("esp8266-arduino", &gpio_input_pin(), "D1".into()) else {
            panic!("expected a pin");
        };
        assert_eq!(pin.number, 5);

        let error = run(&gpio_output_pin(), "GPIO34".into()).unwrap_err();
        assert_eq!(error.issues()[0].kind, DiagnosticKind::Platform);
        assert!(run(&gpio_output_pin(), "GPIO6".into()).is_err());
        assert!(run(&gpio_output_pin(), "GPIO40".into()).is_err());

        let Ok(Value::Pin(pin)) = run(
            &gpio_input_pin(),
            map(&[
                ("number", Value::Int(4)),
                ("mode", "INPUT_PULLUP".into()),
                ("inverted", Value::Bool(true)),
            ]),
        ) else {
            panic!("expected a pin");
        };
        assert!(pin.inverted);
        assert!(pin.flags.contains(&PinFlag::Pullup));
    }

    #[test]
    fn expander_pins() {
        let Ok(Value::Pin(pin)) = run(
            &gpio_output_pin(),
            map(&[("pcf8574", "hub".into()), ("number", Value::Int(3))]),
        ) else {
            panic!("expected a pin");
        };
        assert_eq!(pin.line(), (Some("hub"), 3));

        let error = run(
            &gpio_input_pin(),
            map(&[
                ("pcf8574", "hub".into()),
                ("number", Value::Int(3)),
                ("mode", "INPUT_PULLDOWN".into()),
            ]),
        )
        .unwrap_err();
        assert_eq!(error.issues()[0].path.to_string(), "mode");
        assert!(error.message().contains("pulldown"));
    }
}

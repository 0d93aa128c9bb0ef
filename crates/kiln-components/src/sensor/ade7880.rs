//! Three-phase energy meter.
//!
//! Each phase is a power channel holding its own sensors and calibration.
//! Sensors of a named phase are prefixed with the phase name, so
//! `phase_a: {name: L1, voltage: {name: volts}}` publishes `L1 volts`.

use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::Component;
use kiln::ir::Expression;
use kiln::registry::ComponentRegistry;
use kiln::resolver::FinalContext;
use kiln::schema::{
    Invalid, Schema, Validator, declare_id, frequency, gpio_input_pin, gpio_output_pin, int_,
    polling_component_schema, string_strict,
};
use kiln::types::{CoreTypes, TypeRef};
use kiln::value::{ConfigMap, Value, config_map};

use super::{SensorOptions, nested_sensor, sensor_schema, sensor_type};
use crate::i2c;

const PLATFORM: &str = "ade7880";

const PHASES: &[(&str, &str)] = &[
    ("phase_a", "set_channel_a"),
    ("phase_b", "set_channel_b"),
    ("phase_c", "set_channel_c"),
];

const POWER_SENSORS: &[(&str, SensorOptions)] = &[
    ("voltage", options(Some("V"), 1, Some("voltage"), "measurement")),
    ("current", options(Some("A"), 2, Some("current"), "measurement")),
    ("active_power", options(Some("W"), 1, Some("power"), "measurement")),
    (
        "apparent_power",
        options(Some("VA"), 1, Some("apparent_power"), "measurement"),
    ),
    ("power_factor", options(None, 0, Some("power_factor"), "measurement")),
    (
        "forward_active_energy",
        options(Some("Wh"), 1, Some("energy"), "total_increasing"),
    ),
    (
        "reverse_active_energy",
        options(Some("Wh"), 1, Some("energy"), "total_increasing"),
    ),
];

const POWER_CALIBRATIONS: &[&str] = &["current_gain", "voltage_gain", "power_gain", "phase_angle"];

const fn options(
    unit: Option<&'static str>,
    decimals: i64,
    device_class: Option<&'static str>,
    state_class: &'static str,
) -> SensorOptions {
    SensorOptions {
        unit_of_measurement: unit,
        accuracy_decimals: Some(decimals),
        device_class,
        state_class: Some(state_class),
        icon: None,
        entity_category: None,
    }
}

fn calibration(keys: &[&str]) -> Schema {
    keys.iter().fold(Schema::new(), |schema, key| {
        schema.optional_default(key, 0_i64, int_())
    })
}

fn power_channel(core: &CoreTypes, class: TypeRef) -> Validator {
    let schema = Schema::new()
        .generated("id", declare_id(class))
        .optional("name", string_strict());
    POWER_SENSORS
        .iter()
        .fold(schema, |schema, (key, options)| {
            schema.optional(key, sensor_schema(core, sensor_type(core), options).into())
        })
        .optional_default(
            "calibration",
            config_map(),
            calibration(POWER_CALIBRATIONS).into(),
        )
        .into()
}

fn neutral_channel(core: &CoreTypes, class: TypeRef) -> Validator {
    let current = options(Some("A"), 2, Some("current"), "measurement");
    Schema::new()
        .generated("id", declare_id(class))
        .optional("name", string_strict())
        .required(
            "current",
            sensor_schema(core, sensor_type(core), &current).into(),
        )
        .optional_default(
            "calibration",
            config_map(),
            calibration(&["current_gain"]).into(),
        )
        .into()
}

// Prefixes the names of the sensors of a channel with the channel name.
fn prefix_sensor_names(channel: &mut ConfigMap, keys: &[&str]) {
    let Some(prefix) = channel.get("name").and_then(Value::as_str).map(str::to_string) else {
        return;
    };
    for key in keys {
        let Some(Value::String(name)) = channel
            .get_mut(*key)
            .and_then(Value::as_map_mut)
            .and_then(|sensor| sensor.get_mut("name"))
        else {
            continue;
        };
        if !name.starts_with(&prefix) {
            *name = format!("{prefix} {name}");
        }
    }
}

fn scope_sensor_names(config: &mut ConfigMap, _cx: &mut FinalContext<'_>) -> Result<(), Invalid> {
    let power_sensors: Vec<&str> = POWER_SENSORS.iter().map(|(key, _)| *key).collect();
    for (phase, _) in PHASES {
        if let Some(channel) = config.get_mut(*phase).and_then(Value::as_map_mut) {
            prefix_sensor_names(channel, &power_sensors);
        }
    }
    if let Some(channel) = config.get_mut("neutral").and_then(Value::as_map_mut) {
        prefix_sensor_names(channel, &["current"]);
    }
    Ok(())
}

fn build_channel(
    cx: &mut EmitContext<'_>,
    channel: &ConfigMap,
    sensors: &[&str],
    calibrations: &[&str],
) -> Emit<Expression> {
    let variable = cx.new_pvariable(channel.id()?, Vec::new())?;
    for key in sensors {
        if let Some(sensor) = nested_sensor(cx, channel, key)? {
            cx.add(variable.call(format!("set_{key}"), vec![sensor]));
        }
    }
    let calibration = channel.map("calibration")?;
    for key in calibrations {
        cx.add(variable.call(
            format!("set_{key}_calibration"),
            vec![Expression::from(calibration.int(key)?)],
        ));
    }
    Ok(variable)
}

fn to_code(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<()> {
    let meter = cx.new_pvariable(config.id()?, Vec::new())?;
    cx.register_component(&meter, config)?;
    i2c::register_device(cx, &meter, config)?;

    let frequency = cx.expression(config.value("frequency")?)?;
    cx.add(meter.call("set_frequency", vec![frequency]));
    for (key, setter) in [
        ("irq0_pin", "set_irq0_pin"),
        ("irq1_pin", "set_irq1_pin"),
        ("reset_pin", "set_reset_pin"),
    ] {
        if config.contains_key(key) {
            let pin = cx.gpio_pin(config.pin(key)?, key)?;
            cx.add(meter.call(setter, vec![pin]));
        }
    }

    let power_sensors: Vec<&str> = POWER_SENSORS.iter().map(|(key, _)| *key).collect();
    for (phase, setter) in PHASES {
        if let Some(channel) = config.get_opt(phase).and_then(Value::as_map) {
            let channel = build_channel(cx, channel, &power_sensors, POWER_CALIBRATIONS)?;
            cx.add(meter.call(*setter, vec![channel]));
        }
    }
    if let Some(channel) = config.get_opt("neutral").and_then(Value::as_map) {
        let channel = build_channel(cx, channel, &["current"], &["current_gain"])?;
        cx.add(meter.call("set_channel_n", vec![channel]));
    }
    Ok(())
}

pub(super) fn register(registry: &mut ComponentRegistry) {
    let core = registry.core().clone();
    let ns = core.esphome_ns.namespace(PLATFORM);
    let class = ns.class_(
        "ADE7880",
        &[&core.polling_component, &i2c::device_type(&core)],
    );
    let power = ns.struct_("PowerChannel");
    let neutral = ns.struct_("NeutralChannel");

    let mut schema = Schema::new()
        .generated("id", declare_id(class))
        .optional_default("frequency", "50Hz", frequency())
        .required("irq0_pin", gpio_input_pin())
        .required("irq1_pin", gpio_input_pin())
        .optional("reset_pin", gpio_output_pin());
    for (phase, _) in PHASES {
        schema = schema.optional(phase, power_channel(&core, power.clone()));
    }

    registry.register(
        Component::platform(super::NAME, PLATFORM)
            .codeowners(&["@kiln/sensors"])
            .dependencies(&[i2c::NAME])
            .schema(
                schema
                    .optional("neutral", neutral_channel(&core, neutral))
                    .extend(polling_component_schema("60s"))
                    .extend(i2c::device_schema(&core, 0x38)),
            )
            .final_validate(scope_sensor_names)
            .to_code(to_code),
    );
}

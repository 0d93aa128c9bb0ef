use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::{Component, MultiConf};
use kiln::ir::Expression;
use kiln::pins::{PinFlag, PinFlags};
use kiln::registry::ComponentRegistry;
use kiln::scheduler::priority;
use kiln::schema::{
    Invalid, Schema, Validator, boolean, declare_id, frequency, gpio_pin, i2c_address, use_id,
};
use kiln::target::{Capability, Constraints, Framework, Platform};
use kiln::types::{CoreTypes, TypeRef};
use kiln::value::{ConfigMap, Value};

/// Component name.
pub const NAME: &str = "i2c";

/// Type every bus implementation derives from.
#[must_use]
pub fn bus_type(core: &CoreTypes) -> TypeRef {
    core.esphome_ns.namespace(NAME).class_("I2CBus", &[])
}

/// Base class of the devices attached to a bus.
#[must_use]
pub fn device_type(core: &CoreTypes) -> TypeRef {
    core.esphome_ns.namespace(NAME).class_("I2CDevice", &[])
}

/// Options of a device attached to a bus, answering at `default_address`
/// unless configured otherwise.
#[must_use]
pub fn device_schema(core: &CoreTypes, default_address: u64) -> Schema {
    Schema::new()
        .generated("i2c_id", use_id(bus_type(core)))
        .optional_default("address", Value::HexInt(default_address), i2c_address())
}

/// Attaches a device to its bus.
///
/// # Errors
///
/// Suspends until the bus is declared.
pub fn register_device(cx: &mut EmitContext<'_>, device: &Expression, config: &ConfigMap) -> Emit<()> {
    let bus = cx.get_reference(config.id_ref("i2c_id")?)?;
    cx.add(device.call("set_i2c_bus", vec![bus]));
    let address = cx.expression(config.value("address")?)?;
    cx.add(device.call("set_i2c_address", vec![address]));
    Ok(())
}

// The declared bus depends on the framework driving the hardware.
fn declare_bus() -> Validator {
    Validator::from_fn(|value, cx| {
        let core = cx.core();
        let ns = core.esphome_ns.namespace(NAME);
        let name = match cx.target().framework {
            Framework::EspIdf => "IDFI2CBus",
            Framework::Arduino | Framework::Host => "ArduinoI2CBus",
        };
        let ty = ns.class_(name, &[&bus_type(core), &core.component]);
        declare_id(ty).validate(value, cx)
    })
}

// A native pin, defaulting to the usual bus line of the platform.
fn bus_pin(esp32: u32, esp8266: u32, rp2040: u32) -> Validator {
    let pin = gpio_pin(PinFlags::init_from_flags([PinFlag::Input, PinFlag::Output]));
    Validator::from_fn(move |value, cx| {
        let value = match value {
            Value::Null => {
                let number = match cx.target().platform {
                    Platform::Esp32 => esp32,
                    Platform::Esp8266 => esp8266,
                    Platform::Rp2040 | Platform::Host => rp2040,
                };
                Value::Int(i64::from(number))
            }
            value => value,
        };
        let value = pin.validate(value, cx)?;
        if let Value::Pin(pin) = &value
            && !pin.is_native()
        {
            return Err(Invalid::new("I²C bus lines must be pins of the microcontroller"));
        }
        Ok(value)
    })
}

fn to_code(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<()> {
    let bus = cx.new_pvariable(config.id()?, Vec::new())?;
    cx.register_component(&bus, config)?;

    let sda = config.pin("sda")?.number;
    cx.add(bus.call("set_sda_pin", vec![Expression::from(sda)]));
    cx.add(bus.call(
        "set_sda_pullup_enabled",
        vec![Expression::from(config.bool("sda_pullup_enabled")?)],
    ));
    let scl = config.pin("scl")?.number;
    cx.add(bus.call("set_scl_pin", vec![Expression::from(scl)]));
    cx.add(bus.call(
        "set_scl_pullup_enabled",
        vec![Expression::from(config.bool("scl_pullup_enabled")?)],
    ));

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let hertz = config.float("frequency")?.round() as u32;
    cx.add(bus.call("set_frequency", vec![Expression::from(hertz)]));
    cx.add(bus.call("set_scan", vec![Expression::from(config.bool("scan")?)]));

    if cx.target().framework == Framework::Arduino {
        cx.add_library("Wire", None)?;
    }
    cx.add_define("USE_I2C", None)?;
    Ok(())
}

/// Registers the `i2c` bus.
pub fn register(registry: &mut ComponentRegistry) {
    registry.register(
        Component::new(NAME)
            .priority(priority::BUS)
            .codeowners(&["@kiln/core"])
            .multi_conf(MultiConf::Multi)
            .constraints(Constraints::new().capability(Capability::I2c))
            .schema(
                Schema::new()
                    .generated("id", declare_bus())
                    .generated("sda", bus_pin(21, 4, 4))
                    .optional_default("sda_pullup_enabled", true, boolean())
                    .generated("scl", bus_pin(22, 5, 5))
                    .optional_default("scl_pullup_enabled", true, boolean())
                    .optional_default("frequency", "50kHz", frequency())
                    .optional_default("scan", true, boolean()),
            )
            .to_code(to_code),
    );
}

use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::Component;
use kiln::pins::{PinFlag, PinFlags};
use kiln::registry::ComponentRegistry;
use kiln::schema::{Schema, declare_id, enum_, gpio_pin, polling_component_schema};
use kiln::value::ConfigMap;

use super::{SensorOptions, nested_sensor, sensor_schema, sensor_type};

const PLATFORM: &str = "dht";

fn to_code(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<()> {
    let dht = cx.new_pvariable(config.id()?, Vec::new())?;
    cx.register_component(&dht, config)?;

    let pin = cx.gpio_pin(config.pin("pin")?, "pin")?;
    cx.add(dht.call("set_pin", vec![pin]));
    if let Some(temperature) = nested_sensor(cx, config, "temperature")? {
        cx.add(dht.call("set_temperature_sensor", vec![temperature]));
    }
    if let Some(humidity) = nested_sensor(cx, config, "humidity")? {
        cx.add(dht.call("set_humidity_sensor", vec![humidity]));
    }
    let model = cx.expression(config.value("model")?)?;
    cx.add(dht.call("set_dht_model", vec![model]));
    Ok(())
}

pub(super) fn register(registry: &mut ComponentRegistry) {
    let core = registry.core().clone();
    let ns = core.esphome_ns.namespace(PLATFORM);
    let class = ns.class_("DHT", &[&core.polling_component]);
    let models = enum_(vec![
        ("AUTO_DETECT", ns.symbol("DHT_MODEL_AUTO_DETECT")),
        ("DHT11", ns.symbol("DHT_MODEL_DHT11")),
        ("DHT22", ns.symbol("DHT_MODEL_DHT22")),
        ("AM2302", ns.symbol("DHT_MODEL_AM2302")),
        ("RHT03", ns.symbol("DHT_MODEL_RHT03")),
        ("SI7021", ns.symbol("DHT_MODEL_SI7021")),
        ("DHT22_TYPE2", ns.symbol("DHT_MODEL_DHT22_TYPE2")),
    ]);
    let temperature = SensorOptions {
        unit_of_measurement: Some("°C"),
        accuracy_decimals: Some(1),
        device_class: Some("temperature"),
        state_class: Some("measurement"),
        ..SensorOptions::default()
    };
    let humidity = SensorOptions {
        unit_of_measurement: Some("%"),
        accuracy_decimals: Some(0),
        device_class: Some("humidity"),
        state_class: Some("measurement"),
        ..SensorOptions::default()
    };

    registry.register(
        Component::platform(super::NAME, PLATFORM)
            .codeowners(&["@kiln/sensors"])
            .schema(
                Schema::new()
                    .generated("id", declare_id(class))
                    .required(
                        "pin",
                        gpio_pin(PinFlags::init_from_flags([PinFlag::Input, PinFlag::Output])),
                    )
                    .optional(
                        "temperature",
                        sensor_schema(&core, sensor_type(&core), &temperature).into(),
                    )
                    .optional(
                        "humidity",
                        sensor_schema(&core, sensor_type(&core), &humidity).into(),
                    )
                    .optional_default("model", "AUTO_DETECT", models)
                    .extend(polling_component_schema("60s")),
            )
            .to_code(to_code),
    );
}

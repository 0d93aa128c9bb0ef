use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::Component;
use kiln::registry::ComponentRegistry;
use kiln::schema::{Schema, component_schema, use_id};
use kiln::value::ConfigMap;

use super::{SensorOptions, register_sensor, sensor_schema, sensor_type};

const PLATFORM: &str = "dew_point";

// The source sensors must be declared before the derived one.
fn to_code(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<()> {
    let temperature = cx.get_reference(config.id_ref("temperature_source")?)?;
    let humidity = cx.get_reference(config.id_ref("humidity_source")?)?;

    let sensor = cx.new_pvariable(config.id()?, Vec::new())?;
    cx.register_component(&sensor, config)?;
    register_sensor(cx, &sensor, config)?;
    cx.add(sensor.call("set_temperature_sensor", vec![temperature]));
    cx.add(sensor.call("set_humidity_sensor", vec![humidity]));
    Ok(())
}

pub(super) fn register(registry: &mut ComponentRegistry) {
    let core = registry.core().clone();
    let sensor = sensor_type(&core);
    let class = core
        .esphome_ns
        .namespace(PLATFORM)
        .class_("DewPoint", &[&sensor, &core.component]);
    let options = SensorOptions {
        unit_of_measurement: Some("°C"),
        accuracy_decimals: Some(1),
        device_class: Some("temperature"),
        state_class: Some("measurement"),
        icon: Some("mdi:thermometer-water"),
        ..SensorOptions::default()
    };

    registry.register(
        Component::platform(super::NAME, PLATFORM)
            .schema(
                sensor_schema(&core, class, &options)
                    .extend(component_schema())
                    .extend(
                        Schema::new()
                            .required("temperature_source", use_id(sensor.clone()))
                            .required("humidity_source", use_id(sensor)),
                    ),
            )
            .to_code(to_code),
    );
}

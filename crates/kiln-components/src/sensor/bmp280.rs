use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::Component;
use kiln::registry::ComponentRegistry;
use kiln::schema::{Schema, Validator, declare_id, enum_, polling_component_schema};
use kiln::types::{CoreTypes, NamespaceRef};
use kiln::value::{ConfigMap, Value};

use super::{SensorOptions, new_sensor, sensor_schema, sensor_type};
use crate::i2c;

const PLATFORM: &str = "bmp280";

fn oversampling(ns: &NamespaceRef) -> Validator {
    enum_(vec![
        ("NONE", ns.symbol("BMP280_OVERSAMPLING_NONE")),
        ("1X", ns.symbol("BMP280_OVERSAMPLING_1X")),
        ("2X", ns.symbol("BMP280_OVERSAMPLING_2X")),
        ("4X", ns.symbol("BMP280_OVERSAMPLING_4X")),
        ("8X", ns.symbol("BMP280_OVERSAMPLING_8X")),
        ("16X", ns.symbol("BMP280_OVERSAMPLING_16X")),
    ])
}

fn iir_filter(ns: &NamespaceRef) -> Validator {
    enum_(vec![
        ("OFF", ns.symbol("BMP280_IIR_FILTER_OFF")),
        ("2X", ns.symbol("BMP280_IIR_FILTER_2X")),
        ("4X", ns.symbol("BMP280_IIR_FILTER_4X")),
        ("8X", ns.symbol("BMP280_IIR_FILTER_8X")),
        ("16X", ns.symbol("BMP280_IIR_FILTER_16X")),
    ])
}

fn channel(core: &CoreTypes, ns: &NamespaceRef, options: &SensorOptions) -> Validator {
    sensor_schema(core, sensor_type(core), options)
        .extend(Schema::new().optional_default("oversampling", "16X", oversampling(ns)))
        .into()
}

fn to_code(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<()> {
    let bmp = cx.new_pvariable(config.id()?, Vec::new())?;
    cx.register_component(&bmp, config)?;
    i2c::register_device(cx, &bmp, config)?;

    for (key, setter) in [("temperature", "temperature"), ("pressure", "pressure")] {
        let Some(channel) = config.get_opt(key).and_then(Value::as_map) else {
            continue;
        };
        let sensor = new_sensor(cx, channel)?;
        cx.add(bmp.call(format!("set_{setter}_sensor"), vec![sensor]));
        let oversampling = cx.expression(channel.value("oversampling")?)?;
        cx.add(bmp.call(format!("set_{setter}_oversampling"), vec![oversampling]));
    }

    let iir_filter = cx.expression(config.value("iir_filter")?)?;
    cx.add(bmp.call("set_iir_filter", vec![iir_filter]));
    Ok(())
}

pub(super) fn register(registry: &mut ComponentRegistry) {
    let core = registry.core().clone();
    let ns = core.esphome_ns.namespace(PLATFORM);
    let class = ns.class_(
        "BMP280Component",
        &[&core.polling_component, &i2c::device_type(&core)],
    );
    let temperature = SensorOptions {
        unit_of_measurement: Some("°C"),
        accuracy_decimals: Some(1),
        device_class: Some("temperature"),
        state_class: Some("measurement"),
        ..SensorOptions::default()
    };
    let pressure = SensorOptions {
        unit_of_measurement: Some("hPa"),
        accuracy_decimals: Some(1),
        device_class: Some("pressure"),
        state_class: Some("measurement"),
        ..SensorOptions::default()
    };

    registry.register(
        Component::platform(super::NAME, PLATFORM)
            .codeowners(&["@kiln/sensors"])
            .dependencies(&[i2c::NAME])
            .schema(
                Schema::new()
                    .generated("id", declare_id(class))
                    .optional("temperature", channel(&core, &ns, &temperature))
                    .optional("pressure", channel(&core, &ns, &pressure))
                    .optional_default("iir_filter", "OFF", iir_filter(&ns))
                    .extend(polling_component_schema("60s"))
                    .extend(i2c::device_schema(&core, 0x77)),
            )
            .to_code(to_code),
    );
}

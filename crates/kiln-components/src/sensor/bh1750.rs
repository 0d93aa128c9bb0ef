use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::Component;
use kiln::ir::Expression;
use kiln::registry::ComponentRegistry;
use kiln::schema::{Schema, int_range, polling_component_schema};
use kiln::value::ConfigMap;

use super::{SensorOptions, register_sensor, sensor_schema, sensor_type};
use crate::i2c;

const PLATFORM: &str = "bh1750";

fn to_code(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<()> {
    let sensor = cx.new_pvariable(config.id()?, Vec::new())?;
    cx.register_component(&sensor, config)?;
    register_sensor(cx, &sensor, config)?;
    i2c::register_device(cx, &sensor, config)?;
    cx.add(sensor.call(
        "set_measurement_duration",
        vec![Expression::from(config.int("measurement_duration")?)],
    ));
    Ok(())
}

pub(super) fn register(registry: &mut ComponentRegistry) {
    let core = registry.core().clone();
    let class = core.esphome_ns.namespace(PLATFORM).class_(
        "BH1750Sensor",
        &[
            &sensor_type(&core),
            &core.polling_component,
            &i2c::device_type(&core),
        ],
    );
    let options = SensorOptions {
        unit_of_measurement: Some("lx"),
        accuracy_decimals: Some(1),
        device_class: Some("illuminance"),
        state_class: Some("measurement"),
        ..SensorOptions::default()
    };

    registry.register(
        Component::platform(super::NAME, PLATFORM)
            .codeowners(&["@kiln/sensors"])
            .dependencies(&[i2c::NAME])
            .schema(
                sensor_schema(&core, class, &options)
                    .extend(
                        Schema::new().optional_default(
                            "measurement_duration",
                            69_i64,
                            int_range(31, 254),
                        ),
                    )
                    .extend(polling_component_schema("60s"))
                    .extend(i2c::device_schema(&core, 0x23)),
            )
            .to_code(to_code),
    );
}

#[cfg(test)]
mod tests {
    use kiln::compiler::Compiler;

    use crate::registry;

    #[test]
    fn light_sensor() {
        let registry = registry().unwrap();
        let compiler = Compiler::new(&registry, "esp8266-arduino").unwrap();
        let output = compiler
            .compile_str(
                "esphome:\n  name: porch\ni2c:\nsensor:\n  - platform: bh1750\n    id: light\n    name: Porch light\n    update_interval: 30s\n",
            )
            .unwrap();
        let rendered: Vec<String> = output
            .ir
            .iter()
            .map(|node| node.statement.to_string())
            .collect();
        assert!(rendered.contains(
            &"esphome::bh1750::BH1750Sensor *light = new esphome::bh1750::BH1750Sensor();".to_string()
        ));
        assert!(rendered.contains(&"light->set_update_interval(30000);".to_string()));
        assert!(rendered.contains(&"light->set_i2c_address(0x23);".to_string()));
        assert!(rendered.contains(&"light->set_measurement_duration(69);".to_string()));
        assert!(rendered.contains(&"light->set_unit_of_measurement(\"lx\");".to_string()));

        let error = compiler
            .compile_str(
                "esphome:\n  name: porch\ni2c:\nsensor:\n  - platform: bh1750\n    measurement_duration: 300\n",
            )
            .unwrap_err();
        assert_eq!(
            error.diagnostics()[0].path.to_string(),
            "sensor[0].measurement_duration"
        );
        assert_eq!(error.diagnostics()[0].message, "value must be at most 254");
    }
}

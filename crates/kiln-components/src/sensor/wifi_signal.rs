use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::Component;
use kiln::registry::ComponentRegistry;
use kiln::schema::polling_component_schema;
use kiln::value::ConfigMap;

use super::{SensorOptions, register_sensor, sensor_schema, sensor_type};

const PLATFORM: &str = "wifi_signal";

fn to_code(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<()> {
    let sensor = cx.new_pvariable(config.id()?, Vec::new())?;
    cx.register_component(&sensor, config)?;
    register_sensor(cx, &sensor, config)
}

pub(super) fn register(registry: &mut ComponentRegistry) {
    let core = registry.core().clone();
    let class = core.esphome_ns.namespace(PLATFORM).class_(
        "WiFiSignalSensor",
        &[&sensor_type(&core), &core.polling_component],
    );
    let options = SensorOptions {
        unit_of_measurement: Some("dBm"),
        accuracy_decimals: Some(0),
        device_class: Some("signal_strength"),
        state_class: Some("measurement"),
        entity_category: Some("diagnostic"),
        ..SensorOptions::default()
    };

    registry.register(
        Component::platform(super::NAME, PLATFORM)
            .dependencies(&[crate::wifi::NAME])
            .schema(sensor_schema(&core, class, &options).extend(polling_component_schema("60s")))
            .to_code(to_code),
    );
}

#[cfg(test)]
mod tests {
    use kiln::compiler::Compiler;
    use kiln::diagnostics::DiagnosticKind;

    use crate::registry;

    #[test]
    fn signal_strength() {
        let registry = registry().unwrap();
        let compiler = Compiler::new(&registry, "esp32-idf").unwrap();
        let output = compiler
            .compile_str(
                "esphome:\n  name: garden\nwifi:\n  ssid: HomeNet\nsensor:\n  - platform: wifi_signal\n    name: Signal\n",
            )
            .unwrap();
        let rendered: Vec<String> = output
            .ir
            .iter()
            .map(|node| node.statement.to_string())
            .collect();
        assert!(rendered.iter().any(|line| line.ends_with("->set_unit_of_measurement(\"dBm\");")));
        assert!(rendered.iter().any(|line| line.ends_with(
            "->set_entity_category(esphome::ENTITY_CATEGORY_DIAGNOSTIC);"
        )));
        assert!(rendered.iter().any(|line| line.ends_with("->set_device_class(\"signal_strength\");")));

        let error = compiler
            .compile_str("esphome:\n  name: garden\nsensor:\n  - platform: wifi_signal\n")
            .unwrap_err();
        assert_eq!(error.diagnostics()[0].kind, DiagnosticKind::Dependency);
        assert_eq!(
            error.diagnostics()[0].message,
            "component `wifi` required by `wifi_signal` not configured"
        );
    }
}

use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::Component;
use kiln::ir::Expression;
use kiln::registry::ComponentRegistry;
use kiln::scheduler::priority;
use kiln::schema::{
    Invalid, Schema, Validator, boolean, component_schema, declare_id,
    positive_time_period_milliseconds, positive_time_period_seconds,
};
use kiln::target::{Capability, Constraints, Platform};
use kiln::types::{CoreTypes, TypeRef};
use kiln::value::{ConfigMap, Value, config_map};

/// Component name.
pub const NAME: &str = "esp32_ble_tracker";

// The radio counts scan intervals in slots of 0.625 ms.
const SLOT_MS: f64 = 0.625;

/// Type of the `esp32_ble_tracker` component.
#[must_use]
pub fn tracker_type(core: &CoreTypes) -> TypeRef {
    core.esphome_ns
        .namespace(NAME)
        .class_("ESP32BLETracker", &[&core.component])
}

fn window_within_interval() -> Validator {
    Validator::from_fn(|value, _cx| {
        if let Value::Map(config) = &value {
            let millis = |key: &str| {
                config
                    .get(key)
                    .and_then(Value::as_time_period)
                    .map(|period| period.as_millis())
            };
            if let (Some(window), Some(interval)) = (millis("window"), millis("interval"))
                && window > interval
            {
                return Err(
                    Invalid::new("Scan window can not be greater than scan interval").key("window"),
                );
            }
        }
        Ok(value)
    })
}

fn scan_parameters() -> Validator {
    Validator::from(
        Schema::new()
            .optional_default("interval", "320ms", positive_time_period_milliseconds())
            .optional_default("window", "30ms", positive_time_period_milliseconds())
            .optional_default("duration", "5min", positive_time_period_seconds())
            .optional_default("active", true, boolean())
            .optional_default("continuous", true, boolean()),
    )
    .then(window_within_interval())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn slots(millis: u32) -> u32 {
    (f64::from(millis) / SLOT_MS).round() as u32
}

fn to_code(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<()> {
    let tracker = cx.new_pvariable(config.id()?, Vec::new())?;
    cx.register_component(&tracker, config)?;

    let params = config.map("scan_parameters")?;
    let duration = params.millis("duration")? / 1000;
    cx.add(tracker.call("set_scan_duration", vec![Expression::from(duration)]));
    cx.add(tracker.call(
        "set_scan_interval",
        vec![Expression::from(slots(params.millis("interval")?))],
    ));
    cx.add(tracker.call(
        "set_scan_window",
        vec![Expression::from(slots(params.millis("window")?))],
    ));
    cx.add(tracker.call(
        "set_scan_active",
        vec![Expression::from(params.bool("active")?)],
    ));
    cx.add(tracker.call(
        "set_scan_continuous",
        vec![Expression::from(params.bool("continuous")?)],
    ));

    cx.add_define("USE_ESP32_BLE_TRACKER", None)?;
    Ok(())
}

/// Registers the `esp32_ble_tracker` component.
pub fn register(registry: &mut ComponentRegistry) {
    let core = registry.core().clone();
    registry.register(
        Component::new(NAME)
            .priority(priority::BUS)
            .codeowners(&["@kiln/core"])
            .constraints(
                Constraints::new()
                    .platforms(&[Platform::Esp32])
                    .capability(Capability::Ble),
            )
            .schema(
                component_schema().extend(
                    Schema::new()
                        .generated("id", declare_id(tracker_type(&core)))
                        .optional_default("scan_parameters", config_map(), scan_parameters()),
                ),
            )
            .to_code(to_code),
    );
}

#[cfg(test)]
mod tests {
    use kiln::compiler::Compiler;
    use kiln::diagnostics::DiagnosticKind;

    use crate::registry;

    #[test]
    fn scan_defaults() {
        let registry = registry().unwrap();
        let compiler = Compiler::new(&registry, "esp32-idf").unwrap();
        let output = compiler
            .compile_str("esphome:\n  name: beacon\nesp32_ble_tracker:\n")
            .unwrap();
        let rendered: Vec<String> = output
            .ir
            .iter()
            .map(|node| node.statement.to_string())
            .collect();
        assert!(rendered.iter().any(|line| line.ends_with("->set_scan_duration(300);")));
        assert!(rendered.iter().any(|line| line.ends_with("->set_scan_interval(512);")));
        assert!(rendered.iter().any(|line| line.ends_with("->set_scan_window(48);")));
        assert!(rendered.iter().any(|line| line.ends_with("->set_scan_active(true);")));
        assert!(output.manifest.defines().contains_key("USE_ESP32_BLE_TRACKER"));
    }

    #[test]
    fn window_longer_than_interval() {
        let registry = registry().unwrap();
        let compiler = Compiler::new(&registry, "esp32-arduino").unwrap();
        let error = compiler
            .compile_str(
                "esphome:\n  name: beacon\nesp32_ble_tracker:\n  scan_parameters:\n    interval: 100ms\n    window: 200ms\n",
            )
            .unwrap_err();
        let diagnostic = &error.diagnostics()[0];
        assert_eq!(diagnostic.message, "Scan window can not be greater than scan interval");
        assert_eq!(
            diagnostic.path.to_string(),
            "esp32_ble_tracker.scan_parameters.window"
        );
    }

    #[test]
    fn needs_a_radio() {
        let registry = registry().unwrap();
        let compiler = Compiler::new(&registry, "esp8266-arduino").unwrap();
        let error = compiler
            .compile_str("esphome:\n  name: beacon\nesp32_ble_tracker:\n")
            .unwrap_err();
        assert_eq!(error.diagnostics()[0].kind, DiagnosticKind::Platform);
    }
}

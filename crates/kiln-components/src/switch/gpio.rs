use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::Component;
use kiln::ir::Expression;
use kiln::registry::ComponentRegistry;
use kiln::scheduler::priority;
use kiln::schema::{
    Schema, component_schema, ensure_list, gpio_output_pin, positive_time_period_milliseconds,
    use_id,
};
use kiln::value::ConfigMap;

use super::{register_switch, switch_schema, switch_type};

const PLATFORM: &str = "gpio";

fn to_code(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<()> {
    let switch = cx.new_pvariable(config.id()?, Vec::new())?;
    cx.register_component(&switch, config)?;
    register_switch(cx, &switch, config)?;

    let pin = cx.gpio_pin(config.pin("pin")?, "pin")?;
    cx.add(switch.call("set_pin", vec![pin]));

    if !config.list("interlock")?.is_empty() {
        // Interlocked switches reference each other.
        let config = config.clone();
        let label = format!("{} interlock", cx.origin());
        cx.add_job(priority::CONSUMER, label, move |cx| {
            let mut others = Vec::new();
            for other in config.list("interlock")? {
                let other = other
                    .as_id_ref()
                    .ok_or_else(|| cx.fail_at("interlock", "expected an ID"))?;
                others.push(cx.get_reference(other)?);
            }
            cx.add(switch.call("set_interlock", vec![Expression::array(others)]));
            if config.get_opt("interlock_wait_time").is_some() {
                let wait = config.millis("interlock_wait_time")?;
                cx.add(switch.call("set_interlock_wait_time", vec![Expression::from(wait)]));
            }
            Ok(())
        });
    }
    Ok(())
}

pub(super) fn register(registry: &mut ComponentRegistry) {
    let core = registry.core().clone();
    let class = core.esphome_ns.namespace(PLATFORM).class_(
        "GPIOSwitch",
        &[&switch_type(&core), &core.component],
    );

    registry.register(
        Component::platform(super::NAME, PLATFORM)
            .codeowners(&["@kiln/core"])
            .schema(
                switch_schema(&core, class)
                    .extend(
                        Schema::new()
                            .required("pin", gpio_output_pin())
                            .optional("interlock", ensure_list(use_id(switch_type(&core))))
                            .optional(
                                "interlock_wait_time",
                                positive_time_period_milliseconds(),
                            ),
                    )
                    .extend(component_schema()),
            )
            .to_code(to_code),
    );
}

#[cfg(test)]
mod tests {
    use kiln::compiler::Compiler;
    use kiln::diagnostics::{DiagnosticKind, ErrorKind};

    use crate::registry;

    #[test]
    fn interlocked_pair() {
        let registry = registry().unwrap();
        let compiler = Compiler::new(&registry, "esp32-arduino").unwrap();
        let output = compiler
            .compile_str(
                "esphome:\n  name: blinds\nswitch:\n  - platform: gpio\n    id: up\n    pin: GPIO25\n    interlock: [up, down]\n    interlock_wait_time: 200ms\n  - platform: gpio\n    id: down\n    pin: GPIO26\n    interlock: [up, down]\n",
            )
            .unwrap();
        let rendered: Vec<String> = output
            .ir
            .iter()
            .map(|node| node.statement.to_string())
            .collect();
        assert!(rendered.contains(
            &"esphome::gpio::GPIOSwitch *up = new esphome::gpio::GPIOSwitch();".to_string()
        ));
        assert!(rendered.contains(&"up->set_pin(switch_0_pin);".to_string()));

        let declared = rendered
            .iter()
            .position(|line| line.starts_with("esphome::gpio::GPIOSwitch *down"))
            .unwrap();
        let interlock = rendered
            .iter()
            .position(|line| line == "up->set_interlock({up, down});")
            .unwrap();
        assert!(declared < interlock);
        assert!(rendered.contains(&"up->set_interlock_wait_time(200);".to_string()));
        assert!(rendered.contains(&"down->set_interlock({up, down});".to_string()));
        assert!(output.manifest.defines().contains_key("USE_SWITCH"));
    }

    #[test]
    fn input_only_pin() {
        let registry = registry().unwrap();
        let compiler = Compiler::new(&registry, "esp32-arduino").unwrap();
        let error = compiler
            .compile_str("esphome:\n  name: blinds\nswitch:\n  - platform: gpio\n    pin: GPIO34\n")
            .unwrap_err();
        assert_eq!(error.diagnostics()[0].kind, DiagnosticKind::Platform);
        assert_eq!(error.diagnostics()[0].path.to_string(), "switch[0].pin");
    }

    #[test]
    fn id_shadowing_a_pin() {
        let registry = registry().unwrap();
        let compiler = Compiler::new(&registry, "esp32-arduino").unwrap();
        let error = compiler
            .compile_str(
                "esphome:\n  name: blinds\nswitch:\n  - platform: gpio\n    pin: GPIO25\n  - platform: gpio\n    id: switch_0_pin\n    pin: GPIO26\n",
            )
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);
        let diagnostic = &error.diagnostics()[0];
        assert_eq!(diagnostic.kind, DiagnosticKind::Reference);
        assert_eq!(diagnostic.path.to_string(), "switch[1].id");
        assert_eq!(
            diagnostic.message,
            "ID switch_0_pin is reserved for the pin switch[0].pin"
        );
    }
}

use kiln::automation::{automation_schema, build_automation};
use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::{Component, MultiConf};
use kiln::ir::Expression;
use kiln::registry::ComponentRegistry;
use kiln::scheduler::priority;
use kiln::schema::{Schema, float_, positive_time_period_milliseconds};
use kiln::value::ConfigMap;

/// Component name.
pub const NAME: &str = "interval";

fn to_code(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<()> {
    let trigger = cx.new_pvariable(config.id_of("trigger_id")?, Vec::new())?;
    cx.register_component(&trigger, config)?;
    cx.add(trigger.call(
        "set_update_interval",
        vec![Expression::from(config.millis("interval")?)],
    ));
    cx.add(trigger.call(
        "set_startup_delay",
        vec![Expression::from(config.millis("startup_delay")?)],
    ));

    let automation = config.clone();
    let label = format!("{} automation", cx.origin());
    cx.add_job(priority::AUTOMATION, label, move |cx| {
        let _ = build_automation(cx, &trigger, &[], &automation)?;
        Ok(())
    });
    Ok(())
}

/// Registers the `interval` trigger.
pub fn register(registry: &mut ComponentRegistry) {
    let core = registry.core().clone();
    let trigger = core.esphome_ns.namespace(NAME).class_(
        "IntervalTrigger",
        &[&core.trigger.template(&[]), &core.polling_component],
    );

    registry.register(
        Component::new(NAME)
            .codeowners(&["@kiln/core"])
            .multi_conf(MultiConf::Multi)
            .schema(automation_schema(
                trigger,
                Vec::new(),
                Schema::new()
                    .optional("setup_priority", float_())
                    .required("interval", positive_time_period_milliseconds())
                    .optional_default("startup_delay", "0s", positive_time_period_milliseconds()),
            ))
            .to_code(to_code),
    );
}

#[cfg(test)]
mod tests {
    use kiln::compiler::Compiler;

    use crate::registry;

    #[test]
    fn periodic_actions() {
        let registry = registry().unwrap();
        let compiler = Compiler::new(&registry, "esp32-arduino").unwrap();
        let output = compiler
            .compile_str(
                "esphome:\n  name: clock\ninterval:\n  - interval: 1min\n    then:\n      - logger.log: Tick\n  - interval: 10s\n    startup_delay: 2s\n    then:\n      - delay: 1s\n",
            )
            .unwrap();
        let rendered: Vec<String> = output
            .ir
            .iter()
            .map(|node| node.statement.to_string())
            .collect();

        let declarations: Vec<&String> = rendered
            .iter()
            .filter(|line| line.starts_with("esphome::interval::IntervalTrigger *"))
            .collect();
        assert_eq!(declarations.len(), 2);
        assert!(rendered.iter().any(|line| line.ends_with("->set_update_interval(60000);")));
        assert!(rendered.iter().any(|line| line.ends_with("->set_startup_delay(2000);")));

        let last_trigger = rendered
            .iter()
            .rposition(|line| line.contains("IntervalTrigger *"))
            .unwrap();
        let first_automation = rendered
            .iter()
            .position(|line| line.starts_with("esphome::Automation<> *"))
            .unwrap();
        assert!(last_trigger < first_automation);
    }
}

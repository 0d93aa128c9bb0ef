use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::{Component, MultiConf};
use kiln::ir::Expression;
use kiln::registry::ComponentRegistry;
use kiln::scheduler::priority;
use kiln::schema::{
    Schema, Validator, declare_id, gpio_input_pin, gpio_output_pin, has_at_least_one_key, one_of,
};
use kiln::target::{Capability, Constraints, Framework};
use kiln::types::{CoreTypes, TypeRef};
use kiln::value::ConfigMap;

/// Component name.
pub const NAME: &str = "spi";

const INTERFACES: &[&str] = &["any", "hardware", "software"];

/// Type of the `spi` bus.
#[must_use]
pub fn bus_type(core: &CoreTypes) -> TypeRef {
    core.esphome_ns
        .namespace(NAME)
        .class_("SPIComponent", &[&core.component])
}

fn to_code(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<()> {
    let bus = cx.new_pvariable(config.id()?, Vec::new())?;
    cx.register_component(&bus, config)?;

    let clk = cx.gpio_pin(config.pin("clk_pin")?, "clk_pin")?;
    cx.add(bus.call("set_clk", vec![clk]));
    for (key, setter) in [("mosi_pin", "set_mosi"), ("miso_pin", "set_miso")] {
        if config.contains_key(key) {
            let pin = cx.gpio_pin(config.pin(key)?, key)?;
            cx.add(bus.call(setter, vec![pin]));
        }
    }
    if config.string("interface")? == "software" {
        cx.add(bus.call("set_force_sw", vec![Expression::from(true)]));
    }

    if cx.target().framework == Framework::Arduino {
        cx.add_library("SPI", None)?;
    }
    cx.add_define("USE_SPI", None)?;
    Ok(())
}

/// Registers the `spi` bus.
pub fn register(registry: &mut ComponentRegistry) {
    let core = registry.core().clone();
    registry.register(
        Component::new(NAME)
            .priority(priority::BUS)
            .codeowners(&["@kiln/core"])
            .multi_conf(MultiConf::Multi)
            .constraints(Constraints::new().capability(Capability::Spi))
            .schema(
                Validator::from(
                    Schema::new()
                        .generated("id", declare_id(bus_type(&core)))
                        .required("clk_pin", gpio_output_pin())
                        .optional("mosi_pin", gpio_output_pin())
                        .optional("miso_pin", gpio_input_pin())
                        .optional_default("interface", "any", one_of(INTERFACES)),
                )
                .then(has_at_least_one_key(&["mosi_pin", "miso_pin"])),
            )
            .to_code(to_code),
    );
}

#[cfg(test)]
mod tests {
    use kiln::compiler::Compiler;

    use crate::registry;

    #[test]
    fn bus_pins() {
        let registry = registry().unwrap();
        let compiler = Compiler::new(&registry, "esp32-arduino").unwrap();
        let output = compiler
            .compile_str(
                "esphome:\n  name: panel\nspi:\n  id: display_bus\n  clk_pin: GPIO18\n  mosi_pin: GPIO23\n",
            )
            .unwrap();
        let rendered: Vec<String> = output
            .ir
            .iter()
            .map(|node| node.statement.to_string())
            .collect();
        assert_eq!(
            rendered[1],
            "esphome::spi::SPIComponent *display_bus = new esphome::spi::SPIComponent();"
        );
        assert!(rendered.contains(&"display_bus->set_clk(spi_clk_pin);".to_string()));
        assert!(rendered.contains(&"display_bus->set_mosi(spi_mosi_pin);".to_string()));
        assert!(!rendered.iter().any(|line| line.contains("set_miso")));
        assert_eq!(output.manifest.libraries()[0].name, "SPI");

        let error = compiler
            .compile_str("esphome:\n  name: panel\nspi:\n  clk_pin: GPIO18\n")
            .unwrap_err();
        assert_eq!(error.diagnostics()[0].path.to_string(), "spi");
    }
}

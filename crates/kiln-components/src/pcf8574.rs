use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::{Component, MultiConf};
use kiln::ir::Expression;
use kiln::pins::{PinFlag, PinFlags};
use kiln::registry::ComponentRegistry;
use kiln::scheduler::priority;
use kiln::schema::{Schema, boolean, component_schema, declare_id};
use kiln::value::ConfigMap;

use crate::i2c;

/// Component name, also the pin mapping key selecting an expander.
pub const NAME: &str = "pcf8574";

// Pins of the 16-bit PCF8575 variant.
const MAX_PIN: u32 = 15;

fn to_code(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<()> {
    let hub = cx.new_pvariable(config.id()?, Vec::new())?;
    cx.register_component(&hub, config)?;
    i2c::register_device(cx, &hub, config)?;
    cx.add(hub.call(
        "set_pcf8575",
        vec![Expression::from(config.bool("pcf8575")?)],
    ));
    Ok(())
}

/// Registers the `pcf8574` expander.
pub fn register(registry: &mut ComponentRegistry) {
    let core = registry.core().clone();
    let ns = core.esphome_ns.namespace(NAME);
    let hub = ns.class_(
        "PCF8574Component",
        &[&core.component, &i2c::device_type(&core)],
    );
    let pin = ns.class_("PCF8574GPIOPin", &[&core.gpio_pin]);

    registry.register(
        Component::new(NAME)
            .priority(priority::BUS)
            .codeowners(&["@kiln/core"])
            .dependencies(&[i2c::NAME])
            .multi_conf(MultiConf::Multi)
            .schema(
                Schema::new()
                    .required("id", declare_id(hub.clone()))
                    .optional_default("pcf8575", false, boolean())
                    .extend(component_schema())
                    .extend(i2c::device_schema(&core, 0x21)),
            )
            .pin_provider(
                NAME,
                hub,
                pin,
                PinFlags::init_from_flags([PinFlag::Input, PinFlag::Output]),
                MAX_PIN,
            )
            .to_code(to_code),
    );
}

use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::Component;
use kiln::ir::Expression;
use kiln::registry::ComponentRegistry;
use kiln::scheduler::priority;
use kiln::schema::{Schema, declare_id, enum_, gpio_output_pin, int_range, one_of, string_strict};
use kiln::target::{Capability, Constraints, Platform};
use kiln::value::{ConfigMap, Value};

use crate::network;

/// Component name.
pub const NAME: &str = "ethernet";

const CLOCK_MODES: &[&str] = &["GPIO0_IN", "GPIO0_OUT", "GPIO16_OUT", "GPIO17_OUT"];

fn to_code(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<()> {
    let core = cx.core();
    let global_ns = core.global_ns.clone();
    let ethernet = cx.new_pvariable(config.id()?, Vec::new())?;

    cx.add(ethernet.call(
        "set_phy_addr",
        vec![Expression::from(config.int("phy_addr")?)],
    ));
    cx.add(ethernet.call(
        "set_mdc_pin",
        vec![Expression::from(config.pin("mdc_pin")?.number)],
    ));
    cx.add(ethernet.call(
        "set_mdio_pin",
        vec![Expression::from(config.pin("mdio_pin")?.number)],
    ));
    if config.contains_key("power_pin") {
        let power = cx.gpio_pin(config.pin("power_pin")?, "power_pin")?;
        cx.add(ethernet.call("set_power_pin", vec![power]));
    }
    let kind = cx.expression(config.value("type")?)?;
    cx.add(ethernet.call("set_type", vec![kind]));

    let (mode, gpio) = match config.string("clk_mode")? {
        "GPIO0_IN" => ("EMAC_CLK_EXT_IN", "EMAC_CLK_IN_GPIO"),
        "GPIO0_OUT" => ("EMAC_CLK_OUT", "EMAC_APPL_CLK_OUT_GPIO"),
        "GPIO16_OUT" => ("EMAC_CLK_OUT", "EMAC_CLK_OUT_GPIO"),
        _ => ("EMAC_CLK_OUT", "EMAC_CLK_OUT_180_GPIO"),
    };
    cx.add(ethernet.call(
        "set_clk_mode",
        vec![global_ns.symbol(mode), global_ns.symbol(gpio)],
    ));

    if let Some(manual_ip) = config.get_opt("manual_ip").and_then(Value::as_map) {
        let manual_ip = network::manual_ip(cx, NAME, manual_ip);
        cx.add(ethernet.call("set_manual_ip", vec![manual_ip]));
    }
    if let Some(address) = config.get_opt("use_address").and_then(Value::as_str) {
        cx.add(ethernet.call("set_use_address", vec![Expression::from(address)]));
    }

    cx.add_define("USE_ETHERNET", None)?;
    cx.register_component(&ethernet, config)?;
    Ok(())
}

/// Registers the `ethernet` component.
pub fn register(registry: &mut ComponentRegistry) {
    let core = registry.core().clone();
    let ns = core.esphome_ns.namespace(NAME);
    let component = ns.class_("EthernetComponent", &[&core.component]);
    let kinds = enum_(vec![
        ("LAN8720", ns.symbol("ETHERNET_TYPE_LAN8720")),
        ("RTL8201", ns.symbol("ETHERNET_TYPE_RTL8201")),
        ("DP83848", ns.symbol("ETHERNET_TYPE_DP83848")),
        ("IP101", ns.symbol("ETHERNET_TYPE_IP101")),
    ]);

    registry.register(
        Component::new(NAME)
            .priority(priority::NETWORK)
            .codeowners(&["@kiln/core"])
            .auto_load(&[network::NAME])
            .conflicts_with(&[crate::wifi::NAME])
            .constraints(
                Constraints::new()
                    .platforms(&[Platform::Esp32])
                    .capability(Capability::Ethernet),
            )
            .schema(
                Schema::new()
                    .generated("id", declare_id(component))
                    .required("type", kinds)
                    .required("mdc_pin", gpio_output_pin())
                    .required("mdio_pin", gpio_output_pin())
                    .optional_default("clk_mode", "GPIO0_IN", one_of(CLOCK_MODES))
                    .optional_default("phy_addr", 0_i64, int_range(0, 31))
                    .optional("power_pin", gpio_output_pin())
                    .optional("manual_ip", network::manual_ip_schema().into())
                    .optional_default("domain", ".local", string_strict())
                    .optional("use_address", string_strict()),
            )
            .final_validate(network::default_use_address)
            .to_code(to_code),
    );
}

use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::{Component, MultiConf};
use kiln::ir::Expression;
use kiln::registry::ComponentRegistry;
use kiln::scheduler::priority;
use kiln::schema::{
    Schema, Validator, declare_id, enum_, gpio_input_pin, gpio_output_pin, has_at_least_one_key,
    int_range, positive_int, positive_not_null_int,
};
use kiln::target::{Capability, Constraints, Framework, Platform};
use kiln::types::{CoreTypes, TypeRef};
use kiln::value::ConfigMap;

/// Component name.
pub const NAME: &str = "uart";

// Hardware UART controllers of the largest supported chip.
const MAX_INSTANCES: usize = 3;

/// Type every UART implementation derives from.
#[must_use]
pub fn bus_type(core: &CoreTypes) -> TypeRef {
    core.esphome_ns.namespace(NAME).class_("UARTComponent", &[])
}

fn declare_uart() -> Validator {
    Validator::from_fn(|value, cx| {
        let core = cx.core();
        let target = cx.target();
        let name = match (target.platform, target.framework) {
            (Platform::Esp32, Framework::EspIdf) => "IDFUARTComponent",
            (Platform::Esp32, _) => "ESP32ArduinoUARTComponent",
            (Platform::Esp8266, _) => "ESP8266UartComponent",
            (Platform::Rp2040, _) => "RP2040UartComponent",
            (Platform::Host, _) => "HostUartComponent",
        };
        let ty = core
            .esphome_ns
            .namespace(NAME)
            .class_(name, &[&bus_type(core), &core.component]);
        declare_id(ty).validate(value, cx)
    })
}

fn to_code(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<()> {
    let uart = cx.new_pvariable(config.id()?, Vec::new())?;
    cx.register_component(&uart, config)?;

    cx.add(uart.call(
        "set_baud_rate",
        vec![Expression::from(config.int("baud_rate")?)],
    ));
    for (key, setter) in [("tx_pin", "set_tx_pin"), ("rx_pin", "set_rx_pin")] {
        if config.contains_key(key) {
            let pin = cx.gpio_pin(config.pin(key)?, key)?;
            cx.add(uart.call(setter, vec![pin]));
        }
    }
    cx.add(uart.call(
        "set_rx_buffer_size",
        vec![Expression::from(config.int("rx_buffer_size")?)],
    ));
    cx.add(uart.call(
        "set_stop_bits",
        vec![Expression::from(config.int("stop_bits")?)],
    ));
    cx.add(uart.call(
        "set_data_bits",
        vec![Expression::from(config.int("data_bits")?)],
    ));
    let parity = cx.expression(config.value("parity")?)?;
    cx.add(uart.call("set_parity", vec![parity]));

    cx.add_define("USE_UART", None)?;
    Ok(())
}

/// Registers the `uart` bus.
pub fn register(registry: &mut ComponentRegistry) {
    let core = registry.core().clone();
    let ns = core.esphome_ns.namespace(NAME);
    let parity = enum_(vec![
        ("NONE", ns.symbol("UART_CONFIG_PARITY_NONE")),
        ("EVEN", ns.symbol("UART_CONFIG_PARITY_EVEN")),
        ("ODD", ns.symbol("UART_CONFIG_PARITY_ODD")),
    ]);

    registry.register(
        Component::new(NAME)
            .priority(priority::BUS)
            .codeowners(&["@kiln/core"])
            .multi_conf(MultiConf::Limited(MAX_INSTANCES))
            .constraints(Constraints::new().capability(Capability::Uart))
            .schema(
                Validator::from(
                    Schema::new()
                        .generated("id", declare_uart())
                        .required("baud_rate", positive_not_null_int())
                        .optional("tx_pin", gpio_output_pin())
                        .optional("rx_pin", gpio_input_pin())
                        .optional_default("rx_buffer_size", 256_i64, positive_int())
                        .optional_default("stop_bits", 1_i64, int_range(1, 2))
                        .optional_default("data_bits", 8_i64, int_range(5, 8))
                        .optional_default("parity", "NONE", parity),
                )
                .then(has_at_least_one_key(&["tx_pin", "rx_pin"])),
            )
            .to_code(to_code),
    );
}

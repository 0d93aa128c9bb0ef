use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::Component;
use kiln::registry::ComponentRegistry;
use kiln::schema::{Schema, component_schema, gpio_input_pin};
use kiln::value::ConfigMap;

use super::{binary_sensor_schema, binary_sensor_type, register_binary_sensor};

const PLATFORM: &str = "gpio";

fn to_code(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<()> {
    let sensor = cx.new_pvariable(config.id()?, Vec::new())?;
    cx.register_component(&sensor, config)?;
    register_binary_sensor(cx, &sensor, config)?;

    let pin = cx.gpio_pin(config.pin("pin")?, "pin")?;
    cx.add(sensor.call("set_pin", vec![pin]));
    Ok(())
}

pub(super) fn register(registry: &mut ComponentRegistry) {
    let core = registry.core().clone();
    let class = core.esphome_ns.namespace(PLATFORM).class_(
        "GPIOBinarySensor",
        &[&binary_sensor_type(&core), &core.component],
    );

    registry.register(
        Component::platform(super::NAME, PLATFORM)
            .codeowners(&["@kiln/core"])
            .schema(
                binary_sensor_schema(&core, class)
                    .extend(Schema::new().required("pin", gpio_input_pin()))
                    .extend(component_schema()),
            )
            .to_code(to_code),
    );
}

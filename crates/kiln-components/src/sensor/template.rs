use kiln::automation::ActionDescriptor;
use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::Component;
use kiln::registry::ComponentRegistry;
use kiln::schema::{
    Schema, float_, polling_component_schema, returning_lambda, templatable, use_id,
};
use kiln::types::{CoreTypes, TypeRef};
use kiln::value::{ConfigMap, Value};

use super::{SensorOptions, register_sensor, sensor_schema, sensor_type};

const PLATFORM: &str = "template";

fn template_sensor(core: &CoreTypes) -> TypeRef {
    core.esphome_ns
        .namespace("template_")
        .class_("TemplateSensor", &[&sensor_type(core), &core.polling_component])
}

fn to_code(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<()> {
    let sensor = cx.new_pvariable(config.id()?, Vec::new())?;
    cx.register_component(&sensor, config)?;
    register_sensor(cx, &sensor, config)?;

    if let Some(Value::Lambda(source)) = config.get_opt("lambda") {
        let core = cx.core();
        let optional = core
            .esphome_ns
            .template_class("optional", &[])
            .template(&[core.float_.clone()]);
        let lambda = cx.process_lambda(source, &[], Some(optional))?;
        cx.add(sensor.call("set_template", vec![lambda]));
    }
    Ok(())
}

pub(super) fn register(registry: &mut ComponentRegistry) {
    let core = registry.core().clone();
    let class = template_sensor(&core);

    registry.register(
        Component::platform(super::NAME, PLATFORM)
            .codeowners(&["@kiln/core"])
            .schema(
                sensor_schema(&core, class.clone(), &SensorOptions::default())
                    .extend(polling_component_schema("60s"))
                    .optional("lambda", returning_lambda()),
            )
            .to_code(to_code),
    );

    let action = core.action.template(&[]);
    let publish = super::namespace(&core).template_class("SensorPublishAction", &[&action]);
    let float = core.float_.clone();
    registry.register_action(ActionDescriptor::new(
        "sensor.template.publish",
        publish,
        Schema::new()
            .required("id", use_id(class))
            .required("state", templatable(float_())),
        move |cx, id, config, args| {
            let sensor = cx.get_reference(config.id_ref("id")?)?;
            let action = cx.new_pvariable(id, vec![sensor])?;
            let state = cx.templatable(config.value("state")?, args, &float)?;
            cx.add(action.call("set_state", vec![state]));
            Ok(action)
        },
    ));
}

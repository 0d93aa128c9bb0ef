//! The `switch` domain.
//!
//! A switch is a two-state entity that can be commanded from automations
//! with `switch.turn_on`, `switch.turn_off`, and `switch.toggle`, and
//! queried with the `switch.is_on` and `switch.is_off` conditions.

use kiln::automation::{ActionDescriptor, ConditionDescriptor, add_automations, automation};
use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::Component;
use kiln::ir::Expression;
use kiln::registry::ComponentRegistry;
use kiln::schema::{
    Schema, Validator, boolean, declare_id, entity_base_schema, enum_, maybe_simple_value,
    one_of, use_id,
};
use kiln::types::{CoreTypes, NamespaceRef, TypeRef};
use kiln::value::{ConfigMap, Value};

mod gpio;

/// Domain name.
pub const NAME: &str = "switch";

const DEVICE_CLASSES: &[&str] = &["outlet", "switch"];

/// Namespace of the switch runtime.
#[must_use]
pub fn namespace(core: &CoreTypes) -> NamespaceRef {
    core.esphome_ns.namespace("switch_")
}

/// The `Switch` base class.
#[must_use]
pub fn switch_type(core: &CoreTypes) -> TypeRef {
    namespace(core).class_("Switch", &[&core.entity_base])
}

fn restore_mode(ns: &NamespaceRef) -> Validator {
    enum_(vec![
        ("RESTORE_DEFAULT_OFF", ns.symbol("SWITCH_RESTORE_DEFAULT_OFF")),
        ("RESTORE_DEFAULT_ON", ns.symbol("SWITCH_RESTORE_DEFAULT_ON")),
        ("ALWAYS_OFF", ns.symbol("SWITCH_ALWAYS_OFF")),
        ("ALWAYS_ON", ns.symbol("SWITCH_ALWAYS_ON")),
        ("RESTORE_INVERTED_DEFAULT_OFF", ns.symbol("SWITCH_RESTORE_INVERTED_DEFAULT_OFF")),
        ("RESTORE_INVERTED_DEFAULT_ON", ns.symbol("SWITCH_RESTORE_INVERTED_DEFAULT_ON")),
    ])
}

/// Options of a switch declared as `class`.
#[must_use]
pub fn switch_schema(core: &CoreTypes, class: TypeRef) -> Schema {
    let ns = namespace(core);
    let trigger = core.trigger.template(&[]);
    let on_turn_on = ns.class_("SwitchTurnOnTrigger", &[&trigger]);
    let on_turn_off = ns.class_("SwitchTurnOffTrigger", &[&trigger]);

    entity_base_schema().extend(
        Schema::new()
            .generated("id", declare_id(class))
            .optional("inverted", boolean())
            .optional_default("restore_mode", "RESTORE_DEFAULT_OFF", restore_mode(&ns))
            .optional("device_class", one_of(DEVICE_CLASSES))
            .optional("on_turn_on", automation(on_turn_on, Vec::new(), Schema::new()))
            .optional("on_turn_off", automation(on_turn_off, Vec::new(), Schema::new())),
    )
}

/// Registers a declared switch with the application and applies the
/// switch options.
///
/// # Errors
///
/// Fails when an option cannot be emitted.
pub fn register_switch(cx: &mut EmitContext<'_>, switch: &Expression, config: &ConfigMap) -> Emit<()> {
    let app = cx.core().app();
    cx.add(app.call("register_switch", vec![switch.clone()]));
    cx.setup_entity(switch, config)?;

    if let Some(inverted) = config.get_opt("inverted").and_then(Value::as_bool) {
        cx.add(switch.call("set_inverted", vec![Expression::from(inverted)]));
    }
    let restore_mode = cx.expression(config.value("restore_mode")?)?;
    cx.add(switch.call("set_restore_mode", vec![restore_mode]));
    if let Some(class) = config.get_opt("device_class").and_then(Value::as_str) {
        cx.add(switch.call("set_device_class", vec![Expression::from(class)]));
    }

    add_automations(cx, config, "on_turn_on", &[switch.clone()], &[])?;
    add_automations(cx, config, "on_turn_off", &[switch.clone()], &[])?;

    cx.add_define("USE_SWITCH", None)?;
    Ok(())
}

fn switch_id(core: &CoreTypes) -> Validator {
    maybe_simple_value(
        Schema::new().required("id", use_id(switch_type(core))).into(),
        "id",
    )
}

/// Registers the `switch` domain, its platforms, and its actions and
/// conditions.
pub fn register(registry: &mut ComponentRegistry) {
    let core = registry.core().clone();
    let ns = namespace(&core);
    registry.register(Component::domain(NAME).codeowners(&["@kiln/core"]));

    let action = core.action.template(&[]);
    for (name, class) in [
        ("switch.turn_on", "TurnOnAction"),
        ("switch.turn_off", "TurnOffAction"),
        ("switch.toggle", "ToggleAction"),
    ] {
        registry.register_action(ActionDescriptor::new(
            name,
            ns.template_class(class, &[&action]),
            switch_id(&core),
            |cx, id, config, _args| {
                let switch = cx.get_reference(config.id_ref("id")?)?;
                cx.new_pvariable(id, vec![switch])
            },
        ));
    }

    let condition = ns.template_class("SwitchCondition", &[&core.condition.template(&[])]);
    for (name, state) in [("switch.is_on", true), ("switch.is_off", false)] {
        registry.register_condition(ConditionDescriptor::new(
            name,
            condition.clone(),
            switch_id(&core),
            move |cx, id, config, _args| {
                let switch = cx.get_reference(config.id_ref("id")?)?;
                cx.new_pvariable(id, vec![switch, Expression::from(state)])
            },
        ));
    }

    gpio::register(registry);
}

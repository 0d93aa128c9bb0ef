//! The `binary_sensor` domain.
//!
//! A binary sensor publishes on/off states. Its filters run on every raw
//! state and `on_press`/`on_release` fire on the filtered edges.

use kiln::automation::{add_automations, automation};
use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::Component;
use kiln::ir::{Expression, Parameter};
use kiln::registry::ComponentRegistry;
use kiln::schema::{
    Invalid, Schema, ValidationContext, Validator, boolean, declare_id, ensure_list,
    entity_base_schema, lambda_, maybe_simple_value, one_of, positive_time_period_milliseconds,
};
use kiln::types::{CoreTypes, NamespaceRef, TypeRef};
use kiln::value::{ConfigMap, Value, config_map};

mod gpio;

/// Domain name.
pub const NAME: &str = "binary_sensor";

const DEVICE_CLASSES: &[&str] = &[
    "battery",
    "connectivity",
    "door",
    "garage_door",
    "light",
    "moisture",
    "motion",
    "occupancy",
    "opening",
    "presence",
    "problem",
    "smoke",
    "vibration",
    "window",
];

const FILTERS: &[(&str, &str)] = &[
    ("invert", "InvertFilter"),
    ("delayed_on", "DelayedOnFilter"),
    ("delayed_off", "DelayedOffFilter"),
    ("lambda", "LambdaFilter"),
];

/// Namespace of the binary sensor runtime.
#[must_use]
pub fn namespace(core: &CoreTypes) -> NamespaceRef {
    core.esphome_ns.namespace(NAME)
}

/// The `BinarySensor` base class.
#[must_use]
pub fn binary_sensor_type(core: &CoreTypes) -> TypeRef {
    namespace(core).class_("BinarySensor", &[&core.entity_base])
}

fn filter_value(name: &str) -> Validator {
    match name {
        "invert" => Validator::any_value(),
        "lambda" => lambda_(),
        _ => positive_time_period_milliseconds(),
    }
}

fn filter(value: Value, cx: &mut ValidationContext<'_>) -> Result<Value, Invalid> {
    // `- invert` is a bare filter name.
    let map = match value {
        Value::String(name) => {
            let mut map = config_map();
            let _ = map.insert(name, Value::Null);
            map
        }
        Value::Map(map) => map,
        value => {
            return Err(Invalid::new(format!(
                "Expected a filter, got {}",
                value.kind_name()
            )));
        }
    };
    if map.len() != 1 {
        return Err(Invalid::new("Each filter item must hold exactly one filter"));
    }
    let Some((name, config)) = map.into_iter().next() else {
        return Err(Invalid::new("Expected a filter, got an empty mapping"));
    };
    let Some((_, class)) = FILTERS.iter().find(|(filter, _)| *filter == name) else {
        let names: Vec<&str> = FILTERS.iter().map(|(filter, _)| *filter).collect();
        return Err(
            Invalid::new(format!("Unable to find filter with the name '{name}'"))
                .with_hint(format!("available filters: {}", names.join(", ")))
                .key(&name),
        );
    };

    let class = namespace(cx.core()).class_(class, &[]);
    let schema = Schema::new()
        .generated("id", declare_id(class))
        .optional("value", filter_value(&name));
    let config = maybe_simple_value(schema.into(), "value")
        .validate(config, cx)
        .map_err(|error| error.key(&name))?;

    let mut output = config_map();
    let _ = output.insert(name, config);
    Ok(Value::Map(output))
}

/// Options of a binary sensor declared as `class`.
#[must_use]
pub fn binary_sensor_schema(core: &CoreTypes, class: TypeRef) -> Schema {
    let ns = namespace(core);
    let trigger = core.trigger.template(&[]);
    let on_press = ns.class_("PressTrigger", &[&trigger]);
    let on_release = ns.class_("ReleaseTrigger", &[&trigger]);

    entity_base_schema().extend(
        Schema::new()
            .generated("id", declare_id(class))
            .optional("device_class", one_of(DEVICE_CLASSES))
            .optional("publish_initial_state", boolean())
            .optional("filters", ensure_list(Validator::from_fn(filter)))
            .optional("on_press", automation(on_press, Vec::new(), Schema::new()))
            .optional("on_release", automation(on_release, Vec::new(), Schema::new())),
    )
}

fn build_filter(cx: &mut EmitContext<'_>, name: &str, config: &ConfigMap) -> Emit<Expression> {
    let id = config.id()?;
    match name {
        "invert" => cx.new_pvariable(id, Vec::new()),
        "delayed_on" | "delayed_off" => {
            let delay = config.millis("value")?;
            let filter = cx.new_pvariable(id, vec![Expression::from(delay)])?;
            cx.register_component(&filter, config)?;
            Ok(filter)
        }
        "lambda" => {
            let Value::Lambda(source) = config.value("value")? else {
                return Err(cx.fail_at("value", "expected a lambda"));
            };
            let core = cx.core();
            let optional = core
                .esphome_ns
                .template_class("optional", &[])
                .template(&[core.bool_.clone()]);
            let args = [Parameter::new(core.bool_.clone(), "x")];
            let lambda = cx.process_lambda(source, &args, Some(optional))?;
            cx.new_pvariable(id, vec![lambda])
        }
        name => Err(cx.fail(format!("unknown filter `{name}`"))),
    }
}

/// Registers a declared binary sensor with the application and applies
/// the binary sensor options.
///
/// # Errors
///
/// Suspends until the identifiers captured by lambda filters are bound.
pub fn register_binary_sensor(
    cx: &mut EmitContext<'_>,
    sensor: &Expression,
    config: &ConfigMap,
) -> Emit<()> {
    let app = cx.core().app();
    cx.add(app.call("register_binary_sensor", vec![sensor.clone()]));
    cx.setup_entity(sensor, config)?;

    if let Some(class) = config.get_opt("device_class").and_then(Value::as_str) {
        cx.add(sensor.call("set_device_class", vec![Expression::from(class)]));
    }
    if let Some(publish) = config.get_opt("publish_initial_state").and_then(Value::as_bool) {
        cx.add(sensor.call("set_publish_initial_state", vec![Expression::from(publish)]));
    }

    let mut filters = Vec::new();
    for item in config.list("filters")? {
        let Some((name, filter)) = item
            .as_map()
            .and_then(|item| item.first())
            .and_then(|(name, filter)| Some((name, filter.as_map()?)))
        else {
            return Err(cx.fail_at("filters", "expected a filter mapping"));
        };
        filters.push(build_filter(cx, name, filter)?);
    }
    if !filters.is_empty() {
        cx.add(sensor.call("add_filters", vec![Expression::array(filters)]));
    }

    add_automations(cx, config, "on_press", &[sensor.clone()], &[])?;
    add_automations(cx, config, "on_release", &[sensor.clone()], &[])?;

    cx.add_define("USE_BINARY_SENSOR", None)?;
    Ok(())
}

/// Registers the `binary_sensor` domain and its platforms.
pub fn register(registry: &mut ComponentRegistry) {
    registry.register(Component::domain(NAME).codeowners(&["@kiln/core"]));
    gpio::register(registry);
}

#[cfg(test)]
mod tests {
    use kiln::compiler::Compiler;

    use crate::registry;

    #[test]
    fn filters_and_triggers() {
        let registry = registry().unwrap();
        let compiler = Compiler::new(&registry, "esp32-arduino").unwrap();
        let output = compiler
            .compile_str(
                "esphome:\n  name: hall\nbinary_sensor:\n  - platform: gpio\n    id: button\n    name: Hall button\n    pin: GPIO0\n    device_class: motion\n    filters:\n      - invert\n      - delayed_on: 10ms\n    on_press:\n      - logger.log: Pressed\n",
            )
            .unwrap();
        let rendered: Vec<String> = output
            .ir
            .iter()
            .map(|node| node.statement.to_string())
            .collect();
        assert!(rendered.contains(&"App.register_binary_sensor(button);".to_string()));
        assert!(rendered.contains(&"button->set_device_class(\"motion\");".to_string()));
        assert!(rendered.iter().any(|line| line.starts_with("esphome::binary_sensor::InvertFilter *")));
        assert!(rendered.iter().any(|line| line.ends_with("= new esphome::binary_sensor::DelayedOnFilter(10);")));
        assert!(rendered.iter().any(|line| line.starts_with("button->add_filters({")));
        assert!(rendered.iter().any(|line| line.starts_with("esphome::binary_sensor::PressTrigger *")
            && line.ends_with("= new esphome::binary_sensor::PressTrigger(button);")));
        assert!(output.manifest.defines().contains_key("USE_BINARY_SENSOR"));
    }

    #[test]
    fn unknown_filter() {
        let registry = registry().unwrap();
        let compiler = Compiler::new(&registry, "esp32-arduino").unwrap();
        let error = compiler
            .compile_str(
                "esphome:\n  name: hall\nbinary_sensor:\n  - platform: gpio\n    pin: GPIO0\n    filters:\n      - settle: 5ms\n",
            )
            .unwrap_err();
        let diagnostic = &error.diagnostics()[0];
        assert_eq!(
            diagnostic.message,
            "Unable to find filter with the name 'settle'"
        );
        assert_eq!(
            diagnostic.path.to_string(),
            "binary_sensor[0].filters[0].settle"
        );
    }
}

//! Automations: triggers wired to conditions and actions.
//!
//! A trigger key of a component accepts a single action, a list of
//! actions, a mapping with `then:`, or a list of such mappings. Every form
//! validates into a list of automation mappings carrying the trigger and
//! automation identifiers, an optional `if:` list of conditions, and the
//! `then:` list of actions.
//!
//! Actions and conditions are registered by name in the
//! [`ComponentRegistry`]. Their identifiers are typed with the argument
//! types of the enclosing trigger while validating.

use std::sync::Arc;

use crate::codegen::{ConfigExt, Emit, EmitContext, internal};
use crate::identifier::Identifier;
use crate::ir::{Expression, Parameter};
use crate::registry::ComponentRegistry;
use crate::scheduler::priority;
use crate::schema::{
    Invalid, Schema, ValidationContext, Validator, close_match, declare_id, ensure_list, lambda_,
    maybe_simple_value, positive_time_period_milliseconds, returning_lambda, templatable, use_id,
};
use crate::types::TypeRef;
use crate::value::{ConfigMap, Value, config_map};

/// Emits an action or a condition and returns its variable.
pub type AutomationFn = Arc<
    dyn Fn(&mut EmitContext<'_>, &Identifier, &ConfigMap, &[Parameter]) -> Emit<Expression>
        + Send
        + Sync,
>;

/// An action callable from automations.
#[derive(Clone)]
pub struct ActionDescriptor {
    /// Name used in documents, such as `switch.turn_on`.
    pub name: String,
    /// Template class of the action, instantiated with the trigger
    /// argument types.
    pub class: TypeRef,
    /// Schema of the action configuration.
    pub schema: Validator,
    /// Emission function.
    pub to_code: AutomationFn,
}

impl ActionDescriptor {
    /// Creates an [`ActionDescriptor`].
    #[must_use]
    pub fn new<F>(name: &str, class: TypeRef, schema: impl Into<Validator>, to_code: F) -> Self
    where
        F: Fn(&mut EmitContext<'_>, &Identifier, &ConfigMap, &[Parameter]) -> Emit<Expression>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.to_string(),
            class,
            schema: schema.into(),
            to_code: Arc::new(to_code),
        }
    }
}

/// A condition usable in automations.
#[derive(Clone)]
pub struct ConditionDescriptor {
    /// Name used in documents, such as `switch.is_on`.
    pub name: String,
    /// Template class of the condition, instantiated with the trigger
    /// argument types.
    pub class: TypeRef,
    /// Schema of the condition configuration.
    pub schema: Validator,
    /// Emission function.
    pub to_code: AutomationFn,
}

impl ConditionDescriptor {
    /// Creates a [`ConditionDescriptor`].
    #[must_use]
    pub fn new<F>(name: &str, class: TypeRef, schema: impl Into<Validator>, to_code: F) -> Self
    where
        F: Fn(&mut EmitContext<'_>, &Identifier, &ConfigMap, &[Parameter]) -> Emit<Expression>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.to_string(),
            class,
            schema: schema.into(),
            to_code: Arc::new(to_code),
        }
    }
}

fn arg_types(cx: &ValidationContext<'_>) -> Vec<TypeRef> {
    cx.current_args().iter().map(|arg| arg.ty.clone()).collect()
}

// Validates a `{name: config}` item against the registered descriptors.
fn registered_item(
    value: Value,
    cx: &mut ValidationContext<'_>,
    what: &str,
    id_key: &str,
    lookup: fn(&ComponentRegistry, &str) -> Option<(TypeRef, Validator)>,
    names: fn(&ComponentRegistry) -> Vec<&str>,
) -> Result<Value, Invalid> {
    let map = match value {
        Value::Map(map) => map,
        value => {
            return Err(Invalid::new(format!(
                "Expected {what}, got {}",
                value.kind_name()
            )));
        }
    };

    let mut keys = map.keys().filter(|key| *key != id_key);
    let Some(name) = keys.next().cloned() else {
        return Err(Invalid::new(format!("Expected {what}, got an empty mapping")));
    };
    if let Some(other) = keys.next() {
        return Err(Invalid::new(format!(
            "Cannot have two {what}s in one item. Key '{other}' overrides '{name}'! Did you forget to indent the block inside the {what}?"
        )));
    }

    let registry = cx.registry();
    let Some((class, schema)) = lookup(registry, &name) else {
        let error = Invalid::new(format!("Unable to find {what} with the name '{name}'."));
        let error = match close_match(&name, names(registry)) {
            Some(candidate) => error.with_hint(format!("did you mean '{candidate}'?")),
            None => error,
        };
        return Err(error.key(&name));
    };

    let mut map = map;
    let config = map.shift_remove(&name).unwrap_or(Value::Null);
    let config = schema.validate(config, cx).map_err(|error| error.key(&name))?;

    let ty = class.template(&arg_types(cx));
    let id = declare_id(ty)
        .validate(map.shift_remove(id_key).unwrap_or(Value::Null), cx)
        .map_err(|error| error.key(id_key))?;

    let mut output = config_map();
    let _ = output.insert(id_key.to_string(), id);
    let _ = output.insert(name, config);
    Ok(Value::Map(output))
}

/// A single action.
#[must_use]
pub fn action() -> Validator {
    Validator::from_fn(|value, cx| {
        registered_item(
            value,
            cx,
            "action",
            "action_id",
            |registry, name| {
                registry
                    .action(name)
                    .map(|action| (action.class.clone(), action.schema.clone()))
            },
            |registry| registry.actions().collect(),
        )
    })
}

/// A single action or a list of actions.
#[must_use]
pub fn actions() -> Validator {
    ensure_list(action())
}

/// A single condition. A bare lambda is a `lambda` condition.
#[must_use]
pub fn condition() -> Validator {
    Validator::from_fn(|value, cx| {
        let value = match value {
            Value::Lambda(_) => {
                let mut map = config_map();
                let _ = map.insert("lambda".to_string(), value);
                Value::Map(map)
            }
            value => value,
        };
        registered_item(
            value,
            cx,
            "condition",
            "condition_id",
            |registry, name| {
                registry
                    .condition(name)
                    .map(|condition| (condition.class.clone(), condition.schema.clone()))
            },
            |registry| registry.conditions().collect(),
        )
    })
}

/// A single condition or a list of conditions.
#[must_use]
pub fn conditions() -> Validator {
    ensure_list(condition())
}

fn single_automation(
    map: ConfigMap,
    trigger_type: &TypeRef,
    extra: &Schema,
    cx: &mut ValidationContext<'_>,
) -> Result<Value, Invalid> {
    let automation_type = cx.core().automation.template(&arg_types(cx));
    Schema::new()
        .generated("trigger_id", declare_id(trigger_type.clone()))
        .generated("automation_id", declare_id(automation_type))
        .optional("if", conditions())
        .required("then", actions())
        .extend(extra.clone())
        .validate(Value::Map(map), cx)
}

/// One automation mapping, for components which are triggers themselves.
#[must_use]
pub fn automation_schema(trigger_type: TypeRef, args: Vec<Parameter>, extra: Schema) -> Validator {
    Validator::from_fn(move |value, cx| {
        let map = match value {
            Value::Map(map) => map,
            value => {
                return Err(Invalid::new(format!(
                    "Expected an automation, got {}",
                    value.kind_name()
                )));
            }
        };
        cx.push_args(args.clone());
        let result = single_automation(map, &trigger_type, &extra, cx);
        cx.pop_args();
        result
    })
}

fn is_automation(value: &Value) -> bool {
    value.as_map().is_some_and(|map| map.contains_key("then"))
}

/// An automation trigger key.
///
/// `args` are the arguments the trigger passes to its actions, `extra`
/// holds trigger-specific options next to `then:`.
#[must_use]
pub fn automation(trigger_type: TypeRef, args: Vec<Parameter>, extra: Schema) -> Validator {
    Validator::from_fn(move |value, cx| {
        let automations = match value {
            Value::List(items) if !items.is_empty() && items.iter().all(is_automation) => items,
            Value::List(items) => vec![then(Value::List(items))],
            value if is_automation(&value) => vec![value],
            Value::Null => return Err(Invalid::new("Expected an automation, got nothing")),
            value => vec![then(value)],
        };

        cx.push_args(args.clone());
        let mut output = Vec::with_capacity(automations.len());
        let mut errors: Option<Invalid> = None;
        for (i, value) in automations.into_iter().enumerate() {
            let result = match value {
                Value::Map(map) => single_automation(map, &trigger_type, &extra, cx),
                _ => Err(Invalid::new("Expected an automation")),
            };
            match result {
                Ok(value) => output.push(value),
                Err(error) => Invalid::accumulate(&mut errors, error.index(i)),
            }
        }
        cx.pop_args();

        match errors {
            Some(errors) => Err(errors),
            None => Ok(Value::List(output)),
        }
    })
}

fn then(actions: Value) -> Value {
    let mut map = config_map();
    let _ = map.insert("then".to_string(), actions);
    Value::Map(map)
}

fn item<'c>(value: &'c Value, id_key: &str) -> Emit<(&'c Identifier, &'c str, &'c ConfigMap)> {
    let map = value
        .as_map()
        .ok_or_else(|| internal("expected an automation item in the validated configuration"))?;
    let id = map.id_of(id_key)?;
    let (name, config) = map
        .iter()
        .find(|(key, _)| *key != id_key)
        .ok_or_else(|| internal("automation item without a name"))?;
    let config = config
        .as_map()
        .ok_or_else(|| internal(format!("configuration of `{name}` is not a mapping")))?;
    Ok((id, name, config))
}

/// Emits a list of actions and returns their variables.
///
/// # Errors
///
/// Suspends or fails like the emission functions of the actions.
pub fn build_actions(
    cx: &mut EmitContext<'_>,
    items: &[Value],
    args: &[Parameter],
) -> Emit<Vec<Expression>> {
    let mut variables = Vec::with_capacity(items.len());
    for value in items {
        let (id, name, config) = item(value, "action_id")?;
        let action = cx
            .registry()
            .action(name)
            .ok_or_else(|| internal(format!("action `{name}` is not registered")))?;
        variables.push((action.to_code)(cx, id, config, args)?);
    }
    Ok(variables)
}

/// Emits a list of conditions and returns their variables.
///
/// # Errors
///
/// Suspends or fails like the emission functions of the conditions.
pub fn build_conditions(
    cx: &mut EmitContext<'_>,
    items: &[Value],
    args: &[Parameter],
) -> Emit<Vec<Expression>> {
    let mut variables = Vec::with_capacity(items.len());
    for value in items {
        let (id, name, config) = item(value, "condition_id")?;
        let condition = cx
            .registry()
            .condition(name)
            .ok_or_else(|| internal(format!("condition `{name}` is not registered")))?;
        variables.push((condition.to_code)(cx, id, config, args)?);
    }
    Ok(variables)
}

/// Wires one automation to an already declared trigger.
///
/// # Errors
///
/// Suspends or fails like the emission functions of the conditions and
/// actions.
pub fn build_automation(
    cx: &mut EmitContext<'_>,
    trigger: &Expression,
    args: &[Parameter],
    config: &ConfigMap,
) -> Emit<Expression> {
    let automation = cx.new_pvariable(config.id_of("automation_id")?, vec![trigger.clone()])?;
    let conditions = build_conditions(cx, config.list("if")?, args)?;
    if !conditions.is_empty() {
        cx.add(automation.call("add_conditions", vec![Expression::array(conditions)]));
    }
    let actions = build_actions(cx, config.list("then")?, args)?;
    cx.add(automation.call("add_actions", vec![Expression::array(actions)]));
    Ok(automation)
}

/// Schedules the automations under `key` as sub-jobs.
///
/// Every trigger is declared with `trigger_args` as constructor arguments
/// and passes `args` to its actions.
pub fn add_automations(
    cx: &mut EmitContext<'_>,
    config: &ConfigMap,
    key: &str,
    trigger_args: &[Expression],
    args: &[Parameter],
) -> Emit<()> {
    for value in config.list(key)? {
        let automation = value
            .as_map()
            .ok_or_else(|| internal(format!("`{key}` holds a non-mapping automation")))?
            .clone();
        let trigger_args = trigger_args.to_vec();
        let args = args.to_vec();
        let label = format!("{} {key}", cx.origin());
        cx.add_job(priority::AUTOMATION, label, move |cx| {
            let trigger = cx.new_pvariable(automation.id_of("trigger_id")?, trigger_args.clone())?;
            let _ = build_automation(cx, &trigger, &args, &automation)?;
            Ok(())
        });
    }
    Ok(())
}

fn map_schema(key: &'static str, validator: Validator) -> Validator {
    maybe_simple_value(Schema::new().required(key, validator).into(), key)
}

/// Registers the actions and conditions every document may use.
pub(crate) fn register_builtins(registry: &mut ComponentRegistry) {
    let core = registry.core().clone();
    let ns = core.esphome_ns.clone();
    let action = core.action.template(&[]);
    let condition = core.condition.template(&[]);

    let delay = ns.template_class("DelayAction", &[&action, &core.component]);
    let uint32 = core.uint32.clone();
    registry.register_action(ActionDescriptor::new(
        "delay",
        delay,
        map_schema("delay", templatable(positive_time_period_milliseconds())),
        move |cx, id, config, args| {
            let variable = cx.new_pvariable(id, Vec::new())?;
            cx.register_component(&variable, &config_map())?;
            let delay = cx.templatable(config.value("delay")?, args, &uint32)?;
            cx.add(variable.call("set_delay", vec![delay]));
            Ok(variable)
        },
    ));

    let lambda_action = ns.template_class("LambdaAction", &[&action]);
    registry.register_action(ActionDescriptor::new(
        "lambda",
        lambda_action,
        map_schema("lambda", lambda_()),
        |cx, id, config, args| {
            let Value::Lambda(source) = config.value("lambda")? else {
                return Err(internal("expected a lambda"));
            };
            let lambda = cx.process_lambda(source, args, None)?;
            cx.new_pvariable(id, vec![lambda])
        },
    ));

    let if_action = ns.template_class("IfAction", &[&action]);
    registry.register_action(ActionDescriptor::new(
        "if",
        if_action,
        Schema::new()
            .required("condition", conditions())
            .optional("then", actions())
            .optional("else", actions()),
        |cx, id, config, args| {
            let conditions = build_conditions(cx, config.list("condition")?, args)?;
            let variable = cx.new_pvariable(id, vec![Expression::array(conditions)])?;
            if config.contains_key("then") {
                let then = build_actions(cx, config.list("then")?, args)?;
                cx.add(variable.call("add_then", vec![Expression::array(then)]));
            }
            if config.contains_key("else") {
                let otherwise = build_actions(cx, config.list("else")?, args)?;
                cx.add(variable.call("add_else", vec![Expression::array(otherwise)]));
            }
            Ok(variable)
        },
    ));

    let while_action = ns.template_class("WhileAction", &[&action]);
    registry.register_action(ActionDescriptor::new(
        "while",
        while_action,
        Schema::new()
            .required("condition", conditions())
            .required("then", actions()),
        |cx, id, config, args| {
            let conditions = build_conditions(cx, config.list("condition")?, args)?;
            let variable = cx.new_pvariable(id, vec![Expression::array(conditions)])?;
            let then = build_actions(cx, config.list("then")?, args)?;
            cx.add(variable.call("add_then", vec![Expression::array(then)]));
            Ok(variable)
        },
    ));

    let wait_until = ns.template_class("WaitUntilAction", &[&action, &core.component]);
    let uint32 = core.uint32.clone();
    registry.register_action(ActionDescriptor::new(
        "wait_until",
        wait_until,
        maybe_simple_value(
            Schema::new()
                .required("condition", conditions())
                .optional("timeout", templatable(positive_time_period_milliseconds()))
                .into(),
            "condition",
        ),
        move |cx, id, config, args| {
            let conditions = build_conditions(cx, config.list("condition")?, args)?;
            let variable = cx.new_pvariable(id, vec![Expression::array(conditions)])?;
            if let Some(timeout) = config.get("timeout") {
                let timeout = cx.templatable(timeout, args, &uint32)?;
                cx.add(variable.call("set_timeout_value", vec![timeout]));
            }
            cx.register_component(&variable, &config_map())?;
            Ok(variable)
        },
    ));

    let update = ns.template_class("UpdateComponentAction", &[&action]);
    registry.register_action(ActionDescriptor::new(
        "component.update",
        update,
        map_schema("id", use_id(core.polling_component.clone())),
        |cx, id, config, _args| {
            let component = cx.get_reference(config.id_ref("id")?)?;
            cx.new_pvariable(id, vec![component])
        },
    ));

    for (name, class) in [("and", "AndCondition"), ("or", "OrCondition")] {
        let class = ns.template_class(class, &[&condition]);
        registry.register_condition(ConditionDescriptor::new(
            name,
            class,
            map_schema("conditions", conditions()),
            |cx, id, config, args| {
                let conditions = build_conditions(cx, config.list("conditions")?, args)?;
                cx.new_pvariable(id, vec![Expression::array(conditions)])
            },
        ));
    }

    let not = ns.template_class("NotCondition", &[&condition]);
    registry.register_condition(ConditionDescriptor::new(
        "not",
        not,
        map_schema("condition", self::condition()),
        |cx, id, config, args| {
            let inner = build_conditions(cx, std::slice::from_ref(config.value("condition")?), args)?;
            cx.new_pvariable(id, inner)
        },
    ));

    let lambda_condition = ns.template_class("LambdaCondition", &[&condition]);
    let bool_ = core.bool_.clone();
    registry.register_condition(ConditionDescriptor::new(
        "lambda",
        lambda_condition,
        map_schema("lambda", returning_lambda()),
        move |cx, id, config, args| {
            let Value::Lambda(source) = config.value("lambda")? else {
                return Err(internal("expected a lambda"));
            };
            let lambda = cx.process_lambda(source, args, Some(bool_.clone()))?;
            cx.new_pvariable(id, vec![lambda])
        },
    ));
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::codegen::{ConfigExt, EmitContext};
    use crate::identifier::{IdOrigin, Identifier};
    use crate::ir::Parameter;
    use crate::registry::ComponentRegistry;
    use crate::scheduler::{Scheduler, priority};
    use crate::schema::{Schema, ValidationContext, Validator};
    use crate::target::TargetProfile;
    use crate::types::{TypeRef, TypeRegistry};
    use crate::value::{LambdaSource, Path, Value, config_map};

    use super::{add_automations, automation};

    fn map(entries: Vec<(&str, Value)>) -> Value {
        let mut map = config_map();
        for (key, value) in entries {
            let _ = map.insert(key.to_string(), value);
        }
        Value::Map(map)
    }

    fn trigger(types: &TypeRegistry, registry: &ComponentRegistry) -> (TypeRef, Vec<Parameter>) {
        let float = registry.core().float_.clone();
        let base = registry.core().trigger.template(&[float.clone()]);
        (
            types.namespace("sensor").class_("SensorStateTrigger", &[&base]),
            vec![Parameter::new(float, "x")],
        )
    }

    fn validate(registry: &ComponentRegistry, validator: &Validator, value: Value) -> Result<Value, crate::schema::Invalid> {
        let target = TargetProfile::lookup("host").unwrap();
        let loaded = Default::default();
        let mut cx = ValidationContext::new(&target, registry, &loaded);
        cx.enter_component("sensor");
        validator.validate(value, &mut cx)
    }

    #[test]
    fn forms() {
        let types = TypeRegistry::new();
        let registry = ComponentRegistry::new(types.clone());
        let (trigger, args) = trigger(&types, &registry);
        let validator = automation(trigger, args, Schema::new());

        let single = map(vec![("delay", "1s".into())]);
        let list = Value::List(vec![single.clone(), map(vec![("lambda", "ESP_LOGD(\"x\", \"%f\", x);".into())])]);
        let explicit = map(vec![("then", list.clone())]);

        for (value, actions) in [(single, 1), (list, 2), (explicit.clone(), 2), (Value::List(vec![explicit.clone(), explicit]), 2)] {
            let Ok(Value::List(automations)) = validate(&registry, &validator, value) else {
                panic!("expected automations");
            };
            let first = automations[0].as_map().unwrap();
            assert_eq!(first.list("then").unwrap().len(), actions);
            assert_eq!(first.id_of("trigger_id").unwrap().origin(), IdOrigin::Pending);
            assert_eq!(
                first.id_of("automation_id").unwrap().declared_type().to_string(),
                "esphome::Automation<float>"
            );
        }
    }

    #[test]
    fn action_types() {
        let types = TypeRegistry::new();
        let registry = ComponentRegistry::new(types.clone());
        let (trigger, args) = trigger(&types, &registry);
        let validator = automation(trigger, args, Schema::new());

        let value = map(vec![
            ("if", Value::Lambda(LambdaSource::new("return x > 20;"))),
            ("then", map(vec![("delay", "500ms".into())])),
        ]);
        let Ok(Value::List(automations)) = validate(&registry, &validator, value) else {
            panic!("expected automations");
        };
        let automation = automations[0].as_map().unwrap();

        let delay = automation.list("then").unwrap()[0].as_map().unwrap();
        assert_eq!(
            delay.id_of("action_id").unwrap().declared_type().to_string(),
            "esphome::DelayAction<float>"
        );
        let condition = automation.list("if").unwrap()[0].as_map().unwrap();
        assert_eq!(
            condition.id_of("condition_id").unwrap().declared_type().to_string(),
            "esphome::LambdaCondition<float>"
        );
        assert!(condition.map("lambda").unwrap().contains_key("lambda"));
    }

    #[test]
    fn unknown_actions() {
        let types = TypeRegistry::new();
        let registry = ComponentRegistry::new(types.clone());
        let (trigger, args) = trigger(&types, &registry);
        let validator = automation(trigger, args, Schema::new());

        let error = validate(&registry, &validator, map(vec![("dealy", "1s".into())])).unwrap_err();
        let issue = &error.issues()[0];
        assert_eq!(issue.message, "Unable to find action with the name 'dealy'.");
        assert_eq!(issue.hint.as_deref(), Some("did you mean 'delay'?"));
        assert_eq!(issue.path.to_string(), "[0].then.dealy");

        let error = validate(
            &registry,
            &validator,
            map(vec![("delay", "1s".into()), ("lambda", "return;".into())]),
        )
        .unwrap_err();
        assert!(error.message().starts_with("Cannot have two actions in one item."));
    }

    #[test]
    fn emission() {
        let types = TypeRegistry::new();
        let registry = ComponentRegistry::new(types.clone());
        let (trigger, args) = trigger(&types, &registry);
        let validator = automation(trigger.clone(), args.clone(), Schema::new());

        let value = map(vec![
            ("if", Value::Lambda(LambdaSource::new("return x > 20;"))),
            (
                "then",
                Value::List(vec![
                    map(vec![("delay", "500ms".into())]),
                    map(vec![("lambda", "ESP_LOGD(\"sensor\", \"high\");".into())]),
                ]),
            ),
        ]);
        let Ok(automations) = validate(&registry, &validator, value) else {
            panic!("expected automations");
        };

        // Names the pending identifiers like the resolver does.
        let mut automations = automations;
        let mut counter = 0;
        automations.walk_mut(&Path::root(), &mut |_, value| {
            if let Value::Id(id) = value {
                id.assign(format!("{}_{counter}", id.name()));
                counter += 1;
            }
        });
        let mut config = config_map();
        let _ = config.insert("on_value".to_string(), automations);

        let target = TargetProfile::lookup("host").unwrap();
        let mut scheduler = Scheduler::new(&registry, &target);
        let sensor = types.namespace("sensor").class_("Sensor", &[]);
        scheduler.push(
            priority::CONSUMER,
            "sensor.template",
            "sensor.template",
            &Path::root(),
            Arc::new(move |cx: &mut EmitContext<'_>| {
                let id = Identifier::manual("temperature", sensor.clone());
                let variable = cx.new_pvariable(&id, Vec::new())?;
                add_automations(cx, &config, "on_value", &[variable], &args)
            }),
        );
        scheduler.run().unwrap();

        let nodes = scheduler.into_emission().nodes;
        let rendered: Vec<String> = nodes.iter().map(|node| node.statement.to_string()).collect();
        assert_eq!(rendered[0], "sensor::Sensor *temperature = new sensor::Sensor();");
        assert_eq!(
            rendered[1],
            "sensor::SensorStateTrigger *sensor_state_trigger_0 = new sensor::SensorStateTrigger(temperature);"
        );
        assert!(rendered[2].starts_with("esphome::Automation<float> *sensor_automation_1 = new esphome::Automation<float>(sensor_state_trigger_0);"));
        assert!(rendered.iter().any(|line| line.starts_with("esphome::LambdaCondition<float> *")));
        assert!(rendered.iter().any(|line| line.ends_with("->set_delay(500);")));
        assert!(rendered.last().unwrap().contains("->add_actions({"));
        assert!(nodes[1..].iter().all(|node| node.priority == priority::AUTOMATION));
    }
}

//! The `sensor` domain.
//!
//! A sensor publishes floating point readings. Platforms describe their
//! options with [`sensor_schema`] and hand every declared sensor to
//! [`register_sensor`], which applies the entity options, chains the
//! filters, and wires the `on_value`, `on_raw_value`, and
//! `on_value_range` automations.
//!
//! Filters are listed under `filters:`, one single-key mapping per filter,
//! and run in order on every raw reading:
//!
//! ```yaml
//! filters:
//!   - offset: 2.0
//!   - sliding_window_moving_average:
//!       window_size: 15
//!       send_every: 15
//!   - calibrate_linear:
//!       - 0.0 -> 0.0
//!       - 48.5 -> 50.0
//! ```

use kiln::automation::{ConditionDescriptor, add_automations, automation, build_automation};
use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::Component;
use kiln::ir::{Expression, Parameter};
use kiln::registry::ComponentRegistry;
use kiln::scheduler::priority;
use kiln::schema::{
    Invalid, Schema, ValidationContext, Validator, boolean, component_schema, declare_id,
    ensure_list, entity_base_schema, enum_, float_, has_at_least_one_key, icon, int_, lambda_,
    maybe_simple_value, one_of, positive_not_null_int, positive_time_period_milliseconds,
    string_strict, templatable, use_id, zero_to_one_float,
};
use kiln::types::{CoreTypes, NamespaceRef, TypeRef};
use kiln::value::{ConfigMap, Value, config_map};

#[cfg(feature = "ade7880")]
mod ade7880;
#[cfg(feature = "bh1750")]
mod bh1750;
#[cfg(feature = "bmp280")]
mod bmp280;
mod dew_point;
#[cfg(feature = "dht")]
mod dht;
mod template;
mod wifi_signal;

/// Domain name.
pub const NAME: &str = "sensor";

const DEVICE_CLASSES: &[&str] = &[
    "apparent_power",
    "battery",
    "carbon_dioxide",
    "current",
    "energy",
    "frequency",
    "humidity",
    "illuminance",
    "power",
    "power_factor",
    "pressure",
    "signal_strength",
    "temperature",
    "voltage",
];

const ENTITY_CATEGORIES: &[&str] = &["config", "diagnostic"];

/// Presentation defaults of the sensors of a platform.
///
/// Every field left to `None` stays unset unless the document configures
/// it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorOptions {
    /// Unit of the published readings.
    pub unit_of_measurement: Option<&'static str>,
    /// Number of decimals shown for a reading.
    pub accuracy_decimals: Option<i64>,
    /// Kind of the measured quantity, such as `temperature`.
    pub device_class: Option<&'static str>,
    /// How readings accumulate, such as `measurement`.
    pub state_class: Option<&'static str>,
    /// Default icon.
    pub icon: Option<&'static str>,
    /// Default entity category.
    pub entity_category: Option<&'static str>,
}

/// Namespace of the sensor runtime.
#[must_use]
pub fn namespace(core: &CoreTypes) -> NamespaceRef {
    core.esphome_ns.namespace(NAME)
}

/// The `Sensor` base class.
#[must_use]
pub fn sensor_type(core: &CoreTypes) -> TypeRef {
    namespace(core).class_("Sensor", &[&core.entity_base])
}

fn with_default<T: Into<Value>>(
    schema: Schema,
    key: &str,
    default: Option<T>,
    validator: Validator,
) -> Schema {
    match default {
        Some(default) => schema.optional_default(key, default, validator),
        None => schema.optional(key, validator),
    }
}

fn state_class(ns: &NamespaceRef) -> Validator {
    enum_(vec![
        ("measurement", ns.symbol("STATE_CLASS_MEASUREMENT")),
        ("total_increasing", ns.symbol("STATE_CLASS_TOTAL_INCREASING")),
        ("total", ns.symbol("STATE_CLASS_TOTAL")),
    ])
}

fn value_args(core: &CoreTypes) -> Vec<Parameter> {
    vec![Parameter::new(core.float_.clone(), "x")]
}

/// Options of a sensor declared as `class`.
#[must_use]
pub fn sensor_schema(core: &CoreTypes, class: TypeRef, options: &SensorOptions) -> Schema {
    let ns = namespace(core);
    let state_trigger = core.trigger.template(&[core.float_.clone()]);
    let on_value = ns.class_("SensorStateTrigger", &[&state_trigger]);
    let on_raw_value = ns.class_("SensorRawStateTrigger", &[&state_trigger]);
    let on_value_range = ns.class_("ValueRangeTrigger", &[&state_trigger, &core.component]);

    let schema = entity_base_schema().extend(Schema::new().generated("id", declare_id(class)));
    let schema = with_default(schema, "icon", options.icon, icon());
    let schema = with_default(
        schema,
        "entity_category",
        options.entity_category,
        one_of(ENTITY_CATEGORIES),
    );
    let schema = with_default(
        schema,
        "unit_of_measurement",
        options.unit_of_measurement,
        string_strict(),
    );
    let schema = with_default(schema, "accuracy_decimals", options.accuracy_decimals, int_());
    let schema = with_default(
        schema,
        "device_class",
        options.device_class,
        one_of(DEVICE_CLASSES),
    );
    let schema = with_default(schema, "state_class", options.state_class, state_class(&ns));

    schema
        .optional_default("force_update", false, boolean())
        .optional("filters", filters())
        .optional("on_value", automation(on_value, value_args(core), Schema::new()))
        .optional(
            "on_raw_value",
            automation(on_raw_value, value_args(core), Schema::new()),
        )
        .optional(
            "on_value_range",
            automation(
                on_value_range,
                value_args(core),
                Schema::new()
                    .optional("above", templatable(float_()))
                    .optional("below", templatable(float_())),
            )
            .then(ensure_list(has_at_least_one_key(&["above", "below"]))),
        )
}

// Sliding window options where the first value may not come later than
// the regular ones.
fn sliding_window(class: TypeRef) -> Validator {
    Validator::from(
        Schema::new()
            .generated("id", declare_id(class))
            .optional_default("window_size", 15_i64, positive_not_null_int())
            .optional_default("send_every", 15_i64, positive_not_null_int())
            .optional_default("send_first_at", 1_i64, positive_not_null_int()),
    )
    .then(Validator::from_fn(|value, _cx| {
        let Value::Map(config) = &value else {
            return Ok(value);
        };
        let send_every = config.get("send_every").and_then(Value::as_int);
        let send_first_at = config.get("send_first_at").and_then(Value::as_int);
        if let (Some(send_every), Some(send_first_at)) = (send_every, send_first_at)
            && send_first_at > send_every
        {
            return Err(Invalid::new(format!(
                "send_first_at must be smaller than or equal to send_every! {send_first_at} <= {send_every}"
            ))
            .key("send_first_at"));
        }
        Ok(value)
    }))
}

// A calibration point, either `{from, to}` or `"from -> to"`.
fn datapoint() -> Validator {
    let record = Validator::from(
        Schema::new()
            .required("from", float_())
            .required("to", float_()),
    );
    Validator::from_fn(move |value, cx| {
        let text = match value {
            Value::Map(_) => return record.validate(value, cx),
            Value::String(text) => text,
            _ => return Err(Invalid::new("Datapoint mapping must contain '->'")),
        };
        let Some((from, to)) = text.split_once("->") else {
            return Err(Invalid::new("Datapoint mapping must contain '->'"));
        };
        let mut map = config_map();
        let _ = map.insert("from".to_string(), Value::String(from.trim().to_string()));
        let _ = map.insert("to".to_string(), Value::String(to.trim().to_string()));
        record.validate(Value::Map(map), cx)
    })
}

fn points(items: &[Value]) -> Vec<(f64, f64)> {
    items
        .iter()
        .filter_map(Value::as_map)
        .filter_map(|point| {
            let from = point.get("from").and_then(Value::as_f64)?;
            let to = point.get("to").and_then(Value::as_f64)?;
            Some((from, to))
        })
        .collect()
}

fn calibration() -> Validator {
    ensure_list(datapoint()).then(Validator::from_fn(|value, _cx| {
        let items = value.as_list().unwrap_or_default();
        if items.len() < 2 {
            return Err(Invalid::new("Need at least 2 datapoints for a linear calibration"));
        }
        let points = points(items);
        if points.iter().all(|(from, _)| *from == points[0].0) {
            return Err(Invalid::new(
                "Datapoints of a linear calibration need at least two different source values",
            ));
        }
        Ok(value)
    }))
}

/// Least-squares fit of `to = k * from + b`.
fn fit_linear(points: &[(f64, f64)]) -> (f64, f64) {
    #[allow(clippy::cast_precision_loss)]
    let count = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / count;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / count;
    let s_xy: f64 = points
        .iter()
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    let s_xx: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    let k = s_xy / s_xx;
    (k, mean_y - k * mean_x)
}

struct FilterKind {
    name: &'static str,
    schema: Validator,
}

fn simple_filter(name: &'static str, class: TypeRef, value: Validator) -> FilterKind {
    FilterKind {
        name,
        schema: maybe_simple_value(
            Schema::new()
                .generated("id", declare_id(class))
                .required("value", value)
                .into(),
            "value",
        ),
    }
}

fn filter_kinds(core: &CoreTypes) -> Vec<FilterKind> {
    let ns = namespace(core);
    let filter = ns.class_("Filter", &[]);
    let class = |name: &str| ns.class_(name, &[&filter]);
    let component_filter = |name: &str| ns.class_(name, &[&filter, &core.component]);

    vec![
        simple_filter("offset", class("OffsetFilter"), float_()),
        simple_filter("multiply", class("MultiplyFilter"), float_()),
        simple_filter("filter_out", class("FilterOutValueFilter"), float_()),
        simple_filter("delta", class("DeltaFilter"), float_()),
        simple_filter("lambda", class("LambdaFilter"), lambda_()),
        simple_filter(
            "throttle",
            class("ThrottleFilter"),
            positive_time_period_milliseconds(),
        ),
        FilterKind {
            name: "heartbeat",
            schema: maybe_simple_value(
                component_schema()
                    .extend(
                        Schema::new()
                            .generated("id", declare_id(component_filter("HeartbeatFilter")))
                            .required("value", positive_time_period_milliseconds()),
                    )
                    .into(),
                "value",
            ),
        },
        FilterKind {
            name: "debounce",
            schema: maybe_simple_value(
                component_schema()
                    .extend(
                        Schema::new()
                            .generated("id", declare_id(component_filter("DebounceFilter")))
                            .required("value", positive_time_period_milliseconds()),
                    )
                    .into(),
                "value",
            ),
        },
        FilterKind {
            name: "sliding_window_moving_average",
            schema: sliding_window(class("SlidingWindowMovingAverageFilter")),
        },
        FilterKind {
            name: "exponential_moving_average",
            schema: Schema::new()
                .generated("id", declare_id(class("ExponentialMovingAverageFilter")))
                .optional_default("alpha", 0.1, zero_to_one_float())
                .optional_default("send_every", 15_i64, positive_not_null_int())
                .into(),
        },
        simple_filter(
            "calibrate_linear",
            class("CalibrateLinearFilter"),
            calibration(),
        ),
        simple_filter("or", class("OrFilter"), filters()),
    ]
}

fn filter(value: Value, cx: &mut ValidationContext<'_>) -> Result<Value, Invalid> {
    let map = match value {
        Value::Map(map) => map,
        value => {
            return Err(Invalid::new(format!(
                "Expected a filter, got {}",
                value.kind_name()
            )));
        }
    };
    let mut entries = map.into_iter();
    let Some((name, config)) = entries.next() else {
        return Err(Invalid::new("Expected a filter, got an empty mapping"));
    };
    if let Some((other, _)) = entries.next() {
        return Err(Invalid::new(format!(
            "Cannot have two filters in one item. Key '{other}' overrides '{name}'!"
        )));
    }

    let kinds = filter_kinds(cx.core());
    let Some(kind) = kinds.iter().find(|kind| kind.name == name) else {
        let names: Vec<&str> = kinds.iter().map(|kind| kind.name).collect();
        return Err(
            Invalid::new(format!("Unable to find filter with the name '{name}'"))
                .with_hint(format!("available filters: {}", names.join(", ")))
                .key(&name),
        );
    };
    let config = kind
        .schema
        .validate(config, cx)
        .map_err(|error| error.key(&name))?;

    let mut output = config_map();
    let _ = output.insert(name, config);
    Ok(Value::Map(output))
}

/// A list of filters.
#[must_use]
pub fn filters() -> Validator {
    ensure_list(Validator::from_fn(filter))
}

fn build_filter(cx: &mut EmitContext<'_>, name: &str, config: &ConfigMap) -> Emit<Expression> {
    let id = config.id()?;
    match name {
        "offset" | "multiply" | "filter_out" | "delta" => {
            let value = cx.expression(config.value("value")?)?;
            cx.new_pvariable(id, vec![value])
        }
        "lambda" => {
            let Value::Lambda(source) = config.value("value")? else {
                return Err(cx.fail_at("value", "expected a lambda"));
            };
            let core = cx.core();
            let optional = core
                .esphome_ns
                .template_class("optional", &[])
                .template(&[core.float_.clone()]);
            let lambda = cx.process_lambda(source, &value_args(core), Some(optional))?;
            cx.new_pvariable(id, vec![lambda])
        }
        "throttle" => {
            let period = config.millis("value")?;
            cx.new_pvariable(id, vec![Expression::from(period)])
        }
        "heartbeat" | "debounce" => {
            let period = config.millis("value")?;
            let filter = cx.new_pvariable(id, vec![Expression::from(period)])?;
            cx.register_component(&filter, config)?;
            Ok(filter)
        }
        "sliding_window_moving_average" => cx.new_pvariable(
            id,
            vec![
                Expression::from(config.int("window_size")?),
                Expression::from(config.int("send_every")?),
                Expression::from(config.int("send_first_at")?),
            ],
        ),
        "exponential_moving_average" => cx.new_pvariable(
            id,
            vec![
                Expression::from(config.float("alpha")?),
                Expression::from(config.int("send_every")?),
            ],
        ),
        "calibrate_linear" => {
            let (k, b) = fit_linear(&points(config.list("value")?));
            cx.new_pvariable(id, vec![Expression::from(k), Expression::from(b)])
        }
        "or" => {
            let nested = build_filters(cx, config.list("value")?)?;
            cx.new_pvariable(id, vec![Expression::array(nested)])
        }
        name => Err(cx.fail(format!("unknown filter `{name}`"))),
    }
}

/// Declares every filter of a list, in order.
///
/// # Errors
///
/// Suspends until the identifiers captured by lambda filters are bound.
pub fn build_filters(cx: &mut EmitContext<'_>, items: &[Value]) -> Emit<Vec<Expression>> {
    let mut filters = Vec::with_capacity(items.len());
    for item in items {
        let Some((name, config)) = item
            .as_map()
            .and_then(|item| item.first())
            .and_then(|(name, config)| Some((name, config.as_map()?)))
        else {
            return Err(cx.fail_at("filters", "expected a filter mapping"));
        };
        filters.push(build_filter(cx, name, config)?);
    }
    Ok(filters)
}

/// Registers a declared sensor with the application and applies the
/// sensor options.
///
/// # Errors
///
/// Suspends until the identifiers captured by filters are bound.
pub fn register_sensor(cx: &mut EmitContext<'_>, sensor: &Expression, config: &ConfigMap) -> Emit<()> {
    let core = cx.core();
    let app = core.app();
    cx.add(app.call("register_sensor", vec![sensor.clone()]));
    cx.setup_entity(sensor, config)?;

    if let Some(unit) = config.get_opt("unit_of_measurement").and_then(Value::as_str) {
        cx.add(sensor.call("set_unit_of_measurement", vec![Expression::from(unit)]));
    }
    if let Some(decimals) = config.get_opt("accuracy_decimals").and_then(Value::as_int) {
        cx.add(sensor.call("set_accuracy_decimals", vec![Expression::from(decimals)]));
    }
    if let Some(class) = config.get_opt("device_class").and_then(Value::as_str) {
        cx.add(sensor.call("set_device_class", vec![Expression::from(class)]));
    }
    if let Some(state_class) = config.get_opt("state_class") {
        let state_class = cx.expression(state_class)?;
        cx.add(sensor.call("set_state_class", vec![state_class]));
    }
    if config.get_opt("force_update").and_then(Value::as_bool) == Some(true) {
        cx.add(sensor.call("set_force_update", vec![Expression::from(true)]));
    }
    let filters = build_filters(cx, config.list("filters")?)?;
    if !filters.is_empty() {
        cx.add(sensor.call("set_filters", vec![Expression::array(filters)]));
    }

    let args = value_args(core);
    add_automations(cx, config, "on_value", &[sensor.clone()], &args)?;
    add_automations(cx, config, "on_raw_value", &[sensor.clone()], &args)?;
    for value in config.list("on_value_range")? {
        let automation = value
            .as_map()
            .ok_or_else(|| cx.fail_at("on_value_range", "expected an automation"))?
            .clone();
        let sensor = sensor.clone();
        let args = args.clone();
        let float = core.float_.clone();
        let label = format!("{} on_value_range", cx.origin());
        cx.add_job(priority::AUTOMATION, label, move |cx| {
            let trigger = cx.new_pvariable(automation.id_of("trigger_id")?, vec![sensor.clone()])?;
            cx.register_component(&trigger, &automation)?;
            if let Some(above) = automation.get_opt("above") {
                let above = cx.templatable(above, &args, &float)?;
                cx.add(trigger.call("set_min", vec![above]));
            }
            if let Some(below) = automation.get_opt("below") {
                let below = cx.templatable(below, &args, &float)?;
                cx.add(trigger.call("set_max", vec![below]));
            }
            let _ = build_automation(cx, &trigger, &args, &automation)?;
            Ok(())
        });
    }

    cx.add_define("USE_SENSOR", None)?;
    Ok(())
}

/// Declares the sensor under `id` and registers it.
///
/// # Errors
///
/// Suspends like [`register_sensor`].
pub fn new_sensor(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<Expression> {
    let sensor = cx.new_pvariable(config.id()?, Vec::new())?;
    register_sensor(cx, &sensor, config)?;
    Ok(sensor)
}

/// Declares and registers the optional nested sensor under `key`.
///
/// # Errors
///
/// Suspends like [`register_sensor`].
pub fn nested_sensor(
    cx: &mut EmitContext<'_>,
    config: &ConfigMap,
    key: &str,
) -> Emit<Option<Expression>> {
    match config.get_opt(key).and_then(Value::as_map) {
        Some(sensor) => new_sensor(cx, sensor).map(Some),
        None => Ok(None),
    }
}

/// Registers the `sensor` domain, its platforms, and the
/// `sensor.in_range` condition.
pub fn register(registry: &mut ComponentRegistry) {
    let core = registry.core().clone();
    registry.register(Component::domain(NAME).codeowners(&["@kiln/core"]));

    let in_range = namespace(&core).template_class(
        "SensorInRangeCondition",
        &[&core.condition.template(&[])],
    );
    registry.register_condition(ConditionDescriptor::new(
        "sensor.in_range",
        in_range,
        Validator::from(
            Schema::new()
                .required("id", use_id(sensor_type(&core)))
                .optional("above", float_())
                .optional("below", float_()),
        )
        .then(has_at_least_one_key(&["above", "below"])),
        |cx, id, config, _args| {
            let sensor = cx.get_reference(config.id_ref("id")?)?;
            let condition = cx.new_pvariable(id, vec![sensor])?;
            if let Some(above) = config.get_opt("above").and_then(Value::as_f64) {
                cx.add(condition.call("set_min", vec![Expression::from(above)]));
            }
            if let Some(below) = config.get_opt("below").and_then(Value::as_f64) {
                cx.add(condition.call("set_max", vec![Expression::from(below)]));
            }
            Ok(condition)
        },
    ));

    template::register(registry);
    dew_point::register(registry);
    wifi_signal::register(registry);
    #[cfg(feature = "ade7880")]
    ade7880::register(registry);
    #[cfg(feature = "bh1750")]
    bh1750::register(registry);
    #[cfg(feature = "bmp280")]
    bmp280::register(registry);
    #[cfg(feature = "dht")]
    dht::register(registry);
}

#[cfg(test)]
mod tests {
    use kiln::compiler::Compiler;

    use crate::registry;

    use super::fit_linear;

    fn render(text: &str) -> Vec<String> {
        let registry = registry().unwrap();
        let compiler = Compiler::new(&registry, "esp32-arduino").unwrap();
        let output = compiler.compile_str(text).unwrap();
        output
            .ir
            .iter()
            .map(|node| node.statement.to_string())
            .collect()
    }

    #[test]
    fn linear_fit() {
        let (k, b) = fit_linear(&[(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)]);
        assert!((k - 2.0).abs() < 1e-9);
        assert!((b - 1.0).abs() < 1e-9);
    }

    #[test]
    fn sensor_options() {
        let rendered = render(
            "esphome:\n  name: shed\nsensor:\n  - platform: template\n    id: level\n    name: Tank level\n    unit_of_measurement: cm\n    accuracy_decimals: 2\n    state_class: measurement\n    force_update: true\n    lambda: return 42.0;\n",
        );
        assert!(rendered.contains(&"App.register_sensor(level);".to_string()));
        assert!(rendered.contains(&"level->set_name(\"Tank level\");".to_string()));
        assert!(rendered.contains(&"level->set_unit_of_measurement(\"cm\");".to_string()));
        assert!(rendered.contains(&"level->set_accuracy_decimals(2);".to_string()));
        assert!(rendered.contains(
            &"level->set_state_class(esphome::sensor::STATE_CLASS_MEASUREMENT);".to_string()
        ));
        assert!(rendered.contains(&"level->set_force_update(true);".to_string()));
    }

    #[test]
    fn filter_chain() {
        let rendered = render(
            "esphome:\n  name: shed\nsensor:\n  - platform: template\n    id: level\n    lambda: return 42.0;\n    filters:\n      - offset: 2.0\n      - multiply: 1.5\n      - heartbeat: 5s\n      - sliding_window_moving_average:\n          window_size: 10\n          send_every: 5\n      - calibrate_linear:\n          - 0.0 -> 1.0\n          - 1.0 -> 3.0\n      - or:\n          - throttle: 1s\n          - delta: 0.5\n",
        );
        assert!(rendered.iter().any(|line| line
            .starts_with("esphome::sensor::OffsetFilter *")
            && line.ends_with("= new esphome::sensor::OffsetFilter(2.0f);")));
        assert!(rendered.iter().any(|line| line.ends_with("= new esphome::sensor::MultiplyFilter(1.5f);")));
        assert!(rendered.iter().any(|line| line.ends_with("= new esphome::sensor::HeartbeatFilter(5000);")));
        assert!(rendered.iter().any(|line| line.ends_with(
            "= new esphome::sensor::SlidingWindowMovingAverageFilter(10, 5, 1);"
        )));
        assert!(rendered.iter().any(|line| line.ends_with(
            "= new esphome::sensor::CalibrateLinearFilter(2.0f, 1.0f);"
        )));
        assert!(rendered.iter().any(|line| line.contains("= new esphome::sensor::OrFilter({")));

        let filters = rendered
            .iter()
            .find(|line| line.starts_with("level->set_filters({"))
            .unwrap();
        assert_eq!(filters.matches(", ").count(), 5);
    }

    #[test]
    fn invalid_filters() {
        let registry = registry().unwrap();
        let compiler = Compiler::new(&registry, "esp32-arduino").unwrap();

        let error = compiler
            .compile_str(
                "esphome:\n  name: shed\nsensor:\n  - platform: template\n    lambda: return 1.0;\n    filters:\n      - sliding_window_moving_average:\n          send_every: 2\n          send_first_at: 3\n",
            )
            .unwrap_err();
        let diagnostic = &error.diagnostics()[0];
        assert_eq!(
            diagnostic.message,
            "send_first_at must be smaller than or equal to send_every! 3 <= 2"
        );
        assert_eq!(
            diagnostic.path.to_string(),
            "sensor[0].filters[0].sliding_window_moving_average.send_first_at"
        );

        let error = compiler
            .compile_str(
                "esphome:\n  name: shed\nsensor:\n  - platform: template\n    lambda: return 1.0;\n    filters:\n      - median: 5\n",
            )
            .unwrap_err();
        assert_eq!(
            error.diagnostics()[0].message,
            "Unable to find filter with the name 'median'"
        );

        let error = compiler
            .compile_str(
                "esphome:\n  name: shed\nsensor:\n  - platform: template\n    lambda: return 1.0;\n    filters:\n      - calibrate_linear:\n          - 1.0 -> 2.0\n",
            )
            .unwrap_err();
        assert_eq!(
            error.diagnostics()[0].message,
            "Need at least 2 datapoints for a linear calibration"
        );
    }

    #[test]
    fn value_automations() {
        let rendered = render(
            "esphome:\n  name: shed\nsensor:\n  - platform: template\n    id: level\n    lambda: return 42.0;\n    on_value:\n      - logger.log: Updated\n    on_value_range:\n      - above: 10.0\n        below: 20.0\n        then:\n          - logger.log: In range\n",
        );
        let state_trigger = rendered
            .iter()
            .find(|line| line.starts_with("esphome::sensor::SensorStateTrigger *"))
            .unwrap();
        assert!(state_trigger.ends_with("= new esphome::sensor::SensorStateTrigger(level);"));

        let range_trigger = rendered
            .iter()
            .position(|line| line.starts_with("esphome::sensor::ValueRangeTrigger *"))
            .unwrap();
        assert!(rendered[range_trigger + 1].starts_with("App.register_component("));
        assert!(rendered[range_trigger + 2].ends_with("->set_min(10.0f);"));
        assert!(rendered[range_trigger + 3].ends_with("->set_max(20.0f);"));
        assert!(rendered.iter().any(|line| line.starts_with("esphome::Automation<float> *")));

        let registry = registry().unwrap();
        let compiler = Compiler::new(&registry, "esp32-arduino").unwrap();
        let error = compiler
            .compile_str(
                "esphome:\n  name: shed\nsensor:\n  - platform: template\n    lambda: return 1.0;\n    on_value_range:\n      - then:\n          - logger.log: Never\n",
            )
            .unwrap_err();
        assert_eq!(
            error.diagnostics()[0].message,
            "Must contain at least one of above, below."
        );
    }

    #[test]
    fn in_range_condition() {
        let rendered = render(
            "esphome:\n  name: shed\n  on_boot:\n    if:\n      - sensor.in_range:\n          id: level\n          above: 5\n    then:\n      - logger.log: Filled\nsensor:\n  - platform: template\n    id: level\n    lambda: return 42.0;\n",
        );
        let condition = rendered
            .iter()
            .position(|line| line.starts_with("esphome::sensor::SensorInRangeCondition<> *"))
            .unwrap();
        assert!(rendered[condition].ends_with("= new esphome::sensor::SensorInRangeCondition<>(level);"));
        assert!(rendered[condition + 1].ends_with("->set_min(5.0f);"));
    }
}

use kiln::automation::ActionDescriptor;
use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::Component;
use kiln::ir::Expression;
use kiln::registry::ComponentRegistry;
use kiln::scheduler::priority;
use kiln::schema::{
    Invalid, Schema, Validator, declare_id, ensure_list, lambda_, maybe_simple_value, one_of,
    positive_int, string,
};
use kiln::value::{ConfigMap, LambdaSource, Value, config_map};

/// Component name.
pub const NAME: &str = "logger";

// Ordered by increasing verbosity.
const LEVELS: &[&str] = &[
    "NONE",
    "ERROR",
    "WARN",
    "INFO",
    "CONFIG",
    "DEBUG",
    "VERBOSE",
    "VERY_VERBOSE",
];

const LOG_LEVELS: &[&str] = &[
    "NONE",
    "ERROR",
    "WARN",
    "INFO",
    "DEBUG",
    "VERBOSE",
    "VERY_VERBOSE",
];

const MESSAGE_LEVELS: &[&str] = &["ERROR", "WARN", "INFO", "DEBUG", "VERBOSE", "VERY_VERBOSE"];

const HARDWARE_UARTS: &[&str] = &["UART0", "UART0_SWAP", "UART1", "UART2", "USB_CDC", "USB_SERIAL_JTAG"];

// Runs right after the core so every other component can log its setup.
const PRIORITY: f64 = priority::CORE - 10.0;

fn severity(level: &str) -> usize {
    LEVELS.iter().position(|candidate| *candidate == level).unwrap_or(0)
}

fn log_macro(level: &str) -> &'static str {
    match level {
        "ERROR" => "ESP_LOGE",
        "WARN" => "ESP_LOGW",
        "INFO" => "ESP_LOGI",
        "VERBOSE" => "ESP_LOGV",
        "VERY_VERBOSE" => "ESP_LOGVV",
        _ => "ESP_LOGD",
    }
}

// A mapping of log tags to their levels.
fn tag_levels() -> Validator {
    Validator::from_fn(|value, cx| {
        let map = match value {
            Value::Map(map) => map,
            Value::Null => return Ok(Value::Map(config_map())),
            value => {
                return Err(Invalid::new(format!(
                    "expected a dictionary, got {}",
                    value.kind_name()
                )));
            }
        };
        let mut output = config_map();
        let mut errors: Option<Invalid> = None;
        for (tag, level) in map {
            match one_of(LOG_LEVELS).validate(level, cx) {
                Ok(level) => {
                    let _ = output.insert(tag, level);
                }
                Err(error) => {
                    let error = error.key(&tag);
                    match &mut errors {
                        Some(errors) => errors.merge(error),
                        None => errors = Some(error),
                    }
                }
            }
        }
        match errors {
            Some(errors) => Err(errors),
            None => Ok(Value::Map(output)),
        }
    })
}

// A tag may not log more than the global level lets through.
fn local_levels_within_global() -> Validator {
    Validator::from_fn(|value, _cx| {
        let Value::Map(config) = &value else {
            return Ok(value);
        };
        let global = config.get("level").and_then(Value::as_str).unwrap_or("DEBUG");
        if let Some(logs) = config.get("logs").and_then(Value::as_map) {
            for (tag, level) in logs {
                let Some(level) = level.as_str() else {
                    continue;
                };
                if severity(level) > severity(global) {
                    return Err(Invalid::new(format!(
                        "The local log level {level} for {tag} must be less severe than the global log level {global}."
                    ))
                    .key(tag)
                    .key("logs"));
                }
            }
        }
        Ok(value)
    })
}

// Counts the printf conversions, skipping escaped percent signs.
fn printf_conversions(format: &str) -> usize {
    let mut count = 0;
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.next() {
                Some('%') | None => {}
                Some(_) => count += 1,
            }
        }
    }
    count
}

fn validate_printf() -> Validator {
    Validator::from_fn(|value, _cx| {
        let Value::Map(config) = &value else {
            return Ok(value);
        };
        let format = config.get("format").and_then(Value::as_str).unwrap_or_default();
        let conversions = printf_conversions(format);
        let args = config.get("args").and_then(Value::as_list).map_or(0, <[Value]>::len);
        if conversions != args {
            return Err(Invalid::new(format!(
                "Found {conversions} printf-patterns, but {args} args were given!"
            ))
            .key("format"));
        }
        Ok(value)
    })
}

fn log_action_schema() -> Validator {
    maybe_simple_value(
        Validator::from(
            Schema::new()
                .required("format", string())
                .optional("args", ensure_list(lambda_()))
                .optional_default("level", "DEBUG", one_of(MESSAGE_LEVELS))
                .optional_default("tag", "main", string()),
        )
        .then(validate_printf()),
        "format",
    )
}

// The log statement becomes the body of a lambda action.
fn log_statement(cx: &EmitContext<'_>, config: &ConfigMap) -> Emit<String> {
    let level = config.string("level")?;
    let mut args = vec![
        Expression::from(config.string("tag")?),
        Expression::from(config.string("format")?),
    ];
    for arg in config.list("args")? {
        let Value::Lambda(source) = arg else {
            return Err(cx.fail_at("args", "expected a lambda"));
        };
        args.push(Expression::raw(source.body.trim()));
    }
    let call = cx.core().global_ns.symbol(log_macro(level)).invoke(args);
    Ok(format!("{call};"))
}

fn to_code(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<()> {
    let baud_rate = config.int("baud_rate")?;
    let tx_buffer_size = config.int("tx_buffer_size")?;
    let log = cx.new_pvariable(
        config.id()?,
        vec![Expression::from(baud_rate), Expression::from(tx_buffer_size)],
    )?;

    if let Some(uart) = config.get_opt("hardware_uart").and_then(Value::as_str) {
        let selection = cx
            .core()
            .esphome_ns
            .namespace(NAME)
            .symbol(&format!("UART_SELECTION_{uart}"));
        cx.add(log.call("set_uart_selection", vec![selection]));
    }
    cx.add(log.call("pre_setup", Vec::new()));

    let global_ns = cx.core().global_ns.clone();
    for (tag, level) in config.map("logs")? {
        if let Some(level) = level.as_str() {
            let level = global_ns.symbol(&format!("ESPHOME_LOG_LEVEL_{level}"));
            cx.add(log.call("set_log_level", vec![Expression::from(tag.as_str()), level]));
        }
    }

    let level = config.string("level")?;
    cx.add_define("USE_LOGGER", None)?;
    cx.add_build_flag(format!("-DESPHOME_LOG_LEVEL=ESPHOME_LOG_LEVEL_{level}"));
    if severity(level) >= severity("VERBOSE") && baud_rate != 0 {
        cx.add_build_flag("-DCORE_DEBUG_LEVEL=5");
    }
    cx.register_component(&log, config)?;
    Ok(())
}

/// Registers the `logger` component and the `logger.log` action.
pub fn register(registry: &mut ComponentRegistry) {
    let core = registry.core().clone();
    let logger = core
        .esphome_ns
        .namespace(NAME)
        .class_("Logger", &[&core.component]);

    registry.register(
        Component::new(NAME)
            .priority(PRIORITY)
            .codeowners(&["@kiln/core"])
            .schema(
                Validator::from(
                    Schema::new()
                        .generated("id", declare_id(logger))
                        .optional_default("baud_rate", 115_200_i64, positive_int())
                        .optional_default("tx_buffer_size", 512_i64, positive_int())
                        .optional("hardware_uart", one_of(HARDWARE_UARTS))
                        .optional_default("level", "DEBUG", one_of(LOG_LEVELS))
                        .optional_default("logs", config_map(), tag_levels()),
                )
                .then(local_levels_within_global()),
            )
            .to_code(to_code),
    );

    let action = core.action.template(&[]);
    let lambda_action = core.esphome_ns.template_class("LambdaAction", &[&action]);
    let void = core.void.clone();
    registry.register_action(ActionDescriptor::new(
        "logger.log",
        lambda_action,
        log_action_schema(),
        move |cx, id, config, args| {
            let body = log_statement(cx, config)?;
            let lambda = cx.process_lambda(&LambdaSource::new(body), args, Some(void.clone()))?;
            cx.new_pvariable(id, vec![lambda])
        },
    ));
}

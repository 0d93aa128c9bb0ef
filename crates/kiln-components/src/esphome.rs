//! The `esphome` core component.
//!
//! Every document holds it. It names the device, contributes the
//! target-wide defines and build flags, and hosts the boot, shutdown, and
//! loop triggers.

use kiln::automation::{automation, build_automation};
use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::Component;
use kiln::ir::Expression;
use kiln::manifest::Library;
use kiln::registry::ComponentRegistry;
use kiln::scheduler::priority;
use kiln::schema::{Invalid, Schema, Validator, ensure_list, float_, string, string_strict};
use kiln::target::Framework;
use kiln::value::{ConfigMap, Value};

/// Name of the core component.
pub const NAME: &str = "esphome";

const ALLOWED_NAME_CHARS: &str = "abcdefghijklmnopqrstuvwxyz0123456789-_";

const INCLUDE_EXTENSIONS: &[&str] = &["h", "hpp", "tcc", "ino", "cpp", "c"];

const BUILD_FLAGS: &[&str] = &[
    "-fno-exceptions",
    "-Wno-unused-variable",
    "-Wno-unused-but-set-variable",
    "-Wno-sign-compare",
];

// Runs before every automation of the device.
const DEFAULT_BOOT_PRIORITY: f64 = 600.0;

/// A device name made of lowercase letters, digits, hyphens, and
/// underscores.
#[must_use]
pub fn valid_name() -> Validator {
    string_strict().then(Validator::from_fn(|value, _cx| {
        if let Value::String(name) = &value
            && let Some(c) = name.chars().find(|c| !ALLOWED_NAME_CHARS.contains(*c))
        {
            return Err(Invalid::new(format!(
                "'{c}' is an invalid character for names. Valid characters are: {ALLOWED_NAME_CHARS} (lowercase, no spaces)"
            )));
        }
        Ok(value)
    }))
}

// A source file or a directory copied next to the generated program.
fn include() -> Validator {
    string_strict().then(Validator::from_fn(|value, _cx| {
        if let Value::String(path) = &value
            && let Some(extension) = std::path::Path::new(path).extension()
            && !INCLUDE_EXTENSIONS
                .iter()
                .any(|valid| extension.eq_ignore_ascii_case(valid))
        {
            let valid: Vec<String> = INCLUDE_EXTENSIONS.iter().map(|ext| format!(".{ext}")).collect();
            return Err(Invalid::new(format!(
                "Include has invalid file extension .{} - valid extensions are {}",
                extension.to_string_lossy(),
                valid.join(", ")
            )));
        }
        Ok(value)
    }))
}

fn schema(registry: &ComponentRegistry) -> Schema {
    let core = registry.core();
    let trigger = core.trigger.template(&[]);
    let startup = core
        .esphome_ns
        .class_("StartupTrigger", &[&core.component, &trigger]);
    let shutdown = core
        .esphome_ns
        .class_("ShutdownTrigger", &[&core.component, &trigger]);
    let loop_ = core
        .esphome_ns
        .class_("LoopTrigger", &[&core.component, &trigger]);

    Schema::new()
        .required("name", valid_name())
        .optional("comment", string())
        .optional(
            "on_boot",
            automation(
                startup,
                Vec::new(),
                Schema::new().optional_default("priority", DEFAULT_BOOT_PRIORITY, float_()),
            ),
        )
        .optional("on_shutdown", automation(shutdown, Vec::new(), Schema::new()))
        .optional("on_loop", automation(loop_, Vec::new(), Schema::new()))
        .optional("includes", ensure_list(include()))
        .optional("libraries", ensure_list(string_strict()))
}

// Every trigger is a component of its own, constructed with its options.
fn add_triggers(cx: &mut EmitContext<'_>, config: &ConfigMap, key: &'static str) -> Emit<()> {
    for value in config.list(key)? {
        let Some(automation) = value.as_map().cloned() else {
            return Err(cx.fail_at(key, "expected an automation"));
        };
        cx.add_job(priority::AUTOMATION, format!("{NAME} {key}"), move |cx| {
            let args = match automation.get_opt("priority") {
                Some(priority) => vec![cx.expression(priority)?],
                None => Vec::new(),
            };
            let trigger = cx.new_pvariable(automation.id_of("trigger_id")?, args)?;
            cx.register_component(&trigger, &automation)?;
            let _ = build_automation(cx, &trigger, &[], &automation)?;
            Ok(())
        });
    }
    Ok(())
}

fn to_code(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<()> {
    let app = cx.core().app();
    let name = config.string("name")?;
    cx.add(app.call(
        "pre_setup",
        vec![
            Expression::from(name),
            Expression::raw("__DATE__ \", \" __TIME__"),
        ],
    ));
    if let Some(comment) = config.get_opt("comment").and_then(Value::as_str) {
        cx.comment(comment);
    }

    let target = cx.target();
    cx.add_define(&format!("USE_{}", target.platform.name().to_uppercase()), None)?;
    match target.framework {
        Framework::Arduino => cx.add_define("USE_ARDUINO", None)?,
        Framework::EspIdf => cx.add_define("USE_ESP_IDF", None)?,
        Framework::Host => {}
    }
    for flag in BUILD_FLAGS {
        cx.add_build_flag(*flag);
    }

    for include in config.list("includes")? {
        if let Some(path) = include.as_str() {
            cx.add_source_file(path);
        }
    }
    for library in config.list("libraries")? {
        if let Some(text) = library.as_str() {
            cx.add_library_spec(Library::parse(text))?;
        }
    }

    add_triggers(cx, config, "on_boot")?;
    add_triggers(cx, config, "on_shutdown")?;
    add_triggers(cx, config, "on_loop")?;

    cx.add_job(priority::FINAL, format!("{NAME} setup"), |cx| {
        let app = cx.core().app();
        cx.add(app.call("setup", Vec::new()));
        Ok(())
    });
    Ok(())
}

/// Registers the core component.
pub fn register(registry: &mut ComponentRegistry) {
    let schema = schema(registry);
    registry.register(
        Component::new(NAME)
            .priority(priority::CORE)
            .codeowners(&["@kiln/core"])
            .schema(schema)
            .to_code(to_code),
    );
}

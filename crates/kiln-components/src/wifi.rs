use kiln::automation::ConditionDescriptor;
use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::Component;
use kiln::ir::Expression;
use kiln::registry::ComponentRegistry;
use kiln::scheduler::priority;
use kiln::schema::{
    Invalid, Schema, Validator, boolean, declare_id, enum_, ensure_list, float_,
    has_at_least_one_key, int_range, invalid, mac_address, positive_time_period_milliseconds,
    ssid, string_strict,
};
use kiln::target::{Capability, Constraints, Platform};
use kiln::types::{CoreTypes, TypeRef};
use kiln::value::{ConfigMap, Value, config_map};

use crate::network;

/// Component name.
pub const NAME: &str = "wifi";

/// Type of the `wifi` component.
#[must_use]
pub fn component_type(core: &CoreTypes) -> TypeRef {
    core.esphome_ns
        .namespace(NAME)
        .class_("WiFiComponent", &[&core.component])
}

fn validate_password() -> Validator {
    string_strict().then(Validator::from_fn(|value, _cx| {
        let Value::String(password) = &value else {
            return Ok(value);
        };
        match password.chars().count() {
            0 => Ok(value),
            1..8 => Err(Invalid::new("WPA password must be at least 8 characters long")),
            65.. => Err(Invalid::new("WPA password must be at most 64 characters long")),
            _ => Ok(value),
        }
    }))
}

fn network_schema(ap: &TypeRef) -> Schema {
    Schema::new()
        .generated("id", declare_id(ap.clone()))
        .optional("ssid", ssid())
        .optional("password", validate_password())
        .optional("channel", int_range(1, 14))
        .optional("manual_ip", network::manual_ip_schema().into())
}

fn station_schema(ap: &TypeRef) -> Validator {
    Validator::from(
        network_schema(ap)
            .optional("bssid", mac_address())
            .optional("hidden", boolean())
            .optional_default("priority", 0.0, float_()),
    )
    .then(has_at_least_one_key(&["ssid", "bssid"]))
}

fn access_point_schema(ap: &TypeRef) -> Validator {
    network_schema(ap)
        .optional_default("ap_timeout", "1min", positive_time_period_milliseconds())
        .into()
}

// Folds a top-level `ssid` into the list of networks.
fn normalize_networks(station: Validator) -> Validator {
    Validator::from_fn(move |value, cx| {
        let Value::Map(mut config) = value else {
            return Ok(value);
        };
        if config.contains_key("ssid") {
            if config.contains_key("networks") {
                return Err(Invalid::new("Cannot have WiFi ssid and networks keys").key("networks"));
            }
            let mut network = config_map();
            for key in ["ssid", "password"] {
                if let Some(value) = config.shift_remove(key) {
                    let _ = network.insert(key.to_string(), value);
                }
            }
            let network = station.validate(Value::Map(network), cx)?;
            let _ = config.insert("networks".to_string(), Value::List(vec![network]));
        }

        let has_networks = config
            .get("networks")
            .and_then(Value::as_list)
            .is_some_and(|networks| !networks.is_empty());
        if !has_networks && !config.contains_key("ap") {
            return Err(Invalid::new(
                "Please specify at least an SSID or an Access Point to create.",
            ));
        }
        Ok(Value::Map(config))
    })
}

fn schema(core: &CoreTypes) -> Validator {
    let ns = core.esphome_ns.namespace(NAME);
    let ap = ns.class_("WiFiAP", &[]);
    let power_save_mode = enum_(vec![
        ("NONE", ns.symbol("WIFI_POWER_SAVE_NONE")),
        ("LIGHT", ns.symbol("WIFI_POWER_SAVE_LIGHT")),
        ("HIGH", ns.symbol("WIFI_POWER_SAVE_HIGH")),
    ]);

    Validator::from(
        Schema::new()
            .generated("id", declare_id(component_type(core)))
            .optional("networks", ensure_list(station_schema(&ap)))
            .optional("ssid", ssid())
            .optional("password", validate_password())
            .optional("manual_ip", network::manual_ip_schema().into())
            .optional("ap", access_point_schema(&ap))
            .optional_default("domain", ".local", string_strict())
            .optional_default("reboot_timeout", "15min", positive_time_period_milliseconds())
            .optional_default("power_save_mode", "LIGHT", power_save_mode)
            .optional_default("fast_connect", false, boolean())
            .optional("use_address", string_strict())
            .optional(
                "hostname",
                invalid("The hostname option has been removed. Set the device name under esphome: instead."),
            ),
    )
    .then(normalize_networks(station_schema(&ap)))
}

// Declares one `WiFiAP` value and fills it from its options.
fn access_point(
    cx: &mut EmitContext<'_>,
    config: &ConfigMap,
    fallback_ip: Option<&ConfigMap>,
) -> Emit<Expression> {
    let id = config.id()?;
    let ap = cx.variable(id, Expression::type_(id.declared_type().clone()).invoke(Vec::new()))?;
    if let Some(ssid) = config.get_opt("ssid").and_then(Value::as_str) {
        cx.add(ap.call("set_ssid", vec![Expression::from(ssid)]));
    }
    if let Some(password) = config.get_opt("password").and_then(Value::as_str) {
        cx.add(ap.call("set_password", vec![Expression::from(password)]));
    }
    if let Some(bssid) = config.get_opt("bssid") {
        let bssid = cx.expression(bssid)?;
        cx.add(ap.call("set_bssid", vec![bssid]));
    }
    if let Some(hidden) = config.get_opt("hidden").and_then(Value::as_bool) {
        cx.add(ap.call("set_hidden", vec![Expression::from(hidden)]));
    }
    if let Some(channel) = config.get_opt("channel").and_then(Value::as_int) {
        cx.add(ap.call("set_channel", vec![Expression::from(channel)]));
    }
    if let Some(priority) = config.get_opt("priority").and_then(Value::as_f64) {
        cx.add(ap.call("set_priority", vec![Expression::from(priority)]));
    }
    let manual_ip = config.get_opt("manual_ip").and_then(Value::as_map).or(fallback_ip);
    if let Some(manual_ip) = manual_ip {
        let manual_ip = network::manual_ip(cx, NAME, manual_ip);
        cx.add(ap.call("set_manual_ip", vec![manual_ip]));
    }
    Ok(ap)
}

fn to_code(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<()> {
    let wifi = cx.new_pvariable(config.id()?, Vec::new())?;
    if let Some(address) = config.get_opt("use_address").and_then(Value::as_str) {
        cx.add(wifi.call("set_use_address", vec![Expression::from(address)]));
    }

    let manual_ip = config.get_opt("manual_ip").and_then(Value::as_map);
    for network in config.list("networks")? {
        let network = network
            .as_map()
            .ok_or_else(|| cx.fail_at("networks", "expected a network"))?;
        let station = access_point(cx, network, manual_ip)?;
        cx.add(wifi.call("add_sta", vec![station]));
    }
    if let Some(ap) = config.get_opt("ap").and_then(Value::as_map) {
        let hotspot = access_point(cx, ap, None)?;
        cx.add(wifi.call("set_ap", vec![hotspot]));
        let timeout = ap.millis("ap_timeout")?;
        cx.add(wifi.call("set_ap_timeout", vec![Expression::from(timeout)]));
    }

    let reboot_timeout = config.millis("reboot_timeout")?;
    cx.add(wifi.call("set_reboot_timeout", vec![Expression::from(reboot_timeout)]));
    let power_save_mode = cx.expression(config.value("power_save_mode")?)?;
    cx.add(wifi.call("set_power_save_mode", vec![power_save_mode]));
    cx.add(wifi.call(
        "set_fast_connect",
        vec![Expression::from(config.bool("fast_connect")?)],
    ));

    if cx.target().platform == Platform::Esp8266 {
        cx.add_library("ESP8266WiFi", None)?;
    }
    cx.add_define("USE_WIFI", None)?;
    cx.register_component(&wifi, config)?;
    Ok(())
}

/// Registers the `wifi` component and the `wifi.connected` condition.
pub fn register(registry: &mut ComponentRegistry) {
    let core = registry.core().clone();

    registry.register(
        Component::new(NAME)
            .priority(priority::NETWORK)
            .codeowners(&["@kiln/core"])
            .auto_load(&[network::NAME])
            .conflicts_with(&[crate::ethernet::NAME])
            .constraints(Constraints::new().capability(Capability::Wifi))
            .schema(schema(&core))
            .final_validate(network::default_use_address)
            .to_code(to_code),
    );

    let condition = core.condition.template(&[]);
    let connected = core
        .esphome_ns
        .namespace(NAME)
        .template_class("WiFiConnectedCondition", &[&condition]);
    registry.register_condition(ConditionDescriptor::new(
        "wifi.connected",
        connected,
        Schema::new(),
        |cx, id, _config, _args| cx.new_pvariable(id, Vec::new()),
    ));
}

#[cfg(test)]
mod tests {
    use kiln::compiler::Compiler;
    use kiln::diagnostics::{DiagnosticKind, ErrorKind};

    use crate::registry;

    fn render(target: &str, text: &str) -> Vec<String> {
        let registry = registry().unwrap();
        let compiler = Compiler::new(&registry, target).unwrap();
        let output = compiler.compile_str(text).unwrap();
        output
            .ir
            .iter()
            .map(|node| node.statement.to_string())
            .collect()
    }

    #[test]
    fn single_network() {
        let rendered = render(
            "esp32-arduino",
            "esphome:\n  name: porch\nwifi:\n  ssid: HomeNet\n  password: correcthorse\n  manual_ip:\n    static_ip: 192.168.1.20\n    gateway: 192.168.1.1\n    subnet: 255.255.255.0\n",
        );
        assert!(rendered.iter().any(|line| line.starts_with("esphome::wifi::WiFiComponent *")));
        assert!(rendered.iter().any(|line| line.ends_with("->set_use_address(\"porch.local\");")));
        assert!(rendered.iter().any(|line| line.ends_with(".set_ssid(\"HomeNet\");")));
        assert!(rendered.iter().any(|line| line.ends_with(".set_password(\"correcthorse\");")));
        assert!(rendered.iter().any(|line| line.contains(
            ".set_manual_ip(esphome::wifi::ManualIP{.static_ip = esphome::network::IPAddress(192, 168, 1, 20), "
        )));
        assert!(rendered.iter().any(|line| line.contains("->add_sta(")));
        assert!(rendered.iter().any(|line| line.ends_with(
            "->set_power_save_mode(esphome::wifi::WIFI_POWER_SAVE_LIGHT);"
        )));
        assert!(rendered.iter().any(|line| line.ends_with("->set_reboot_timeout(900000);")));
    }

    #[test]
    fn network_is_auto_loaded() {
        let registry = registry().unwrap();
        let compiler = Compiler::new(&registry, "esp8266-arduino").unwrap();
        let output = compiler
            .compile_str("esphome:\n  name: porch\nwifi:\n  networks:\n    - ssid: HomeNet\n    - bssid: AA:BB:CC:DD:EE:FF\n      hidden: true\n")
            .unwrap();
        let network = output
            .plan
            .instances()
            .iter()
            .find(|instance| instance.component == "network")
            .unwrap();
        assert!(network.auto_loaded);
        let defines = output.manifest.defines();
        assert!(defines.contains_key("USE_WIFI"));
        assert!(defines.contains_key("USE_NETWORK"));
        assert_eq!(output.manifest.libraries()[0].name, "ESP8266WiFi");

        let stations = output
            .ir
            .iter()
            .filter(|node| node.statement.to_string().contains("->add_sta("))
            .count();
        assert_eq!(stations, 2);
    }

    #[test]
    fn invalid_networks() {
        let registry = registry().unwrap();
        let compiler = Compiler::new(&registry, "esp32-idf").unwrap();

        let error = compiler
            .compile_str("esphome:\n  name: porch\nwifi:\n  ssid: HomeNet\n  password: short\n")
            .unwrap_err();
        assert_eq!(
            error.diagnostics()[0].message,
            "WPA password must be at least 8 characters long"
        );
        assert_eq!(error.diagnostics()[0].path.to_string(), "wifi.password");

        let error = compiler
            .compile_str("esphome:\n  name: porch\nwifi:\n  ssid: HomeNet\n  networks:\n    - ssid: Other\n")
            .unwrap_err();
        assert_eq!(error.diagnostics()[0].message, "Cannot have WiFi ssid and networks keys");

        let error = compiler
            .compile_str("esphome:\n  name: porch\nwifi:\n  fast_connect: true\n")
            .unwrap_err();
        assert_eq!(
            error.diagnostics()[0].message,
            "Please specify at least an SSID or an Access Point to create."
        );
    }

    #[test]
    fn target_without_wifi() {
        let registry = registry().unwrap();
        let compiler = Compiler::new(&registry, "rp2040-arduino").unwrap();
        let error = compiler
            .compile_str("esphome:\n  name: porch\nwifi:\n  ssid: HomeNet\n")
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert_eq!(error.diagnostics()[0].kind, DiagnosticKind::Platform);
        assert!(error.diagnostics()[0].message.starts_with("Component `wifi` is not available"));
    }

    #[test]
    fn connected_condition() {
        let rendered = render(
            "esp32-arduino",
            "esphome:\n  name: porch\n  on_boot:\n    if:\n      - wifi.connected:\n    then:\n      - logger.log: Online\nwifi:\n  ap:\n    ssid: Porch Fallback\n",
        );
        assert!(rendered.iter().any(|line| line.contains("= new esphome::wifi::WiFiConnectedCondition<>();")));
        assert!(rendered.iter().any(|line| line.contains("->add_conditions({")));
        assert!(rendered.iter().any(|line| line.ends_with("->set_ap_timeout(60000);")));
    }
}

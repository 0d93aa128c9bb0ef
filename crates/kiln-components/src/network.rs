use kiln::codegen::{ConfigExt, Emit, EmitContext};
use kiln::component::Component;
use kiln::ir::Expression;
use kiln::registry::ComponentRegistry;
use kiln::resolver::FinalContext;
use kiln::scheduler::priority;
use kiln::schema::{Invalid, Schema, boolean, ipv4};
use kiln::value::{ConfigMap, Value};

/// Component name.
pub const NAME: &str = "network";

/// Options of a static IP configuration.
#[must_use]
pub fn manual_ip_schema() -> Schema {
    Schema::new()
        .required("static_ip", ipv4())
        .required("gateway", ipv4())
        .required("subnet", ipv4())
        .optional_default("dns1", "0.0.0.0", ipv4())
        .optional_default("dns2", "0.0.0.0", ipv4())
}

/// Builds the `ManualIP` structure of a validated static IP configuration,
/// `ns` being the namespace of the interface declaring the structure.
#[must_use]
pub fn manual_ip(cx: &EmitContext<'_>, ns: &str, config: &ConfigMap) -> Expression {
    let core = cx.core();
    let ip_address = core
        .esphome_ns
        .namespace(NAME)
        .class_("IPAddress", &[]);
    let manual_ip = core.esphome_ns.namespace(ns).struct_("ManualIP");

    let mut fields = Vec::new();
    for key in ["static_ip", "gateway", "subnet", "dns1", "dns2"] {
        if let Some(Value::Ipv4(ip)) = config.get_opt(key) {
            let octets = ip.octets().into_iter().map(Expression::from).collect();
            fields.push(format!(
                ".{key} = {}",
                Expression::type_(ip_address.clone()).invoke(octets)
            ));
        }
    }
    Expression::raw(format!("{manual_ip}{{{}}}", fields.join(", ")))
}

/// Fills `use_address` of a network interface with the device name
/// followed by the interface `domain` when it is not configured.
///
/// # Errors
///
/// Never fails; the signature matches the final validation hooks.
pub fn default_use_address(
    config: &mut ConfigMap,
    cx: &mut FinalContext<'_>,
) -> Result<(), Invalid> {
    if config.contains_key("use_address") {
        return Ok(());
    }
    let name = cx
        .component_configs(crate::esphome::NAME)
        .find_map(|core| core.get("name").and_then(Value::as_str).map(str::to_string));
    let Some(name) = name else {
        return Ok(());
    };
    let domain = config.get("domain").and_then(Value::as_str).unwrap_or(".local");
    let address = format!("{name}{domain}");
    let _ = config.insert("use_address".into(), Value::String(address));
    Ok(())
}

fn to_code(cx: &mut EmitContext<'_>, config: &ConfigMap) -> Emit<()> {
    cx.add_define("USE_NETWORK", None)?;
    if config.bool("enable_ipv6")? {
        cx.add_define("USE_NETWORK_IPV6", None)?;
        cx.add_build_flag("-DCONFIG_LWIP_IPV6");
    }
    Ok(())
}

/// Registers the `network` component.
pub fn register(registry: &mut ComponentRegistry) {
    registry.register(
        Component::new(NAME)
            .priority(priority::NETWORK + 1.0)
            .codeowners(&["@kiln/core"])
            .schema(Schema::new().optional_default("enable_ipv6", false, boolean()))
            .to_code(to_code),
    );
}

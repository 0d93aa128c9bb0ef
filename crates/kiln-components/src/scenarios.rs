//! Whole documents compiled against the built-in catalog.

use hashbrown::DefaultHashBuilder;
use indexmap::IndexSet;

use kiln::compiler::{Compiler, Output};
use kiln::diagnostics::{DiagnosticKind, Error, ErrorKind};
use kiln::ir::Statement;
use kiln::schema::ValidationContext;
use kiln::value::Value;

use crate::registry;

const BUS: &str = "i2c:\n  id: bus\n  sda: GPIO21\n  scl: GPIO22\n  frequency: 400kHz\n";

const SENSOR: &str = "sensor:\n  - platform: bmp280\n    id: outdoor\n    address: 0x77\n    update_interval: 60s\n    temperature:\n      name: Outdoor temperature\n";

fn compile(target: &str, text: &str) -> Result<Output, Error> {
    let registry = registry().unwrap();
    let compiler = Compiler::new(&registry, target).unwrap();
    compiler.compile_str(text)
}

fn rendered(output: &Output) -> Vec<String> {
    output
        .ir
        .iter()
        .map(|node| node.statement.to_string())
        .collect()
}

#[test]
fn minimal_device() {
    let output = compile(
        "esp32-arduino",
        &format!("esphome:\n  name: porch\n{BUS}{SENSOR}"),
    )
    .unwrap();

    let bus = output.plan.instances_of("i2c").next().unwrap();
    let sensor = output.plan.instances_of("sensor.bmp280").next().unwrap();
    assert!(bus.priority > sensor.priority);

    let declarations = output
        .ir
        .iter()
        .filter(|node| {
            matches!(&node.statement, Statement::PVariable { ty, .. }
                if ty.to_string() == "esphome::bmp280::BMP280Component")
        })
        .count();
    assert_eq!(declarations, 1);

    let rendered = rendered(&output);
    assert!(rendered.contains(&"outdoor->set_i2c_bus(bus);".to_string()));
    let declared = rendered
        .iter()
        .position(|line| line.starts_with("esphome::i2c::"))
        .unwrap();
    let attached = rendered
        .iter()
        .position(|line| line == "outdoor->set_i2c_bus(bus);")
        .unwrap();
    assert!(declared < attached);
}

#[test]
fn reference_before_declaration() {
    let ordered = compile(
        "esp32-arduino",
        &format!("esphome:\n  name: porch\n{BUS}{SENSOR}"),
    )
    .unwrap();
    let reversed = compile(
        "esp32-arduino",
        &format!("esphome:\n  name: porch\n{SENSOR}{BUS}"),
    )
    .unwrap();

    let labels = |output: &Output| -> Vec<String> {
        output
            .plan
            .instances()
            .iter()
            .map(|instance| instance.component.clone())
            .collect()
    };
    assert_eq!(labels(&ordered), labels(&reversed));
    assert_eq!(rendered(&ordered), rendered(&reversed));
}

#[test]
fn missing_dependency() {
    let error = compile("esp32-arduino", &format!("esphome:\n  name: porch\n{SENSOR}")).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Validation);
    let diagnostic = &error.diagnostics()[0];
    assert_eq!(diagnostic.kind, DiagnosticKind::Dependency);
    assert_eq!(
        diagnostic.message,
        "component `i2c` required by `bmp280` not configured"
    );
}

#[test]
fn cyclic_reference() {
    let error = compile(
        "esp32-idf",
        "esphome:\n  name: cellar\nsensor:\n  - platform: dew_point\n    id: first\n    temperature_source: second\n    humidity_source: humidity\n  - platform: dew_point\n    id: second\n    temperature_source: first\n    humidity_source: humidity\n  - platform: template\n    id: humidity\n    lambda: return 55.0;\n",
    )
    .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Emission);
    let message = &error.diagnostics()[0].message;
    assert!(message.starts_with("Cyclic reference: "));
    assert!(message.contains("'first'"));
    assert!(message.contains("'second'"));
    assert!(message.contains("sensor[0]"));
    assert!(message.contains("sensor[1]"));
}

#[test]
fn instance_cap() {
    let uart = "  - baud_rate: 9600\n    tx_pin: GPIO1\n";
    let error = compile(
        "esp32-arduino",
        &format!("esphome:\n  name: meter\nuart:\n{}", uart.repeat(4)),
    )
    .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Validation);
    let diagnostic = &error.diagnostics()[0];
    assert_eq!(diagnostic.path.to_string(), "uart[3]");
    assert_eq!(
        diagnostic.message,
        "Component `uart` allows at most 3 instances, found 4"
    );
}

const PORCH: &str = "esphome:\n  name: porch\n  on_boot:\n    - logger.log: Booted\nlogger:\n  level: debug\nwifi:\n  ssid: HomeNet\n  password: correcthorse\ni2c:\n  id: bus\nsensor:\n  - platform: bmp280\n    temperature:\n      name: Porch temperature\n  - platform: template\n    id: level\n    lambda: return 42.0;\n    filters:\n      - offset: 2.0\n      - heartbeat: 5s\n    on_value:\n      - logger.log: Updated\nswitch:\n  - platform: gpio\n    id: door\n    name: Porch door\n    pin: GPIO4\n";

#[test]
fn validated_configs_are_stable() {
    let registry = registry().unwrap();
    let compiler = Compiler::new(&registry, "esp32-arduino").unwrap();
    let output = compiler.compile_str(PORCH).unwrap();

    let mut loaded = IndexSet::with_hasher(DefaultHashBuilder::default());
    for instance in output.plan.instances() {
        let _ = loaded.insert(instance.component.clone());
        for part in instance.component.split('.') {
            let _ = loaded.insert(part.to_string());
        }
    }

    for instance in output.plan.instances() {
        let component = registry.component(&instance.component).unwrap();
        let mut cx = ValidationContext::new(compiler.target(), &registry, &loaded);
        cx.enter_component(component.name());
        let config = Value::Map(instance.config.clone());
        assert_eq!(
            component.instance_schema().validate(config.clone(), &mut cx),
            Ok(config),
            "{} at {}",
            instance.component,
            instance.path
        );
    }
}

#[test]
fn emission_is_deterministic() {
    let first = compile("esp32-arduino", PORCH).unwrap();
    let second = compile("esp32-arduino", PORCH).unwrap();

    assert_eq!(first.ir.len(), second.ir.len());
    for (left, right) in first.ir.iter().zip(&second.ir) {
        assert_eq!(left, right);
    }
    assert_eq!(rendered(&first), rendered(&second));
}

#[test]
#[cfg(feature = "ade7880")]
fn channel_scoped_names() {
    let output = compile(
        "esp32-idf",
        "esphome:\n  name: meter\ni2c:\nsensor:\n  - platform: ade7880\n    irq0_pin: GPIO13\n    irq1_pin: GPIO5\n    phase_a:\n      name: L1\n      voltage:\n        id: volts\n        name: volts\n      current:\n        id: amps\n        name: L1 amps\n",
    )
    .unwrap();
    let rendered = rendered(&output);
    assert!(rendered.contains(&"volts->set_name(\"L1 volts\");".to_string()));
    assert!(rendered.contains(&"amps->set_name(\"L1 amps\");".to_string()));
}

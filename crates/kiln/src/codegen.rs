//! The emission context handed to code-emission functions.
//!
//! A job emits into an [`EmitContext`], which stages every statement,
//! binding, manifest contribution, and sub-job into a transaction. The
//! scheduler commits the transaction when the job completes and discards it
//! when the job suspends on an unbound identifier, so a job is replayed from
//! its beginning once the identifier is bound. Emission functions must
//! therefore be free of side effects outside the context.

use std::fmt;
use std::sync::Arc;

use hashbrown::DefaultHashBuilder;

use indexmap::IndexMap;

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::identifier::{IdRef, Identifier};
use crate::ir::{BinaryOperator, Expression, IrNode, Lambda, Parameter, Statement};
use crate::manifest::{Library, Manifest};
use crate::pins::{Pin, PinFlag};
use crate::registry::ComponentRegistry;
use crate::target::{Platform, TargetProfile};
use crate::types::{CoreTypes, TypeRef};
use crate::value::{ConfigMap, LambdaSource, Path, Value};

/// The outcome of an emission step.
pub type Emit<T> = std::result::Result<T, EmitError>;

/// Why an emission step stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum EmitError {
    /// The job waits for the identifier with the given name to be bound.
    Await(String),
    /// The job failed.
    Fail(Diagnostic),
}

impl fmt::Display for EmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Await(name) => write!(f, "waiting for ID '{name}'"),
            Self::Fail(diagnostic) => diagnostic.fmt(f),
        }
    }
}

/// The code-emission function of a component instance.
pub type ToCodeFn = Arc<dyn Fn(&mut EmitContext<'_>, &ConfigMap) -> Emit<()> + Send + Sync>;

/// The function of a sub-job.
pub type JobFn = Arc<dyn Fn(&mut EmitContext<'_>) -> Emit<()> + Send + Sync>;

/// Identifiers bound to the variables declared for them.
pub type Bindings = IndexMap<String, Expression, DefaultHashBuilder>;

pub(crate) struct StagedJob {
    pub(crate) priority: f64,
    pub(crate) label: String,
    pub(crate) run: JobFn,
}

pub(crate) struct Transaction {
    pub(crate) nodes: Vec<IrNode>,
    pub(crate) bindings: Vec<(String, Expression)>,
    pub(crate) manifest: Manifest,
    pub(crate) jobs: Vec<StagedJob>,
}

/// Emission primitives available to a running job.
pub struct EmitContext<'a> {
    registry: &'a ComponentRegistry,
    target: &'a TargetProfile,
    bindings: &'a Bindings,
    staged: Transaction,
    priority: f64,
    origin: String,
    path: Path,
}

impl<'a> EmitContext<'a> {
    pub(crate) fn new(
        registry: &'a ComponentRegistry,
        target: &'a TargetProfile,
        bindings: &'a Bindings,
        manifest: Manifest,
        priority: f64,
        origin: String,
        path: Path,
    ) -> Self {
        Self {
            registry,
            target,
            bindings,
            staged: Transaction {
                nodes: Vec::new(),
                bindings: Vec::new(),
                manifest,
                jobs: Vec::new(),
            },
            priority,
            origin,
            path,
        }
    }

    pub(crate) fn into_transaction(self) -> Transaction {
        self.staged
    }

    /// Returns the shared types.
    #[must_use]
    pub fn core(&self) -> &'a CoreTypes {
        self.registry.core()
    }

    /// Returns the component registry.
    #[must_use]
    pub const fn registry(&self) -> &'a ComponentRegistry {
        self.registry
    }

    /// Returns the selected target.
    #[must_use]
    pub const fn target(&self) -> &'a TargetProfile {
        self.target
    }

    /// Returns the priority of the running job.
    #[must_use]
    pub const fn priority(&self) -> f64 {
        self.priority
    }

    /// Returns the label of the instance the running job belongs to.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Returns the document path of the instance the running job belongs to.
    #[must_use]
    pub const fn path(&self) -> &Path {
        &self.path
    }

    /// Builds an emission failure positioned at the running instance.
    #[must_use]
    pub fn fail(&self, message: impl Into<String>) -> EmitError {
        EmitError::Fail(Diagnostic::error(
            DiagnosticKind::Emission,
            self.path.clone(),
            message,
        ))
    }

    /// Builds an emission failure positioned at a key of the running
    /// instance.
    #[must_use]
    pub fn fail_at(&self, key: &str, message: impl Into<String>) -> EmitError {
        EmitError::Fail(Diagnostic::error(
            DiagnosticKind::Emission,
            self.path.key(key),
            message,
        ))
    }

    fn push(&mut self, statement: Statement) {
        self.staged.nodes.push(IrNode {
            priority: self.priority,
            origin: self.origin.clone(),
            statement,
        });
    }

    fn bind(&mut self, id: &Identifier, variable: Expression) -> Emit<()> {
        if id.is_pending() {
            return Err(internal(format!(
                "ID '{}' of type {} was never named",
                id.name(),
                id.declared_type()
            )));
        }
        let name = id.name();
        if self.bindings.contains_key(name) || self.staged.bindings.iter().any(|(n, _)| n == name) {
            return Err(internal(format!("ID '{name}' is bound twice")));
        }
        tracing::debug!("Binding ID '{name}' in `{}`", self.origin);
        self.staged.bindings.push((name.to_string(), variable));
        Ok(())
    }

    /// Declares a pointer variable for `id`, allocated with the given
    /// constructor arguments, and binds the identifier to it.
    ///
    /// # Errors
    ///
    /// Fails when the identifier is unnamed or already bound.
    pub fn new_pvariable(&mut self, id: &Identifier, args: Vec<Expression>) -> Emit<Expression> {
        let ty = id.declared_type().clone();
        let variable = Expression::variable(id.name(), ty.ptr());
        self.bind(id, variable.clone())?;
        self.push(Statement::PVariable {
            id: id.name().to_string(),
            ty,
            args,
        });
        Ok(variable)
    }

    /// Declares a global variable for `id` with an initial value and binds
    /// the identifier to it.
    ///
    /// # Errors
    ///
    /// Fails when the identifier is unnamed or already bound.
    pub fn variable(&mut self, id: &Identifier, value: Expression) -> Emit<Expression> {
        let ty = id.declared_type().clone();
        let variable = Expression::variable(id.name(), ty.clone());
        self.bind(id, variable.clone())?;
        self.push(Statement::Variable {
            id: id.name().to_string(),
            ty,
            value,
        });
        Ok(variable)
    }

    /// Emits an expression as a statement.
    pub fn add(&mut self, expression: Expression) {
        self.push(Statement::expression(expression));
    }

    /// Emits a comment.
    pub fn comment(&mut self, text: impl Into<String>) {
        self.push(Statement::comment(text));
    }

    /// Returns the variable bound to an identifier.
    ///
    /// # Errors
    ///
    /// Suspends the job when the identifier is not bound yet.
    pub fn get_variable(&self, name: &str) -> Emit<Expression> {
        if let Some((_, variable)) = self.staged.bindings.iter().find(|(n, _)| n == name) {
            return Ok(variable.clone());
        }
        match self.bindings.get(name) {
            Some(variable) => Ok(variable.clone()),
            None => {
                tracing::debug!("`{}` waits for ID '{name}'", self.origin);
                Err(EmitError::Await(name.to_string()))
            }
        }
    }

    /// Returns the variable a reference points to.
    ///
    /// # Errors
    ///
    /// Suspends the job when the identifier is not bound yet.
    pub fn get_reference(&self, reference: &IdRef) -> Emit<Expression> {
        if reference.is_auto() {
            return Err(internal(format!(
                "reference to {} was never bound",
                reference.required_type
            )));
        }
        self.get_variable(&reference.name)
    }

    /// Wires the standard component protocol: setup priority, update
    /// interval, and registration with the application.
    ///
    /// # Errors
    ///
    /// Fails on malformed options.
    pub fn register_component(&mut self, variable: &Expression, config: &ConfigMap) -> Emit<()> {
        if let Some(priority) = config.get("setup_priority") {
            let priority = priority
                .as_f64()
                .ok_or_else(|| self.fail_at("setup_priority", "expected a number"))?;
            self.add(variable.call("set_setup_priority", vec![Expression::from(priority)]));
        }
        if config.contains_key("update_interval") {
            let interval = config.millis("update_interval")?;
            self.add(variable.call("set_update_interval", vec![Expression::from(interval)]));
        }
        let app = self.core().app();
        self.add(app.call("register_component", vec![variable.clone()]));
        Ok(())
    }

    /// Applies the entity options: name, visibility, icon, and category.
    ///
    /// # Errors
    ///
    /// Fails on malformed options.
    pub fn setup_entity(&mut self, variable: &Expression, config: &ConfigMap) -> Emit<()> {
        if let Some(name) = config.get_opt("name") {
            let name = name
                .as_str()
                .ok_or_else(|| self.fail_at("name", "expected a string"))?;
            self.add(variable.call("set_name", vec![Expression::from(name)]));
        }
        if config.get_opt("disabled_by_default").and_then(Value::as_bool) == Some(true) {
            self.add(variable.call("set_disabled_by_default", vec![Expression::from(true)]));
        }
        if let Some(internal) = config.get_opt("internal").and_then(Value::as_bool) {
            self.add(variable.call("set_internal", vec![Expression::from(internal)]));
        }
        if let Some(icon) = config.get_opt("icon").and_then(Value::as_str) {
            self.add(variable.call("set_icon", vec![Expression::from(icon)]));
        }
        if let Some(category) = config.get_opt("entity_category").and_then(Value::as_str) {
            let category = self
                .core()
                .esphome_ns
                .symbol(&format!("ENTITY_CATEGORY_{}", category.to_uppercase()));
            self.add(variable.call("set_entity_category", vec![category]));
        }
        Ok(())
    }

    /// Builds a lambda from source text with the given parameters.
    ///
    /// Every identifier referenced through `id(...)` becomes a capture.
    ///
    /// # Errors
    ///
    /// Suspends the job until every captured identifier is bound.
    pub fn process_lambda(
        &self,
        source: &LambdaSource,
        parameters: &[Parameter],
        return_type: Option<TypeRef>,
    ) -> Emit<Expression> {
        let mut captures = Vec::new();
        for name in source.referenced_ids() {
            let _ = self.get_variable(name)?;
            captures.push(name.to_string());
        }
        Ok(Expression::Lambda(Lambda {
            parameters: parameters.to_vec(),
            captures,
            return_type,
            body: source.body.clone(),
            origin: self.path.to_string(),
        }))
    }

    /// Emits a value which is either a literal or a lambda returning `ty`.
    ///
    /// # Errors
    ///
    /// Suspends on unbound captures and fails on values without an
    /// expression form.
    pub fn templatable(
        &self,
        value: &Value,
        parameters: &[Parameter],
        ty: &TypeRef,
    ) -> Emit<Expression> {
        match value {
            Value::Lambda(source) => self.process_lambda(source, parameters, Some(ty.clone())),
            value => self.expression(value),
        }
    }

    /// Converts a configuration value into an expression.
    ///
    /// # Errors
    ///
    /// Suspends on unbound references and fails on values without an
    /// expression form.
    pub fn expression(&self, value: &Value) -> Emit<Expression> {
        match value {
            Value::IdRef(reference) => self.get_reference(reference),
            Value::Lambda(source) => self.process_lambda(source, &[], None),
            value => value
                .to_expression()
                .ok_or_else(|| self.fail(format!("cannot emit a {} here", value.kind_name()))),
        }
    }

    /// Declares the object of a pin and returns it.
    ///
    /// `key` names the option holding the pin and keeps the variable name
    /// unique within the document.
    ///
    /// # Errors
    ///
    /// Suspends until the expander providing the pin is bound.
    pub fn gpio_pin(&mut self, pin: &Pin, key: &str) -> Emit<Expression> {
        let name = variable_name(&self.path.key(key));
        let core = self.core();

        let (ty, parent) = match &pin.provider {
            Some(provider) => {
                let hub = self.get_reference(provider)?;
                let pin_type = self
                    .registry
                    .pin_providers()
                    .find(|candidate| provider.required_type.is_subtype_of(&candidate.hub_type))
                    .map(|candidate| candidate.pin_type.clone())
                    .ok_or_else(|| self.fail_at(key, format!("no pin provider for {provider}")))?;
                (pin_type, Some(hub))
            }
            None => {
                let ns = match self.target.platform {
                    Platform::Esp32 => core.esphome_ns.namespace("esp32").class_(
                        "ESP32InternalGPIOPin",
                        &[&core.internal_gpio_pin],
                    ),
                    Platform::Esp8266 => core.esphome_ns.namespace("esp8266").class_(
                        "ESP8266GPIOPin",
                        &[&core.internal_gpio_pin],
                    ),
                    Platform::Rp2040 => core.esphome_ns.namespace("rp2040").class_(
                        "RP2040GPIOPin",
                        &[&core.internal_gpio_pin],
                    ),
                    Platform::Host => core
                        .esphome_ns
                        .namespace("host")
                        .class_("HostGPIOPin", &[&core.internal_gpio_pin]),
                };
                (ns, None)
            }
        };

        let id = Identifier::manual(name, ty);
        let variable = self.new_pvariable(&id, Vec::new())?;
        if let Some(hub) = parent {
            self.add(variable.call("set_parent", vec![hub]));
        }
        self.add(variable.call("set_pin", vec![Expression::from(pin.number)]));
        self.add(variable.call("set_inverted", vec![Expression::from(pin.inverted)]));
        if let Some(milliamps) = pin.drive_strength {
            let strength = core
                .esphome_ns
                .namespace("gpio")
                .symbol(&format!("DRIVE_STRENGTH_{milliamps}MA"));
            self.add(variable.call("set_drive_strength", vec![strength]));
        }
        let flags = self.pin_flags(pin);
        self.add(variable.call("set_flags", vec![flags]));
        Ok(variable)
    }

    fn pin_flags(&self, pin: &Pin) -> Expression {
        let gpio = self.core().esphome_ns.namespace("gpio").namespace("Flags");
        let mut flags = pin.flags.iter().map(|flag: &PinFlag| gpio.symbol(flag.constant()));
        let first = flags.next().unwrap_or_else(|| gpio.symbol("FLAG_NONE"));
        flags.fold(first, |lhs, rhs| lhs.binary(BinaryOperator::BitOr, rhs))
    }

    /// Adds a library dependency.
    ///
    /// # Errors
    ///
    /// Fails when the library is already pinned to another version.
    pub fn add_library(&mut self, name: &str, version: Option<&str>) -> Emit<()> {
        self.add_library_spec(Library::new(name, version))
    }

    /// Adds a library dependency described by a [`Library`].
    ///
    /// # Errors
    ///
    /// Fails when the library is already pinned to another version or
    /// repository.
    pub fn add_library_spec(&mut self, library: Library) -> Emit<()> {
        self.staged
            .manifest
            .add_library(library)
            .map_err(|message| self.fail(message))
    }

    /// Adds a preprocessor define.
    ///
    /// # Errors
    ///
    /// Fails when the define exists with another value.
    pub fn add_define(&mut self, name: &str, value: Option<&str>) -> Emit<()> {
        self.staged
            .manifest
            .add_define(name, value.map(str::to_string))
            .map_err(|message| self.fail(message))
    }

    /// Adds a compiler flag.
    pub fn add_build_flag(&mut self, flag: impl Into<String>) {
        self.staged.manifest.add_build_flag(flag);
    }

    /// Adds a source file copied next to the generated program.
    pub fn add_source_file(&mut self, path: impl Into<String>) {
        self.staged.manifest.add_source_file(path);
    }

    /// Schedules a sub-job of the running instance.
    ///
    /// Sub-jobs may be replayed like any other job.
    pub fn add_job<F>(&mut self, priority: f64, label: impl Into<String>, run: F)
    where
        F: Fn(&mut EmitContext<'_>) -> Emit<()> + Send + Sync + 'static,
    {
        self.staged.jobs.push(StagedJob {
            priority,
            label: label.into(),
            run: Arc::new(run),
        });
    }
}

// Turns `sensor[0].pin` into `sensor_0_pin`.
pub(crate) fn variable_name(path: &Path) -> String {
    let mut name = String::new();
    for c in path.to_string().chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c);
        } else if !name.ends_with('_') {
            name.push('_');
        }
    }
    name.trim_end_matches('_').to_string()
}

pub(crate) fn internal(message: impl Into<String>) -> EmitError {
    EmitError::Fail(Diagnostic::error(
        DiagnosticKind::Internal,
        Path::root(),
        message,
    ))
}

fn missing(key: &str, expected: &str) -> EmitError {
    EmitError::Fail(Diagnostic::error(
        DiagnosticKind::Internal,
        Path::root().key(key),
        format!("expected {expected} in the validated configuration"),
    ))
}

/// Typed accessors for validated configurations.
///
/// Every accessor reports an internal error when the validated shape is not
/// the expected one, since validation guarantees it.
pub trait ConfigExt {
    /// Returns the declared identifier under `id`.
    ///
    /// # Errors
    ///
    /// Fails when the key holds no declaration.
    fn id(&self) -> Emit<&Identifier> {
        self.id_of("id")
    }

    /// Returns the declared identifier under `key`.
    ///
    /// # Errors
    ///
    /// Fails when the key holds no declaration.
    fn id_of(&self, key: &str) -> Emit<&Identifier>;

    /// Returns the identifier reference under `key`.
    ///
    /// # Errors
    ///
    /// Fails when the key holds no reference.
    fn id_ref(&self, key: &str) -> Emit<&IdRef>;

    /// Returns the value under `key`, if any.
    fn get_opt(&self, key: &str) -> Option<&Value>;

    /// Returns the value under `key`.
    ///
    /// # Errors
    ///
    /// Fails when the key is absent.
    fn value(&self, key: &str) -> Emit<&Value> {
        self.get_opt(key).ok_or_else(|| missing(key, "a value"))
    }

    /// Returns the string under `key`.
    ///
    /// # Errors
    ///
    /// Fails when the key holds no string.
    fn string(&self, key: &str) -> Emit<&str> {
        self.get_opt(key)
            .and_then(Value::as_str)
            .ok_or_else(|| missing(key, "a string"))
    }

    /// Returns the boolean under `key`.
    ///
    /// # Errors
    ///
    /// Fails when the key holds no boolean.
    fn bool(&self, key: &str) -> Emit<bool> {
        self.get_opt(key)
            .and_then(Value::as_bool)
            .ok_or_else(|| missing(key, "a boolean"))
    }

    /// Returns the integer under `key`.
    ///
    /// # Errors
    ///
    /// Fails when the key holds no integer.
    fn int(&self, key: &str) -> Emit<i64> {
        self.get_opt(key)
            .and_then(Value::as_int)
            .ok_or_else(|| missing(key, "an integer"))
    }

    /// Returns the number under `key`.
    ///
    /// # Errors
    ///
    /// Fails when the key holds no number.
    fn float(&self, key: &str) -> Emit<f64> {
        self.get_opt(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| missing(key, "a number"))
    }

    /// Returns the time period under `key` in milliseconds.
    ///
    /// # Errors
    ///
    /// Fails when the key holds no time period or the period overflows.
    fn millis(&self, key: &str) -> Emit<u32> {
        self.get_opt(key)
            .and_then(Value::as_time_period)
            .and_then(|period| u32::try_from(period.as_millis()).ok())
            .ok_or_else(|| missing(key, "a time period"))
    }

    /// Returns the mapping under `key`.
    ///
    /// # Errors
    ///
    /// Fails when the key holds no mapping.
    fn map(&self, key: &str) -> Emit<&ConfigMap> {
        self.get_opt(key)
            .and_then(Value::as_map)
            .ok_or_else(|| missing(key, "a mapping"))
    }

    /// Returns the list under `key`, empty when absent.
    ///
    /// # Errors
    ///
    /// Fails when the key holds something else than a list.
    fn list(&self, key: &str) -> Emit<&[Value]> {
        match self.get_opt(key) {
            None => Ok(&[]),
            Some(value) => value.as_list().ok_or_else(|| missing(key, "a list")),
        }
    }

    /// Returns the pin under `key`.
    ///
    /// # Errors
    ///
    /// Fails when the key holds no pin.
    fn pin(&self, key: &str) -> Emit<&Pin> {
        match self.get_opt(key) {
            Some(Value::Pin(pin)) => Ok(pin),
            _ => Err(missing(key, "a pin")),
        }
    }
}

impl ConfigExt for ConfigMap {
    fn id_of(&self, key: &str) -> Emit<&Identifier> {
        self.get(key)
            .and_then(Value::as_id)
            .ok_or_else(|| missing(key, "an ID declaration"))
    }

    fn id_ref(&self, key: &str) -> Emit<&IdRef> {
        self.get(key)
            .and_then(Value::as_id_ref)
            .ok_or_else(|| missing(key, "an ID reference"))
    }

    fn get_opt(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }
}

#[cfg(test)]
mod tests {
    use crate::diagnostics::DiagnosticKind;
    use crate::identifier::Identifier;
    use crate::ir::{Expression, Parameter};
    use crate::manifest::Manifest;
    use crate::pins::{Pin, PinFlag, PinFlags};
    use crate::registry::ComponentRegistry;
    use crate::target::TargetProfile;
    use crate::types::TypeRegistry;
    use crate::value::{LambdaSource, Path, TimePeriod, Value, config_map};

    use super::{Bindings, ConfigExt, EmitContext, EmitError};

    fn with_context<T>(bindings: &Bindings, test: impl FnOnce(&mut EmitContext<'_>) -> T) -> T {
        let registry = ComponentRegistry::new(TypeRegistry::new());
        let target = TargetProfile::lookup("esp32-arduino").unwrap();
        let mut cx = EmitContext::new(
            &registry,
            &target,
            bindings,
            Manifest::new(),
            100.0,
            "sensor.bmp280".into(),
            Path::root().key("sensor").index(0),
        );
        test(&mut cx)
    }

    #[test]
    fn declarations_bind() {
        let types = TypeRegistry::new();
        let ty = types.namespace("bmp280").class_("BMP280Component", &[]);
        let id = Identifier::manual("outdoor", ty);

        let bindings = Bindings::default();
        let transaction = with_context(&bindings, |cx| {
            let variable = cx.new_pvariable(&id, Vec::new()).unwrap();
            assert_eq!(cx.get_variable("outdoor"), Ok(variable.clone()));
            assert!(matches!(
                cx.new_pvariable(&id, Vec::new()),
                Err(EmitError::Fail(diagnostic)) if diagnostic.kind == DiagnosticKind::Internal
            ));

            let mut config = config_map();
            let _ = config.insert(
                "update_interval".into(),
                Value::TimePeriod(TimePeriod::from_secs(60)),
            );
            cx.register_component(&variable, &config).unwrap();
            assert_eq!(cx.get_variable("bus"), Err(EmitError::Await("bus".into())));
            cx.add_define("USE_SENSOR", None).unwrap();

            let (nodes, manifest) = (cx.staged.nodes.clone(), cx.staged.manifest.clone());
            (nodes, manifest)
        });

        let (nodes, manifest) = transaction;
        let rendered: Vec<String> = nodes.iter().map(|node| node.statement.to_string()).collect();
        assert_eq!(
            rendered,
            [
                "bmp280::BMP280Component *outdoor = new bmp280::BMP280Component();",
                "outdoor->set_update_interval(60000);",
                "App.register_component(outdoor);",
            ]
        );
        assert!(nodes.iter().all(|node| node.origin == "sensor.bmp280"));
        assert_eq!(manifest.compiler_flags(), ["-DUSE_SENSOR"]);
    }

    #[test]
    fn lambdas_capture_bound_ids() {
        let types = TypeRegistry::new();
        let float = types.global().primitive("float");
        let sensor = types.namespace("sensor").class_("Sensor", &[]);

        let mut bindings = Bindings::default();
        let source = LambdaSource::new("return id(outdoor).state + x;");

        let waiting = with_context(&bindings, |cx| {
            cx.process_lambda(&source, &[Parameter::new(float.clone(), "x")], None)
        });
        assert_eq!(waiting, Err(EmitError::Await("outdoor".into())));

        let _ = bindings.insert(
            "outdoor".into(),
            Expression::variable("outdoor", sensor.ptr()),
        );
        let lambda = with_context(&bindings, |cx| {
            cx.templatable(&Value::Lambda(source.clone()), &[], &float)
                .unwrap()
        });
        let Expression::Lambda(lambda) = lambda else {
            panic!("expected a lambda");
        };
        assert_eq!(lambda.captures, ["outdoor"]);
        assert_eq!(lambda.return_type, Some(float));
        assert_eq!(lambda.origin, "sensor[0]");
    }

    #[test]
    fn native_pins() {
        let bindings = Bindings::default();
        let rendered = with_context(&bindings, |cx| {
            let pin = Pin {
                inverted: true,
                ..Pin::native(
                    4,
                    PinFlags::init_from_flags([PinFlag::Input, PinFlag::Pullup]),
                )
            };
            let _ = cx.gpio_pin(&pin, "pin").unwrap();
            cx.staged
                .nodes
                .iter()
                .map(|node| node.statement.to_string())
                .collect::<Vec<_>>()
        });
        assert_eq!(
            rendered,
            [
                "esphome::esp32::ESP32InternalGPIOPin *sensor_0_pin = new esphome::esp32::ESP32InternalGPIOPin();",
                "sensor_0_pin->set_pin(4);",
                "sensor_0_pin->set_inverted(true);",
                "sensor_0_pin->set_flags(esphome::gpio::Flags::FLAG_INPUT | esphome::gpio::Flags::FLAG_PULLUP);",
            ]
        );
    }

    #[test]
    fn typed_accessors() {
        let mut config = config_map();
        let _ = config.insert("address".into(), Value::HexInt(0x77));
        let _ = config.insert("name".into(), "Outdoor".into());

        assert_eq!(config.int("address"), Ok(0x77));
        assert_eq!(config.string("name"), Ok("Outdoor"));
        assert_eq!(config.list("filters"), Ok(&[][..]));
        let Err(EmitError::Fail(diagnostic)) = config.bool("name") else {
            panic!("expected a failure");
        };
        assert_eq!(diagnostic.kind, DiagnosticKind::Internal);
        assert_eq!(diagnostic.path.to_string(), "name");
    }

    #[test]
    fn conflicting_defines() {
        let bindings = Bindings::default();
        with_context(&bindings, |cx| {
            cx.add_define("ESPHOME_LOG_LEVEL", Some("ESPHOME_LOG_LEVEL_DEBUG"))
                .unwrap();
            let Err(EmitError::Fail(diagnostic)) =
                cx.add_define("ESPHOME_LOG_LEVEL", Some("ESPHOME_LOG_LEVEL_INFO"))
            else {
                panic!("expected a failure");
            };
            assert_eq!(diagnostic.kind, DiagnosticKind::Emission);
            assert_eq!(diagnostic.path.to_string(), "sensor[0]");
        });
    }
}

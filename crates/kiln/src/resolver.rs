//! Dependency resolution.
//!
//! Resolution turns a document into a [`Plan`] in passes:
//!
//! 1. discovery of component instances, auto-loads, dependencies, conflicts
//!    and target restrictions;
//! 2. validation of every instance against its schema;
//! 3. naming of generated identifiers;
//! 4. binding of identifier references;
//! 5. document-wide final validation.
//!
//! Each pass collects every failure it finds before resolution stops, so a
//! single run reports as many problems as possible. [`Resolver::execute`]
//! then hands the plan to the [`Scheduler`].

use std::sync::Arc;

use hashbrown::DefaultHashBuilder;

use indexmap::{IndexMap, IndexSet};

use tracing::{debug, info, warn};

use crate::codegen::{EmitContext, variable_name};
use crate::component::{Component, ComponentKind};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Error, ErrorKind};
use crate::identifier::{IdRef, Identifier};
use crate::registry::ComponentRegistry;
use crate::scheduler::{Emission, Scheduler};
use crate::schema::{ValidationContext, close_match};
use crate::target::TargetProfile;
use crate::types::TypeRef;
use crate::value::{ConfigMap, Path, Value};

/// A validated component instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Label of the instantiated component.
    pub component: String,
    /// Position in the document.
    pub path: Path,
    /// Validated configuration.
    pub config: ConfigMap,
    /// The identifier declared under `id`, if any.
    pub primary_id: Option<Identifier>,
    /// References to the buses the instance is attached to.
    pub parent_bus_ids: Vec<IdRef>,
    /// Whether the instance was added by another component.
    pub auto_loaded: bool,
    /// Emission priority.
    pub priority: f64,
}

/// The resolved instances of a document in emission order.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    instances: Vec<Instance>,
    warnings: Vec<Diagnostic>,
}

impl Plan {
    /// Returns the instances in emission order.
    #[must_use]
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Returns the instances of a component.
    pub fn instances_of<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a Instance> + 'a {
        self.instances
            .iter()
            .filter(move |instance| instance.component == label)
    }

    /// Returns the warnings found during resolution.
    #[must_use]
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }
}

/// A declared identifier.
#[derive(Debug, Clone)]
struct Symbol {
    ty: TypeRef,
    instance: usize,
}

type Symbols = IndexMap<String, Symbol, DefaultHashBuilder>;

/// Document-wide view offered to final validation hooks.
pub struct FinalContext<'a> {
    instances: &'a [Instance],
    symbols: &'a Symbols,
    target: &'a TargetProfile,
    current: usize,
    warnings: &'a mut Vec<Diagnostic>,
}

impl<'a> FinalContext<'a> {
    /// Returns the selected target.
    #[must_use]
    pub const fn target(&self) -> &'a TargetProfile {
        self.target
    }

    /// Returns the position of the checked instance.
    #[must_use]
    pub fn path(&self) -> &'a Path {
        &self.instances[self.current].path
    }

    /// Returns the configuration of the instance declaring an identifier.
    #[must_use]
    pub fn declaring_config(&self, name: &str) -> Option<&'a ConfigMap> {
        self.symbols
            .get(name)
            .map(|symbol| &self.instances[symbol.instance].config)
    }

    /// Returns the configurations of every instance of a component.
    pub fn component_configs<'b>(&self, label: &'b str) -> impl Iterator<Item = &'a ConfigMap> + 'b
    where
        'a: 'b,
    {
        self.instances
            .iter()
            .filter(move |instance| instance.component == label)
            .map(|instance| &instance.config)
    }

    /// Reports a warning positioned at the checked instance.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warn_at(&Path::root(), message);
    }

    /// Reports a warning positioned under the checked instance.
    pub fn warn_at(&mut self, path: &Path, message: impl Into<String>) {
        let mut path = path.clone();
        path.prepend_path(self.path());
        self.warnings
            .push(Diagnostic::warning(DiagnosticKind::Schema, path, message));
    }
}

// An instance before validation.
struct Candidate<'r> {
    component: &'r Component,
    path: Path,
    raw: Value,
    auto_loaded: bool,
}

/// Resolves documents against a registry for a target.
pub struct Resolver<'a> {
    registry: &'a ComponentRegistry,
    target: &'a TargetProfile,
}

impl<'a> Resolver<'a> {
    /// Creates a [`Resolver`].
    #[must_use]
    pub const fn new(registry: &'a ComponentRegistry, target: &'a TargetProfile) -> Self {
        Self { registry, target }
    }

    /// Resolves a document into a [`Plan`].
    ///
    /// # Errors
    ///
    /// Fails with a [`ErrorKind::Validation`] error carrying every schema,
    /// reference, dependency and platform diagnostic found by the failing
    /// pass.
    pub fn resolve(&self, document: ConfigMap) -> Result<Plan, Error> {
        let mut diagnostics = Vec::new();

        let (candidates, loaded) = self.discover(document, &mut diagnostics);
        info!("Discovered {} component instances", candidates.len());

        let mut instances = self.validate(candidates, &loaded, &mut diagnostics);
        fail_on(diagnostics)?;
        debug!("Validated {} component instances", instances.len());

        let mut diagnostics = Vec::new();
        let symbols = assign_ids(&mut instances, &mut diagnostics);
        bind_references(&mut instances, &symbols, &mut diagnostics);
        fail_on(diagnostics)?;
        debug!("Bound references to {} identifiers", symbols.len());

        let mut warnings = Vec::new();
        self.final_validate(&mut instances, &symbols, &mut warnings)?;
        self.check_pins(&instances, &mut warnings);
        for warning in &warnings {
            warn!("{}: {}", warning.path, warning.message);
        }

        // Stable, so equal priorities keep document order.
        instances.sort_by(|a, b| b.priority.total_cmp(&a.priority));
        info!("Resolved {} component instances", instances.len());
        Ok(Plan {
            instances,
            warnings,
        })
    }

    /// Runs the code-emission function of every planned instance.
    ///
    /// # Errors
    ///
    /// Fails when a job fails or waits for an identifier forever.
    pub fn execute(&self, plan: &Plan) -> Result<Emission, Error> {
        let mut scheduler = Scheduler::new(self.registry, self.target);

        for instance in &plan.instances {
            for id in declared_ids(&instance.config) {
                scheduler.declare(id.name(), &instance.component, &instance.path);
            }
        }

        for instance in &plan.instances {
            let component = self.registry.component(&instance.component).ok_or_else(|| {
                Error::internal(format!("Component `{}` is not registered", instance.component))
            })?;
            let to_code = component.emitter().clone();
            let config = instance.config.clone();
            scheduler.push(
                instance.priority,
                instance.component.clone(),
                &instance.component,
                &instance.path,
                Arc::new(move |cx: &mut EmitContext<'_>| to_code(cx, &config)),
            );
        }

        scheduler.run()?;
        let emission = scheduler.into_emission();
        info!("Emitted {} statements", emission.nodes.len());
        Ok(emission)
    }

    fn discover(
        &self,
        document: ConfigMap,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> (Vec<Candidate<'a>>, IndexSet<String, DefaultHashBuilder>) {
        let mut candidates = Vec::new();
        let mut loaded = IndexSet::with_hasher(DefaultHashBuilder::default());
        // Every loaded component with the position that loaded it.
        let mut anchors: Vec<(&'a Component, Path)> = Vec::new();

        for (key, value) in document {
            let path = Path::root().key(key.as_str());
            let component = match self.registry.component(&key) {
                Some(component) if !matches!(component.kind(), ComponentKind::Platform { .. }) => {
                    component
                }
                _ => {
                    let error = Diagnostic::error(
                        DiagnosticKind::Schema,
                        path,
                        format!("Component not found: {key}"),
                    );
                    diagnostics.push(match close_match(&key, self.registry.top_level()) {
                        Some(candidate) => error.with_hint(format!("did you mean '{candidate}'?")),
                        None => error,
                    });
                    continue;
                }
            };
            if !self.available(component, &path, diagnostics) {
                continue;
            }
            let _ = loaded.insert(key.clone());
            anchors.push((component, path.clone()));

            match component.kind() {
                ComponentKind::Domain => {
                    let items = match value {
                        Value::List(items) => items,
                        Value::Null => Vec::new(),
                        value => vec![value],
                    };
                    for (i, item) in items.into_iter().enumerate() {
                        let path = path.index(i);
                        if let Some(candidate) = self.platform_candidate(&key, item, path, diagnostics) {
                            let _ = loaded.insert(candidate.component.label());
                            let _ = loaded.insert(candidate.component.name().to_string());
                            anchors.push((candidate.component, candidate.path.clone()));
                            candidates.push(candidate);
                        }
                    }
                }
                ComponentKind::TopLevel => {
                    let multi_conf = component.instances();
                    let items = match value {
                        Value::List(items) if multi_conf.is_multi() => items
                            .into_iter()
                            .enumerate()
                            .map(|(i, item)| (path.index(i), item))
                            .collect(),
                        value => vec![(path.clone(), value)],
                    };
                    let total = items.len();
                    for (i, (path, raw)) in items.into_iter().enumerate() {
                        if let Some(limit) = multi_conf.limit()
                            && i >= limit
                        {
                            diagnostics.push(Diagnostic::error(
                                DiagnosticKind::Schema,
                                path,
                                format!(
                                    "Component `{key}` allows at most {limit} instances, found {total}"
                                ),
                            ));
                            break;
                        }
                        candidates.push(Candidate {
                            component,
                            path,
                            raw,
                            auto_loaded: false,
                        });
                    }
                }
                ComponentKind::Platform { .. } => {}
            }
        }

        // Auto-loads, transitively. Each anchor is visited once.
        let mut next = 0;
        while next < anchors.len() {
            let (component, path) = anchors[next].clone();
            next += 1;
            for name in component.auto_loaded() {
                if loaded.contains(name) {
                    continue;
                }
                let Some(auto) = self.registry.component(name) else {
                    continue;
                };
                let _ = loaded.insert(name.clone());
                if let Err(message) = auto.target_constraints().check(self.target) {
                    diagnostics.push(Diagnostic::error(
                        DiagnosticKind::Platform,
                        path.clone(),
                        format!(
                            "Component `{name}` loaded by `{}` is not available: {message}",
                            component.name()
                        ),
                    ));
                    continue;
                }
                debug!("Auto-loading `{name}` for `{}`", component.label());
                let auto_path = Path::root().key(name.as_str());
                anchors.push((auto, auto_path.clone()));
                if matches!(auto.kind(), ComponentKind::TopLevel) {
                    candidates.push(Candidate {
                        component: auto,
                        path: auto_path,
                        raw: Value::Null,
                        auto_loaded: true,
                    });
                }
            }
        }

        for (component, path) in &anchors {
            for dependency in component.required() {
                if !loaded.contains(dependency) {
                    diagnostics.push(Diagnostic::error(
                        DiagnosticKind::Dependency,
                        path.clone(),
                        format!(
                            "component `{dependency}` required by `{}` not configured",
                            component.name()
                        ),
                    ));
                }
            }
            for conflict in component.conflicts() {
                if loaded.contains(conflict) {
                    diagnostics.push(Diagnostic::error(
                        DiagnosticKind::Dependency,
                        path.clone(),
                        format!(
                            "component `{}` cannot be used together with `{conflict}`",
                            component.name()
                        ),
                    ));
                }
            }
        }

        if let Some(core) = self.registry.core_component()
            && !loaded.contains(core.name())
        {
            let name = core.name();
            diagnostics.push(Diagnostic::error(
                DiagnosticKind::Dependency,
                Path::root(),
                format!(
                    "'{name}' section missing from configuration. Please make sure your configuration has an '{name}:' line in it."
                ),
            ));
        }

        (candidates, loaded)
    }

    // Reports whether the component can be used on the target.
    fn available(&self, component: &Component, path: &Path, diagnostics: &mut Vec<Diagnostic>) -> bool {
        match component.target_constraints().check(self.target) {
            Ok(()) => true,
            Err(message) => {
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::Platform,
                    path.clone(),
                    format!("Component `{}` is not available: {message}", component.label()),
                ));
                false
            }
        }
    }

    fn platform_candidate(
        &self,
        domain: &str,
        item: Value,
        path: Path,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<Candidate<'a>> {
        let Value::Map(mut map) = item else {
            diagnostics.push(Diagnostic::error(
                DiagnosticKind::Schema,
                path,
                format!("expected a dictionary, got {}", item.kind_name()),
            ));
            return None;
        };
        let name = match map.shift_remove("platform") {
            Some(Value::String(name)) => name,
            Some(value) => {
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::Schema,
                    path.key("platform"),
                    format!("expected a platform name, got {}", value.kind_name()),
                ));
                return None;
            }
            None => {
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::Schema,
                    path.key("platform"),
                    "required key not provided",
                ));
                return None;
            }
        };

        let Some(component) = self.registry.platform(domain, &name) else {
            let error = Diagnostic::error(
                DiagnosticKind::Schema,
                path.key("platform"),
                format!("Platform not found: '{domain}.{name}'"),
            );
            diagnostics.push(match close_match(&name, self.registry.platforms(domain)) {
                Some(candidate) => error.with_hint(format!("did you mean '{candidate}'?")),
                None => error,
            });
            return None;
        };
        if !self.available(component, &path, diagnostics) {
            return None;
        }
        Some(Candidate {
            component,
            path,
            raw: Value::Map(map),
            auto_loaded: false,
        })
    }

    fn validate(
        &self,
        candidates: Vec<Candidate<'a>>,
        loaded: &IndexSet<String, DefaultHashBuilder>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<Instance> {
        let mut instances = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let mut cx = ValidationContext::new(self.target, self.registry, loaded);
            cx.enter_component(candidate.component.name());

            let config = match candidate.component.instance_schema().validate(candidate.raw, &mut cx) {
                Ok(Value::Map(config)) => config,
                Ok(Value::Null) => ConfigMap::default(),
                Ok(value) => {
                    diagnostics.push(Diagnostic::error(
                        DiagnosticKind::Internal,
                        candidate.path,
                        format!(
                            "The schema of `{}` produced {} instead of a dictionary",
                            candidate.component.label(),
                            value.kind_name()
                        ),
                    ));
                    continue;
                }
                Err(invalid) => {
                    diagnostics.extend(invalid.into_diagnostics(&candidate.path));
                    continue;
                }
            };
            instances.push(Instance {
                component: candidate.component.label(),
                path: candidate.path,
                config,
                primary_id: None,
                parent_bus_ids: Vec::new(),
                auto_loaded: candidate.auto_loaded,
                priority: candidate.component.emission_priority(),
            });
        }
        instances
    }

    fn final_validate(
        &self,
        instances: &mut [Instance],
        symbols: &Symbols,
        warnings: &mut Vec<Diagnostic>,
    ) -> Result<(), Error> {
        let snapshot = instances.to_vec();
        let mut diagnostics = Vec::new();

        for (index, instance) in instances.iter_mut().enumerate() {
            let Some(check) = self
                .registry
                .component(&instance.component)
                .and_then(Component::final_check)
            else {
                continue;
            };

            let mut config = instance.config.clone();
            let mut cx = FinalContext {
                instances: &snapshot,
                symbols,
                target: self.target,
                current: index,
                warnings: &mut *warnings,
            };
            match check(&mut config, &mut cx) {
                Ok(()) => {
                    if id_signature(&config) != id_signature(&instance.config) {
                        return Err(Error::internal(format!(
                            "Final validation of `{}` changed its identifiers",
                            instance.component
                        )));
                    }
                    instance.config = config;
                }
                Err(invalid) => diagnostics.extend(invalid.into_diagnostics(&instance.path)),
            }
        }
        fail_on(diagnostics)
    }

    fn check_pins(&self, instances: &[Instance], warnings: &mut Vec<Diagnostic>) {
        let mut lines: IndexMap<(Option<String>, u32), Path, DefaultHashBuilder> =
            IndexMap::with_hasher(DefaultHashBuilder::default());

        for instance in instances {
            walk_config(&instance.path, &instance.config, &mut |path, value| {
                let Value::Pin(pin) = value else {
                    return;
                };
                if pin.is_native() && self.target.pins.is_strapping(pin.number) {
                    warnings.push(Diagnostic::warning(
                        DiagnosticKind::Platform,
                        path.clone(),
                        format!(
                            "GPIO{} is a strapping PIN and should only be used for I/O with care.",
                            pin.number
                        ),
                    ));
                }
                let (provider, number) = pin.line();
                let line = (provider.map(str::to_string), number);
                match lines.get(&line) {
                    Some(first) => warnings.push(Diagnostic::warning(
                        DiagnosticKind::Platform,
                        path.clone(),
                        format!("{pin} is also used at {first}"),
                    )),
                    None => {
                        let _ = lines.insert(line, path.clone());
                    }
                }
            });
        }
    }
}

fn fail_on(diagnostics: Vec<Diagnostic>) -> Result<(), Error> {
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(Error::with_diagnostics(
            ErrorKind::Validation,
            "Invalid configuration",
            diagnostics,
        ))
    }
}

fn walk_config<'a>(path: &Path, config: &'a ConfigMap, visit: &mut dyn FnMut(&Path, &'a Value)) {
    for (key, value) in config {
        value.walk(&path.key(key.as_str()), visit);
    }
}

fn walk_config_mut(path: &Path, config: &mut ConfigMap, visit: &mut dyn FnMut(&Path, &mut Value)) {
    for (key, value) in config.iter_mut() {
        value.walk_mut(&path.key(key.as_str()), visit);
    }
}

fn declared_ids(config: &ConfigMap) -> Vec<&Identifier> {
    let mut ids = Vec::new();
    walk_config(&Path::root(), config, &mut |_, value| {
        if let Value::Id(id) = value {
            ids.push(id);
        }
    });
    ids
}

fn id_signature(config: &ConfigMap) -> Vec<(String, String)> {
    declared_ids(config)
        .into_iter()
        .map(|id| (id.name().to_string(), id.declared_type().to_string()))
        .collect()
}

// Registers manual identifiers, then names pending ones `{base}_{n}` with
// the lowest free `n`.
fn assign_ids(instances: &mut [Instance], diagnostics: &mut Vec<Diagnostic>) -> Symbols {
    let mut symbols = Symbols::with_hasher(DefaultHashBuilder::default());
    // Pin objects are declared under names derived from their position.
    let mut pins: IndexMap<String, Path, DefaultHashBuilder> =
        IndexMap::with_hasher(DefaultHashBuilder::default());

    for instance in instances.iter() {
        walk_config(&instance.path, &instance.config, &mut |path, value| {
            if let Value::Pin(_) = value {
                let _ = pins.insert(variable_name(path), path.clone());
            }
        });
    }

    for (index, instance) in instances.iter().enumerate() {
        walk_config(&instance.path, &instance.config, &mut |path, value| {
            let Value::Id(id) = value else {
                return;
            };
            if id.is_pending() {
                return;
            }
            if let Some(pin) = pins.get(id.name()) {
                diagnostics.push(
                    Diagnostic::error(
                        DiagnosticKind::Reference,
                        path.clone(),
                        format!("ID {} is reserved for the pin {pin}", id.name()),
                    )
                    .with_hint("pick another ID"),
                );
                return;
            }
            if symbols.contains_key(id.name()) {
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::Reference,
                    path.clone(),
                    format!("ID {} redefined!", id.name()),
                ));
                return;
            }
            let _ = symbols.insert(
                id.name().to_string(),
                Symbol {
                    ty: id.declared_type().clone(),
                    instance: index,
                },
            );
        });
    }

    let mut counters: IndexMap<String, usize, DefaultHashBuilder> =
        IndexMap::with_hasher(DefaultHashBuilder::default());
    for (index, instance) in instances.iter_mut().enumerate() {
        let Instance { path, config, .. } = &mut *instance;
        walk_config_mut(path, config, &mut |_, value| {
            let Value::Id(id) = value else {
                return;
            };
            if !id.is_pending() {
                return;
            }
            let base = id.name().to_string();
            let counter = counters.entry(base.clone()).or_default();
            let name = loop {
                let name = format!("{base}_{counter}");
                *counter += 1;
                if !symbols.contains_key(&name) && !pins.contains_key(&name) {
                    break name;
                }
            };
            id.assign(name.clone());
            let _ = symbols.insert(
                name,
                Symbol {
                    ty: id.declared_type().clone(),
                    instance: index,
                },
            );
        });
        instance.primary_id = instance.config.get("id").and_then(Value::as_id).cloned();
    }

    symbols
}

fn bind_references(instances: &mut [Instance], symbols: &Symbols, diagnostics: &mut Vec<Diagnostic>) {
    for instance in instances.iter_mut() {
        let Instance { path, config, .. } = &mut *instance;
        walk_config_mut(path, config, &mut |path, value| match value {
            Value::IdRef(reference) => bind(reference, path, symbols, diagnostics),
            Value::Pin(pin) => {
                if let Some(provider) = &mut pin.provider {
                    bind(provider, path, symbols, diagnostics);
                }
            }
            Value::Lambda(lambda) => {
                for name in lambda.referenced_ids() {
                    if !symbols.contains_key(name) {
                        diagnostics.push(missing_id(name, path, symbols));
                    }
                }
            }
            _ => {}
        });

        instance.parent_bus_ids = instance
            .config
            .iter()
            .filter(|(key, _)| key.ends_with("_id"))
            .filter_map(|(_, value)| value.as_id_ref().cloned())
            .collect();
    }
}

fn bind(reference: &mut IdRef, path: &Path, symbols: &Symbols, diagnostics: &mut Vec<Diagnostic>) {
    if reference.is_auto() {
        let candidates: Vec<&str> = symbols
            .iter()
            .filter(|(_, symbol)| symbol.ty.is_subtype_of(&reference.required_type))
            .map(|(name, _)| name.as_str())
            .collect();
        match candidates.as_slice() {
            [name] => reference.name = (*name).to_string(),
            [] => diagnostics.push(Diagnostic::error(
                DiagnosticKind::Reference,
                path.clone(),
                format!(
                    "Couldn't find any component that can be used for '{}'. Are you missing a hub declaration?",
                    reference.required_type
                ),
            )),
            names => diagnostics.push(
                Diagnostic::error(
                    DiagnosticKind::Reference,
                    path.clone(),
                    format!(
                        "Too many candidates found for '{}': {}",
                        reference.required_type,
                        names.join(", ")
                    ),
                )
                .with_hint("specify the ID to use"),
            ),
        }
        return;
    }

    match symbols.get(&reference.name) {
        None => diagnostics.push(missing_id(&reference.name, path, symbols)),
        Some(symbol) if !symbol.ty.is_subtype_of(&reference.required_type) => {
            diagnostics.push(Diagnostic::error(
                DiagnosticKind::Reference,
                path.clone(),
                format!(
                    "ID '{}' of type {} doesn't inherit from {}. Please double check your ID is pointing to the correct value",
                    reference.name, symbol.ty, reference.required_type
                ),
            ));
        }
        Some(_) => {}
    }
}

fn missing_id(name: &str, path: &Path, symbols: &Symbols) -> Diagnostic {
    let error = Diagnostic::error(
        DiagnosticKind::Reference,
        path.clone(),
        format!(
            "Couldn't find ID '{name}'. Please check you have defined an ID with that name in your configuration."
        ),
    );
    match close_match(name, symbols.keys().map(String::as_str)) {
        Some(candidate) => error.with_hint(format!("did you mean '{candidate}'?")),
        None => error,
    }
}

#[cfg(test)]
mod tests {
    use crate::codegen::ConfigExt;
    use crate::component::{Component, MultiConf};
    use crate::diagnostics::{DiagnosticKind, ErrorKind, Severity};
    use crate::document::Document;
    use crate::registry::ComponentRegistry;
    use crate::scheduler::priority;
    use crate::identifier::Identifier;
    use crate::schema::{Invalid, Schema, declare_id, gpio_output_pin, lambda_, string, use_id};
    use crate::target::{Constraints, Platform, TargetProfile};
    use crate::types::TypeRegistry;
    use crate::value::Value;

    use super::{Plan, Resolver};

    fn registry() -> ComponentRegistry {
        let types = TypeRegistry::new();
        let bus = types.namespace("i2c").class_("I2CBus", &[]);
        let component = types.namespace("esphome").class_("Component", &[]);
        let int = types.global().primitive("int");
        let bmp280 = types
            .namespace("bmp280")
            .class_("BMP280Component", &[&component]);
        let relay = types.namespace("gpio").class_("GPIOSwitch", &[&component]);

        let mut registry = ComponentRegistry::new(types);
        registry.register(
            Component::new("esphome")
                .priority(priority::CORE)
                .schema(Schema::new().required("name", string())),
        );
        registry.set_core("esphome");
        registry.register(
            Component::new("i2c")
                .multi_conf(MultiConf::Limited(2))
                .priority(priority::BUS)
                .schema(Schema::new().generated("id", declare_id(bus.clone())))
                .to_code(|cx, config| {
                    let _ = cx.new_pvariable(config.id()?, Vec::new())?;
                    Ok(())
                }),
        );
        registry.register(Component::domain("sensor"));
        registry.register(
            Component::platform("sensor", "bmp280")
                .dependencies(&["i2c"])
                .schema(
                    Schema::new()
                        .generated("id", declare_id(bmp280.clone()))
                        .generated("i2c_id", use_id(bus.clone()))
                        .optional("lambda", lambda_()),
                )
                .to_code(|cx, config| {
                    let bus = cx.get_reference(config.id_ref("i2c_id")?)?;
                    let _ = cx.new_pvariable(config.id()?, vec![bus])?;
                    Ok(())
                }),
        );
        registry.register(Component::new("network"));
        registry.register(
            Component::new("wifi")
                .auto_load(&["network"])
                .conflicts_with(&["ethernet"]),
        );
        registry.register(Component::new("ethernet"));
        registry.register(
            Component::new("esp32_ble_tracker")
                .constraints(Constraints::new().platforms(&[Platform::Esp32])),
        );
        registry.register(Component::domain("switch"));
        registry.register(
            Component::platform("switch", "gpio").schema(
                Schema::new()
                    .generated("id", declare_id(relay))
                    .required("pin", gpio_output_pin())
                    .optional("name", string()),
            ),
        );
        registry.register(
            Component::new("labels")
                .schema(Schema::new().optional("component", use_id(component)))
                .final_validate(|config, cx| {
                    let Some(Value::IdRef(reference)) = config.get("component") else {
                        return Ok(());
                    };
                    if cx.declaring_config(&reference.name).is_none() {
                        return Err(Invalid::new("unknown declaration").key("component"));
                    }
                    cx.warn("labels are experimental");
                    let _ = config.insert("checked".into(), Value::Bool(true));
                    Ok(())
                }),
        );
        registry.register(Component::new("renamer").final_validate(move |config, _cx| {
            let _ = config.insert("id".into(), Value::Id(Identifier::manual("sneaky", int.clone())));
            Ok(())
        }));
        registry.finish().unwrap();
        registry
    }

    fn resolve_on(target: &str, text: &str) -> Result<Plan, crate::diagnostics::Error> {
        let registry = registry();
        let target = TargetProfile::lookup(target).unwrap();
        let document = Document::parse(text).unwrap();
        Resolver::new(&registry, &target).resolve(document.into_root())
    }

    fn resolve(text: &str) -> Result<Plan, crate::diagnostics::Error> {
        resolve_on("esp32-arduino", text)
    }

    fn labels(plan: &Plan) -> Vec<&str> {
        plan.instances()
            .iter()
            .map(|instance| instance.component.as_str())
            .collect()
    }

    #[test]
    fn plans_in_priority_order() {
        let plan = resolve("sensor:\n  - platform: bmp280\ni2c:\nesphome:\n  name: node\n").unwrap();
        assert_eq!(labels(&plan), ["esphome", "i2c", "sensor.bmp280"]);

        let sensor = &plan.instances()[2];
        assert_eq!(sensor.path.to_string(), "sensor[0]");
        assert_eq!(sensor.primary_id.as_ref().unwrap().name(), "bmp280_component_0");
        assert_eq!(sensor.parent_bus_ids.len(), 1);
        assert_eq!(sensor.parent_bus_ids[0].name, "i2c_bus_0");
        assert!(!sensor.config.contains_key("platform"));
        assert!(plan.warnings().is_empty());
    }

    #[test]
    fn generated_names_skip_manual_ones() {
        let plan = resolve(
            "esphome:\n  name: node\ni2c:\n  - id: i2c_bus_0\n  - {}\nsensor:\n  - platform: bmp280\n    i2c_id: i2c_bus_0\n",
        )
        .unwrap();
        let buses: Vec<&str> = plan
            .instances_of("i2c")
            .map(|instance| instance.primary_id.as_ref().unwrap().name())
            .collect();
        assert_eq!(buses, ["i2c_bus_0", "i2c_bus_1"]);
    }

    #[test]
    fn missing_dependencies() {
        let error = resolve("esphome:\n  name: node\nsensor:\n  - platform: bmp280\n").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);
        let diagnostic = &error.diagnostics()[0];
        assert_eq!(diagnostic.kind, DiagnosticKind::Dependency);
        assert_eq!(diagnostic.path.to_string(), "sensor[0]");
        assert_eq!(diagnostic.message, "component `i2c` required by `bmp280` not configured");

        let error = resolve("i2c:\n").unwrap_err();
        assert!(error.diagnostics()[0].message.starts_with("'esphome' section missing"));
    }

    #[test]
    fn discovery_failures_are_collected() {
        let error = resolve(
            "esphome:\n  name: node\nsensr:\nsensor:\n  - platform: bmp28\nwifi:\nethernet:\n",
        )
        .unwrap_err();
        let diagnostics = error.diagnostics();
        assert_eq!(diagnostics.len(), 3);

        assert_eq!(diagnostics[0].message, "Component not found: sensr");
        assert_eq!(diagnostics[0].hint.as_deref(), Some("did you mean 'sensor'?"));

        assert_eq!(diagnostics[1].path.to_string(), "sensor[0].platform");
        assert_eq!(diagnostics[1].hint.as_deref(), Some("did you mean 'bmp280'?"));

        assert_eq!(diagnostics[2].kind, DiagnosticKind::Dependency);
        assert_eq!(
            diagnostics[2].message,
            "component `wifi` cannot be used together with `ethernet`"
        );
    }

    #[test]
    fn auto_loads() {
        let plan = resolve("esphome:\n  name: node\nwifi:\n").unwrap();
        let network = plan.instances_of("network").next().unwrap();
        assert!(network.auto_loaded);
        assert_eq!(network.path.to_string(), "network");
        assert!(!plan.instances_of("wifi").next().unwrap().auto_loaded);
    }

    #[test]
    fn instance_limits() {
        let error = resolve("esphome:\n  name: node\ni2c:\n  - {}\n  - {}\n  - {}\n").unwrap_err();
        assert_eq!(error.diagnostics().len(), 1);
        assert_eq!(error.diagnostics()[0].path.to_string(), "i2c[2]");
        assert_eq!(
            error.diagnostics()[0].message,
            "Component `i2c` allows at most 2 instances, found 3"
        );
    }

    #[test]
    fn target_restrictions() {
        let text = "esphome:\n  name: node\nesp32_ble_tracker:\n";
        assert!(resolve(text).is_ok());

        let error = resolve_on("rp2040-arduino", text).unwrap_err();
        let diagnostic = &error.diagnostics()[0];
        assert_eq!(diagnostic.kind, DiagnosticKind::Platform);
        assert_eq!(diagnostic.path.to_string(), "esp32_ble_tracker");
    }

    #[test]
    fn reference_failures() {
        let error = resolve(
            "esphome:\n  name: node\ni2c:\n  id: bus\nsensor:\n  - platform: bmp280\n    id: outdoor\n    i2c_id: buss\n  - platform: bmp280\n    i2c_id: outdoor\n    lambda: !lambda return id(indoor).state;\n  - platform: bmp280\n    id: outdoor\n",
        )
        .unwrap_err();
        let messages: Vec<(String, &str)> = error
            .diagnostics()
            .iter()
            .map(|diagnostic| (diagnostic.path.to_string(), diagnostic.message.as_str()))
            .collect();
        assert_eq!(
            messages,
            [
                ("sensor[2].id".to_string(), "ID outdoor redefined!"),
                (
                    "sensor[0].i2c_id".to_string(),
                    "Couldn't find ID 'buss'. Please check you have defined an ID with that name in your configuration."
                ),
                (
                    "sensor[1].i2c_id".to_string(),
                    "ID 'outdoor' of type bmp280::BMP280Component doesn't inherit from i2c::I2CBus. Please double check your ID is pointing to the correct value"
                ),
                (
                    "sensor[1].lambda".to_string(),
                    "Couldn't find ID 'indoor'. Please check you have defined an ID with that name in your configuration."
                ),
            ]
        );
        assert_eq!(error.diagnostics()[1].hint.as_deref(), Some("did you mean 'bus'?"));
    }

    #[test]
    fn ambiguous_references() {
        let error = resolve(
            "esphome:\n  name: node\ni2c:\n  - id: a\n  - id: b\nsensor:\n  - platform: bmp280\n",
        )
        .unwrap_err();
        assert_eq!(
            error.diagnostics()[0].message,
            "Too many candidates found for 'i2c::I2CBus': a, b"
        );
    }

    #[test]
    fn final_validation() {
        let plan = resolve("esphome:\n  name: node\ni2c:\n  id: bus\nlabels:\n  component: bus\n");
        // `bus` is an I2CBus, which is not a Component.
        assert_eq!(
            plan.unwrap_err().diagnostics()[0].kind,
            DiagnosticKind::Reference
        );

        let plan = resolve(
            "esphome:\n  name: node\ni2c:\nsensor:\n  - platform: bmp280\n    id: outdoor\nlabels:\n  component: outdoor\n",
        )
        .unwrap();
        let labels = plan.instances_of("labels").next().unwrap();
        assert_eq!(labels.config["checked"], Value::Bool(true));
        assert_eq!(plan.warnings()[0].message, "labels are experimental");
        assert_eq!(plan.warnings()[0].path.to_string(), "labels");
        assert_eq!(plan.warnings()[0].severity, Severity::Warning);

        let error = resolve("esphome:\n  name: node\nrenamer:\n").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Internal);
    }

    #[test]
    fn pin_warnings() {
        let plan = resolve(
            "esphome:\n  name: node\nswitch:\n  - platform: gpio\n    pin: GPIO0\n  - platform: gpio\n    pin: 0\n",
        )
        .unwrap();
        let messages: Vec<(String, &str)> = plan
            .warnings()
            .iter()
            .map(|warning| (warning.path.to_string(), warning.message.as_str()))
            .collect();
        assert_eq!(
            messages,
            [
                (
                    "switch[0].pin".to_string(),
                    "GPIO0 is a strapping PIN and should only be used for I/O with care."
                ),
                (
                    "switch[1].pin".to_string(),
                    "GPIO0 is a strapping PIN and should only be used for I/O with care."
                ),
                ("switch[1].pin".to_string(), "GPIO0 is also used at switch[0].pin"),
            ]
        );
    }

    #[test]
    fn execution() {
        let registry = registry();
        let target = TargetProfile::lookup("esp32-arduino").unwrap();
        let resolver = Resolver::new(&registry, &target);
        let document =
            Document::parse("sensor:\n  - platform: bmp280\n    id: outdoor\ni2c:\nesphome:\n  name: node\n")
                .unwrap();
        let plan = resolver.resolve(document.into_root()).unwrap();
        let emission = resolver.execute(&plan).unwrap();

        let rendered: Vec<String> = emission
            .nodes
            .iter()
            .map(|node| node.statement.to_string())
            .collect();
        assert_eq!(
            rendered,
            [
                "i2c::I2CBus *i2c_bus_0 = new i2c::I2CBus();",
                "bmp280::BMP280Component *outdoor = new bmp280::BMP280Component(i2c_bus_0);",
            ]
        );
        assert_eq!(emission.nodes[1].origin, "sensor.bmp280");
        assert!(emission.bindings.contains_key("outdoor"));
    }
}

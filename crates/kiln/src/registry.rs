use hashbrown::DefaultHashBuilder;

use indexmap::{IndexMap, IndexSet};

use crate::automation::{ActionDescriptor, ConditionDescriptor, register_builtins};
use crate::component::{Component, ComponentKind, PinProvider};
use crate::diagnostics::{Error, ErrorKind};
use crate::types::{CoreTypes, TypeRegistry};

/// The catalog of available components, actions, and conditions.
///
/// The registry is built once at startup. Components receive the
/// [`TypeRegistry`] through [`ComponentRegistry::types`] when they build
/// their types, and [`ComponentRegistry::finish`] checks the declared
/// relations once every component is registered.
pub struct ComponentRegistry {
    types: TypeRegistry,
    core: CoreTypes,
    components: IndexMap<String, Component, DefaultHashBuilder>,
    actions: IndexMap<String, ActionDescriptor, DefaultHashBuilder>,
    conditions: IndexMap<String, ConditionDescriptor, DefaultHashBuilder>,
    core_component: Option<String>,
}

impl ComponentRegistry {
    /// Creates a [`ComponentRegistry`] holding the built-in actions and
    /// conditions.
    #[must_use]
    pub fn new(types: TypeRegistry) -> Self {
        let core = CoreTypes::new(&types);
        let mut registry = Self {
            types,
            core,
            components: IndexMap::with_hasher(DefaultHashBuilder::default()),
            actions: IndexMap::with_hasher(DefaultHashBuilder::default()),
            conditions: IndexMap::with_hasher(DefaultHashBuilder::default()),
            core_component: None,
        };
        register_builtins(&mut registry);
        registry
    }

    /// Returns the type registry.
    #[must_use]
    pub const fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Returns the shared types.
    #[must_use]
    pub const fn core(&self) -> &CoreTypes {
        &self.core
    }

    /// Registers a component.
    ///
    /// Registering a component twice keeps the first registration.
    pub fn register(&mut self, component: Component) {
        let label = component.label();
        if self.components.contains_key(&label) {
            tracing::debug!("Component `{label}` is already registered");
            return;
        }
        let _ = self.components.insert(label, component);
    }

    /// Registers an action.
    ///
    /// Registering an action twice keeps the first registration.
    pub fn register_action(&mut self, action: ActionDescriptor) {
        if self.actions.contains_key(&action.name) {
            tracing::debug!("Action `{}` is already registered", action.name);
            return;
        }
        let _ = self.actions.insert(action.name.clone(), action);
    }

    /// Registers a condition.
    ///
    /// Registering a condition twice keeps the first registration.
    pub fn register_condition(&mut self, condition: ConditionDescriptor) {
        if self.conditions.contains_key(&condition.name) {
            tracing::debug!("Condition `{}` is already registered", condition.name);
            return;
        }
        let _ = self.conditions.insert(condition.name.clone(), condition);
    }

    /// Marks a top-level component as the one every document must hold.
    pub fn set_core(&mut self, name: &str) {
        self.core_component = Some(name.to_string());
    }

    /// Returns the component every document must hold.
    #[must_use]
    pub fn core_component(&self) -> Option<&Component> {
        self.core_component
            .as_deref()
            .and_then(|name| self.components.get(name))
    }

    /// Returns a component by label.
    #[must_use]
    pub fn component(&self, label: &str) -> Option<&Component> {
        self.components.get(label)
    }

    /// Returns a platform of a domain.
    #[must_use]
    pub fn platform(&self, domain: &str, name: &str) -> Option<&Component> {
        self.components.get(&format!("{domain}.{name}"))
    }

    /// Returns the platform names of a domain.
    pub fn platforms<'a>(&'a self, domain: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.components
            .values()
            .filter(move |component| component.domain_name() == Some(domain))
            .map(Component::name)
    }

    /// Returns the names usable as top-level keys.
    pub fn top_level(&self) -> impl Iterator<Item = &str> {
        self.components
            .iter()
            .filter(|(_, component)| !matches!(component.kind(), ComponentKind::Platform { .. }))
            .map(|(label, _)| label.as_str())
    }

    /// Returns every component.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    /// Returns the pins offered by GPIO expanders.
    pub fn pin_providers(&self) -> impl Iterator<Item = &PinProvider> {
        self.components.values().filter_map(Component::pins)
    }

    /// Returns an action by name.
    #[must_use]
    pub fn action(&self, name: &str) -> Option<&ActionDescriptor> {
        self.actions.get(name)
    }

    /// Returns the action names.
    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    /// Returns a condition by name.
    #[must_use]
    pub fn condition(&self, name: &str) -> Option<&ConditionDescriptor> {
        self.conditions.get(name)
    }

    /// Returns the condition names.
    pub fn conditions(&self) -> impl Iterator<Item = &str> {
        self.conditions.keys().map(String::as_str)
    }

    /// Checks the relations between registered components.
    ///
    /// # Errors
    ///
    /// Fails when a component refers to an unregistered component, a
    /// platform belongs to an unregistered domain, or dependencies and
    /// auto-loads form a cycle.
    pub fn finish(&self) -> Result<(), Error> {
        if let Some(name) = &self.core_component
            && !self.components.contains_key(name)
        {
            return Err(Error::new(
                ErrorKind::Internal,
                format!("Core component `{name}` is not registered"),
            ));
        }

        for (label, component) in &self.components {
            if let Some(domain) = component.domain_name()
                && !matches!(
                    self.components.get(domain).map(Component::kind),
                    Some(ComponentKind::Domain)
                )
            {
                return Err(Error::new(
                    ErrorKind::Internal,
                    format!("Platform `{label}` belongs to unregistered domain `{domain}`"),
                ));
            }
            let related = component
                .required()
                .iter()
                .chain(component.auto_loaded())
                .chain(component.conflicts());
            for name in related {
                if !self.components.contains_key(name) {
                    return Err(Error::new(
                        ErrorKind::Internal,
                        format!("Component `{label}` refers to unregistered component `{name}`"),
                    ));
                }
            }
        }

        let mut done = IndexSet::with_hasher(DefaultHashBuilder::default());
        for label in self.components.keys() {
            let mut stack = Vec::new();
            self.visit(label, &mut stack, &mut done)?;
        }

        tracing::debug!(
            "Registry holds {} components, {} actions, {} conditions",
            self.components.len(),
            self.actions.len(),
            self.conditions.len()
        );
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        label: &'a str,
        stack: &mut Vec<&'a str>,
        done: &mut IndexSet<&'a str, DefaultHashBuilder>,
    ) -> Result<(), Error> {
        if done.contains(label) {
            return Ok(());
        }
        if let Some(position) = stack.iter().position(|entry| *entry == label) {
            let mut cycle = stack[position..].to_vec();
            cycle.push(label);
            return Err(Error::new(
                ErrorKind::Internal,
                format!("Dependency cycle between components: {}", cycle.join(" -> ")),
            ));
        }
        let Some(component) = self.components.get(label) else {
            return Ok(());
        };

        stack.push(label);
        for next in component.required().iter().chain(component.auto_loaded()) {
            self.visit(next, stack, done)?;
        }
        let _ = stack.pop();
        let _ = done.insert(label);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::component::Component;
    use crate::diagnostics::ErrorKind;
    use crate::types::TypeRegistry;

    use super::ComponentRegistry;

    #[test]
    fn lookups() {
        let mut registry = ComponentRegistry::new(TypeRegistry::new());
        registry.register(Component::new("i2c"));
        registry.register(Component::domain("sensor"));
        registry.register(Component::platform("sensor", "bmp280").dependencies(&["i2c"]));
        registry.register(Component::platform("sensor", "dht"));
        // Idempotent.
        registry.register(Component::new("i2c").dependencies(&["missing"]));
        registry.set_core("i2c");

        assert!(registry.finish().is_ok());
        assert_eq!(registry.core_component().map(Component::label), Some("i2c".into()));
        assert_eq!(
            registry.platform("sensor", "bmp280").map(Component::label),
            Some("sensor.bmp280".into())
        );
        assert_eq!(registry.platforms("sensor").collect::<Vec<_>>(), ["bmp280", "dht"]);
        assert_eq!(registry.top_level().collect::<Vec<_>>(), ["i2c", "sensor"]);
        assert!(registry.action("delay").is_some());
        assert!(registry.condition("lambda").is_some());
        assert_eq!(registry.pin_providers().count(), 0);
    }

    #[test]
    fn unknown_relations() {
        let mut registry = ComponentRegistry::new(TypeRegistry::new());
        registry.register(Component::new("wifi").auto_load(&["network"]));
        let error = registry.finish().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Internal);
        assert_eq!(
            error.description(),
            "Component `wifi` refers to unregistered component `network`"
        );

        let mut registry = ComponentRegistry::new(TypeRegistry::new());
        registry.register(Component::platform("sensor", "dht"));
        assert!(registry.finish().unwrap_err().description().contains("unregistered domain"));
    }

    #[test]
    fn cycles() {
        let mut registry = ComponentRegistry::new(TypeRegistry::new());
        registry.register(Component::new("a").dependencies(&["b"]));
        registry.register(Component::new("b").auto_load(&["c"]));
        registry.register(Component::new("c").dependencies(&["a"]));

        let error = registry.finish().unwrap_err();
        assert_eq!(error.description(), "Dependency cycle between components: a -> b -> c -> a");
    }
}

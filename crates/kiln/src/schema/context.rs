use hashbrown::DefaultHashBuilder;

use indexmap::IndexSet;

use crate::ir::Parameter;
use crate::registry::ComponentRegistry;
use crate::target::TargetProfile;
use crate::types::{CoreTypes, TypeRef, snake_case};

/// State visible to validators.
pub struct ValidationContext<'a> {
    target: &'a TargetProfile,
    registry: &'a ComponentRegistry,
    loaded: &'a IndexSet<String, DefaultHashBuilder>,
    component: String,
    args: Vec<Vec<Parameter>>,
}

impl<'a> ValidationContext<'a> {
    /// Creates a [`ValidationContext`].
    #[must_use]
    pub fn new(
        target: &'a TargetProfile,
        registry: &'a ComponentRegistry,
        loaded: &'a IndexSet<String, DefaultHashBuilder>,
    ) -> Self {
        Self {
            target,
            registry,
            loaded,
            component: String::new(),
            args: Vec::new(),
        }
    }

    /// Sets the component whose instance is being validated.
    pub fn enter_component(&mut self, name: &str) {
        self.component = name.to_string();
        self.args.clear();
    }

    /// Returns the selected target.
    #[must_use]
    pub const fn target(&self) -> &'a TargetProfile {
        self.target
    }

    /// Returns the component registry.
    #[must_use]
    pub const fn registry(&self) -> &'a ComponentRegistry {
        self.registry
    }

    /// Returns the shared types.
    #[must_use]
    pub fn core(&self) -> &'a CoreTypes {
        self.registry.core()
    }

    /// Returns the name of the component being validated.
    #[must_use]
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Whether a component is part of the document.
    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains(name)
    }

    /// Returns the names of the components in the document.
    pub fn loaded(&self) -> impl Iterator<Item = &str> {
        self.loaded.iter().map(String::as_str)
    }

    /// Returns the base of identifiers generated for the given type.
    ///
    /// The base is the snake case type name, prefixed with the component
    /// name unless the type name already starts with it.
    #[must_use]
    pub fn id_base(&self, ty: &TypeRef) -> String {
        let kind = ty.snake_name();
        let component = snake_case(&self.component.replace('.', "_"));
        if component.is_empty() || kind.starts_with(&component) {
            kind
        } else {
            format!("{component}_{kind}")
        }
    }

    /// Enters an automation whose actions receive the given arguments.
    pub fn push_args(&mut self, args: Vec<Parameter>) {
        self.args.push(args);
    }

    /// Leaves the innermost automation.
    pub fn pop_args(&mut self) {
        let _ = self.args.pop();
    }

    /// Returns the arguments of the innermost automation.
    #[must_use]
    pub fn current_args(&self) -> &[Parameter] {
        self.args.last().map_or(&[], Vec::as_slice)
    }
}

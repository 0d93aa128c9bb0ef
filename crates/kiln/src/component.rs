use std::sync::Arc;

use crate::codegen::ToCodeFn;
use crate::pins::PinFlags;
use crate::resolver::FinalContext;
use crate::scheduler::priority;
use crate::schema::{Invalid, Schema, Validator};
use crate::target::Constraints;
use crate::types::TypeRef;
use crate::value::ConfigMap;

/// A document-wide check run once every instance is validated.
///
/// The hook may rewrite component-local values of its own instance, such as
/// entity names, but never identifiers.
pub type FinalValidateFn =
    Arc<dyn Fn(&mut ConfigMap, &mut FinalContext<'_>) -> Result<(), Invalid> + Send + Sync>;

/// How many instances of a component a document may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiConf {
    /// One instance at most.
    Single,
    /// Any number of instances.
    Multi,
    /// At most the given number of instances.
    Limited(usize),
}

impl MultiConf {
    /// Returns the maximum number of instances, if bounded.
    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        match self {
            Self::Single => Some(1),
            Self::Multi => None,
            Self::Limited(limit) => Some(*limit),
        }
    }

    /// Whether the component accepts a list of instances.
    #[must_use]
    pub const fn is_multi(&self) -> bool {
        !matches!(self, Self::Single)
    }
}

/// Where a component appears in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentKind {
    /// A top-level key.
    TopLevel,
    /// A top-level key holding a list of platform instances.
    Domain,
    /// An item of a domain list selected through its `platform` key.
    Platform {
        /// Domain name.
        domain: String,
    },
}

/// Pins offered by a GPIO expander.
///
/// A pin mapping carrying `key` refers to a pin of the expander instance
/// with the given identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct PinProvider {
    /// Pin mapping key naming the expander.
    pub key: String,
    /// Type of the expander.
    pub hub_type: TypeRef,
    /// Type of the pin objects.
    pub pin_type: TypeRef,
    /// Modes the expander pins support.
    pub capabilities: PinFlags,
    /// Highest pin number.
    pub max_number: u32,
}

/// A configurable unit contributing schema, dependencies, and a
/// code-emission function.
#[derive(Clone)]
pub struct Component {
    name: String,
    kind: ComponentKind,
    schema: Validator,
    dependencies: Vec<String>,
    auto_load: Vec<String>,
    conflicts_with: Vec<String>,
    codeowners: Vec<String>,
    multi_conf: MultiConf,
    constraints: Constraints,
    priority: f64,
    final_validate: Option<FinalValidateFn>,
    to_code: ToCodeFn,
    pin_provider: Option<PinProvider>,
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("dependencies", &self.dependencies)
            .field("auto_load", &self.auto_load)
            .field("multi_conf", &self.multi_conf)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

impl Component {
    /// Creates a top-level [`Component`].
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_kind(name.into(), ComponentKind::TopLevel, priority::COMPONENT)
    }

    /// Creates a domain [`Component`] holding platform instances.
    #[must_use]
    pub fn domain(name: impl Into<String>) -> Self {
        Self::with_kind(name.into(), ComponentKind::Domain, priority::COMPONENT)
    }

    /// Creates a platform [`Component`] of a domain.
    #[must_use]
    pub fn platform(domain: impl Into<String>, name: impl Into<String>) -> Self {
        let mut component = Self::with_kind(
            name.into(),
            ComponentKind::Platform {
                domain: domain.into(),
            },
            priority::CONSUMER,
        );
        component.multi_conf = MultiConf::Multi;
        component
    }

    fn with_kind(name: String, kind: ComponentKind, priority: f64) -> Self {
        Self {
            name,
            kind,
            schema: Schema::new().into(),
            dependencies: Vec::new(),
            auto_load: Vec::new(),
            conflicts_with: Vec::new(),
            codeowners: Vec::new(),
            multi_conf: MultiConf::Single,
            constraints: Constraints::new(),
            priority,
            final_validate: None,
            to_code: Arc::new(|_, _| Ok(())),
            pin_provider: None,
        }
    }

    /// Sets the schema of one instance.
    #[must_use]
    #[inline]
    pub fn schema(mut self, schema: impl Into<Validator>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Sets the components which must be present in the document.
    #[must_use]
    #[inline]
    pub fn dependencies(mut self, names: &[&str]) -> Self {
        self.dependencies = names.iter().map(|name| (*name).to_string()).collect();
        self
    }

    /// Sets the components instantiated with defaults when absent.
    #[must_use]
    #[inline]
    pub fn auto_load(mut self, names: &[&str]) -> Self {
        self.auto_load = names.iter().map(|name| (*name).to_string()).collect();
        self
    }

    /// Sets the components which cannot be part of the same document.
    #[must_use]
    #[inline]
    pub fn conflicts_with(mut self, names: &[&str]) -> Self {
        self.conflicts_with = names.iter().map(|name| (*name).to_string()).collect();
        self
    }

    /// Sets the maintainers.
    #[must_use]
    #[inline]
    pub fn codeowners(mut self, owners: &[&str]) -> Self {
        self.codeowners = owners.iter().map(|owner| (*owner).to_string()).collect();
        self
    }

    /// Sets how many instances a document may hold.
    #[must_use]
    #[inline]
    pub fn multi_conf(mut self, multi_conf: MultiConf) -> Self {
        self.multi_conf = multi_conf;
        self
    }

    /// Restricts the targets the component is available on.
    #[must_use]
    #[inline]
    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Sets the emission priority.
    #[must_use]
    #[inline]
    pub fn priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the document-wide check.
    #[must_use]
    #[inline]
    pub fn final_validate<F>(mut self, check: F) -> Self
    where
        F: Fn(&mut ConfigMap, &mut FinalContext<'_>) -> Result<(), Invalid> + Send + Sync + 'static,
    {
        self.final_validate = Some(Arc::new(check));
        self
    }

    /// Sets the code-emission function.
    #[must_use]
    #[inline]
    pub fn to_code<F>(mut self, to_code: F) -> Self
    where
        F: Fn(&mut crate::codegen::EmitContext<'_>, &ConfigMap) -> crate::codegen::Emit<()>
            + Send
            + Sync
            + 'static,
    {
        self.to_code = Arc::new(to_code);
        self
    }

    /// Declares the component a GPIO expander whose pins are selected with
    /// `key` in pin mappings.
    #[must_use]
    #[inline]
    pub fn pin_provider(
        mut self,
        key: impl Into<String>,
        hub_type: TypeRef,
        pin_type: TypeRef,
        capabilities: PinFlags,
        max_number: u32,
    ) -> Self {
        self.pin_provider = Some(PinProvider {
            key: key.into(),
            hub_type,
            pin_type,
            capabilities,
            max_number,
        });
        self
    }

    /// Returns the component name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name used in diagnostics and registry lookups:
    /// `domain.platform` for platforms, the name otherwise.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.kind {
            ComponentKind::Platform { domain } => format!("{domain}.{}", self.name),
            ComponentKind::TopLevel | ComponentKind::Domain => self.name.clone(),
        }
    }

    /// Returns the [`ComponentKind`].
    #[must_use]
    pub const fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    /// Returns the domain of a platform.
    #[must_use]
    pub fn domain_name(&self) -> Option<&str> {
        match &self.kind {
            ComponentKind::Platform { domain } => Some(domain),
            ComponentKind::TopLevel | ComponentKind::Domain => None,
        }
    }

    /// Returns the instance schema.
    #[must_use]
    pub const fn instance_schema(&self) -> &Validator {
        &self.schema
    }

    /// Returns the required components.
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.dependencies
    }

    /// Returns the auto-loaded components.
    #[must_use]
    pub fn auto_loaded(&self) -> &[String] {
        &self.auto_load
    }

    /// Returns the conflicting components.
    #[must_use]
    pub fn conflicts(&self) -> &[String] {
        &self.conflicts_with
    }

    /// Returns the maintainers.
    #[must_use]
    pub fn owners(&self) -> &[String] {
        &self.codeowners
    }

    /// Returns the [`MultiConf`].
    #[must_use]
    pub const fn instances(&self) -> MultiConf {
        self.multi_conf
    }

    /// Returns the target restrictions.
    #[must_use]
    pub const fn target_constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Returns the emission priority.
    #[must_use]
    pub const fn emission_priority(&self) -> f64 {
        self.priority
    }

    /// Returns the document-wide check.
    #[must_use]
    pub const fn final_check(&self) -> Option<&FinalValidateFn> {
        self.final_validate.as_ref()
    }

    /// Returns the code-emission function.
    #[must_use]
    pub const fn emitter(&self) -> &ToCodeFn {
        &self.to_code
    }

    /// Returns the pins offered when the component is a GPIO expander.
    #[must_use]
    pub const fn pins(&self) -> Option<&PinProvider> {
        self.pin_provider.as_ref()
    }
}

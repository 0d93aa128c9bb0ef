use serde::Serialize;

use crate::diagnostics::{Diagnostic, Error, ErrorKind};
use crate::document::Document;
use crate::ir::IrNode;
use crate::manifest::Manifest;
use crate::registry::ComponentRegistry;
use crate::resolver::{Plan, Resolver};
use crate::target::{Framework, Platform, TargetProfile};
use crate::value::Value;

/// The result of a successful compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    /// Device name taken from the core component, if any.
    pub device_name: Option<String>,
    /// The resolved plan.
    pub plan: Plan,
    /// The ordered statement stream.
    pub ir: Vec<IrNode>,
    /// The build manifest.
    pub manifest: Manifest,
}

impl Output {
    /// Returns the warnings found while resolving the document.
    #[must_use]
    pub fn warnings(&self) -> &[Diagnostic] {
        self.plan.warnings()
    }
}

/// The build description handed to the downstream toolchain.
#[derive(Debug, Serialize)]
pub struct BuildDescription<'a> {
    /// Device name.
    pub device: Option<&'a str>,
    /// Target profile name.
    pub target: &'static str,
    /// Target platform.
    pub platform: Platform,
    /// Target framework.
    pub framework: Framework,
    /// Libraries, defines, build flags, and source files.
    #[serde(flatten)]
    pub manifest: &'a Manifest,
}

/// Compiles configuration documents for a target.
pub struct Compiler<'a> {
    registry: &'a ComponentRegistry,
    target: TargetProfile,
}

impl<'a> Compiler<'a> {
    /// Creates a [`Compiler`] for the named target profile.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::UnsupportedTarget`] for unknown profiles.
    pub fn new(registry: &'a ComponentRegistry, target: &str) -> Result<Self, Error> {
        let target = TargetProfile::lookup(target).ok_or_else(|| {
            Error::new(
                ErrorKind::UnsupportedTarget,
                format!("Unsupported target `{target}`"),
            )
        })?;
        Ok(Self { registry, target })
    }

    /// Returns the selected target.
    #[must_use]
    pub const fn target(&self) -> &TargetProfile {
        &self.target
    }

    /// Compiles a document read from a file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, or like [`Compiler::compile`].
    pub fn compile_path(&self, path: &std::path::Path) -> Result<Output, Error> {
        self.compile(Document::load(path)?)
    }

    /// Compiles a document held in memory.
    ///
    /// # Errors
    ///
    /// Fails like [`Document::parse`] and [`Compiler::compile`].
    pub fn compile_str(&self, text: &str) -> Result<Output, Error> {
        self.compile(Document::parse(text)?)
    }

    /// Resolves and emits a document.
    ///
    /// # Errors
    ///
    /// Fails with the diagnostics of the first failing resolution pass, or
    /// with the first emission failure.
    pub fn compile(&self, document: Document) -> Result<Output, Error> {
        let resolver = Resolver::new(self.registry, &self.target);
        let plan = resolver.resolve(document.into_root())?;
        let emission = resolver.execute(&plan)?;

        let device_name = self
            .registry
            .core_component()
            .and_then(|core| plan.instances_of(core.name()).next())
            .and_then(|core| core.config.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);

        tracing::info!(
            "Compiled {} for {}",
            device_name.as_deref().unwrap_or("document"),
            self.target.name
        );
        Ok(Output {
            device_name,
            plan,
            ir: emission.nodes,
            manifest: emission.manifest,
        })
    }

    /// Returns the build description of an output.
    #[must_use]
    pub fn describe<'o>(&self, output: &'o Output) -> BuildDescription<'o> {
        BuildDescription {
            device: output.device_name.as_deref(),
            target: self.target.name,
            platform: self.target.platform,
            framework: self.target.framework,
            manifest: &output.manifest,
        }
    }
}

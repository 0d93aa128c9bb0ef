//! The core of a firmware build configurator.
//!
//! This crate turns a declarative device configuration document into a
//! code-generation plan. It provides APIs to:
//!
//! - Parse configuration documents and apply their substitutions.
//! - Describe components through schemas, dependencies, target restrictions
//!   and code-emission functions, and collect them in a registry.
//! - Validate a document against the registered schemas, reporting every
//!   problem found as a positioned diagnostic.
//! - Resolve identifiers, dependencies and auto-loaded components into an
//!   ordered plan of component instances.
//! - Run the code-emission function of each instance through a
//!   priority-ordered scheduler, producing an ordered stream of intermediate
//!   representation statements and a build manifest.
//!
//! Rendering the intermediate representation to source text and invoking a
//! toolchain is left to downstream tools.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod macros;

/// Hardware addresses and keys.
pub mod address;
pub mod automation;
pub mod codegen;
/// Document compilation.
pub mod compiler;
/// Component descriptors.
pub mod component;
/// Diagnostics and errors.
pub mod diagnostics;
pub mod document;
/// Identifiers and references.
pub mod identifier;
/// Intermediate representation of the generated program.
pub mod ir;
/// Build manifest.
pub mod manifest;
/// Pins and pin modes.
pub mod pins;
/// Component registry.
pub mod registry;
pub mod resolver;
pub mod scheduler;
pub mod schema;
/// Target profiles.
pub mod target;
/// Types of the generated program.
pub mod types;
/// Physical units and time periods.
pub mod units;
/// Configuration values.
pub mod value;

#[cfg(test)]
pub(crate) fn serialize<T: serde::Serialize>(value: T) -> serde_json::Value {
    serde_json::to_value(value).unwrap()
}

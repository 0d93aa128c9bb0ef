//! `kiln-components` is the built-in component catalog of `kiln`.
//!
//! Every module describes one component, or one domain together with its
//! platforms, through the `kiln` APIs: a schema, the relations with other
//! components, and a code-emission function. The [`registry`] function
//! collects the whole catalog into a ready-to-use [`ComponentRegistry`].
//!
//! Sensor drivers and GPIO expanders can be left out through the crate
//! features.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

use kiln::diagnostics::Error;
use kiln::registry::ComponentRegistry;
use kiln::types::TypeRegistry;

/// The `binary_sensor` domain.
pub mod binary_sensor;
/// The `esp32_ble_tracker` component.
pub mod esp32_ble_tracker;
pub mod esphome;
/// The `ethernet` component.
pub mod ethernet;
/// The `i2c` bus.
pub mod i2c;
/// The `interval` component.
pub mod interval;
/// The `logger` component.
pub mod logger;
/// The `network` component.
pub mod network;
/// The `PCF8574` GPIO expander.
#[cfg(feature = "pcf8574")]
pub mod pcf8574;
pub mod sensor;
/// The `spi` bus.
pub mod spi;
/// The `switch` domain.
pub mod switch;
/// The `uart` bus.
pub mod uart;
/// The `wifi` component.
pub mod wifi;

#[cfg(test)]
mod scenarios;

/// Registers every built-in component into a registry and marks the
/// `esphome` component as the core one.
pub fn register(registry: &mut ComponentRegistry) {
    esphome::register(registry);
    logger::register(registry);
    network::register(registry);
    wifi::register(registry);
    ethernet::register(registry);
    i2c::register(registry);
    spi::register(registry);
    uart::register(registry);
    esp32_ble_tracker::register(registry);
    interval::register(registry);
    sensor::register(registry);
    switch::register(registry);
    binary_sensor::register(registry);
    #[cfg(feature = "pcf8574")]
    pcf8574::register(registry);
    registry.set_core(esphome::NAME);
}

/// Builds a [`ComponentRegistry`] holding the whole catalog.
///
/// # Errors
///
/// Fails when the relations between the registered components are
/// inconsistent.
pub fn registry() -> Result<ComponentRegistry, Error> {
    let mut registry = ComponentRegistry::new(TypeRegistry::new());
    register(&mut registry);
    registry.finish()?;
    tracing::debug!(
        "Catalog ready with {} components",
        registry.components().count()
    );
    Ok(registry)
}

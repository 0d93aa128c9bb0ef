use hashbrown::DefaultHashBuilder;

use indexmap::set::{IndexSet, IntoIter, Iter};

use serde::Serialize;

use crate::macros::set;

/// Microcontroller platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Espressif ESP32 family.
    Esp32,
    /// Espressif ESP8266.
    Esp8266,
    /// Raspberry Pi RP2040.
    Rp2040,
    /// The build host itself.
    Host,
}

impl Platform {
    /// Returns the [`Platform`] name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Esp32 => "esp32",
            Self::Esp8266 => "esp8266",
            Self::Rp2040 => "rp2040",
            Self::Host => "host",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.name().fmt(f)
    }
}

/// Software frameworks the generated program is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framework {
    /// The Arduino core.
    Arduino,
    /// The Espressif IoT Development Framework.
    EspIdf,
    /// The host operating system.
    Host,
}

impl Framework {
    /// Returns the [`Framework`] name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Arduino => "arduino",
            Self::EspIdf => "esp-idf",
            Self::Host => "host",
        }
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.name().fmt(f)
    }
}

/// All [`Capability`]s.
pub const ALL_CAPABILITIES: &[Capability] = &[
    Capability::Wifi,
    Capability::Ble,
    Capability::I2c,
    Capability::Spi,
    Capability::Uart,
    Capability::Adc,
    Capability::Ethernet,
];

/// Hardware capabilities provided by a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Capability {
    /// Wi-Fi radio.
    Wifi,
    /// Bluetooth Low Energy radio.
    Ble,
    /// I²C controller.
    I2c,
    /// SPI controller.
    Spi,
    /// UART controller.
    Uart,
    /// Analog to digital converter.
    Adc,
    /// Ethernet MAC.
    Ethernet,
}

impl Capability {
    /// Returns the [`Capability`] name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Wifi => "Wi-Fi",
            Self::Ble => "BLE",
            Self::I2c => "I2C",
            Self::Spi => "SPI",
            Self::Uart => "UART",
            Self::Adc => "ADC",
            Self::Ethernet => "Ethernet",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.name().fmt(f)
    }
}

set! {
  /// A collection of [`Capability`]s.
  #[derive(Debug, Clone, PartialEq, Serialize)]
  pub struct Capabilities(IndexSet<Capability, DefaultHashBuilder>);
}

impl Capabilities {
    /// Constructs [`Capabilities`] from an array of [`Capability`]s.
    #[must_use]
    #[inline]
    pub fn init_from_capabilities<const N: usize>(input_elements: [Capability; N]) -> Self {
        let mut elements = Self::new();
        for element in input_elements {
            elements.add(element);
        }
        elements
    }
}

impl std::fmt::Display for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, capability) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            capability.fmt(f)?;
        }
        Ok(())
    }
}

/// Native pins of a target.
#[derive(Debug, PartialEq, Eq)]
pub struct PinMap {
    /// Highest pin number.
    pub max: u32,
    /// Pins which do not exist or are reserved by the flash interface.
    pub unusable: &'static [u32],
    /// Pins which cannot drive an output.
    pub input_only: &'static [u32],
    /// Pins sampled at boot to select the boot mode.
    pub strapping: &'static [u32],
    /// Board-specific pin names.
    pub aliases: &'static [(&'static str, u32)],
}

impl PinMap {
    /// Resolves a board alias.
    #[must_use]
    pub fn alias(&self, name: &str) -> Option<u32> {
        self.aliases
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
            .map(|(_, number)| *number)
    }

    /// Checks whether a pin can be used at all.
    ///
    /// # Errors
    ///
    /// Returns a message describing why the pin cannot be used.
    pub fn check(&self, number: u32) -> Result<(), String> {
        if number > self.max {
            return Err(format!(
                "GPIO{number} does not exist on this target, the highest pin is GPIO{}",
                self.max
            ));
        }
        if self.unusable.contains(&number) {
            return Err(format!(
                "GPIO{number} cannot be used on this target, it is reserved or used by the flash interface"
            ));
        }
        Ok(())
    }

    /// Whether the pin can only be used as an input.
    #[must_use]
    pub fn is_input_only(&self, number: u32) -> bool {
        self.input_only.contains(&number)
    }

    /// Whether the pin is a strapping pin.
    #[must_use]
    pub fn is_strapping(&self, number: u32) -> bool {
        self.strapping.contains(&number)
    }
}

const ESP32_PINS: PinMap = PinMap {
    max: 39,
    unusable: &[6, 7, 8, 9, 10, 11, 20, 24, 28, 29, 30, 31],
    input_only: &[34, 35, 36, 37, 38, 39],
    strapping: &[0, 2, 5, 12, 15],
    aliases: &[("VP", 36), ("VN", 39)],
};

const ESP32C3_PINS: PinMap = PinMap {
    max: 21,
    unusable: &[12, 13, 14, 15, 16, 17],
    input_only: &[],
    strapping: &[2, 8, 9],
    aliases: &[],
};

const ESP8266_PINS: PinMap = PinMap {
    max: 17,
    unusable: &[6, 7, 8, 9, 10, 11],
    input_only: &[17],
    strapping: &[0, 2, 15],
    aliases: &[
        ("D0", 16),
        ("D1", 5),
        ("D2", 4),
        ("D3", 0),
        ("D4", 2),
        ("D5", 14),
        ("D6", 12),
        ("D7", 13),
        ("D8", 15),
        ("RX", 3),
        ("TX", 1),
        ("A0", 17),
    ],
};

const RP2040_PINS: PinMap = PinMap {
    max: 29,
    unusable: &[],
    input_only: &[],
    strapping: &[],
    aliases: &[("LED", 25)],
};

const HOST_PINS: PinMap = PinMap {
    max: 0,
    unusable: &[0],
    input_only: &[],
    strapping: &[],
    aliases: &[],
};

/// All target profile names.
pub const ALL_TARGETS: &[&str] = &[
    "esp32-arduino",
    "esp32-idf",
    "esp32c3-idf",
    "esp8266-arduino",
    "rp2040-arduino",
    "host",
];

/// A named set of capabilities selecting which components are permitted.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetProfile {
    /// Profile name.
    pub name: &'static str,
    /// Microcontroller platform.
    pub platform: Platform,
    /// Software framework.
    pub framework: Framework,
    /// Hardware capabilities.
    pub capabilities: Capabilities,
    /// Native pins.
    pub pins: &'static PinMap,
}

impl TargetProfile {
    /// Looks a profile up by name.
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        use Capability::{Adc, Ble, Ethernet, I2c, Spi, Uart, Wifi};

        let profile = match name {
            "esp32-arduino" => Self {
                name: "esp32-arduino",
                platform: Platform::Esp32,
                framework: Framework::Arduino,
                capabilities: Capabilities::init_from_capabilities([
                    Wifi, Ble, I2c, Spi, Uart, Adc, Ethernet,
                ]),
                pins: &ESP32_PINS,
            },
            "esp32-idf" => Self {
                name: "esp32-idf",
                platform: Platform::Esp32,
                framework: Framework::EspIdf,
                capabilities: Capabilities::init_from_capabilities([
                    Wifi, Ble, I2c, Spi, Uart, Adc, Ethernet,
                ]),
                pins: &ESP32_PINS,
            },
            "esp32c3-idf" => Self {
                name: "esp32c3-idf",
                platform: Platform::Esp32,
                framework: Framework::EspIdf,
                capabilities: Capabilities::init_from_capabilities([
                    Wifi, Ble, I2c, Spi, Uart, Adc,
                ]),
                pins: &ESP32C3_PINS,
            },
            "esp8266-arduino" => Self {
                name: "esp8266-arduino",
                platform: Platform::Esp8266,
                framework: Framework::Arduino,
                capabilities: Capabilities::init_from_capabilities([Wifi, I2c, Spi, Uart, Adc]),
                pins: &ESP8266_PINS,
            },
            "rp2040-arduino" => Self {
                name: "rp2040-arduino",
                platform: Platform::Rp2040,
                framework: Framework::Arduino,
                capabilities: Capabilities::init_from_capabilities([I2c, Spi, Uart, Adc]),
                pins: &RP2040_PINS,
            },
            "host" => Self {
                name: "host",
                platform: Platform::Host,
                framework: Framework::Host,
                capabilities: Capabilities::init_from_capabilities([Ethernet]),
                pins: &HOST_PINS,
            },
            _ => return None,
        };
        Some(profile)
    }

    /// Returns every known profile.
    #[must_use]
    pub fn all() -> Vec<Self> {
        ALL_TARGETS.iter().filter_map(|name| Self::lookup(name)).collect()
    }
}

/// Restrictions of a component to some targets.
///
/// An empty list of platforms or frameworks accepts every platform or
/// framework.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    platforms: Vec<Platform>,
    frameworks: Vec<Framework>,
    capabilities: Capabilities,
}

impl Constraints {
    /// Creates [`Constraints`] accepting every target.
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to the given platforms.
    #[must_use]
    #[inline]
    pub fn platforms(mut self, platforms: &[Platform]) -> Self {
        self.platforms = platforms.to_vec();
        self
    }

    /// Restricts to the given frameworks.
    #[must_use]
    #[inline]
    pub fn frameworks(mut self, frameworks: &[Framework]) -> Self {
        self.frameworks = frameworks.to_vec();
        self
    }

    /// Requires a capability.
    #[must_use]
    #[inline]
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.add(capability);
        self
    }

    /// Whether the constraints accept every target.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.platforms.is_empty() && self.frameworks.is_empty() && self.capabilities.is_empty()
    }

    /// Returns the required capabilities the target lacks.
    #[must_use]
    pub fn blocked_capabilities(&self, target: &TargetProfile) -> Capabilities {
        target.capabilities.missing(&self.capabilities)
    }

    /// Checks the constraints against a target.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first unsatisfied restriction.
    pub fn check(&self, target: &TargetProfile) -> Result<(), String> {
        if !self.platforms.is_empty() && !self.platforms.contains(&target.platform) {
            let names: Vec<&str> = self.platforms.iter().map(Platform::name).collect();
            return Err(format!(
                "This feature is only available on {names:?}, target `{}` is {}",
                target.name, target.platform
            ));
        }
        if !self.frameworks.is_empty() && !self.frameworks.contains(&target.framework) {
            let names: Vec<&str> = self.frameworks.iter().map(Framework::name).collect();
            return Err(format!(
                "This feature is only available with frameworks {names:?}, target `{}` uses {}",
                target.name, target.framework
            ));
        }
        let blocked = self.blocked_capabilities(target);
        if !blocked.is_empty() {
            return Err(format!(
                "This feature requires {blocked}, which target `{}` does not provide",
                target.name
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ALL_TARGETS, Capabilities, Capability, Constraints, Framework, Platform, TargetProfile,
    };

    #[test]
    fn known_profiles() {
        assert_eq!(TargetProfile::all().len(), ALL_TARGETS.len());
        assert!(TargetProfile::lookup("esp32-arduino").is_some());
        assert!(TargetProfile::lookup("atmega328").is_none());

        let esp8266 = TargetProfile::lookup("esp8266-arduino").unwrap();
        assert_eq!(esp8266.pins.alias("d1"), Some(5));
        assert!(!esp8266.capabilities.contains(&Capability::Ble));
    }

    #[test]
    fn pin_map() {
        let esp32 = TargetProfile::lookup("esp32-idf").unwrap();
        assert!(esp32.pins.check(21).is_ok());
        assert!(esp32.pins.check(6).unwrap_err().contains("flash"));
        assert!(esp32.pins.check(40).is_err());
        assert!(esp32.pins.is_input_only(34));
        assert!(esp32.pins.is_strapping(0));
    }

    #[test]
    fn missing_capabilities() {
        let target = TargetProfile::lookup("rp2040-arduino").unwrap();
        let constraints = Constraints::new()
            .capability(Capability::I2c)
            .capability(Capability::Ble);

        assert_eq!(
            constraints.blocked_capabilities(&target),
            Capabilities::new().insert(Capability::Ble)
        );
        assert_eq!(
            constraints.check(&target).unwrap_err(),
            "This feature requires BLE, which target `rp2040-arduino` does not provide"
        );
    }

    #[test]
    fn platform_and_framework() {
        let esp32 = TargetProfile::lookup("esp32-idf").unwrap();
        let esp8266 = TargetProfile::lookup("esp8266-arduino").unwrap();

        let only_esp32 = Constraints::new().platforms(&[Platform::Esp32]);
        assert!(only_esp32.check(&esp32).is_ok());
        assert_eq!(
            only_esp32.check(&esp8266).unwrap_err(),
            "This feature is only available on [\"esp32\"], target `esp8266-arduino` is esp8266"
        );

        let only_arduino = Constraints::new().frameworks(&[Framework::Arduino]);
        assert!(only_arduino.check(&esp8266).is_ok());
        assert!(only_arduino.check(&esp32).is_err());
        assert!(Constraints::new().is_unrestricted());
    }
}

use std::fmt;

use hashbrown::DefaultHashBuilder;

use indexmap::set::{IndexSet, IntoIter, Iter};

use serde::Serialize;

use crate::identifier::IdRef;
use crate::macros::set;
use crate::target::PinMap;

/// All [`PinFlag`]s.
pub const ALL_PIN_FLAGS: &[PinFlag] = &[
    PinFlag::Input,
    PinFlag::Output,
    PinFlag::Pullup,
    PinFlag::Pulldown,
    PinFlag::OpenDrain,
    PinFlag::Analog,
];

/// Electrical modes of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PinFlag {
    /// Reads a level.
    Input,
    /// Drives a level.
    Output,
    /// Internal pull-up resistor.
    Pullup,
    /// Internal pull-down resistor.
    Pulldown,
    /// Open-drain output.
    OpenDrain,
    /// Analog input.
    Analog,
}

impl PinFlag {
    /// Returns the [`PinFlag`] name as written in configuration documents.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Pullup => "pullup",
            Self::Pulldown => "pulldown",
            Self::OpenDrain => "open_drain",
            Self::Analog => "analog",
        }
    }

    /// Returns the [`PinFlag`] with the given name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_PIN_FLAGS
            .iter()
            .copied()
            .find(|flag| flag.name().eq_ignore_ascii_case(name))
    }

    /// Returns the constant of the generated runtime for this flag.
    #[must_use]
    pub const fn constant(&self) -> &'static str {
        match self {
            Self::Input => "FLAG_INPUT",
            Self::Output => "FLAG_OUTPUT",
            Self::Pullup => "FLAG_PULLUP",
            Self::Pulldown => "FLAG_PULLDOWN",
            Self::OpenDrain => "FLAG_OPEN_DRAIN",
            Self::Analog => "FLAG_ANALOG",
        }
    }
}

impl fmt::Display for PinFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name().fmt(f)
    }
}

set! {
  /// A collection of [`PinFlag`]s.
  #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
  pub struct PinFlags(IndexSet<PinFlag, DefaultHashBuilder>);
}

impl PinFlags {
    /// Constructs [`PinFlags`] from an array of [`PinFlag`]s.
    #[must_use]
    #[inline]
    pub fn init_from_flags<const N: usize>(input_elements: [PinFlag; N]) -> Self {
        let mut elements = Self::new();
        for element in input_elements {
            elements.add(element);
        }
        elements
    }
}

impl std::hash::Hash for PinFlags {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for flag in self {
            flag.hash(state);
        }
    }
}

impl fmt::Display for PinFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, flag) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            flag.fmt(f)?;
        }
        Ok(())
    }
}

/// A physical input/output line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pin {
    /// Pin number, native or on the provider.
    pub number: u32,
    /// Electrical mode.
    pub flags: PinFlags,
    /// Whether the logic level is inverted.
    pub inverted: bool,
    /// Output drive strength in milliamperes, if configured.
    pub drive_strength: Option<u32>,
    /// The expander providing the pin, [`None`] for native pins.
    pub provider: Option<IdRef>,
}

impl Pin {
    /// Creates a native [`Pin`].
    #[must_use]
    pub fn native(number: u32, flags: PinFlags) -> Self {
        Self {
            number,
            flags,
            inverted: false,
            drive_strength: None,
            provider: None,
        }
    }

    /// Whether the pin lives on the microcontroller itself.
    #[must_use]
    pub const fn is_native(&self) -> bool {
        self.provider.is_none()
    }

    /// A key identifying the physical line, shared by every use of it.
    #[must_use]
    pub fn line(&self) -> (Option<&str>, u32) {
        (
            self.provider.as_ref().map(|provider| provider.name.as_str()),
            self.number,
        )
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "{} pin {}", provider.name, self.number),
            None => write!(f, "GPIO{}", self.number),
        }
    }
}

/// Parses a native pin number written as `GPIO<n>`, `<n>`, or a board
/// alias.
///
/// # Errors
///
/// Returns a message when the name does not denote a pin of the target.
pub fn parse_pin_number(text: &str, pins: &PinMap) -> Result<u32, String> {
    let text = text.trim();
    if let Some(number) = pins.alias(text) {
        return Ok(number);
    }

    let digits = match text.get(..4) {
        Some(prefix) if text.len() > 4 && prefix.eq_ignore_ascii_case("GPIO") => &text[4..],
        _ => text,
    };

    digits
        .parse::<u32>()
        .map_err(|_| format!("Invalid pin number: {text}"))
}

#[cfg(test)]
mod tests {
    use crate::target::TargetProfile;

    use super::{Pin, PinFlag, PinFlags, parse_pin_number};

    #[test]
    fn pin_names() {
        let esp32 = TargetProfile::lookup("esp32-arduino").unwrap();
        let esp8266 = TargetProfile::lookup("esp8266-arduino").unwrap();

        assert_eq!(parse_pin_number("GPIO21", esp32.pins), Ok(21));
        assert_eq!(parse_pin_number("gpio4", esp32.pins), Ok(4));
        assert_eq!(parse_pin_number("13", esp32.pins), Ok(13));
        assert_eq!(parse_pin_number("D1", esp8266.pins), Ok(5));
        assert_eq!(
            parse_pin_number("GPIOX", esp32.pins),
            Err("Invalid pin number: GPIOX".into())
        );
    }

    #[test]
    fn flags() {
        let requested = PinFlags::init_from_flags([PinFlag::Output, PinFlag::OpenDrain]);
        let provided = PinFlags::init_from_flags([PinFlag::Input, PinFlag::Output]);

        assert!(!provided.is_superset(&requested));
        assert_eq!(provided.missing(&requested).to_string(), "open_drain");
        assert_eq!(PinFlag::from_name("PULLUP"), Some(PinFlag::Pullup));

        let pin = Pin::native(21, requested);
        assert!(pin.is_native());
        assert_eq!(pin.to_string(), "GPIO21");
        assert_eq!(pin.line(), (None, 21));
    }
}

use std::fmt;

/// A MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Creates a [`MacAddress`] from its bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Returns the address bytes.
    #[must_use]
    pub const fn bytes(&self) -> [u8; 6] {
        self.0
    }

    /// Returns the address packed into the low 48 bits of an integer.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
    }

    /// Parses a MAC address in the `AA:BB:CC:DD:EE:FF`, `AA-BB-CC-DD-EE-FF`,
    /// or `AABBCCDDEEFF` form.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();

        let mut mac = [0u8; 6];
        if text.contains(':') || text.contains('-') {
            let separator = if text.contains(':') { ':' } else { '-' };
            let mut parts = text.split(separator);

            for byte in &mut mac {
                let part = parts.next()?;
                if part.len() != 2 {
                    return None;
                }
                *byte = u8::from_str_radix(part, 16).ok()?;
            }

            if parts.next().is_some() {
                return None;
            }
        } else {
            if text.len() != 12 || !text.is_ascii() {
                return None;
            }
            for (byte, chunk) in mac.iter_mut().zip(text.as_bytes().chunks(2)) {
                *byte = u8::from_str_radix(std::str::from_utf8(chunk).ok()?, 16).ok()?;
            }
        }

        Some(Self(mac))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

/// A Bluetooth UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Uuid {
    /// A 16-bit UUID.
    Uuid16(u16),
    /// A 32-bit UUID.
    Uuid32(u32),
    /// A 128-bit UUID.
    Uuid128([u8; 16]),
}

impl Uuid {
    /// Parses a UUID in its 16-bit (`FEAA`, `0xFEAA`), 32-bit, or canonical
    /// 128-bit form.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let short = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);

        if !short.is_empty() && short.chars().all(|c| c.is_ascii_hexdigit()) {
            return match short.len() {
                4 => u16::from_str_radix(short, 16).ok().map(Self::Uuid16),
                8 => u32::from_str_radix(short, 16).ok().map(Self::Uuid32),
                _ => None,
            };
        }

        let groups: Vec<&str> = text.split('-').collect();
        let lengths: Vec<usize> = groups.iter().map(|group| group.len()).collect();
        if lengths != [8, 4, 4, 4, 12] {
            return None;
        }

        let digits: String = groups.concat();
        let mut bytes = [0u8; 16];
        for (byte, chunk) in bytes.iter_mut().zip(digits.as_bytes().chunks(2)) {
            *byte = u8::from_str_radix(std::str::from_utf8(chunk).ok()?, 16).ok()?;
        }
        Some(Self::Uuid128(bytes))
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid16(value) => write!(f, "0x{value:04X}"),
            Self::Uuid32(value) => write!(f, "0x{value:08X}"),
            Self::Uuid128(bytes) => {
                for (i, byte) in bytes.iter().enumerate() {
                    if matches!(i, 4 | 6 | 8 | 10) {
                        f.write_str("-")?;
                    }
                    write!(f, "{byte:02X}")?;
                }
                Ok(())
            }
        }
    }
}

/// Parses a 16 byte encryption key written as 32 hexadecimal digits,
/// optionally separated by dashes, colons, or dots.
#[must_use]
pub fn parse_bind_key(text: &str) -> Option<[u8; 16]> {
    let digits: String = text
        .chars()
        .filter(|c| !matches!(c, '-' | ':' | '.'))
        .collect();
    if digits.len() != 32 || !digits.is_ascii() {
        return None;
    }

    let mut key = [0u8; 16];
    for (byte, chunk) in key.iter_mut().zip(digits.as_bytes().chunks(2)) {
        *byte = u8::from_str_radix(std::str::from_utf8(chunk).ok()?, 16).ok()?;
    }
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::{MacAddress, Uuid, parse_bind_key};

    const MAC: [u8; 6] = [0xA4, 0xC1, 0x38, 0x01, 0x02, 0x0F];

    #[test]
    fn mac_forms() {
        let expected = Some(MacAddress::new(MAC));
        assert_eq!(MacAddress::parse("A4:C1:38:01:02:0F"), expected);
        assert_eq!(MacAddress::parse("a4-c1-38-01-02-0f"), expected);
        assert_eq!(MacAddress::parse("A4C13801020F"), expected);
        assert_eq!(
            MacAddress::new(MAC).to_string(),
            "A4:C1:38:01:02:0F"
        );
        assert_eq!(MacAddress::new(MAC).as_u64(), 0xA4C1_3801_020F);
    }

    #[test]
    fn invalid_macs() {
        assert_eq!(MacAddress::parse("A4:C1:38:01:02"), None);
        assert_eq!(MacAddress::parse("A4:C1:38:01:02:0F:00"), None);
        assert_eq!(MacAddress::parse("A4:C1:38:1:02:0F"), None);
        assert_eq!(MacAddress::parse("ZZC13801020F"), None);
    }

    #[test]
    fn uuid_forms() {
        assert_eq!(Uuid::parse("0xFEAA"), Some(Uuid::Uuid16(0xFEAA)));
        assert_eq!(Uuid::parse("feaa"), Some(Uuid::Uuid16(0xFEAA)));
        assert_eq!(Uuid::parse("0x0000FEAA"), Some(Uuid::Uuid32(0xFEAA)));

        let uuid = Uuid::parse("6e400001-b5a3-f393-e0a9-e50e24dcca9e");
        assert!(matches!(uuid, Some(Uuid::Uuid128(_))));
        assert_eq!(
            uuid.map(|uuid| uuid.to_string()),
            Some("6E400001-B5A3-F393-E0A9-E50E24DCCA9E".into())
        );
        assert_eq!(Uuid::parse("6e400001-b5a3"), None);
        assert_eq!(Uuid::parse("FEA"), None);
    }

    #[test]
    fn bind_keys() {
        assert!(parse_bind_key("eef418daf699a0c188f3bfd17e4565d9").is_some());
        assert!(parse_bind_key("eef418da-f699a0c1-88f3bfd1-7e4565d9").is_some());
        assert!(parse_bind_key("eef418daf699a0c188f3bfd17e4565").is_none());
        assert!(parse_bind_key("zzf418daf699a0c188f3bfd17e4565d9").is_none());
    }
}

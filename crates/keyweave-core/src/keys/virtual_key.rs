//! The [`VirtualKey`] value type.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::names;

/// Lowest code that identifies a real key.
const MIN_CODE: u16 = 0x01;
/// Highest code that identifies a real key; 0xFF is reserved by Windows.
const MAX_CODE: u16 = 0xFE;

/// Error returned when a string cannot be interpreted as a [`VirtualKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("empty key name")]
    Empty,
    #[error("unknown key name: {0:?}")]
    UnknownName(String),
    #[error("key code {0:#x} is outside 0x01..=0xFE")]
    OutOfRange(u64),
}

/// Opaque code identifying a physical key.
///
/// The numeric value is the Windows virtual-key code.  Values are compared by
/// code only; two keys with the same code are the same key regardless of how
/// they were written in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualKey(u16);

impl VirtualKey {
    pub const BACKSPACE: VirtualKey = VirtualKey(0x08);
    pub const TAB: VirtualKey = VirtualKey(0x09);
    pub const ENTER: VirtualKey = VirtualKey(0x0D);
    pub const SHIFT: VirtualKey = VirtualKey(0x10);
    pub const CONTROL: VirtualKey = VirtualKey(0x11);
    pub const ALT: VirtualKey = VirtualKey(0x12);
    pub const CAPS_LOCK: VirtualKey = VirtualKey(0x14);
    pub const ESCAPE: VirtualKey = VirtualKey(0x1B);
    pub const SPACE: VirtualKey = VirtualKey(0x20);
    pub const LEFT: VirtualKey = VirtualKey(0x25);
    pub const UP: VirtualKey = VirtualKey(0x26);
    pub const RIGHT: VirtualKey = VirtualKey(0x27);
    pub const DOWN: VirtualKey = VirtualKey(0x28);
    pub const DELETE: VirtualKey = VirtualKey(0x2E);

    pub const A: VirtualKey = VirtualKey(0x41);
    pub const B: VirtualKey = VirtualKey(0x42);
    pub const C: VirtualKey = VirtualKey(0x43);
    pub const D: VirtualKey = VirtualKey(0x44);
    pub const E: VirtualKey = VirtualKey(0x45);
    pub const F: VirtualKey = VirtualKey(0x46);
    pub const G: VirtualKey = VirtualKey(0x47);
    pub const H: VirtualKey = VirtualKey(0x48);
    pub const I: VirtualKey = VirtualKey(0x49);
    pub const J: VirtualKey = VirtualKey(0x4A);
    pub const K: VirtualKey = VirtualKey(0x4B);
    pub const L: VirtualKey = VirtualKey(0x4C);
    pub const M: VirtualKey = VirtualKey(0x4D);
    pub const N: VirtualKey = VirtualKey(0x4E);
    pub const O: VirtualKey = VirtualKey(0x4F);
    pub const P: VirtualKey = VirtualKey(0x50);
    pub const Q: VirtualKey = VirtualKey(0x51);
    pub const R: VirtualKey = VirtualKey(0x52);
    pub const S: VirtualKey = VirtualKey(0x53);
    pub const T: VirtualKey = VirtualKey(0x54);
    pub const U: VirtualKey = VirtualKey(0x55);
    pub const V: VirtualKey = VirtualKey(0x56);
    pub const W: VirtualKey = VirtualKey(0x57);
    pub const X: VirtualKey = VirtualKey(0x58);
    pub const Y: VirtualKey = VirtualKey(0x59);
    pub const Z: VirtualKey = VirtualKey(0x5A);

    pub const F1: VirtualKey = VirtualKey(0x70);
    pub const F12: VirtualKey = VirtualKey(0x7B);
    pub const LEFT_SHIFT: VirtualKey = VirtualKey(0xA0);
    pub const RIGHT_SHIFT: VirtualKey = VirtualKey(0xA1);
    pub const LEFT_CONTROL: VirtualKey = VirtualKey(0xA2);
    pub const RIGHT_CONTROL: VirtualKey = VirtualKey(0xA3);

    /// Wraps a raw code exactly as reported by the OS.
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the raw code.
    pub const fn code(self) -> u16 {
        self.0
    }

    /// Returns the canonical name (`"A"`, `"Space"`, `"F5"`), if the code has one.
    pub fn name(self) -> Option<&'static str> {
        names::name_of(self.0)
    }

    fn from_number(value: u64) -> Result<Self, KeyParseError> {
        if (MIN_CODE as u64..=MAX_CODE as u64).contains(&value) {
            Ok(Self(value as u16))
        } else {
            Err(KeyParseError::OutOfRange(value))
        }
    }
}

impl From<u16> for VirtualKey {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl fmt::Display for VirtualKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#04X}", self.0),
        }
    }
}

impl FromStr for VirtualKey {
    type Err = KeyParseError;

    /// Accepts a key name (`"A"`, `"space"`), a hex code (`"0x41"`), or a
    /// decimal code (`"65"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(KeyParseError::Empty);
        }

        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            let value = u64::from_str_radix(hex, 16)
                .map_err(|_| KeyParseError::UnknownName(s.to_string()))?;
            return Self::from_number(value);
        }

        if s.bytes().all(|b| b.is_ascii_digit()) {
            let value: u64 = s
                .parse()
                .map_err(|_| KeyParseError::UnknownName(s.to_string()))?;
            return Self::from_number(value);
        }

        names::code_for_name(s)
            .map(Self)
            .ok_or_else(|| KeyParseError::UnknownName(s.to_string()))
    }
}

// Serialized as the bare integer code so files written by earlier tooling
// (which stored enum values as numbers) stay readable in both directions.
impl Serialize for VirtualKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.0)
    }
}

impl<'de> Deserialize<'de> for VirtualKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(VirtualKeyVisitor)
    }
}

struct VirtualKeyVisitor;

impl<'de> Visitor<'de> for VirtualKeyVisitor {
    type Value = VirtualKey;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a virtual-key code (1..=254) or a key name")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        VirtualKey::from_number(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        let v = u64::try_from(v).map_err(|_| E::custom(format!("negative key code {v}")))?;
        self.visit_u64(v)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_canonical_name() {
        assert_eq!(VirtualKey::A.to_string(), "A");
        assert_eq!(VirtualKey::SPACE.to_string(), "Space");
    }

    #[test]
    fn test_display_unnamed_code_as_hex() {
        assert_eq!(VirtualKey::new(0x07).to_string(), "0x07");
        assert_eq!(VirtualKey::new(0xE9).to_string(), "0xE9");
    }

    #[test]
    fn test_parse_name_hex_and_decimal() {
        assert_eq!("A".parse::<VirtualKey>(), Ok(VirtualKey::A));
        assert_eq!("0x41".parse::<VirtualKey>(), Ok(VirtualKey::A));
        assert_eq!("0X41".parse::<VirtualKey>(), Ok(VirtualKey::A));
        assert_eq!("65".parse::<VirtualKey>(), Ok(VirtualKey::A));
        assert_eq!("  space ".parse::<VirtualKey>(), Ok(VirtualKey::SPACE));
    }

    #[test]
    fn test_parse_rejects_empty_unknown_and_out_of_range() {
        assert_eq!("".parse::<VirtualKey>(), Err(KeyParseError::Empty));
        assert!(matches!(
            "Hyper".parse::<VirtualKey>(),
            Err(KeyParseError::UnknownName(_))
        ));
        assert_eq!("0".parse::<VirtualKey>(), Err(KeyParseError::OutOfRange(0)));
        assert_eq!("0xFF".parse::<VirtualKey>(), Err(KeyParseError::OutOfRange(0xFF)));
        assert!(matches!(
            "0xZZ".parse::<VirtualKey>(),
            Err(KeyParseError::UnknownName(_))
        ));
    }

    #[test]
    fn test_serializes_as_integer() {
        let json = serde_json::to_string(&VirtualKey::B).expect("serialize");
        assert_eq!(json, "66");
    }

    #[test]
    fn test_deserializes_from_integer_name_or_hex() {
        let from_int: VirtualKey = serde_json::from_str("66").expect("int");
        let from_name: VirtualKey = serde_json::from_str("\"B\"").expect("name");
        let from_hex: VirtualKey = serde_json::from_str("\"0x42\"").expect("hex");
        assert_eq!(from_int, VirtualKey::B);
        assert_eq!(from_name, VirtualKey::B);
        assert_eq!(from_hex, VirtualKey::B);
    }

    #[test]
    fn test_deserialize_rejects_negative_and_out_of_range() {
        assert!(serde_json::from_str::<VirtualKey>("-1").is_err());
        assert!(serde_json::from_str::<VirtualKey>("300").is_err());
        assert!(serde_json::from_str::<VirtualKey>("\"NotAKey\"").is_err());
    }
}

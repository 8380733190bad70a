//! Strongly-typed identifiers.
//!
//! Device identities are validated at construction time and implement common traits.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to define a strongly-typed ID newtype wrapper.
///
/// Generates: struct, `from_string()`, `as_str()`, Display, Serialize, Deserialize.
macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn from_string(s: String) -> Result<Self, &'static str> {
                if s.is_empty() {
                    return Err(concat!(stringify!($name), " cannot be empty"));
                }
                Ok(Self(s))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = &'static str;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::from_string(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(DeviceId);

impl DeviceId {
    /// Build a device id from an IEEE address, dropping the `0x` prefix.
    ///
    /// `0x00158d0001a2b3c4` and `00158d0001a2b3c4` map to the same id.
    pub fn from_ieee(addr: &str) -> Result<Self, &'static str> {
        let trimmed = addr
            .strip_prefix("0x")
            .or_else(|| addr.strip_prefix("0X"))
            .unwrap_or(addr);
        Self::from_string(trimmed.to_ascii_lowercase())
    }

    #[cfg(test)]
    pub(crate) fn must(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ieee_strips_prefix() {
        let id = DeviceId::from_ieee("0x00158D0001A2B3C4").unwrap();
        assert_eq!(id.as_str(), "00158d0001a2b3c4");
        assert_eq!(id, DeviceId::from_ieee("00158d0001a2b3c4").unwrap());
    }

    #[test]
    fn test_empty_rejected() {
        assert!(DeviceId::from_string(String::new()).is_err());
        assert!(DeviceId::from_ieee("0x").is_err());
    }

    #[test]
    fn test_serde_rejects_empty() {
        let parsed: std::result::Result<DeviceId, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());
        let parsed: DeviceId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(parsed.as_str(), "abc");
    }
}

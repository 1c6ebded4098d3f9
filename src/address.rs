// ============================================================================
// EMSG Addresses
// ============================================================================
//
// Wire format: <local-part>#<domain>
// - exactly one '#' separator
// - both halves non-empty
// - domain carries at least one dot
//
// No case folding and no length limits are applied; the canonical form is the
// string exactly as received.
//
// ============================================================================

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between local-part and domain
pub const ADDRESS_SEPARATOR: char = '#';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid address format: {0}")]
    InvalidFormat(String),
}

/// A validated `local#domain` address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    raw: String,
    split: usize,
}

impl Address {
    /// Parse and validate an address
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let invalid = || AddressError::InvalidFormat(input.to_string());

        let mut parts = input.split(ADDRESS_SEPARATOR);
        let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(domain), None) => (local, domain),
            _ => return Err(invalid()),
        };

        if local.is_empty() || domain.is_empty() || !domain.contains('.') {
            return Err(invalid());
        }

        Ok(Self {
            raw: input.to_string(),
            split: local.len(),
        })
    }

    pub fn local_part(&self) -> &str {
        &self.raw[..self.split]
    }

    pub fn domain(&self) -> &str {
        &self.raw[self.split + ADDRESS_SEPARATOR.len_utf8()..]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Validate an address string without keeping the parsed value
pub fn validate(address: &str) -> Result<(), AddressError> {
    Address::parse(address).map(|_| ())
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_addresses() {
        for input in ["alice#emsg.dev", "b#x.y", "a.b#mail.example.co.uk", "Bob#Example.COM"] {
            assert!(validate(input).is_ok(), "{} should be valid", input);
        }
    }

    #[test]
    fn test_invalid_addresses() {
        for input in [
            "",
            "alice",
            "alice@emsg.dev",
            "#emsg.dev",
            "alice#",
            "alice#localhost",
            "alice#emsg#dev",
            "#",
        ] {
            assert_eq!(
                validate(input),
                Err(AddressError::InvalidFormat(input.to_string())),
                "{} should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_parts_and_display() {
        let addr = Address::parse("alice#emsg.dev").unwrap();
        assert_eq!(addr.local_part(), "alice");
        assert_eq!(addr.domain(), "emsg.dev");
        assert_eq!(addr.to_string(), "alice#emsg.dev");
    }

    #[test]
    fn test_no_case_folding() {
        let upper = Address::parse("Alice#EMSG.dev").unwrap();
        let lower = Address::parse("alice#emsg.dev").unwrap();
        assert_ne!(upper, lower);
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let ok: Address = serde_json::from_str("\"alice#emsg.dev\"").unwrap();
        assert_eq!(ok.domain(), "emsg.dev");
        assert!(serde_json::from_str::<Address>("\"alice\"").is_err());
    }
}

//! Identity types for graphads
//!
//! This module defines the foundational identity types:
//! - ObjectName: logical, process-wide-unique name of a persisted element
//! - HashTag: 256-bit content digest used for set and map membership

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Width of an anonymous name in characters
pub const ANONYMOUS_NAME_LEN: usize = 32;

/// Logical name of a persisted element or container
///
/// Names are assigned at creation and never change. Every statement addresses
/// its targets by name. Anonymous names are a v4 UUID in simple form (32
/// lowercase hex characters); the garbage collector relies on exactly that
/// pattern to decide which unreferenced nodes it may reclaim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectName(String);

impl ObjectName {
    /// Create a name from caller-supplied text
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Generate a fresh anonymous name
    pub fn anonymous() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// True when the name matches the anonymous pattern
    pub fn is_anonymous(&self) -> bool {
        is_anonymous_name(&self.0)
    }

    /// Borrow the name as text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string
    pub fn into_string(self) -> String {
        self.0
    }
}

/// True for exactly 32 lowercase hex characters
pub fn is_anonymous_name(name: &str) -> bool {
    name.len() == ANONYMOUS_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ObjectName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&ObjectName> for ObjectName {
    fn from(name: &ObjectName) -> Self {
        name.clone()
    }
}

/// Deterministic SHA-256 content digest
///
/// Stored as a fixed-width 64 character lowercase hex string so that string
/// comparison in the store matches byte comparison here.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HashTag([u8; 32]);

impl HashTag {
    /// Hex width of a rendered tag
    pub const HEX_LEN: usize = 64;

    /// Digest arbitrary bytes
    pub fn digest(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    /// Digest the UTF-8 bytes of a canonical form
    pub fn of_canonical(form: &str) -> Self {
        Self::digest(form.as_bytes())
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render as 64 lowercase hex characters
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a rendered tag
    ///
    /// # Errors
    /// Returns `Error::Protocol` unless the input is exactly 64 hex characters.
    pub fn from_hex(text: &str) -> Result<Self> {
        if text.len() != Self::HEX_LEN {
            return Err(Error::protocol(format!("malformed hash tag: {:?}", text)));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(text, &mut bytes)
            .map_err(|e| Error::protocol(format!("malformed hash tag {:?}: {}", text, e)))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for HashTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for HashTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashTag({})", &self.to_hex()[..12])
    }
}

impl Serialize for HashTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for HashTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        HashTag::from_hex(&text).map_err(de::Error::custom)
    }
}

//! Envelope: the versioned, self-describing container for an encrypted vault
//!
//! Wire form (JSON):
//! ```text
//! { "version": 2, "salt": "<b64 16>", "iv": "<b64 12>", "data": "<b64 ciphertext+tag>", "compressed": true }
//! ```
//! `v` is accepted in place of `version` when reading.

use crate::{
    error::{Error, Result},
    util::ToBase64,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Envelope format versions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum EnvelopeVersion {
    /// uncompressed ciphertext
    V1 = 1,
    /// compressed-then-encrypted
    V2 = 2,
}

impl EnvelopeVersion {
    /// the version written by `encrypt`
    pub const CURRENT: EnvelopeVersion = EnvelopeVersion::V2;

    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(EnvelopeVersion::V1),
            2 => Some(EnvelopeVersion::V2),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for EnvelopeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_u32())
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// An encrypted vault, in transport encoding. Immutable once constructed.
///
/// Missing fields deserialize to empty values, so a partially-written
/// record still parses and is rejected by validation instead of by the parser.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(alias = "v", default)]
    version: u32,
    #[serde(default)]
    salt: String,
    #[serde(default)]
    iv: String,
    #[serde(default)]
    data: String,
    #[serde(default, skip_serializing_if = "is_false")]
    compressed: bool,
}

impl Envelope {
    pub(crate) fn new(version: EnvelopeVersion, salt: &[u8], iv: &[u8], ciphertext: &[u8]) -> Self {
        Self {
            version: version.as_u32(),
            salt: salt.to_base64(),
            iv: iv.to_base64(),
            data: ciphertext.to_base64(),
            compressed: version == EnvelopeVersion::V2,
        }
    }

    /// Parses an envelope from its JSON text form.
    /// Text that isn't a JSON object of the right shape is a validation error.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text)
            .map_err(|e| Error::Validation(format!("invalid encrypted envelope: {}", e)))
    }

    /// Serializes this envelope to JSON text
    pub fn to_json(&self) -> String {
        // a struct of strings, ints and bools always serializes
        serde_json::to_string(self).unwrap_or_default()
    }

    /// raw version number, as stored
    pub fn version(&self) -> u32 {
        self.version
    }

    /// base64 salt
    pub fn salt(&self) -> &str {
        &self.salt
    }

    /// base64 nonce
    pub fn iv(&self) -> &str {
        &self.iv
    }

    /// base64 ciphertext, including auth tag
    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Storage-level check used by the recovery tiers: a version is present
    /// and there is ciphertext. Says nothing about whether it will decrypt.
    pub fn is_structurally_valid(&self) -> bool {
        self.version != 0 && !self.data.is_empty()
    }

    /// Full shape check performed before decryption
    pub fn validate(&self) -> Result<EnvelopeVersion, Error> {
        let version = EnvelopeVersion::from_u32(self.version).ok_or_else(|| {
            Error::Validation(format!("unsupported envelope version {}", self.version))
        })?;
        if self.salt.is_empty() || self.iv.is_empty() || self.data.is_empty() {
            return Err(Error::Validation(
                "envelope is missing salt, iv, or data".to_string(),
            ));
        }
        Ok(version)
    }

    /// true if the payload must be decompressed after decryption
    pub(crate) fn needs_decompress(&self) -> bool {
        self.version == EnvelopeVersion::V2.as_u32() && self.compressed
    }
}

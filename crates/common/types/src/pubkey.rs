use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Length in bytes of a compressed BLS public key.
pub const PUBKEY_LENGTH: usize = 48;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PubkeyParseError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("public key must be {PUBKEY_LENGTH} bytes, got {0}")]
    InvalidLength(usize),
}

/// A validator's BLS public key.
///
/// The raw bytes are used as-is to identify the validator's proposal history
/// partition, so two keys are equal only if every byte matches.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValidatorPubkey([u8; PUBKEY_LENGTH]);

impl ValidatorPubkey {
    pub const fn new(bytes: [u8; PUBKEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, PubkeyParseError> {
        let bytes: [u8; PUBKEY_LENGTH] = bytes
            .try_into()
            .map_err(|_| PubkeyParseError::InvalidLength(bytes.len()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; PUBKEY_LENGTH] {
        &self.0
    }
}

impl fmt::Display for ValidatorPubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// Keys show up in nearly every log line, so keep debug output short.
impl fmt::Debug for ValidatorPubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidatorPubkey(0x{}..)", hex::encode(&self.0[..4]))
    }
}

impl FromStr for ValidatorPubkey {
    type Err = PubkeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for ValidatorPubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ValidatorPubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

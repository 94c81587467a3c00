//! Core type definitions for the Value Network distribution system
//!
//! Every account on the ledger, including the accounts held by the vesting
//! contract and the dev pool, is identified by a 256-bit [`Address`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Token amount in the smallest unit
pub type Amount = u128;

/// Seconds since an arbitrary epoch chosen by the caller
pub type Timestamp = u64;

/// Monotonically assigned dev pool proposal identifier
pub type ProposalId = u64;

/// Address - 32-byte account identifier
///
/// Serialized as a 64-character lowercase hex string so that it can be used
/// as a JSON map key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address {
    bytes: [u8; 32],
}

impl Address {
    /// Create a new Address from raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Derive an address from a human-readable label using BLAKE3
    ///
    /// Labels are how operators name well-known accounts (`@treasury`,
    /// `@alice`) without managing keys.
    pub fn from_label(label: &str) -> Self {
        let hash = blake3::hash(label.as_bytes());
        Self {
            bytes: *hash.as_bytes(),
        }
    }

    /// Derive the account address of a component deployed by `deployer`
    ///
    /// address = BLAKE3("vntw.contract" || deployer || nonce)
    pub fn derive_contract(deployer: &Address, nonce: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"vntw.contract");
        hasher.update(&deployer.bytes);
        hasher.update(&nonce.to_le_bytes());
        Self {
            bytes: *hasher.finalize().as_bytes(),
        }
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse from a 64-character hex string (optional `0x` prefix)
    pub fn from_hex(s: &str) -> Result<Self, AddressParseError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let decoded = hex::decode(s).map_err(|e| AddressParseError::InvalidHex(e.to_string()))?;
        let bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|v: Vec<u8>| AddressParseError::InvalidLength(v.len()))?;
        Ok(Self { bytes })
    }

    /// Zero address
    pub const ZERO: Self = Self { bytes: [0u8; 32] };
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Accepts either raw hex or `@label`
impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix('@') {
            Some("") => Err(AddressParseError::EmptyLabel),
            Some(label) => Ok(Self::from_label(label)),
            None => Self::from_hex(s),
        }
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self::new(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Errors produced when parsing an [`Address`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("address must be 32 bytes, got {0}")]
    InvalidLength(usize),

    #[error("empty address label")]
    EmptyLabel,
}

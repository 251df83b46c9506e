//! Base58Check address encoding.
//!
//! An address is `version_byte ‖ pubkey_hash ‖ checksum`, Base58-encoded.
//! `pubkey_hash = RIPEMD160(SHA256(pubkey))` and `checksum` is the first
//! four bytes of `double_sha256(version_byte ‖ pubkey_hash)`. Only one
//! version byte (`0x00`) is defined.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::{ADDRESS_CHECKSUM_LEN, ADDRESS_VERSION, PUBKEY_HASH_LEN};
use crate::error::AddressError;
use crate::hash::{double_sha256, pubkey_hash as hash_pubkey};

/// A validated Strand address.
///
/// Construct via [`Address::from_pubkey`] (deriving from a public key) or
/// [`Address::parse`] / [`str::parse`] (validating a Base58 string from
/// untrusted input). Both paths guarantee a correct checksum.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    encoded: String,
    pubkey_hash: [u8; PUBKEY_HASH_LEN],
}

impl Address {
    /// Derive the address locking outputs to `pubkey_bytes`.
    pub fn from_pubkey(pubkey_bytes: &[u8]) -> Self {
        let hash = hash_pubkey(pubkey_bytes);
        Self::from_pubkey_hash(hash)
    }

    /// Build an address directly from a known 20-byte public key hash.
    pub fn from_pubkey_hash(pubkey_hash: [u8; PUBKEY_HASH_LEN]) -> Self {
        let mut versioned = Vec::with_capacity(1 + PUBKEY_HASH_LEN);
        versioned.push(ADDRESS_VERSION);
        versioned.extend_from_slice(&pubkey_hash);

        let checksum = &double_sha256(&versioned).as_bytes()[..ADDRESS_CHECKSUM_LEN];

        let mut full = versioned;
        full.extend_from_slice(checksum);

        Self {
            encoded: bs58::encode(full).into_string(),
            pubkey_hash,
        }
    }

    /// Parse and validate a Base58-encoded address string.
    ///
    /// Recomputes the checksum over the decoded payload and rejects any
    /// mismatch, malformed length, or unknown version byte.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let raw = bs58::decode(s)
            .into_vec()
            .map_err(|_| AddressError::InvalidBase58)?;

        let expected_len = 1 + PUBKEY_HASH_LEN + ADDRESS_CHECKSUM_LEN;
        if raw.len() != expected_len {
            return Err(AddressError::InvalidLength(raw.len()));
        }

        let version = raw[0];
        if version != ADDRESS_VERSION {
            return Err(AddressError::InvalidVersion(version));
        }

        let versioned = &raw[..1 + PUBKEY_HASH_LEN];
        let checksum = &raw[1 + PUBKEY_HASH_LEN..];
        let expected_checksum = &double_sha256(versioned).as_bytes()[..ADDRESS_CHECKSUM_LEN];
        if checksum != expected_checksum {
            return Err(AddressError::InvalidChecksum);
        }

        let mut pubkey_hash = [0u8; PUBKEY_HASH_LEN];
        pubkey_hash.copy_from_slice(&raw[1..1 + PUBKEY_HASH_LEN]);

        Ok(Self {
            encoded: s.to_string(),
            pubkey_hash,
        })
    }

    /// The 20-byte public key hash this address locks outputs to.
    pub fn pubkey_hash(&self) -> [u8; PUBKEY_HASH_LEN] {
        self.pubkey_hash
    }

    /// The Base58-encoded string form.
    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encoded)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.encoded.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
